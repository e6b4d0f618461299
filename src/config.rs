//! Application configuration: one JSON file covering the session, the
//! workflows and the spreadsheet. Credentials can be supplied through
//! `AUTOT1_USERNAME` / `AUTOT1_PASSWORD` so they stay out of the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use autot1_session::SessionConfig;
use autot1_workflow::WorkflowConfig;

fn default_window_width() -> u32 {
    1600
}

fn default_window_height() -> u32 {
    1000
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_nav_timeout_ms() -> u64 {
    30_000
}

fn default_script_timeout_ms() -> u64 {
    10_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            chrome_executable: None,
            screenshot_dir: default_screenshot_dir(),
            nav_timeout_ms: default_nav_timeout_ms(),
            script_timeout_ms: default_script_timeout_ms(),
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            headless: self.headless,
            window_size: (self.window_width, self.window_height),
            chrome_executable: self.chrome_executable.clone(),
            screenshot_dir: self.screenshot_dir.clone(),
            nav_timeout_ms: self.nav_timeout_ms,
            script_timeout_ms: self.script_timeout_ms,
        }
    }
}

fn default_sheet_path() -> PathBuf {
    PathBuf::from("records.csv")
}

fn default_mrn_column() -> String {
    "MRN".to_string()
}

fn default_status_column() -> String {
    "Status".to_string()
}

fn default_detail_column() -> String {
    "Detail".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SheetSettings {
    #[serde(default = "default_sheet_path")]
    pub path: PathBuf,
    /// Header of the column holding the movement reference numbers.
    #[serde(default = "default_mrn_column")]
    pub mrn_column: String,
    #[serde(default = "default_status_column")]
    pub status_column: String,
    #[serde(default = "default_detail_column")]
    pub detail_column: String,
    #[serde(default)]
    pub create_if_missing: bool,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            path: default_sheet_path(),
            mrn_column: default_mrn_column(),
            status_column: default_status_column(),
            detail_column: default_detail_column(),
            create_if_missing: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub sheet: SheetSettings,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        if let Ok(username) = env::var("AUTOT1_USERNAME") {
            config.workflow.username = username;
        }
        if let Ok(password) = env::var("AUTOT1_PASSWORD") {
            config.workflow.password = password;
        }
        Ok(config)
    }
}

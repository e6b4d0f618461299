//! Workflow configuration and the application's stable selectors.

use serde::{Deserialize, Serialize};

use autot1_core_types::DateTimePolicy;

/// Selectors and texts the target application has kept stable across
/// releases. Centralised so a UI change is a one-file fix.
pub mod selectors {
    pub const USERNAME: &str = "#txtUsername";
    pub const PASSWORD: &str = "#pwdPassword";
    pub const LOGIN: &str = "#btnLogin";
    pub const NEW_DECLARATION: &str = "#btnNewDeclaration";
    pub const CONFIRM: &str = "#CreateDeclarationConfirmationButton";
    pub const SEND: &str = "#send";
    pub const DATE_FROM: &str = "#dateFrom";
    pub const DATE_TO: &str = "#dateTo";
    pub const SEARCH_MRN: &str = "#ucr";
    pub const SETTINGS: &str = "#editGrid";
    pub const APPLY: &str = "#applyButtonOnWindow";
    pub const FIND: &str = "#btnFind";
    pub const RESULTS_GRID: &str = "#declarationGrid";
    pub const UNLOADING_REMARKS: &str = "#unloadingRemarksAction";
    pub const UNLOADING_TAB_TEXT: &str = "Nota di scarico";
    /// Two elements share this id; the label attribute disambiguates.
    pub const PUBLIC_LAYOUT_COMBO: &str = "#publicComboBox[label=\"Public Layout\"]";
    /// The arrival date/time picker, by component tag then by id fragment.
    pub const ARRIVAL_PICKER: &str = "vaadin-date-time-picker, [id*='ArrivalNotificationDate']";
    /// Ids the MRN field has been observed under.
    pub const MRN_ID_GUESSES: &[&str] =
        &["#ucr", "#mrnField", "#txtMRN", "#MRN", "#mrn", "#mrnTextField"];
}

fn default_declarations_url() -> String {
    "https://app.customs.blujaysolutions.net/cm/declarations".to_string()
}

fn default_message_type() -> String {
    "NCTS Arrival Notification IT".to_string()
}

fn default_profile() -> String {
    "MX DHL - MXP GTW - DEST AUT".to_string()
}

fn default_destination_title() -> String {
    "Ufficio delle Dogane di MALPENSA".to_string()
}

fn default_destination_code() -> String {
    "IT279100".to_string()
}

fn default_layout_name() -> String {
    "STANDARD ST".to_string()
}

fn default_arrival_marker() -> String {
    "NCTS Arrival Notification IT".to_string()
}

fn default_release_marker() -> String {
    "Rilascio merci".to_string()
}

fn default_lookback_days() -> i64 {
    30
}

fn default_step_timeout_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    2_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_declarations_url")]
    pub declarations_url: String,
    pub username: String,
    pub password: String,

    /// Message type cell clicked when starting a declaration.
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// Profile cell clicked after the message type.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// The destination office field is read-only and identified by the
    /// customs office title on its shadow input; its presence confirms
    /// the expected office code.
    #[serde(default = "default_destination_title")]
    pub destination_title: String,
    #[serde(default = "default_destination_code")]
    pub destination_code: String,

    #[serde(default)]
    pub arrival_datetime: DateTimePolicy,

    /// Lookup: grid layout applied once before searching.
    #[serde(default = "default_layout_name")]
    pub layout_name: String,
    /// Lookup: message name marking the submitted arrival notification.
    #[serde(default = "default_arrival_marker")]
    pub arrival_marker: String,
    /// Lookup: message name marking goods release (fully processed).
    #[serde(default = "default_release_marker")]
    pub release_marker: String,
    /// Lookup: search window, `today - lookback_days ..= today`.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Grace period after page-mutating actions while the grid settles.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

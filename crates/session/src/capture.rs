//! Diagnostic capture: tagged, timestamped PNG files on disk.
//!
//! Every failure path in the application funnels through here so an
//! unattended run leaves a visual trail. File names are
//! `<tag>_<timestamp>.png` with characters that upset filesystems
//! (`:` and `.` from the ISO timestamp) replaced by `-`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

pub struct Capture {
    dir: PathBuf,
}

impl Capture {
    /// Create the capture sink, ensuring the target directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one capture and return its path.
    pub fn write(&self, tag: &str, png: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(file_name(tag, Utc::now()));
        fs::write(&path, png)?;
        debug!(tag, path = %path.display(), "diagnostic capture written");
        Ok(path)
    }
}

fn file_name(tag: &str, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{tag}_{stamp}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_names_are_filesystem_safe() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 14, 37, 52).unwrap();
        let name = file_name("fill_failed", at);
        assert!(name.starts_with("fill_failed_2024-03-15T14-37-52"));
        assert!(name.ends_with(".png"));
        let stem = name.trim_end_matches(".png");
        assert!(!stem.contains(':'));
        assert!(!stem.contains('.'));
    }

    #[test]
    fn write_creates_the_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let capture = Capture::new(tmp.path().join("shots")).unwrap();
        let path = capture.write("login_failed", b"\x89PNG").unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("login_failed_"));
    }
}

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use tracing::warn;

use crate::error::StorageError;

/// Last notification date per target id, persisted as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationLog {
    entries: BTreeMap<String, NaiveDate>,
    dirty: bool,
}

impl NotificationLog {
    pub fn from_entries(entries: BTreeMap<String, NaiveDate>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    /// Load the log at `path`.
    ///
    /// A missing file yields an empty log. An unreadable or corrupt file also
    /// yields an empty log, with a warning.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(log)) => log,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = ?e, path = %path.display(), "notification log unusable, starting empty");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, Report<StorageError>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Report::new(e).change_context(StorageError::Read)),
        };

        let entries: BTreeMap<String, NaiveDate> =
            serde_json::from_str(&content).change_context(StorageError::Read)?;
        Ok(Some(Self::from_entries(entries)))
    }

    /// Write the log to `path` if an entry was recorded since loading.
    ///
    /// Returns whether the file was written.
    pub fn save_if_changed(&mut self, path: &Path) -> Result<bool, Report<StorageError>> {
        if !self.dirty {
            return Ok(false);
        }
        self.save(path)?;
        self.dirty = false;
        Ok(true)
    }

    pub fn save(&self, path: &Path) -> Result<(), Report<StorageError>> {
        let json =
            serde_json::to_string_pretty(&self.entries).change_context(StorageError::Serialize)?;
        std::fs::write(path, json)
            .change_context(StorageError::Write)
            .attach_with(|| format!("path: {}", path.display()))
    }

    pub fn notified_on(&self, id: &str, date: NaiveDate) -> bool {
        self.entries.get(id) == Some(&date)
    }

    /// Record a successful notification, replacing any earlier date.
    pub fn record(&mut self, id: &str, date: NaiveDate) {
        if self.entries.insert(id.to_owned(), date) != Some(date) {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn entries(&self) -> &BTreeMap<String, NaiveDate> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = NotificationLog::load(&dir.path().join("absent.json"));
        assert!(log.entries().is_empty());
        assert!(!log.is_dirty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(&path, "{not json").unwrap();
        let log = NotificationLog::load(&path);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");

        let mut entries = BTreeMap::new();
        entries.insert("SSEC".to_owned(), date("2024-03-01"));
        entries.insert("转债均价".to_owned(), date("2023-12-31"));
        let log = NotificationLog::from_entries(entries);

        log.save(&path).unwrap();
        assert_eq!(NotificationLog::load(&path), log);
    }

    #[test]
    fn file_format_is_flat_iso_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut log = NotificationLog::default();
        log.record("SSEC", date("2024-03-01"));
        log.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "SSEC": "2024-03-01" }));
    }

    #[test]
    fn unchanged_log_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut log = NotificationLog::default();
        assert!(!log.save_if_changed(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn recording_same_date_twice_is_not_a_change() {
        let mut entries = BTreeMap::new();
        entries.insert("SSEC".to_owned(), date("2024-03-01"));
        let mut log = NotificationLog::from_entries(entries);

        log.record("SSEC", date("2024-03-01"));
        assert!(!log.is_dirty());

        log.record("SSEC", date("2024-03-02"));
        assert!(log.is_dirty());
        assert!(log.notified_on("SSEC", date("2024-03-02")));
        assert!(!log.notified_on("SSEC", date("2024-03-01")));
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn save_if_changed_clears_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut log = NotificationLog::default();
        log.record("X", date("2024-03-01"));
        assert!(log.save_if_changed(&path).unwrap());
        assert!(!log.is_dirty());
        assert!(path.exists());
    }
}

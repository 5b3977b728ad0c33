//! JSONL intake journal.
//!
//! Log entries are appended to a JSON Lines file with file locking to
//! ensure safe concurrent access. The journal doubles as the CLI's
//! `LogStore` implementation through the `JournalLogStore` adapter.

use crate::{LogEntry, LogStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Intake sink trait for persisting log entries
pub trait IntakeSink {
    fn append(&mut self, entry: &LogEntry) -> Result<()>;
}

/// JSONL-based intake sink with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new JSONL journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl IntakeSink for JsonlJournal {
    fn append(&mut self, entry: &LogEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Exclusive lock; released when the file handle drops
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended log entry {} to journal", entry.id);
        Ok(())
    }
}

/// Read all log entries from a journal file
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse log entry at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} log entries from journal", entries.len());
    Ok(entries)
}

/// `LogStore` adapter over a journal file.
///
/// Reads are windowed and filtered in memory; the journal is the CLI's
/// storage, not a database. Returned newest first like the trait requires.
pub struct JournalLogStore {
    path: PathBuf,
}

impl JournalLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogStore for JournalLogStore {
    async fn logs_in_range(
        &self,
        user_id: &str,
        supplement_ids: Option<&[String]>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogEntry>> {
        let mut matched: Vec<LogEntry> = read_entries(&self.path)?
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| e.logged_at >= start && e.logged_at <= end)
            .filter(|e| match supplement_ids {
                Some(ids) => ids.iter().any(|id| *id == e.supplement_id),
                None => true,
            })
            .collect();

        matched.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));

        tracing::debug!(
            "Journal window query matched {} entries for user {}",
            matched.len(),
            user_id
        );
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DoseUnit;
    use chrono::Duration;
    use uuid::Uuid;

    fn create_test_entry(user: &str, supp: &str, hours_ago: i64) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            user_id: user.into(),
            supplement_id: supp.into(),
            dosage: 30.0,
            unit: DoseUnit::Mg,
            logged_at: Utc::now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_append_and_read_single_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("intake.jsonl");

        let entry = create_test_entry("alice", "zinc", 1);
        let entry_id = entry.id;

        let mut journal = JsonlJournal::new(&path);
        journal.append(&entry).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry_id);
    }

    #[test]
    fn test_append_multiple_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("intake.jsonl");

        let mut journal = JsonlJournal::new(&path);
        for _ in 0..5 {
            journal.append(&create_test_entry("alice", "zinc", 1)).unwrap();
        }

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn test_read_missing_journal_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nonexistent.jsonl");

        let entries = read_entries(&path).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("intake.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal.append(&create_test_entry("alice", "zinc", 1)).unwrap();

        use std::io::Write as _;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ not json }}").unwrap();

        journal.append(&create_test_entry("alice", "copper", 2)).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_log_store_window_filtering() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("intake.jsonl");

        let mut journal = JsonlJournal::new(&path);
        journal.append(&create_test_entry("alice", "zinc", 1)).unwrap();
        journal.append(&create_test_entry("alice", "copper", 3)).unwrap();
        journal.append(&create_test_entry("alice", "zinc", 48)).unwrap();
        journal.append(&create_test_entry("bob", "zinc", 1)).unwrap();

        let store = JournalLogStore::new(&path);
        let now = Utc::now();
        let logs = store
            .logs_in_range("alice", None, now - Duration::hours(24), now)
            .await
            .unwrap();

        assert_eq!(logs.len(), 2);
        // Newest first
        assert_eq!(logs[0].supplement_id, "zinc");
        assert_eq!(logs[1].supplement_id, "copper");
    }
}

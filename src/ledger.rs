//! Processed-UID ledger.
//!
//! A plain text file with one decimal UID per line. It is loaded once at
//! startup and appended to after every message whose attachments were
//! fully written, so an interrupted run never loses earlier progress.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SaveError};

/// File name of the ledger inside the destination directory.
pub const LEDGER_FILE_NAME: &str = "processed_uids.txt";

/// In-memory view of the ledger, backed by its file.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    uids: HashSet<u32>,
    /// The file's last line has no terminator (e.g. after a hand edit).
    unterminated: bool,
}

impl Ledger {
    /// Load the ledger at `path`.
    ///
    /// A missing file yields an empty ledger. Any line that is not a `u32`
    /// fails the whole load: a corrupt ledger is never partially trusted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No ledger yet, starting empty");
                return Ok(Self {
                    path,
                    uids: HashSet::new(),
                    unterminated: false,
                });
            }
            Err(e) => return Err(SaveError::io(&path, e)),
        };

        let mut uids = HashSet::new();
        for (idx, line) in contents.lines().enumerate() {
            let uid = line.parse::<u32>().map_err(|_| SaveError::LedgerParse {
                path: path.clone(),
                line: idx + 1,
                content: line.to_string(),
            })?;
            uids.insert(uid);
        }

        let unterminated = !contents.is_empty() && !contents.ends_with('\n');
        if unterminated {
            tracing::warn!(path = %path.display(), "Ledger lacks a final newline, will terminate it on next append");
        }

        tracing::info!(path = %path.display(), count = uids.len(), "Loaded ledger");
        Ok(Self {
            path,
            uids,
            unterminated,
        })
    }

    /// Load the ledger kept in `dest_dir`.
    pub fn load_in(dest_dir: &Path) -> Result<Self> {
        Self::load(dest_dir.join(LEDGER_FILE_NAME))
    }

    /// `true` if `uid` was already processed.
    pub fn contains(&self, uid: u32) -> bool {
        self.uids.contains(&uid)
    }

    /// Append `uid` to the ledger file, then remember it in memory.
    ///
    /// Each call opens, writes and closes the file on its own.
    /// An unterminated last line is closed first so the new UID never
    /// merges into it.
    pub fn record(&mut self, uid: u32) -> Result<()> {
        append_uid(&self.path, uid, self.unterminated)?;
        self.unterminated = false;
        self.uids.insert(uid);
        Ok(())
    }

    /// Number of processed UIDs.
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Append a single UID line, creating the file if needed.
fn append_uid(path: &Path, uid: u32, terminate_previous: bool) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SaveError::io(path, e))?;
    let line = if terminate_previous {
        format!("\n{uid}\n")
    } else {
        format!("{uid}\n")
    };
    file.write_all(line.as_bytes())
        .map_err(|e| SaveError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load_in(dir.path()).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_load_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), "3\n7\n12\n").unwrap();
        let ledger = Ledger::load_in(dir.path()).unwrap();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.contains(3));
        assert!(ledger.contains(7));
        assert!(ledger.contains(12));
        assert!(!ledger.contains(8));
    }

    #[test]
    fn test_crlf_lines_accepted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), "1\r\n2\r\n").unwrap();
        let ledger = Ledger::load_in(dir.path()).unwrap();
        assert!(ledger.contains(1));
        assert!(ledger.contains(2));
    }

    #[test]
    fn test_non_numeric_line_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), "3\nabc\n").unwrap();
        let err = Ledger::load_in(dir.path()).unwrap_err();
        match err {
            SaveError::LedgerParse { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), "4294967296\n").unwrap();
        assert!(matches!(
            Ledger::load_in(dir.path()),
            Err(SaveError::LedgerParse { .. })
        ));
    }

    #[test]
    fn test_record_appends_and_marks() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load_in(dir.path()).unwrap();
        ledger.record(42).unwrap();
        ledger.record(7).unwrap();
        assert!(ledger.contains(42));
        let contents = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(contents, "42\n7\n");
    }

    #[test]
    fn test_record_after_unterminated_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE_NAME);
        std::fs::write(&path, "3\n7\n12").unwrap();

        let mut ledger = Ledger::load(&path).unwrap();
        assert!(ledger.contains(12));
        ledger.record(8).unwrap();
        ledger.record(9).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n7\n12\n8\n9\n");

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 5);
        assert!(reloaded.contains(12));
        assert!(reloaded.contains(8));
        assert!(!reloaded.contains(128));
    }

    #[test]
    fn test_record_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("nope").join(LEDGER_FILE_NAME)).unwrap();
        assert!(matches!(ledger.record(1), Err(SaveError::Io { .. })));
        assert!(!ledger.contains(1));
    }
}

// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed synchronous key-value store.
//!
//! Backs the emergency shutdown snapshot, so every operation completes
//! without an executor: plain blocking writes, made atomic by writing a
//! temp file and renaming it over the target.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use chamber_core::{ChamberError, SyncKv};

/// Upper bound on a stored value. The emergency snapshot carries at most
/// 100 messages; anything larger than this is a caller bug.
pub const MAX_PAYLOAD_BYTES: usize = 1_048_576;

/// One file per key inside a dedicated directory.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ChamberError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(map_io_err)?;
        Ok(Self { dir })
    }

    /// Keys become file names, so only a conservative character set is
    /// allowed and the key must start with an alphanumeric.
    fn path_for(&self, key: &str) -> Result<PathBuf, ChamberError> {
        let valid = key.starts_with(|c: char| c.is_ascii_alphanumeric())
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid {
            return Err(ChamberError::Storage {
                source: Box::new(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("key {key:?} is not a safe file name"),
                )),
            });
        }
        Ok(self.dir.join(key))
    }
}

impl SyncKv for FileKv {
    fn set_item(&self, key: &str, value: &str) -> Result<(), ChamberError> {
        if value.len() > MAX_PAYLOAD_BYTES {
            return Err(ChamberError::Storage {
                source: Box::new(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "value for key {key:?} is {} bytes, limit is {MAX_PAYLOAD_BYTES}",
                        value.len()
                    ),
                )),
            });
        }
        let path = self.path_for(key)?;
        // Leading dot keeps the temp name out of the valid key namespace.
        let tmp = self.dir.join(format!(".{key}.tmp"));

        let mut file = File::create(&tmp).map_err(map_io_err)?;
        file.write_all(value.as_bytes()).map_err(map_io_err)?;
        file.sync_all().map_err(map_io_err)?;
        fs::rename(&tmp, &path).map_err(map_io_err)?;
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, ChamberError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_err(e)),
        }
    }

    fn remove_item(&self, key: &str) -> Result<(), ChamberError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_err(e)),
        }
    }
}

fn map_io_err(e: io::Error) -> ChamberError {
    ChamberError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_and_get_roundtrips() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        kv.set_item("rhythm_chamber_emergency_backup", r#"{"sessionId":"s1"}"#)
            .unwrap();
        assert_eq!(
            kv.get_item("rhythm_chamber_emergency_backup")
                .unwrap()
                .as_deref(),
            Some(r#"{"sessionId":"s1"}"#)
        );
    }

    #[test]
    fn get_missing_key_returns_none() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();
        assert!(kv.get_item("nothing_here").unwrap().is_none());
    }

    #[test]
    fn set_replaces_previous_value() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        kv.set_item("k", "first").unwrap();
        kv.set_item("k", "second").unwrap();
        assert_eq!(kv.get_item("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn remove_deletes_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        kv.set_item("k", "v").unwrap();
        kv.remove_item("k").unwrap();
        assert!(kv.get_item("k").unwrap().is_none());

        kv.remove_item("k").unwrap();
    }

    #[test]
    fn values_survive_a_reopen() {
        let dir = tempdir().unwrap();
        {
            let kv = FileKv::new(dir.path()).unwrap();
            kv.set_item("persisted", "still here").unwrap();
        }
        let kv = FileKv::new(dir.path()).unwrap();
        assert_eq!(kv.get_item("persisted").unwrap().as_deref(), Some("still here"));
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        for key in ["", "..", "a/b", "../escape", ".hidden", "sp ace"] {
            assert!(kv.set_item(key, "v").is_err(), "key {key:?} should be rejected");
            assert!(kv.get_item(key).is_err());
        }
    }

    #[test]
    fn oversized_values_are_rejected() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        let too_big = "x".repeat(MAX_PAYLOAD_BYTES + 1);
        assert!(kv.set_item("big", &too_big).is_err());
        assert!(kv.get_item("big").unwrap().is_none());

        let just_fits = "x".repeat(MAX_PAYLOAD_BYTES);
        kv.set_item("big", &just_fits).unwrap();
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();
        kv.set_item("k", "v").unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }
}

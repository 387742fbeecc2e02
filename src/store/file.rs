//! Durable file-backed slot
//!
//! Persists entries as TOML under the platform config directory. The file
//! holds tokens, so it gets restrictive 0600 permissions on unix.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use super::KeyValueStore;
use crate::error::AuthError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SlotFile {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Persistent store backed by a single TOML file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store under the platform config directory.
    pub fn open_default() -> Result<Self, AuthError> {
        let proj_dirs = ProjectDirs::from("com", "authwire", "authwire")
            .ok_or_else(|| AuthError::Storage("could not determine config directory".into()))?;
        Ok(Self {
            path: proj_dirs.config_dir().join("credentials.toml"),
        })
    }

    /// Store at an explicit path.
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// An unreadable or unparsable file reads as empty; writes will
    /// replace it.
    fn load(&self) -> SlotFile {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return SlotFile::default();
        };
        toml::from_str(&content).unwrap_or_default()
    }

    fn save(&self, slots: &SlotFile) -> Result<(), AuthError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| AuthError::Storage(format!("failed to create storage dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(slots)
            .map_err(|e| AuthError::Storage(format!("failed to serialize store: {}", e)))?;
        fs::write(&self.path, content)
            .map_err(|e| AuthError::Storage(format!("failed to write store: {}", e)))?;

        // Restrict permissions; the file contains tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .map_err(|e| AuthError::Storage(format!("failed to set permissions: {}", e)))?;
        }

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut slots = self.load();
        slots.entries.insert(key.to_string(), value.to_string());
        self.save(&slots)
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        let mut slots = self.load();
        if slots.entries.remove(key).is_some() {
            self.save(&slots)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::at_path(dir.path().join("credentials.toml"));

        store.set("refresh_credential", r#"{"username":"alice"}"#).unwrap();
        assert_eq!(
            store.get("refresh_credential").as_deref(),
            Some(r#"{"username":"alice"}"#)
        );

        // A new handle over the same path sees the persisted entry
        let reopened = FileStore::at_path(dir.path().join("credentials.toml"));
        assert!(reopened.get("refresh_credential").is_some());
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::at_path(dir.path().join("nope.toml"));
        assert!(store.get("refresh_credential").is_none());
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::at_path(dir.path().join("credentials.toml"));
        store.remove("refresh_credential").unwrap();
        assert!(!dir.path().join("credentials.toml").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_restricted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        let store = FileStore::at_path(path.clone());
        store.set("k", "v").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

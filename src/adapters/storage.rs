use crate::ports::{CredentialStorage, StorageError};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Credential slot backed by a single file.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let token = String::from_utf8(bytes).map_err(|_| StorageError::Encoding)?;
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Process-local slot; shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCredentialStorage {
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.to_string()))),
        }
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot.lock().expect("credential slot lock").clone())
    }

    fn save(&self, token: &str) -> Result<(), StorageError> {
        *self.slot.lock().expect("credential slot lock") = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.slot.lock().expect("credential slot lock").take();
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn temp_path(test_name: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        root.push(format!("bookhaven-{}-{}", test_name, nanos));
        root
    }

    #[test]
    fn file_storage__should_round_trip_and_clear() {
        // Given
        let root = temp_path("file-storage");
        let storage = FileCredentialStorage::new(root.join("nested").join("credential"));

        // When
        storage.save("header.payload.sig").expect("save");
        let loaded = storage.load().expect("load");
        storage.clear().expect("clear");

        // Then
        assert_eq!(loaded.as_deref(), Some("header.payload.sig"));
        assert_eq!(storage.load().expect("load after clear"), None);
        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn file_storage__should_treat_missing_and_blank_files_as_empty() {
        // Given
        let root = temp_path("file-storage-blank");
        std::fs::create_dir_all(&root).expect("create temp dir");
        let storage = FileCredentialStorage::new(root.join("credential"));

        // Then
        assert_eq!(storage.load().expect("load missing"), None);
        storage.clear().expect("clear missing");

        std::fs::write(storage.path(), "  \n").expect("write blank");
        assert_eq!(storage.load().expect("load blank"), None);
        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn memory_storage__should_share_slot_between_clones() {
        let storage = MemoryCredentialStorage::default();
        let other = storage.clone();

        storage.save("token").expect("save");

        assert_eq!(other.load().expect("load").as_deref(), Some("token"));
        other.clear().expect("clear");
        assert_eq!(storage.load().expect("load"), None);
    }
}

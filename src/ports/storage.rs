#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("credential storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored credential is not valid utf-8")]
    Encoding,
}

/// A single string slot holding the current credential.
pub trait CredentialStorage: Send + Sync + 'static {
    fn load(&self) -> Result<Option<String>, StorageError>;
    fn save(&self, token: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

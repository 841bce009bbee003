//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unable to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to decode YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Unable to YAML decode values file {}: {message}", path.display())]
    ValuesDecode { path: PathBuf, message: String },

    #[error("Unable to parse YAML data before decryption: {message}")]
    SecretParse { message: String },

    #[error("Unable to decrypt data with SOPS: {message}")]
    Decrypt { message: String },

    #[error("Decryption engine unavailable: {message}")]
    DecryptorUnavailable { message: String },

    #[error("Chart.yaml not found in {}", path.display())]
    ChartNotFound { path: PathBuf },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Attach the path of the file being processed
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        CoreError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error only says that an optional file or directory is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::ReadFile { source, .. } | CoreError::ReadDir { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

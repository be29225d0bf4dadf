use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TileSheetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to decode {}: {source}", path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// Malformed or schema-violating metadata. `origin` names the metadata file
    /// or the offending record.
    #[error("Corrupt metadata ({origin}): {reason}")]
    MetadataCorrupt { origin: String, reason: String },
    #[error("Missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("Failed to write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },
}

impl TileSheetError {
    pub(crate) fn corrupt(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataCorrupt {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TileSheetError>;

use std::path::Path;

use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::models::job::ArtifactKey;

/// Image extensions accepted for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ImageExtension {
    Png,
    Jpg,
    Jpeg,
    Gif,
}

/// Lower-cased extension of `filename`, including the leading dot.
///
/// Empty when the name has no extension. Hidden-file names such as `.png`
/// have no extension.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Check that `filename` names a supported image type.
pub fn validate_filename(filename: &str) -> Result<ImageExtension, ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| ValidationError::UnsupportedType(filename.to_string()))?;

    ext.parse::<ImageExtension>()
        .map_err(|_| ValidationError::UnsupportedType(filename.to_string()))
}

/// Content address of an upload: SHA-256 of the bytes followed by the
/// lower-cased extension of `filename`. The rest of the name is ignored.
pub fn address(bytes: &[u8], filename: &str) -> ArtifactKey {
    let digest = Sha256::digest(bytes);
    ArtifactKey::from_parts(&format!("{digest:x}"), &extension_of(filename))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file name provided")]
    MissingFilename,

    #[error("File type is not supported: {0}")]
    UnsupportedType(String),
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single classification job.
///
/// Generated fresh for every submission, so two uploads of the same image are
/// two jobs with two result slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Content address of a stored image: `{sha256 hex}{.ext}`.
///
/// Doubles as the storage filename and the `image_file_name` returned to
/// clients. Built by [`crate::services::address::address`]; deserialization
/// accepts any string, so stores must still validate keys read off the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub(crate) fn from_parts(digest_hex: &str, extension: &str) -> Self {
        Self(format!("{digest_hex}{extension}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArtifactKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Job payload serialized into the queue.
///
/// The artifact key travels as `image_name` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "image_name")]
    pub artifact_key: ArtifactKey,
}

impl Job {
    pub fn new(artifact_key: ArtifactKey) -> Self {
        Self {
            id: JobId::new(),
            artifact_key,
        }
    }
}

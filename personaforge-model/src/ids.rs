use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Identifier handed to clients for a video job.
///
/// Distinct from the provider-assigned external id, which is only ever used
/// for status polls against that provider.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ModelError::InvalidJobId(s.to_string()))
    }
}

/// Logical owner a job is scoped to (normally a persona id).
///
/// At most one job per owner may be in flight at a time. A persona can own
/// several independent keys through [`OwnerKey::scoped`]; persona ids may
/// not contain [`OwnerKey::SCOPE_SEPARATOR`] so scoped keys never collide
/// with a plain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerKey(String);

impl OwnerKey {
    pub const SCOPE_SEPARATOR: char = ':';

    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyOwnerKey);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Key for a persona id supplied by a client.
    pub fn persona(raw: impl Into<String>) -> Result<Self, ModelError> {
        let key = Self::new(raw)?;
        if key.0.contains(Self::SCOPE_SEPARATOR) {
            return Err(ModelError::ReservedOwnerCharacter(key.0));
        }
        Ok(key)
    }

    /// Separate key for `scope` work of the same owner, e.g. `ada:idle`.
    pub fn scoped(&self, scope: &str) -> Self {
        Self(format!("{}{}{scope}", self.0, Self::SCOPE_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerKey {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerKey> for String {
    fn from(key: OwnerKey) -> Self {
        key.0
    }
}

impl AsRef<str> for OwnerKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

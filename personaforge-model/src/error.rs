use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    EmptyOwnerKey,
    ReservedOwnerCharacter(String),
    UnknownQualityTier(String),
    UnknownJobKind(String),
    InvalidJobId(String),
    UnknownProvider(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyOwnerKey => {
                write!(f, "owner key must not be empty")
            }
            ModelError::ReservedOwnerCharacter(raw) => {
                write!(f, "owner key must not contain ':': {raw}")
            }
            ModelError::UnknownQualityTier(tier) => {
                write!(f, "unknown quality tier: {tier}")
            }
            ModelError::UnknownJobKind(kind) => {
                write!(f, "unknown job kind: {kind}")
            }
            ModelError::InvalidJobId(raw) => write!(f, "invalid job id: {raw}"),
            ModelError::UnknownProvider(name) => {
                write!(f, "unknown video provider: {name}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

use personaforge_model::{JobKind, ProviderKind};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is not configured")]
    NotConfigured { provider: ProviderKind },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Network {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned malformed JSON: {message}")]
    Decode {
        provider: ProviderKind,
        message: String,
    },

    #[error("{provider} reported unknown status {status:?}")]
    UnknownStatus {
        provider: ProviderKind,
        status: String,
    },

    #[error("{provider} completed without a recognizable video: {body}")]
    UnrecognizedOutput { provider: ProviderKind, body: String },

    #[error("{provider} does not support {kind} jobs")]
    Unsupported { provider: ProviderKind, kind: JobKind },

    #[error("{provider} {kind} job is missing {field}")]
    MissingInput {
        provider: ProviderKind,
        kind: JobKind,
        field: &'static str,
    },
}

impl ProviderError {
    /// Worth retrying on the next poll tick: transport failures, rate limits
    /// and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network { .. } => true,
            ProviderError::Http { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

use tracing::warn;

use super::session::StoreError;

/// Errors returned by [ExchangeEngine](super::ExchangeEngine) operations.
///
/// Collaborator failures are reduced to a kind and a fixed reason; their details are logged
/// where they occur and never returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: Resource, id: String },

    /// The session cannot accept the operation in its current state.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("verification unavailable: {0}")]
    VerificationUnavailable(String),

    /// A stored definition could not be rendered into a request.
    #[error("exchange '{exchange_id}' cannot be started: {reason}")]
    InvalidDefinition { exchange_id: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Exchange,
    Transaction,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Exchange => f.write_str("exchange"),
            Resource::Transaction => f.write_str("transaction"),
        }
    }
}

impl ExchangeError {
    pub(crate) fn exchange_not_found(id: &str) -> Self {
        ExchangeError::NotFound {
            kind: Resource::Exchange,
            id: id.to_owned(),
        }
    }

    pub(crate) fn transaction_not_found(id: &str) -> Self {
        ExchangeError::NotFound {
            kind: Resource::Transaction,
            id: id.to_owned(),
        }
    }

    pub(crate) fn verification_unavailable() -> Self {
        ExchangeError::VerificationUnavailable(
            "the presentation could not be verified at this time".into(),
        )
    }

    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::StoreUnavailable(_) | ExchangeError::VerificationUnavailable(_)
        )
    }
}

impl From<StoreError> for ExchangeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ExchangeError::transaction_not_found(&id),
            e @ StoreError::StaleState { .. } => ExchangeError::Conflict(e.to_string()),
            StoreError::AlreadyExists(id) => {
                warn!(transaction_id = %id, "session already exists");
                ExchangeError::StoreUnavailable("the session could not be created".into())
            }
            StoreError::Unavailable(e) => {
                warn!(error = ?e, "session store unavailable");
                ExchangeError::StoreUnavailable("the request could not be completed".into())
            }
        }
    }
}

//! Error types and result aliases shared across lakegate components.
//!
//! Errors are structured for programmatic handling: the ingest layer maps
//! these variants onto its request-facing taxonomy, so collaborator
//! implementations must pick the variant that reflects what actually
//! happened (absent vs. unreachable, rejected vs. timed out).

/// The result type used throughout lakegate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A named secret is absent from the secret store.
    #[error("secret not found: {name}")]
    SecretNotFound {
        /// The secret name that was looked up. Never the value.
        name: String,
    },

    /// An external service could not be reached or refused the call.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Which collaborator failed.
        service: &'static str,
        /// Description of the transport or auth failure.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An operation did not complete within its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new unavailable error for the named collaborator.
    #[must_use]
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    /// Creates a new secret-not-found error.
    #[must_use]
    pub fn secret_not_found(name: impl Into<String>) -> Self {
        Self::SecretNotFound { name: name.into() }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

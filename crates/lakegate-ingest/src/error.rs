//! The ingest error taxonomy.
//!
//! Every failure in the workflow is one of these kinds. The HTTP layer
//! pattern-matches on the kind for status mapping; [`IngestError::code`]
//! provides the stable machine-readable code for the error envelope.
//!
//! Messages never contain secret values: secret failures carry the secret
//! *name* only, and job arguments are redacted before they can reach an
//! error path.

/// Errors produced by the ingestion workflow.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// No file field was present, or the filename/body was empty.
    #[error("no archive file was supplied")]
    EmptyUpload,

    /// The uploaded bytes are not a valid ZIP container.
    #[error("uploaded file is not a valid archive: {message}")]
    MalformedArchive {
        /// What made the container invalid.
        message: String,
    },

    /// A member's extension is outside the configured allow-list.
    ///
    /// Raised before any upload begins; the whole request is rejected.
    #[error("archive member {member} has a disallowed type (allowed: {allowed})")]
    DisallowedMemberType {
        /// Offending member path.
        member: String,
        /// Render of the allow-list for the client.
        allowed: String,
    },

    /// The secret store reports the name is absent.
    #[error("secret {name} was not found in the secret store")]
    SecretNotFound {
        /// The secret name. Never the value.
        name: String,
    },

    /// The secret store could not be reached or refused the call.
    #[error("secret store unavailable: {message}")]
    SecretStoreUnavailable {
        /// Transport/auth failure description.
        message: String,
    },

    /// A member could not be written to the object store.
    ///
    /// Members staged before this one remain in the store; members after it
    /// were never attempted.
    #[error("upload failed for member {member}: {message}")]
    UploadFailed {
        /// The member whose upload failed.
        member: String,
        /// The storage failure description.
        message: String,
    },

    /// The compute service rejected the descriptor at submit time.
    #[error("job submission rejected: {message}")]
    JobSubmissionFailed {
        /// The rejection description.
        message: String,
    },

    /// The job reached a failure terminal state.
    #[error("job execution failed: {message}")]
    JobExecutionFailed {
        /// The failure description (service-reported state).
        message: String,
    },

    /// No terminal state was observed within the configured wait bound.
    #[error("timed out after {seconds}s waiting for job completion")]
    Timeout {
        /// The wait bound that was exceeded.
        seconds: u64,
    },
}

impl IngestError {
    /// Stable machine-readable code for the error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyUpload => "EMPTY_UPLOAD",
            Self::MalformedArchive { .. } => "MALFORMED_ARCHIVE",
            Self::DisallowedMemberType { .. } => "DISALLOWED_MEMBER_TYPE",
            Self::SecretNotFound { .. } => "SECRET_NOT_FOUND",
            Self::SecretStoreUnavailable { .. } => "SECRET_STORE_UNAVAILABLE",
            Self::UploadFailed { .. } => "UPLOAD_FAILED",
            Self::JobSubmissionFailed { .. } => "JOB_SUBMISSION_FAILED",
            Self::JobExecutionFailed { .. } => "JOB_EXECUTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// The workflow step this error terminated in, for logging.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::EmptyUpload | Self::MalformedArchive { .. }
            | Self::DisallowedMemberType { .. } => "validating",
            Self::UploadFailed { .. } => "staging",
            Self::SecretNotFound { .. } | Self::SecretStoreUnavailable { .. } => {
                "secret_resolution"
            }
            Self::JobSubmissionFailed { .. }
            | Self::JobExecutionFailed { .. }
            | Self::Timeout { .. } => "dispatching",
        }
    }
}

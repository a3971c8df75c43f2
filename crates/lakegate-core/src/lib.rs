//! # lakegate-core
//!
//! Core abstractions for the lakegate ingestion service.
//!
//! This crate provides the foundational types and traits used across all
//! lakegate components:
//!
//! - **Error Types**: Shared error definitions and result types
//! - **Storage**: Abstract hierarchical object store interface
//! - **Secrets**: Secret store interface with redacting value wrapper
//! - **Jobs**: Batch compute job submission and terminal-state waiting
//! - **Identity**: Bearer token acquisition for the managed collaborators
//! - **Observability**: Structured logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `lakegate-core` is the **only** crate allowed to define the external
//! collaborator seams. The three service handles (object store, secret
//! store, batch job service) are constructed once at process start and
//! shared read-only across concurrently handled requests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod identity;
pub mod jobs;
pub mod observability;
pub mod secrets;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::identity::TokenSource;
    pub use crate::jobs::{
        BatchJobService, JobDescriptor, JobHandle, JobOutcome, JobScript, JobState,
        MemoryJobService, SparkBatchClient,
    };
    pub use crate::secrets::{KeyVaultClient, MemorySecretStore, SecretStore, SecretValue};
    pub use crate::storage::{AdlsStore, MemoryStore, ObjectMeta, ObjectStore};
}

pub use error::{Error, Result};
pub use identity::TokenSource;
pub use jobs::{
    BatchJobService, JobDescriptor, JobHandle, JobOutcome, JobScript, JobState, MemoryJobService,
    SparkBatchClient,
};
pub use observability::{init_logging, ingest_span, LogFormat};
pub use secrets::{KeyVaultClient, MemorySecretStore, SecretStore, SecretValue};
pub use storage::{AdlsStore, MemoryStore, ObjectMeta, ObjectStore};

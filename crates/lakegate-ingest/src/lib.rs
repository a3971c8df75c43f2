//! # lakegate-ingest
//!
//! The archive-ingestion-and-remote-dispatch workflow: the ordered sequence
//! of validation, staging, and job-submission steps, together with its
//! failure-handling contract.
//!
//! Components, leaf-first:
//!
//! - [`archive`]: inspects an uploaded byte stream, confirms it is a
//!   well-formed ZIP, and enforces a member-type allow-list
//! - [`secrets`]: per-request resolution of named credentials
//! - [`stage`]: uploads validated members to the object store, preserving
//!   relative paths
//! - [`dispatch`]: submits a batch job and waits for a terminal state
//! - [`workflow`]: the orchestrator sequencing the above
//!
//! Data flows one way: archive bytes → validated member set → staged
//! objects → job arguments → job outcome. Nothing here holds state across
//! requests; the collaborator handles are injected read-only.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod archive;
pub mod dispatch;
pub mod error;
pub mod secrets;
pub mod stage;
pub mod workflow;

pub use archive::{AllowList, ArchiveMember};
pub use error::IngestError;
pub use stage::StagingTarget;
pub use workflow::{IngestReport, IngestWorkflow, JobTemplate, UploadRequest, WorkflowConfig};

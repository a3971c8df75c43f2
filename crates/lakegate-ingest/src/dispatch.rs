//! Job dispatch: submit, then wait for a terminal state.
//!
//! Submission failure, execution failure, and wait-bound expiry are three
//! distinct kinds so that operators can tell a rejected descriptor from a
//! job that ran and died. Once submitted the job is out of our hands: a
//! timeout here does not cancel anything remotely.

use std::time::Duration;

use tracing::info;

use lakegate_core::{BatchJobService, Error, JobDescriptor, JobHandle, JobState};

use crate::error::IngestError;

/// Submits the descriptor and waits up to `timeout` for success.
///
/// Returns the handle of the successfully completed job.
///
/// # Errors
///
/// - [`IngestError::JobSubmissionFailed`] if the service rejects the
///   descriptor or cannot be reached at submit time
/// - [`IngestError::JobExecutionFailed`] if the terminal state is failure,
///   or if the wait itself fails mid-flight
/// - [`IngestError::Timeout`] if no terminal state is observed in time
pub async fn dispatch(
    jobs: &dyn BatchJobService,
    descriptor: JobDescriptor,
    timeout: Duration,
) -> Result<JobHandle, IngestError> {
    let handle = jobs
        .submit(&descriptor)
        .await
        .map_err(|e| IngestError::JobSubmissionFailed {
            message: e.to_string(),
        })?;
    info!(job_id = %handle, name = %descriptor.name, "batch job submitted");

    let outcome = jobs
        .wait_for_terminal(&handle, timeout)
        .await
        .map_err(|e| match e {
            Error::Timeout(_) => IngestError::Timeout {
                seconds: timeout.as_secs(),
            },
            other => IngestError::JobExecutionFailed {
                message: other.to_string(),
            },
        })?;

    match outcome.state {
        JobState::Succeeded => {
            info!(job_id = %handle, "batch job succeeded");
            Ok(handle)
        }
        JobState::Failed => Err(IngestError::JobExecutionFailed {
            message: outcome
                .detail
                .unwrap_or_else(|| "failure terminal state".to_string()),
        }),
    }
}

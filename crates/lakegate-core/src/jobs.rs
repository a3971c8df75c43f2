//! Batch compute job submission and terminal-state waiting.
//!
//! A job is submitted once, immutable after submission, and runs remotely
//! to a terminal state. The caller can only wait; no cancellation is
//! exposed. The production implementation targets the Synapse Livy batch
//! surface (`POST .../batches`, then `GET .../batches/{id}` until a
//! terminal state is observed or the wait bound expires).

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::identity::TokenSource;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Description of a batch compute job.
///
/// Immutable once submitted. Positional arguments are secret-derived, so
/// `Debug` redacts them.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Job name shown by the compute service.
    pub name: String,
    /// Entry-point file reference (e.g. an abfss/dbfs path to a script).
    pub file: String,
    /// Driver memory (e.g. `28g`).
    pub driver_memory: String,
    /// Executor memory (e.g. `28g`).
    pub executor_memory: String,
    /// Number of executors.
    pub num_executors: u32,
    /// Engine configuration key-value set.
    pub conf: BTreeMap<String, String>,
    /// Positional arguments, derived from resolved secrets.
    pub arguments: Vec<String>,
}

impl std::fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("driver_memory", &self.driver_memory)
            .field("executor_memory", &self.executor_memory)
            .field("num_executors", &self.num_executors)
            .field("conf", &self.conf)
            .field("arguments", &format_args!("[{} REDACTED]", self.arguments.len()))
            .finish()
    }
}

/// Handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
}

impl JobHandle {
    /// Creates a handle from a service-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Returns the service-assigned job id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// The job finished successfully.
    Succeeded,
    /// The job reached a failure terminal state.
    Failed,
}

/// Outcome observed after waiting for a terminal state.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Terminal state.
    pub state: JobState,
    /// Service-reported state string, for diagnostics.
    pub detail: Option<String>,
}

/// Batch job service contract.
#[async_trait]
pub trait BatchJobService: Send + Sync + 'static {
    /// Submits the descriptor.
    ///
    /// Returns `Error::InvalidInput` if the service rejects the descriptor,
    /// `Error::Unavailable` on transport failure.
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle>;

    /// Blocks until a terminal state is observed or `timeout` expires.
    ///
    /// Returns `Error::Timeout` when the bound is exceeded; the remote job
    /// keeps running in that case.
    async fn wait_for_terminal(&self, handle: &JobHandle, timeout: Duration) -> Result<JobOutcome>;
}

// ============================================================================
// In-memory implementation (tests / debug mode)
// ============================================================================

/// Scripted behavior for [`MemoryJobService`].
#[derive(Debug, Clone)]
pub enum JobScript {
    /// Accept the submission and report success.
    Succeed,
    /// Accept the submission and report a failed terminal state.
    FailExecution(String),
    /// Reject the descriptor at submit time.
    RejectSubmit(String),
    /// Accept the submission but never reach a terminal state.
    NeverFinish,
}

/// In-memory job service for testing and debug mode.
///
/// Records submitted descriptors so tests can assert on ordering
/// invariants (e.g. "dispatch never ran").
#[derive(Debug)]
pub struct MemoryJobService {
    script: JobScript,
    submitted: Mutex<Vec<JobDescriptor>>,
}

impl Default for MemoryJobService {
    fn default() -> Self {
        Self::new(JobScript::Succeed)
    }
}

impl MemoryJobService {
    /// Creates a service with the given scripted behavior.
    #[must_use]
    pub fn new(script: JobScript) -> Self {
        Self {
            script,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Number of submissions received.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.submitted.lock().expect("lock poisoned").len()
    }

    /// Returns the submitted descriptors.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn submitted(&self) -> Vec<JobDescriptor> {
        self.submitted.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl BatchJobService for MemoryJobService {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle> {
        if let JobScript::RejectSubmit(message) = &self.script {
            return Err(Error::InvalidInput(message.clone()));
        }
        let mut submitted = self.submitted.lock().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        submitted.push(descriptor.clone());
        Ok(JobHandle::new(submitted.len().to_string()))
    }

    async fn wait_for_terminal(&self, _handle: &JobHandle, timeout: Duration) -> Result<JobOutcome> {
        match &self.script {
            JobScript::Succeed => Ok(JobOutcome {
                state: JobState::Succeeded,
                detail: Some("success".to_string()),
            }),
            JobScript::FailExecution(state) => Ok(JobOutcome {
                state: JobState::Failed,
                detail: Some(state.clone()),
            }),
            JobScript::NeverFinish => {
                tokio::time::sleep(timeout).await;
                Err(Error::Timeout(format!(
                    "no terminal state within {}s",
                    timeout.as_secs()
                )))
            }
            JobScript::RejectSubmit(_) => Err(Error::internal("wait called without submission")),
        }
    }
}

// ============================================================================
// Spark batch (Livy) implementation
// ============================================================================

/// Livy batch submission payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LivyBatchRequest<'a> {
    name: &'a str,
    file: &'a str,
    driver_memory: &'a str,
    executor_memory: &'a str,
    num_executors: u32,
    conf: &'a BTreeMap<String, String>,
    args: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LivyBatchResponse {
    id: i64,
    #[serde(default)]
    state: Option<String>,
}

/// HTTP client for a Spark batch (Livy) endpoint.
///
/// `base_url` addresses the batches collection, e.g.
/// `https://{workspace}.dev.azuresynapse.net/livyApi/versions/2019-11-01-preview/sparkPools/{pool}/batches`.
#[derive(Debug, Clone)]
pub struct SparkBatchClient {
    base_url: String,
    client: Client,
    token: TokenSource,
    poll_interval: Duration,
}

impl SparkBatchClient {
    /// Creates a client targeting the given batches collection URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: TokenSource) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into(),
            client,
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn batches_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    fn batch_url(&self, handle: &JobHandle) -> String {
        format!("{}/{}", self.batches_url(), handle.id())
    }

    /// Maps a Livy state string to a terminal outcome, if terminal.
    fn terminal_outcome(state: &str) -> Option<JobOutcome> {
        match state {
            "success" => Some(JobOutcome {
                state: JobState::Succeeded,
                detail: Some(state.to_string()),
            }),
            "dead" | "error" | "killed" => Some(JobOutcome {
                state: JobState::Failed,
                detail: Some(state.to_string()),
            }),
            _ => None,
        }
    }

    async fn fetch_state(&self, handle: &JobHandle) -> Result<Option<String>> {
        let token = self.token.token(&self.client).await?;
        let response = self
            .client
            .get(self.batch_url(handle))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| {
                Error::unavailable("spark batch", format!("state request failed: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(Error::unavailable(
                "spark batch",
                format!("state request returned {}", response.status()),
            ));
        }

        let body: LivyBatchResponse = response.json().await.map_err(|e| {
            Error::unavailable("spark batch", format!("invalid state response: {e}"))
        })?;
        Ok(body.state)
    }
}

#[async_trait]
impl BatchJobService for SparkBatchClient {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle> {
        let token = self.token.token(&self.client).await?;
        let payload = LivyBatchRequest {
            name: &descriptor.name,
            file: &descriptor.file,
            driver_memory: &descriptor.driver_memory,
            executor_memory: &descriptor.executor_memory,
            num_executors: descriptor.num_executors,
            conf: &descriptor.conf,
            args: &descriptor.arguments,
        };

        let response = self
            .client
            .post(self.batches_url())
            .bearer_auth(token.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::unavailable("spark batch", format!("submit request failed: {e}"))
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidInput(format!(
                "job submission rejected ({status}): {body}"
            )));
        }
        if !status.is_success() {
            return Err(Error::unavailable(
                "spark batch",
                format!("submit request returned {status}"),
            ));
        }

        let body: LivyBatchResponse = response.json().await.map_err(|e| {
            Error::unavailable("spark batch", format!("invalid submit response: {e}"))
        })?;
        Ok(JobHandle::new(body.id.to_string()))
    }

    async fn wait_for_terminal(&self, handle: &JobHandle, timeout: Duration) -> Result<JobOutcome> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(state) = self.fetch_state(handle).await? {
                if let Some(outcome) = Self::terminal_outcome(&state) {
                    return Ok(outcome);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!(
                    "job {} reached no terminal state within {}s",
                    handle.id(),
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

//! The request orchestrator.
//!
//! One workflow run per inbound request, strictly ordered:
//! validate → stage → resolve secrets → dispatch. Any step error is
//! terminal; nothing after the failing step runs. The collaborator handles
//! are injected read-only and shared across concurrent runs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use lakegate_core::{BatchJobService, JobDescriptor, ObjectStore, SecretStore};

use crate::archive::{self, AllowList};
use crate::dispatch;
use crate::error::IngestError;
use crate::secrets;
use crate::stage::{self, StagingTarget};

/// The inbound upload: declared filename plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Filename declared by the client.
    pub filename: String,
    /// Raw archive bytes.
    pub bytes: Bytes,
}

/// Template for the batch job submitted per request.
///
/// Resource sizing and the entry-point reference are fixed configuration;
/// only the positional arguments vary (they carry the resolved secrets).
#[derive(Debug, Clone)]
pub struct JobTemplate {
    /// Job name shown by the compute service.
    pub name: String,
    /// Entry-point file reference.
    pub file: String,
    /// Driver memory.
    pub driver_memory: String,
    /// Executor memory.
    pub executor_memory: String,
    /// Number of executors.
    pub num_executors: u32,
    /// Engine configuration key-value set.
    pub conf: std::collections::BTreeMap<String, String>,
}

impl JobTemplate {
    /// The model-training job template for a workspace, mirroring the
    /// deployed entry-point naming convention.
    #[must_use]
    pub fn model_training(workspace_name: &str) -> Self {
        let conf = [
            (
                "spark.jars.packages".to_string(),
                "com.microsoft.ml.spark:com.microsoft.azure:1.0.0-rc3".to_string(),
            ),
            (
                "spark.databricks.delta.preview.enabled".to_string(),
                "true".to_string(),
            ),
        ]
        .into_iter()
        .collect();
        Self {
            name: "model-training-job".to_string(),
            file: format!("/mnt/data/code/{workspace_name}-model-training-job.py"),
            driver_memory: "28g".to_string(),
            executor_memory: "28g".to_string(),
            num_executors: 3,
            conf,
        }
    }

    /// Builds the immutable descriptor for one submission.
    #[must_use]
    pub fn descriptor(&self, arguments: Vec<String>) -> JobDescriptor {
        JobDescriptor {
            name: self.name.clone(),
            file: self.file.clone(),
            driver_memory: self.driver_memory.clone(),
            executor_memory: self.executor_memory.clone(),
            num_executors: self.num_executors,
            conf: self.conf.clone(),
            arguments,
        }
    }
}

/// Workflow configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Member-type allow-list.
    pub allow_list: AllowList,
    /// Staging destination within the store's file system.
    pub staging: StagingTarget,
    /// Name of the model-id secret.
    pub model_id_secret: String,
    /// Name of the api-key secret.
    pub api_key_secret: String,
    /// Job template.
    pub job: JobTemplate,
    /// Upper bound on the job wait.
    pub job_wait_timeout: Duration,
}

/// Report returned on a completed run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Number of members staged (zero when the archive had no members).
    pub staged: usize,
    /// Service-assigned id of the completed job.
    pub job_id: String,
}

/// The orchestrator: sequences validation, staging, secret resolution, and
/// dispatch over the three injected collaborators.
pub struct IngestWorkflow {
    store: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    jobs: Arc<dyn BatchJobService>,
    config: WorkflowConfig,
}

impl std::fmt::Debug for IngestWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestWorkflow")
            .field("store", &"<ObjectStore>")
            .field("secrets", &"<SecretStore>")
            .field("jobs", &"<BatchJobService>")
            .field("config", &self.config)
            .finish()
    }
}

impl IngestWorkflow {
    /// Creates a workflow over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        jobs: Arc<dyn BatchJobService>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            secrets,
            jobs,
            config,
        }
    }

    /// Runs one ingest request to completion.
    ///
    /// # Errors
    ///
    /// Returns the [`IngestError`] of the step that terminated the run; see
    /// the taxonomy in [`crate::error`].
    pub async fn run(&self, upload: UploadRequest) -> Result<IngestReport, IngestError> {
        if upload.filename.trim().is_empty() || upload.bytes.is_empty() {
            return Err(IngestError::EmptyUpload);
        }

        let members = archive::validate(&upload.bytes, &self.config.allow_list)?;
        debug!(
            filename = %upload.filename,
            members = members.len(),
            "archive validated"
        );

        // An archive with no members skips staging; staging a present
        // member set must complete before any secret is fetched.
        let staged = if members.is_empty() {
            0
        } else {
            let staged = stage::stage(&*self.store, &self.config.staging, &members).await?;
            info!(staged, directory = %self.config.staging.directory, "members staged");
            staged
        };

        let resolved = secrets::resolve(
            &*self.secrets,
            &[&self.config.model_id_secret, &self.config.api_key_secret],
        )
        .await?;
        let arguments = vec![
            resolved[&self.config.model_id_secret].expose().to_string(),
            resolved[&self.config.api_key_secret].expose().to_string(),
        ];

        let descriptor = self.config.job.descriptor(arguments);
        let handle =
            dispatch::dispatch(&*self.jobs, descriptor, self.config.job_wait_timeout).await?;

        Ok(IngestReport {
            staged,
            job_id: handle.id().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use lakegate_core::{JobScript, MemoryJobService, MemorySecretStore, MemoryStore};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Bytes {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(content).expect("write content");
        }
        Bytes::from(writer.finish().expect("finish zip").into_inner())
    }

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            allow_list: AllowList::default(),
            staging: StagingTarget::new("staging/input"),
            model_id_secret: "model-id".to_string(),
            api_key_secret: "api-key".to_string(),
            job: JobTemplate::model_training("ws-test"),
            job_wait_timeout: Duration::from_secs(1),
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        jobs: Arc<MemoryJobService>,
        workflow: IngestWorkflow,
    }

    fn harness(script: JobScript, with_secrets: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(MemoryJobService::new(script));
        let secrets = if with_secrets {
            MemorySecretStore::new()
                .with_secret("model-id", "m-42")
                .with_secret("api-key", "k-7")
        } else {
            MemorySecretStore::new()
        };
        let workflow = IngestWorkflow::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::new(secrets),
            Arc::clone(&jobs) as Arc<dyn BatchJobService>,
            config(),
        );
        Harness {
            store,
            jobs,
            workflow,
        }
    }

    fn upload(bytes: Bytes) -> UploadRequest {
        UploadRequest {
            filename: "data.zip".to_string(),
            bytes,
        }
    }

    #[tokio::test]
    async fn two_csv_members_stage_and_dispatch_succeeds() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("train.csv", b"a,b\n1,2\n"), ("eval.csv", b"a,b\n3,4\n")]);

        let report = h.workflow.run(upload(zip)).await.unwrap();
        assert_eq!(report.staged, 2);
        assert_eq!(report.job_id, "1");

        // Exactly two objects at the configured directory, exact bytes.
        let listed = h.store.list("staging/input/").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(
            h.store.get("staging/input/train.csv").await.unwrap(),
            Bytes::from_static(b"a,b\n1,2\n")
        );

        // Job arguments carry the resolved secret values, in order.
        let submitted = h.jobs.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].arguments, vec!["m-42", "k-7"]);
    }

    #[tokio::test]
    async fn disallowed_member_stages_nothing() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("good.csv", b"x"), ("payload.exe", b"MZ")]);

        let err = h.workflow.run(upload(zip)).await.unwrap_err();
        assert_eq!(err.code(), "DISALLOWED_MEMBER_TYPE");

        // All-or-nothing: zero uploads, no dispatch.
        assert!(h.store.list("").await.unwrap().is_empty());
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn resubmission_leaves_same_final_object_set() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("a.csv", b"1"), ("b.csv", b"2")]);

        h.workflow.run(upload(zip.clone())).await.unwrap();
        h.workflow.run(upload(zip)).await.unwrap();

        let listed = h.store.list("staging/input/").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn secret_failure_never_reaches_dispatcher() {
        let h = harness(JobScript::Succeed, false);
        let zip = build_zip(&[("a.csv", b"1")]);

        let err = h.workflow.run(upload(zip)).await.unwrap_err();
        assert_eq!(err.code(), "SECRET_NOT_FOUND");
        assert_eq!(h.jobs.submit_count(), 0);

        // Staging had already completed when resolution failed.
        assert!(h
            .store
            .head("staging/input/a.csv")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn empty_body_is_empty_upload() {
        let h = harness(JobScript::Succeed, true);
        let err = h.workflow.run(upload(Bytes::new())).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyUpload));
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn empty_filename_is_empty_upload() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("a.csv", b"1")]);
        let err = h
            .workflow
            .run(UploadRequest {
                filename: "  ".to_string(),
                bytes: zip,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyUpload));
    }

    #[tokio::test]
    async fn non_zip_bytes_stage_nothing() {
        let h = harness(JobScript::Succeed, true);
        let err = h
            .workflow
            .run(upload(Bytes::from_static(b"not a zip at all")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_ARCHIVE");
        assert!(h.store.list("").await.unwrap().is_empty());
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn memberless_archive_skips_staging_but_dispatches() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[]);

        let report = h.workflow.run(upload(zip)).await.unwrap();
        assert_eq!(report.staged, 0);
        assert!(h.store.list("").await.unwrap().is_empty());
        assert_eq!(h.jobs.submit_count(), 1);
    }

    #[tokio::test]
    async fn failed_job_reports_execution_failure() {
        let h = harness(JobScript::FailExecution("dead".to_string()), true);
        let zip = build_zip(&[("a.csv", b"1")]);

        let err = h.workflow.run(upload(zip)).await.unwrap_err();
        assert_eq!(err.code(), "JOB_EXECUTION_FAILED");
        assert!(err.to_string().contains("dead"));
    }

    #[tokio::test]
    async fn job_template_mirrors_training_defaults() {
        let template = JobTemplate::model_training("acme");
        assert_eq!(template.file, "/mnt/data/code/acme-model-training-job.py");
        assert_eq!(template.driver_memory, "28g");
        assert_eq!(template.num_executors, 3);
        assert!(template.conf.contains_key("spark.jars.packages"));
    }
}

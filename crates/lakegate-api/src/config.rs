//! Server configuration.
//!
//! All configuration is env-sourced. The Azure-facing variables keep the
//! names the deployment already uses; operational knobs are prefixed with
//! `LAKEGATE_`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use lakegate_core::{Error, Result};
use lakegate_ingest::{AllowList, JobTemplate, StagingTarget, WorkflowConfig};

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;
const DEFAULT_JOB_WAIT_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_JOB_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_DEBUG_WORKSPACE: &str = "dev";

/// Livy API version used for Spark batch submission.
const LIVY_API_VERSION: &str = "2019-11-01-preview";

/// Key Vault configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Full vault URL (e.g. `https://my-vault.vault.azure.net`).
    #[serde(default)]
    pub url: Option<String>,
}

/// Synapse workspace configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynapseConfig {
    /// Workspace development endpoint
    /// (e.g. `https://my-workspace.dev.azuresynapse.net`).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Workspace name; names the job entry-point file.
    #[serde(default)]
    pub workspace_name: Option<String>,
    /// Spark pool the batch job runs on.
    #[serde(default)]
    pub spark_pool: Option<String>,
}

impl SynapseConfig {
    /// URL of the Livy batches collection for the configured pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or pool is not configured.
    pub fn livy_batches_url(&self) -> Result<String> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            Error::InvalidInput("SYNAPSE_WORKSPACE_ENDPOINT is not configured".to_string())
        })?;
        let pool = self.spark_pool.as_deref().ok_or_else(|| {
            Error::InvalidInput("SPARK_POOL_NAME is not configured".to_string())
        })?;
        Ok(format!(
            "{}/livyApi/versions/{LIVY_API_VERSION}/sparkPools/{pool}/batches",
            endpoint.trim_end_matches('/')
        ))
    }
}

/// Data lake storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage account name.
    #[serde(default)]
    pub account_name: Option<String>,
    /// File system (container) within the account.
    #[serde(default)]
    pub file_system: Option<String>,
    /// Directory prefix archive members are staged under.
    #[serde(default)]
    pub directory: String,
}

/// Names of the secrets the workflow resolves. Names only, never values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretNamesConfig {
    /// Secret holding the model identifier passed to the job.
    #[serde(default = "default_model_id_secret")]
    pub model_id: String,
    /// Secret holding the API key passed to the job.
    #[serde(default = "default_api_key_secret")]
    pub api_key: String,
    /// Secret holding the storage account access key, resolved at startup.
    #[serde(default)]
    pub storage_account_key: Option<String>,
    /// Secret holding the storage account name, resolved at startup when
    /// the account name is not configured directly.
    #[serde(default)]
    pub storage_account_name: Option<String>,
    /// Secret holding the data lake connection string, resolved at startup.
    #[serde(default)]
    pub datalake_connection_string: Option<String>,
    /// Secret holding the storage connection string, resolved at startup.
    #[serde(default)]
    pub storage_connection_string: Option<String>,
}

impl SecretNamesConfig {
    /// Name of the connection-string secret to resolve at startup, if any.
    /// The data-lake specific name takes precedence.
    #[must_use]
    pub fn connection_string(&self) -> Option<&str> {
        self.datalake_connection_string
            .as_deref()
            .or(self.storage_connection_string.as_deref())
    }
}

fn default_model_id_secret() -> String {
    "model-id".to_string()
}

fn default_api_key_secret() -> String {
    "api-key".to_string()
}

impl Default for SecretNamesConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id_secret(),
            api_key: default_api_key_secret(),
            storage_account_key: None,
            storage_account_name: None,
            datalake_connection_string: None,
            storage_connection_string: None,
        }
    }
}

/// Configuration for the lakegate API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled, the server wires in-memory collaborators instead of the
    /// Azure clients and logs in a human-readable format.
    pub debug: bool,

    /// Allowed archive member extensions.
    pub allowed_extensions: Vec<String>,

    /// Upper bound on the request body size.
    pub max_upload_bytes: usize,

    /// Upper bound on the job wait, in seconds.
    pub job_wait_timeout_secs: u64,

    /// Interval between job state polls, in seconds.
    pub job_poll_interval_secs: u64,

    /// Key Vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Synapse workspace settings.
    #[serde(default)]
    pub synapse: SynapseConfig,

    /// Data lake settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Secret names the workflow resolves.
    #[serde(default)]
    pub secret_names: SecretNamesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            debug: false,
            allowed_extensions: vec!["csv".to_string(), "json".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            job_wait_timeout_secs: DEFAULT_JOB_WAIT_TIMEOUT_SECS,
            job_poll_interval_secs: DEFAULT_JOB_POLL_INTERVAL_SECS,
            vault: VaultConfig::default(),
            synapse: SynapseConfig::default(),
            storage: StorageConfig::default(),
            secret_names: SecretNamesConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `LAKEGATE_HTTP_PORT`
    /// - `LAKEGATE_DEBUG`
    /// - `LAKEGATE_ALLOWED_EXTENSIONS` (comma-separated)
    /// - `LAKEGATE_MAX_UPLOAD_BYTES`
    /// - `LAKEGATE_JOB_WAIT_TIMEOUT_SECS`
    /// - `LAKEGATE_JOB_POLL_INTERVAL_SECS`
    /// - `KEY_VAULT_URL` / `KEY_VAULT_NAME`
    /// - `SYNAPSE_WORKSPACE_ENDPOINT` / `SYNAPSE_WORKSPACE_NAME`
    /// - `SPARK_POOL_NAME`
    /// - `STORAGE_ACCOUNT_NAME`
    /// - `FILE_SYSTEM_NAME`
    /// - `DIRECTORY_NAME`
    /// - `MODEL_ID_SECRET_NAME`
    /// - `API_KEY_SECRET_NAME`
    /// - `STORAGE_ACCOUNT_KEY_SECRET_NAME`
    /// - `STORAGE_ACCOUNT_NAME_SECRET_NAME`
    /// - `DATALAKE_CONNECTION_STRING_SECRET_NAME`
    /// - `STORAGE_CONNECTION_STRING_SECRET_NAME`
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed, or
    /// if a variable required outside debug mode is missing.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("LAKEGATE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("LAKEGATE_DEBUG")? {
            config.debug = debug;
        }
        if let Some(extensions) = env_string("LAKEGATE_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = parse_extensions(&extensions);
        }
        if let Some(bytes) = env_usize("LAKEGATE_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }
        if let Some(secs) = env_u64("LAKEGATE_JOB_WAIT_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "LAKEGATE_JOB_WAIT_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.job_wait_timeout_secs = secs;
        }
        if let Some(secs) = env_u64("LAKEGATE_JOB_POLL_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(Error::InvalidInput(
                    "LAKEGATE_JOB_POLL_INTERVAL_SECS must be greater than 0".to_string(),
                ));
            }
            config.job_poll_interval_secs = secs;
        }

        config.vault.url = vault_url_from_values(
            env_string("KEY_VAULT_URL").as_deref(),
            env_string("KEY_VAULT_NAME").as_deref(),
        );

        config.synapse.workspace_name = env_string("SYNAPSE_WORKSPACE_NAME");
        config.synapse.endpoint = synapse_endpoint_from_values(
            env_string("SYNAPSE_WORKSPACE_ENDPOINT").as_deref(),
            config.synapse.workspace_name.as_deref(),
        );
        config.synapse.spark_pool = env_string("SPARK_POOL_NAME");

        config.storage.account_name = env_string("STORAGE_ACCOUNT_NAME");
        config.storage.file_system = env_string("FILE_SYSTEM_NAME");
        if let Some(directory) = env_string("DIRECTORY_NAME") {
            config.storage.directory = directory;
        }

        if let Some(name) = env_string("MODEL_ID_SECRET_NAME") {
            config.secret_names.model_id = name;
        }
        if let Some(name) = env_string("API_KEY_SECRET_NAME") {
            config.secret_names.api_key = name;
        }
        config.secret_names.storage_account_key = env_string("STORAGE_ACCOUNT_KEY_SECRET_NAME");
        config.secret_names.storage_account_name = env_string("STORAGE_ACCOUNT_NAME_SECRET_NAME");
        config.secret_names.datalake_connection_string =
            env_string("DATALAKE_CONNECTION_STRING_SECRET_NAME");
        config.secret_names.storage_connection_string =
            env_string("STORAGE_CONNECTION_STRING_SECRET_NAME");

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field requirements.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing variable when a setting required
    /// outside debug mode is absent.
    pub fn validate(&self) -> Result<()> {
        if self.debug {
            return Ok(());
        }
        let required: [(&str, bool); 6] = [
            ("KEY_VAULT_URL or KEY_VAULT_NAME", self.vault.url.is_some()),
            (
                "SYNAPSE_WORKSPACE_NAME",
                self.synapse.workspace_name.is_some(),
            ),
            (
                "SYNAPSE_WORKSPACE_ENDPOINT or SYNAPSE_WORKSPACE_NAME",
                self.synapse.endpoint.is_some(),
            ),
            ("SPARK_POOL_NAME", self.synapse.spark_pool.is_some()),
            (
                "STORAGE_ACCOUNT_NAME, STORAGE_ACCOUNT_NAME_SECRET_NAME, \
                 or a connection string secret name",
                self.storage.account_name.is_some()
                    || self.secret_names.storage_account_name.is_some()
                    || self.secret_names.connection_string().is_some(),
            ),
            ("FILE_SYSTEM_NAME", self.storage.file_system.is_some()),
        ];
        for (name, present) in required {
            if !present {
                return Err(Error::InvalidInput(format!(
                    "{name} is required when LAKEGATE_DEBUG=false"
                )));
            }
        }
        Ok(())
    }

    /// Workspace name used to address the job entry-point file.
    #[must_use]
    pub fn workspace_name(&self) -> &str {
        self.synapse
            .workspace_name
            .as_deref()
            .unwrap_or(DEFAULT_DEBUG_WORKSPACE)
    }

    /// Builds the workflow configuration this server hands to the ingest
    /// orchestrator.
    #[must_use]
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig {
            allow_list: AllowList::new(&self.allowed_extensions),
            staging: StagingTarget::new(self.storage.directory.clone()),
            model_id_secret: self.secret_names.model_id.clone(),
            api_key_secret: self.secret_names.api_key.clone(),
            job: JobTemplate::model_training(self.workspace_name()),
            job_wait_timeout: Duration::from_secs(self.job_wait_timeout_secs),
        }
    }

    /// Interval between job state polls.
    #[must_use]
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_poll_interval_secs)
    }
}

fn vault_url_from_values(url: Option<&str>, name: Option<&str>) -> Option<String> {
    url.map(|u| u.trim_end_matches('/').to_string())
        .or_else(|| name.map(|n| format!("https://{n}.vault.azure.net")))
}

fn synapse_endpoint_from_values(endpoint: Option<&str>, name: Option<&str>) -> Option<String> {
    endpoint
        .map(|e| e.trim_end_matches('/').to_string())
        .or_else(|| name.map(|n| format!("https://{n}.dev.azuresynapse.net")))
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<usize>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a usize: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

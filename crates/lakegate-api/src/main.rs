//! `lakegate-api` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the Azure
//! collaborators (or in-memory fakes in debug mode), and starts the HTTP
//! server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use lakegate_api::config::Config;
use lakegate_api::server::Server;
use lakegate_core::observability::{init_logging, LogFormat};
use lakegate_core::{
    AdlsStore, BatchJobService, KeyVaultClient, ObjectStore, SecretStore, SparkBatchClient,
    TokenSource,
};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));

    let server = if config.debug {
        tracing::warn!("LAKEGATE_DEBUG=true; using in-memory collaborators");
        Server::new(config)
    } else {
        let (store, secrets, jobs) = build_collaborators(&config).await?;
        Server::with_collaborators(config, store, secrets, jobs)
    };

    server.serve().await?;
    Ok(())
}

/// Builds the production collaborators from configuration.
///
/// Storage secrets, when configured, are resolved from the vault before the
/// server accepts traffic; their values go straight into the store client
/// and are never logged.
async fn build_collaborators(
    config: &Config,
) -> Result<(
    Arc<dyn ObjectStore>,
    Arc<dyn SecretStore>,
    Arc<dyn BatchJobService>,
)> {
    let vault_url = config
        .vault
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("key vault URL missing after validation"))?;
    let vault = KeyVaultClient::new(
        vault_url,
        TokenSource::managed_identity(lakegate_core::identity::VAULT_RESOURCE),
    );
    tracing::info!(vault_url = %vault_url, "Using Key Vault secret store");

    let store = build_store(config, &vault).await?;
    tracing::info!(
        file_system = %config.storage.file_system.as_deref().unwrap_or_default(),
        directory = %config.storage.directory,
        "Using data lake object store"
    );

    let batches_url = config.synapse.livy_batches_url()?;
    let jobs = SparkBatchClient::new(
        batches_url.clone(),
        TokenSource::managed_identity(lakegate_core::identity::SYNAPSE_RESOURCE),
    )
    .with_poll_interval(config.job_poll_interval());
    tracing::info!(batches_url = %batches_url, "Using Synapse Spark batch service");

    Ok((Arc::new(store), Arc::new(vault), Arc::new(jobs)))
}

/// Builds the data lake store, resolving startup secrets from the vault.
///
/// A configured connection-string secret takes precedence; the account name
/// and key are parsed out of the resolved value. Otherwise the account name
/// comes from configuration or its own secret, with the access key secret
/// applied when present. Only secret names are logged here.
async fn build_store(config: &Config, vault: &KeyVaultClient) -> Result<AdlsStore> {
    let file_system = config
        .storage
        .file_system
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("file system missing after validation"))?;

    if let Some(secret_name) = config.secret_names.connection_string() {
        tracing::info!(secret_name = %secret_name, "Resolving connection string at startup");
        let connection_string = vault.get_secret(secret_name).await?;
        return Ok(AdlsStore::from_connection_string(
            &connection_string,
            file_system,
        )?);
    }

    let account = match config.storage.account_name.clone() {
        Some(account) => account,
        None => {
            let secret_name = config
                .secret_names
                .storage_account_name
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage account missing after validation"))?;
            tracing::info!(secret_name = %secret_name, "Resolving account name at startup");
            vault.get_secret(secret_name).await?.expose().to_string()
        }
    };
    let access_key = match config.secret_names.storage_account_key.as_deref() {
        Some(secret_name) => {
            tracing::info!(secret_name = %secret_name, "Resolving storage access key at startup");
            Some(vault.get_secret(secret_name).await?)
        }
        None => None,
    };
    Ok(AdlsStore::new(&account, file_system, access_key.as_ref())?)
}

use crate::application::{SqlGuard, TextToSqlUseCase};
use crate::domain::error::Result;
use crate::domain::semantic_metadata::SemanticMetadata;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::db::CostStore;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::interfaces::state::AppState;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `.env`, then layered config, then the API key lookup chain.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!(error = %err, "Failed to read .env file");
        }
    }

    let mut config = AppConfig::load(path).map_err(|err| {
        error!(error = %err, "Failed to load configuration");
        err
    })?;
    ConfigService::new().resolve_api_key(&mut config.llm);

    if config.llm.api_key.is_none() && config.llm.provider.api_key_env().is_some() {
        warn!(provider = ?config.llm.provider, "No API key configured");
    }
    Ok(config)
}

pub fn llm_client() -> Arc<dyn LLMClient + Send + Sync> {
    Arc::new(RouterClient::new())
}

/// Verifies the store and metadata file and wires the question pipeline.
/// Any missing piece is an initialization error.
pub async fn build_app_state(config: &AppConfig) -> Result<Arc<AppState>> {
    let store = CostStore::open(&config.database_path).await.map_err(|err| {
        error!(error = %err, database = %config.database_path.display(), "Failed to open cost store");
        err
    })?;

    store
        .ensure_tables(&config.include_tables)
        .await
        .map_err(|err| {
            error!(error = %err, tables = ?config.include_tables, "Allow-listed tables missing");
            err
        })?;

    let metadata = SemanticMetadata::load(&config.metadata_path).map_err(|err| {
        error!(error = %err, metadata = %config.metadata_path.display(), "Failed to load semantic metadata");
        err
    })?;

    info!(
        database = %config.database_path.display(),
        tables = ?config.include_tables,
        metadata_tables = metadata.tables.len(),
        guard = config.guard.enabled,
        "Pipeline ready"
    );

    let mut use_case = TextToSqlUseCase::new(
        llm_client(),
        Arc::new(store),
        Arc::new(metadata),
        config.llm.clone(),
        config.include_tables.clone(),
        config.sample_rows_in_table_info,
    );
    if config.guard.enabled {
        use_case = use_case.with_guard(SqlGuard::new(
            &config.include_tables,
            &config.guard.deny_statements,
        ));
    }

    Ok(Arc::new(AppState::new(use_case)))
}

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use parley_agent::analysis::AnalysisScheduler;
use parley_agent::escalation::EscalationWorkflow;
use parley_agent::geo::HttpGeoClient;
use parley_agent::guardrails::GuardrailChain;
use parley_agent::llm::HttpLlmClient;
use parley_agent::notify::LogNotifier;
use parley_agent::turn::ConversationTurnProcessor;
use parley_core::config::{AppConfig, ConfigError, LoadOptions};
use parley_core::errors::CoreError;
use parley_db::repositories::{
    SqlMessageRepository, SqlSessionRepository, SqlTenantRepository, SqlTicketRepository,
};
use parley_db::{connect_with_settings, migrations, DbPool};
use parley_retrieval::{
    ChunkingEngine, HttpEmbeddingClient, RetrievalService, SqliteVectorIndex,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub turns: Arc<ConversationTurnProcessor>,
    pub retrieval: Arc<RetrievalService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("service wiring failed: {0}")]
    Wiring(#[source] CoreError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied");

    let tenants = Arc::new(SqlTenantRepository::new(db_pool.clone()));
    let sessions = Arc::new(SqlSessionRepository::new(db_pool.clone()));
    let messages = Arc::new(SqlMessageRepository::new(db_pool.clone()));
    let tickets = Arc::new(SqlTicketRepository::new(db_pool.clone()));

    let embedder =
        Arc::new(HttpEmbeddingClient::new(&config.llm).map_err(BootstrapError::Wiring)?);
    let llm = Arc::new(HttpLlmClient::new(&config.llm).map_err(BootstrapError::Wiring)?);
    let geo = Arc::new(HttpGeoClient::new(&config.geo).map_err(BootstrapError::Wiring)?);
    let guardrails = GuardrailChain::new().map_err(BootstrapError::Wiring)?;

    let retrieval = Arc::new(RetrievalService::new(
        ChunkingEngine::new(config.retrieval.chunk_size, config.retrieval.overlap),
        embedder,
        Arc::new(SqliteVectorIndex::new(db_pool.clone())),
        config.retrieval.top_k,
    ));

    let escalation = Arc::new(EscalationWorkflow::new(
        sessions.clone(),
        tenants.clone(),
        tickets,
        Arc::new(LogNotifier),
    ));

    // The scheduler's repositories clone the pool, so detached analysis
    // units keep working after the originating request completes.
    let analysis = AnalysisScheduler::new(
        sessions.clone(),
        messages.clone(),
        tenants.clone(),
        llm.clone(),
        &config.analysis,
    );

    let turns = Arc::new(ConversationTurnProcessor::new(
        tenants,
        sessions,
        messages,
        retrieval.clone(),
        llm,
        guardrails,
        escalation,
        analysis,
        geo,
    ));

    info!(event_name = "system.bootstrap.services_wired");

    Ok(Application { config, db_pool, turns, retrieval })
}

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use relay_agent::{ActionExecutor, Orchestrator, SnapshotLoader};
use relay_core::config::{AppConfig, ConfigError, LoadOptions};
use relay_db::repositories::{
    SqlActivityRepository, SqlCampaignRepository, SqlCompanyRepository, SqlContactRepository,
    SqlEmailLogRepository, SqlOperationRepository, SqlTemplateRepository,
};
use relay_db::{connect_with_settings, migrations, DbPool};
use relay_mailer::HttpMailer;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub executor: Arc<ActionExecutor>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("mailer setup failed: {0}")]
    Mailer(#[source] relay_mailer::MailerError),
    #[error("LLM client setup failed: {0}")]
    Llm(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let contacts = Arc::new(SqlContactRepository::new(db_pool.clone()));
    let companies = Arc::new(SqlCompanyRepository::new(db_pool.clone()));
    let campaigns = Arc::new(SqlCampaignRepository::new(db_pool.clone()));
    let email_logs = Arc::new(SqlEmailLogRepository::new(db_pool.clone()));
    let templates = Arc::new(SqlTemplateRepository::new(db_pool.clone()));
    let activities = Arc::new(SqlActivityRepository::new(db_pool.clone()));
    let operations = Arc::new(SqlOperationRepository::new(db_pool.clone()));

    let mailer = Arc::new(
        HttpMailer::new(
            config.mailer.endpoint.clone(),
            config.mailer.from_address.clone(),
            config.mailer.api_key.clone(),
            config.mailer.timeout_secs,
        )
        .map_err(BootstrapError::Mailer)?,
    );

    let llm = relay_agent::build_llm_client(&config.llm).map_err(BootstrapError::Llm)?;
    let snapshots = SnapshotLoader::new(
        contacts.clone(),
        companies.clone(),
        campaigns.clone(),
        activities.clone(),
    );
    let orchestrator = Arc::new(Orchestrator::new(llm, snapshots));
    let executor = Arc::new(ActionExecutor::new(
        contacts,
        companies,
        campaigns,
        email_logs,
        templates,
        activities,
        operations,
        mailer,
    ));

    Ok(Application { config, db_pool, orchestrator, executor })
}

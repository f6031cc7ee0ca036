use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use approflow_core::config::{
    AppConfig, ConfigError, LoadOptions, NotifyMode, StampModeConfig,
};
use approflow_core::stamp::Stamper;
use approflow_db::{connect_with_config, migrations, DbPool, SqlWorkflowStore};
use approflow_notify::{NoopNotifier, Notifier, NotifyError, WebhookNotifier, WebhookSettings};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notifier initialization failed: {0}")]
    Notifier(#[source] NotifyError),
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

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let stamper = build_stamper(&config);
    let notifier = build_notifier(&config)?;
    let store = Arc::new(SqlWorkflowStore::new(db_pool.clone(), stamper));

    let state = ApiState::new(db_pool.clone(), store, notifier);
    Ok(Application { config, db_pool, state })
}

fn build_stamper(config: &AppConfig) -> Stamper {
    match (config.stamp.mode, &config.stamp.signing_key) {
        (StampModeConfig::Hmac, Some(key)) => Stamper::keyed(key.expose_secret().as_bytes()),
        _ => Stamper::default(),
    }
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, BootstrapError> {
    match config.notify.mode {
        NotifyMode::Noop => Ok(Arc::new(NoopNotifier)),
        NotifyMode::Webhook => {
            // Presence of the url was enforced by config validation.
            let settings = WebhookSettings {
                url: config.notify.webhook_url.clone().unwrap_or_default(),
                token: config.notify.webhook_token.clone(),
                timeout: Duration::from_secs(config.notify.timeout_secs),
            };
            let notifier = WebhookNotifier::new(settings).map_err(BootstrapError::Notifier)?;
            Ok(Arc::new(notifier))
        }
    }
}

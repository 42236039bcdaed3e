use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ticketdesk::config::AppConfig;
use ticketdesk::core::shared::state::AppState;
use ticketdesk::core::shared::utils::{create_conn, redact_url, run_migrations};
use ticketdesk::main_module::run_axum_server;
use ticketdesk::notifications::{spawn_delivery_worker, LogMailer, Mailer, NotificationDispatcher, SmtpMailer};
use ticketdesk::tickets::store::{PgTicketStore, TicketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    info!("Connecting to database {}", redact_url(&config.database.url));
    let database_url = config.database.url.clone();
    let pool_size = config.database.pool_size;
    let pool = tokio::task::spawn_blocking(move || {
        let pool = create_conn(&database_url, pool_size)?;
        run_migrations(&pool)?;
        Ok::<_, anyhow::Error>(pool)
    })
    .await
    .context("Database setup task failed")??;

    let store: Arc<dyn TicketStore> = Arc::new(PgTicketStore::new(pool));

    let mailer: Arc<dyn Mailer> = match &config.email {
        Some(email) => Arc::new(SmtpMailer::new(email).context("Invalid SMTP configuration")?),
        None => {
            warn!("SMTP_HOST not set, notifications will only be logged");
            Arc::new(LogMailer)
        }
    };
    let (dispatcher, receiver) = NotificationDispatcher::channel(config.notifications.queue_capacity);
    let worker = spawn_delivery_worker(receiver, mailer);

    let state = Arc::new(AppState::new(config, store, dispatcher)?);
    run_axum_server(state).await.context("HTTP server failed")?;

    // The router held the last dispatcher handle; give queued mail a moment.
    if tokio::time::timeout(Duration::from_secs(10), worker).await.is_err() {
        warn!("Notification worker did not finish in time, pending emails dropped");
    }
    info!("Shutdown complete");
    Ok(())
}

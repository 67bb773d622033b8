use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use autoshop::config::AppConfig;
use autoshop::db::{self, queries};
use autoshop::routes;
use autoshop::services::auth::SqliteAuthProvider;
use autoshop::services::gateway::SqliteBookingGateway;
use autoshop::services::session::AuthEvent;
use autoshop::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let expired = queries::expire_old_sessions(&conn)?;
    if expired > 0 {
        tracing::info!(expired, "removed expired sessions");
    }
    let db = Arc::new(Mutex::new(conn));

    if config.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; nobody can manage bookings");
    }

    let auth = SqliteAuthProvider::new(
        Arc::clone(&db),
        config.admin_emails.clone(),
        config.session_ttl_hours,
    );
    let gateway = SqliteBookingGateway::new(Arc::clone(&db), config.slot_capacity);

    let (auth_events, mut auth_rx) = broadcast::channel(256);
    tokio::spawn(async move {
        loop {
            match auth_rx.recv().await {
                Ok(AuthEvent::Restored { user_id }) => {
                    tracing::debug!(user_id = %user_id, "session restored");
                }
                Ok(event) => tracing::info!(?event, "auth state changed"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "auth event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        auth: Arc::new(auth),
        gateway: Arc::new(gateway),
        auth_events,
    });

    let app = routes::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

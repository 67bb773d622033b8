use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::services::auth::AuthProvider;
use crate::services::gateway::BookingGateway;
use crate::services::session::AuthEvent;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub auth: Arc<dyn AuthProvider>,
    pub gateway: Arc<dyn BookingGateway>,
    pub auth_events: broadcast::Sender<AuthEvent>,
}

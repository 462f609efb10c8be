//! Shared application state for the HTTP server.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::KeyManager;
use crate::config::Settings;
use crate::database::Database;

/// Capacity of the change-event channel.
pub const BROADCAST_CAPACITY: usize = 100;

/// Application state shared across all handlers.
pub struct AppState {
    pub db: Arc<Database>,
    pub keys: Arc<KeyManager>,
    /// Broadcast channel for WebSocket updates.
    pub broadcast_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(db: Arc<Database>, keys: Arc<KeyManager>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            db,
            keys,
            broadcast_tx,
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Current runtime settings from the `config` table.
    pub fn settings(&self) -> Settings {
        Settings::load(&self.db)
    }

    /// Sends an update to all connected WebSocket clients.
    pub fn broadcast(&self, update_type: &str, data: &impl Serialize) {
        let message = event_message(update_type, data);
        if let Ok(json) = serde_json::to_string(&message) {
            // No receivers is fine: nobody is watching.
            let _ = self.broadcast_tx.send(json);
        }
    }
}

/// The `{type, data, timestamp}` envelope used for every socket message.
pub fn event_message(update_type: &str, data: &impl Serialize) -> serde_json::Value {
    serde_json::json!({
        "type": update_type,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

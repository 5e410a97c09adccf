//! Streaming module - WebSocket fan-out of game and timer events

mod websocket;

pub use websocket::WebSocketServer;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::EventBus;

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Enable WebSocket server
    pub websocket_enabled: bool,
    pub websocket_port: u16,
    pub websocket_max_clients: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            websocket_enabled: true,
            websocket_port: 8765,
            websocket_max_clients: 10,
        }
    }
}

/// Streaming manager
pub struct StreamingManager {
    websocket_server: Option<WebSocketServer>,
}

impl StreamingManager {
    pub fn new(config: StreamingConfig, events: Arc<EventBus>) -> Self {
        let websocket_server = if config.websocket_enabled {
            Some(WebSocketServer::new(
                config.websocket_port,
                config.websocket_max_clients,
                events,
            ))
        } else {
            None
        };

        Self { websocket_server }
    }

    pub async fn start(&mut self, shutdown: broadcast::Receiver<()>) -> Result<()> {
        if let Some(ref mut ws) = self.websocket_server {
            ws.start(shutdown).await?;
        }
        Ok(())
    }
}

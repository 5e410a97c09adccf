// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! WebSocket server for real-time event streaming

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::core::{Event, EventBus, EventPayload, EventType};

/// WebSocket server fanning bus events out to remote displays
pub struct WebSocketServer {
    port: u16,
    max_clients: usize,
    clients: Arc<RwLock<HashMap<String, SocketAddr>>>,
    events: Arc<EventBus>,
}

impl WebSocketServer {
    pub fn new(port: u16, max_clients: usize, events: Arc<EventBus>) -> Self {
        Self {
            port,
            max_clients,
            clients: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("WebSocket server listening on ws://{}", addr);

        let clients = self.clients.clone();
        let max_clients = self.max_clients;
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                let client_count = clients.read().await.len();
                                if client_count >= max_clients {
                                    warn!("Max clients reached, rejecting connection from {}", addr);
                                    continue;
                                }

                                let clients = clients.clone();
                                let events_rx = events.subscribe_events();

                                tokio::spawn(handle_connection(stream, addr, clients, events_rx));
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn event_to_json(event: &Event) -> serde_json::Value {
    let kind = match event.event_type {
        EventType::Game => "game",
        EventType::Timer => "timer",
        EventType::Alert => "alert",
    };
    let data = match &event.payload {
        EventPayload::Game(game) => serde_json::json!(game.phase),
        EventPayload::Timer(timer) => serde_json::json!({
            "timestamp": timer.timestamp,
            "remaining_time": timer.remaining_time,
            "status": timer.status,
        }),
        EventPayload::Alert { level, message } => serde_json::json!({
            "level": level,
            "message": message,
        }),
    };
    serde_json::json!({ "type": kind, "data": data })
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<HashMap<String, SocketAddr>>>,
    mut events_rx: broadcast::Receiver<Event>,
) {
    let client_id = uuid::Uuid::new_v4().to_string();

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    info!("New WebSocket connection from {} (id: {})", addr, client_id);

    {
        let mut clients = clients.write().await;
        clients.insert(client_id.clone(), addr);
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let welcome = serde_json::json!({
        "type": "welcome",
        "client_id": client_id,
        "server": "cueclock",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Err(e) = ws_sender.send(Message::Text(welcome.to_string().into())).await {
        warn!("Failed to send welcome: {}", e);
    }

    loop {
        tokio::select! {
            // Incoming messages from client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from {}: {}", addr, text);

                        if let Ok(cmd) = serde_json::from_str::<serde_json::Value>(&text) {
                            if cmd.get("type").and_then(|v| v.as_str()) == Some("ping") {
                                let pong = serde_json::json!({"type": "pong"});
                                let _ = ws_sender.send(Message::Text(pong.to_string().into())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by client {}", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            // Outgoing bus events
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        let wrapper = event_to_json(&event);
                        if let Err(e) = ws_sender.send(Message::Text(wrapper.to_string().into())).await {
                            warn!("Failed to send to {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Client {} lagged, skipped {} events", addr, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    {
        let mut clients = clients.write().await;
        clients.remove(&client_id);
    }

    info!("WebSocket client {} disconnected", addr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GamePhase, TimerPhase};

    #[test]
    fn test_timer_event_wire_shape() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_events();
        bus.publish_timer(42.5, TimerPhase::Running);

        let event = rx.try_recv().unwrap();
        let json = event_to_json(&event);
        assert_eq!(json["type"], "timer");
        assert_eq!(json["data"]["remaining_time"], 42.5);
        assert_eq!(json["data"]["status"], "running");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn test_game_event_wire_shape() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe_events();
        bus.publish_game(GamePhase::Started);

        let event = rx.try_recv().unwrap();
        let json = event_to_json(&event);
        assert_eq!(json["type"], "game");
        assert_eq!(json["data"], "started");
    }
}

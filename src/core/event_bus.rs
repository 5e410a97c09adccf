// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Event bus for inter-component communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Game lifecycle phase carried by a [`GameEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Created,
    Started,
    Ended,
}

/// Timer phase carried by a [`TimerEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Running,
    Paused,
}

/// Game lifecycle notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub timestamp: DateTime<Utc>,
    pub phase: GamePhase,
}

/// Remaining-time notification, emitted on pause, resume and every
/// periodic tick. The timestamp lets a remote display re-synchronize its
/// own local countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEvent {
    pub timestamp: DateTime<Utc>,
    pub remaining_time: f64,
    pub status: TimerPhase,
}

/// Event types in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventType {
    Game,
    Timer,
    Alert,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Game(GameEvent),
    Timer(TimerEvent),
    Alert { level: String, message: String },
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    game_tx: broadcast::Sender<GameEvent>,
    timer_tx: broadcast::Sender<TimerEvent>,
    event_tx: broadcast::Sender<Event>,
    event_counter: std::sync::atomic::AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (game_tx, _) = broadcast::channel(capacity);
        let (timer_tx, _) = broadcast::channel(capacity);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            game_tx,
            timer_tx,
            event_tx,
            event_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn publish_game(&self, phase: GamePhase) {
        let event = GameEvent {
            timestamp: Utc::now(),
            phase,
        };
        let _ = self.game_tx.send(event.clone());
        self.publish_event(EventType::Game, EventPayload::Game(event));
    }

    pub fn publish_timer(&self, remaining_time: f64, status: TimerPhase) {
        let event = TimerEvent {
            timestamp: Utc::now(),
            remaining_time,
            status,
        };
        let _ = self.timer_tx.send(event.clone());
        self.publish_event(EventType::Timer, EventPayload::Timer(event));
    }

    pub fn publish_alert(&self, level: &str, message: &str) {
        self.publish_event(
            EventType::Alert,
            EventPayload::Alert {
                level: level.to_string(),
                message: message.to_string(),
            },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self
            .event_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_game(&self) -> broadcast::Receiver<GameEvent> {
        self.game_tx.subscribe()
    }

    pub fn subscribe_timer(&self) -> broadcast::Receiver<TimerEvent> {
        self.timer_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

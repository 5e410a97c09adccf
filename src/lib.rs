// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! cueclock - camera-driven billiards shot clock
//!
//! Watches the table through a camera, infers whether the balls are in
//! motion, and drives a per-turn countdown with alarms and automatic
//! turn handoff - no human clock operator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    cueclock appliance                    │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────┐   ┌──────────┐   ┌────────────┐              │
//! │  │ Frame  │ → │  Motion  │ → │    Game    │ ← operator   │
//! │  │ Source │   │ Detector │   │ Controller │   commands   │
//! │  └────────┘   └──────────┘   └─────┬──────┘              │
//! │                                    │  ┌────────────┐     │
//! │                                    ├──│ Turn Timer │     │
//! │                                    │  └────────────┘     │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                     Event Bus                      │  │
//! │  └──────────────────┬───────────────────┬─────────────┘  │
//! │              ┌──────┴──────┐     ┌──────┴──────┐         │
//! │              │  WebSocket  │     │ Alarm Sink  │         │
//! │              │ Broadcaster │     │  (buzzer)   │         │
//! │              └─────────────┘     └─────────────┘         │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod streaming;
pub mod vision;

// Re-exports for convenience
pub use config::{Config, DetectionConfig, MotionStrategy, TimerConfig};
pub use core::{AlarmPulse, AlarmSink, BusAlarm, EventBus, GamePhase, TimerPhase};
pub use game::{Game, GameError, GameRegistry, GameStatus, Ruleset, StatusReport, TurnTimer};
pub use streaming::StreamingManager;
pub use vision::{FrameSource, Hsv, MotionDetector, TablePreset, TableSimulator};

/// cueclock version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// cueclock name
pub const NAME: &str = "cueclock";

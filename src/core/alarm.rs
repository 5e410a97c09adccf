// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Alarm output abstraction
//!
//! The appliance drives a physical buzzer; this crate only owns the
//! decision of when to sound it. Implementations translate pulses into
//! whatever output the deployment has.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use super::EventBus;

/// Length of an alarm pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPulse {
    /// Pre-expiry warning pulse
    Short,
    /// Turn-expired pulse
    Long,
}

/// Sink for alarm pulses
pub trait AlarmSink: Send + Sync {
    /// Emit one pulse
    fn pulse(&self, pulse: AlarmPulse);

    /// Stop any active output
    fn silence(&self);
}

/// Default sink: publishes alerts on the event bus and logs them
pub struct BusAlarm {
    events: Arc<EventBus>,
    active: AtomicBool,
}

impl BusAlarm {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
        }
    }
}

impl AlarmSink for BusAlarm {
    fn pulse(&self, pulse: AlarmPulse) {
        self.active.store(true, Ordering::Release);
        match pulse {
            AlarmPulse::Short => {
                info!("Alarm pulse: pre-expiry warning");
                self.events.publish_alert("warning", "turn time running out");
            }
            AlarmPulse::Long => {
                info!("Alarm pulse: turn expired");
                self.events.publish_alert("expired", "turn time expired");
            }
        }
    }

    fn silence(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!("Alarm silenced");
            self.events.publish_alert("silenced", "alarm output stopped");
        }
    }
}

//! Core plumbing - event bus and alarm output

mod alarm;
mod event_bus;

pub use alarm::{AlarmPulse, AlarmSink, BusAlarm};
pub use event_bus::{
    Event, EventBus, EventPayload, EventType, GameEvent, GamePhase, TimerEvent, TimerPhase,
};

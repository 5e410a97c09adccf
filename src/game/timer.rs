// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Turn timer - one countdown worker per turn
//!
//! An instance counts one turn down and is then discarded; the next turn
//! gets a fresh instance. The worker sleeps in short adaptive slices so
//! pause, resume and end are observed with bounded latency, and parks on
//! the run gate while paused. `end` also nudges the gate, so a parked
//! worker always exits promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TimerConfig;

/// Fired once when the countdown reaches zero.
pub type ExpireCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Fired once when remaining time first drops to the alarm threshold.
pub type AlarmCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Fired about once per reporting interval with `(remaining, is_running)`.
pub type PeriodicCallback = Box<dyn Fn(f64, bool) + Send + Sync + 'static>;

/// The three timer callbacks, handed over at construction.
pub struct TimerCallbacks {
    pub on_expire: ExpireCallback,
    pub on_alarm: AlarmCallback,
    pub on_periodic: PeriodicCallback,
}

struct TimerShared {
    alarm_time: f64,
    config: TimerConfig,
    /// Read and written by the worker and by external callers
    remaining: Mutex<f64>,
    running: watch::Sender<bool>,
    ended: AtomicBool,
    alarm_triggered: AtomicBool,
    callbacks: TimerCallbacks,
}

/// Countdown for a single turn.
pub struct TurnTimer {
    duration: f64,
    shared: Arc<TimerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TurnTimer {
    pub fn new(
        duration: f64,
        alarm_time: f64,
        config: TimerConfig,
        callbacks: TimerCallbacks,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            duration,
            shared: Arc::new(TimerShared {
                alarm_time,
                config,
                remaining: Mutex::new(duration),
                running,
                ended: AtomicBool::new(false),
                alarm_triggered: AtomicBool::new(false),
                callbacks,
            }),
            handle: Mutex::new(None),
        }
    }

    /// Launch the countdown worker in the running state.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            warn!("Turn timer already started");
            return;
        }
        self.shared.running.send_replace(true);
        *handle = Some(tokio::spawn(run_countdown(self.shared.clone())));
    }

    /// Stop counting down; returns the remaining time so the caller can
    /// broadcast it immediately instead of waiting for the next tick.
    /// No-op (still returning remaining time) when already paused.
    pub fn pause(&self) -> f64 {
        self.shared.running.send_replace(false);
        self.remaining()
    }

    /// Start counting down again; returns the remaining time. No-op when
    /// already running.
    pub fn resume(&self) -> f64 {
        self.shared.running.send_replace(true);
        self.remaining()
    }

    /// Add seconds to the countdown and report the new value right away.
    /// Has no effect once the timer has expired or been ended.
    pub fn add_time(&self, seconds: f64) {
        if self.shared.ended.load(Ordering::Acquire) {
            return;
        }
        let remaining = {
            let mut remaining = self.shared.remaining.lock();
            if *remaining <= 0.0 {
                return;
            }
            *remaining += seconds;
            *remaining
        };
        let is_running = *self.shared.running.borrow();
        (self.shared.callbacks.on_periodic)(remaining, is_running);
    }

    /// Terminate the worker. Also releases it if it is parked waiting to
    /// be resumed, so the thread exits in bounded time.
    pub fn end(&self) {
        self.shared.ended.store(true, Ordering::Release);
        self.shared.running.send_replace(true);
    }

    /// Current remaining time, seconds. Never negative.
    pub fn remaining(&self) -> f64 {
        *self.shared.remaining.lock()
    }

    /// Configured turn duration.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.borrow() && !self.shared.ended.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }

    /// Whether the pre-expiry alarm already fired for this instance.
    pub fn alarm_triggered(&self) -> bool {
        self.shared.alarm_triggered.load(Ordering::Acquire)
    }

    /// Wait for the worker to exit. Returns immediately if it never ran.
    pub async fn wait_stopped(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_countdown(shared: Arc<TimerShared>) {
    let mut gate = shared.running.subscribe();
    let mut last_report = Instant::now();
    debug!("Turn timer worker started");

    loop {
        if shared.ended.load(Ordering::Acquire) {
            break;
        }

        if !*gate.borrow_and_update() {
            // parked until resumed or ended
            if gate.changed().await.is_err() {
                break;
            }
            continue;
        }

        let remaining_now = *shared.remaining.lock();
        if remaining_now <= 0.0 {
            break;
        }

        // shrink the slice near zero to keep expiry overshoot small
        // without busy-spinning
        let slice = (remaining_now / 10.0)
            .clamp(shared.config.min_slice_secs, shared.config.max_slice_secs);
        let slice_start = Instant::now();
        tokio::time::sleep(Duration::from_secs_f64(slice)).await;
        let elapsed = slice_start.elapsed().as_secs_f64();

        let remaining = {
            let mut remaining = shared.remaining.lock();
            *remaining = (*remaining - elapsed).max(0.0);
            *remaining
        };

        if last_report.elapsed().as_secs_f64() >= shared.config.report_interval_secs {
            let is_running = *gate.borrow();
            (shared.callbacks.on_periodic)(remaining, is_running);
            last_report = Instant::now();
        }

        if remaining <= shared.alarm_time && !shared.alarm_triggered.swap(true, Ordering::AcqRel) {
            (shared.callbacks.on_alarm)();
        }

        if remaining <= 0.0 {
            (shared.callbacks.on_expire)();
            break;
        }
    }

    debug!("Turn timer worker stopped");
}

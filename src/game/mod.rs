// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Game controller - the state machine combining timer and movement
//!
//! One `Game` owns one motion detector for the whole match and one turn
//! timer per turn. The detector's edge callbacks pause the clock while
//! balls roll and rotate the turn once they settle; the timer's expiry
//! callback rotates the turn on timeout. Operator commands arrive from
//! the API layer. All of it serializes on a single state lock, so the
//! two worker callback streams and external requests cannot race.

mod registry;
mod ruleset;
mod timer;

pub use registry::GameRegistry;
pub use ruleset::Ruleset;
pub use timer::{
    AlarmCallback, ExpireCallback, PeriodicCallback, TimerCallbacks, TurnTimer,
};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DetectionConfig, TimerConfig};
use crate::core::{AlarmPulse, AlarmSink, EventBus, GamePhase, TimerPhase};
use crate::vision::{FrameSource, MotionDetector, TablePreset};

/// Game lifecycle states. `Ended` is terminal; a new match needs a new
/// `Game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Ready,
    Running,
    /// Balls are moving; the clock is held until they settle
    Waiting,
    Paused,
    Ended,
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GameStatus::Ready => "ready",
            GameStatus::Running => "running",
            GameStatus::Waiting => "waiting",
            GameStatus::Paused => "paused",
            GameStatus::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Rejections for operations the state machine forbids. None of these
/// are fatal; they go back to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game already started")]
    AlreadyStarted,
    #[error("game is not running (status: {status})")]
    NotRunning { status: GameStatus },
    #[error("game is not paused (status: {status})")]
    NotPaused { status: GameStatus },
    #[error("no increments left for player {player}")]
    NoIncrementsLeft { player: String },
    #[error("player index {0} is out of range")]
    InvalidPlayer(usize),
    #[error("no game in progress")]
    NoGameInProgress,
}

/// Snapshot answered to status queries. `last_remaining_time` is the
/// most recent reported timer value, so queries never race the timer
/// worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub player_names: [String; 2],
    pub current_player: usize,
    pub status: GameStatus,
    pub last_remaining_time: f64,
    pub increments_remaining: [u32; 2],
    pub ruleset_id: u32,
    pub table_id: u32,
}

struct GameInner {
    status: GameStatus,
    player_names: [String; 2],
    current_player: usize,
    increments_remaining: [u32; 2],
    last_remaining_time: f64,
    timer: Option<Arc<TurnTimer>>,
    detector: Option<Arc<MotionDetector>>,
}

/// One billiards match.
pub struct Game {
    ruleset: Ruleset,
    table: TablePreset,
    detection: DetectionConfig,
    timer_config: TimerConfig,
    events: Arc<EventBus>,
    alarm: Arc<dyn AlarmSink>,
    source: Arc<dyn FrameSource>,
    self_ref: Weak<Game>,
    inner: Mutex<GameInner>,
}

impl Game {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ruleset: Ruleset,
        table: TablePreset,
        player1_name: impl Into<String>,
        player2_name: impl Into<String>,
        detection: DetectionConfig,
        timer_config: TimerConfig,
        events: Arc<EventBus>,
        alarm: Arc<dyn AlarmSink>,
        source: Arc<dyn FrameSource>,
    ) -> Arc<Self> {
        let increments = ruleset.max_increments_per_match;
        Arc::new_cyclic(|weak| Self {
            ruleset,
            table,
            detection,
            timer_config,
            events,
            alarm,
            source,
            self_ref: weak.clone(),
            inner: Mutex::new(GameInner {
                status: GameStatus::Ready,
                player_names: [player1_name.into(), player2_name.into()],
                current_player: 0,
                increments_remaining: [increments; 2],
                last_remaining_time: 0.0,
                timer: None,
                detector: None,
            }),
        })
    }

    /// Begin the match: motion detector up, first turn on the clock.
    /// Valid only from `Ready`.
    pub fn start(&self) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Ready {
            return Err(GameError::AlreadyStarted);
        }

        let detector = self.build_detector();
        detector.start();
        inner.detector = Some(detector);

        inner.status = GameStatus::Running;
        let timer = self.build_timer(self.ruleset.initial_duration);
        timer.start();
        inner.last_remaining_time = self.ruleset.initial_duration;
        inner.timer = Some(timer);

        let names = inner.player_names.clone();
        drop(inner);

        info!("Game started: {} vs {}", names[0], names[1]);
        self.events.publish_game(GamePhase::Started);
        Ok(())
    }

    /// End the match from any state. From `Paused` the workers are
    /// resumed first so neither is left parked. Idempotent once ended.
    pub fn end(&self) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        if inner.status == GameStatus::Ended {
            return Ok(());
        }

        if inner.status == GameStatus::Paused {
            if let Some(timer) = &inner.timer {
                timer.resume();
            }
            if let Some(detector) = &inner.detector {
                detector.resume();
            }
        }

        if let Some(timer) = &inner.timer {
            timer.end();
        }
        if let Some(detector) = &inner.detector {
            detector.end();
        }
        inner.status = GameStatus::Ended;
        drop(inner);

        self.alarm.silence();
        info!("Game ended");
        self.events.publish_game(GamePhase::Ended);
        Ok(())
    }

    /// Operator pause. Valid only from `Running`; returns the captured
    /// remaining time.
    pub fn pause(&self) -> Result<f64, GameError> {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Running {
            return Err(GameError::NotRunning {
                status: inner.status,
            });
        }

        let remaining = inner.timer.as_ref().map(|t| t.pause()).unwrap_or(0.0);
        if let Some(detector) = &inner.detector {
            detector.pause();
        }
        inner.status = GameStatus::Paused;
        inner.last_remaining_time = remaining;
        drop(inner);

        info!("Game paused with {remaining:.1}s on the clock");
        self.events.publish_timer(remaining, TimerPhase::Paused);
        Ok(remaining)
    }

    /// Operator resume. Valid only from `Paused`.
    pub fn resume(&self) -> Result<f64, GameError> {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Paused {
            return Err(GameError::NotPaused {
                status: inner.status,
            });
        }

        let remaining = inner.timer.as_ref().map(|t| t.resume()).unwrap_or(0.0);
        if let Some(detector) = &inner.detector {
            detector.resume();
        }
        inner.status = GameStatus::Running;
        inner.last_remaining_time = remaining;
        drop(inner);

        info!("Game resumed with {remaining:.1}s on the clock");
        self.events.publish_timer(remaining, TimerPhase::Running);
        Ok(remaining)
    }

    /// Spend one of `player`'s increments to extend the current turn.
    /// Valid only while `Running`; returns the increments the player has
    /// left.
    pub fn increment_time(&self, player: usize) -> Result<u32, GameError> {
        if player >= 2 {
            return Err(GameError::InvalidPlayer(player));
        }

        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Running {
            return Err(GameError::NotRunning {
                status: inner.status,
            });
        }
        if inner.increments_remaining[player] == 0 {
            return Err(GameError::NoIncrementsLeft {
                player: inner.player_names[player].clone(),
            });
        }

        inner.increments_remaining[player] -= 1;
        let left = inner.increments_remaining[player];
        let timer = inner.timer.clone();
        // add_time reports synchronously through the periodic callback,
        // which takes the state lock; release it first
        drop(inner);

        if let Some(timer) = timer {
            timer.add_time(self.ruleset.increment_duration);
        }
        Ok(left)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> GameStatus {
        self.inner.lock().status
    }

    /// Snapshot for status queries.
    pub fn status_report(&self) -> StatusReport {
        let inner = self.inner.lock();
        StatusReport {
            player_names: inner.player_names.clone(),
            current_player: inner.current_player,
            status: inner.status,
            last_remaining_time: inner.last_remaining_time,
            increments_remaining: inner.increments_remaining,
            ruleset_id: self.ruleset.id,
            table_id: self.table.id,
        }
    }

    // --- worker callbacks -------------------------------------------------

    /// Balls started rolling: hold the clock. Only acts while `Running`,
    /// which shields against a late edge arriving during pause or end.
    fn handle_movement_started(&self) {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Running {
            return;
        }
        let remaining = inner.timer.as_ref().map(|t| t.pause()).unwrap_or(0.0);
        inner.status = GameStatus::Waiting;
        inner.last_remaining_time = remaining;
        debug!("Movement started, clock held at {remaining:.1}s");
    }

    /// Balls settled: the shot is over, next player's turn begins on a
    /// fresh timer. Only acts while `Waiting`.
    fn handle_movement_stopped(&self) {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Waiting {
            return;
        }
        inner.status = GameStatus::Running;
        self.rotate_turn(&mut inner);
    }

    /// The turn clock ran out. Only acts while `Running`.
    fn handle_timer_expired(&self) {
        let mut inner = self.inner.lock();
        if inner.status != GameStatus::Running {
            return;
        }
        self.alarm.pulse(AlarmPulse::Long);
        self.rotate_turn(&mut inner);
    }

    /// Periodic remaining-time report. Never drives a transition.
    fn handle_periodic(&self, remaining: f64, is_running: bool) {
        let mut inner = self.inner.lock();
        inner.last_remaining_time = remaining;
        drop(inner);

        let phase = if is_running {
            TimerPhase::Running
        } else {
            TimerPhase::Paused
        };
        self.events.publish_timer(remaining, phase);
    }

    /// End the current turn and put the next player on the clock. The
    /// old timer is always ended before the new one starts, and a fresh
    /// instance is used rather than rewinding the old one.
    fn rotate_turn(&self, inner: &mut GameInner) {
        inner.current_player = 1 - inner.current_player;
        if let Some(old) = inner.timer.take() {
            old.end();
        }
        let timer = self.build_timer(self.ruleset.turn_duration);
        timer.start();
        inner.last_remaining_time = self.ruleset.turn_duration;
        inner.timer = Some(timer);
        debug!(
            "Turn rotated, {} to shoot",
            inner.player_names[inner.current_player]
        );
    }

    fn build_timer(&self, duration: f64) -> Arc<TurnTimer> {
        let expire_ref = self.self_ref.clone();
        let periodic_ref = self.self_ref.clone();
        let alarm = self.alarm.clone();

        Arc::new(TurnTimer::new(
            duration,
            self.ruleset.alarm_time,
            self.timer_config.clone(),
            TimerCallbacks {
                on_expire: Box::new(move || {
                    if let Some(game) = expire_ref.upgrade() {
                        game.handle_timer_expired();
                    }
                }),
                on_alarm: Box::new(move || {
                    alarm.pulse(AlarmPulse::Short);
                }),
                on_periodic: Box::new(move |remaining, is_running| {
                    if let Some(game) = periodic_ref.upgrade() {
                        game.handle_periodic(remaining, is_running);
                    }
                }),
            },
        ))
    }

    fn build_detector(&self) -> Arc<MotionDetector> {
        let started_ref = self.self_ref.clone();
        let stopped_ref = self.self_ref.clone();

        Arc::new(MotionDetector::new(
            self.detection.clone(),
            self.table.clone(),
            self.source.clone(),
            Box::new(move || {
                if let Some(game) = started_ref.upgrade() {
                    game.handle_movement_started();
                }
            }),
            Box::new(move || {
                if let Some(game) = stopped_ref.upgrade() {
                    game.handle_movement_stopped();
                }
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoConfig;
    use crate::core::BusAlarm;
    use crate::vision::TableSimulator;
    use std::time::Duration;

    fn test_ruleset() -> Ruleset {
        Ruleset {
            id: 7,
            name: "test".to_string(),
            initial_duration: 60.0,
            turn_duration: 35.0,
            alarm_time: 10.0,
            increment_duration: 25.0,
            max_increments_per_match: 2,
        }
    }

    fn test_game(ruleset: Ruleset) -> Arc<Game> {
        let video = VideoConfig {
            width: 120,
            height: 90,
            blur_radius: 1,
        };
        let sim = Arc::new(TableSimulator::new(&video));
        let preset = sim.preset();
        let events = Arc::new(EventBus::new(64));
        let alarm = Arc::new(BusAlarm::new(events.clone()));

        Game::new(
            ruleset,
            preset,
            "Alice",
            "Bob",
            DetectionConfig::default(),
            TimerConfig::default(),
            events,
            alarm,
            sim,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_twice_is_rejected() {
        let game = test_game(test_ruleset());
        assert_eq!(game.status(), GameStatus::Ready);

        game.start().unwrap();
        assert_eq!(game.status(), GameStatus::Running);

        assert_eq!(game.start(), Err(GameError::AlreadyStarted));
        assert_eq!(game.status(), GameStatus::Running);

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_movement_cycle_rotates_onto_fresh_timer() {
        let game = test_game(test_ruleset());
        game.start().unwrap();

        let first_timer = game.inner.lock().timer.clone().unwrap();

        game.handle_movement_started();
        assert_eq!(game.status(), GameStatus::Waiting);
        assert!(!first_timer.is_running(), "clock must be held while waiting");

        game.handle_movement_stopped();
        assert_eq!(game.status(), GameStatus::Running);

        let second_timer = game.inner.lock().timer.clone().unwrap();
        assert!(
            !Arc::ptr_eq(&first_timer, &second_timer),
            "rotation must allocate a fresh timer, not resume the old one"
        );
        assert!(first_timer.is_ended());
        assert_eq!(second_timer.duration(), 35.0);
        assert!(second_timer.remaining() > 34.0);

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spurious_edges_are_ignored() {
        let game = test_game(test_ruleset());

        // before start: nothing to act on
        game.handle_movement_started();
        assert_eq!(game.status(), GameStatus::Ready);

        game.start().unwrap();

        // stop-edge while running (not waiting) must not rotate
        let timer = game.inner.lock().timer.clone().unwrap();
        game.handle_movement_stopped();
        assert_eq!(game.status(), GameStatus::Running);
        let same_timer = game.inner.lock().timer.clone().unwrap();
        assert!(Arc::ptr_eq(&timer, &same_timer));

        // start-edge while paused must not transition
        game.pause().unwrap();
        game.handle_movement_started();
        assert_eq!(game.status(), GameStatus::Paused);

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_increment_exhaustion_names_the_player() {
        let game = test_game(test_ruleset());

        assert!(matches!(
            game.increment_time(0),
            Err(GameError::NotRunning { .. })
        ));

        game.start().unwrap();
        assert_eq!(game.increment_time(0), Ok(1));
        assert_eq!(game.increment_time(0), Ok(0));
        assert_eq!(
            game.increment_time(0),
            Err(GameError::NoIncrementsLeft {
                player: "Alice".to_string()
            })
        );
        assert_eq!(game.increment_time(5), Err(GameError::InvalidPlayer(5)));

        let report = game.status_report();
        assert_eq!(report.increments_remaining, [0, 2]);

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_increment_extends_the_running_clock() {
        let game = test_game(test_ruleset());
        game.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        game.increment_time(1).unwrap();
        let remaining = game.pause().unwrap();
        assert!(
            remaining > 84.0 && remaining <= 85.0,
            "60s initial + 25s increment, got {remaining}"
        );

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_from_paused_releases_both_workers() {
        let game = test_game(test_ruleset());
        game.start().unwrap();
        game.pause().unwrap();

        let (timer, detector) = {
            let inner = game.inner.lock();
            (
                inner.timer.clone().unwrap(),
                inner.detector.clone().unwrap(),
            )
        };

        game.end().unwrap();
        assert_eq!(game.status(), GameStatus::Ended);

        tokio::time::timeout(Duration::from_millis(100), timer.wait_stopped())
            .await
            .expect("timer worker must not stay parked after end()");
        tokio::time::timeout(Duration::from_millis(100), detector.wait_stopped())
            .await
            .expect("detector worker must not stay parked after end()");

        // double end is a no-op
        assert_eq!(game.end(), Ok(()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pause_resume_guards() {
        let game = test_game(test_ruleset());
        assert!(matches!(game.pause(), Err(GameError::NotRunning { .. })));

        game.start().unwrap();
        assert!(matches!(game.resume(), Err(GameError::NotPaused { .. })));

        game.pause().unwrap();
        game.resume().unwrap();
        assert_eq!(game.status(), GameStatus::Running);

        game.end().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_expiry_rotates_to_the_other_player() {
        let mut ruleset = test_ruleset();
        ruleset.initial_duration = 0.3;
        ruleset.alarm_time = 0.1;
        let game = test_game(ruleset);

        game.start().unwrap();
        assert_eq!(game.status_report().current_player, 0);

        tokio::time::sleep(Duration::from_millis(800)).await;

        let report = game.status_report();
        assert_eq!(report.status, GameStatus::Running);
        assert_eq!(report.current_player, 1, "expiry must advance the turn");
        let timer = game.inner.lock().timer.clone().unwrap();
        assert_eq!(timer.duration(), 35.0);

        game.end().unwrap();
    }
}

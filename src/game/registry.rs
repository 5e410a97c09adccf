// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Game registry - the process-wide "current game" owner
//!
//! Exactly one game is live at a time. Creating a new one always ends
//! and replaces the previous one. The registry is constructed at startup
//! and handed to the API layer; there is no global state.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::{Config, DetectionConfig, TimerConfig};
use crate::core::{AlarmSink, EventBus, GamePhase};
use crate::vision::{FrameSource, TablePreset};

use super::{Game, GameError, Ruleset};

/// Owner of the single live [`Game`].
pub struct GameRegistry {
    detection: DetectionConfig,
    timer: TimerConfig,
    events: Arc<EventBus>,
    alarm: Arc<dyn AlarmSink>,
    source: Arc<dyn FrameSource>,
    current: Mutex<Option<Arc<Game>>>,
}

impl GameRegistry {
    pub fn new(
        config: &Config,
        events: Arc<EventBus>,
        alarm: Arc<dyn AlarmSink>,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        Self {
            detection: config.detection.clone(),
            timer: config.timer.clone(),
            events,
            alarm,
            source,
            current: Mutex::new(None),
        }
    }

    /// Create the new current game, ending any previous one first.
    pub fn create_game(
        &self,
        ruleset: Ruleset,
        table: TablePreset,
        player1_name: impl Into<String>,
        player2_name: impl Into<String>,
    ) -> Arc<Game> {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            info!("Replacing live game");
            let _ = previous.end();
        }

        let game = Game::new(
            ruleset,
            table,
            player1_name,
            player2_name,
            self.detection.clone(),
            self.timer.clone(),
            self.events.clone(),
            self.alarm.clone(),
            self.source.clone(),
        );
        *current = Some(game.clone());
        drop(current);

        self.events.publish_game(GamePhase::Created);
        game
    }

    /// The live game, if any.
    pub fn current(&self) -> Option<Arc<Game>> {
        self.current.lock().clone()
    }

    /// End and drop the live game.
    pub fn end_game(&self) -> Result<(), GameError> {
        let mut current = self.current.lock();
        match current.take() {
            Some(game) => game.end(),
            None => Err(GameError::NoGameInProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoConfig;
    use crate::core::BusAlarm;
    use crate::game::GameStatus;
    use crate::vision::TableSimulator;

    fn test_registry() -> GameRegistry {
        let config = Config::default();
        let events = Arc::new(EventBus::new(64));
        let alarm = Arc::new(BusAlarm::new(events.clone()));
        let sim = Arc::new(TableSimulator::new(&VideoConfig {
            width: 120,
            height: 90,
            blur_radius: 1,
        }));
        GameRegistry::new(&config, events, alarm, sim)
    }

    fn sim_preset() -> TablePreset {
        TableSimulator::new(&VideoConfig {
            width: 120,
            height: 90,
            blur_radius: 1,
        })
        .preset()
    }

    #[test]
    fn test_create_replaces_and_ends_previous() {
        let registry = test_registry();
        assert!(registry.current().is_none());

        let first = registry.create_game(Ruleset::wpa(), sim_preset(), "A", "B");
        assert!(registry.current().is_some());

        let second = registry.create_game(Ruleset::wpa(), sim_preset(), "C", "D");
        assert_eq!(first.status(), GameStatus::Ended);
        assert_eq!(second.status(), GameStatus::Ready);
        assert!(Arc::ptr_eq(&registry.current().unwrap(), &second));
    }

    #[test]
    fn test_end_without_game_is_reported() {
        let registry = test_registry();
        assert_eq!(registry.end_game(), Err(GameError::NoGameInProgress));

        registry.create_game(Ruleset::wpa(), sim_preset(), "A", "B");
        assert_eq!(registry.end_game(), Ok(()));
        assert!(registry.current().is_none());
        assert_eq!(registry.end_game(), Err(GameError::NoGameInProgress));
    }
}

// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::streaming::StreamingConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Enable demo mode (simulated table camera)
    pub demo_mode: bool,

    /// Video source configuration
    pub video: VideoConfig,

    /// Motion detection configuration
    pub detection: DetectionConfig,

    /// Turn timer configuration
    pub timer: TimerConfig,

    /// Streaming configuration
    pub streaming: StreamingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "cueclock".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            demo_mode: true,
            video: VideoConfig::default(),
            detection: DetectionConfig::default(),
            timer: TimerConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("cueclock"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Video source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frame width in pixels
    pub width: usize,

    /// Frame height in pixels
    pub height: usize,

    /// Blur radius applied by the source for pre-blurred frames
    pub blur_radius: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            blur_radius: 2,
        }
    }
}

/// Motion detection strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MotionStrategy {
    /// Mask differencing with count-based debounce
    Differencing,
    /// Per-ball Kalman tracking with velocity thresholds
    Tracking,
}

/// Motion detection configuration
///
/// Every threshold here is tuned per camera and lighting setup; keep them
/// in configuration, not in control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Which detection strategy drives the movement signal
    pub strategy: MotionStrategy,

    /// Target processing rate in frames per second
    pub target_fps: f64,

    /// Ball-mask history length for frame differencing
    pub mask_history: usize,

    /// Per-frame motion decision history length
    pub decision_history: usize,

    /// Fraction of the decision history that must agree before the
    /// debounced state flips to "moving"
    pub debounce_fraction: f64,

    /// Minimum changed pixels between consecutive ball masks to call a
    /// single frame "moving"
    pub motion_pixel_threshold: usize,

    /// Minimum contour circularity (4*pi*area / perimeter^2) to accept a
    /// contour as a ball
    pub circularity_threshold: f64,

    /// Hue tolerance around the reference table colors
    pub hue_tolerance: i32,

    /// Saturation tolerance around the reference table colors
    pub saturation_tolerance: i32,

    /// Value tolerance around the reference table colors
    pub value_tolerance: i32,

    /// Erosion passes applied to the inverted color mask
    pub erode_iterations: usize,

    /// Dilation passes applied to the inverted color mask
    pub dilate_iterations: usize,

    /// Upper bound on accepted ball contours per frame
    pub max_balls: usize,

    /// Tracking-strategy tuning
    pub tracking: TrackingConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: MotionStrategy::Differencing,
            target_fps: 15.0,
            mask_history: 3,
            decision_history: 10,
            debounce_fraction: 0.8,
            motion_pixel_threshold: 150,
            circularity_threshold: 0.8,
            hue_tolerance: 5,
            saturation_tolerance: 10,
            value_tolerance: 5,
            erode_iterations: 3,
            dilate_iterations: 2,
            max_balls: 15,
            tracking: TrackingConfig::default(),
        }
    }
}

/// Kalman tracking strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Estimated speed (pixels/frame) above which a tracked ball counts
    /// as moving
    pub speed_threshold: f64,

    /// Maximum distance (pixels) to associate a detection with an
    /// existing tracker
    pub association_radius: f64,

    /// Per-tracker motion history length
    pub tracker_motion_window: usize,

    /// Samples of the per-tracker window that must agree
    pub tracker_motion_min: usize,

    /// Global motion history length
    pub global_motion_window: usize,

    /// Fraction of the global window that must agree
    pub global_motion_fraction: f64,

    /// Minimum seconds between reported state changes
    pub min_state_change_interval_secs: f64,

    /// Maximum simultaneously active trackers
    pub max_trackers: usize,

    /// Consecutive low-speed updates before a tracker counts as stable
    pub min_stability_frames: usize,

    /// Area margin applied on top of the preset minimum contour area
    pub area_margin: f64,

    /// Circularity gate for the tracking strategy (more permissive than
    /// the differencing gate)
    pub circularity_threshold: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 4.0,
            association_radius: 30.0,
            tracker_motion_window: 5,
            tracker_motion_min: 3,
            global_motion_window: 10,
            global_motion_fraction: 0.6,
            min_state_change_interval_secs: 0.6,
            max_trackers: 10,
            min_stability_frames: 5,
            area_margin: 1.1,
            circularity_threshold: 0.75,
        }
    }
}

/// Turn timer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Seconds between periodic remaining-time reports
    pub report_interval_secs: f64,

    /// Shortest sleep slice of the countdown worker, seconds
    pub min_slice_secs: f64,

    /// Longest sleep slice of the countdown worker, seconds
    pub max_slice_secs: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 1.0,
            min_slice_secs: 0.001,
            max_slice_secs: 0.1,
        }
    }
}

// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Kalman tracking strategy
//!
//! Alternative movement signal: each ball gets a 6-state (position,
//! velocity, acceleration) Kalman filter, detections are matched to
//! trackers nearest-neighbor, and the table counts as moving when enough
//! recent samples saw at least one tracker above the speed threshold.

use std::time::Instant;

use nalgebra::{SMatrix, SVector};

use crate::config::{DetectionConfig, TrackingConfig};

use super::detector::{MotionEdge, MotionPipeline};
use super::{contour, mask, Frame, SampleWindow, TablePreset};

type Vector6 = SVector<f64, 6>;
type Matrix6 = SMatrix<f64, 6, 6>;
type Matrix2x6 = SMatrix<f64, 2, 6>;
type Matrix2 = SMatrix<f64, 2, 2>;
type Vector2 = SVector<f64, 2>;

/// Single-ball tracker estimating position, velocity and acceleration.
pub struct BallTracker {
    x: Vector6,
    p: Matrix6,
    last_prediction: Option<(f64, f64)>,
    age: usize,
    missed_updates: usize,
    is_moving: bool,
    motion_history: SampleWindow<bool>,
    is_stable: bool,
    stability_count: usize,
    config: TrackingConfig,
}

impl BallTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            x: Vector6::zeros(),
            p: Matrix6::identity(),
            last_prediction: None,
            age: 0,
            missed_updates: 0,
            is_moving: false,
            motion_history: SampleWindow::new(config.tracker_motion_window),
            is_stable: false,
            stability_count: 0,
            config,
        }
    }

    // x' = x + dx + 0.5 ddx, dx' = dx + ddx, ddx' = ddx (same for y)
    fn transition() -> Matrix6 {
        #[rustfmt::skip]
        let f = Matrix6::from_row_slice(&[
            1.0, 0.0, 1.0, 0.0, 0.5, 0.0,
            0.0, 1.0, 0.0, 1.0, 0.0, 0.5,
            0.0, 0.0, 1.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ]);
        f
    }

    // only x and y are observed
    fn measurement() -> Matrix2x6 {
        #[rustfmt::skip]
        let h = Matrix2x6::from_row_slice(&[
            1.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0,
        ]);
        h
    }

    /// Advance the filter, optionally correcting with a measured
    /// position. Returns the estimated position.
    pub fn update(&mut self, measurement: Option<(f64, f64)>) -> (f64, f64) {
        self.age += 1;

        let f = Self::transition();
        let q = Matrix6::identity() * 0.01;
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + q;

        match measurement {
            None => {
                self.missed_updates += 1;
                self.stability_count = self.stability_count.saturating_sub(1);
            }
            Some((mx, my)) => {
                self.missed_updates = 0;

                let h = Self::measurement();
                let r = Matrix2::identity() * 0.1;
                let z = Vector2::new(mx, my);
                let innovation = z - h * self.x;
                let s = h * self.p * h.transpose() + r;
                if let Some(s_inv) = s.try_inverse() {
                    let gain = self.p * h.transpose() * s_inv;
                    self.x += gain * innovation;
                    self.p = (Matrix6::identity() - gain * h) * self.p;
                }

                // a run of low-speed corrected updates makes the tracker
                // stable enough to trust
                if self.speed() < self.config.speed_threshold * 0.75 {
                    self.stability_count += 1;
                    if self.stability_count >= self.config.min_stability_frames {
                        self.is_stable = true;
                    }
                } else {
                    self.stability_count = self.stability_count.saturating_sub(1);
                }
            }
        }

        self.motion_history
            .push(self.speed() > self.config.speed_threshold);
        if self.motion_history.len() >= self.config.tracker_motion_min {
            let moving_samples = self.motion_history.iter().filter(|&&m| m).count();
            self.is_moving = moving_samples >= self.config.tracker_motion_min;
        }

        let prediction = (self.x[0], self.x[1]);
        self.last_prediction = Some(prediction);
        prediction
    }

    /// Estimated speed in pixels per frame.
    pub fn speed(&self) -> f64 {
        (self.x[2] * self.x[2] + self.x[3] * self.x[3]).sqrt()
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    /// A tracker is kept while stable, or while still young and fed.
    pub fn is_valid(&self) -> bool {
        (self.is_stable && self.missed_updates < 10)
            || (self.age < 10 && self.missed_updates < 3)
    }

    pub fn last_prediction(&self) -> Option<(f64, f64)> {
        self.last_prediction
    }

    fn retention_rank(&self) -> f64 {
        self.stability_count as f64 + self.age as f64 / 10.0
    }
}

/// Tracking pipeline implementing the movement-signal contract.
pub struct TrackingPipeline {
    config: DetectionConfig,
    preset: TablePreset,
    trackers: Vec<BallTracker>,
    global_history: SampleWindow<bool>,
    moving: bool,
    last_state_change: Option<Instant>,
}

impl TrackingPipeline {
    pub fn new(config: DetectionConfig, preset: TablePreset) -> Self {
        let global_history = SampleWindow::new(config.tracking.global_motion_window);
        Self {
            config,
            preset,
            trackers: Vec::new(),
            global_history,
            moving: false,
            last_state_change: None,
        }
    }

    /// Ball centers for one frame, largest areas first.
    fn detect_centers(&self, frame: &Frame) -> Vec<(f64, f64)> {
        let hsv = frame.to_hsv();
        let objects = mask::table_object_mask(&hsv, &self.preset, &self.config);

        let min_area = self.preset.min_area_threshold * self.config.tracking.area_margin;
        let mut balls = contour::find_ball_contours(
            &objects,
            min_area,
            self.config.tracking.circularity_threshold,
        );
        balls.sort_by(|a, b| b.area.total_cmp(&a.area));
        balls
            .into_iter()
            .take(self.config.max_balls)
            .map(|c| c.centroid)
            .collect()
    }

    /// Feed detections to the tracker pool, nearest-neighbor matched.
    fn associate(&mut self, detections: &[(f64, f64)]) {
        let tracking = &self.config.tracking;

        self.trackers.retain(|t| t.is_valid());
        if self.trackers.len() > tracking.max_trackers {
            self.trackers
                .sort_by(|a, b| b.retention_rank().total_cmp(&a.retention_rank()));
            self.trackers.truncate(tracking.max_trackers);
        }

        if detections.is_empty() {
            for tracker in self.trackers.iter_mut() {
                tracker.update(None);
            }
            return;
        }

        if self.trackers.is_empty() {
            for &center in detections.iter().take(tracking.max_trackers) {
                let mut tracker = BallTracker::new(tracking.clone());
                tracker.update(Some(center));
                self.trackers.push(tracker);
            }
            return;
        }

        let mut assigned = vec![false; detections.len()];
        for tracker in self.trackers.iter_mut() {
            let prediction = tracker.last_prediction();
            let nearest = detections
                .iter()
                .enumerate()
                .filter(|(i, _)| !assigned[*i])
                .map(|(i, &(dx, dy))| {
                    let dist = match prediction {
                        Some((px, py)) => ((px - dx).powi(2) + (py - dy).powi(2)).sqrt(),
                        None => f64::INFINITY,
                    };
                    (i, dist)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match nearest {
                Some((i, dist)) if dist < tracking.association_radius => {
                    tracker.update(Some(detections[i]));
                    assigned[i] = true;
                }
                _ => {
                    tracker.update(None);
                }
            }
        }

        // spawn trackers for leftover detections, keeping headroom so a
        // noisy frame cannot flood the pool
        let spawn_cap = (tracking.max_trackers as f64 * 0.7) as usize;
        if self.trackers.len() < spawn_cap {
            for (i, &center) in detections.iter().enumerate() {
                if !assigned[i] && self.trackers.len() < tracking.max_trackers {
                    let mut tracker = BallTracker::new(tracking.clone());
                    tracker.update(Some(center));
                    self.trackers.push(tracker);
                }
            }
        }
    }

    /// Debounced global state, with a temporal floor between changes.
    fn update_motion_state(&mut self) -> Option<MotionEdge> {
        let tracking = &self.config.tracking;

        let any_moving = self.trackers.iter().any(|t| t.is_moving());
        self.global_history.push(any_moving);

        // half-full window is enough to judge
        if self.global_history.len() < tracking.global_motion_window.div_ceil(2) {
            return None;
        }

        let moving_samples = self.global_history.iter().filter(|&&m| m).count();
        let fraction = moving_samples as f64 / self.global_history.len() as f64;
        let new_state = fraction >= tracking.global_motion_fraction;

        if new_state == self.moving {
            return None;
        }
        let interval_ok = self
            .last_state_change
            .map(|t| t.elapsed().as_secs_f64() > tracking.min_state_change_interval_secs)
            .unwrap_or(true);
        if !interval_ok {
            return None;
        }

        self.moving = new_state;
        self.last_state_change = Some(Instant::now());
        Some(if new_state {
            MotionEdge::Started
        } else {
            MotionEdge::Stopped
        })
    }
}

impl MotionPipeline for TrackingPipeline {
    fn process(&mut self, frame: &Frame) -> Option<MotionEdge> {
        let centers = self.detect_centers(frame);
        self.associate(&centers);
        self.update_motion_state()
    }

    fn reset(&mut self) {
        self.trackers.clear();
        self.global_history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionStrategy;
    use crate::vision::Hsv;
    use ndarray::Array3;

    #[test]
    fn test_tracker_flags_fast_target_as_moving() {
        let mut tracker = BallTracker::new(TrackingConfig::default());
        for i in 0..12 {
            tracker.update(Some((100.0 + 10.0 * i as f64, 150.0)));
        }
        assert!(tracker.is_moving());
        assert!(tracker.speed() > 4.0);
    }

    #[test]
    fn test_tracker_settles_on_static_target() {
        let mut tracker = BallTracker::new(TrackingConfig::default());
        for _ in 0..20 {
            tracker.update(Some((200.0, 150.0)));
        }
        assert!(!tracker.is_moving());
        assert!(tracker.is_valid(), "a fed, settled tracker stays valid");
    }

    #[test]
    fn test_unfed_young_tracker_expires() {
        let mut tracker = BallTracker::new(TrackingConfig::default());
        tracker.update(Some((50.0, 50.0)));
        for _ in 0..3 {
            tracker.update(None);
        }
        assert!(!tracker.is_valid());
    }

    const W: usize = 200;
    const H: usize = 60;
    const FELT: (u8, u8, u8) = (30, 120, 60);

    fn frame_with_ball(ball_x: f64) -> Frame {
        let mut pixels: Array3<u8> = Array3::zeros((H, W, 3));
        for y in 0..H {
            for x in 0..W {
                pixels[(y, x, 0)] = FELT.0;
                pixels[(y, x, 1)] = FELT.1;
                pixels[(y, x, 2)] = FELT.2;
            }
        }
        let r = 8.0;
        for y in 0..H {
            for x in 0..W {
                let dx = x as f64 - ball_x;
                let dy = y as f64 - 30.0;
                if dx * dx + dy * dy <= r * r {
                    pixels[(y, x, 0)] = 180;
                    pixels[(y, x, 1)] = 40;
                    pixels[(y, x, 2)] = 35;
                }
            }
        }
        Frame::from_pixels(pixels)
    }

    #[test]
    fn test_pipeline_reports_movement_start_once() {
        let config = DetectionConfig {
            strategy: MotionStrategy::Tracking,
            erode_iterations: 1,
            dilate_iterations: 1,
            tracking: TrackingConfig {
                min_state_change_interval_secs: 0.0,
                ..TrackingConfig::default()
            },
            ..DetectionConfig::default()
        };
        let preset = TablePreset {
            id: 0,
            name: "test".to_string(),
            points: vec![(2, 2), (198, 2), (198, 58), (2, 58)],
            colors: vec![Hsv::from_rgb(FELT.0, FELT.1, FELT.2)],
            min_area_threshold: 50.0,
        };

        // ball rolls 6 px/frame, well above the 4 px/frame speed threshold
        let mut pipeline = TrackingPipeline::new(config, preset);
        let mut edges = Vec::new();
        for i in 0..28 {
            let frame = frame_with_ball(15.0 + 6.0 * i as f64);
            if let Some(edge) = pipeline.process(&frame) {
                edges.push(edge);
            }
        }

        assert_eq!(edges, vec![MotionEdge::Started]);
    }
}

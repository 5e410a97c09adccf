// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Motion detector - debounced "table is moving" signal
//!
//! A dedicated worker pulls frames, isolates balls and keeps two fixed
//! windows: recent ball masks (for frame differencing) and recent
//! per-frame motion decisions (for debounce). Edge callbacks fire only
//! when the debounced state changes, so they strictly alternate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, MotionStrategy};

use super::kalman::TrackingPipeline;
use super::{contour, mask, Frame, FrameSource, SampleWindow, TablePreset};

/// Callback fired on a debounced movement edge.
pub type EdgeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// A change of the debounced movement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEdge {
    Started,
    Stopped,
}

/// One frame-to-signal strategy. Implementations keep their own history
/// and report an edge only when the debounced state flips.
pub trait MotionPipeline: Send {
    /// Consume one frame, maybe producing an edge.
    fn process(&mut self, frame: &Frame) -> Option<MotionEdge>;

    /// Drop accumulated history (used when the detector is paused, so a
    /// stale window never contaminates the next active period).
    fn reset(&mut self);
}

/// Frame-differencing pipeline: ball-mask differences debounced over a
/// decision window.
pub struct DifferencingPipeline {
    config: DetectionConfig,
    preset: TablePreset,
    masks: SampleWindow<Array2<u8>>,
    decisions: SampleWindow<bool>,
    moving: bool,
    last_score: usize,
}

impl DifferencingPipeline {
    pub fn new(config: DetectionConfig, preset: TablePreset) -> Self {
        let masks = SampleWindow::new(config.mask_history);
        let decisions = SampleWindow::new(config.decision_history);
        Self {
            config,
            preset,
            masks,
            decisions,
            moving: false,
            last_score: 0,
        }
    }

    /// Debounced state as last reported.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Motion score of the most recent full mask window.
    pub fn last_motion_score(&self) -> usize {
        self.last_score
    }

    /// Clean per-frame ball mask: accepted contours, filled.
    fn ball_mask(&self, frame: &Frame) -> Array2<u8> {
        let hsv = frame.to_hsv();
        let objects = mask::table_object_mask(&hsv, &self.preset, &self.config);

        let mut balls = contour::find_ball_contours(
            &objects,
            self.preset.min_area_threshold,
            self.config.circularity_threshold,
        );
        balls.sort_by(|a, b| b.area.total_cmp(&a.area));

        let mut rendered = Array2::zeros(objects.dim());
        for ball in balls.iter().take(self.config.max_balls) {
            ball.fill_into(&mut rendered);
        }
        rendered
    }
}

/// Largest non-zero pixel count among consecutive mask differences.
pub(crate) fn motion_score(masks: &SampleWindow<Array2<u8>>) -> usize {
    let masks: Vec<&Array2<u8>> = masks.iter().collect();
    masks
        .windows(2)
        .map(|pair| {
            pair[0]
                .iter()
                .zip(pair[1].iter())
                .filter(|(a, b)| a != b)
                .count()
        })
        .max()
        .unwrap_or(0)
}

impl MotionPipeline for DifferencingPipeline {
    fn process(&mut self, frame: &Frame) -> Option<MotionEdge> {
        self.masks.push(self.ball_mask(frame));
        if !self.masks.is_full() {
            return None;
        }

        let score = motion_score(&self.masks);
        self.last_score = score;
        self.decisions.push(score > self.config.motion_pixel_threshold);
        if !self.decisions.is_full() {
            return None;
        }

        let agreeing = self.decisions.iter().filter(|&&moving| moving).count();
        let fraction = agreeing as f64 / self.decisions.len() as f64;
        let now_moving = fraction >= self.config.debounce_fraction;

        if now_moving != self.moving {
            self.moving = now_moving;
            return Some(if now_moving {
                MotionEdge::Started
            } else {
                MotionEdge::Stopped
            });
        }
        None
    }

    fn reset(&mut self) {
        self.masks.clear();
        self.decisions.clear();
    }
}

struct WorkerSeed {
    pipeline: Box<dyn MotionPipeline>,
    source: Arc<dyn FrameSource>,
    on_started: EdgeCallback,
    on_stopped: EdgeCallback,
    target_fps: f64,
}

/// Debounced movement signal for one match.
///
/// Owns one worker; `start` is called exactly once per game, `end` is
/// guaranteed to release the worker in bounded time even while paused.
pub struct MotionDetector {
    gate: watch::Sender<bool>,
    ended: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    seed: Mutex<Option<WorkerSeed>>,
}

impl MotionDetector {
    pub fn new(
        config: DetectionConfig,
        preset: TablePreset,
        source: Arc<dyn FrameSource>,
        on_started: EdgeCallback,
        on_stopped: EdgeCallback,
    ) -> Self {
        let pipeline: Box<dyn MotionPipeline> = match config.strategy {
            MotionStrategy::Differencing => {
                Box::new(DifferencingPipeline::new(config.clone(), preset))
            }
            MotionStrategy::Tracking => Box::new(TrackingPipeline::new(config.clone(), preset)),
        };
        let (gate, _) = watch::channel(false);

        Self {
            gate,
            ended: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            seed: Mutex::new(Some(WorkerSeed {
                pipeline,
                source,
                on_started,
                on_stopped,
                target_fps: config.target_fps,
            })),
        }
    }

    /// Launch the worker. Subsequent calls are a logged no-op.
    pub fn start(&self) {
        let Some(seed) = self.seed.lock().take() else {
            warn!("Motion detector already started");
            return;
        };
        self.gate.send_replace(true);
        let rx = self.gate.subscribe();
        let ended = self.ended.clone();
        let handle = tokio::spawn(run_worker(seed, rx, ended));
        *self.handle.lock() = Some(handle);
    }

    /// Idle the worker; history is cleared before idling.
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    /// Wake the worker from pause.
    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Terminate the worker, releasing it even if parked in pause.
    pub fn end(&self) {
        self.ended.store(true, Ordering::Release);
        self.gate.send_replace(true);
    }

    /// Wait for the worker to exit. Returns immediately if it never ran.
    pub async fn wait_stopped(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_worker(mut seed: WorkerSeed, mut gate: watch::Receiver<bool>, ended: Arc<AtomicBool>) {
    let period = Duration::from_secs_f64(1.0 / seed.target_fps.max(1.0));
    info!("Motion detector worker started");

    loop {
        if ended.load(Ordering::Acquire) {
            break;
        }

        if !*gate.borrow_and_update() {
            seed.pipeline.reset();
            if gate.changed().await.is_err() {
                break;
            }
            continue;
        }

        if !seed.source.is_opened() {
            info!("Frame source closed, stopping motion detector");
            break;
        }

        let frame = match seed.source.frame_blurred().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Frame fetch failed: {e}");
                if !seed.source.is_opened() {
                    info!("Frame source closed, stopping motion detector");
                    break;
                }
                tokio::time::sleep(period).await;
                continue;
            }
        };

        match seed.pipeline.process(&frame) {
            Some(MotionEdge::Started) => {
                info!("Movement started");
                (seed.on_started)();
            }
            Some(MotionEdge::Stopped) => {
                info!("Movement stopped");
                (seed.on_stopped)();
            }
            None => {}
        }

        tokio::time::sleep(period).await;
    }

    info!("Motion detector worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Hsv, TableSimulator};
    use ndarray::Array3;
    use std::sync::atomic::AtomicUsize;

    const W: usize = 80;
    const H: usize = 60;
    const FELT: (u8, u8, u8) = (30, 120, 60);

    fn test_preset() -> TablePreset {
        TablePreset {
            id: 0,
            name: "test".to_string(),
            points: vec![(2, 2), (78, 2), (78, 58), (2, 58)],
            colors: vec![Hsv::from_rgb(FELT.0, FELT.1, FELT.2)],
            min_area_threshold: 50.0,
        }
    }

    fn test_config() -> DetectionConfig {
        DetectionConfig {
            mask_history: 3,
            decision_history: 4,
            debounce_fraction: 0.75,
            motion_pixel_threshold: 20,
            circularity_threshold: 0.75,
            erode_iterations: 1,
            dilate_iterations: 1,
            ..DetectionConfig::default()
        }
    }

    /// Felt-colored frame with one red ball centered at (x, 30).
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
    fn test_static_scene_scores_zero_and_stays_still() {
        let mut pipeline = DifferencingPipeline::new(test_config(), test_preset());
        let frame = frame_with_ball(30.0);

        for _ in 0..12 {
            assert_eq!(pipeline.process(&frame), None);
        }
        assert_eq!(pipeline.last_motion_score(), 0);
        assert!(!pipeline.is_moving());
    }

    #[test]
    fn test_displaced_ball_fires_started_once() {
        let mut pipeline = DifferencingPipeline::new(test_config(), test_preset());

        let mut edges = Vec::new();
        for i in 0..12 {
            let frame = frame_with_ball(15.0 + 4.0 * i as f64);
            if let Some(edge) = pipeline.process(&frame) {
                edges.push(edge);
            }
        }

        assert_eq!(edges, vec![MotionEdge::Started]);
        assert!(pipeline.is_moving());
    }

    #[test]
    fn test_edges_alternate_started_then_stopped() {
        let mut pipeline = DifferencingPipeline::new(test_config(), test_preset());

        let mut edges = Vec::new();
        for i in 0..12 {
            let frame = frame_with_ball(15.0 + 4.0 * i as f64);
            if let Some(edge) = pipeline.process(&frame) {
                edges.push(edge);
            }
        }
        let resting = frame_with_ball(59.0);
        for _ in 0..12 {
            if let Some(edge) = pipeline.process(&resting) {
                edges.push(edge);
            }
        }

        assert_eq!(edges, vec![MotionEdge::Started, MotionEdge::Stopped]);
    }

    #[test]
    fn test_reset_clears_windows_but_keeps_state() {
        let mut pipeline = DifferencingPipeline::new(test_config(), test_preset());
        for i in 0..12 {
            pipeline.process(&frame_with_ball(15.0 + 4.0 * i as f64));
        }
        assert!(pipeline.is_moving());

        pipeline.reset();
        assert!(pipeline.masks.is_empty());
        assert!(pipeline.decisions.is_empty());
        assert!(pipeline.is_moving(), "reported state survives a reset");
    }

    #[test]
    fn test_motion_score_counts_changed_pixels() {
        let mut masks = SampleWindow::new(3);
        let mut a: Array2<u8> = Array2::zeros((4, 4));
        a[(0, 0)] = 255;
        let mut b: Array2<u8> = Array2::zeros((4, 4));
        b[(0, 1)] = 255;

        masks.push(a.clone());
        masks.push(a);
        masks.push(b);

        // first pair identical, second pair differs in two pixels
        assert_eq!(motion_score(&masks), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_detects_simulated_break() {
        let video = crate::config::VideoConfig {
            width: 160,
            height: 120,
            blur_radius: 1,
        };
        let sim = Arc::new(TableSimulator::new(&video));
        let preset = sim.preset();

        let mut config = test_config();
        config.target_fps = 60.0;
        config.decision_history = 5;
        config.debounce_fraction = 0.8;

        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let started_cb = started.clone();
        let stopped_cb = stopped.clone();

        let detector = MotionDetector::new(
            config,
            preset,
            sim.clone(),
            Box::new(move || {
                started_cb.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move || {
                stopped_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        detector.start();

        // stationary warmup: no edges
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(started.load(Ordering::SeqCst), 0);

        sim.set_velocity(1, (5.0, 2.0));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        detector.end();
        tokio::time::timeout(Duration::from_millis(500), detector.wait_stopped())
            .await
            .expect("worker should stop promptly after end()");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_end_releases_paused_worker() {
        let video = crate::config::VideoConfig {
            width: 120,
            height: 90,
            blur_radius: 1,
        };
        let sim = Arc::new(TableSimulator::new(&video));
        let preset = sim.preset();

        let detector = MotionDetector::new(
            test_config(),
            preset,
            sim,
            Box::new(|| {}),
            Box::new(|| {}),
        );
        detector.start();
        detector.pause();
        tokio::time::sleep(Duration::from_millis(50)).await;

        detector.end();
        tokio::time::timeout(Duration::from_millis(100), detector.wait_stopped())
            .await
            .expect("paused worker must be released by end()");
    }
}

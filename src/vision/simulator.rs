// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Simulated table camera for demo mode and tests

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ndarray::{Array2, Array3};
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;

use crate::config::VideoConfig;

use super::{mask, Frame, FrameSource, Hsv, TablePreset};

/// A ball on the simulated table.
#[derive(Debug, Clone)]
pub struct SimulatedBall {
    pub center: (f64, f64),
    pub radius: f64,
    pub velocity: (f64, f64),
    pub color: (u8, u8, u8),
}

struct SimState {
    balls: Vec<SimulatedBall>,
    rng: StdRng,
}

/// Frame source that renders a felt-colored table with circular balls.
///
/// Ball velocities are in pixels per rendered frame; rendering advances
/// the scene, so pulling frames plays the animation.
pub struct TableSimulator {
    width: usize,
    height: usize,
    blur_radius: usize,
    points: Vec<(i32, i32)>,
    table_mask: Array2<u8>,
    felt: (u8, u8, u8),
    border: (u8, u8, u8),
    noise_std: f64,
    state: Mutex<SimState>,
    open: AtomicBool,
}

impl TableSimulator {
    /// Demo scene: inset rectangular table, three stationary balls.
    pub fn new(video: &VideoConfig) -> Self {
        let (w, h) = (video.width, video.height);
        let inset = (w.min(h) / 9) as i32;
        let points = vec![
            (inset, inset),
            (w as i32 - inset, inset),
            (w as i32 - inset, h as i32 - inset),
            (inset, h as i32 - inset),
        ];
        let table_mask = mask::polygon_mask(h, w, &points);

        let balls = vec![
            SimulatedBall {
                center: (w as f64 * 0.3, h as f64 * 0.45),
                radius: 9.0,
                velocity: (0.0, 0.0),
                color: (236, 232, 214),
            },
            SimulatedBall {
                center: (w as f64 * 0.5, h as f64 * 0.55),
                radius: 9.0,
                velocity: (0.0, 0.0),
                color: (180, 40, 35),
            },
            SimulatedBall {
                center: (w as f64 * 0.65, h as f64 * 0.5),
                radius: 9.0,
                velocity: (0.0, 0.0),
                color: (210, 170, 40),
            },
        ];

        Self {
            width: w,
            height: h,
            blur_radius: video.blur_radius,
            points,
            table_mask,
            felt: (30, 120, 60),
            border: (60, 40, 25),
            noise_std: 0.0,
            state: Mutex::new(SimState {
                balls,
                rng: StdRng::seed_from_u64(0x5107c10c),
            }),
            open: AtomicBool::new(true),
        }
    }

    /// Per-frame felt color jitter, in channel units.
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.noise_std = std_dev;
        self
    }

    /// Table preset matching the rendered scene.
    pub fn preset(&self) -> TablePreset {
        let felt = Hsv::from_rgb(self.felt.0, self.felt.1, self.felt.2);
        TablePreset {
            id: 0,
            name: "simulated".to_string(),
            points: self.points.clone(),
            colors: vec![felt],
            min_area_threshold: 100.0,
        }
    }

    /// Set one ball's velocity, pixels per frame.
    pub fn set_velocity(&self, ball: usize, velocity: (f64, f64)) {
        let mut state = self.state.lock();
        if let Some(b) = state.balls.get_mut(ball) {
            b.velocity = velocity;
        }
    }

    /// Stop every ball.
    pub fn stop_all(&self) {
        let mut state = self.state.lock();
        for b in state.balls.iter_mut() {
            b.velocity = (0.0, 0.0);
        }
    }

    /// Stop producing frames.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn advance_and_render(&self) -> Frame {
        let mut state = self.state.lock();

        // advance balls, reflecting off the table edge
        let inset = (self.width.min(self.height) / 9) as f64;
        let (min_x, max_x) = (inset + 2.0, self.width as f64 - inset - 2.0);
        let (min_y, max_y) = (inset + 2.0, self.height as f64 - inset - 2.0);
        for b in state.balls.iter_mut() {
            let nx = b.center.0 + b.velocity.0;
            let ny = b.center.1 + b.velocity.1;
            if nx - b.radius < min_x || nx + b.radius > max_x {
                b.velocity.0 = -b.velocity.0;
            }
            if ny - b.radius < min_y || ny + b.radius > max_y {
                b.velocity.1 = -b.velocity.1;
            }
            b.center.0 += b.velocity.0;
            b.center.1 += b.velocity.1;
        }

        let felt = if self.noise_std > 0.0 {
            let normal = Normal::new(0.0, self.noise_std).unwrap();
            let jitter = |base: u8, rng: &mut StdRng| -> u8 {
                (base as f64 + normal.sample(rng)).clamp(0.0, 255.0) as u8
            };
            (
                jitter(self.felt.0, &mut state.rng),
                jitter(self.felt.1, &mut state.rng),
                jitter(self.felt.2, &mut state.rng),
            )
        } else {
            self.felt
        };

        let mut pixels: Array3<u8> = Array3::zeros((self.height, self.width, 3));
        for y in 0..self.height {
            for x in 0..self.width {
                let (r, g, b) = if self.table_mask[(y, x)] != 0 {
                    felt
                } else {
                    self.border
                };
                pixels[(y, x, 0)] = r;
                pixels[(y, x, 1)] = g;
                pixels[(y, x, 2)] = b;
            }
        }

        for ball in &state.balls {
            let r = ball.radius;
            let y0 = ((ball.center.1 - r).floor().max(0.0)) as usize;
            let y1 = ((ball.center.1 + r).ceil().min(self.height as f64 - 1.0)) as usize;
            let x0 = ((ball.center.0 - r).floor().max(0.0)) as usize;
            let x1 = ((ball.center.0 + r).ceil().min(self.width as f64 - 1.0)) as usize;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let dx = x as f64 - ball.center.0;
                    let dy = y as f64 - ball.center.1;
                    if dx * dx + dy * dy <= r * r {
                        pixels[(y, x, 0)] = ball.color.0;
                        pixels[(y, x, 1)] = ball.color.1;
                        pixels[(y, x, 2)] = ball.color.2;
                    }
                }
            }
        }

        Frame::from_pixels(pixels)
    }
}

#[async_trait]
impl FrameSource for TableSimulator {
    async fn frame(&self) -> Result<Frame> {
        if !self.is_opened() {
            return Err(anyhow!("simulated source is closed"));
        }
        Ok(self.advance_and_render())
    }

    async fn frame_blurred(&self) -> Result<Frame> {
        if !self.is_opened() {
            return Err(anyhow!("simulated source is closed"));
        }
        Ok(self.advance_and_render().box_blur(self.blur_radius))
    }

    fn is_opened(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_video() -> VideoConfig {
        VideoConfig {
            width: 160,
            height: 120,
            blur_radius: 1,
        }
    }

    #[tokio::test]
    async fn test_renders_frames_until_closed() {
        let sim = TableSimulator::new(&small_video());
        assert!(sim.is_opened());

        let frame = sim.frame().await.unwrap();
        assert_eq!(frame.width(), 160);
        assert_eq!(frame.height(), 120);

        sim.close();
        assert!(!sim.is_opened());
        assert!(sim.frame().await.is_err());
    }

    #[tokio::test]
    async fn test_moving_ball_changes_pixels() {
        let sim = TableSimulator::new(&small_video());
        sim.set_velocity(0, (4.0, 0.0));

        let a = sim.frame().await.unwrap();
        let b = sim.frame().await.unwrap();

        let diff = a
            .pixels()
            .iter()
            .zip(b.pixels().iter())
            .filter(|(x, y)| x != y)
            .count();
        assert!(diff > 0, "moving ball should change the rendered frame");
    }

    #[test]
    fn test_preset_covers_scene() {
        let sim = TableSimulator::new(&small_video());
        let preset = sim.preset();
        assert_eq!(preset.points.len(), 4);
        assert_eq!(preset.colors.len(), 1);
        assert!(preset.min_area_threshold > 0.0);
    }
}

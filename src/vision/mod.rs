// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Vision module - table presets, masking, contours and motion detection

mod contour;
mod detector;
mod frame;
mod kalman;
mod mask;
mod simulator;
mod source;

pub use contour::{find_ball_contours, find_external_contours, Contour};
pub use detector::{DifferencingPipeline, EdgeCallback, MotionDetector, MotionEdge, MotionPipeline};
pub use frame::Frame;
pub use kalman::{BallTracker, TrackingPipeline};
pub use mask::{color_bounds, color_range_mask, dilate, erode, polygon_mask, table_object_mask};
pub use simulator::{SimulatedBall, TableSimulator};
pub use source::FrameSource;

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A color in OpenCV-convention HSV: hue 0-179, saturation and value 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    /// Convert an RGB triple to OpenCV HSV.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let rf = r as f64 / 255.0;
        let gf = g as f64 / 255.0;
        let bf = b as f64 / 255.0;

        let maxc = rf.max(gf).max(bf);
        let minc = rf.min(gf).min(bf);
        let v = maxc;

        if maxc == minc {
            return Self {
                h: 0,
                s: 0,
                v: (v * 255.0) as u8,
            };
        }

        let s = (maxc - minc) / maxc;
        let delta = maxc - minc;
        let rc = (maxc - rf) / delta;
        let gc = (maxc - gf) / delta;
        let bc = (maxc - bf) / delta;

        let h = if maxc == rf {
            bc - gc
        } else if maxc == gf {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        let h = (h / 6.0).rem_euclid(1.0);

        Self {
            h: (h * 179.0) as u8,
            s: (s * 255.0) as u8,
            v: (v * 255.0) as u8,
        }
    }

    /// Parse a `#rrggbb` hex color into OpenCV HSV.
    pub fn from_hex(color: &str) -> Result<Self> {
        let hex = color.strip_prefix('#').unwrap_or(color);
        if hex.len() != 6 {
            return Err(anyhow!("expected #rrggbb, got {color:?}"));
        }
        let r = u8::from_str_radix(&hex[0..2], 16)?;
        let g = u8::from_str_radix(&hex[2..4], 16)?;
        let b = u8::from_str_radix(&hex[4..6], 16)?;
        Ok(Self::from_rgb(r, g, b))
    }
}

/// Calibration data for one physical table setup.
///
/// `points` is the clockwise boundary polygon of the playing surface in
/// frame coordinates; `colors` are reference felt colors; contours below
/// `min_area_threshold` pixels are never considered balls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePreset {
    pub id: u32,
    pub name: String,
    pub points: Vec<(i32, i32)>,
    pub colors: Vec<Hsv>,
    pub min_area_threshold: f64,
}

impl TablePreset {
    /// Build a preset from `#rrggbb` felt color strings.
    pub fn from_hex_colors(
        id: u32,
        name: impl Into<String>,
        points: Vec<(i32, i32)>,
        colors: &[&str],
        min_area_threshold: f64,
    ) -> Result<Self> {
        let colors = colors
            .iter()
            .map(|c| Hsv::from_hex(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id,
            name: name.into(),
            points,
            colors,
            min_area_threshold,
        })
    }
}

/// Fixed-capacity sample window. Pushing beyond capacity drops the oldest
/// sample.
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> SampleWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(sample);
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_opencv_hsv() {
        // #45c6ed -> rgb(69, 198, 237)
        let hsv = Hsv::from_hex("#45c6ed").unwrap();
        assert_eq!(hsv, Hsv::new(96, 180, 237));

        // Grey has no saturation and an arbitrary (zero) hue
        let grey = Hsv::from_rgb(128, 128, 128);
        assert_eq!(grey.h, 0);
        assert_eq!(grey.s, 0);
    }

    #[test]
    fn test_hex_rejects_malformed() {
        assert!(Hsv::from_hex("#12345").is_err());
        assert!(Hsv::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_sample_window_drops_oldest() {
        let mut window = SampleWindow::new(3);
        assert!(!window.is_full());

        for i in 0..5 {
            window.push(i);
        }

        assert!(window.is_full());
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        window.clear();
        assert!(window.is_empty());
    }
}

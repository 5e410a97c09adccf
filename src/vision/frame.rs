// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Frame type and pixel-level conversions

use ndarray::Array3;

use super::Hsv;

/// A single RGB camera frame, stored as a `(height, width, 3)` plane.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// Create a black frame.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            pixels: Array3::zeros((height, width, 3)),
        }
    }

    /// Wrap an existing `(height, width, 3)` pixel plane.
    pub fn from_pixels(pixels: Array3<u8>) -> Self {
        debug_assert_eq!(pixels.dim().2, 3);
        Self { pixels }
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    /// Convert to an HSV plane in OpenCV ranges (H 0-179, S/V 0-255).
    pub fn to_hsv(&self) -> Array3<u8> {
        let (h, w, _) = self.pixels.dim();
        let mut out = Array3::zeros((h, w, 3));
        for y in 0..h {
            for x in 0..w {
                let hsv = Hsv::from_rgb(
                    self.pixels[(y, x, 0)],
                    self.pixels[(y, x, 1)],
                    self.pixels[(y, x, 2)],
                );
                out[(y, x, 0)] = hsv.h;
                out[(y, x, 1)] = hsv.s;
                out[(y, x, 2)] = hsv.v;
            }
        }
        out
    }

    /// Separable box blur with the given radius. Radius 0 is a copy.
    pub fn box_blur(&self, radius: usize) -> Frame {
        if radius == 0 {
            return self.clone();
        }
        let (h, w, _) = self.pixels.dim();
        let r = radius as isize;
        let window = (2 * radius + 1) as u32;

        // Horizontal pass
        let mut horiz: Array3<u8> = Array3::zeros((h, w, 3));
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    let mut acc: u32 = 0;
                    for dx in -r..=r {
                        let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                        acc += self.pixels[(y, sx, c)] as u32;
                    }
                    horiz[(y, x, c)] = (acc / window) as u8;
                }
            }
        }

        // Vertical pass
        let mut out: Array3<u8> = Array3::zeros((h, w, 3));
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    let mut acc: u32 = 0;
                    for dy in -r..=r {
                        let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                        acc += horiz[(sy, x, c)] as u32;
                    }
                    out[(y, x, c)] = (acc / window) as u8;
                }
            }
        }

        Frame { pixels: out }
    }
}

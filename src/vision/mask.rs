// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Binary mask construction for ball isolation
//!
//! A frame's object mask is the table-boundary polygon AND the inverse of
//! the felt color range, cleaned up with erosion/dilation. Whatever
//! survives differs in color from the felt and lies on the playing
//! surface.

use ndarray::{Array2, Array3};

use crate::config::DetectionConfig;

use super::{Hsv, TablePreset};

/// Rasterize the table boundary polygon into a 255-inside mask.
pub fn polygon_mask(height: usize, width: usize, points: &[(i32, i32)]) -> Array2<u8> {
    let mut mask = Array2::zeros((height, width));
    if points.len() < 3 {
        return mask;
    }

    for y in 0..height {
        let py = y as f64 + 0.5;
        for x in 0..width {
            let px = x as f64 + 0.5;
            if point_in_polygon(px, py, points) {
                mask[(y, x)] = 255;
            }
        }
    }
    mask
}

fn point_in_polygon(px: f64, py: f64, points: &[(i32, i32)]) -> bool {
    let mut inside = false;
    let n = points.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[i].0 as f64, points[i].1 as f64);
        let (xj, yj) = (points[j].0 as f64, points[j].1 as f64);
        if ((yi > py) != (yj > py)) && (px < (xj - xi) * (py - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Inclusive HSV bounds spanning all reference colors, widened by the
/// per-channel tolerances.
pub fn color_bounds(colors: &[Hsv], tolerances: (i32, i32, i32)) -> ([i32; 3], [i32; 3]) {
    let (ht, st, vt) = tolerances;
    let mut lower = [i32::MAX; 3];
    let mut upper = [i32::MIN; 3];
    for c in colors {
        lower[0] = lower[0].min(c.h as i32);
        lower[1] = lower[1].min(c.s as i32);
        lower[2] = lower[2].min(c.v as i32);
        upper[0] = upper[0].max(c.h as i32);
        upper[1] = upper[1].max(c.s as i32);
        upper[2] = upper[2].max(c.v as i32);
    }
    lower[0] -= ht;
    lower[1] -= st;
    lower[2] -= vt;
    upper[0] += ht;
    upper[1] += st;
    upper[2] += vt;
    (lower, upper)
}

/// Mark pixels whose HSV value falls inside the inclusive bounds.
pub fn color_range_mask(hsv: &Array3<u8>, lower: [i32; 3], upper: [i32; 3]) -> Array2<u8> {
    let (h, w, _) = hsv.dim();
    let mut mask = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let mut inside = true;
            for c in 0..3 {
                let value = hsv[(y, x, c)] as i32;
                if value < lower[c] || value > upper[c] {
                    inside = false;
                    break;
                }
            }
            if inside {
                mask[(y, x)] = 255;
            }
        }
    }
    mask
}

/// 3x3 erosion, `iterations` passes.
pub fn erode(mask: &Array2<u8>, iterations: usize) -> Array2<u8> {
    morph(mask, iterations, false)
}

/// 3x3 dilation, `iterations` passes.
pub fn dilate(mask: &Array2<u8>, iterations: usize) -> Array2<u8> {
    morph(mask, iterations, true)
}

fn morph(mask: &Array2<u8>, iterations: usize, grow: bool) -> Array2<u8> {
    let (h, w) = mask.dim();
    let mut current = mask.clone();
    for _ in 0..iterations {
        let mut next = Array2::zeros((h, w));
        for y in 0..h {
            for x in 0..w {
                let mut any = false;
                let mut all = true;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let ny = y as i32 + dy;
                        let nx = x as i32 + dx;
                        if ny < 0 || nx < 0 || ny >= h as i32 || nx >= w as i32 {
                            continue;
                        }
                        if current[(ny as usize, nx as usize)] != 0 {
                            any = true;
                        } else {
                            all = false;
                        }
                    }
                }
                let keep = if grow { any } else { all };
                if keep {
                    next[(y, x)] = 255;
                }
            }
        }
        current = next;
    }
    current
}

/// Full object-isolation mask for one frame: NOT(felt colors) within the
/// table polygon, denoised.
pub fn table_object_mask(
    hsv: &Array3<u8>,
    preset: &TablePreset,
    config: &DetectionConfig,
) -> Array2<u8> {
    let (h, w, _) = hsv.dim();
    let (lower, upper) = color_bounds(
        &preset.colors,
        (
            config.hue_tolerance,
            config.saturation_tolerance,
            config.value_tolerance,
        ),
    );

    let felt = color_range_mask(hsv, lower, upper);
    let mut objects = felt.mapv(|v| 255 - v);
    objects = erode(&objects, config.erode_iterations);
    objects = dilate(&objects, config.dilate_iterations);

    let table = polygon_mask(h, w, &preset.points);
    let mut combined = objects;
    combined.zip_mut_with(&table, |o, t| *o &= t);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_polygon_mask_inside_outside() {
        let points = vec![(2, 2), (8, 2), (8, 8), (2, 8)];
        let mask = polygon_mask(10, 10, &points);

        assert_eq!(mask[(5, 5)], 255);
        assert_eq!(mask[(0, 0)], 0);
        assert_eq!(mask[(9, 9)], 0);
    }

    #[test]
    fn test_color_bounds_span_references() {
        let colors = vec![Hsv::new(90, 100, 200), Hsv::new(100, 120, 220)];
        let (lower, upper) = color_bounds(&colors, (5, 10, 5));
        assert_eq!(lower, [85, 90, 195]);
        assert_eq!(upper, [105, 130, 225]);
    }

    #[test]
    fn test_color_range_mask_selects_matching_pixels() {
        let mut hsv = Array3::zeros((1, 2, 3));
        hsv[(0, 0, 0)] = 95;
        hsv[(0, 0, 1)] = 110;
        hsv[(0, 0, 2)] = 210;
        // second pixel far outside the range
        hsv[(0, 1, 0)] = 10;
        hsv[(0, 1, 1)] = 250;
        hsv[(0, 1, 2)] = 40;

        let mask = color_range_mask(&hsv, [85, 90, 195], [105, 130, 225]);
        assert_eq!(mask[(0, 0)], 255);
        assert_eq!(mask[(0, 1)], 0);
    }

    #[test]
    fn test_erode_removes_speckles_dilate_restores_blobs() {
        let mut mask: Array2<u8> = Array2::zeros((9, 9));
        // single-pixel speckle
        mask[(1, 1)] = 255;
        // 3x3 blob
        for y in 4..7 {
            for x in 4..7 {
                mask[(y, x)] = 255;
            }
        }

        let eroded = erode(&mask, 1);
        assert_eq!(eroded[(1, 1)], 0, "speckle should not survive erosion");
        assert_eq!(eroded[(5, 5)], 255, "blob core should survive erosion");

        let restored = dilate(&eroded, 1);
        assert_eq!(restored[(4, 4)], 255);
    }
}

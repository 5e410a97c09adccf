// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! External contour extraction on binary masks
//!
//! Components are labeled with 8-connectivity; the outer boundary of each
//! component is traced Moore-neighbor style and its chain length (1 per
//! orthogonal step, sqrt(2) per diagonal step) is the contour perimeter.

use std::collections::HashMap;

use ndarray::Array2;

/// One external contour of a binary mask.
#[derive(Debug, Clone)]
pub struct Contour {
    /// All pixels of the component, `(y, x)`
    pub pixels: Vec<(usize, usize)>,
    /// Pixel count
    pub area: f64,
    /// Chain-length of the outer boundary
    pub perimeter: f64,
    /// Mean pixel position, `(x, y)`
    pub centroid: (f64, f64),
}

impl Contour {
    /// `4*pi*area / perimeter^2`: 1.0 for an ideal circle. Degenerate
    /// boundaries (isolated pixels) rate 0.
    pub fn circularity(&self) -> f64 {
        if self.perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)
    }

    /// Paint the component, filled, into `mask`.
    pub fn fill_into(&self, mask: &mut Array2<u8>) {
        for &(y, x) in &self.pixels {
            mask[(y, x)] = 255;
        }
    }
}

// Clockwise Moore neighborhood starting west, (dy, dx) with y down.
const DIRS: [(i32, i32); 8] = [
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
];

/// Find all external contours of the mask.
pub fn find_external_contours(mask: &Array2<u8>) -> Vec<Contour> {
    let (h, w) = mask.dim();
    let mut labels: Array2<u32> = Array2::zeros((h, w));
    let mut contours = Vec::new();
    let mut next_label = 1u32;

    for y in 0..h {
        for x in 0..w {
            if mask[(y, x)] == 0 || labels[(y, x)] != 0 {
                continue;
            }

            // Flood-fill the component; scan order makes (y, x) its
            // topmost-leftmost pixel.
            let label = next_label;
            next_label += 1;
            let mut pixels = Vec::new();
            let mut stack = vec![(y, x)];
            labels[(y, x)] = label;
            while let Some((cy, cx)) = stack.pop() {
                pixels.push((cy, cx));
                for (dy, dx) in DIRS {
                    let ny = cy as i32 + dy;
                    let nx = cx as i32 + dx;
                    if ny < 0 || nx < 0 || ny >= h as i32 || nx >= w as i32 {
                        continue;
                    }
                    let (ny, nx) = (ny as usize, nx as usize);
                    if mask[(ny, nx)] != 0 && labels[(ny, nx)] == 0 {
                        labels[(ny, nx)] = label;
                        stack.push((ny, nx));
                    }
                }
            }

            let area = pixels.len() as f64;
            let sum_x: f64 = pixels.iter().map(|&(_, px)| px as f64).sum();
            let sum_y: f64 = pixels.iter().map(|&(py, _)| py as f64).sum();
            let centroid = (sum_x / area, sum_y / area);

            let in_component =
                |py: i32, px: i32| -> bool {
                    py >= 0
                        && px >= 0
                        && py < h as i32
                        && px < w as i32
                        && labels[(py as usize, px as usize)] == label
                };
            let perimeter = trace_perimeter((y as i32, x as i32), &in_component);

            contours.push(Contour {
                pixels,
                area,
                perimeter,
                centroid,
            });
        }
    }

    contours
}

/// Filter contours down to plausible balls: big enough and round enough.
pub fn find_ball_contours(
    mask: &Array2<u8>,
    min_area: f64,
    circularity_threshold: f64,
) -> Vec<Contour> {
    find_external_contours(mask)
        .into_iter()
        .filter(|c| c.area > min_area && c.circularity() > circularity_threshold)
        .collect()
}

/// Chain length of the closed outer boundary starting at the component's
/// topmost-leftmost pixel. The trace is deterministic, so it eventually
/// cycles; the perimeter is the length of that cycle, which discards any
/// transient caused by the artificial initial backtrack direction.
fn trace_perimeter(start: (i32, i32), in_component: &impl Fn(i32, i32) -> bool) -> f64 {
    let sqrt2 = std::f64::consts::SQRT_2;
    let mut seen: HashMap<((i32, i32), usize), f64> = HashMap::new();
    // Backtrack starts west of the start pixel, which is background for a
    // topmost-leftmost component pixel.
    let mut state = (start, 0usize);
    let mut total = 0.0;

    loop {
        if let Some(&at_first_visit) = seen.get(&state) {
            return total - at_first_visit;
        }
        seen.insert(state, total);

        let (p, b_idx) = state;
        let mut found = None;
        for k in 1..=8usize {
            let idx = (b_idx + k) % 8;
            let (dy, dx) = DIRS[idx];
            if in_component(p.0 + dy, p.1 + dx) {
                found = Some((idx, k));
                break;
            }
        }
        let Some((idx, k)) = found else {
            // isolated pixel, no boundary to walk
            return 0.0;
        };

        let (dy, dx) = DIRS[idx];
        let np = (p.0 + dy, p.1 + dx);
        total += if dy != 0 && dx != 0 { sqrt2 } else { 1.0 };

        // the background cell examined just before the move becomes the
        // new backtrack
        let prev_idx = (b_idx + k - 1) % 8;
        let bg = (p.0 + DIRS[prev_idx].0, p.1 + DIRS[prev_idx].1);
        let nb = DIRS
            .iter()
            .position(|&(ddy, ddx)| (np.0 + ddy, np.1 + ddx) == bg)
            .unwrap_or(0);

        state = (np, nb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_mask(size: usize, cx: i32, cy: i32, r: i32) -> Array2<u8> {
        let mut mask = Array2::zeros((size, size));
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    mask[(y as usize, x as usize)] = 255;
                }
            }
        }
        mask
    }

    #[test]
    fn test_disk_is_round() {
        let mask = disk_mask(40, 20, 20, 12);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);

        let disk = &contours[0];
        assert!(disk.area > 400.0 && disk.area < 480.0, "area {}", disk.area);
        assert!(
            disk.circularity() > 0.8,
            "disk circularity {}",
            disk.circularity()
        );
        assert!((disk.centroid.0 - 20.0).abs() < 0.5);
        assert!((disk.centroid.1 - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_thin_rectangle_is_not_round() {
        let mut mask = Array2::zeros((20, 40));
        for y in 5..11 {
            for x in 4..34 {
                mask[(y, x)] = 255;
            }
        }

        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let rect = &contours[0];
        assert_eq!(rect.area, 180.0);
        assert!(
            rect.circularity() < 0.8,
            "rectangle circularity {}",
            rect.circularity()
        );
    }

    #[test]
    fn test_separate_components_get_separate_contours() {
        let mut mask = disk_mask(60, 15, 15, 8);
        for y in 40..50 {
            for x in 40..50 {
                mask[(y, x)] = 255;
            }
        }

        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn test_ball_filter_rejects_small_and_angular() {
        let mut mask = disk_mask(60, 20, 20, 10);
        // small speckle
        mask[(50, 50)] = 255;
        // thin bar (shadow-like)
        for x in 5..55 {
            mask[(55, x)] = 255;
            mask[(56, x)] = 255;
        }

        let balls = find_ball_contours(&mask, 50.0, 0.8);
        assert_eq!(balls.len(), 1);
        assert!((balls[0].centroid.0 - 20.0).abs() < 1.0);
    }

    #[test]
    fn test_fill_into_reproduces_component() {
        let mask = disk_mask(30, 15, 15, 6);
        let contours = find_external_contours(&mask);

        let mut rendered = Array2::zeros(mask.dim());
        contours[0].fill_into(&mut rendered);
        assert_eq!(rendered, mask);
    }
}

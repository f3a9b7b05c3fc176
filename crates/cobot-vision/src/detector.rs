// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Laser line detection on ON/OFF frame pairs.
//!
//! # Pipeline
//!
//! ```text
//!  on[..,red] ─┐
//!              ├─> max(on - off, 0) ─> Gaussian blur ─> threshold ─> weights
//!  off[..,red] ┘                                                       │
//!                      ┌───────────────────────────────────────────────┘
//!                      ▼
//!        per-row (axis Y) / per-column (axis X) weighted centroids
//!                      │
//!          ┌───────────┼─────────────────┐
//!          ▼           ▼                 ▼
//!        mask     closest point     brightest pixel
//! ```
//!
//! The detector holds only its settings; every call is independent.

use ndarray::{Array2, ArrayView3, Axis};
use tracing::{debug, trace};

use crate::blur::gaussian_blur;
use crate::config::{DetectionAxis, LaserDetectionConfig};
use crate::error::VisionResult;
use crate::frame::{Frame, FramePair, Pixel, Point2, channel_f32};

/// Value written into the mask at each centroid.
pub const MASK_ON: u8 = 255;

// =============================================================================
// LaserDetection
// =============================================================================

/// Result of a successful detection.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserDetection {
    /// `(height, width)` image with [`MASK_ON`] at every rounded centroid.
    pub mask: Array2<u8>,
    /// Location of the maximum blurred difference.
    pub brightest_point: Pixel,
    /// Centroid closest to the image center.
    pub closest_point: Point2,
    /// All centroids, in row (axis Y) or column (axis X) order.
    pub points: Vec<Point2>,
}

impl LaserDetection {
    /// Number of centroids that passed the weight floor.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

// =============================================================================
// LaserLineDetector
// =============================================================================

/// Finds the laser line in the difference between a laser-on and a
/// laser-off frame.
#[derive(Debug, Clone)]
pub struct LaserLineDetector {
    config: LaserDetectionConfig,
}

impl LaserLineDetector {
    /// Creates a detector after validating `config`.
    pub fn new(config: LaserDetectionConfig) -> VisionResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the detector settings.
    pub fn config(&self) -> &LaserDetectionConfig {
        &self.config
    }

    /// Detects along the configured default axis.
    pub fn detect_default(&self, on: Option<&Frame>, off: Option<&Frame>) -> Option<LaserDetection> {
        self.detect(on, off, self.config.default_axis)
    }

    /// Detects on a captured pair.
    pub fn detect_pair(&self, pair: &FramePair, axis: DetectionAxis) -> Option<LaserDetection> {
        self.detect(pair.on.as_ref(), pair.off.as_ref(), axis)
    }

    /// Detects the laser line.
    ///
    /// Returns `None` when a frame is missing, the frames differ in shape or
    /// lack the red channel, or no row/column carries enough weight.
    pub fn detect(
        &self,
        on: Option<&Frame>,
        off: Option<&Frame>,
        axis: DetectionAxis,
    ) -> Option<LaserDetection> {
        let (Some(on), Some(off)) = (on, off) else {
            debug!("Laser detection skipped: frame missing");
            return None;
        };
        self.detect_views(&on.view(), &off.view(), axis)
    }

    fn detect_views(
        &self,
        on: &ArrayView3<u8>,
        off: &ArrayView3<u8>,
        axis: DetectionAxis,
    ) -> Option<LaserDetection> {
        if on.dim() != off.dim() {
            debug!(on = ?on.dim(), off = ?off.dim(), "Laser detection skipped: shape mismatch");
            return None;
        }
        if on.len_of(Axis(2)) < 3 {
            debug!(channels = on.len_of(Axis(2)), "Laser detection skipped: not a color frame");
            return None;
        }

        let on_red = channel_f32(on, self.config.red_channel)?;
        let off_red = channel_f32(off, self.config.red_channel)?;

        let mut diff = on_red - off_red;
        diff.mapv_inplace(|v| v.max(0.0));

        let blurred = gaussian_blur(
            &diff,
            self.config.gaussian_blur_kernel,
            self.config.gaussian_blur_sigma,
        );
        let (height, width) = blurred.dim();
        if height == 0 || width == 0 {
            return None;
        }

        let threshold = self.config.min_intensity;
        let weights = blurred.mapv(|v| if v > threshold { v as f64 } else { 0.0 });

        let points = match axis {
            DetectionAxis::Y => row_centroids(&weights, self.config.min_line_weight),
            DetectionAxis::X => column_centroids(&weights, self.config.min_line_weight),
        };

        if points.is_empty() {
            trace!(%axis, "No laser line found");
            return None;
        }

        let center = Point2::new(width as f64 / 2.0, height as f64 / 2.0);
        let closest_point = closest_to(&points, &center)?;
        let brightest_point = brightest_pixel(&blurred);

        let mut mask = Array2::<u8>::zeros((height, width));
        for point in &points {
            let row = (point.y.round_ties_even() as usize).min(height - 1);
            let col = (point.x.round_ties_even() as usize).min(width - 1);
            mask[[row, col]] = MASK_ON;
        }

        debug!(
            %axis,
            points = points.len(),
            closest = %closest_point,
            brightest = %brightest_point,
            "Laser line detected"
        );

        Some(LaserDetection {
            mask,
            brightest_point,
            closest_point,
            points,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// One centroid per row: `(weighted column, row)`.
fn row_centroids(weights: &Array2<f64>, min_weight: f64) -> Vec<Point2> {
    weights
        .axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(row, line)| {
            let total: f64 = line.sum();
            if total <= min_weight {
                return None;
            }
            let moment: f64 = line.iter().enumerate().map(|(c, w)| c as f64 * w).sum();
            Some(Point2::new(moment / total, row as f64))
        })
        .collect()
}

/// One centroid per column: `(column, weighted row)`.
fn column_centroids(weights: &Array2<f64>, min_weight: f64) -> Vec<Point2> {
    weights
        .axis_iter(Axis(1))
        .enumerate()
        .filter_map(|(col, line)| {
            let total: f64 = line.sum();
            if total <= min_weight {
                return None;
            }
            let moment: f64 = line.iter().enumerate().map(|(r, w)| r as f64 * w).sum();
            Some(Point2::new(col as f64, moment / total))
        })
        .collect()
}

fn closest_to(points: &[Point2], center: &Point2) -> Option<Point2> {
    let mut best: Option<(f64, Point2)> = None;
    for point in points {
        let d = point.distance_squared(center);
        match best {
            Some((best_d, _)) if d >= best_d => {}
            _ => best = Some((d, *point)),
        }
    }
    best.map(|(_, point)| point)
}

/// First maximum in row-major order.
fn brightest_pixel(image: &Array2<f32>) -> Pixel {
    let mut best = Pixel::default();
    let mut best_value = f32::NEG_INFINITY;
    for ((row, col), &value) in image.indexed_iter() {
        if value > best_value {
            best_value = value;
            best = Pixel { x: col, y: row };
        }
    }
    best
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::solid_frame;
    use approx::assert_relative_eq;

    const H: usize = 100;
    const W: usize = 120;

    fn detector() -> LaserLineDetector {
        LaserLineDetector::new(LaserDetectionConfig::default()).unwrap()
    }

    fn off_frame() -> Frame {
        solid_frame(H, W, [5, 5, 5])
    }

    /// Red horizontal stripe on row `row`.
    fn horizontal_line(row: usize) -> Frame {
        let mut frame = off_frame();
        for c in 0..W {
            frame[[row, c, 2]] = 255;
        }
        frame
    }

    /// Red vertical stripe on column `col`.
    fn vertical_line(col: usize) -> Frame {
        let mut frame = off_frame();
        for r in 0..H {
            frame[[r, col, 2]] = 255;
        }
        frame
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = LaserDetectionConfig {
            gaussian_blur_kernel: (2, 2),
            ..Default::default()
        };
        assert!(LaserLineDetector::new(config).is_err());
    }

    #[test]
    fn test_horizontal_line_along_x_axis() {
        let on = horizontal_line(50);
        let off = off_frame();

        let detection = detector().detect(Some(&on), Some(&off), DetectionAxis::X).unwrap();

        assert_eq!(detection.point_count(), W);
        for point in &detection.points {
            assert_relative_eq!(point.y, 50.0, epsilon = 1e-6);
        }
        assert_relative_eq!(detection.closest_point.x, 60.0, epsilon = 1e-9);
        assert_relative_eq!(detection.closest_point.y, 50.0, epsilon = 1e-6);
        assert_eq!(detection.brightest_point.y, 50);
        assert_eq!(detection.mask[[50, 10]], MASK_ON);
        assert_eq!(detection.mask[[40, 10]], 0);
    }

    #[test]
    fn test_vertical_line_along_y_axis() {
        let on = vertical_line(30);
        let off = off_frame();

        let detection = detector().detect(Some(&on), Some(&off), DetectionAxis::Y).unwrap();

        assert_eq!(detection.point_count(), H);
        assert_relative_eq!(detection.closest_point.x, 30.0, epsilon = 1e-6);
        assert_relative_eq!(detection.closest_point.y, 50.0, epsilon = 1e-9);
        assert_eq!(detection.brightest_point.x, 30);
        assert_eq!(detection.brightest_point.y, 0);
        assert!(detection.mask.column(30).iter().all(|&v| v == MASK_ON));
    }

    #[test]
    fn test_row_on_y_axis_mirrors_transposed_frame_on_x_axis() {
        let on = horizontal_line(50);
        let off = off_frame();

        let by_row = detector().detect(Some(&on), Some(&off), DetectionAxis::Y).unwrap();
        assert_relative_eq!(by_row.closest_point.y, 50.0, epsilon = 1e-6);

        let transpose = |frame: &Frame| -> Frame {
            frame
                .view()
                .permuted_axes([1, 0, 2])
                .as_standard_layout()
                .into_owned()
        };
        let by_column = detector()
            .detect(Some(&transpose(&on)), Some(&transpose(&off)), DetectionAxis::X)
            .unwrap();
        assert_relative_eq!(by_column.closest_point.x, 50.0, epsilon = 1e-6);
        assert_relative_eq!(by_column.closest_point.y, by_row.closest_point.x, epsilon = 1e-3);
    }

    #[test]
    fn test_default_axis_is_used() {
        let on = vertical_line(70);
        let off = off_frame();
        let detection = detector().detect_default(Some(&on), Some(&off)).unwrap();
        assert_relative_eq!(detection.closest_point.x, 70.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_frame_yields_none() {
        let on = vertical_line(30);
        assert!(detector().detect(Some(&on), None, DetectionAxis::Y).is_none());
        assert!(detector().detect(None, Some(&on), DetectionAxis::Y).is_none());
        assert!(detector().detect_pair(&FramePair::empty(), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_shape_mismatch_yields_none() {
        let on = vertical_line(30);
        let off = solid_frame(H, W + 1, [5, 5, 5]);
        assert!(detector().detect(Some(&on), Some(&off), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_grayscale_frame_yields_none() {
        let on = ndarray::Array3::<u8>::zeros((H, W, 1));
        let off = ndarray::Array3::<u8>::zeros((H, W, 1));
        assert!(detector().detect(Some(&on), Some(&off), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_no_laser_yields_none() {
        let frame = off_frame();
        assert!(detector().detect(Some(&frame), Some(&frame), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_darker_on_frame_is_clamped() {
        let on = solid_frame(H, W, [0, 0, 0]);
        let off = solid_frame(H, W, [200, 200, 200]);
        assert!(detector().detect(Some(&on), Some(&off), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_green_light_ignored() {
        let mut on = off_frame();
        for r in 0..H {
            on[[r, 30, 1]] = 255;
        }
        assert!(detector().detect(Some(&on), Some(&off_frame()), DetectionAxis::Y).is_none());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let on = vertical_line(42);
        let off = off_frame();
        let d = detector();
        let first = d.detect(Some(&on), Some(&off), DetectionAxis::Y);
        let second = d.detect(Some(&on), Some(&off), DetectionAxis::Y);
        assert_eq!(first, second);
    }

    #[test]
    fn test_closest_point_prefers_center() {
        // Line only on the lower half, offset to the right
        let mut on = off_frame();
        for r in 60..H {
            on[[r, 90, 2]] = 255;
        }
        let detection = detector()
            .detect(Some(&on), Some(&off_frame()), DetectionAxis::Y)
            .unwrap();
        assert_relative_eq!(detection.closest_point.x, 90.0, epsilon = 1e-6);
        // Blur spreads the stripe end upward by two rows
        assert!(detection.closest_point.y <= 60.0);
        assert!(detection.closest_point.y >= 58.0);
    }

    #[test]
    fn test_closest_to_keeps_first_on_tie() {
        let points = [Point2::new(0.0, 1.0), Point2::new(2.0, 1.0)];
        let closest = closest_to(&points, &Point2::new(1.0, 1.0)).unwrap();
        assert_eq!(closest, Point2::new(0.0, 1.0));
    }

    #[test]
    fn test_brightest_pixel_first_in_row_major_order() {
        let mut image = Array2::<f32>::zeros((3, 3));
        image[[1, 2]] = 5.0;
        image[[2, 0]] = 5.0;
        assert_eq!(brightest_pixel(&image), Pixel { x: 2, y: 1 });
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polynomial degree selection.
//!
//! For each degree `1..=max_degree` an ordinary least-squares polynomial of
//! height on pixel delta is fitted and scored by R² on the same samples. The
//! first degree with the highest score wins: a later degree replaces the
//! current best only when its R² is greater by more than [`R2_TOLERANCE`],
//! so equally good fits resolve to the simplest polynomial.
//!
//! The regression centers every feature column and the target, solves the
//! centered system with an SVD (minimum-norm for rank-deficient designs) and
//! recovers the intercept from the means.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use cobot_vision::Point2;

use crate::error::{CalibrationError, CalibrationResult};
use crate::model::{CalibrationModel, CalibrationSample, PolynomialFit};
use crate::robot::Position;

/// Minimum number of samples for any fit.
pub const MIN_SAMPLES: usize = 2;

/// R² improvement a higher degree must exceed to be selected.
pub const R2_TOLERANCE: f64 = 1e-12;

/// Fits polynomials of increasing degree and keeps the best by R².
#[derive(Debug, Clone, Copy, Default)]
pub struct PolynomialFitSelector;

impl PolynomialFitSelector {
    /// Creates a selector.
    pub fn new() -> Self {
        Self
    }

    /// Returns the best polynomial of degree `1..=max_degree`.
    ///
    /// # Errors
    ///
    /// - [`CalibrationError::InsufficientData`] for fewer than two samples
    /// - [`CalibrationError::InvalidDegree`] when `max_degree` is zero
    pub fn fit(
        &self,
        samples: &[CalibrationSample],
        max_degree: usize,
    ) -> CalibrationResult<PolynomialFit> {
        let candidates = self.fit_all(samples, max_degree)?;

        let mut best: Option<PolynomialFit> = None;
        for candidate in candidates {
            match &best {
                Some(current) if candidate.r2 <= current.r2 + R2_TOLERANCE => {}
                _ => best = Some(candidate),
            }
        }

        let best = best.ok_or(CalibrationError::InvalidDegree { degree: max_degree })?;
        info!(
            degree = best.degree,
            r2 = best.r2,
            samples = samples.len(),
            "Selected calibration polynomial"
        );
        Ok(best)
    }

    /// Returns one fit per degree `1..=max_degree`, in degree order.
    pub fn fit_all(
        &self,
        samples: &[CalibrationSample],
        max_degree: usize,
    ) -> CalibrationResult<Vec<PolynomialFit>> {
        if samples.len() < MIN_SAMPLES {
            return Err(CalibrationError::InsufficientData {
                required: MIN_SAMPLES,
                actual: samples.len(),
            });
        }
        if max_degree == 0 {
            return Err(CalibrationError::InvalidDegree { degree: max_degree });
        }

        let deltas: Vec<f64> = samples.iter().map(|s| s.pixel_delta).collect();
        let heights: Vec<f64> = samples.iter().map(|s| s.height_mm).collect();

        (1..=max_degree)
            .map(|degree| {
                let fit = fit_degree(&deltas, &heights, degree)?;
                debug!(degree, r2 = fit.r2, "Fitted polynomial");
                Ok(fit)
            })
            .collect()
    }

    /// Fits the samples and wraps the result into a model.
    pub fn fit_model(
        &self,
        zero_reference: Point2,
        samples: Vec<CalibrationSample>,
        robot_initial_position: Position,
        max_degree: usize,
    ) -> CalibrationResult<CalibrationModel> {
        let polynomial = self.fit(&samples, max_degree)?;
        Ok(CalibrationModel::new(
            zero_reference,
            samples,
            robot_initial_position,
            polynomial,
        ))
    }
}

/// Least-squares polynomial of `degree` with a free intercept.
fn fit_degree(x: &[f64], y: &[f64], degree: usize) -> CalibrationResult<PolynomialFit> {
    let n = x.len();

    let mut design = DMatrix::<f64>::zeros(n, degree);
    for (row, &value) in x.iter().enumerate() {
        let mut power = 1.0;
        for col in 0..degree {
            power *= value;
            design[(row, col)] = power;
        }
    }

    let mut means = vec![0.0; degree];
    let mut scales = vec![1.0; degree];
    for col in 0..degree {
        let mean = design.column(col).iter().sum::<f64>() / n as f64;
        let mut column = design.column_mut(col);
        column.iter_mut().for_each(|v| *v -= mean);
        let norm = column.norm();
        if norm > 0.0 {
            column.iter_mut().for_each(|v| *v /= norm);
            scales[col] = norm;
        }
        means[col] = mean;
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let target = DVector::from_iterator(n, y.iter().map(|v| v - y_mean));

    let svd = design.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let eps = largest * n.max(degree) as f64 * f64::EPSILON;
    let beta = svd
        .solve(&target, eps)
        .map_err(|reason| CalibrationError::Numerical {
            degree,
            reason: reason.to_string(),
        })?;

    let slopes: Vec<f64> = beta
        .iter()
        .zip(scales.iter())
        .map(|(b, scale)| b / scale)
        .collect();
    let intercept = y_mean
        - slopes
            .iter()
            .zip(means.iter())
            .map(|(slope, mean)| slope * mean)
            .sum::<f64>();

    let mut coefficients = Vec::with_capacity(degree + 1);
    coefficients.push(0.0);
    coefficients.extend(slopes);

    let mut fit = PolynomialFit {
        coefficients,
        intercept,
        degree,
        r2: 0.0,
    };
    let predicted: Vec<f64> = x.iter().map(|&value| fit.evaluate(value)).collect();
    fit.r2 = r2_score(y, &predicted);
    Ok(fit)
}

/// Coefficient of determination.
///
/// Constant targets score 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples_from(f: impl Fn(f64) -> f64, deltas: &[f64]) -> Vec<CalibrationSample> {
        deltas
            .iter()
            .map(|&d| CalibrationSample::new(f(d), d))
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let result = PolynomialFitSelector::new().fit(&[CalibrationSample::ZERO], 3);
        assert!(matches!(
            result,
            Err(CalibrationError::InsufficientData { required: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_zero_degree_rejected() {
        let samples = [CalibrationSample::ZERO, CalibrationSample::new(1.0, -2.0)];
        assert!(matches!(
            PolynomialFitSelector::new().fit(&samples, 0),
            Err(CalibrationError::InvalidDegree { degree: 0 })
        ));
    }

    #[test]
    fn test_linear_data_selects_degree_one() {
        let deltas = [0.0, -2.0, -4.1, -5.9, -8.0, -10.2];
        let samples = samples_from(|d| -0.5 * d, &deltas);

        let fit = PolynomialFitSelector::new().fit(&samples, 5).unwrap();

        assert_eq!(fit.degree, 1);
        assert_eq!(fit.coefficients.len(), 2);
        assert_eq!(fit.coefficients[0], 0.0);
        assert_relative_eq!(fit.coefficients[1], -0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.r2, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_quadratic_data_selects_degree_two() {
        let deltas: Vec<f64> = (0..10).map(|i| -1.5 * i as f64).collect();
        let samples = samples_from(|d| 1.0 + 0.3 * d + 0.02 * d * d, &deltas);

        let fit = PolynomialFitSelector::new().fit(&samples, 4).unwrap();

        assert_eq!(fit.degree, 2);
        assert_relative_eq!(fit.coefficients[1], 0.3, epsilon = 1e-7);
        assert_relative_eq!(fit.coefficients[2], 0.02, epsilon = 1e-8);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-7);
        for sample in &samples {
            assert_relative_eq!(fit.evaluate(sample.pixel_delta), sample.height_mm, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_two_samples_fit_every_degree() {
        let samples = [CalibrationSample::ZERO, CalibrationSample::new(1.0, -3.0)];
        let all = PolynomialFitSelector::new().fit_all(&samples, 3).unwrap();
        assert_eq!(all.len(), 3);
        for fit in &all {
            assert_eq!(fit.coefficients.len(), fit.degree + 1);
            assert_relative_eq!(fit.r2, 1.0, epsilon = 1e-9);
        }

        // Rank-deficient higher degrees tie; the simplest is kept
        let best = PolynomialFitSelector::new().fit(&samples, 3).unwrap();
        assert_eq!(best.degree, 1);
    }

    #[test]
    fn test_noisy_data_r2_below_one() {
        let samples = vec![
            CalibrationSample::new(0.0, 0.0),
            CalibrationSample::new(1.0, -2.2),
            CalibrationSample::new(2.0, -3.9),
            CalibrationSample::new(3.0, -6.3),
            CalibrationSample::new(4.0, -7.8),
        ];
        let fit = PolynomialFitSelector::new().fit(&samples, 1).unwrap();
        assert!(fit.r2 < 1.0);
        assert!(fit.r2 > 0.95);
    }

    #[test]
    fn test_r2_constant_target() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.5]), 0.0);
    }

    #[test]
    fn test_fit_model_keeps_samples() {
        let samples = samples_from(|d| -0.25 * d, &[0.0, -4.0, -8.0]);
        let model = PolynomialFitSelector::new()
            .fit_model(
                Point2::new(320.0, 240.0),
                samples.clone(),
                Position::new(0.0, 0.0, 300.0, 180.0, 0.0, 0.0),
                3,
            )
            .unwrap();
        assert_eq!(model.calibration_data, samples);
        assert_eq!(model.degree(), 1);
        assert_relative_eq!(model.predict_height(-8.0), 2.0, epsilon = 1e-9);
        assert!(model.created_at.is_some());
    }
}

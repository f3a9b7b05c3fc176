// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `fit` command.

use std::path::Path;

use cobot_calibration::{
    CalibrationModel, CalibrationSample, CalibrationStore, JsonFileStore, Position,
    PolynomialFitSelector,
};
use cobot_config::CobotConfig;
use cobot_vision::Point2;
use serde_json::Value;

use crate::cli::FitArgs;
use crate::error::{BinError, BinResult};

/// Samples plus whatever context the input file carried.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInput {
    /// Recorded samples.
    pub samples: Vec<CalibrationSample>,
    /// Zero reference from a calibration file.
    pub zero_reference: Point2,
    /// Start pose from a calibration file.
    pub robot_initial_position: Position,
}

/// Parses a calibration file or a plain `[[height_mm, pixel_delta], ...]` list.
pub fn load_samples(content: &str) -> BinResult<SampleInput> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| BinError::input(format!("not valid JSON: {}", e)))?;

    if value.is_array() {
        let samples: Vec<CalibrationSample> = serde_json::from_value(value)
            .map_err(|e| BinError::input(format!("expected [[height_mm, pixel_delta], ...]: {}", e)))?;
        return Ok(SampleInput {
            samples,
            zero_reference: Point2::default(),
            robot_initial_position: Position::default(),
        });
    }

    let model: CalibrationModel = serde_json::from_value(value)
        .map_err(|e| BinError::input(format!("not a calibration file: {}", e)))?;
    Ok(SampleInput {
        samples: model.calibration_data,
        zero_reference: model.zero_reference_coords,
        robot_initial_position: model.robot_initial_position,
    })
}

/// Executes the `fit` command.
pub async fn fit(config: &CobotConfig, args: FitArgs) -> BinResult<()> {
    let input = read_input(&args.samples)?;
    let max_degree = args
        .max_degree
        .unwrap_or(config.calibration.run.max_polynomial_degree);

    let selector = PolynomialFitSelector::new();
    let candidates = selector.fit_all(&input.samples, max_degree)?;
    let model = selector.fit_model(
        input.zero_reference,
        input.samples,
        input.robot_initial_position,
        max_degree,
    )?;

    println!("Fitted {} samples from {}", model.sample_count(), args.samples.display());
    println!();
    println!("  degree  R²");
    for candidate in &candidates {
        let marker = if candidate.degree == model.degree() { "*" } else { " " };
        println!("  {}{:<6} {:.6}", marker, candidate.degree, candidate.r2);
    }
    println!();
    println!("Selected degree {} (R² {:.6})", model.degree(), model.r2());
    println!("  intercept:    {}", model.polynomial.intercept);
    println!("  coefficients: {:?}", model.polynomial.coefficients);

    if let Some(output) = &args.output {
        JsonFileStore::new(output).save(&model).await?;
        println!("Saved model to {}", output.display());
    }
    Ok(())
}

fn read_input(path: &Path) -> BinResult<SampleInput> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BinError::io(format!("{}: {}", path.display(), e)))?;
    load_samples(&content).map_err(|e| e.with_context(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_sample_list() {
        let input = load_samples("[[0, 0.0], [1, -10.5], [2, -21.0]]").unwrap();
        assert_eq!(input.samples.len(), 3);
        assert_eq!(input.samples[1], CalibrationSample::new(1.0, -10.5));
        assert_eq!(input.zero_reference, Point2::default());
    }

    #[test]
    fn test_load_calibration_file() {
        let json = r#"{
            "zero_reference_coords": [80.0, 60.0],
            "calibration_data": [[0.0, 0.0], [1.0, -10.0], [2.0, -20.0]],
            "robot_initial_position": [0.0, 0.0, 300.0, 180.0, 0.0, 0.0],
            "polynomial": {"coefficients": [0.0, -0.1], "intercept": 0.0, "degree": 1, "r2": 1.0}
        }"#;
        let input = load_samples(json).unwrap();
        assert_eq!(input.samples.len(), 3);
        assert_eq!(input.zero_reference, Point2::new(80.0, 60.0));
        assert_eq!(input.robot_initial_position.z(), 300.0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(load_samples("{\"samples\": 3}").is_err());
        assert!(load_samples("[[1, 2, 3]]").is_err());
        assert!(load_samples("not json").is_err());
    }

    #[tokio::test]
    async fn test_fit_writes_model() {
        let dir = tempfile::tempdir().unwrap();
        let samples = dir.path().join("samples.json");
        let output = dir.path().join("model.json");
        std::fs::write(&samples, "[[0, 0.0], [1, -10.0], [2, -20.0], [3, -30.0]]").unwrap();

        let args = FitArgs {
            samples,
            max_degree: Some(2),
            output: Some(output.clone()),
        };
        fit(&CobotConfig::default(), args).await.unwrap();

        let model = JsonFileStore::new(&output).load().await.unwrap().unwrap();
        assert_eq!(model.degree(), 1);
        assert_eq!(model.sample_count(), 4);
        assert!((model.predict_height(-15.0) - 1.5).abs() < 1e-9);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Calibration model persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{CalibrationError, CalibrationResult};
use crate::model::CalibrationModel;

/// Default calibration file name.
pub const DEFAULT_CALIBRATION_FILE: &str = "laser_calibration.json";

// =============================================================================
// CalibrationStore
// =============================================================================

/// Persists calibration models.
///
/// A store holds at most one model; saving replaces the previous one.
#[async_trait]
pub trait CalibrationStore: Send + Sync {
    /// Persists `model`, replacing any earlier one.
    async fn save(&self, model: &CalibrationModel) -> CalibrationResult<()>;

    /// Loads the stored model, or `None` if nothing was saved yet.
    async fn load(&self) -> CalibrationResult<Option<CalibrationModel>>;
}

// =============================================================================
// JsonFileStore
// =============================================================================

/// Stores the model as pretty-printed JSON.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so readers never observe a partially written model.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for [`DEFAULT_CALIBRATION_FILE`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_CALIBRATION_FILE))
    }

    /// Target file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_CALIBRATION_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CalibrationStore for JsonFileStore {
    async fn save(&self, model: &CalibrationModel) -> CalibrationResult<()> {
        let json = serde_json::to_vec_pretty(model)
            .map_err(|e| CalibrationError::storage("failed to serialize model", e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CalibrationError::storage(format!("failed to create {}", parent.display()), e)
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await.map_err(|e| {
            CalibrationError::storage(format!("failed to write {}", temp.display()), e)
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            CalibrationError::storage(format!("failed to replace {}", self.path.display()), e)
        })?;

        info!(
            path = %self.path.display(),
            degree = model.degree(),
            samples = model.sample_count(),
            "Calibration model saved"
        );
        Ok(())
    }

    async fn load(&self) -> CalibrationResult<Option<CalibrationModel>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No calibration file");
                return Ok(None);
            }
            Err(e) => {
                return Err(CalibrationError::storage(
                    format!("failed to read {}", self.path.display()),
                    e,
                ));
            }
        };

        let model = serde_json::from_slice(&bytes).map_err(|e| {
            CalibrationError::storage(format!("invalid calibration file {}", self.path.display()), e)
        })?;
        Ok(Some(model))
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store, keeping every saved model.
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: Mutex<Vec<CalibrationModel>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves so far.
    pub fn save_count(&self) -> usize {
        self.models.lock().len()
    }

    /// Most recently saved model.
    pub fn latest(&self) -> Option<CalibrationModel> {
        self.models.lock().last().cloned()
    }
}

#[async_trait]
impl CalibrationStore for MemoryStore {
    async fn save(&self, model: &CalibrationModel) -> CalibrationResult<()> {
        self.models.lock().push(model.clone());
        Ok(())
    }

    async fn load(&self) -> CalibrationResult<Option<CalibrationModel>> {
        Ok(self.latest())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CalibrationSample, PolynomialFit};
    use crate::robot::Position;
    use cobot_vision::Point2;

    fn model() -> CalibrationModel {
        CalibrationModel::new(
            Point2::new(321.5, 240.0),
            vec![CalibrationSample::ZERO, CalibrationSample::new(1.0, -2.0)],
            Position::new(100.0, 0.0, 300.0, 180.0, 0.0, 0.0),
            PolynomialFit {
                coefficients: vec![0.0, -0.5],
                intercept: 0.0,
                degree: 1,
                r2: 1.0,
            },
        )
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path().join("nested"));

        assert!(store.load().await.unwrap().is_none());

        let saved = model();
        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);

        // No temporary file left behind
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_json_store_replaces_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cal.json"));

        store.save(&model()).await.unwrap();
        let mut second = model();
        second.polynomial.r2 = 0.5;
        store.save(&second).await.unwrap();

        assert_eq!(store.load().await.unwrap().unwrap().r2(), 0.5);
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, CalibrationError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&model()).await.unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.load().await.unwrap().is_some());
    }
}

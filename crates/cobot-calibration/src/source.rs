// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Laser frame source collaborator.

use async_trait::async_trait;
use cobot_vision::FramePair;

use crate::error::CalibrationResult;

/// Captures laser-on / laser-off frame pairs.
///
/// Implementations switch the laser, grab one frame in each state and
/// return them together. A frame the camera failed to deliver is `None`;
/// `Err` is reserved for failures that should abort the calibration.
#[async_trait]
pub trait LaserFrameSource: Send + Sync {
    /// Captures one ON/OFF pair.
    async fn capture_pair(&self) -> CalibrationResult<FramePair>;
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Spacing between the attempts of one RTU transaction.
//!
//! A retry re-sends the same request after the line has been silent long
//! enough for any late bytes of the previous answer to drain.

use std::time::Duration;

use crate::types::SerialPortConfig;

// =============================================================================
// RetryStrategy
// =============================================================================

/// Pause inserted before a retry.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// No delay between retries.
    Immediate,
    /// Fixed delay between retries.
    Fixed(Duration),
}

impl RetryStrategy {
    /// Calculates the delay before retry number `attempt` (0-based).
    pub fn delay(&self, _attempt: u32) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed(duration) => *duration,
        }
    }

    /// Waits one inter-frame gap of the given line between attempts.
    pub fn inter_frame(config: &SerialPortConfig) -> Self {
        Self::Fixed(config.inter_frame_delay())
    }

    /// Creates a fixed delay strategy.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed(delay)
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(1))
    }
}

// =============================================================================
// Tests
// =============================================================================

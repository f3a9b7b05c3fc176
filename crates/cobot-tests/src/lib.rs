// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Glue Cell Integration Tests
//!
//! End-to-end tests across the cobot crates, run against simulated
//! hardware.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cobot-tests
//! cargo test -p cobot-tests --test integration_modbus
//! cargo test -p cobot-tests --test integration_calibration
//! cargo test -p cobot-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Modbus Tests (`integration_modbus.rs`)
//! - Bus scans with silent, faulty and responding slaves
//! - Register reads and writes with decimal scaling
//! - Retries and buffer flushing
//!
//! ### Calibration Tests (`integration_calibration.rs`)
//! - Full runs from homing to persisted model
//! - Missing frames, unreachable poses, camera failures
//! - Fit selection on recorded data
//!
//! ### Config Tests (`integration_config.rs`)
//! - Loading files with placeholders and overrides
//! - Building hardware objects from the loaded configuration
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use cobot_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let bus = SimulatedBus::new().with_device(3, &[(0, 42)]);
//!     let transport = SerialFixtures::transport(&bus, SerialFixtures::config(115200, 3, 1));
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}

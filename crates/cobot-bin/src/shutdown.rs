// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Ctrl-C handling for long-running commands.
//!
//! Long operations (bus scans, calibration runs) poll a shared
//! [`AtomicBool`] between steps. [`CancelOnSignal`] sets that flag when the
//! user presses Ctrl-C, so the operation stops at its next check point
//! instead of the process dying mid-frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Sets a cancellation flag on Ctrl-C until dropped.
///
/// # Example
///
/// ```ignore
/// let guard = CancelOnSignal::install();
/// let result = scanner.scan_cancellable(&request, &guard.flag()).await?;
/// ```
pub struct CancelOnSignal {
    flag: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CancelOnSignal {
    /// Installs the handler with a fresh flag.
    pub fn install() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)))
    }

    /// Installs the handler on an existing flag.
    pub fn with_flag(flag: Arc<AtomicBool>) -> Self {
        let task_flag = flag.clone();
        let task = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, stopping at the next check point");
                    task_flag.store(true, Ordering::SeqCst);
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
        Self { flag, task }
    }

    /// Returns the shared flag.
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }

    /// Returns `true` once Ctrl-C was received.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for CancelOnSignal {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version() -> BinResult<()> {
    println!("cobot - glue cell hardware tool");
    println!();
    println!("Version Information:");
    println!("  cobot-bin:         {}", crate::VERSION);
    println!("  cobot-modbus:      {}", cobot_modbus::VERSION);
    println!("  cobot-vision:      {}", cobot_vision::VERSION);
    println!("  cobot-calibration: {}", cobot_calibration::VERSION);
    println!("  cobot-config:      {}", cobot_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}

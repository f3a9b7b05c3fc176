// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `cells` command.

use cobot_config::{CellHardwareConfig, CobotConfig};

use crate::cli::{CellsArgs, OutputFormat};
use crate::error::BinResult;

/// Executes the `cells` command.
pub fn cells(config: &CobotConfig, args: CellsArgs) -> BinResult<()> {
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&config.cells)),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "cells": config
                    .cells
                    .cell_ids()
                    .into_iter()
                    .map(|cell| {
                        serde_json::json!({
                            "cell": cell,
                            "motor_register": config.cells.cell_motor_mapping.get(&cell),
                            "glue_type": config.cells.glue_type(cell).map(|g| g.name().to_string()),
                        })
                    })
                    .collect::<Vec<_>>(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
        }
    }
    Ok(())
}

fn render_text(cells: &CellHardwareConfig) -> String {
    let mut out = format!("{} cell(s) configured\n\n  cell  register  glue\n", cells.cell_count());
    for (cell, register) in &cells.cell_motor_mapping {
        let glue = cells
            .glue_type(*cell)
            .map(|g| g.name().to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("  {:<4}  {:<8}  {}\n", cell, register, glue));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobot_config::GlueType;

    #[test]
    fn test_render_text() {
        let mut cells = CellHardwareConfig::default();
        cells.glue_types.insert(2, GlueType::TypeB);

        let text = render_text(&cells);
        assert!(text.starts_with("4 cell(s) configured"));
        assert!(text.contains("  2     2         Type B\n"));
        assert!(text.contains("  4     6         -\n"));
    }
}

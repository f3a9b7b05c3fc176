// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Glue cell hardware mapping and glue types.
//!
//! Each glue cell sits on a load cell / pump motor reached through one
//! Modbus register. The mapping is plain configuration passed to whoever
//! needs it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// GlueType
// =============================================================================

/// Glue loaded into a cell.
///
/// Parsed from `"Type A"` or `"TypeA"` (any case); other names become
/// [`GlueType::Custom`]. Serialized as the display form, e.g. `"Type A"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GlueType {
    /// Type A.
    TypeA,
    /// Type B.
    TypeB,
    /// Type C.
    TypeC,
    /// Type D.
    TypeD,
    /// User-defined glue.
    Custom(String),
}

impl GlueType {
    /// The built-in types.
    pub const BUILTIN: [GlueType; 4] = [Self::TypeA, Self::TypeB, Self::TypeC, Self::TypeD];

    /// Returns the display name.
    pub fn name(&self) -> &str {
        match self {
            Self::TypeA => "Type A",
            Self::TypeB => "Type B",
            Self::TypeC => "Type C",
            Self::TypeD => "Type D",
            Self::Custom(name) => name,
        }
    }

    /// Returns `true` for user-defined glue.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for GlueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GlueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidGlueType {
                value: s.to_string(),
            });
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        Ok(match compact.as_str() {
            "typea" => Self::TypeA,
            "typeb" => Self::TypeB,
            "typec" => Self::TypeC,
            "typed" => Self::TypeD,
            _ => Self::Custom(trimmed.to_string()),
        })
    }
}

impl TryFrom<String> for GlueType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GlueType> for String {
    fn from(glue: GlueType) -> Self {
        glue.name().to_string()
    }
}

// =============================================================================
// CellHardwareConfig
// =============================================================================

/// Cell id to motor register mapping, plus the glue loaded in each cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellHardwareConfig {
    /// Cell id to Modbus register of its motor.
    pub cell_motor_mapping: BTreeMap<u8, u16>,

    /// Cell id to glue type.
    pub glue_types: BTreeMap<u8, GlueType>,
}

impl Default for CellHardwareConfig {
    fn default() -> Self {
        Self {
            cell_motor_mapping: BTreeMap::from([(1, 0), (2, 2), (3, 4), (4, 6)]),
            glue_types: BTreeMap::new(),
        }
    }
}

impl CellHardwareConfig {
    /// Motor register of `cell_id`.
    pub fn motor_address(&self, cell_id: u8) -> ConfigResult<u16> {
        self.cell_motor_mapping
            .get(&cell_id)
            .copied()
            .ok_or_else(|| ConfigError::UnknownCell {
                cell_id,
                valid: self.cell_ids(),
            })
    }

    /// Glue configured for `cell_id`, if any.
    pub fn glue_type(&self, cell_id: u8) -> Option<&GlueType> {
        self.glue_types.get(&cell_id)
    }

    /// Configured cell ids, ascending.
    pub fn cell_ids(&self) -> Vec<u8> {
        self.cell_motor_mapping.keys().copied().collect()
    }

    /// Number of configured cells.
    pub fn cell_count(&self) -> usize {
        self.cell_motor_mapping.len()
    }

    /// Returns `true` if `cell_id` is configured.
    pub fn is_valid_cell_id(&self, cell_id: u8) -> bool {
        self.cell_motor_mapping.contains_key(&cell_id)
    }

    /// Validates the mapping.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cell_motor_mapping.is_empty() {
            return Err(ConfigError::validation(
                "cells.cell_motor_mapping",
                "at least one cell must be configured",
            ));
        }

        let mut seen = BTreeMap::new();
        for (&cell, &register) in &self.cell_motor_mapping {
            if let Some(other) = seen.insert(register, cell) {
                return Err(ConfigError::validation(
                    "cells.cell_motor_mapping",
                    format!("cells {} and {} share motor register {}", other, cell, register),
                ));
            }
        }

        for cell in self.glue_types.keys() {
            if !self.is_valid_cell_id(*cell) {
                return Err(ConfigError::validation(
                    "cells.glue_types",
                    format!("glue type set for unknown cell {}", cell),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let cells = CellHardwareConfig::default();
        assert_eq!(cells.motor_address(1).unwrap(), 0);
        assert_eq!(cells.motor_address(4).unwrap(), 6);
        assert_eq!(cells.cell_ids(), vec![1, 2, 3, 4]);
        assert_eq!(cells.cell_count(), 4);
        assert!(cells.validate().is_ok());
    }

    #[test]
    fn test_unknown_cell() {
        let err = CellHardwareConfig::default().motor_address(5).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCell { cell_id: 5, .. }));
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let cells = CellHardwareConfig {
            cell_motor_mapping: BTreeMap::from([(1, 0), (2, 0)]),
            glue_types: BTreeMap::new(),
        };
        assert!(cells.validate().is_err());
    }

    #[test]
    fn test_glue_type_parsing() {
        assert_eq!("Type A".parse::<GlueType>().unwrap(), GlueType::TypeA);
        assert_eq!("TypeB".parse::<GlueType>().unwrap(), GlueType::TypeB);
        assert_eq!(" type c ".parse::<GlueType>().unwrap(), GlueType::TypeC);
        assert_eq!(
            "Epoxy 2K".parse::<GlueType>().unwrap(),
            GlueType::Custom("Epoxy 2K".to_string())
        );
        assert!("  ".parse::<GlueType>().is_err());
    }

    #[test]
    fn test_glue_type_serializes_display_form() {
        let json = serde_json::to_string(&GlueType::TypeD).unwrap();
        assert_eq!(json, "\"Type D\"");
        let parsed: GlueType = serde_json::from_str("\"TypeD\"").unwrap();
        assert_eq!(parsed, GlueType::TypeD);
    }

    #[test]
    fn test_mapping_json_uses_string_keys() {
        let json = r#"{"cell_motor_mapping": {"1": 10, "2": 12}, "glue_types": {"2": "Type B"}}"#;
        let cells: CellHardwareConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cells.motor_address(2).unwrap(), 12);
        assert_eq!(cells.glue_type(2), Some(&GlueType::TypeB));
        assert!(cells.validate().is_ok());
    }
}

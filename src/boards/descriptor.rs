//! Declarative board descriptors and their registration-time validation

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compiler::OBJECT_EXTENSION;
use crate::error::{MicroError, Result};

/// Keys every board specification must carry
pub const REQUIRED_KEYS: [&str; 5] = ["name", "toolchain", "firmware_format", "compile_flags", "libraries"];

/// How a board moves a firmware image onto the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployMethod {
    /// Copy the image onto a mounted bootloader volume
    MassStorage,
    /// Hand the image to an external flash tool talking to a serial port
    SerialFlash,
}

/// One microcontroller target: toolchain, flags, firmware format and deploy hints.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    pub name: String,
    /// Logical toolchain id, resolved through the binding table (e.g. "arm-gcc")
    pub toolchain: String,
    /// Firmware image extension (e.g. "uf2", "bin")
    pub firmware_format: String,
    /// Compiler flags, passed in this order
    pub compile_flags: Vec<String>,
    /// Headers/libraries the board supports. Informational only.
    pub libraries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SDK id, resolved through the binding table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    /// Include directories relative to the SDK root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployMethod>,
    /// Flash tool argv; `{firmware}` and `{address}` are substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_command: Option<Vec<String>>,
}

impl BoardDescriptor {
    /// Human-readable name for listings
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    /// Deploy method, falling back to one derived from the firmware format
    pub fn deploy_method(&self) -> DeployMethod {
        self.deploy.unwrap_or_else(|| {
            if self.firmware_format.eq_ignore_ascii_case("uf2") {
                DeployMethod::MassStorage
            } else {
                DeployMethod::SerialFlash
            }
        })
    }

    /// Structural checks applied before a descriptor is written to the store
    pub fn validate(&self) -> Result<()> {
        validate_board_name(&self.name)?;

        if self.toolchain.trim().is_empty() {
            return Err(MicroError::InvalidBoard(format!("board '{}' has an empty toolchain", self.name)));
        }

        if self.firmware_format.is_empty()
            || !self.firmware_format.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(MicroError::InvalidBoard(format!(
                "board '{}' has an invalid firmware format '{}'",
                self.name, self.firmware_format
            )));
        }

        // the image is written next to the object, so it cannot share its extension
        if self.firmware_format.eq_ignore_ascii_case(OBJECT_EXTENSION) {
            return Err(MicroError::InvalidBoard(format!(
                "board '{}' uses the object extension '{}' as its firmware format",
                self.name, self.firmware_format
            )));
        }

        if let Some(command) = &self.flash_command {
            if command.is_empty() {
                return Err(MicroError::InvalidBoard(format!(
                    "board '{}' declares an empty flash command",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Parse a board specification file (JSON, or YAML for `.yml`/`.yaml`).
    ///
    /// Every missing required key is reported in a single error.
    pub fn from_spec_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MicroError::InvalidBoard(format!(
                "specification file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );

        let value: serde_json::Value = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| {
                MicroError::InvalidBoard(format!("invalid YAML in {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                MicroError::InvalidBoard(format!("invalid JSON in {}: {}", path.display(), e))
            })?
        };

        Self::from_spec_value(value)
    }

    /// Build a descriptor from an already-parsed specification
    pub fn from_spec_value(value: serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            MicroError::InvalidBoard("board specification must be an object".to_string())
        })?;

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(MicroError::InvalidBoard(format!(
                "missing required keys in board specification: {}",
                missing.join(", ")
            )));
        }

        let mut descriptor: BoardDescriptor = serde_json::from_value(value)
            .map_err(|e| MicroError::InvalidBoard(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        descriptor.libraries.retain(|lib| seen.insert(lib.clone()));

        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Board names double as store file names, so they must be a single path component
pub fn validate_board_name(name: &str) -> Result<()> {
    let valid = !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':'])
        && !name.chars().any(char::is_control);

    if valid {
        Ok(())
    } else {
        Err(MicroError::InvalidBoard(format!("invalid board name '{}'", name)))
    }
}

/// One entry of a board listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    /// Identifier used with `--board`
    pub id: String,
    /// Display name, when the descriptor could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
    /// Why the descriptor could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BoardSummary {
    pub fn from_descriptor(id: &str, descriptor: &BoardDescriptor) -> Self {
        Self {
            id: id.to_string(),
            display_name: Some(descriptor.display_name().to_string()),
            libraries: descriptor.libraries.clone(),
            error: None,
        }
    }

    pub fn unreadable(id: &str, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            display_name: None,
            libraries: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// `- RP2040: Raspberry Pi Pico` plus a short library line when known
    pub fn render(&self) -> String {
        match &self.display_name {
            Some(name) => {
                let mut line = format!("  - {}: {}", self.id, name);
                if !self.libraries.is_empty() {
                    let libs: Vec<&str> = self
                        .libraries
                        .iter()
                        .take(3)
                        .map(|lib| lib.rsplit('/').next().unwrap_or(lib))
                        .collect();
                    line.push_str(&format!("\n    Supported libraries: {}...", libs.join(", ")));
                }
                line
            }
            None => format!("  - {}", self.id),
        }
    }
}

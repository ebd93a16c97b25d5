//! Toolchain and SDK resolution against the binding table
//!
//! Paths are checked for existence on every call; nothing is cached between
//! resolutions.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::ToolchainConfig;
use crate::error::{MicroError, Result};
use crate::host::HostOs;

pub struct ToolchainResolver<'a> {
    table: &'a ToolchainConfig,
}

impl<'a> ToolchainResolver<'a> {
    pub fn new(table: &'a ToolchainConfig) -> Self {
        Self { table }
    }

    /// Executable path for `toolchain` on `os`
    pub fn resolve(&self, toolchain: &str, os: HostOs) -> Result<PathBuf> {
        let path = self
            .table
            .toolchain_path(toolchain, os)
            .ok_or_else(|| MicroError::ToolchainNotConfigured {
                toolchain: toolchain.to_string(),
                os: os.to_string(),
            })?;

        if !path.exists() {
            return Err(MicroError::ToolchainMissing {
                toolchain: toolchain.to_string(),
                path: path.clone(),
            });
        }

        debug!("Resolved toolchain '{}' for {}: {}", toolchain, os, path.display());
        Ok(path.clone())
    }

    /// SDK root for `sdk` on `os`. An unconfigured or missing SDK is not fatal:
    /// the compile proceeds without SDK include flags.
    pub fn resolve_sdk(&self, sdk: &str, os: HostOs) -> Option<PathBuf> {
        let Some(path) = self.table.sdk_path(sdk, os) else {
            warn!("SDK '{}' not configured for {}", sdk, os);
            return None;
        };

        if !path.exists() {
            warn!("SDK path not found: {}", path.display());
            return None;
        }

        debug!("Using {} at: {}", sdk, path.display());
        Some(path.clone())
    }
}

//! Type definitions for the micropp MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::boards::BoardSummary;
use crate::config::ToolchainConfig;

// ============================================================================
// list_boards
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListBoardsArgs {}

#[derive(Debug, Serialize)]
pub struct ListBoardsResult {
    pub boards: Vec<BoardSummary>,
}

// ============================================================================
// add_board
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddBoardArgs {
    /// Path to a JSON or YAML board specification file
    #[serde(default)]
    pub spec_file: Option<String>,
    /// Inline board specification (name, toolchain, firmware_format, compile_flags, libraries)
    #[serde(default)]
    pub spec: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AddBoardResult {
    pub name: String,
    /// Where the descriptor was stored
    pub path: String,
}

// ============================================================================
// show_config
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShowConfigArgs {}

#[derive(Debug, Serialize)]
pub struct ShowConfigResult {
    pub host_os: String,
    pub config_file: String,
    #[serde(flatten)]
    pub table: ToolchainConfig,
}

// ============================================================================
// configure
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigureArgs {
    /// Toolchain id to bind (e.g. "arm-gcc"); mutually exclusive with `sdk`
    #[serde(default)]
    pub toolchain: Option<String>,
    /// SDK id to bind (e.g. "pico-sdk"); mutually exclusive with `toolchain`
    #[serde(default)]
    pub sdk: Option<String>,
    /// Path for the host OS
    pub path: String,
}

// ============================================================================
// compile
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompileToolArgs {
    /// Source file to compile
    pub source: String,
    /// Board name (see list_boards)
    pub board: String,
    /// Deploy address: serial port or mass-storage mount point. Ignored with compile_only.
    #[serde(default)]
    pub address: String,
    /// Log the full compiler command line
    #[serde(default)]
    pub verbose: bool,
    /// Stop after compilation
    #[serde(default)]
    pub compile_only: bool,
}

#[derive(Debug, Serialize)]
pub struct CompileToolResult {
    pub success: bool,
    /// Last stage entered
    pub state: String,
    pub stages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub summary: String,
    /// Error category when the run aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

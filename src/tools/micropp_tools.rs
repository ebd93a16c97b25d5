//! RMCP 0.3.2 implementation of the micropp tools
//!
//! Exposes board listing/registration, toolchain configuration and the
//! compile/deploy pipeline over MCP.

use rmcp::{
    tool, tool_router, tool_handler, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    ErrorData as McpError,
    service::RequestContext,
    RoleServer,
};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, error, info};

use super::types::*;
use crate::boards::{BoardDescriptor, BoardRegistry};
use crate::config::{self as micro_config, Config, ToolchainConfig};
use crate::error::{ErrorKind, MicroError};
use crate::pipeline::{Pipeline, PipelineRequest};

/// Map a micropp error onto the MCP error space
fn to_mcp_error(err: MicroError) -> McpError {
    match err.kind() {
        ErrorKind::Configuration | ErrorKind::NotFound | ErrorKind::Board => {
            McpError::invalid_params(err.to_string(), None)
        }
        _ => McpError::internal_error(err.to_string(), None),
    }
}

fn json_result<T: Serialize>(result: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(result).map_err(|e| {
        McpError::internal_error(format!("Serialization error: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// micropp tool handler
#[derive(Clone)]
pub struct MicroToolHandler {
    #[allow(dead_code)]
    tool_router: ToolRouter<MicroToolHandler>,
    config: Config,
}

impl MicroToolHandler {
    pub fn new(config: Config) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config,
        }
    }

    fn load_table(&self) -> Result<ToolchainConfig, McpError> {
        ToolchainConfig::load(&self.config.config_file()).map_err(to_mcp_error)
    }
}

#[tool_router]
impl MicroToolHandler {
    #[tool(description = "List the boards micropp can build for. Boards whose definition cannot be read are still listed with an error.")]
    async fn list_boards(
        &self,
        Parameters(_args): Parameters<ListBoardsArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Listing boards in {}", self.config.boards_dir().display());

        let registry = BoardRegistry::from_config(&self.config);
        let boards = registry.list_boards().map_err(to_mcp_error)?;

        info!("Found {} boards", boards.len());
        json_result(&ListBoardsResult { boards })
    }

    #[tool(description = "Register a board from a specification (file path or inline JSON). Required fields: name, toolchain, firmware_format, compile_flags, libraries. Replaces an existing board of the same name.")]
    async fn add_board(
        &self,
        Parameters(args): Parameters<AddBoardArgs>,
    ) -> Result<CallToolResult, McpError> {
        let descriptor = match (args.spec_file, args.spec) {
            (Some(file), None) => BoardDescriptor::from_spec_file(&PathBuf::from(file)),
            (None, Some(value)) => BoardDescriptor::from_spec_value(value),
            _ => {
                return Err(McpError::invalid_params(
                    "Provide exactly one of spec_file or spec".to_string(),
                    None,
                ))
            }
        }
        .map_err(to_mcp_error)?;

        let registry = BoardRegistry::from_config(&self.config);
        let path = registry.register_descriptor(&descriptor).map_err(to_mcp_error)?;

        info!("Added new board: {}", descriptor.name);
        json_result(&AddBoardResult {
            name: descriptor.name,
            path: path.display().to_string(),
        })
    }

    #[tool(description = "Show the toolchain and SDK paths configured for each host OS")]
    async fn show_config(
        &self,
        Parameters(_args): Parameters<ShowConfigArgs>,
    ) -> Result<CallToolResult, McpError> {
        let table = self.load_table()?;
        json_result(&ShowConfigResult {
            host_os: self.config.host_os.to_string(),
            config_file: self.config.config_file().display().to_string(),
            table,
        })
    }

    #[tool(description = "Set the path of a toolchain or SDK for the current host OS and save it to config.json")]
    async fn configure(
        &self,
        Parameters(args): Parameters<ConfigureArgs>,
    ) -> Result<CallToolResult, McpError> {
        let path = PathBuf::from(&args.path);
        let table = match (args.toolchain.as_deref(), args.sdk.as_deref()) {
            (Some(toolchain), None) => micro_config::configure_toolchain(&self.config, toolchain, &path),
            (None, Some(sdk)) => micro_config::configure_sdk(&self.config, sdk, &path),
            _ => {
                return Err(McpError::invalid_params(
                    "Provide exactly one of toolchain or sdk".to_string(),
                    None,
                ))
            }
        }
        .map_err(to_mcp_error)?;

        json_result(&ShowConfigResult {
            host_os: self.config.host_os.to_string(),
            config_file: self.config.config_file().display().to_string(),
            table,
        })
    }

    #[tool(description = "Compile a C++ source file for a board and deploy the firmware to an address (serial port or mass-storage mount point). With compile_only the run stops after producing the object file.")]
    async fn compile(
        &self,
        Parameters(args): Parameters<CompileToolArgs>,
    ) -> Result<CallToolResult, McpError> {
        if !args.compile_only && args.address.trim().is_empty() {
            return Err(McpError::invalid_params(
                "address is required unless compile_only is set".to_string(),
                None,
            ));
        }

        let table = self.load_table()?;
        let registry = BoardRegistry::from_config(&self.config);
        let pipeline = Pipeline::new(&self.config, &registry, &table);

        let request = PipelineRequest {
            source: PathBuf::from(&args.source),
            board: args.board,
            address: args.address,
            verbose: args.verbose,
            compile_only: args.compile_only,
        };
        let report = pipeline.run(&request).await;

        if !report.is_success() {
            error!("{}", report.summary());
        }

        json_result(&CompileToolResult {
            success: report.is_success(),
            state: report.state.to_string(),
            stages: report.history.iter().map(|s| s.to_string()).collect(),
            artifact: report.artifact.as_ref().map(|p| p.display().to_string()),
            summary: report.summary(),
            error_kind: report.error.as_ref().map(|e| e.kind().to_string()),
        })
    }
}

#[tool_handler]
impl ServerHandler for MicroToolHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "micropp MCP Server - Compile C++ for microcontroller boards and deploy the firmware. \
                 5 tools available: list_boards, add_board, show_config, configure, compile."
                    .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!("micropp MCP server initialized with 5 tools");
        Ok(self.get_info())
    }
}

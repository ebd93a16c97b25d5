//! micropp MCP tools module
//!
//! A single tool handler over the board registry, the binding table and the
//! build/deploy pipeline, using the RMCP 0.3.2 API patterns.

pub mod micropp_tools;
pub mod types;

pub use micropp_tools::*;
pub use types::*;

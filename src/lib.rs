//! micropp
//!
//! Compiles a C++ source file for a named microcontroller board and deploys the
//! resulting firmware to a device address. Boards are data-driven descriptors (or
//! in-code plugins) run through a uniform resolve, compile, generate, deploy pipeline.

pub mod boards;
pub mod compiler;
pub mod config;
pub mod error;
pub mod firmware;
pub mod host;
pub mod pipeline;
pub mod toolchain;
pub mod tools;

pub use boards::{BoardDescriptor, BoardPlugin, BoardRegistry};
pub use config::{Config, ToolchainConfig};
pub use error::{ErrorKind, MicroError, Result};
pub use host::HostOs;
pub use pipeline::{Pipeline, PipelineReport, PipelineRequest, PipelineState};
pub use tools::MicroToolHandler;

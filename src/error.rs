//! Error types for micropp

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for micropp
#[derive(Error, Debug)]
pub enum MicroError {
    #[error("Unsupported host OS '{0}'. micropp only supports Windows and Linux")]
    UnsupportedHost(String),

    #[error("Toolchain '{toolchain}' is not configured for {os}. Configure a path with: micropp config --toolchain {toolchain} --path <path>")]
    ToolchainNotConfigured { toolchain: String, os: String },

    #[error("Toolchain '{toolchain}' not found at {}. Install it or configure a new path with: micropp config --toolchain {toolchain} --path <path>", path.display())]
    ToolchainMissing { toolchain: String, path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Board '{0}' not found. Use 'micropp list-boards' to see available boards")]
    BoardNotFound(String),

    #[error("Failed to load board '{board}': {cause}")]
    BoardLoad { board: String, cause: String },

    #[error("Invalid board specification: {0}")]
    InvalidBoard(String),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to launch compiler: {0}")]
    CompilerLaunch(String),

    #[error("Compiler did not finish within {0:?} and was terminated")]
    CompileTimeout(Duration),

    #[error("Compilation failed:\n{0}")]
    CompileFailed(String),

    #[error("Firmware generation failed: {0}")]
    Generation(String),

    #[error("Deployment failed: {0}")]
    Deploy(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse classification used for stage-labelled diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid toolchain/SDK binding, fixable via configuration
    Configuration,
    /// Board or source file absent, fixable via correct input
    NotFound,
    /// Board definition that is missing keys or cannot be parsed
    Board,
    /// Subprocess launch failure, timeout or non-zero exit
    Execution,
    Generation,
    Deploy,
    Internal,
}

impl MicroError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MicroError::UnsupportedHost(_)
            | MicroError::ToolchainNotConfigured { .. }
            | MicroError::ToolchainMissing { .. }
            | MicroError::InvalidConfig(_) => ErrorKind::Configuration,
            MicroError::BoardNotFound(_) | MicroError::SourceNotFound(_) => ErrorKind::NotFound,
            MicroError::BoardLoad { .. } | MicroError::InvalidBoard(_) => ErrorKind::Board,
            MicroError::CompilerLaunch(_)
            | MicroError::CompileTimeout(_)
            | MicroError::CompileFailed(_) => ErrorKind::Execution,
            MicroError::Generation(_) => ErrorKind::Generation,
            MicroError::Deploy(_) => ErrorKind::Deploy,
            MicroError::IoError(_)
            | MicroError::SerializationError(_)
            | MicroError::YamlError(_)
            | MicroError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Board => write!(f, "board definition"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Generation => write!(f, "firmware generation"),
            ErrorKind::Deploy => write!(f, "deployment"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MicroError>;

/// Errors raised inside board hooks
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Object file not found: {}", .0.display())]
    ObjectMissing(PathBuf),

    #[error("Firmware image would overwrite the object file {}", .0.display())]
    ImageOverwritesObject(PathBuf),

    #[error("Invalid deploy address '{0}'")]
    InvalidAddress(String),

    #[error("Flash tool failed: {0}")]
    FlashTool(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

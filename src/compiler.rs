//! Compiler invocation
//!
//! Builds `<toolchain> -c <source> -o <object> <flags...>` and runs it as a single
//! non-shell subprocess. A non-zero exit is reported as [`CompileResult::Failure`]
//! rather than an error so the caller decides what a failed compile means.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::boards::BoardDescriptor;
use crate::error::{MicroError, Result};

pub const OBJECT_EXTENSION: &str = "o";

/// Object output path: always the source's sibling with the object extension
pub fn object_path_for(source: &Path) -> PathBuf {
    source.with_extension(OBJECT_EXTENSION)
}

/// `-I<sdk_root>/<dir>` for every include directory the board declares
pub fn sdk_include_flags(descriptor: &BoardDescriptor, sdk_root: &Path) -> Vec<String> {
    descriptor
        .include_paths
        .iter()
        .map(|dir| format!("-I{}", sdk_root.join(dir).display()))
        .collect()
}

/// Board flags first, SDK include flags appended
pub fn assemble_flags(descriptor: &BoardDescriptor, sdk_root: Option<&Path>) -> Vec<String> {
    let mut flags = descriptor.compile_flags.clone();
    if let Some(root) = sdk_root {
        flags.extend(sdk_include_flags(descriptor, root));
    }
    flags
}

#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub source_path: PathBuf,
    pub board: BoardDescriptor,
    pub toolchain_path: PathBuf,
    pub compile_flags: Vec<String>,
    pub verbose: bool,
}

impl CompileRequest {
    pub fn new(
        source_path: impl Into<PathBuf>,
        board: &BoardDescriptor,
        toolchain_path: impl Into<PathBuf>,
        sdk_root: Option<&Path>,
        verbose: bool,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            board: board.clone(),
            toolchain_path: toolchain_path.into(),
            compile_flags: assemble_flags(board, sdk_root),
            verbose,
        }
    }

    pub fn object_path(&self) -> PathBuf {
        object_path_for(&self.source_path)
    }

    /// Full argv, toolchain first
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = vec![
            self.toolchain_path.display().to_string(),
            "-c".to_string(),
            self.source_path.display().to_string(),
            "-o".to_string(),
            self.object_path().display().to_string(),
        ];
        argv.extend(self.compile_flags.iter().cloned());
        argv
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileResult {
    Success { object_path: PathBuf },
    /// Compiler ran and exited non-zero; carries its stderr verbatim
    Failure { diagnostic: String },
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success { .. })
    }
}

/// Runs the external compiler with a bounded wait
#[derive(Debug, Clone)]
pub struct CompilerInvoker {
    timeout: Duration,
}

impl CompilerInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn compile(&self, request: &CompileRequest) -> Result<CompileResult> {
        if !request.source_path.exists() {
            error!("Source file not found: {}", request.source_path.display());
            return Err(MicroError::SourceNotFound(request.source_path.clone()));
        }

        let object_path = request.object_path();

        if request.verbose {
            info!("Executing: {}", request.command_line().join(" "));
        } else {
            debug!("Executing: {}", request.command_line().join(" "));
        }

        let mut cmd = Command::new(&request.toolchain_path);
        cmd.arg("-c")
            .arg(&request.source_path)
            .arg("-o")
            .arg(&object_path)
            .args(&request.compile_flags)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                MicroError::CompilerLaunch(format!("{}: {}", request.toolchain_path.display(), e))
            })?,
            Err(_) => {
                error!(
                    "Compiler exceeded {:?} compiling {}",
                    self.timeout,
                    request.source_path.display()
                );
                return Err(MicroError::CompileTimeout(self.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("Compiler output:\n{}", stdout);
        }

        if output.status.success() {
            info!("Compilation successful");
            return Ok(CompileResult::Success { object_path });
        }

        error!("Compilation failed");
        let diagnostic = if !stderr.trim().is_empty() {
            stderr.to_string()
        } else if !stdout.trim().is_empty() {
            stdout.to_string()
        } else {
            format!("compiler exited with {}", output.status)
        };
        Ok(CompileResult::Failure { diagnostic })
    }
}

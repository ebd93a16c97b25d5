//! Build/deploy pipeline orchestrator
//!
//! Stages run one after another: resolve board and toolchain, compile, generate
//! firmware, deploy. The first failure aborts the run and is recorded against the
//! stage it happened in.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::boards::{BoardPlugin, BoardRegistry};
use crate::compiler::{CompileRequest, CompileResult, CompilerInvoker};
use crate::config::{Config, ToolchainConfig};
use crate::error::{MicroError, Result};
use crate::firmware;
use crate::toolchain::ToolchainResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resolving,
    Compiling,
    GeneratingFirmware,
    Deploying,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Resolving => "resolve",
            PipelineState::Compiling => "compile",
            PipelineState::GeneratingFirmware => "firmware",
            PipelineState::Deploying => "deploy",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// One board/source/address triple
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: PathBuf,
    pub board: String,
    pub address: String,
    pub verbose: bool,
    pub compile_only: bool,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub board: String,
    pub address: String,
    /// Final state: `Done`, `Compiling` (compile-only success) or `Aborted`
    pub state: PipelineState,
    /// Every state entered, in order, starting with `Idle`
    pub history: Vec<PipelineState>,
    /// Object path in compile-only mode, firmware image otherwise
    pub artifact: Option<PathBuf>,
    pub error: Option<MicroError>,
    /// Stage that was running when the pipeline aborted
    pub aborted_in: Option<PipelineState>,
}

impl PipelineReport {
    fn new(request: &PipelineRequest) -> Self {
        Self {
            board: request.board.clone(),
            address: request.address.clone(),
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            artifact: None,
            error: None,
            aborted_in: None,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        self.state = state;
        self.history.push(state);
    }

    fn abort(mut self, err: MicroError) -> Self {
        let stage = self.state;
        error!("Pipeline aborted during {} stage: {}", stage, err);
        self.aborted_in = Some(stage);
        self.error = Some(err);
        self.enter(PipelineState::Aborted);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.state != PipelineState::Aborted
    }

    /// One human-readable line (plus diagnostic text for compile failures)
    pub fn summary(&self) -> String {
        if let (Some(stage), Some(err)) = (self.aborted_in, &self.error) {
            return format!("[{}] {}", stage, err);
        }
        match (self.state, &self.artifact) {
            (PipelineState::Compiling, Some(object)) => {
                format!("Compilation successful: {}", object.display())
            }
            (PipelineState::Done, Some(image)) => format!(
                "Successfully deployed {} to {}",
                image.display(),
                self.address
            ),
            _ => format!("Pipeline stopped in state {}", self.state),
        }
    }
}

/// Borrowed view of everything one run needs. Constructed per invocation.
pub struct Pipeline<'a> {
    config: &'a Config,
    registry: &'a BoardRegistry,
    toolchains: &'a ToolchainConfig,
    invoker: CompilerInvoker,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, registry: &'a BoardRegistry, toolchains: &'a ToolchainConfig) -> Self {
        Self {
            config,
            registry,
            toolchains,
            invoker: CompilerInvoker::new(config.compile_timeout),
        }
    }

    /// Run every stage. Failures are captured in the report, never returned.
    pub async fn run(&self, request: &PipelineRequest) -> PipelineReport {
        let mut report = PipelineReport::new(request);

        report.enter(PipelineState::Resolving);
        let (board, compile_request) = match self.resolve(request) {
            Ok(resolved) => resolved,
            Err(e) => return report.abort(e),
        };

        report.enter(PipelineState::Compiling);
        let object_path = match self.invoker.compile(&compile_request).await {
            Ok(CompileResult::Success { object_path }) => object_path,
            Ok(CompileResult::Failure { diagnostic }) => {
                return report.abort(MicroError::CompileFailed(diagnostic));
            }
            Err(e) => return report.abort(e),
        };

        if request.compile_only {
            info!("Compile-only mode, stopping after compilation");
            report.artifact = Some(object_path);
            return report;
        }

        report.enter(PipelineState::GeneratingFirmware);
        let artifact = match firmware::generate_firmware(board.clone(), &object_path).await {
            Ok(artifact) => artifact,
            Err(e) => return report.abort(e),
        };

        report.enter(PipelineState::Deploying);
        match firmware::deploy_firmware(board, &artifact, &request.address).await {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                let reason = outcome
                    .diagnostic
                    .unwrap_or_else(|| "board reported an unsuccessful deployment".to_string());
                return report.abort(MicroError::Deploy(reason));
            }
            Err(e) => return report.abort(e),
        }

        info!("Deployed {} to {}", artifact.path.display(), request.address);
        report.artifact = Some(artifact.path);
        report.enter(PipelineState::Done);
        report
    }

    fn resolve(&self, request: &PipelineRequest) -> Result<(Arc<dyn BoardPlugin>, CompileRequest)> {
        let board = self.registry.load_board(&request.board)?;
        let descriptor = board.descriptor();
        info!("Compiling {} for {}", request.source.display(), descriptor.display_name());

        let resolver = ToolchainResolver::new(self.toolchains);
        let toolchain_path = resolver.resolve(&descriptor.toolchain, self.config.host_os)?;

        let sdk_root = match &descriptor.sdk {
            Some(sdk) => resolver.resolve_sdk(sdk, self.config.host_os),
            None => None,
        };
        if sdk_root.is_none() && !descriptor.include_paths.is_empty() {
            warn!("Compiling without SDK include paths; SDK headers may not be found");
        }

        let compile_request = CompileRequest::new(
            &request.source,
            descriptor,
            toolchain_path,
            sdk_root.as_deref(),
            request.verbose,
        );
        Ok((board, compile_request))
    }
}

//! The board plugin contract invoked by the pipeline

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::descriptor::BoardDescriptor;
use super::strategy::{self, DeployStrategy};
use crate::error::BoardError;

/// Deployable image produced from a compiled object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmwareArtifact {
    pub path: PathBuf,
    /// Matches the board's `firmware_format`
    pub format: String,
}

/// Result of a single deployment attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl DeployOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// A board as the pipeline sees it: a descriptor plus the two behavioural hooks.
///
/// Hooks are synchronous and may block; the pipeline runs them off the async
/// executor and converts errors or panics into stage failures.
pub trait BoardPlugin: Send + Sync {
    fn descriptor(&self) -> &BoardDescriptor;

    /// Turn a compiled object into a deployable image
    fn generate_firmware(&self, object_path: &Path) -> Result<FirmwareArtifact, BoardError>;

    /// Move the image to the device. `address` is opaque to everyone but the board.
    fn deploy_firmware(&self, artifact: &FirmwareArtifact, address: &str) -> Result<DeployOutcome, BoardError>;
}

/// Board backed purely by a stored descriptor and the built-in strategies
#[derive(Debug, Clone)]
pub struct DescriptorBoard {
    descriptor: BoardDescriptor,
    deploy: DeployStrategy,
}

impl DescriptorBoard {
    pub fn new(descriptor: BoardDescriptor) -> Self {
        let deploy = DeployStrategy::for_descriptor(&descriptor);
        Self { descriptor, deploy }
    }

    pub fn deploy_strategy(&self) -> &DeployStrategy {
        &self.deploy
    }
}

impl BoardPlugin for DescriptorBoard {
    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    fn generate_firmware(&self, object_path: &Path) -> Result<FirmwareArtifact, BoardError> {
        strategy::copy_object_image(object_path, &self.descriptor.firmware_format)
    }

    fn deploy_firmware(&self, artifact: &FirmwareArtifact, address: &str) -> Result<DeployOutcome, BoardError> {
        self.deploy.deploy(artifact, address)
    }
}

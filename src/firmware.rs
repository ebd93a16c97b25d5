//! Runs board hooks off the async executor
//!
//! A hook may block on file copies or a flash tool, so both hooks go through
//! `spawn_blocking`. Hook errors and panics come back as stage errors instead of
//! taking the process down.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info};

use crate::boards::{BoardPlugin, DeployOutcome, FirmwareArtifact};
use crate::error::{MicroError, Result};

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "board hook panicked".to_string()
    }
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        format!("board hook panicked: {}", panic_message(err.into_panic()))
    } else {
        format!("board hook was cancelled: {}", err)
    }
}

/// Ask the board to turn `object_path` into a deployable image.
///
/// The returned artifact is checked: it must exist and carry the board's
/// firmware format.
pub async fn generate_firmware(board: Arc<dyn BoardPlugin>, object_path: &Path) -> Result<FirmwareArtifact> {
    let expected_format = board.descriptor().firmware_format.clone();
    let object: PathBuf = object_path.to_path_buf();

    debug!(
        "Generating {} firmware from {}",
        expected_format,
        object_path.display()
    );

    let hook = tokio::task::spawn_blocking(move || board.generate_firmware(&object)).await;
    let artifact = match hook {
        Ok(Ok(artifact)) => artifact,
        Ok(Err(e)) => return Err(MicroError::Generation(e.to_string())),
        Err(e) => {
            let msg = join_failure(e);
            error!("{}", msg);
            return Err(MicroError::Generation(msg));
        }
    };

    if artifact.format != expected_format {
        return Err(MicroError::Generation(format!(
            "board produced '{}' firmware, expected '{}'",
            artifact.format, expected_format
        )));
    }
    if !artifact.path.is_file() {
        return Err(MicroError::Generation(format!(
            "firmware image not found: {}",
            artifact.path.display()
        )));
    }

    info!("Firmware generated: {}", artifact.path.display());
    Ok(artifact)
}

/// Hand an existing artifact to the board's deploy hook
pub async fn deploy_firmware(
    board: Arc<dyn BoardPlugin>,
    artifact: &FirmwareArtifact,
    address: &str,
) -> Result<DeployOutcome> {
    if !artifact.path.is_file() {
        return Err(MicroError::Deploy(format!(
            "firmware image not found: {}",
            artifact.path.display()
        )));
    }

    debug!("Deploying {} to {}", artifact.path.display(), address);

    let artifact = artifact.clone();
    let address = address.to_string();
    let hook = tokio::task::spawn_blocking(move || board.deploy_firmware(&artifact, &address)).await;
    match hook {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(MicroError::Deploy(e.to_string())),
        Err(e) => {
            let msg = join_failure(e);
            error!("{}", msg);
            Err(MicroError::Deploy(msg))
        }
    }
}

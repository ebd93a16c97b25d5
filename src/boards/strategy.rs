//! Built-in firmware and deploy strategies selected by a board descriptor

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::descriptor::{BoardDescriptor, DeployMethod};
use super::plugin::{DeployOutcome, FirmwareArtifact};
use crate::error::BoardError;

/// Upper bound on a single flash tool run
pub const FLASH_TIMEOUT: Duration = Duration::from_secs(300);

const FLASH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sibling of the object file carrying the firmware extension
pub fn artifact_path_for(object_path: &Path, firmware_format: &str) -> PathBuf {
    object_path.with_extension(firmware_format)
}

/// Write the object bytes into `<stem>.<format>` next to the object.
///
/// Real image formats (UF2 blocks, ESP app images) need the vendor tools and
/// are not produced here.
pub fn copy_object_image(object_path: &Path, firmware_format: &str) -> Result<FirmwareArtifact, BoardError> {
    if !object_path.exists() {
        return Err(BoardError::ObjectMissing(object_path.to_path_buf()));
    }

    let output = artifact_path_for(object_path, firmware_format);
    if output == object_path || is_same_file(object_path, &output) {
        return Err(BoardError::ImageOverwritesObject(output));
    }
    info!("Generating {} firmware {} from {}", firmware_format, output.display(), object_path.display());
    std::fs::copy(object_path, &output)?;

    Ok(FirmwareArtifact {
        path: output,
        format: firmware_format.to_string(),
    })
}

/// How a descriptor-backed board deploys
#[derive(Debug, Clone, PartialEq)]
pub enum DeployStrategy {
    /// Copy the image onto a mounted bootloader volume (RP2040 BOOTSEL drive)
    MassStorage,
    /// Run an external flash tool against a serial port, killed after `timeout`
    SerialFlash {
        command: Option<Vec<String>>,
        timeout: Duration,
    },
}

impl DeployStrategy {
    pub fn for_descriptor(descriptor: &BoardDescriptor) -> Self {
        match descriptor.deploy_method() {
            DeployMethod::MassStorage => DeployStrategy::MassStorage,
            DeployMethod::SerialFlash => DeployStrategy::SerialFlash {
                command: descriptor.flash_command.clone(),
                timeout: FLASH_TIMEOUT,
            },
        }
    }

    pub fn deploy(&self, artifact: &FirmwareArtifact, address: &str) -> Result<DeployOutcome, BoardError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(BoardError::InvalidAddress(address.to_string()));
        }

        match self {
            DeployStrategy::MassStorage => deploy_mass_storage(artifact, address),
            DeployStrategy::SerialFlash { command, timeout } => match command {
                Some(template) => deploy_serial_flash(template, artifact, address, *timeout),
                None => Ok(DeployOutcome::failed(
                    "board declares no flash_command; add one (e.g. [\"esptool.py\", \"--port\", \"{address}\", \"write_flash\", \"0x10000\", \"{firmware}\"]) to its specification",
                )),
            },
        }
    }
}

/// Mount point for a mass-storage address.
///
/// On Windows a bare drive letter (`E`, `E:`) maps to its root. Elsewhere the
/// address is used as given.
pub fn mass_storage_root(address: &str) -> PathBuf {
    #[cfg(windows)]
    {
        let letter = address.strip_suffix(':').unwrap_or(address);
        if letter.len() == 1 && letter.chars().all(|c| c.is_ascii_alphabetic()) {
            return PathBuf::from(format!("{}:\\", letter.to_ascii_uppercase()));
        }
    }
    PathBuf::from(address)
}

/// Both paths exist and resolve to the same file
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn deploy_mass_storage(artifact: &FirmwareArtifact, address: &str) -> Result<DeployOutcome, BoardError> {
    let root = mass_storage_root(address);
    if !root.is_dir() {
        warn!("Mass-storage volume {} is not mounted", root.display());
        return Ok(DeployOutcome::failed(format!(
            "volume {} not found; put the board in bootloader mode and pass its mount point",
            root.display()
        )));
    }

    let file_name = artifact
        .path
        .file_name()
        .ok_or_else(|| BoardError::InvalidAddress(artifact.path.display().to_string()))?;
    let target = root.join(file_name);

    if is_same_file(&artifact.path, &target) {
        info!("{} is already on {}", artifact.path.display(), root.display());
        return Ok(DeployOutcome::succeeded());
    }

    std::fs::copy(&artifact.path, &target)?;
    info!("Copied {} to {}", artifact.path.display(), target.display());
    Ok(DeployOutcome::succeeded())
}

/// Substitute `{firmware}` and `{address}` in a flash command template
pub fn render_flash_command(template: &[String], firmware: &Path, address: &str) -> Vec<String> {
    let firmware = firmware.display().to_string();
    template
        .iter()
        .map(|arg| arg.replace("{firmware}", &firmware).replace("{address}", address))
        .collect()
}

/// Read a child pipe to the end on its own thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn deploy_serial_flash(
    template: &[String],
    artifact: &FirmwareArtifact,
    address: &str,
    timeout: Duration,
) -> Result<DeployOutcome, BoardError> {
    let argv = render_flash_command(template, &artifact.path, address);
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| BoardError::FlashTool("empty flash command".to_string()))?;

    debug!("Running flash tool: {}", argv.join(" "));
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BoardError::FlashTool(format!("failed to run {}: {}", program, e)))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!("{} did not finish within {:?}, killing it", program, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Ok(DeployOutcome::failed(format!(
                "{} did not finish within {:?} and was terminated",
                program, timeout
            )));
        }
        std::thread::sleep(FLASH_POLL_INTERVAL);
    };

    let stdout = stdout.join().unwrap_or_default();
    if !stdout.trim().is_empty() {
        debug!("{} output:\n{}", program, stdout.trim());
    }

    if status.success() {
        info!("Flashed {} via {}", artifact.path.display(), address);
        return Ok(DeployOutcome::succeeded());
    }

    let stderr = stderr.join().unwrap_or_default().trim().to_string();
    let diagnostic = if stderr.is_empty() {
        format!("{} exited with {}", program, status)
    } else {
        stderr
    };
    Ok(DeployOutcome::failed(diagnostic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact_in(dir: &Path) -> FirmwareArtifact {
        let path = dir.join("blink.uf2");
        std::fs::write(&path, b"image").unwrap();
        FirmwareArtifact {
            path,
            format: "uf2".to_string(),
        }
    }

    #[test]
    fn test_copy_object_image_is_sibling() {
        let tmp = TempDir::new().unwrap();
        let object = tmp.path().join("blink.o");
        std::fs::write(&object, b"\x7fELF").unwrap();

        let artifact = copy_object_image(&object, "bin").unwrap();
        assert_eq!(artifact.path, tmp.path().join("blink.bin"));
        assert_eq!(artifact.format, "bin");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_copy_object_image_refuses_to_overwrite_object() {
        let tmp = TempDir::new().unwrap();
        let object = tmp.path().join("blink.o");
        std::fs::write(&object, b"\x7fELF").unwrap();

        let err = copy_object_image(&object, "o").unwrap_err();
        assert!(matches!(err, BoardError::ImageOverwritesObject(_)));
        assert_eq!(std::fs::read(&object).unwrap(), b"\x7fELF");
    }

    #[test]
    fn test_copy_object_image_missing_object() {
        let tmp = TempDir::new().unwrap();
        let err = copy_object_image(&tmp.path().join("nope.o"), "bin").unwrap_err();
        assert!(matches!(err, BoardError::ObjectMissing(_)));
    }

    #[cfg(windows)]
    #[test]
    fn test_mass_storage_root_drive_letters() {
        assert_eq!(mass_storage_root("E:"), PathBuf::from("E:\\"));
        assert_eq!(mass_storage_root("e"), PathBuf::from("E:\\"));
        assert_eq!(mass_storage_root(r"D:\RPI-RP2"), PathBuf::from(r"D:\RPI-RP2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_mass_storage_root_is_literal_on_unix() {
        assert_eq!(mass_storage_root("e"), PathBuf::from("e"));
        assert_eq!(mass_storage_root("E:"), PathBuf::from("E:"));
        assert_eq!(mass_storage_root("/media/RPI-RP2"), PathBuf::from("/media/RPI-RP2"));
    }

    #[test]
    fn test_mass_storage_copies_into_volume() {
        let tmp = TempDir::new().unwrap();
        let volume = tmp.path().join("RPI-RP2");
        std::fs::create_dir(&volume).unwrap();
        let artifact = artifact_in(tmp.path());

        let outcome = DeployStrategy::MassStorage
            .deploy(&artifact, volume.to_str().unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(std::fs::read(volume.join("blink.uf2")).unwrap(), b"image");
    }

    #[test]
    fn test_mass_storage_into_own_directory_keeps_image() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());

        let outcome = DeployStrategy::MassStorage
            .deploy(&artifact, tmp.path().to_str().unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"image");
    }

    #[test]
    fn test_mass_storage_missing_volume_is_unsuccessful() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let outcome = DeployStrategy::MassStorage
            .deploy(&artifact, tmp.path().join("not-mounted").to_str().unwrap())
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.diagnostic.unwrap().contains("not found"));
    }

    #[test]
    fn test_empty_address_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let err = DeployStrategy::MassStorage.deploy(&artifact, "  ").unwrap_err();
        assert!(matches!(err, BoardError::InvalidAddress(_)));
    }

    #[test]
    fn test_serial_flash_without_command() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let outcome = DeployStrategy::SerialFlash { command: None, timeout: FLASH_TIMEOUT }
            .deploy(&artifact, "/dev/ttyUSB0")
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.diagnostic.unwrap().contains("flash_command"));
    }

    #[test]
    fn test_render_flash_command() {
        let template: Vec<String> = ["esptool.py", "--port", "{address}", "write_flash", "0x10000", "{firmware}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let argv = render_flash_command(&template, Path::new("/tmp/blink.bin"), "/dev/ttyUSB0");
        assert_eq!(
            argv,
            vec!["esptool.py", "--port", "/dev/ttyUSB0", "write_flash", "0x10000", "/tmp/blink.bin"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_serial_flash_runs_command() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let port = tmp.path().join("ttyFAKE");

        let template = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cp \"$0\" \"$1\"".to_string(),
            "{firmware}".to_string(),
            "{address}".to_string(),
        ];
        let outcome = DeployStrategy::SerialFlash { command: Some(template), timeout: FLASH_TIMEOUT }
            .deploy(&artifact, port.to_str().unwrap())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(std::fs::read(&port).unwrap(), b"image");
    }

    #[cfg(unix)]
    #[test]
    fn test_serial_flash_failure_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let template = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'Failed to connect to ESP32' >&2; exit 2".to_string(),
        ];
        let outcome = DeployStrategy::SerialFlash { command: Some(template), timeout: FLASH_TIMEOUT }
            .deploy(&artifact, "/dev/ttyUSB0")
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.diagnostic.as_deref(), Some("Failed to connect to ESP32"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_flash_tool_is_killed() {
        let tmp = TempDir::new().unwrap();
        let artifact = artifact_in(tmp.path());
        let template = vec!["sleep".to_string(), "30".to_string()];

        let started = Instant::now();
        let outcome = DeployStrategy::SerialFlash {
            command: Some(template),
            timeout: Duration::from_millis(200),
        }
        .deploy(&artifact, "/dev/ttyUSB0")
        .unwrap();

        assert!(!outcome.success);
        assert!(outcome.diagnostic.unwrap().contains("did not finish within 200ms"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

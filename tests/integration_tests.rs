//! Integration tests for micropp
//!
//! Drives the pipeline end to end against a temporary micropp home with the
//! built-in board definitions and a shell-script stand-in for the compiler.

use micropp::boards::builtin;
use micropp::{
    BoardRegistry, Config, ErrorKind, HostOs, MicroError, MicroToolHandler, Pipeline,
    PipelineRequest, PipelineState, ToolchainConfig,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn home() -> (TempDir, Config, BoardRegistry) {
    let tmp = TempDir::new().unwrap();
    let config = Config::new(tmp.path(), HostOs::Linux);
    let registry = BoardRegistry::from_config(&config);
    registry.install_builtin().unwrap();
    (tmp, config, registry)
}

/// Stub compiler: creates whatever follows `-o` and exits 0
#[cfg(unix)]
fn stub_compiler(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("arm-none-eabi-gcc");
    std::fs::write(
        &path,
        "#!/bin/sh\nwhile [ $# -gt 0 ]; do if [ \"$1\" = \"-o\" ]; then : > \"$2\"; fi; shift; done\nexit 0\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn request(source: PathBuf, address: &str, compile_only: bool) -> PipelineRequest {
    PipelineRequest {
        source,
        board: "RP2040".to_string(),
        address: address.to_string(),
        verbose: true,
        compile_only,
    }
}

#[test]
fn test_handler_creation() {
    let tmp = TempDir::new().unwrap();
    let _handler = MicroToolHandler::new(Config::new(tmp.path(), HostOs::Linux));
}

#[test]
fn test_init_writes_builtin_boards() {
    let (tmp, _config, registry) = home();
    assert!(tmp.path().join("boards/RP2040.yml").exists());
    assert!(tmp.path().join("boards/ESP32.yml").exists());

    let ids: Vec<String> = registry.list_boards().unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, vec!["ESP32", "RP2040"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rp2040_compile_only() {
    let (tmp, config, registry) = home();
    let mut table = ToolchainConfig::default();
    table.set_toolchain("arm-gcc", HostOs::Linux, stub_compiler(tmp.path()));

    let source = tmp.path().join("blink.cpp");
    std::fs::write(&source, "int main() { return 0; }").unwrap();

    let report = Pipeline::new(&config, &registry, &table)
        .run(&request(source.clone(), "E:", true))
        .await;

    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.state, PipelineState::Compiling);
    assert_eq!(report.artifact, Some(tmp.path().join("blink.o")));
    assert!(tmp.path().join("blink.o").exists());
    assert!(!tmp.path().join("blink.uf2").exists());
    assert!(!report.history.contains(&PipelineState::GeneratingFirmware));
}

#[tokio::test]
async fn test_missing_toolchain_binding_is_configuration_error() {
    let (tmp, config, registry) = home();
    let mut table = ToolchainConfig::default();
    table.set_toolchain("arm-gcc", HostOs::Windows, r"C:\arm\bin\arm-none-eabi-gcc.exe");

    let source = tmp.path().join("blink.cpp");
    std::fs::write(&source, "int main() {}").unwrap();

    let report = Pipeline::new(&config, &registry, &table)
        .run(&request(source, "E:", true))
        .await;

    assert!(!report.is_success());
    assert_eq!(report.aborted_in, Some(PipelineState::Resolving));
    let err = report.error.as_ref().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, MicroError::ToolchainNotConfigured { toolchain, os } if toolchain == "arm-gcc" && os == "linux"));
    assert!(!tmp.path().join("blink.o").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_source_is_not_found() {
    let (tmp, config, registry) = home();
    let mut table = ToolchainConfig::default();
    table.set_toolchain("arm-gcc", HostOs::Linux, stub_compiler(tmp.path()));

    let report = Pipeline::new(&config, &registry, &table)
        .run(&request(tmp.path().join("blink.cpp"), "E:", false))
        .await;

    assert_eq!(report.aborted_in, Some(PipelineState::Compiling));
    assert_eq!(report.error.as_ref().unwrap().kind(), ErrorKind::NotFound);
    assert!(!tmp.path().join("blink.o").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_rp2040_deploys_to_mass_storage_volume() {
    let (tmp, config, registry) = home();
    let volume = TempDir::new().unwrap();
    let mut table = ToolchainConfig::default();
    table.set_toolchain("arm-gcc", HostOs::Linux, stub_compiler(tmp.path()));

    let source = tmp.path().join("blink.cpp");
    std::fs::write(&source, "int main() {}").unwrap();

    let address = volume.path().to_string_lossy().to_string();
    let report = Pipeline::new(&config, &registry, &table)
        .run(&request(source, &address, false))
        .await;

    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.state, PipelineState::Done);
    assert!(volume.path().join("blink.uf2").exists());
    assert!(report.summary().starts_with("Successfully deployed"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unmounted_volume_fails_deploy() {
    let (tmp, config, registry) = home();
    let mut table = ToolchainConfig::default();
    table.set_toolchain("arm-gcc", HostOs::Linux, stub_compiler(tmp.path()));

    let source = tmp.path().join("blink.cpp");
    std::fs::write(&source, "int main() {}").unwrap();

    let missing = tmp.path().join("RPI-RP2");
    let report = Pipeline::new(&config, &registry, &table)
        .run(&request(source, &missing.to_string_lossy(), false))
        .await;

    assert_eq!(report.aborted_in, Some(PipelineState::Deploying));
    assert_eq!(report.error.as_ref().unwrap().kind(), ErrorKind::Deploy);
    // image was generated before the deploy attempt
    assert!(tmp.path().join("blink.uf2").exists());
}

#[test]
fn test_add_board_with_missing_keys_writes_nothing() {
    let (tmp, _config, registry) = home();
    let spec = tmp.path().join("nano.json");
    std::fs::write(&spec, r#"{"name": "Nano", "toolchain": "avr-gcc", "compile_flags": []}"#).unwrap();

    let err = registry.add_board(&spec).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("firmware_format"));
    assert!(msg.contains("libraries"));
    assert!(!tmp.path().join("boards/Nano.yml").exists());
    assert_eq!(registry.list_boards().unwrap().len(), 2);
}

#[test]
fn test_add_board_then_load() {
    let (tmp, _config, registry) = home();
    let spec = tmp.path().join("nano.json");
    std::fs::write(
        &spec,
        r#"{
            "name": "Nano",
            "toolchain": "avr-gcc",
            "firmware_format": "hex",
            "compile_flags": ["-mmcu=atmega328p", "-Os"],
            "libraries": ["avr/io.h", "util/delay.h"]
        }"#,
    )
    .unwrap();

    registry.add_board(&spec).unwrap();
    let board = registry.load_board("Nano").unwrap();
    assert_eq!(board.descriptor().compile_flags, vec!["-mmcu=atmega328p", "-Os"]);
    assert_eq!(board.descriptor().firmware_format, "hex");
}

#[test]
fn test_builtin_descriptor_round_trips_through_store() {
    let (_tmp, _config, registry) = home();
    assert_eq!(registry.load_descriptor("RP2040").unwrap(), builtin::rp2040());
    assert_eq!(registry.load_descriptor("ESP32").unwrap(), builtin::esp32());
}

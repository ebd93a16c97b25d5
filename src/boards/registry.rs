//! Board registry: the on-disk descriptor store plus statically registered plugins
//!
//! Descriptors live as `<boards_dir>/<name>.yml`. Validation happens when a board is
//! registered, so loading only has to deal with files that were edited by hand.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builtin;
use super::descriptor::{validate_board_name, BoardDescriptor, BoardSummary};
use super::plugin::{BoardPlugin, DescriptorBoard};
use crate::config::Config;
use crate::error::{MicroError, Result};

const DESCRIPTOR_EXTENSION: &str = "yml";

pub struct BoardRegistry {
    boards_dir: PathBuf,
    plugins: BTreeMap<String, Arc<dyn BoardPlugin>>,
}

impl BoardRegistry {
    pub fn new(boards_dir: impl Into<PathBuf>) -> Self {
        Self {
            boards_dir: boards_dir.into(),
            plugins: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.boards_dir())
    }

    pub fn boards_dir(&self) -> &Path {
        &self.boards_dir
    }

    /// Register a board implemented in code. It shadows a stored descriptor of the same name.
    pub fn register_plugin(&mut self, plugin: Arc<dyn BoardPlugin>) {
        let name = plugin.descriptor().name.clone();
        debug!("Registered board plugin '{}'", name);
        self.plugins.insert(name, plugin);
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.boards_dir.join(format!("{}.{}", name, DESCRIPTOR_EXTENSION))
    }

    /// Enumerate every known board, sorted by id. Unreadable descriptors are still
    /// listed under their file name.
    pub fn list_boards(&self) -> Result<Vec<BoardSummary>> {
        let mut summaries: BTreeMap<String, BoardSummary> = BTreeMap::new();

        for (name, plugin) in &self.plugins {
            summaries.insert(name.clone(), BoardSummary::from_descriptor(name, plugin.descriptor()));
        }

        for (id, path) in self.stored_descriptor_files()? {
            if summaries.contains_key(&id) {
                continue;
            }
            let summary = match read_descriptor(&path) {
                Ok(descriptor) => BoardSummary::from_descriptor(&id, &descriptor),
                Err(e) => {
                    warn!("Skipping details for {}: {}", path.display(), e);
                    BoardSummary::unreadable(&id, e.to_string())
                }
            };
            summaries.insert(id, summary);
        }

        Ok(summaries.into_values().collect())
    }

    fn stored_descriptor_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        if !self.boards_dir.is_dir() {
            return Ok(files);
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.boards_dir.to_string_lossy()),
            DESCRIPTOR_EXTENSION
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| MicroError::InternalError(format!("Invalid glob pattern: {}", e)))?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Unreadable board store entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((id.to_string(), path.clone()));
            }
        }

        files.sort();
        Ok(files)
    }

    /// Read a stored descriptor without wrapping it in a plugin
    pub fn load_descriptor(&self, name: &str) -> Result<BoardDescriptor> {
        if validate_board_name(name).is_err() {
            return Err(MicroError::BoardNotFound(name.to_string()));
        }

        let path = self.descriptor_path(name);
        if !path.is_file() {
            return Err(MicroError::BoardNotFound(name.to_string()));
        }

        let descriptor = read_descriptor(&path).map_err(|e| MicroError::BoardLoad {
            board: name.to_string(),
            cause: e.to_string(),
        })?;

        if descriptor.name != name {
            return Err(MicroError::BoardLoad {
                board: name.to_string(),
                cause: format!("descriptor declares name '{}'", descriptor.name),
            });
        }

        Ok(descriptor)
    }

    /// Load a board by name, registered plugins first
    pub fn load_board(&self, name: &str) -> Result<Arc<dyn BoardPlugin>> {
        if let Some(plugin) = self.plugins.get(name) {
            return Ok(plugin.clone());
        }

        let descriptor = self.load_descriptor(name)?;
        debug!("Loaded board '{}' ({} toolchain)", descriptor.name, descriptor.toolchain);
        Ok(Arc::new(DescriptorBoard::new(descriptor)))
    }

    /// Validate and store a descriptor, replacing any existing one of the same name
    pub fn register_descriptor(&self, descriptor: &BoardDescriptor) -> Result<PathBuf> {
        descriptor.validate()?;
        let yaml = serde_yaml::to_string(descriptor)?;

        std::fs::create_dir_all(&self.boards_dir)?;
        let path = self.descriptor_path(&descriptor.name);
        if path.exists() {
            info!("Replacing existing board '{}'", descriptor.name);
        }
        std::fs::write(&path, yaml)?;
        Ok(path)
    }

    /// Register a board from a JSON/YAML specification file. Nothing is written
    /// unless the specification carries every required field.
    pub fn add_board(&self, spec_file: &Path) -> Result<BoardDescriptor> {
        let descriptor = BoardDescriptor::from_spec_file(spec_file)?;
        self.register_descriptor(&descriptor)?;
        info!("Added new board: {}", descriptor.name);
        Ok(descriptor)
    }

    /// Write the built-in boards that are not already in the store
    pub fn install_builtin(&self) -> Result<Vec<String>> {
        let mut installed = Vec::new();
        for descriptor in builtin::builtin_boards() {
            if self.descriptor_path(&descriptor.name).exists() {
                info!("{} board definition already exists", descriptor.name);
                continue;
            }
            self.register_descriptor(&descriptor)?;
            info!("{} board definition created", descriptor.name);
            installed.push(descriptor.name);
        }
        Ok(installed)
    }
}

fn read_descriptor(path: &Path) -> Result<BoardDescriptor> {
    let content = std::fs::read_to_string(path)?;
    let descriptor: BoardDescriptor = serde_yaml::from_str(&content)?;
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::plugin::{DeployOutcome, FirmwareArtifact};
    use crate::error::BoardError;
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = r#"{
        "name": "TestBoard",
        "toolchain": "arm-gcc",
        "firmware_format": "bin",
        "compile_flags": ["-O2"],
        "libraries": ["hal/gpio.h"]
    }"#;

    struct FakeBoard(BoardDescriptor);

    impl BoardPlugin for FakeBoard {
        fn descriptor(&self) -> &BoardDescriptor {
            &self.0
        }
        fn generate_firmware(&self, _object_path: &Path) -> std::result::Result<FirmwareArtifact, BoardError> {
            unimplemented!()
        }
        fn deploy_firmware(&self, _a: &FirmwareArtifact, _addr: &str) -> std::result::Result<DeployOutcome, BoardError> {
            unimplemented!()
        }
    }

    #[test]
    fn test_list_missing_store_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = BoardRegistry::new(tmp.path().join("boards"));
        assert!(registry.list_boards().unwrap().is_empty());
    }

    #[test]
    fn test_add_then_load() {
        let tmp = TempDir::new().unwrap();
        let spec = tmp.path().join("board.json");
        fs::write(&spec, SPEC).unwrap();

        let registry = BoardRegistry::new(tmp.path().join("boards"));
        registry.add_board(&spec).unwrap();

        let board = registry.load_board("TestBoard").unwrap();
        assert_eq!(board.descriptor().toolchain, "arm-gcc");
        assert!(tmp.path().join("boards/TestBoard.yml").exists());
    }

    #[test]
    fn test_add_missing_keys_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let spec = tmp.path().join("board.json");
        fs::write(&spec, r#"{"name": "Half", "toolchain": "arm-gcc"}"#).unwrap();

        let registry = BoardRegistry::new(tmp.path().join("boards"));
        let err = registry.add_board(&spec).unwrap_err();
        assert!(matches!(err, MicroError::InvalidBoard(_)));
        assert!(!tmp.path().join("boards/Half.yml").exists());
    }

    #[test]
    fn test_load_unknown_board() {
        let tmp = TempDir::new().unwrap();
        let registry = BoardRegistry::new(tmp.path());
        assert!(matches!(registry.load_board("Nope"), Err(MicroError::BoardNotFound(_))));
        assert!(matches!(registry.load_board("../etc"), Err(MicroError::BoardNotFound(_))));
    }

    #[test]
    fn test_load_malformed_descriptor() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Broken.yml"), "name: Broken\ntoolchain: [unclosed\n").unwrap();
        let registry = BoardRegistry::new(tmp.path());
        let err = registry.load_board("Broken").err().unwrap();
        assert!(matches!(err, MicroError::BoardLoad { ref board, .. } if board == "Broken"));
    }

    #[test]
    fn test_load_name_mismatch() {
        let tmp = TempDir::new().unwrap();
        let registry = BoardRegistry::new(tmp.path());
        registry.register_descriptor(&builtin::esp32()).unwrap();
        fs::rename(tmp.path().join("ESP32.yml"), tmp.path().join("Renamed.yml")).unwrap();
        assert!(matches!(registry.load_board("Renamed"), Err(MicroError::BoardLoad { .. })));
    }

    #[test]
    fn test_list_degrades_on_unreadable_entry() {
        let tmp = TempDir::new().unwrap();
        let registry = BoardRegistry::new(tmp.path());
        registry.install_builtin().unwrap();
        fs::write(tmp.path().join("Broken.yml"), ":::: not yaml").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let boards = registry.list_boards().unwrap();
        let ids: Vec<&str> = boards.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["Broken", "ESP32", "RP2040"]);
        assert!(boards[0].display_name.is_none());
        assert!(boards[0].error.is_some());
        assert_eq!(boards[2].display_name.as_deref(), Some("RP2040 (Raspberry Pi Pico)"));

        // stable across calls
        assert_eq!(registry.list_boards().unwrap(), boards);
    }

    #[test]
    fn test_install_builtin_does_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let registry = BoardRegistry::new(tmp.path());
        assert_eq!(registry.install_builtin().unwrap(), vec!["RP2040", "ESP32"]);

        let mut custom = builtin::rp2040();
        custom.compile_flags = vec!["-O0".to_string()];
        registry.register_descriptor(&custom).unwrap();

        assert!(registry.install_builtin().unwrap().is_empty());
        assert_eq!(registry.load_descriptor("RP2040").unwrap().compile_flags, vec!["-O0"]);
    }

    #[test]
    fn test_registered_plugin_shadows_store() {
        let tmp = TempDir::new().unwrap();
        let mut registry = BoardRegistry::new(tmp.path());
        registry.install_builtin().unwrap();

        let mut descriptor = builtin::rp2040();
        descriptor.description = Some("In-code RP2040".to_string());
        registry.register_plugin(Arc::new(FakeBoard(descriptor)));

        let board = registry.load_board("RP2040").unwrap();
        assert_eq!(board.descriptor().display_name(), "In-code RP2040");
        let listed = registry.list_boards().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|b| b.display_name.as_deref() == Some("In-code RP2040")));
    }
}

//! Configuration for micropp
//!
//! Two layers: the command line (`Args`) turned into a runtime [`Config`] once per
//! process, and the toolchain/SDK binding table ([`ToolchainConfig`]) persisted as
//! `config.json` in the micropp home directory.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{MicroError, Result};
use crate::host::HostOs;

/// Default upper bound on a single compiler run
pub const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 300;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "micropp")]
#[command(about = "Compile and deploy C++ to microcontrollers (Windows/Linux only)")]
#[command(version)]
pub struct Args {
    /// micropp home directory holding config.json and boards/ (defaults to the current directory)
    #[arg(long, env = "MICROPP_HOME", global = true)]
    pub home: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available boards
    ListBoards,
    /// Add a new board from a JSON (or YAML) specification file
    AddBoard {
        /// File containing the board specification
        json_file: PathBuf,
    },
    /// Configure toolchains and SDKs
    Config(ConfigArgs),
    /// Compile and deploy code
    Compile(CompileArgs),
    /// Write the default configuration and built-in board definitions
    Init,
    /// Serve the micropp tools over MCP on stdio
    Serve,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Configure a specific toolchain (e.g. arm-gcc, xtensa-gcc)
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Configure a specific SDK (e.g. pico-sdk)
    #[arg(long)]
    pub sdk: Option<String>,

    /// Path to the toolchain or SDK
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CompileArgs {
    /// Source file to compile
    #[arg(long)]
    pub source: PathBuf,

    /// Target board
    #[arg(short, long)]
    pub board: String,

    /// Address (e.g. COM6, /dev/ttyUSB0, E:)
    #[arg(short, long)]
    pub address: String,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Compile only, do not deploy
    #[arg(long)]
    pub compile_only: bool,

    /// Compiler timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub host_os: HostOs,
    pub compile_timeout: Duration,
}

impl Config {
    pub fn new(home: impl Into<PathBuf>, host_os: HostOs) -> Self {
        Self {
            home: home.into(),
            host_os,
            compile_timeout: Duration::from_secs(DEFAULT_COMPILE_TIMEOUT_SECS),
        }
    }

    /// Build the runtime config. Fails on an unsupported host OS.
    pub fn from_args(args: &Args) -> Result<Self> {
        let home = args
            .home
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let mut config = Self::new(home, HostOs::detect()?);
        if let Command::Compile(compile) = &args.command {
            if let Some(secs) = compile.timeout {
                config.compile_timeout = Duration::from_secs(secs);
            }
        }
        Ok(config)
    }

    /// Directory holding board descriptors
    pub fn boards_dir(&self) -> PathBuf {
        self.home.join("boards")
    }

    /// Path to the toolchain/SDK binding table
    pub fn config_file(&self) -> PathBuf {
        self.home.join("config.json")
    }
}

/// Per-OS paths for one toolchain or SDK id, keyed by `linux` / `windows`
pub type OsPaths = BTreeMap<String, PathBuf>;

/// Toolchain and SDK binding table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub toolchains: BTreeMap<String, OsPaths>,
    #[serde(default)]
    pub sdks: BTreeMap<String, OsPaths>,
}

impl ToolchainConfig {
    /// Bindings written on first run
    pub fn default_bindings() -> Self {
        let mut toolchains = BTreeMap::new();
        toolchains.insert(
            "arm-gcc".to_string(),
            OsPaths::from([
                ("linux".to_string(), PathBuf::from("/usr/bin/arm-none-eabi-gcc")),
                (
                    "windows".to_string(),
                    PathBuf::from(r"C:\Program Files (x86)\GNU Arm Embedded Toolchain\bin\arm-none-eabi-gcc.exe"),
                ),
            ]),
        );
        toolchains.insert(
            "xtensa-gcc".to_string(),
            OsPaths::from([
                ("linux".to_string(), PathBuf::from("/opt/xtensa-esp32-elf/bin/xtensa-esp32-elf-gcc")),
                (
                    "windows".to_string(),
                    PathBuf::from(r"C:\esp\tools\xtensa-esp32-elf\bin\xtensa-esp32-elf-gcc.exe"),
                ),
            ]),
        );

        Self {
            toolchains,
            sdks: BTreeMap::new(),
        }
    }

    /// Read the table. A missing file yields the default bindings; malformed JSON
    /// is reported and replaced by an empty table, leaving the file untouched.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default_bindings());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!("Invalid JSON in config file {}: {}", path.display(), e);
                warn!("Continuing with an empty configuration");
                Ok(Self::default())
            }
        }
    }

    /// Like [`ToolchainConfig::load`], but writes the default bindings when the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        info!("Creating default configuration at {}", path.display());
        let table = Self::default_bindings();
        table.save(path)?;
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn toolchain_path(&self, toolchain: &str, os: HostOs) -> Option<&PathBuf> {
        self.toolchains.get(toolchain).and_then(|paths| paths.get(os.as_str()))
    }

    pub fn sdk_path(&self, sdk: &str, os: HostOs) -> Option<&PathBuf> {
        self.sdks.get(sdk).and_then(|paths| paths.get(os.as_str()))
    }

    pub fn set_toolchain(&mut self, toolchain: &str, os: HostOs, path: impl Into<PathBuf>) {
        self.toolchains
            .entry(toolchain.to_string())
            .or_default()
            .insert(os.as_str().to_string(), path.into());
    }

    pub fn set_sdk(&mut self, sdk: &str, os: HostOs, path: impl Into<PathBuf>) {
        self.sdks
            .entry(sdk.to_string())
            .or_default()
            .insert(os.as_str().to_string(), path.into());
    }
}

/// Set a toolchain path for the host OS and persist the table
pub fn configure_toolchain(config: &Config, toolchain: &str, path: &Path) -> Result<ToolchainConfig> {
    if toolchain.trim().is_empty() {
        return Err(MicroError::InvalidConfig("toolchain id must not be empty".to_string()));
    }
    let file = config.config_file();
    let mut table = ToolchainConfig::load(&file)?;
    table.set_toolchain(toolchain, config.host_os, path);
    table.save(&file)?;

    info!("Configured {} for {}: {}", toolchain, config.host_os, path.display());
    Ok(table)
}

/// Set an SDK root for the host OS and persist the table
pub fn configure_sdk(config: &Config, sdk: &str, path: &Path) -> Result<ToolchainConfig> {
    if sdk.trim().is_empty() {
        return Err(MicroError::InvalidConfig("sdk id must not be empty".to_string()));
    }
    let file = config.config_file();
    let mut table = ToolchainConfig::load(&file)?;
    table.set_sdk(sdk, config.host_os, path);
    table.save(&file)?;

    info!("Configured {} for {}: {}", sdk, config.host_os, path.display());
    Ok(table)
}

//! Host operating system detection

use serde::{Deserialize, Serialize};

use crate::error::{MicroError, Result};

/// The two host platforms micropp runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Linux,
    Windows,
}

impl HostOs {
    /// Detect the running platform. Anything other than Linux or Windows is rejected.
    pub fn detect() -> Result<Self> {
        Self::from_platform(std::env::consts::OS)
    }

    /// Map a platform identifier (as in `std::env::consts::OS`) to a host OS
    pub fn from_platform(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(HostOs::Linux),
            "windows" => Ok(HostOs::Windows),
            other => Err(MicroError::UnsupportedHost(other.to_string())),
        }
    }

    /// Key used in the binding table
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::Windows => "windows",
        }
    }
}

impl std::fmt::Display for HostOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

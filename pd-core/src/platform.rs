//! Platform detection and OS-specific utilities.

use std::path::PathBuf;
use crate::error::{PdError, PdResult};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Detect the current platform at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Get the platform-specific application data directory.
    ///
    /// - Windows: `%APPDATA%/Playdeck`
    /// - macOS: `~/Library/Application Support/Playdeck`
    /// - Linux: `~/.local/share/Playdeck`
    pub fn data_dir() -> PdResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| PdError::Config("could not determine data directory".into()))?;
        Ok(base.join("Playdeck"))
    }

    /// Get the platform-specific configuration directory.
    pub fn config_dir() -> PdResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| PdError::Config("could not determine config directory".into()))?;
        Ok(base.join("Playdeck"))
    }

    /// Get a human-readable platform name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }

    /// Get the system hostname, used as the default participant name.
    pub fn hostname() -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "playdeck-client".to_string())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

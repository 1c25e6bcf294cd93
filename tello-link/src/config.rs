//! Command-line client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tello_core::TelloConfig;

/// Top-level configuration file: the client settings plus logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tello: TelloConfig,
    pub logging: LoggingConfig,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs here instead of stderr when non-empty.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl AppConfig {
    /// Load from a TOML file. A missing file gives the defaults; a file
    /// that does not parse is an error, so the caller can report it
    /// once logging is up.
    pub fn load(path: &Path) -> Result<Self, toml::de::Error> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Write the default config to `path`.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(text.contains("drone_address"));
        assert!(text.contains("handshake_port"));
        assert!(text.contains("level"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [tello.video]
            exposure = -3

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.tello.video.exposure, -3);
        assert_eq!(parsed.tello.video.port, 6038);
        assert_eq!(parsed.tello.network.command_port, 8889);
        assert_eq!(parsed.logging.level, "debug");
        assert!(parsed.logging.file.is_empty());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/tello-link.toml")).unwrap();
        assert_eq!(cfg.tello, TelloConfig::default());
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn invalid_file_is_reported() {
        let path = std::env::temp_dir().join(format!("tello-link-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[tello.network]\ncommand_port = \"eight\"\n").unwrap();
        let result = AppConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn write_default_then_load() {
        let path = std::env::temp_dir().join(format!("tello-link-{}.toml", std::process::id()));
        AppConfig::write_default(&path).unwrap();
        let cfg = AppConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.unwrap().tello, TelloConfig::default());
    }
}

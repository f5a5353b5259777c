//! Probe configuration.
//!
//! Configuration can be loaded from:
//! - A path given as the first command line argument
//! - A TOML file in one of the default locations
//! - Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tether_protocol::BinaryType;
use tether_transport::{ConnectionContext, TransportOptions};

/// Probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Options for the transport under test.
    #[serde(default)]
    pub transport: TransportOptions,

    /// Messages to send once the transport is open.
    #[serde(default = "default_messages")]
    pub messages: Vec<String>,

    /// Send messages as binary payloads.
    #[serde(default)]
    pub binary: bool,

    /// Whether the loopback peer accepts binary frames.
    #[serde(default = "default_true")]
    pub supports_binary: bool,

    /// How received binary payloads are represented.
    #[serde(default)]
    pub binary_type: BinaryType,

    /// How long to wait for each transport signal, in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

// Default value functions
fn default_messages() -> Vec<String> {
    vec!["hello".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    1_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            messages: default_messages(),
            binary: false,
            supports_binary: true,
            binary_type: BinaryType::default(),
            timeout_ms: default_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the given path, a default path, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            let expanded = shellexpand::tilde(path);
            return Self::from_file(expanded.as_ref());
        }

        let config_paths = [
            "tether-probe.toml",
            "/etc/tether/probe.toml",
            "~/.config/tether/probe.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse config")?;
        config
            .transport
            .validate()
            .context("Invalid transport options")?;
        Ok(config)
    }

    /// Transport options wired to a fresh connection context.
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        self.transport
            .clone()
            .with_context(ConnectionContext::new(self.binary_type))
    }

    /// Per-signal timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

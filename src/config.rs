//! CLI surface and on-disk configuration.
//!
//! Mirrors the teacher's `Config`: a `Serialize`/`Deserialize` struct
//! with a `Default` impl, persisted as JSON under the user's config
//! directory, with CLI flags overriding whatever the file holds.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::publish::Qos;

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("linebridge")
        .join("config.json")
}

/// Quirk toggles matched against brand/model strings (SIMCOM detection,
/// etc.) or selected explicitly on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quirks {
    /// SIMCOM modules require `AT+COPS=2` before a detached `AT+COPS=?` scan.
    pub simcom: bool,
    /// Detach before scanning operators even on non-SIMCOM hardware.
    pub detached_scan: bool,
    /// Never send a PSK in the clear; always derive the PBKDF2 hex form.
    pub no_plain_psk: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            simcom: false,
            detached_scan: false,
            no_plain_psk: false,
        }
    }
}

/// Persisted configuration, loaded before CLI flags are applied on top.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub topic_prefix: String,
    pub quirks: Quirks,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            topic_prefix: "modem".to_string(),
            quirks: Quirks::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from the config file if present, falling back to defaults
    /// (and writing them out) otherwise.
    pub fn load_or_default() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let cfg: BridgeConfig = serde_json::from_str(&text)
                .map_err(|e| crate::error::BridgeError::Fatal(format!("invalid config: {e}")))?;
            Ok(cfg)
        } else {
            let cfg = BridgeConfig::default();
            cfg.save()?;
            Ok(cfg)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::BridgeError::Fatal(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// QoS to use against the configured broker: 0 for localhost, 1
    /// otherwise (configurable override via `--qos`).
    pub fn default_qos(&self) -> Qos {
        if self.broker_host == "localhost" || self.broker_host == "127.0.0.1" {
            Qos::AtMostOnce
        } else {
            Qos::AtLeastOnce
        }
    }
}

/// Shared CLI flags both binaries parse, following the teacher's
/// subcommand-plus-flags shape.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge.
    Run {
        /// Serial device path (AT bridge) or interface name (wpa bridge).
        #[arg(long)]
        device: String,

        /// MQTT broker hostname.
        #[arg(long)]
        broker_host: Option<String>,

        /// MQTT broker port.
        #[arg(long)]
        broker_port: Option<u16>,

        /// Topic prefix (AT bridge) or interface name override (wpa bridge).
        #[arg(long)]
        topic_prefix: Option<String>,

        /// SIMCOM vendor quirk.
        #[arg(long)]
        simcom: bool,

        /// Detach before an operator scan.
        #[arg(long)]
        detached_scan: bool,

        /// Never transmit a PSK in the clear.
        #[arg(long)]
        no_plain_psk: bool,

        /// Increase log verbosity.
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },
    /// Print the effective configuration and exit.
    Config,
}

impl Commands {
    /// Merge CLI flags over the persisted defaults.
    pub fn apply_over(&self, mut base: BridgeConfig) -> BridgeConfig {
        if let Commands::Run {
            broker_host,
            broker_port,
            topic_prefix,
            simcom,
            detached_scan,
            no_plain_psk,
            ..
        } = self
        {
            if let Some(host) = broker_host {
                base.broker_host = host.clone();
            }
            if let Some(port) = broker_port {
                base.broker_port = *port;
            }
            if let Some(prefix) = topic_prefix {
                base.topic_prefix = prefix.clone();
            }
            base.quirks.simcom |= simcom;
            base.quirks.detached_scan |= detached_scan;
            base.quirks.no_plain_psk |= no_plain_psk;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = BridgeConfig::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let back: BridgeConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn localhost_broker_defaults_to_qos_zero() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.default_qos(), Qos::AtMostOnce);
    }

    #[test]
    fn remote_broker_defaults_to_qos_one() {
        let mut cfg = BridgeConfig::default();
        cfg.broker_host = "mqtt.example.com".to_string();
        assert_eq!(cfg.default_qos(), Qos::AtLeastOnce);
    }

    #[test]
    fn cli_flags_override_persisted_defaults() {
        let base = BridgeConfig::default();
        let cmd = Commands::Run {
            device: "/dev/ttyUSB0".into(),
            broker_host: Some("broker.local".into()),
            broker_port: None,
            topic_prefix: None,
            simcom: true,
            detached_scan: false,
            no_plain_psk: false,
            verbose: 0,
        };
        let merged = cmd.apply_over(base);
        assert_eq!(merged.broker_host, "broker.local");
        assert!(merged.quirks.simcom);
    }
}

//! Sensor configuration: the main JSON file and the tunables file.

pub mod tunables;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MuninnError, Result};

pub use tunables::Tunables;

/// One monitored interface and its rule file.
#[derive(Debug, Deserialize, Clone)]
pub struct InterfaceInfo {
    /// Interface name, e.g. "eth0"
    pub interface: String,
    /// Path to the rule JSON for this interface
    pub rule_file: String,
    /// Reserved for the pcap side-car; the sensor itself never writes pcaps
    #[serde(default)]
    pub log_pcaps: bool,
}

/// Debug-log destinations (the sensor's own logs, not the event stream).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub log_to_console: bool,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub log_file_path: String,
    #[serde(default)]
    pub log_to_syslog: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventFileFormat {
    Json,
    /// Tag-prefixed binary; this is the versioned format.
    Binary,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventEncryptionAlgorithm {
    #[serde(rename = "aes_gcm_128_with_sha256")]
    AesGcm128WithSha256,
    #[serde(rename = "aes_gcm_128")]
    AesGcm128,
    #[serde(rename = "aes_ctr_128")]
    AesCtr128,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventHashAlgorithm {
    #[serde(rename = "SHA256")]
    Sha256,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventUploadMethod {
    Mqtt,
    Udp,
    LocalUnix,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttSinkConfig {
    pub ip: String,
    pub port: u16,
    pub topic_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UdpSinkConfig {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalUnixSinkConfig {
    pub path: String,
}

/// Event-stream configuration: file writer, sinks, envelope algorithms.
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Directory the rotating event files are created in
    pub event_file_path: String,
    /// Rotation threshold in bytes
    pub event_file_size_bytes: u64,
    pub event_file_format: EventFileFormat,
    #[serde(default)]
    pub log_to_syslog: bool,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub log_to_console: bool,
    #[serde(default)]
    pub encrypt_log_file: bool,
    /// Path to the key material for the envelope
    #[serde(default)]
    pub encryption_key: String,
    pub encryption_algorithm: EventEncryptionAlgorithm,
    pub hash_algorithm: EventHashAlgorithm,
    pub event_upload_method: Option<EventUploadMethod>,
    #[serde(default)]
    pub mqtt_config: Option<MqttSinkConfig>,
    #[serde(default)]
    pub udp_config: Option<UdpSinkConfig>,
    #[serde(default)]
    pub local_unix_config: Option<LocalUnixSinkConfig>,
}

fn default_control_socket_path() -> String {
    "./nids_fwctl.sock".to_string()
}

/// Main sensor configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub interface_info: Vec<InterfaceInfo>,
    /// Path to the tunables JSON
    pub tunables_config: String,
    #[serde(default)]
    pub debugging: DebugConfig,
    pub events: EventsConfig,
    /// Control-plane datagram socket path
    #[serde(default = "default_control_socket_path")]
    pub control_socket_path: String,
}

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let path = p.as_ref();
    let txt = fs::read_to_string(path).map_err(|e| {
        MuninnError::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    let cfg: Config = serde_json::from_str(&txt).map_err(|e| {
        MuninnError::Config(format!("failed to parse config {}: {e}", path.display()))
    })?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.interface_info.is_empty() {
        return Err(MuninnError::Config("no interfaces configured".into()));
    }

    for intf in &cfg.interface_info {
        if !Path::new(&intf.rule_file).exists() {
            return Err(MuninnError::Config(format!(
                "rule file not found for {}: {}",
                intf.interface, intf.rule_file
            )));
        }
    }

    let evts = &cfg.events;
    if evts.encrypt_log_file || evts.event_upload_method.is_some() {
        if evts.encryption_key.is_empty() {
            return Err(MuninnError::Config("events.encryption_key is required".into()));
        }
        if !Path::new(&evts.encryption_key).exists() {
            return Err(MuninnError::Config(format!(
                "encryption key file not found: {}",
                evts.encryption_key
            )));
        }
    }

    match evts.event_upload_method {
        Some(EventUploadMethod::Mqtt) if evts.mqtt_config.is_none() => {
            Err(MuninnError::Config("events.mqtt_config is required for mqtt upload".into()))
        }
        Some(EventUploadMethod::Udp) if evts.udp_config.is_none() => {
            Err(MuninnError::Config("events.udp_config is required for udp upload".into()))
        }
        Some(EventUploadMethod::LocalUnix) if evts.local_unix_config.is_none() => {
            Err(MuninnError::Config(
                "events.local_unix_config is required for local_unix upload".into(),
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn config_json(rule_file: &str) -> String {
        format!(
            r#"{{
  "interface_info": [ {{ "interface": "eth0", "rule_file": "{rule_file}", "log_pcaps": false }} ],
  "tunables_config": "tunables.json",
  "debugging": {{ "log_to_console": true, "log_to_file": false, "log_file_path": "", "log_to_syslog": false }},
  "events": {{
    "event_file_path": "/tmp/evt",
    "event_file_size_bytes": 1048576,
    "event_file_format": "binary",
    "log_to_file": true,
    "encrypt_log_file": false,
    "encryption_algorithm": "aes_ctr_128",
    "hash_algorithm": "SHA256"
  }}
}}"#
        )
    }

    #[test]
    fn test_minimal_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let rules = write_file(&dir, "rules.json", "[]");
        let cfg_path = write_file(&dir, "config.json", &config_json(&rules));
        let cfg = load_from_path(&cfg_path).unwrap();
        assert_eq!(cfg.interface_info[0].interface, "eth0");
        assert_eq!(cfg.events.event_file_format, EventFileFormat::Binary);
        assert_eq!(cfg.events.encryption_algorithm, EventEncryptionAlgorithm::AesCtr128);
        assert_eq!(cfg.control_socket_path, "./nids_fwctl.sock");
        assert!(cfg.events.event_upload_method.is_none());
    }

    #[test]
    fn test_missing_rule_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = write_file(&dir, "config.json", &config_json("/nonexistent/rules.json"));
        assert!(load_from_path(&cfg_path).is_err());
    }

    #[test]
    fn test_unknown_enum_value_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let rules = write_file(&dir, "rules.json", "[]");
        let bad = config_json(&rules).replace("aes_ctr_128", "rot13");
        let cfg_path = write_file(&dir, "config.json", &bad);
        assert!(load_from_path(&cfg_path).is_err());
    }
}

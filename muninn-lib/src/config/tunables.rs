//! Filter tuning knobs, loaded from their own JSON file so deployments can
//! adjust thresholds without touching the main configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MuninnError, Result};

fn default_ip_blacklist_interval_ms() -> u32 {
    10_000
}

fn default_icmp_max_pkt_len() -> u32 {
    2048
}

fn default_icmp_echo_gap_ms() -> u32 {
    5_000
}

fn default_icmp_entry_timeout_ms() -> u32 {
    10_000
}

fn default_mqtt_topic_len() -> u32 {
    100
}

fn default_arp_gap_ms() -> u32 {
    200
}

fn default_arp_entry_timeout_ms() -> u32 {
    30_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct Ipv4Tunables {
    #[serde(default = "default_ip_blacklist_interval_ms")]
    pub ip_blacklist_interval_ms: u32,
}

impl Default for Ipv4Tunables {
    fn default() -> Self {
        Self { ip_blacklist_interval_ms: default_ip_blacklist_interval_ms() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IcmpTunables {
    #[serde(default = "default_icmp_max_pkt_len")]
    pub max_pkt_len_bytes: u32,
    #[serde(default = "default_icmp_echo_gap_ms")]
    pub packet_gap_two_echo_req_ms: u32,
    #[serde(default = "default_icmp_entry_timeout_ms")]
    pub icmp_entry_timeout_ms: u32,
}

impl Default for IcmpTunables {
    fn default() -> Self {
        Self {
            max_pkt_len_bytes: default_icmp_max_pkt_len(),
            packet_gap_two_echo_req_ms: default_icmp_echo_gap_ms(),
            icmp_entry_timeout_ms: default_icmp_entry_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttTunables {
    #[serde(default = "default_mqtt_topic_len")]
    pub max_topic_name_len_allowed: u32,
}

impl Default for MqttTunables {
    fn default() -> Self {
        Self { max_topic_name_len_allowed: default_mqtt_topic_len() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArpTunables {
    /// Two frames from the same sender MAC closer together than this are
    /// counted as flooding.
    #[serde(default = "default_arp_gap_ms")]
    pub inter_frame_gap_from_same_mac_msec: u32,
    #[serde(default = "default_arp_entry_timeout_ms")]
    pub entry_timeout_ms: u32,
}

impl Default for ArpTunables {
    fn default() -> Self {
        Self {
            inter_frame_gap_from_same_mac_msec: default_arp_gap_ms(),
            entry_timeout_ms: default_arp_entry_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Tunables {
    #[serde(default)]
    pub ipv4: Ipv4Tunables,
    #[serde(default)]
    pub icmp: IcmpTunables,
    #[serde(default)]
    pub mqtt: MqttTunables,
    #[serde(default)]
    pub arp: ArpTunables,
}

impl Tunables {
    pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Self> {
        let path = p.as_ref();
        let txt = fs::read_to_string(path).map_err(|e| {
            MuninnError::Config(format!("failed to read tunables file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&txt).map_err(|e| {
            MuninnError::Config(format!("failed to parse tunables {}: {e}", path.display()))
        })
    }
}

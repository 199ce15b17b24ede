//! Rule store: the per-interface rule file and its compiled form.
//!
//! A rule's predicates are sparse. Every predicate that appears in the
//! JSON sets its mask bit; evaluation must ignore predicates whose mask
//! bit is clear, and a predicate may only report a match ("detected")
//! when it is masked in. Insertion order is evaluation order.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{MuninnError, Result};
use crate::proto::IpProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Allow,
    Deny,
    Event,
}

/// Which predicates are meaningful for a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredicateMask {
    pub from_src: bool,
    pub to_dst: bool,
    pub ethertype: bool,
    pub vlan_pri: bool,
    pub vlan_vid: bool,
    pub ipv4_check_options: bool,
    pub ipv4_protocol: bool,
    pub icmp_non_zero_payload: bool,
    pub ports: bool,
}

impl PredicateMask {
    pub fn any(&self) -> bool {
        self.from_src
            || self.to_dst
            || self.ethertype
            || self.vlan_pri
            || self.vlan_vid
            || self.ipv4_check_options
            || self.ipv4_protocol
            || self.icmp_non_zero_payload
            || self.ports
    }
}

/// Which masked predicates matched the current packet. Built fresh per
/// evaluation; a bit here implies the corresponding mask bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectedBits {
    pub from_src: bool,
    pub to_dst: bool,
    pub ethertype: bool,
    pub vlan_pri: bool,
    pub vlan_vid: bool,
    pub ipv4_check_options: bool,
    pub ipv4_protocol: bool,
    pub icmp_non_zero_payload: bool,
    pub ports: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthPredicates {
    pub from_src: [u8; 6],
    pub to_dst: [u8; 6],
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VlanPredicates {
    pub pri: u8,
    pub vid: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv4Predicates {
    pub check_options: bool,
    pub protocol: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcmpPredicates {
    pub non_zero_payload: bool,
}

/// A compiled rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleItem {
    pub rule_name: String,
    pub rule_id: u32,
    pub rule_type: RuleType,
    pub eth: EthPredicates,
    pub vlan: VlanPredicates,
    pub ipv4: Ipv4Predicates,
    pub icmp: IcmpPredicates,
    pub ports: Vec<u16>,
    pub mask: PredicateMask,
}

#[derive(Debug, Deserialize)]
struct RawVlanRule {
    pri: Option<u8>,
    vid: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawIpv4Rule {
    check_options: Option<bool>,
    protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIcmpRule {
    non_zero_payload: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    rule_name: String,
    rule_id: u32,
    rule_type: RuleType,
    from_src: Option<String>,
    to_dst: Option<String>,
    ethertype: Option<String>,
    vlan: Option<RawVlanRule>,
    ipv4: Option<RawIpv4Rule>,
    icmp: Option<RawIcmpRule>,
    ports: Option<Vec<u16>>,
}

pub fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(':');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

fn parse_hex_u16(s: &str) -> Option<u16> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).ok()
}

fn parse_protocol(s: &str) -> Option<u8> {
    match s {
        "icmp" => Some(IpProtocol::Icmp as u8),
        "igmp" => Some(IpProtocol::Igmp as u8),
        "tcp" => Some(IpProtocol::Tcp as u8),
        "udp" => Some(IpProtocol::Udp as u8),
        _ => None,
    }
}

impl RuleItem {
    fn compile(raw: RawRule) -> Result<Self> {
        let mut item = RuleItem {
            rule_name: raw.rule_name,
            rule_id: raw.rule_id,
            rule_type: raw.rule_type,
            eth: EthPredicates::default(),
            vlan: VlanPredicates::default(),
            ipv4: Ipv4Predicates::default(),
            icmp: IcmpPredicates::default(),
            ports: Vec::new(),
            mask: PredicateMask::default(),
        };

        if let Some(src) = raw.from_src {
            item.eth.from_src = parse_mac(&src).ok_or_else(|| {
                MuninnError::Rules(format!("rule {}: bad from_src {src}", item.rule_name))
            })?;
            item.mask.from_src = true;
        }
        if let Some(dst) = raw.to_dst {
            item.eth.to_dst = parse_mac(&dst).ok_or_else(|| {
                MuninnError::Rules(format!("rule {}: bad to_dst {dst}", item.rule_name))
            })?;
            item.mask.to_dst = true;
        }
        if let Some(et) = raw.ethertype {
            item.eth.ethertype = parse_hex_u16(&et).ok_or_else(|| {
                MuninnError::Rules(format!("rule {}: bad ethertype {et}", item.rule_name))
            })?;
            item.mask.ethertype = true;
        }
        if let Some(vlan) = raw.vlan {
            if let Some(pri) = vlan.pri {
                item.vlan.pri = pri;
                item.mask.vlan_pri = true;
            }
            if let Some(vid) = vlan.vid {
                item.vlan.vid = vid;
                item.mask.vlan_vid = true;
            }
        }
        if let Some(ipv4) = raw.ipv4 {
            if let Some(check) = ipv4.check_options {
                item.ipv4.check_options = check;
                item.mask.ipv4_check_options = true;
            }
            if let Some(proto) = ipv4.protocol {
                item.ipv4.protocol = parse_protocol(&proto).ok_or_else(|| {
                    MuninnError::Rules(format!("rule {}: bad protocol {proto}", item.rule_name))
                })?;
                item.mask.ipv4_protocol = true;
            }
        }
        if let Some(icmp) = raw.icmp {
            if let Some(nz) = icmp.non_zero_payload {
                item.icmp.non_zero_payload = nz;
                item.mask.icmp_non_zero_payload = true;
            }
        }
        if let Some(ports) = raw.ports {
            if !ports.is_empty() {
                item.ports = ports;
                item.mask.ports = true;
            }
        }

        Ok(item)
    }
}

/// Ordered rule store for one interface. Initialized once at startup and
/// then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub rules: Vec<RuleItem>,
}

impl RuleSet {
    pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Self> {
        let path = p.as_ref();
        let txt = fs::read_to_string(path).map_err(|e| {
            MuninnError::Rules(format!("failed to read rule file {}: {e}", path.display()))
        })?;
        let raw: Vec<RawRule> = serde_json::from_str(&txt).map_err(|e| {
            MuninnError::Rules(format!("failed to parse rule file {}: {e}", path.display()))
        })?;

        let rules = raw.into_iter().map(RuleItem::compile).collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"[
      {
        "rule_name": "drop-known-bad-mac",
        "rule_id": 1,
        "rule_type": "deny",
        "from_src": "aa:bb:cc:dd:ee:ff",
        "ethertype": "0x0800"
      },
      {
        "rule_name": "icmp-payload-watch",
        "rule_id": 10,
        "rule_type": "deny",
        "ipv4": { "protocol": "icmp" },
        "icmp": { "non_zero_payload": true }
      },
      {
        "rule_name": "mgmt-ports",
        "rule_id": 20,
        "rule_type": "allow",
        "ports": [22, 443]
      }
    ]"#;

    fn load(rules: &str) -> RuleSet {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, rules).unwrap();
        RuleSet::load_from_path(&path).unwrap()
    }

    #[test]
    fn test_mask_bits_track_present_keys() {
        let rs = load(RULES);
        assert_eq!(rs.rules.len(), 3);

        let r0 = &rs.rules[0];
        assert!(r0.mask.from_src && r0.mask.ethertype);
        assert!(!r0.mask.to_dst && !r0.mask.ports);
        assert_eq!(r0.eth.from_src, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(r0.eth.ethertype, 0x0800);

        let r1 = &rs.rules[1];
        assert!(r1.mask.ipv4_protocol && r1.mask.icmp_non_zero_payload);
        assert_eq!(r1.ipv4.protocol, 1);
        assert!(r1.icmp.non_zero_payload);

        let r2 = &rs.rules[2];
        assert!(r2.mask.ports);
        assert_eq!(r2.ports, vec![22, 443]);
        assert_eq!(r2.rule_type, RuleType::Allow);
    }

    #[test]
    fn test_bad_mac_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"[{ "rule_name": "x", "rule_id": 1, "rule_type": "deny", "from_src": "zz:zz" }]"#,
        )
        .unwrap();
        assert!(RuleSet::load_from_path(&path).is_err());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let rs = load(RULES);
        let ids: Vec<u32> = rs.rules.iter().map(|r| r.rule_id).collect();
        assert_eq!(ids, vec![1, 10, 20]);
    }
}

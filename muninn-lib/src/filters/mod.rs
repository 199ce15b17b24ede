//! Rule evaluation and stateful filters, run after a frame parses clean.
//!
//! Order per packet: the rule store first (linear scan, insertion order),
//! then the stateful filters. A deny rule whose enabled predicates all
//! match short-circuits the remaining rules; allow and event rules never
//! short-circuit.

pub mod arp;
pub mod icmp;
pub mod mqtt;
pub mod tcp;

use std::sync::Arc;

use crate::config::Tunables;
use crate::events::{EventDescription, EventSink, EventType};
use crate::parser::{Parser, Verdict};
use crate::rules::{DetectedBits, RuleItem, RuleSet, RuleType};

pub use arp::ArpFloodDetector;
pub use icmp::IcmpFilter;
pub use mqtt::MqttFlowFilter;
pub use tcp::{FiveTuple, TcpStateFilter};

pub struct Filters {
    rules: Arc<RuleSet>,
    arp: ArpFloodDetector,
    icmp: IcmpFilter,
    tcp: TcpStateFilter,
    mqtt: MqttFlowFilter,
}

impl Filters {
    pub fn new(rules: Arc<RuleSet>, tunables: &Tunables) -> Self {
        Self {
            rules,
            arp: ArpFloodDetector::new(&tunables.arp),
            icmp: IcmpFilter::new(&tunables.icmp),
            tcp: TcpStateFilter::new(),
            mqtt: MqttFlowFilter::new(&tunables.mqtt),
        }
    }

    /// Evaluate one parsed packet. Events go through `sink`; the verdict
    /// reflects whether any deny fired.
    pub fn run(&self, p: &Parser, sink: &EventSink) -> Verdict {
        if let Verdict::Deny = self.run_rules(p, sink) {
            return Verdict::Deny;
        }
        self.run_stateful(p, sink)
    }

    fn run_rules(&self, p: &Parser, sink: &EventSink) -> Verdict {
        for rule in &self.rules.rules {
            let Some(detected) = match_rule(rule, p) else {
                continue;
            };

            let desc = describe_match(&detected, p);
            match rule.rule_type {
                RuleType::Deny => {
                    sink.store(p.build_event(EventType::Deny, desc, rule.rule_id));
                    return Verdict::Deny;
                }
                RuleType::Allow => {
                    sink.store(p.build_event(EventType::Allow, desc, rule.rule_id));
                }
                RuleType::Event => {
                    sink.store(p.build_event(EventType::Alert, desc, rule.rule_id));
                }
            }
        }
        Verdict::Ok
    }

    fn run_stateful(&self, p: &Parser, sink: &EventSink) -> Verdict {
        let mut verdict = Verdict::Ok;

        if let Some(arp) = &p.arp {
            if let Some(desc) = self.arp.observe(arp) {
                sink.store(p.build_event(EventType::Deny, desc, desc.auto_rule_id()));
                verdict = Verdict::Deny;
            }
        }

        if let (Some(ipv4), Some(icmp_h)) = (&p.ipv4, &p.icmp) {
            for (evt_type, desc) in self.icmp.observe(ipv4, icmp_h) {
                sink.store(p.build_event(evt_type, desc, desc.auto_rule_id()));
                if evt_type == EventType::Deny {
                    verdict = Verdict::Deny;
                }
            }
        }

        if let (Some(tcp_h), Some(ipv4)) = (&p.tcp, &p.ipv4) {
            let key = FiveTuple::normalized(
                ipv4.src_addr,
                ipv4.dst_addr,
                tcp_h.src_port,
                tcp_h.dst_port,
                ipv4.protocol,
            );
            if let Some(desc) = self.tcp.observe(key, tcp_h) {
                sink.store(p.build_event(EventType::Alert, desc, desc.auto_rule_id()));
            }

            if let Some(mqtt_h) = &p.mqtt {
                let established = self.tcp.is_established(&key);
                if let Some(desc) = self.mqtt.observe(key, mqtt_h, established) {
                    sink.store(p.build_event(EventType::Alert, desc, desc.auto_rule_id()));
                }
            }
        }

        verdict
    }
}

/// Check every masked predicate of `rule` against the parsed packet.
/// `Some(detected)` when they all match; predicates with a clear mask bit
/// are ignored and never set a detected bit.
fn match_rule(rule: &RuleItem, p: &Parser) -> Option<DetectedBits> {
    if !rule.mask.any() {
        return None;
    }

    let mut detected = DetectedBits::default();

    if rule.mask.from_src {
        let hit = p.eth.as_ref().is_some_and(|e| e.src_mac == rule.eth.from_src);
        if !hit {
            return None;
        }
        detected.from_src = true;
    }
    if rule.mask.to_dst {
        let hit = p.eth.as_ref().is_some_and(|e| e.dst_mac == rule.eth.to_dst);
        if !hit {
            return None;
        }
        detected.to_dst = true;
    }
    if rule.mask.ethertype {
        if p.effective_ethertype() != rule.eth.ethertype {
            return None;
        }
        detected.ethertype = true;
    }
    if rule.mask.vlan_pri {
        let hit = p.vlan.as_ref().is_some_and(|v| v.pri == rule.vlan.pri);
        if !hit {
            return None;
        }
        detected.vlan_pri = true;
    }
    if rule.mask.vlan_vid {
        let hit = p.vlan.as_ref().is_some_and(|v| v.vid == rule.vlan.vid);
        if !hit {
            return None;
        }
        detected.vlan_vid = true;
    }
    if rule.mask.ipv4_check_options {
        let hit = p
            .ipv4
            .as_ref()
            .is_some_and(|ip| ip.options.any_present() == rule.ipv4.check_options);
        if !hit {
            return None;
        }
        detected.ipv4_check_options = true;
    }
    if rule.mask.ipv4_protocol {
        let hit = p.ipv4.as_ref().is_some_and(|ip| ip.protocol == rule.ipv4.protocol);
        if !hit {
            return None;
        }
        detected.ipv4_protocol = true;
    }
    if rule.mask.icmp_non_zero_payload {
        let hit = rule.icmp.non_zero_payload
            && p.icmp
                .as_ref()
                .and_then(|icmp| icmp.echo_payload_len())
                .is_some_and(|len| len > 0);
        if !hit {
            return None;
        }
        detected.icmp_non_zero_payload = true;
    }
    if rule.mask.ports {
        let hit = match_ports(&rule.ports, p);
        if !hit {
            return None;
        }
        detected.ports = true;
    }

    Some(detected)
}

/// A port list matches when any listed port equals the parsed TCP or UDP
/// source or destination.
fn match_ports(ports: &[u16], p: &Parser) -> bool {
    ports.iter().any(|&port| {
        if let Some(tcp_h) = &p.tcp {
            if tcp_h.src_port == port || tcp_h.dst_port == port {
                return true;
            }
        }
        if let Some(udp_h) = &p.udp {
            if udp_h.src_port == port || udp_h.dst_port == port {
                return true;
            }
        }
        false
    })
}

fn describe_match(detected: &DetectedBits, p: &Parser) -> EventDescription {
    if detected.icmp_non_zero_payload {
        let is_reply = p.icmp.as_ref().is_some_and(|i| i.is_echo_reply());
        return if is_reply {
            EventDescription::IcmpNonZeroEchoReplyPayloadLen
        } else {
            EventDescription::IcmpNonZeroEchoReqPayloadLen
        };
    }
    if detected.ports {
        return EventDescription::PortMatched;
    }
    if detected.from_src {
        return EventDescription::EthSrcMacMatched;
    }
    if detected.to_dst {
        return EventDescription::EthDstMacMatched;
    }
    if detected.ethertype {
        return EventDescription::EthEthertypeMatched;
    }
    EventDescription::RuleMatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Packet;
    use crate::proto::l2::eth::EthHdr;
    use crate::proto::l3::ipv4::{Ipv4Hdr, Ipv4Options};
    use crate::rules::{EthPredicates, IcmpPredicates, Ipv4Predicates, PredicateMask, VlanPredicates};
    use crate::stats::PacketStats;
    use crate::wire::Writer;

    const SRC_MAC: [u8; 6] = [0x00, 0x1b, 0x21, 0x01, 0x02, 0x03];

    fn tcp_frame(src_port: u16, dst_port: u16) -> Packet {
        let mut w = Writer::new();
        EthHdr { dst_mac: [0xff; 6], src_mac: SRC_MAC, ethertype: 0x0800 }.serialize(&mut w);

        let mut tcp = Writer::new();
        tcp.put_u16(src_port);
        tcp.put_u16(dst_port);
        tcp.put_u32(1);
        tcp.put_u32(0);
        tcp.put_u8(5 << 4);
        tcp.put_u8(0x02);
        tcp.put_u16(64240);
        tcp.put_u16(0);
        tcp.put_u16(0);

        let ip = Ipv4Hdr {
            version: 4,
            hdr_len: 20,
            dscp: 0,
            ecn: 0,
            total_len: (20 + tcp.len()) as u16,
            identification: 1,
            dont_frag: true,
            more_frag: false,
            frag_off: 0,
            ttl: 64,
            protocol: 6,
            hdr_chksum: 0,
            src_addr: 0x0A000001,
            dst_addr: 0x0A000002,
            options: Ipv4Options::default(),
            ipip: None,
            ipv6_in_ipv4: None,
        };
        ip.serialize(&mut w);
        w.put_slice(tcp.as_slice());
        Packet::new(w.as_slice())
    }

    fn rule(mask: PredicateMask) -> RuleItem {
        RuleItem {
            rule_name: "t".into(),
            rule_id: 1,
            rule_type: RuleType::Deny,
            eth: EthPredicates { from_src: SRC_MAC, to_dst: [0; 6], ethertype: 0x0800 },
            vlan: VlanPredicates::default(),
            ipv4: Ipv4Predicates { check_options: false, protocol: 6 },
            icmp: IcmpPredicates::default(),
            ports: vec![80],
            mask,
        }
    }

    #[test]
    fn test_unmasked_predicates_are_ignored() {
        let (sink, _rx) = EventSink::capture();
        let stats = PacketStats::new(Vec::<String>::new());
        let mut p = Parser::new("eth0", &sink, &stats);
        assert_eq!(p.run(&tcp_frame(40000, 443)), Verdict::Ok);

        // to_dst would not match this frame, but its mask bit is clear;
        // only from_src is armed and it matches
        let mut mask = PredicateMask::default();
        mask.from_src = true;
        let detected = match_rule(&rule(mask), &p).expect("masked predicate matches");
        assert!(detected.from_src);
        assert!(!detected.to_dst, "detected bit must follow the mask");
    }

    #[test]
    fn test_all_masked_predicates_must_match() {
        let (sink, _rx) = EventSink::capture();
        let stats = PacketStats::new(Vec::<String>::new());
        let mut p = Parser::new("eth0", &sink, &stats);
        assert_eq!(p.run(&tcp_frame(40000, 443)), Verdict::Ok);

        // from_src matches but the port list does not
        let mut mask = PredicateMask::default();
        mask.from_src = true;
        mask.ports = true;
        assert!(match_rule(&rule(mask), &p).is_none());
    }

    #[test]
    fn test_port_membership_matches_either_direction() {
        let (sink, _rx) = EventSink::capture();
        let stats = PacketStats::new(Vec::<String>::new());
        let mut p = Parser::new("eth0", &sink, &stats);
        assert_eq!(p.run(&tcp_frame(80, 40000)), Verdict::Ok);

        let mut mask = PredicateMask::default();
        mask.ports = true;
        let detected = match_rule(&rule(mask), &p).expect("src port in list");
        assert!(detected.ports);
        assert_eq!(describe_match(&detected, &p), EventDescription::PortMatched);
    }

    #[test]
    fn test_empty_mask_never_matches() {
        let (sink, _rx) = EventSink::capture();
        let stats = PacketStats::new(Vec::<String>::new());
        let mut p = Parser::new("eth0", &sink, &stats);
        assert_eq!(p.run(&tcp_frame(40000, 443)), Verdict::Ok);
        assert!(match_rule(&rule(PredicateMask::default()), &p).is_none());
    }
}

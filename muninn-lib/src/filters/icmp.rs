//! ICMP anomaly filter.
//!
//! Stateless checks over the carrying IPv4 header (fragments, multicast or
//! broadcast destinations), an oversized-payload check against the covert
//! channel tunable, and a per-source echo-request rate check.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::config::tunables::IcmpTunables;
use crate::events::{EventDescription, EventType};
use crate::proto::l3::ipv4::Ipv4Hdr;
use crate::proto::l4::icmp::IcmpHdr;

pub struct IcmpFilter {
    max_payload: usize,
    echo_gap: Duration,
    entry_timeout: Duration,
    last_echo_req: Mutex<AHashMap<u32, Instant>>,
}

impl IcmpFilter {
    pub fn new(tunables: &IcmpTunables) -> Self {
        Self {
            max_payload: tunables.max_pkt_len_bytes as usize,
            echo_gap: Duration::from_millis(u64::from(tunables.packet_gap_two_echo_req_ms)),
            entry_timeout: Duration::from_millis(u64::from(tunables.icmp_entry_timeout_ms)),
            last_echo_req: Mutex::new(AHashMap::new()),
        }
    }

    /// Evaluate one parsed ICMP packet; every finding becomes an event.
    pub fn observe(&self, ipv4: &Ipv4Hdr, icmp: &IcmpHdr) -> Vec<(EventType, EventDescription)> {
        self.observe_at(ipv4, icmp, Instant::now())
    }

    fn observe_at(
        &self,
        ipv4: &Ipv4Hdr,
        icmp: &IcmpHdr,
        now: Instant,
    ) -> Vec<(EventType, EventDescription)> {
        let mut findings = Vec::new();

        // fragmented ICMP never occurs legitimately on these networks
        if ipv4.is_a_frag() {
            findings.push((EventType::Deny, EventDescription::IcmpPktFragmented));
        }
        if ipv4.is_dst_multicast() {
            findings.push((EventType::Deny, EventDescription::IcmpDestAddrMulticastInIpv4));
        }
        if ipv4.is_dst_broadcast() {
            findings.push((EventType::Deny, EventDescription::IcmpDestAddrBroadcastInIpv4));
        }

        if let Some(len) = icmp.echo_payload_len() {
            if len > self.max_payload {
                findings.push((EventType::Deny, EventDescription::IcmpCovertChannelMaybeActive));
            }
        }

        if icmp.is_echo_req() {
            if let Some(desc) = self.track_echo_req(ipv4.src_addr, now) {
                findings.push((EventType::Alert, desc));
            }
        }

        findings
    }

    /// Two echo requests from the same source closer together than the
    /// configured gap are worth an alert; idle senders age out.
    fn track_echo_req(&self, src_addr: u32, now: Instant) -> Option<EventDescription> {
        let mut table = self.last_echo_req.lock().unwrap_or_else(|e| e.into_inner());
        let timeout = self.entry_timeout;
        table.retain(|_, seen| now.duration_since(*seen) < timeout);

        let flood = match table.get(&src_addr) {
            Some(seen) => now.duration_since(*seen) < self.echo_gap,
            None => false,
        };
        table.insert(src_addr, now);

        flood.then_some(EventDescription::IcmpEchoFloodMaybeInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::l3::ipv4::Ipv4Options;
    use crate::proto::l4::icmp::{IcmpBody, IcmpEcho};

    fn ipv4(dst_addr: u32, more_frag: bool) -> Ipv4Hdr {
        Ipv4Hdr {
            version: 4,
            hdr_len: 20,
            dscp: 0,
            ecn: 0,
            total_len: 84,
            identification: 1,
            dont_frag: false,
            more_frag,
            frag_off: 0,
            ttl: 64,
            protocol: 1,
            hdr_chksum: 0,
            src_addr: 0x0A000001,
            dst_addr,
            options: Ipv4Options::default(),
            ipip: None,
            ipv6_in_ipv4: None,
        }
    }

    fn echo_req(payload_len: usize) -> IcmpHdr {
        IcmpHdr {
            icmp_type: 8,
            code: 0,
            checksum: 0,
            body: IcmpBody::EchoReq(IcmpEcho { id: 1, seq_no: 1, data: vec![0; payload_len] }),
        }
    }

    fn filter() -> IcmpFilter {
        IcmpFilter::new(&IcmpTunables {
            max_pkt_len_bytes: 64,
            packet_gap_two_echo_req_ms: 1_000,
            icmp_entry_timeout_ms: 60_000,
        })
    }

    #[test]
    fn test_clean_echo_req_passes() {
        let f = filter();
        let findings = f.observe_at(&ipv4(0x0A000002, false), &echo_req(16), Instant::now());
        assert!(findings.is_empty(), "findings: {findings:?}");
    }

    #[test]
    fn test_fragmented_icmp_denied() {
        let f = filter();
        let findings = f.observe_at(&ipv4(0x0A000002, true), &echo_req(0), Instant::now());
        assert!(findings.contains(&(EventType::Deny, EventDescription::IcmpPktFragmented)));
    }

    #[test]
    fn test_multicast_and_broadcast_dst_denied() {
        let f = filter();
        let findings = f.observe_at(&ipv4(0xE0000001, false), &echo_req(0), Instant::now());
        assert!(
            findings.contains(&(EventType::Deny, EventDescription::IcmpDestAddrMulticastInIpv4))
        );

        let findings = f.observe_at(&ipv4(0xFFFFFFFF, false), &echo_req(0), Instant::now());
        assert!(
            findings.contains(&(EventType::Deny, EventDescription::IcmpDestAddrBroadcastInIpv4))
        );
    }

    #[test]
    fn test_oversized_payload_flags_covert_channel() {
        let f = filter();
        let findings = f.observe_at(&ipv4(0x0A000002, false), &echo_req(65), Instant::now());
        assert!(
            findings
                .contains(&(EventType::Deny, EventDescription::IcmpCovertChannelMaybeActive))
        );
    }

    #[test]
    fn test_rapid_echo_requests_alert() {
        let f = filter();
        let t0 = Instant::now();
        assert!(f.observe_at(&ipv4(0x0A000002, false), &echo_req(0), t0).is_empty());
        let findings =
            f.observe_at(&ipv4(0x0A000002, false), &echo_req(0), t0 + Duration::from_millis(100));
        assert!(
            findings.contains(&(EventType::Alert, EventDescription::IcmpEchoFloodMaybeInProgress))
        );
        // a request after the gap is fine again
        let findings =
            f.observe_at(&ipv4(0x0A000002, false), &echo_req(0), t0 + Duration::from_secs(2));
        assert!(findings.is_empty());
    }
}

//! ARP flood detection.
//!
//! The table is keyed by sender MAC. A frame from a known sender arriving
//! within the configured inter-frame gap counts as flooding; the entry's
//! clock is advanced either way so a sustained flood keeps firing.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::config::tunables::ArpTunables;
use crate::events::EventDescription;
use crate::proto::l2::arp::ArpHdr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpState {
    Unknown,
    Req,
    Resp,
}

#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub sender_mac: [u8; 6],
    pub target_mac: [u8; 6],
    pub sender_ip: u32,
    pub target_ip: u32,
    pub state: ArpState,
    last_seen: Instant,
}

pub struct ArpFloodDetector {
    gap: Duration,
    entry_timeout: Duration,
    table: Mutex<AHashMap<[u8; 6], ArpEntry>>,
}

impl ArpFloodDetector {
    pub fn new(tunables: &ArpTunables) -> Self {
        Self {
            gap: Duration::from_millis(u64::from(tunables.inter_frame_gap_from_same_mac_msec)),
            entry_timeout: Duration::from_millis(u64::from(tunables.entry_timeout_ms)),
            table: Mutex::new(AHashMap::new()),
        }
    }

    /// Record one ARP frame; `Some(..)` when it looks like flooding.
    pub fn observe(&self, arp: &ArpHdr) -> Option<EventDescription> {
        self.observe_at(arp, Instant::now())
    }

    fn observe_at(&self, arp: &ArpHdr, now: Instant) -> Option<EventDescription> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());

        // lazy eviction of idle entries
        let timeout = self.entry_timeout;
        table.retain(|_, e| now.duration_since(e.last_seen) < timeout);

        match table.get_mut(&arp.sender_hw_addr) {
            None => {
                let state = if arp.is_request() {
                    ArpState::Req
                } else if arp.is_reply() {
                    ArpState::Resp
                } else {
                    ArpState::Unknown
                };
                table.insert(
                    arp.sender_hw_addr,
                    ArpEntry {
                        sender_mac: arp.sender_hw_addr,
                        target_mac: arp.target_hw_addr,
                        sender_ip: arp.sender_proto_addr,
                        target_ip: arp.target_proto_addr,
                        state,
                        last_seen: now,
                    },
                );
                None
            }
            Some(entry) => {
                let delta = now.duration_since(entry.last_seen);
                entry.target_mac = arp.target_hw_addr;
                entry.target_ip = arp.target_proto_addr;
                entry.sender_ip = arp.sender_proto_addr;
                if arp.is_reply() {
                    entry.state = ArpState::Resp;
                }
                if delta < self.gap {
                    entry.last_seen = now;
                    return Some(EventDescription::ArpFloodMaybeInProgress);
                }
                entry.last_seen = now;
                None
            }
        }
    }

    pub fn table_len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn lookup(&self, sender_mac: &[u8; 6]) -> Option<ArpEntry> {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(sender_mac)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sender: [u8; 6]) -> ArpHdr {
        ArpHdr {
            hw_type: 1,
            proto_type: 0x0800,
            hw_addr_len: 6,
            proto_addr_len: 4,
            operation: 1,
            sender_hw_addr: sender,
            sender_proto_addr: 0x0A000001,
            target_hw_addr: [0; 6],
            target_proto_addr: 0x0A0000FE,
        }
    }

    fn detector(gap_ms: u32) -> ArpFloodDetector {
        ArpFloodDetector::new(&ArpTunables {
            inter_frame_gap_from_same_mac_msec: gap_ms,
            entry_timeout_ms: 60_000,
        })
    }

    #[test]
    fn test_n_fast_requests_fire_n_minus_one_events() {
        let det = detector(200);
        let arp = request([1, 2, 3, 4, 5, 6]);
        let t0 = Instant::now();

        let mut floods = 0;
        for i in 0..10 {
            let now = t0 + Duration::from_millis(50 * i);
            if det.observe_at(&arp, now).is_some() {
                floods += 1;
            }
        }
        assert_eq!(floods, 9);
        assert_eq!(det.table_len(), 1);
    }

    #[test]
    fn test_entries_hold_sender_and_target() {
        let det = detector(200);
        let arp = request([1, 2, 3, 4, 5, 6]);
        det.observe_at(&arp, Instant::now());
        let entry = det.lookup(&arp.sender_hw_addr).unwrap();
        assert_eq!(entry.sender_mac, arp.sender_hw_addr);
        assert_eq!(entry.sender_ip, arp.sender_proto_addr);
        assert_eq!(entry.target_mac, arp.target_hw_addr);
        assert_eq!(entry.target_ip, arp.target_proto_addr);
        assert_eq!(entry.state, ArpState::Req);
    }

    #[test]
    fn test_spaced_requests_do_not_flood() {
        let det = detector(200);
        let arp = request([1, 2, 3, 4, 5, 6]);
        let t0 = Instant::now();
        for i in 0..5 {
            let now = t0 + Duration::from_millis(500 * i);
            assert_eq!(det.observe_at(&arp, now), None);
        }
    }

    #[test]
    fn test_distinct_senders_do_not_interfere() {
        let det = detector(200);
        let t0 = Instant::now();
        assert_eq!(det.observe_at(&request([1; 6]), t0), None);
        assert_eq!(det.observe_at(&request([2; 6]), t0 + Duration::from_millis(10)), None);
        assert_eq!(det.table_len(), 2);
    }

    #[test]
    fn test_idle_entries_evicted() {
        let det = ArpFloodDetector::new(&ArpTunables {
            inter_frame_gap_from_same_mac_msec: 200,
            entry_timeout_ms: 1_000,
        });
        let t0 = Instant::now();
        det.observe_at(&request([1; 6]), t0);
        // well past the idle timeout; the old entry is gone and the frame
        // is treated as a first observation
        assert_eq!(det.observe_at(&request([1; 6]), t0 + Duration::from_secs(5)), None);
        assert_eq!(det.table_len(), 1);
    }
}

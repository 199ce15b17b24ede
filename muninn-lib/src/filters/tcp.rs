//! Passive TCP handshake tracking.
//!
//! Flow state gates legality checks in adjacent protocols (the MQTT flow
//! filter only advances once the handshake completed). Invalid transitions
//! raise an alert but deliberately do not tear the flow down.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::events::EventDescription;
use crate::proto::l4::tcp::TcpHdr;

/// Direction-insensitive flow key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub lo_addr: u32,
    pub hi_addr: u32,
    pub lo_port: u16,
    pub hi_port: u16,
    pub protocol: u8,
}

impl FiveTuple {
    pub fn normalized(src_addr: u32, dst_addr: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        if (src_addr, src_port) <= (dst_addr, dst_port) {
            Self { lo_addr: src_addr, hi_addr: dst_addr, lo_port: src_port, hi_port: dst_port, protocol }
        } else {
            Self { lo_addr: dst_addr, hi_addr: src_addr, lo_port: dst_port, hi_port: src_port, protocol }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpFlowState {
    SynSent,
    SynReceived,
    SynAckSent,
    /// Handshake complete.
    AckSent,
}

#[derive(Debug, Clone, Copy)]
struct Flow {
    state: TcpFlowState,
    fin_seen: bool,
    last_seen: Instant,
}

const FLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

pub struct TcpStateFilter {
    flows: Mutex<AHashMap<FiveTuple, Flow>>,
}

impl Default for TcpStateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpStateFilter {
    pub fn new() -> Self {
        Self { flows: Mutex::new(AHashMap::new()) }
    }

    /// Advance the flow for one observed segment. `Some(..)` is an alert.
    pub fn observe(&self, key: FiveTuple, tcp: &TcpHdr) -> Option<EventDescription> {
        self.observe_at(key, tcp, Instant::now())
    }

    fn observe_at(&self, key: FiveTuple, tcp: &TcpHdr, now: Instant) -> Option<EventDescription> {
        let mut flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        flows.retain(|_, f| now.duration_since(f.last_seen) < FLOW_IDLE_TIMEOUT);

        let flags = tcp.flags;

        if flags.rst {
            flows.remove(&key);
            return None;
        }

        match flows.get_mut(&key) {
            None => {
                if flags.syn && !flags.ack {
                    flows.insert(
                        key,
                        Flow { state: TcpFlowState::SynSent, fin_seen: false, last_seen: now },
                    );
                    None
                } else if flags.ack {
                    // segment for a flow we never saw a SYN on
                    Some(EventDescription::TcpAckNoSynTracked)
                } else {
                    None
                }
            }
            Some(flow) => {
                flow.last_seen = now;

                if flags.fin {
                    if flow.fin_seen {
                        // both directions closed
                        flows.remove(&key);
                        return None;
                    }
                    flow.fin_seen = true;
                    return None;
                }

                match flow.state {
                    TcpFlowState::SynSent | TcpFlowState::SynReceived => {
                        if flags.syn && flags.ack {
                            flow.state = TcpFlowState::SynAckSent;
                            None
                        } else if flags.syn {
                            // retransmitted SYN; the peer's view of the same
                            // handshake
                            flow.state = TcpFlowState::SynReceived;
                            None
                        } else if flags.ack {
                            // ACK with no intervening SYN-ACK; alert but keep
                            // the flow
                            Some(EventDescription::TcpAckNoSynTracked)
                        } else {
                            None
                        }
                    }
                    TcpFlowState::SynAckSent => {
                        if flags.ack && !flags.syn {
                            flow.state = TcpFlowState::AckSent;
                        }
                        None
                    }
                    TcpFlowState::AckSent => None,
                }
            }
        }
    }

    pub fn is_established(&self, key: &FiveTuple) -> bool {
        let flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        matches!(flows.get(key).map(|f| f.state), Some(TcpFlowState::AckSent))
    }

    pub fn state(&self, key: &FiveTuple) -> Option<TcpFlowState> {
        let flows = self.flows.lock().unwrap_or_else(|e| e.into_inner());
        flows.get(key).map(|f| f.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::l4::tcp::{TcpFlags, TcpOptions};

    fn segment(syn: bool, ack: bool, fin: bool, rst: bool) -> TcpHdr {
        TcpHdr {
            src_port: 40000,
            dst_port: 80,
            seq_no: 1,
            ack_no: 0,
            hdr_len: 20,
            flags: TcpFlags { syn, ack, fin, rst, psh: false, urg: false, cwr: false, ece: false },
            window: 64240,
            checksum: 0,
            urg_ptr: 0,
            options: TcpOptions::default(),
            data_len: 0,
        }
    }

    fn key() -> FiveTuple {
        FiveTuple::normalized(0x0A000001, 0x0A000002, 40000, 80, 6)
    }

    #[test]
    fn test_three_way_handshake() {
        let f = TcpStateFilter::new();
        assert_eq!(f.observe(key(), &segment(true, false, false, false)), None);
        assert_eq!(f.state(&key()), Some(TcpFlowState::SynSent));
        assert_eq!(f.observe(key(), &segment(true, true, false, false)), None);
        assert_eq!(f.state(&key()), Some(TcpFlowState::SynAckSent));
        assert_eq!(f.observe(key(), &segment(false, true, false, false)), None);
        assert!(f.is_established(&key()));
    }

    #[test]
    fn test_ack_before_syn_ack_alerts() {
        let f = TcpStateFilter::new();
        assert_eq!(f.observe(key(), &segment(true, false, false, false)), None);
        // no SYN-ACK was observed for this flow
        assert_eq!(
            f.observe(key(), &segment(false, true, false, false)),
            Some(EventDescription::TcpAckNoSynTracked)
        );
        // the flow survives the alert
        assert_eq!(f.state(&key()), Some(TcpFlowState::SynSent));
    }

    #[test]
    fn test_ack_without_syn_alerts() {
        let f = TcpStateFilter::new();
        assert_eq!(
            f.observe(key(), &segment(false, true, false, false)),
            Some(EventDescription::TcpAckNoSynTracked)
        );
        // the alert does not create state
        assert_eq!(f.state(&key()), None);
    }

    #[test]
    fn test_rst_removes_flow() {
        let f = TcpStateFilter::new();
        f.observe(key(), &segment(true, false, false, false));
        f.observe(key(), &segment(false, false, false, true));
        assert_eq!(f.state(&key()), None);
    }

    #[test]
    fn test_fin_completion_removes_flow() {
        let f = TcpStateFilter::new();
        f.observe(key(), &segment(true, false, false, false));
        f.observe(key(), &segment(true, true, false, false));
        f.observe(key(), &segment(false, true, false, false));
        f.observe(key(), &segment(false, true, true, false));
        assert_eq!(f.state(&key()), Some(TcpFlowState::AckSent));
        f.observe(key(), &segment(false, true, true, false));
        assert_eq!(f.state(&key()), None);
    }

    #[test]
    fn test_state_sequence_is_deterministic() {
        let run = || {
            let f = TcpStateFilter::new();
            let mut states = Vec::new();
            for seg in [
                segment(true, false, false, false),
                segment(true, true, false, false),
                segment(false, true, false, false),
            ] {
                f.observe(key(), &seg);
                states.push(f.state(&key()));
            }
            states
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_tuple_normalization_is_direction_insensitive() {
        let a = FiveTuple::normalized(1, 2, 10, 20, 6);
        let b = FiveTuple::normalized(2, 1, 20, 10, 6);
        assert_eq!(a, b);
    }
}

//! Binary event codec.
//!
//! The on-wire record (all integers little-endian): `event_msg` (rule_id
//! u32, type u8, desc u16, ethertype u16), then `event_ipv4_info` (src u32,
//! dst u32, ttl u8, protocol u32) when the ethertype is IPv4, then
//! `event_tcp_info` (src_port u16, dst_port u16, flags u16, data_len u16)
//! or `event_udp_info` (src_port u16, dst_port u16, data_len u16) by
//! protocol.

use super::Event;
use crate::proto::{EtherType, IpProtocol};
use crate::wire::Writer;

pub fn encode(evt: &Event) -> Vec<u8> {
    let mut w = Writer::with_capacity(32);
    w.put_u32_le(evt.rule_id);
    w.put_u8(evt.evt_type as u8);
    w.put_u16_le(evt.desc.code());
    w.put_u16_le(evt.ethertype);

    if evt.ethertype == EtherType::Ipv4 as u16 {
        w.put_u32_le(evt.src_addr);
        w.put_u32_le(evt.dst_addr);
        w.put_u8(evt.ttl);
        w.put_u32_le(u32::from(evt.protocol));

        match IpProtocol::from_u8(evt.protocol) {
            Some(IpProtocol::Tcp) => {
                w.put_u16_le(evt.src_port);
                w.put_u16_le(evt.dst_port);
                w.put_u16_le(evt.tcp_flags);
                w.put_u16_le(evt.data_len);
            }
            Some(IpProtocol::Udp) => {
                w.put_u16_le(evt.src_port);
                w.put_u16_le(evt.dst_port);
                w.put_u16_le(evt.data_len);
            }
            _ => {}
        }
    }

    w.into_vec()
}

/// A decoded binary event record with raw numeric fields, for verifiers
/// and tests. A truncated trailing record decodes to `None` and marks end
/// of input, not corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub rule_id: u32,
    pub evt_type: u8,
    pub desc: u16,
    pub ethertype: u16,
    pub ipv4: Option<DecodedIpv4Info>,
    pub l4: Option<DecodedL4Info>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedIpv4Info {
    pub src_addr: u32,
    pub dst_addr: u32,
    pub ttl: u8,
    pub protocol: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedL4Info {
    Tcp { src_port: u16, dst_port: u16, flags: u16, data_len: u16 },
    Udp { src_port: u16, dst_port: u16, data_len: u16 },
}

struct LeReader<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> LeReader<'a> {
    fn u8(&mut self) -> Option<u8> {
        let v = *self.buf.get(self.off)?;
        self.off += 1;
        Some(v)
    }

    fn u16(&mut self) -> Option<u16> {
        let b = self.buf.get(self.off..self.off + 2)?;
        self.off += 2;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        let b = self.buf.get(self.off..self.off + 4)?;
        self.off += 4;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode one record; returns the record and the bytes consumed.
pub fn decode(buf: &[u8]) -> Option<(DecodedEvent, usize)> {
    let mut r = LeReader { buf, off: 0 };

    let rule_id = r.u32()?;
    let evt_type = r.u8()?;
    let desc = r.u16()?;
    let ethertype = r.u16()?;

    let mut ipv4 = None;
    let mut l4 = None;
    if ethertype == EtherType::Ipv4 as u16 {
        let info = DecodedIpv4Info {
            src_addr: r.u32()?,
            dst_addr: r.u32()?,
            ttl: r.u8()?,
            protocol: r.u32()?,
        };
        match IpProtocol::from_u8(info.protocol as u8) {
            Some(IpProtocol::Tcp) => {
                l4 = Some(DecodedL4Info::Tcp {
                    src_port: r.u16()?,
                    dst_port: r.u16()?,
                    flags: r.u16()?,
                    data_len: r.u16()?,
                });
            }
            Some(IpProtocol::Udp) => {
                l4 = Some(DecodedL4Info::Udp {
                    src_port: r.u16()?,
                    dst_port: r.u16()?,
                    data_len: r.u16()?,
                });
            }
            _ => {}
        }
        ipv4 = Some(info);
    }

    Some((DecodedEvent { rule_id, evt_type, desc, ethertype, ipv4, l4 }, r.off))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDescription, EventType};

    fn icmp_event() -> Event {
        Event {
            evt_type: EventType::Deny,
            desc: EventDescription::IcmpNonZeroEchoReqPayloadLen,
            rule_id: 10,
            src_mac: [1, 2, 3, 4, 5, 6],
            dst_mac: [6, 5, 4, 3, 2, 1],
            ethertype: 0x0800,
            src_addr: 0x0A000001,
            dst_addr: 0x0A000002,
            protocol: 1,
            src_port: 0,
            dst_port: 0,
            ttl: 64,
            tcp_flags: 0,
            data_len: 0,
            pkt_len: 98,
            ifname: "eth0".into(),
            ts_sec: 1,
            ts_nsec: 0,
            os: Default::default(),
        }
    }

    #[test]
    fn test_ipv4_record_round_trip() {
        let evt = icmp_event();
        let bytes = encode(&evt);
        let (dec, used) = decode(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(dec.rule_id, 10);
        assert_eq!(dec.desc, evt.desc.code());
        let ipv4 = dec.ipv4.unwrap();
        assert_eq!(ipv4.ttl, 64);
        assert_eq!(ipv4.protocol, 1);
        assert!(dec.l4.is_none());
    }

    #[test]
    fn test_tcp_tail() {
        let mut evt = icmp_event();
        evt.protocol = 6;
        evt.src_port = 44321;
        evt.dst_port = 443;
        evt.tcp_flags = 0x12;
        let bytes = encode(&evt);
        let (dec, _) = decode(&bytes).unwrap();
        assert_eq!(
            dec.l4,
            Some(DecodedL4Info::Tcp { src_port: 44321, dst_port: 443, flags: 0x12, data_len: 0 })
        );
    }

    #[test]
    fn test_truncated_record_is_none() {
        let evt = icmp_event();
        let bytes = encode(&evt);
        assert!(decode(&bytes[..bytes.len() - 1]).is_none());
    }

    #[test]
    fn test_non_ip_record_is_header_only() {
        let mut evt = icmp_event();
        evt.ethertype = 0x0806;
        let bytes = encode(&evt);
        assert_eq!(bytes.len(), 9);
        let (dec, _) = decode(&bytes).unwrap();
        assert!(dec.ipv4.is_none());
    }
}

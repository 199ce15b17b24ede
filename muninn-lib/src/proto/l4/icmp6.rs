use crate::events::EventDescription;
use crate::wire::Reader;

pub const ICMP6_HDR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Icmp6Type {
    EchoReq = 128,
    EchoReply = 129,
    McastListenerQuery = 130,
    McastListenerReport = 131,
    McastListenerDone = 132,
    RouterSolicitation = 133,
    RouterAdvertisement = 134,
    NeighborSolicitation = 135,
    NeighborAdvertisement = 136,
    McastListenerReportV2 = 143,
}

impl Icmp6Type {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            128 => Some(Icmp6Type::EchoReq),
            129 => Some(Icmp6Type::EchoReply),
            130 => Some(Icmp6Type::McastListenerQuery),
            131 => Some(Icmp6Type::McastListenerReport),
            132 => Some(Icmp6Type::McastListenerDone),
            133 => Some(Icmp6Type::RouterSolicitation),
            134 => Some(Icmp6Type::RouterAdvertisement),
            135 => Some(Icmp6Type::NeighborSolicitation),
            136 => Some(Icmp6Type::NeighborAdvertisement),
            143 => Some(Icmp6Type::McastListenerReportV2),
            _ => None,
        }
    }
}

/// Neighbor-discovery option TLVs (RFC 4861 plus the RDNSS family).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmp6Option {
    SourceLinkAddr([u8; 6]),
    TargetLinkAddr([u8; 6]),
    PrefixInformation {
        prefix_len: u8,
        flags: u8,
        valid_lifetime: u32,
        preferred_lifetime: u32,
        prefix: [u8; 16],
    },
    Mtu(u32),
    DnsSearchList {
        lifetime: u32,
        /// raw DNS-encoded names, left unparsed
        names: Vec<u8>,
    },
    Unknown {
        kind: u8,
        body: Vec<u8>,
    },
}

fn parse_options(r: &mut Reader) -> Result<Vec<Icmp6Option>, EventDescription> {
    let mut opts = Vec::new();

    while r.remaining() >= 2 {
        let kind = r.u8()?;
        let len_units = r.u8()?;
        // length is in 8-octet units including kind and len
        if len_units == 0 {
            return Err(EventDescription::Icmp6OptInvalLen);
        }
        let body_len = (len_units as usize) * 8 - 2;
        if r.remaining() < body_len {
            return Err(EventDescription::Icmp6OptInvalLen);
        }

        let opt = match kind {
            1 => {
                if body_len < 6 {
                    return Err(EventDescription::Icmp6OptInvalLen);
                }
                let mac = r.mac()?;
                r.skip(body_len - 6)?;
                Icmp6Option::SourceLinkAddr(mac)
            }
            2 => {
                if body_len < 6 {
                    return Err(EventDescription::Icmp6OptInvalLen);
                }
                let mac = r.mac()?;
                r.skip(body_len - 6)?;
                Icmp6Option::TargetLinkAddr(mac)
            }
            3 => {
                if body_len < 30 {
                    return Err(EventDescription::Icmp6OptInvalLen);
                }
                let prefix_len = r.u8()?;
                let flags = r.u8()?;
                let valid_lifetime = r.u32()?;
                let preferred_lifetime = r.u32()?;
                r.skip(4)?; // reserved
                let mut prefix = [0u8; 16];
                r.copy(&mut prefix)?;
                Icmp6Option::PrefixInformation {
                    prefix_len,
                    flags,
                    valid_lifetime,
                    preferred_lifetime,
                    prefix,
                }
            }
            5 => {
                if body_len < 6 {
                    return Err(EventDescription::Icmp6OptInvalLen);
                }
                r.skip(2)?; // reserved
                let mtu = r.u32()?;
                r.skip(body_len - 6)?;
                Icmp6Option::Mtu(mtu)
            }
            31 => {
                if body_len < 6 {
                    return Err(EventDescription::Icmp6OptInvalLen);
                }
                r.skip(2)?; // reserved
                let lifetime = r.u32()?;
                let names = r.bytes(body_len - 6)?.to_vec();
                Icmp6Option::DnsSearchList { lifetime, names }
            }
            _ => Icmp6Option::Unknown { kind, body: r.bytes(body_len)?.to_vec() },
        };
        opts.push(opt);
    }

    Ok(opts)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmp6Body {
    Echo {
        id: u16,
        seq_no: u16,
        data: Vec<u8>,
    },
    RouterSolicitation {
        options: Vec<Icmp6Option>,
    },
    RouterAdvertisement {
        hop_limit: u8,
        flags: u8,
        router_lifetime: u16,
        reachable_time: u32,
        retrans_timer: u32,
        options: Vec<Icmp6Option>,
    },
    NeighborSolicitation {
        target: [u8; 16],
        options: Vec<Icmp6Option>,
    },
    NeighborAdvertisement {
        flags: u32,
        target: [u8; 16],
        options: Vec<Icmp6Option>,
    },
    McastListener {
        records: Vec<u8>,
    },
}

/// ICMPv6 header with neighbor-discovery awareness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmp6Hdr {
    pub icmp6_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub body: Icmp6Body,
}

impl Icmp6Hdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < ICMP6_HDR_LEN {
            return Err(EventDescription::Icmp6EchoReqHdrLenTooShort);
        }

        let icmp6_type = r.u8()?;
        let code = r.u8()?;
        let checksum = r.u16()?;

        let kind =
            Icmp6Type::from_u8(icmp6_type).ok_or(EventDescription::Icmp6TypeUnsupported)?;

        let body = match kind {
            Icmp6Type::EchoReq | Icmp6Type::EchoReply => {
                if r.remaining() < 4 {
                    return Err(EventDescription::Icmp6EchoReqHdrLenTooShort);
                }
                let id = r.u16()?;
                let seq_no = r.u16()?;
                let data = r.bytes(r.remaining())?.to_vec();
                Icmp6Body::Echo { id, seq_no, data }
            }
            Icmp6Type::RouterSolicitation => {
                r.skip(4)?; // reserved
                Icmp6Body::RouterSolicitation { options: parse_options(r)? }
            }
            Icmp6Type::RouterAdvertisement => {
                let hop_limit = r.u8()?;
                let flags = r.u8()?;
                let router_lifetime = r.u16()?;
                let reachable_time = r.u32()?;
                let retrans_timer = r.u32()?;
                Icmp6Body::RouterAdvertisement {
                    hop_limit,
                    flags,
                    router_lifetime,
                    reachable_time,
                    retrans_timer,
                    options: parse_options(r)?,
                }
            }
            Icmp6Type::NeighborSolicitation => {
                r.skip(4)?;
                let mut target = [0u8; 16];
                r.copy(&mut target)?;
                Icmp6Body::NeighborSolicitation { target, options: parse_options(r)? }
            }
            Icmp6Type::NeighborAdvertisement => {
                let flags = r.u32()?;
                let mut target = [0u8; 16];
                r.copy(&mut target)?;
                Icmp6Body::NeighborAdvertisement { flags, target, options: parse_options(r)? }
            }
            Icmp6Type::McastListenerQuery
            | Icmp6Type::McastListenerReport
            | Icmp6Type::McastListenerDone
            | Icmp6Type::McastListenerReportV2 => {
                if r.remaining() < 4 {
                    return Err(EventDescription::Icmp6McastListenerInvalRecLen);
                }
                Icmp6Body::McastListener { records: r.bytes(r.remaining())?.to_vec() }
            }
        };

        Ok(Self { icmp6_type, code, checksum, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_neighbor_solicitation_with_source_lladdr() {
        let mut w = Writer::new();
        w.put_u8(135);
        w.put_u8(0);
        w.put_u16(0);
        w.put_u32(0); // reserved
        w.put_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        // option: source link addr
        w.put_u8(1);
        w.put_u8(1);
        w.put_slice(&[0, 0x1b, 0x21, 1, 2, 3]);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = Icmp6Hdr::parse(&mut r).unwrap();
        match h.body {
            Icmp6Body::NeighborSolicitation { options, .. } => {
                assert_eq!(options.len(), 1);
                assert!(matches!(options[0], Icmp6Option::SourceLinkAddr(_)));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_type_flagged() {
        let buf = [200u8, 0, 0, 0];
        let mut r = Reader::new(&buf);
        assert_eq!(Icmp6Hdr::parse(&mut r), Err(EventDescription::Icmp6TypeUnsupported));
    }

    #[test]
    fn test_zero_length_option_rejected() {
        let mut w = Writer::new();
        w.put_u8(133);
        w.put_u8(0);
        w.put_u16(0);
        w.put_u32(0);
        w.put_u8(1);
        w.put_u8(0); // invalid unit count
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(Icmp6Hdr::parse(&mut r), Err(EventDescription::Icmp6OptInvalLen));
    }

    #[test]
    fn test_router_advertisement_mtu_option() {
        let mut w = Writer::new();
        w.put_u8(134);
        w.put_u8(0);
        w.put_u16(0);
        w.put_u8(64);
        w.put_u8(0);
        w.put_u16(1800);
        w.put_u32(0);
        w.put_u32(0);
        // mtu option
        w.put_u8(5);
        w.put_u8(1);
        w.put_u16(0);
        w.put_u32(1500);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = Icmp6Hdr::parse(&mut r).unwrap();
        match h.body {
            Icmp6Body::RouterAdvertisement { options, .. } => {
                assert_eq!(options, vec![Icmp6Option::Mtu(1500)]);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}

use super::ipsec_ah::IpsecAhHdr;
use crate::events::EventDescription;
use crate::proto::IpProtocol;
use crate::wire::Reader;

pub const IPV6_HDR_LEN: usize = 40;
pub const IPV6_VERSION: u8 = 6;

const NH_HOP_BY_HOP: u8 = 0;

/// Hop-by-hop options extension header; the body is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6HopByHop {
    pub next_header: u8,
    pub len: u8,
}

/// IPv6 fixed header plus the extension chain the sensor follows.
#[derive(Debug, Clone, PartialEq)]
pub struct Ipv6Hdr {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src_addr: [u8; 16],
    pub dst_addr: [u8; 16],
    pub hop_by_hop: Option<Ipv6HopByHop>,
    pub auth: Option<IpsecAhHdr>,
    /// Next-header value after walking the extension chain.
    effective_nh: u8,
}

impl Ipv6Hdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < IPV6_HDR_LEN {
            return Err(EventDescription::Ipv6HdrLenTooSmall);
        }

        let first = r.u32()?;
        let version = ((first & 0xF000_0000) >> 28) as u8;
        if version != IPV6_VERSION {
            return Err(EventDescription::Ipv6VersionInvalid);
        }
        let traffic_class = ((first & 0x0FF0_0000) >> 20) as u8;
        let flow_label = first & 0x000F_FFFF;

        let payload_len = r.u16()?;
        let next_header = r.u8()?;
        let hop_limit = r.u8()?;
        if hop_limit == 0 {
            return Err(EventDescription::Ipv6ZeroHopLimit);
        }

        let mut src_addr = [0u8; 16];
        r.copy(&mut src_addr)?;
        let mut dst_addr = [0u8; 16];
        r.copy(&mut dst_addr)?;
        if dst_addr == [0u8; 16] {
            return Err(EventDescription::Ipv6DstIsZero);
        }

        if r.remaining() < payload_len as usize {
            return Err(EventDescription::Ipv6PayloadTruncated);
        }

        let mut hdr = Self {
            version,
            traffic_class,
            flow_label,
            payload_len,
            next_header,
            hop_limit,
            src_addr,
            dst_addr,
            hop_by_hop: None,
            auth: None,
            effective_nh: next_header,
        };

        // walk extension headers transparently; the effective upper-layer
        // protocol is the final next-header
        let mut nh = next_header;
        loop {
            match nh {
                NH_HOP_BY_HOP => {
                    let next = r.u8()?;
                    let len = r.u8()?;
                    // length is in 8-octet units not counting the first
                    r.skip((len as usize) * 8 + 6)
                        .map_err(|_| EventDescription::Ipv6PayloadTruncated)?;
                    hdr.hop_by_hop = Some(Ipv6HopByHop { next_header: next, len });
                    nh = next;
                }
                n if n == IpProtocol::Ah as u8 => {
                    let ah = IpsecAhHdr::parse(r)?;
                    nh = ah.next_header;
                    hdr.auth = Some(ah);
                }
                _ => break,
            }
        }
        hdr.effective_nh = nh;

        Ok(hdr)
    }

    pub fn effective_next_header(&self) -> u8 {
        self.effective_nh
    }
}

use crate::events::EventDescription;
use crate::wire::Reader;

const PPPOE_HDR_LEN: usize = 8;
const PPP_PROTOCOL_LCP: u16 = 0xC021;
const PPP_PROTOCOL_IPV6: u16 = 0x0057;

/// PPP Link Control Protocol body carried in a PPPoE session frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PppoeLcp {
    pub code: u8,
    pub id: u8,
    pub len: u16,
    pub magic_no: u32,
    pub data: Vec<u8>,
}

impl PppoeLcp {
    fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        let code = r.u8()?;
        let id = r.u8()?;
        let len = r.u16()?;
        let magic_no = r.u32()?;

        // len counts code/id/len/magic as well
        let data_len = (len as usize).saturating_sub(8).min(r.remaining());
        let data = r.bytes(data_len)?.to_vec();

        Ok(Self { code, id, len, magic_no, data })
    }
}

/// PPPoE session header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PppoeHdr {
    pub version: u8,
    pub hdr_type: u8,
    pub code: u8,
    pub session_id: u16,
    pub payload_len: u16,
    pub protocol: u16,
    pub lcp: Option<PppoeLcp>,
}

impl PppoeHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < PPPOE_HDR_LEN {
            return Err(EventDescription::PppoeHdrLenTooSmall);
        }

        let byte = r.u8()?;
        let version = (byte & 0xF0) >> 4;
        let hdr_type = byte & 0x0F;
        let code = r.u8()?;
        let session_id = r.u16()?;
        let payload_len = r.u16()?;
        let protocol = r.u16()?;

        let lcp = if protocol == PPP_PROTOCOL_LCP {
            Some(PppoeLcp::parse(r)?)
        } else {
            None
        };

        Ok(Self { version, hdr_type, code, session_id, payload_len, protocol, lcp })
    }

    /// Ethertype of the tunneled payload, when the PPP protocol maps to one.
    pub fn inner_ethertype(&self) -> Option<u16> {
        match self.protocol {
            PPP_PROTOCOL_IPV6 => Some(super::super::EtherType::Ipv6 as u16),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_session_frame_with_lcp() {
        let mut w = Writer::new();
        w.put_u8(0x11); // ver 1, type 1
        w.put_u8(0x00);
        w.put_u16(0x1234);
        w.put_u16(12);
        w.put_u16(0xC021);
        // lcp: code, id, len=10 (8 + 2 data), magic, data
        w.put_u8(1);
        w.put_u8(7);
        w.put_u16(10);
        w.put_u32(0xDEADBEEF);
        w.put_slice(&[0xaa, 0xbb]);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = PppoeHdr::parse(&mut r).unwrap();
        assert_eq!(h.session_id, 0x1234);
        let lcp = h.lcp.unwrap();
        assert_eq!(lcp.magic_no, 0xDEADBEEF);
        assert_eq!(lcp.data, vec![0xaa, 0xbb]);
    }

    #[test]
    fn test_short_header_rejected() {
        let buf = [0u8; 7];
        let mut r = Reader::new(&buf);
        assert_eq!(PppoeHdr::parse(&mut r), Err(EventDescription::PppoeHdrLenTooSmall));
    }
}

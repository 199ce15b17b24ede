use crate::events::EventDescription;
use crate::wire::Reader;

const VRRP_HDR_LEN_MIN: usize = 8;
const VRRP_V2_BODY_LEN: usize = 8;

/// VRRPv2 advertisement body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrrpV2 {
    pub virtual_router_id: u8,
    pub priority: u8,
    pub addr_count: u8,
    pub auth_type: u8,
    pub adver_int: u8,
    pub checksum: u16,
    pub addresses: Vec<u32>,
}

/// VRRP header; only v2 bodies are decoded further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrrpHdr {
    pub version: u8,
    pub pkt_type: u8,
    pub v2: Option<VrrpV2>,
}

impl VrrpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < VRRP_HDR_LEN_MIN {
            return Err(EventDescription::VrrpInvalidHdrLen);
        }

        let byte = r.u8()?;
        let version = (byte & 0xF0) >> 4;
        let pkt_type = byte & 0x0F;

        let v2 = if version == 2 {
            if r.remaining() < VRRP_V2_BODY_LEN {
                return Err(EventDescription::VrrpInvalidV2HdrLen);
            }
            let virtual_router_id = r.u8()?;
            let priority = r.u8()?;
            let addr_count = r.u8()?;
            let auth_type = r.u8()?;
            let adver_int = r.u8()?;
            let checksum = r.u16()?;
            let mut addresses = Vec::new();
            for _ in 0..addr_count {
                if r.remaining() < 4 {
                    return Err(EventDescription::VrrpInvalidV2HdrLen);
                }
                addresses.push(r.u32()?);
            }
            Some(VrrpV2 {
                virtual_router_id,
                priority,
                addr_count,
                auth_type,
                adver_int,
                checksum,
                addresses,
            })
        } else {
            None
        };

        Ok(Self { version, pkt_type, v2 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_v2_advertisement() {
        let mut w = Writer::new();
        w.put_u8(0x21); // v2, advertisement
        w.put_u8(1);
        w.put_u8(100);
        w.put_u8(1);
        w.put_u8(0);
        w.put_u8(1);
        w.put_u16(0);
        w.put_u32(0xC0A80001);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = VrrpHdr::parse(&mut r).unwrap();
        let v2 = h.v2.unwrap();
        assert_eq!(v2.virtual_router_id, 1);
        assert_eq!(v2.addresses, vec![0xC0A80001]);
    }

    #[test]
    fn test_truncated_addr_list_rejected() {
        let mut w = Writer::new();
        w.put_u8(0x21);
        w.put_u8(1);
        w.put_u8(100);
        w.put_u8(3); // claims three addresses
        w.put_u8(0);
        w.put_u8(1);
        w.put_u16(0);
        w.put_u32(0xC0A80001);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(VrrpHdr::parse(&mut r), Err(EventDescription::VrrpInvalidV2HdrLen));
    }
}

use super::vlan::VlanHdr;
use crate::events::EventDescription;
use crate::wire::Reader;

/// 802.1ad provider tag: an outer S-tag followed by the customer 802.1Q
/// C-tag. Both carry the same reserved-VID rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QinQHdr {
    pub pri: u8,
    pub dei: bool,
    pub vid: u16,
    /// Inner customer tag; its ethertype is the effective one.
    pub inner: VlanHdr,
}

impl QinQHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < 8 {
            return Err(EventDescription::VlanHdrLenTooShort);
        }

        let tci = r.u16()?;
        let pri = ((tci & 0xE000) >> 13) as u8;
        let dei = tci & 0x1000 != 0;
        let vid = tci & 0x0FFF;
        if vid == 0 || vid == 4095 {
            return Err(EventDescription::VlanInvalVid);
        }

        // the S-tag's ethertype introduces the C-tag
        let inner_tpid = r.u16()?;
        if inner_tpid != super::super::EtherType::Vlan as u16 {
            return Err(EventDescription::VlanHdrLenTooShort);
        }
        let inner = VlanHdr::parse(r)?;

        Ok(Self { pri, dei, vid, inner })
    }
}

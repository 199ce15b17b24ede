use crate::events::EventDescription;
use crate::wire::{Reader, Writer};

pub const VLAN_TAG_LEN: usize = 4;

/// VID 0 and 4095 are reserved and never valid on the wire.
const RESERVED_VIDS: [u16; 2] = [0, 4095];

/// 802.1Q tag (the four bytes after the outer ethertype).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanHdr {
    pub pri: u8,
    pub dei: bool,
    pub vid: u16,
    pub ethertype: u16,
}

impl VlanHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < VLAN_TAG_LEN {
            return Err(EventDescription::VlanHdrLenTooShort);
        }

        let tci = r.u16()?;
        let pri = ((tci & 0xE000) >> 13) as u8;
        let dei = tci & 0x1000 != 0;
        let vid = tci & 0x0FFF;
        if RESERVED_VIDS.contains(&vid) {
            return Err(EventDescription::VlanInvalVid);
        }

        let ethertype = r.u16()?;

        Ok(Self { pri, dei, vid, ethertype })
    }

    pub fn serialize(&self, w: &mut Writer) {
        let mut tci = (self.pri as u16) << 13;
        if self.dei {
            tci |= 0x1000;
        }
        tci |= self.vid & 0x0FFF;
        w.put_u16(tci);
        w.put_u16(self.ethertype);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Reader;

    #[test]
    fn test_reserved_vids_rejected() {
        for vid in [0u16, 4095] {
            let mut w = Writer::new();
            w.put_u16(vid);
            w.put_u16(0x0800);
            let bytes = w.into_vec();
            let mut r = Reader::new(&bytes);
            assert_eq!(VlanHdr::parse(&mut r), Err(EventDescription::VlanInvalVid));
        }
    }

    #[test]
    fn test_round_trip() {
        let hdr = VlanHdr { pri: 5, dei: true, vid: 100, ethertype: 0x86DD };
        let mut w = Writer::new();
        hdr.serialize(&mut w);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(VlanHdr::parse(&mut r).unwrap(), hdr);
    }

    #[test]
    fn test_short_tag_rejected() {
        let buf = [0x00, 0x64, 0x08];
        let mut r = Reader::new(&buf);
        assert_eq!(VlanHdr::parse(&mut r), Err(EventDescription::VlanHdrLenTooShort));
    }
}

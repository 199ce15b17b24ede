use crate::events::EventDescription;
use crate::wire::{Reader, Writer};

pub const ETH_HDR_LEN: usize = 14;
pub const MAC_LEN: usize = 6;

/// Ethernet II header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthHdr {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ethertype: u16,
}

impl EthHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < ETH_HDR_LEN {
            return Err(EventDescription::EthHdrLenTooSmall);
        }

        let dst_mac = r.mac()?;
        let src_mac = r.mac()?;
        let ethertype = r.u16()?;

        Ok(Self { dst_mac, src_mac, ethertype })
    }

    pub fn serialize(&self, w: &mut Writer) {
        w.put_slice(&self.dst_mac);
        w.put_slice(&self.src_mac);
        w.put_u16(self.ethertype);
    }

    /// Bit 0 of the first byte marks a group (multicast) address.
    pub fn is_multicast_mac(mac: &[u8; 6]) -> bool {
        mac[0] & 0x01 != 0
    }

    /// Bit 1 of the first byte marks a locally administered address.
    pub fn is_locally_administered(mac: &[u8; 6]) -> bool {
        mac[0] & 0x02 != 0
    }

    pub fn is_broadcast_dst(&self) -> bool {
        self.dst_mac == [0xff; 6]
    }

    pub fn is_zero_src(&self) -> bool {
        self.src_mac == [0u8; 6]
    }
}

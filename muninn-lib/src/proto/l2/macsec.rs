use crate::events::EventDescription;
use crate::wire::{Reader, Writer};

pub const MACSEC_ICV_LEN: usize = 16;
/// TCI/AN + short_len + packet number, without SCI.
const MACSEC_HDR_LEN_MIN: usize = 6;

/// 802.1AE Tag Control Information bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacsecTci {
    pub ver: bool,
    pub es: bool,
    pub sc: bool,
    pub scb: bool,
    pub encrypted: bool,
    pub changed: bool,
    pub an: u8,
}

/// Secure Channel Identifier: source MAC plus port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacsecSci {
    pub mac: [u8; 6],
    pub port_id: u16,
}

/// 802.1AE MACsec SecTag.
///
/// The ICV is the trailing 16 bytes of the frame and is excluded from
/// higher-layer parsing. When the frame is authenticated-only (E and C both
/// clear) the cleartext ethertype follows the tag and the payload remains
/// parseable; otherwise the payload is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacsecHdr {
    pub tci: MacsecTci,
    pub short_len: u8,
    pub pkt_number: u32,
    pub sci: Option<MacsecSci>,
    /// Cleartext ethertype, present on authenticated-only frames.
    pub ethertype: Option<u16>,
    pub icv: [u8; MACSEC_ICV_LEN],
}

impl MacsecHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < MACSEC_HDR_LEN_MIN + MACSEC_ICV_LEN {
            return Err(EventDescription::MacsecHdrLenTooSmall);
        }

        let byte = r.u8()?;
        let tci = MacsecTci {
            ver: byte & 0x80 != 0,
            es: byte & 0x40 != 0,
            sc: byte & 0x20 != 0,
            scb: byte & 0x10 != 0,
            encrypted: byte & 0x08 != 0,
            changed: byte & 0x04 != 0,
            an: byte & 0x03,
        };

        // ES and SC are exclusive; so are SC and SCB.
        if tci.sc && tci.scb {
            return Err(EventDescription::MacsecTciScScbSet);
        }
        if tci.es && tci.sc {
            return Err(EventDescription::MacsecTciEsScSet);
        }

        let short_len = r.u8()?;
        let pkt_number = r.u32()?;

        let sci = if tci.sc {
            Some(MacsecSci { mac: r.mac()?, port_id: r.u16()? })
        } else {
            None
        };

        // the ICV occupies the frame tail
        if r.remaining() < MACSEC_ICV_LEN {
            return Err(EventDescription::MacsecHdrLenTooSmall);
        }
        let buf = r.as_slice();
        let icv_off = buf.len() - MACSEC_ICV_LEN;
        let mut icv = [0u8; MACSEC_ICV_LEN];
        icv.copy_from_slice(&buf[icv_off..]);

        let authenticated_only = !tci.encrypted && !tci.changed;
        let ethertype = if authenticated_only { Some(r.u16()?) } else { None };

        // exclude the ICV from whatever parses next
        r.truncate(icv_off);

        Ok(Self { tci, short_len, pkt_number, sci, ethertype, icv })
    }

    pub fn serialize(&self, w: &mut Writer, payload: &[u8]) {
        let mut byte = 0u8;
        if self.tci.ver {
            byte |= 0x80;
        }
        if self.tci.es {
            byte |= 0x40;
        }
        if self.tci.sc {
            byte |= 0x20;
        }
        if self.tci.scb {
            byte |= 0x10;
        }
        if self.tci.encrypted {
            byte |= 0x08;
        }
        if self.tci.changed {
            byte |= 0x04;
        }
        byte |= self.tci.an & 0x03;
        w.put_u8(byte);
        w.put_u8(self.short_len);
        w.put_u32(self.pkt_number);
        if let Some(sci) = &self.sci {
            w.put_slice(&sci.mac);
            w.put_u16(sci.port_id);
        }
        if let Some(et) = self.ethertype {
            w.put_u16(et);
        }
        w.put_slice(payload);
        w.put_slice(&self.icv);
    }

    pub fn is_authenticated_only(&self) -> bool {
        !self.tci.encrypted && !self.tci.changed
    }
}

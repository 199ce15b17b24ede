use crate::events::EventDescription;
use crate::wire::Reader;

pub const NTP_HDR_LEN: usize = 48;

/// NTP packet (v3 layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtpHdr {
    pub leap_indicator: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll_interval: u8,
    pub precision: u8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_ts: u64,
    pub origin_ts: u64,
    pub receive_ts: u64,
    pub transmit_ts: u64,
}

impl NtpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < NTP_HDR_LEN {
            return Err(EventDescription::NtpHdrLenTooShort);
        }

        let byte = r.u8()?;
        let leap_indicator = (byte & 0xC0) >> 6;
        let version = (byte & 0x38) >> 3;
        let mode = byte & 0x07;

        Ok(Self {
            leap_indicator,
            version,
            mode,
            stratum: r.u8()?,
            poll_interval: r.u8()?,
            precision: r.u8()?,
            root_delay: r.u32()?,
            root_dispersion: r.u32()?,
            reference_id: r.u32()?,
            reference_ts: r.u64()?,
            origin_ts: r.u64()?,
            receive_ts: r.u64()?,
            transmit_ts: r.u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_v3_client_packet() {
        let mut w = Writer::new();
        w.put_u8(0x1B); // LI 0, version 3, mode 3 (client)
        w.put_u8(2);
        w.put_u8(6);
        w.put_u8(0xEC);
        w.put_u32(0);
        w.put_u32(0);
        w.put_u32(0x4C4F434C);
        w.put_u64(0);
        w.put_u64(0);
        w.put_u64(0);
        w.put_u64(0xE50C_0000_0000_0000);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = NtpHdr::parse(&mut r).unwrap();
        assert_eq!(h.version, 3);
        assert_eq!(h.mode, 3);
        assert_eq!(h.stratum, 2);
    }

    #[test]
    fn test_short_packet_rejected() {
        let buf = [0u8; 47];
        let mut r = Reader::new(&buf);
        assert_eq!(NtpHdr::parse(&mut r), Err(EventDescription::NtpHdrLenTooShort));
    }
}

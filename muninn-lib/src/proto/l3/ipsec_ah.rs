use crate::events::EventDescription;
use crate::wire::Reader;

/// Fixed AH fields without the ICV: next header, payload length, reserved,
/// SPI, sequence — 12 bytes.
const AH_LEN_NO_ICV: usize = 12;
const AH_ICV_MAX: usize = 64;

/// IPsec Authentication Header (RFC 4302).
///
/// The payload-length field counts 32-bit words minus 2, so the ICV length
/// in bytes is `(len + 2) * 4 - 12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecAhHdr {
    pub next_header: u8,
    pub len: u8,
    pub reserved: u16,
    pub spi: u32,
    pub seq: u32,
    pub icv: Vec<u8>,
}

impl IpsecAhHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < AH_LEN_NO_ICV {
            return Err(EventDescription::IpsecAhInvalLen);
        }

        let next_header = r.u8()?;
        let len = r.u8()?;
        // len of 1 would leave no room for the mandatory fields
        if len <= 1 {
            return Err(EventDescription::IpsecAhInvalLen);
        }

        let icv_len = ((len as usize) + 2) * 4 - AH_LEN_NO_ICV;
        if icv_len == 0 {
            return Err(EventDescription::IpsecAhZeroIcvLen);
        }

        let reserved = r.u16()?;
        let spi = r.u32()?;
        let seq = r.u32()?;

        if icv_len > AH_ICV_MAX || r.remaining() < icv_len {
            return Err(EventDescription::IpsecAhInvalLen);
        }
        let icv = r.bytes(icv_len)?.to_vec();

        Ok(Self { next_header, len, reserved, spi, seq, icv })
    }
}

use crate::events::EventDescription;
use crate::wire::Reader;

/// SNMP sniff: version and community from the leading BER fields. The PDU
/// body is not walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpHdr {
    pub version: u8,
    pub community: String,
}

impl SnmpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        // SEQUENCE tag + length
        let tag = r.u8().map_err(|_| EventDescription::SnmpHdrLenTooShort)?;
        if tag != 0x30 {
            return Err(EventDescription::SnmpHdrLenTooShort);
        }
        Self::ber_len(r)?;

        // INTEGER version
        let tag = r.u8()?;
        let len = r.u8()?;
        if tag != 0x02 || len != 1 {
            return Err(EventDescription::SnmpHdrLenTooShort);
        }
        let version = r.u8()?;

        // OCTET STRING community
        let tag = r.u8()?;
        if tag != 0x04 {
            return Err(EventDescription::SnmpHdrLenTooShort);
        }
        let clen = Self::ber_len(r)?;
        let raw = r
            .bytes(clen)
            .map_err(|_| EventDescription::SnmpHdrLenTooShort)?;
        let community = String::from_utf8_lossy(raw).into_owned();

        Ok(Self { version, community })
    }

    /// Short-form and single-byte long-form BER lengths only; anything
    /// longer than one datagram's worth is malformed here anyway.
    fn ber_len(r: &mut Reader) -> Result<usize, EventDescription> {
        let b = r.u8()?;
        if b & 0x80 == 0 {
            return Ok(b as usize);
        }
        match b & 0x7F {
            1 => Ok(r.u8()? as usize),
            2 => Ok(r.u16()? as usize),
            _ => Err(EventDescription::SnmpHdrLenTooShort),
        }
    }
}

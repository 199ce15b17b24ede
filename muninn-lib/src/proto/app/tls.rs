use crate::events::EventDescription;
use crate::wire::Reader;

const TLS_RECORD_HDR_LEN: usize = 5;
const CONTENT_TYPE_HANDSHAKE: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    V1_0,
    V1_1,
    V1_2,
}

/// TLS record sniff: content type and version only, nothing past the
/// record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHdr {
    pub content_type: u8,
    pub version: TlsVersion,
    pub record_len: u16,
}

impl TlsHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < TLS_RECORD_HDR_LEN {
            return Err(EventDescription::TlsRecordNotHandshake);
        }

        let content_type = r.u8()?;
        if content_type != CONTENT_TYPE_HANDSHAKE {
            return Err(EventDescription::TlsRecordNotHandshake);
        }

        let major = r.u8()?;
        let minor = r.u8()?;
        let version = match (major, minor) {
            (0x03, 0x01) => TlsVersion::V1_0,
            (0x03, 0x02) => TlsVersion::V1_1,
            (0x03, 0x03) => TlsVersion::V1_2,
            _ => return Err(EventDescription::TlsVersionUnsupported),
        };

        let record_len = r.u16()?;

        Ok(Self { content_type, version, record_len })
    }
}

use crate::events::EventDescription;
use crate::wire::Reader;

const EAPOL_HDR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EapolType {
    Eap = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
}

/// EAP packet carried in an EAPOL frame of type EAP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapHdr {
    pub code: u8,
    pub id: u8,
    pub len: u16,
    pub method: u8,
}

impl EapHdr {
    fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < 5 {
            return Err(EventDescription::EapHdrLenTooSmall);
        }
        let code = r.u8()?;
        let id = r.u8()?;
        let len = r.u16()?;
        let method = r.u8()?;
        Ok(Self { code, id, len, method })
    }
}

/// 802.1X EAPOL header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolHdr {
    pub version: u8,
    pub pkt_type: u8,
    pub len: u16,
    pub eap: Option<EapHdr>,
}

impl EapolHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < EAPOL_HDR_LEN {
            return Err(EventDescription::EapHdrLenTooSmall);
        }

        let version = r.u8()?;
        let pkt_type = r.u8()?;
        let len = r.u16()?;

        let eap = match pkt_type {
            t if t == EapolType::Eap as u8 => Some(EapHdr::parse(r)?),
            t if t == EapolType::Start as u8 || t == EapolType::Logoff as u8 => None,
            t if t == EapolType::Key as u8 => None,
            _ => return Err(EventDescription::EapTypeUnsupported),
        };

        Ok(Self { version, pkt_type, len, eap })
    }
}

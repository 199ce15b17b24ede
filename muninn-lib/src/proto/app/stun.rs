use crate::events::EventDescription;
use crate::wire::Reader;

pub const STUN_HDR_LEN: usize = 20;
const STUN_MAGIC_COOKIE: u32 = 0x2112_A442;

/// STUN message header (RFC 5389); attributes are left opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunHdr {
    pub msg_type: u16,
    pub msg_len: u16,
    pub transaction_id: [u8; 12],
}

impl StunHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < STUN_HDR_LEN {
            return Err(EventDescription::StunHdrLenTooShort);
        }

        let msg_type = r.u16()?;
        let msg_len = r.u16()?;
        let cookie = r.u32()?;
        if cookie != STUN_MAGIC_COOKIE {
            return Err(EventDescription::StunInvalMagicCookie);
        }
        let mut transaction_id = [0u8; 12];
        r.copy(&mut transaction_id)?;

        Ok(Self { msg_type, msg_len, transaction_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_binding_request() {
        let mut w = Writer::new();
        w.put_u16(0x0001);
        w.put_u16(0);
        w.put_u32(0x2112A442);
        w.put_slice(&[7u8; 12]);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = StunHdr::parse(&mut r).unwrap();
        assert_eq!(h.msg_type, 1);
        assert_eq!(h.transaction_id, [7u8; 12]);
    }

    #[test]
    fn test_bad_cookie_rejected() {
        let mut w = Writer::new();
        w.put_u16(0x0001);
        w.put_u16(0);
        w.put_u32(0xDEADBEEF);
        w.put_slice(&[0u8; 12]);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(StunHdr::parse(&mut r), Err(EventDescription::StunInvalMagicCookie));
    }
}

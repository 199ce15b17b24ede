use crate::events::EventDescription;
use crate::proto::EtherType;
use crate::wire::Reader;

const GRE_HDR_LEN_MIN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GreFlags {
    pub checksum: bool,
    pub routing: bool,
    pub key: bool,
    pub sequence: bool,
    pub strict_source_route: bool,
    pub recursion_control: u8,
    pub version: u8,
}

/// GRE header; an IPv4 payload is parsed recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct GreHdr {
    pub flags: GreFlags,
    pub protocol: u16,
    pub chksum: Option<u16>,
    pub key: Option<u32>,
    pub sequence: Option<u32>,
    pub inner_ipv4: Option<Box<crate::proto::l3::ipv4::Ipv4Hdr>>,
}

impl GreHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < GRE_HDR_LEN_MIN {
            return Err(EventDescription::GreInvalidHdrLen);
        }

        let word = r.u16()?;
        let flags = GreFlags {
            checksum: word & 0x8000 != 0,
            routing: word & 0x4000 != 0,
            key: word & 0x2000 != 0,
            sequence: word & 0x1000 != 0,
            strict_source_route: word & 0x0800 != 0,
            recursion_control: ((word & 0x0700) >> 8) as u8,
            version: (word & 0x0007) as u8,
        };
        let protocol = r.u16()?;

        let chksum = if flags.checksum {
            let c = r.u16()?;
            r.skip(2)?; // reserved offset
            Some(c)
        } else {
            None
        };
        let key = if flags.key { Some(r.u32()?) } else { None };
        let sequence = if flags.sequence { Some(r.u32()?) } else { None };

        let inner_ipv4 = if protocol == EtherType::Ipv4 as u16 {
            Some(Box::new(crate::proto::l3::ipv4::Ipv4Hdr::parse(r)?))
        } else {
            None
        };

        Ok(Self { flags, protocol, chksum, key, sequence, inner_ipv4 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_key_and_sequence() {
        let mut w = Writer::new();
        w.put_u16(0x3000); // key + sequence
        w.put_u16(0x0000);
        w.put_u32(0xCAFEBABE);
        w.put_u32(42);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = GreHdr::parse(&mut r).unwrap();
        assert_eq!(h.key, Some(0xCAFEBABE));
        assert_eq!(h.sequence, Some(42));
        assert!(h.inner_ipv4.is_none());
    }

    #[test]
    fn test_short_header_rejected() {
        let buf = [0u8; 3];
        let mut r = Reader::new(&buf);
        assert_eq!(GreHdr::parse(&mut r), Err(EventDescription::GreInvalidHdrLen));
    }
}

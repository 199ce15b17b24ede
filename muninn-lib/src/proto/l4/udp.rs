use crate::events::EventDescription;
use crate::wire::Reader;

pub const UDP_HDR_LEN: usize = 8;

/// UDP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHdr {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
    pub data_len: u16,
}

impl UdpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < UDP_HDR_LEN {
            return Err(EventDescription::UdpLenTooShort);
        }

        let src_port = r.u16()?;
        let dst_port = r.u16()?;
        let length = r.u16()?;
        let checksum = r.u16()?;

        if src_port == 0 {
            return Err(EventDescription::UdpSrcPortInvalid);
        }
        if dst_port == 0 {
            return Err(EventDescription::UdpDstPortInvalid);
        }
        // length counts the header itself and cannot exceed the frame
        if (length as usize) < UDP_HDR_LEN {
            return Err(EventDescription::UdpBogusMsgLen);
        }
        if length as usize - UDP_HDR_LEN > r.remaining() {
            return Err(EventDescription::UdpBogusMsgLen);
        }

        let data_len = (length as usize - UDP_HDR_LEN) as u16;

        Ok(Self { src_port, dst_port, length, checksum, data_len })
    }
}

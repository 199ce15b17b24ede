use crate::events::EventDescription;
use crate::wire::Reader;

pub const SOMEIP_PDU_HDR_LEN: usize = 16;

/// One SOME/IP PDU. `payload_len = length - 8`: the length field covers
/// everything after itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SomeipPdu {
    pub service_id: u16,
    pub method_id: u16,
    pub length: u32,
    pub client_id: u16,
    pub session_id: u16,
    pub proto_version: u8,
    pub interface_version: u8,
    pub msg_type: u8,
    pub msg_type_ack: bool,
    pub msg_type_tp: bool,
    pub return_code: u8,
    pub payload: Vec<u8>,
}

/// A SOME/IP datagram: one or more PDUs back to back until the buffer ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SomeipHdr {
    pub pdus: Vec<SomeipPdu>,
}

impl SomeipHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        let mut pdus = Vec::new();

        while r.remaining() > 0 {
            if r.remaining() < SOMEIP_PDU_HDR_LEN {
                return Err(EventDescription::SomeipHdrLenTooSmall);
            }

            let service_id = r.u16()?;
            let method_id = r.u16()?;
            let length = r.u32()?;
            let client_id = r.u16()?;
            let session_id = r.u16()?;
            let proto_version = r.u8()?;
            let interface_version = r.u8()?;
            let type_byte = r.u8()?;
            let msg_type_ack = type_byte & 0x40 != 0;
            let msg_type_tp = type_byte & 0x20 != 0;
            let msg_type = type_byte & 0x1F;
            let return_code = r.u8()?;

            let payload_len = (length as usize).saturating_sub(8);
            if payload_len > r.remaining() {
                return Err(EventDescription::SomeipHdrLenTooSmall);
            }
            let payload = r.bytes(payload_len)?.to_vec();

            pdus.push(SomeipPdu {
                service_id,
                method_id,
                length,
                client_id,
                session_id,
                proto_version,
                interface_version,
                msg_type,
                msg_type_ack,
                msg_type_tp,
                return_code,
                payload,
            });
        }

        Ok(Self { pdus })
    }
}

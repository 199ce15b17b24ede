use crate::events::EventDescription;
use crate::wire::{Reader, Writer};

pub const ARP_HDR_LEN: usize = 28;
const ARP_HW_ADDR_LEN: u8 = 6;
const ARP_PROTO_ADDR_LEN: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ArpOperation {
    Request = 1,
    Reply = 2,
    RarpRequest = 3,
    RarpReply = 4,
    DrarpRequest = 5,
    DrarpReply = 6,
    InArpRequest = 7,
    InArpReply = 8,
}

/// ARP over Ethernet/IPv4. Anything with other address lengths is flagged,
/// not parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpHdr {
    pub hw_type: u16,
    pub proto_type: u16,
    pub hw_addr_len: u8,
    pub proto_addr_len: u8,
    pub operation: u16,
    pub sender_hw_addr: [u8; 6],
    pub sender_proto_addr: u32,
    pub target_hw_addr: [u8; 6],
    pub target_proto_addr: u32,
}

impl ArpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < ARP_HDR_LEN {
            return Err(EventDescription::ArpHdrLenTooSmall);
        }

        let hw_type = r.u16()?;
        let proto_type = r.u16()?;
        let hw_addr_len = r.u8()?;
        if hw_addr_len != ARP_HW_ADDR_LEN {
            return Err(EventDescription::ArpHwAddrLenInval);
        }
        let proto_addr_len = r.u8()?;
        if proto_addr_len != ARP_PROTO_ADDR_LEN {
            return Err(EventDescription::ArpProtocolAddrLenInval);
        }
        let operation = r.u16()?;
        if !(ArpOperation::Request as u16..=ArpOperation::InArpReply as u16).contains(&operation) {
            return Err(EventDescription::ArpInvalOperation);
        }
        let sender_hw_addr = r.mac()?;
        let sender_proto_addr = r.u32()?;
        let target_hw_addr = r.mac()?;
        let target_proto_addr = r.u32()?;

        Ok(Self {
            hw_type,
            proto_type,
            hw_addr_len,
            proto_addr_len,
            operation,
            sender_hw_addr,
            sender_proto_addr,
            target_hw_addr,
            target_proto_addr,
        })
    }

    pub fn serialize(&self, w: &mut Writer) {
        w.put_u16(self.hw_type);
        w.put_u16(self.proto_type);
        w.put_u8(self.hw_addr_len);
        w.put_u8(self.proto_addr_len);
        w.put_u16(self.operation);
        w.put_slice(&self.sender_hw_addr);
        w.put_u32(self.sender_proto_addr);
        w.put_slice(&self.target_hw_addr);
        w.put_u32(self.target_proto_addr);
    }

    pub fn is_request(&self) -> bool {
        self.operation == ArpOperation::Request as u16
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ArpOperation::Reply as u16
    }
}

//! DoIP (ISO 13400) and the UDS services carried inside diagnostic
//! messages. Compiled only with the `automotive` feature.

use crate::events::EventDescription;
use crate::wire::Reader;

const DOIP_HDR_LEN: usize = 8;
const VIN_LEN: usize = 17;
const EID_LEN: usize = 6;
const GID_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DoipMsgType {
    GenericNack = 0x0000,
    VehIdReq = 0x0001,
    VehAnnounce = 0x0004,
    RoutingActivationReq = 0x0005,
    RoutingActivationResp = 0x0006,
    AliveCheckReq = 0x0007,
    AliveCheckResp = 0x0008,
    EntityStatusReq = 0x4001,
    EntityStatusResp = 0x4002,
    PowerModeInfoReq = 0x4003,
    PowerModeInfoResp = 0x4004,
    DiagMessage = 0x8001,
}

impl DoipMsgType {
    fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0000 => Some(DoipMsgType::GenericNack),
            0x0001 => Some(DoipMsgType::VehIdReq),
            0x0004 => Some(DoipMsgType::VehAnnounce),
            0x0005 => Some(DoipMsgType::RoutingActivationReq),
            0x0006 => Some(DoipMsgType::RoutingActivationResp),
            0x0007 => Some(DoipMsgType::AliveCheckReq),
            0x0008 => Some(DoipMsgType::AliveCheckResp),
            0x4001 => Some(DoipMsgType::EntityStatusReq),
            0x4002 => Some(DoipMsgType::EntityStatusResp),
            0x4003 => Some(DoipMsgType::PowerModeInfoReq),
            0x4004 => Some(DoipMsgType::PowerModeInfoResp),
            0x8001 => Some(DoipMsgType::DiagMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipVehAnnounce {
    pub vin: [u8; VIN_LEN],
    pub logical_addr: u16,
    pub eid: [u8; EID_LEN],
    pub gid: [u8; GID_LEN],
    pub further_action: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipEntityStatus {
    pub node_type: u8,
    pub max_open_sockets: u8,
    pub cur_open_sockets: u8,
    pub max_data_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipRoutingActivationReq {
    pub source_addr: u16,
    pub activation_type: u8,
    pub reserved: u32,
}

/// UDS services decoded from a diagnostic message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdsService {
    SessionControl { session_type: u8, is_reply: bool },
    Error { service_id: u8, code: u8 },
}

impl UdsService {
    fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        let service_id = r.u8().map_err(|_| EventDescription::UdsUnknownServiceId)?;
        let is_reply = service_id & 0x40 != 0;
        match service_id & !0x40 {
            0x10 => Ok(UdsService::SessionControl { session_type: r.u8()?, is_reply }),
            0x3F => {
                // negative response container
                let sid = r.u8()?;
                let code = r.u8()?;
                Ok(UdsService::Error { service_id: sid, code })
            }
            _ => Err(EventDescription::UdsUnknownServiceId),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoipBody {
    GenericNack { code: u8 },
    VehIdReq,
    VehAnnounce(DoipVehAnnounce),
    RoutingActivationReq(DoipRoutingActivationReq),
    RoutingActivationResp { tester_addr: u16, entity_addr: u16, code: u8 },
    AliveCheckReq,
    AliveCheckResp { source_addr: u16 },
    EntityStatusReq,
    EntityStatusResp(DoipEntityStatus),
    PowerModeInfoReq,
    PowerModeInfoResp { mode: u8 },
    DiagMessage { source_addr: u16, target_addr: u16, uds: UdsService },
}

/// DoIP header: protocol version, its bitwise-complement check field,
/// message type and payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoipHdr {
    pub version: u8,
    pub inv_version: u8,
    pub msg_type: u16,
    pub payload_len: u32,
    pub body: DoipBody,
}

impl DoipHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < DOIP_HDR_LEN {
            return Err(EventDescription::DoipHdrLenTooSmall);
        }

        let version = r.u8()?;
        let inv_version = r.u8()?;
        if version != !inv_version {
            return Err(EventDescription::DoipVersionMismatch);
        }

        let msg_type = r.u16()?;
        let payload_len = r.u32()?;

        let kind =
            DoipMsgType::from_u16(msg_type).ok_or(EventDescription::DoipUnsupportedMsgType)?;

        let body = match kind {
            DoipMsgType::GenericNack => DoipBody::GenericNack { code: r.u8()? },
            DoipMsgType::VehIdReq => DoipBody::VehIdReq,
            DoipMsgType::VehAnnounce => {
                if r.remaining() < VIN_LEN + 2 + EID_LEN + GID_LEN + 1 {
                    return Err(EventDescription::DoipVehAnnounceTooSmall);
                }
                let mut vin = [0u8; VIN_LEN];
                r.copy(&mut vin)?;
                let logical_addr = r.u16()?;
                let mut eid = [0u8; EID_LEN];
                r.copy(&mut eid)?;
                let mut gid = [0u8; GID_LEN];
                r.copy(&mut gid)?;
                let further_action = r.u8()?;
                DoipBody::VehAnnounce(DoipVehAnnounce {
                    vin,
                    logical_addr,
                    eid,
                    gid,
                    further_action,
                })
            }
            DoipMsgType::RoutingActivationReq => {
                if r.remaining() < 7 {
                    return Err(EventDescription::DoipRouteActivationReqTooSmall);
                }
                DoipBody::RoutingActivationReq(DoipRoutingActivationReq {
                    source_addr: r.u16()?,
                    activation_type: r.u8()?,
                    reserved: r.u32()?,
                })
            }
            DoipMsgType::RoutingActivationResp => DoipBody::RoutingActivationResp {
                tester_addr: r.u16()?,
                entity_addr: r.u16()?,
                code: r.u8()?,
            },
            DoipMsgType::AliveCheckReq => DoipBody::AliveCheckReq,
            DoipMsgType::AliveCheckResp => DoipBody::AliveCheckResp { source_addr: r.u16()? },
            DoipMsgType::EntityStatusReq => DoipBody::EntityStatusReq,
            DoipMsgType::EntityStatusResp => {
                if r.remaining() < 7 {
                    return Err(EventDescription::DoipEntityStatusResponseTooSmall);
                }
                DoipBody::EntityStatusResp(DoipEntityStatus {
                    node_type: r.u8()?,
                    max_open_sockets: r.u8()?,
                    cur_open_sockets: r.u8()?,
                    max_data_size: r.u32()?,
                })
            }
            DoipMsgType::PowerModeInfoReq => DoipBody::PowerModeInfoReq,
            DoipMsgType::PowerModeInfoResp => DoipBody::PowerModeInfoResp { mode: r.u8()? },
            DoipMsgType::DiagMessage => {
                let source_addr = r.u16()?;
                let target_addr = r.u16()?;
                let uds = UdsService::parse(r)?;
                DoipBody::DiagMessage { source_addr, target_addr, uds }
            }
        };

        Ok(Self { version, inv_version, msg_type, payload_len, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    fn hdr(msg_type: u16, payload_len: u32) -> Writer {
        let mut w = Writer::new();
        w.put_u8(0x02);
        w.put_u8(0xFD);
        w.put_u16(msg_type);
        w.put_u32(payload_len);
        w
    }

    #[test]
    fn test_version_complement_enforced() {
        let mut w = Writer::new();
        w.put_u8(0x02);
        w.put_u8(0xFE); // wrong complement
        w.put_u16(0x0001);
        w.put_u32(0);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(DoipHdr::parse(&mut r), Err(EventDescription::DoipVersionMismatch));
    }

    #[test]
    fn test_vehicle_announce() {
        let mut w = hdr(0x0004, 32);
        w.put_slice(b"WAUZZZ8V9FA000001"); // 17-char VIN
        w.put_u16(0x0E80);
        w.put_slice(&[1, 2, 3, 4, 5, 6]);
        w.put_slice(&[7, 8, 9, 10, 11, 12]);
        w.put_u8(0);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = DoipHdr::parse(&mut r).unwrap();
        match h.body {
            DoipBody::VehAnnounce(v) => assert_eq!(v.logical_addr, 0x0E80),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_diag_message_with_uds_session_control() {
        let mut w = hdr(0x8001, 6);
        w.put_u16(0x0E00);
        w.put_u16(0x0E80);
        w.put_u8(0x10);
        w.put_u8(0x03); // extended session
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = DoipHdr::parse(&mut r).unwrap();
        match h.body {
            DoipBody::DiagMessage { uds, .. } => {
                assert_eq!(uds, UdsService::SessionControl { session_type: 3, is_reply: false });
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_unknown_uds_service_rejected() {
        let mut w = hdr(0x8001, 5);
        w.put_u16(0);
        w.put_u16(0);
        w.put_u8(0x22); // read-data-by-id, not decoded
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(DoipHdr::parse(&mut r), Err(EventDescription::UdsUnknownServiceId));
    }
}

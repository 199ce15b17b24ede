use crate::events::EventDescription;
use crate::wire::Reader;

pub const ICMP_HDR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IcmpType {
    EchoReply = 0,
    DestUnreachable = 3,
    SourceQuench = 4,
    Redirect = 5,
    EchoReq = 8,
    TimeExceeded = 11,
    ParameterProblem = 12,
    Ts = 13,
    TsReply = 14,
    InfoReq = 15,
    InfoReply = 16,
}

impl IcmpType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(IcmpType::EchoReply),
            3 => Some(IcmpType::DestUnreachable),
            4 => Some(IcmpType::SourceQuench),
            5 => Some(IcmpType::Redirect),
            8 => Some(IcmpType::EchoReq),
            11 => Some(IcmpType::TimeExceeded),
            12 => Some(IcmpType::ParameterProblem),
            13 => Some(IcmpType::Ts),
            14 => Some(IcmpType::TsReply),
            15 => Some(IcmpType::InfoReq),
            16 => Some(IcmpType::InfoReply),
            _ => None,
        }
    }
}

/// Echo request/reply body. The payload is captured because the covert
/// channel and non-zero payload filters inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpEcho {
    pub id: u16,
    pub seq_no: u16,
    pub data: Vec<u8>,
}

/// Destination-unreachable / time-exceeded / source-quench style body:
/// 4 unused bytes then the leading bytes of the offending datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpErrorBody {
    pub reserved: u32,
    pub original: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpTimestampMsg {
    pub id: u16,
    pub seq_no: u16,
    pub orig_ts: u32,
    pub rx_ts: u32,
    pub tx_ts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpInfoMsg {
    pub id: u16,
    pub seq_no: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpBody {
    EchoReq(IcmpEcho),
    EchoReply(IcmpEcho),
    DestUnreachable(IcmpErrorBody),
    SourceQuench(IcmpErrorBody),
    Redirect { gateway: u32, original: Vec<u8> },
    TimeExceeded(IcmpErrorBody),
    ParameterProblem { pointer: u8, original: Vec<u8> },
    Timestamp(IcmpTimestampMsg),
    TimestampReply(IcmpTimestampMsg),
    InfoReq(IcmpInfoMsg),
    InfoReply(IcmpInfoMsg),
}

/// ICMP header plus the typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpHdr {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub body: IcmpBody,
}

const DEST_UNREACH_CODE_MAX: u8 = 5;
const TIME_EXCEEDED_CODE_MAX: u8 = 1;
const REDIRECT_CODE_MAX: u8 = 3;

impl IcmpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < ICMP_HDR_LEN {
            return Err(EventDescription::IcmpHdrLenTooShort);
        }

        let icmp_type = r.u8()?;
        let code = r.u8()?;
        let checksum = r.u16()?;

        let kind =
            IcmpType::from_u8(icmp_type).ok_or(EventDescription::IcmpInvalidType)?;

        let body = match kind {
            IcmpType::EchoReq => {
                IcmpBody::EchoReq(Self::parse_echo(r, EventDescription::IcmpEchoReqHdrLenTooShort)?)
            }
            IcmpType::EchoReply => IcmpBody::EchoReply(Self::parse_echo(
                r,
                EventDescription::IcmpEchoReplyHdrLenTooShort,
            )?),
            IcmpType::DestUnreachable => {
                if code > DEST_UNREACH_CODE_MAX {
                    return Err(EventDescription::IcmpDestUnreachableInvalidCode);
                }
                IcmpBody::DestUnreachable(Self::parse_error_body(r)?)
            }
            IcmpType::SourceQuench => IcmpBody::SourceQuench(Self::parse_error_body(r)?),
            IcmpType::TimeExceeded => {
                if code > TIME_EXCEEDED_CODE_MAX {
                    return Err(EventDescription::IcmpTimeExceededInvalidCode);
                }
                IcmpBody::TimeExceeded(Self::parse_error_body(r)?)
            }
            IcmpType::Redirect => {
                if code > REDIRECT_CODE_MAX {
                    return Err(EventDescription::IcmpInvalRedirMsgCode);
                }
                let gateway = r.u32()?;
                let original = r.bytes(r.remaining())?.to_vec();
                IcmpBody::Redirect { gateway, original }
            }
            IcmpType::ParameterProblem => {
                let pointer = r.u8()?;
                r.skip(3)?;
                let original = r.bytes(r.remaining())?.to_vec();
                IcmpBody::ParameterProblem { pointer, original }
            }
            IcmpType::Ts => IcmpBody::Timestamp(Self::parse_ts(r)?),
            IcmpType::TsReply => IcmpBody::TimestampReply(Self::parse_ts(r)?),
            IcmpType::InfoReq => IcmpBody::InfoReq(Self::parse_info(r)?),
            IcmpType::InfoReply => IcmpBody::InfoReply(Self::parse_info(r)?),
        };

        Ok(Self { icmp_type, code, checksum, body })
    }

    fn parse_echo(r: &mut Reader, too_short: EventDescription) -> Result<IcmpEcho, EventDescription> {
        if r.remaining() < 4 {
            return Err(too_short);
        }
        let id = r.u16()?;
        let seq_no = r.u16()?;
        let data = r.bytes(r.remaining())?.to_vec();
        Ok(IcmpEcho { id, seq_no, data })
    }

    fn parse_error_body(r: &mut Reader) -> Result<IcmpErrorBody, EventDescription> {
        let reserved = r.u32()?;
        let original = r.bytes(r.remaining())?.to_vec();
        Ok(IcmpErrorBody { reserved, original })
    }

    fn parse_ts(r: &mut Reader) -> Result<IcmpTimestampMsg, EventDescription> {
        if r.remaining() < 16 {
            return Err(EventDescription::IcmpTsMsgHdrLenTooShort);
        }
        Ok(IcmpTimestampMsg {
            id: r.u16()?,
            seq_no: r.u16()?,
            orig_ts: r.u32()?,
            rx_ts: r.u32()?,
            tx_ts: r.u32()?,
        })
    }

    fn parse_info(r: &mut Reader) -> Result<IcmpInfoMsg, EventDescription> {
        if r.remaining() < 4 {
            return Err(EventDescription::IcmpInfoMsgHdrLenTooShort);
        }
        Ok(IcmpInfoMsg { id: r.u16()?, seq_no: r.u16()? })
    }

    pub fn echo_payload_len(&self) -> Option<usize> {
        match &self.body {
            IcmpBody::EchoReq(e) | IcmpBody::EchoReply(e) => Some(e.data.len()),
            _ => None,
        }
    }

    pub fn is_echo_req(&self) -> bool {
        matches!(self.body, IcmpBody::EchoReq(_))
    }

    pub fn is_echo_reply(&self) -> bool {
        matches!(self.body, IcmpBody::EchoReply(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    fn echo_req(payload: &[u8]) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u8(8);
        w.put_u8(0);
        w.put_u16(0);
        w.put_u16(0x1234);
        w.put_u16(1);
        w.put_slice(payload);
        w.into_vec()
    }

    #[test]
    fn test_echo_request_with_payload() {
        let bytes = echo_req(&[0xAB; 56]);
        let mut r = Reader::new(&bytes);
        let h = IcmpHdr::parse(&mut r).unwrap();
        assert!(h.is_echo_req());
        assert_eq!(h.echo_payload_len(), Some(56));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let buf = [99u8, 0, 0, 0];
        let mut r = Reader::new(&buf);
        assert_eq!(IcmpHdr::parse(&mut r), Err(EventDescription::IcmpInvalidType));
    }

    #[test]
    fn test_dest_unreachable_code_range() {
        let mut w = Writer::new();
        w.put_u8(3);
        w.put_u8(6); // out of range
        w.put_u16(0);
        w.put_u32(0);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(
            IcmpHdr::parse(&mut r),
            Err(EventDescription::IcmpDestUnreachableInvalidCode)
        );
    }

    #[test]
    fn test_timestamp_msg() {
        let mut w = Writer::new();
        w.put_u8(13);
        w.put_u8(0);
        w.put_u16(0);
        w.put_u16(7);
        w.put_u16(1);
        w.put_u32(100);
        w.put_u32(0);
        w.put_u32(0);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = IcmpHdr::parse(&mut r).unwrap();
        match h.body {
            IcmpBody::Timestamp(ts) => assert_eq!(ts.orig_ts, 100),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_truncated_echo_rejected() {
        let buf = [8u8, 0, 0, 0, 0x12];
        let mut r = Reader::new(&buf);
        assert_eq!(
            IcmpHdr::parse(&mut r),
            Err(EventDescription::IcmpEchoReqHdrLenTooShort)
        );
    }
}

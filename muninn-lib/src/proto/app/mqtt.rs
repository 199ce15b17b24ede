use crate::events::EventDescription;
use crate::wire::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MqttMsgType {
    Connect = 0x1,
    ConnectAck = 0x2,
    Publish = 0x3,
    SubscribeReq = 0x8,
    SubscribeAck = 0x9,
    PingReq = 0xC,
    PingResp = 0xD,
}

impl MqttMsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x1 => Some(MqttMsgType::Connect),
            0x2 => Some(MqttMsgType::ConnectAck),
            0x3 => Some(MqttMsgType::Publish),
            0x8 => Some(MqttMsgType::SubscribeReq),
            0x9 => Some(MqttMsgType::SubscribeAck),
            0xC => Some(MqttMsgType::PingReq),
            0xD => Some(MqttMsgType::PingResp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConnect {
    pub proto_name: String,
    pub version: u8,
    pub user_name: bool,
    pub password: bool,
    pub will_retain: bool,
    pub qos_level: u8,
    pub will: bool,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPublish {
    pub topic: String,
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSubscribeReq {
    pub msg_id: u16,
    pub topic: String,
    pub requested_qos: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttBody {
    Connect(MqttConnect),
    ConnectAck { return_code: u8 },
    Publish(MqttPublish),
    SubscribeReq(MqttSubscribeReq),
    SubscribeAck { msg_id: u16, granted_qos: u8 },
    PingReq,
    PingResp,
}

/// MQTT 3.1 control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttHdr {
    pub msg_type: MqttMsgType,
    pub dup: bool,
    pub qos_level: u8,
    pub retain: bool,
    pub remaining_len: u32,
    pub body: MqttBody,
}

impl MqttHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < 2 {
            return Err(EventDescription::MqttHdrLenTooShort);
        }

        let byte = r.u8()?;
        let msg_type = MqttMsgType::from_u8((byte & 0xF0) >> 4)
            .ok_or(EventDescription::MqttInvalMsgType)?;
        let dup = byte & 0x08 != 0;
        let qos_level = (byte & 0x06) >> 1;
        let retain = byte & 0x01 != 0;

        let remaining_len = Self::parse_remaining_len(r)?;

        let body = match msg_type {
            MqttMsgType::Connect => MqttBody::Connect(Self::parse_connect(r)?),
            MqttMsgType::ConnectAck => {
                if r.remaining() < 2 {
                    return Err(EventDescription::MqttHdrLenTooShort);
                }
                r.skip(1)?; // ack flags
                MqttBody::ConnectAck { return_code: r.u8()? }
            }
            MqttMsgType::Publish => {
                let topic = Self::parse_utf8(r)?;
                let msg_len = (remaining_len as usize)
                    .saturating_sub(topic.len() + 2)
                    .min(r.remaining());
                let message = r.bytes(msg_len)?.to_vec();
                MqttBody::Publish(MqttPublish { topic, message })
            }
            MqttMsgType::SubscribeReq => {
                let msg_id = r.u16()?;
                let topic = Self::parse_utf8(r)?;
                let requested_qos = r.u8()?;
                MqttBody::SubscribeReq(MqttSubscribeReq { msg_id, topic, requested_qos })
            }
            MqttMsgType::SubscribeAck => {
                let msg_id = r.u16()?;
                let granted_qos = r.u8()?;
                MqttBody::SubscribeAck { msg_id, granted_qos }
            }
            MqttMsgType::PingReq => MqttBody::PingReq,
            MqttMsgType::PingResp => MqttBody::PingResp,
        };

        Ok(Self { msg_type, dup, qos_level, retain, remaining_len, body })
    }

    /// MQTT variable-length "remaining length": 7 bits per byte, msb is the
    /// continuation flag, at most 4 bytes.
    fn parse_remaining_len(r: &mut Reader) -> Result<u32, EventDescription> {
        let mut value: u32 = 0;
        let mut shift = 0u32;
        for _ in 0..4 {
            let byte = r.u8().map_err(|_| EventDescription::MqttHdrLenTooShort)?;
            value |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(EventDescription::MqttHdrLenTooShort)
    }

    fn parse_utf8(r: &mut Reader) -> Result<String, EventDescription> {
        let len = r.u16()? as usize;
        let raw = r.bytes(len).map_err(|_| EventDescription::MqttHdrLenTooShort)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn parse_connect(r: &mut Reader) -> Result<MqttConnect, EventDescription> {
        let proto_name = Self::parse_utf8(r)?;
        let version = r.u8()?;
        let flags = r.u8()?;
        let keep_alive = r.u16()?;
        let client_id = Self::parse_utf8(r)?;

        Ok(MqttConnect {
            proto_name,
            version,
            user_name: flags & 0x80 != 0,
            password: flags & 0x40 != 0,
            will_retain: flags & 0x20 != 0,
            qos_level: (flags & 0x18) >> 3,
            will: flags & 0x04 != 0,
            clean_session: flags & 0x02 != 0,
            keep_alive,
            client_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_connect() {
        let mut w = Writer::new();
        w.put_u8(0x10);
        w.put_u8(18); // remaining length
        w.put_u16(4);
        w.put_slice(b"MQTT");
        w.put_u8(4);
        w.put_u8(0x02); // clean session
        w.put_u16(60);
        w.put_u16(6);
        w.put_slice(b"sensor");
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = MqttHdr::parse(&mut r).unwrap();
        match h.body {
            MqttBody::Connect(c) => {
                assert_eq!(c.proto_name, "MQTT");
                assert!(c.clean_session);
                assert_eq!(c.keep_alive, 60);
                assert_eq!(c.client_id, "sensor");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_publish_topic_and_message() {
        let mut w = Writer::new();
        w.put_u8(0x30);
        w.put_u8(12);
        w.put_u16(5);
        w.put_slice(b"a/b/c");
        w.put_slice(b"hello");
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = MqttHdr::parse(&mut r).unwrap();
        match h.body {
            MqttBody::Publish(p) => {
                assert_eq!(p.topic, "a/b/c");
                assert_eq!(p.message, b"hello");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_multi_byte_remaining_length() {
        let mut w = Writer::new();
        w.put_u8(0xC0); // ping request
        w.put_u8(0x80); // continuation
        w.put_u8(0x01); // value 128
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = MqttHdr::parse(&mut r).unwrap();
        assert_eq!(h.remaining_len, 128);
        assert_eq!(h.body, MqttBody::PingReq);
    }

    #[test]
    fn test_invalid_message_type() {
        let buf = [0xF0u8, 0];
        let mut r = Reader::new(&buf);
        assert_eq!(MqttHdr::parse(&mut r), Err(EventDescription::MqttInvalMsgType));
    }
}

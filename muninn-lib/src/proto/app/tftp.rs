use crate::events::EventDescription;
use crate::wire::Reader;

const TFTP_STRING_MAX: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TftpOpcode {
    ReadReq = 1,
    WriteReq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TftpOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TftpReadReq {
    pub filename: String,
    pub mode: String,
    pub options: Vec<TftpOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpBody {
    ReadReq(TftpReadReq),
    WriteReq(TftpReadReq),
    Data { block: u16 },
    Ack { block: u16 },
    Error { code: u16, message: String },
}

/// TFTP message; read/write requests carry NUL-terminated filename and
/// transfer mode followed by option pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TftpHdr {
    pub opcode: u16,
    pub body: TftpBody,
}

fn parse_cstring(r: &mut Reader) -> Result<String, EventDescription> {
    let mut out = Vec::new();
    loop {
        let byte = r.u8().map_err(|_| EventDescription::TftpFilenameTooLong)?;
        if byte == 0 {
            break;
        }
        out.push(byte);
        if out.len() >= TFTP_STRING_MAX {
            return Err(EventDescription::TftpFilenameTooLong);
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn parse_request(r: &mut Reader) -> Result<TftpReadReq, EventDescription> {
    let filename = parse_cstring(r)?;
    let mode = parse_cstring(r)?;
    let mut options = Vec::new();
    while r.remaining() > 0 {
        let name = parse_cstring(r)?;
        let value = parse_cstring(r)?;
        options.push(TftpOption { name, value });
    }
    Ok(TftpReadReq { filename, mode, options })
}

impl TftpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        let opcode = r.u16().map_err(|_| EventDescription::TftpInvalOpcode)?;

        let body = match opcode {
            op if op == TftpOpcode::ReadReq as u16 => TftpBody::ReadReq(parse_request(r)?),
            op if op == TftpOpcode::WriteReq as u16 => TftpBody::WriteReq(parse_request(r)?),
            op if op == TftpOpcode::Data as u16 => TftpBody::Data { block: r.u16()? },
            op if op == TftpOpcode::Ack as u16 => TftpBody::Ack { block: r.u16()? },
            op if op == TftpOpcode::Error as u16 => {
                let code = r.u16()?;
                let message = parse_cstring(r)?;
                TftpBody::Error { code, message }
            }
            _ => return Err(EventDescription::TftpInvalOpcode),
        };

        Ok(Self { opcode, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Reader, Writer};

    #[test]
    fn test_read_request_with_options() {
        let mut w = Writer::new();
        w.put_u16(1);
        w.put_slice(b"firmware.bin\0");
        w.put_slice(b"octet\0");
        w.put_slice(b"blksize\0");
        w.put_slice(b"1428\0");
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let h = TftpHdr::parse(&mut r).unwrap();
        match h.body {
            TftpBody::ReadReq(req) => {
                assert_eq!(req.filename, "firmware.bin");
                assert_eq!(req.mode, "octet");
                assert_eq!(req.options.len(), 1);
                assert_eq!(req.options[0].name, "blksize");
                assert_eq!(req.options[0].value, "1428");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_filename_rejected() {
        let mut w = Writer::new();
        w.put_u16(1);
        w.put_slice(b"no-terminator");
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(TftpHdr::parse(&mut r), Err(EventDescription::TftpFilenameTooLong));
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let buf = [0u8, 9, 0, 0];
        let mut r = Reader::new(&buf);
        assert_eq!(TftpHdr::parse(&mut r), Err(EventDescription::TftpInvalOpcode));
    }
}

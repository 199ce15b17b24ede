use crate::events::EventDescription;
use crate::wire::Reader;

pub const TCP_HDR_LEN_MIN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum TcpOptKind {
    Eol = 0,
    Nop = 1,
    Mss = 2,
    WinScale = 3,
    SackPermitted = 4,
    Timestamp = 8,
}

/// TCP flag bits as they sit on the wire (low byte of the 13th/14th octets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl TcpFlags {
    fn from_byte(b: u8) -> Self {
        Self {
            cwr: b & 0x80 != 0,
            ece: b & 0x40 != 0,
            urg: b & 0x20 != 0,
            ack: b & 0x10 != 0,
            psh: b & 0x08 != 0,
            rst: b & 0x04 != 0,
            syn: b & 0x02 != 0,
            fin: b & 0x01 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut b = 0u8;
        if self.cwr {
            b |= 0x80;
        }
        if self.ece {
            b |= 0x40;
        }
        if self.urg {
            b |= 0x20;
        }
        if self.ack {
            b |= 0x10;
        }
        if self.psh {
            b |= 0x08;
        }
        if self.rst {
            b |= 0x04;
        }
        if self.syn {
            b |= 0x02;
        }
        if self.fin {
            b |= 0x01;
        }
        b
    }

    fn none_set(&self) -> bool {
        self.to_byte() == 0
    }

    fn all_set(&self) -> bool {
        self.to_byte() == 0xFF
    }
}

/// TCP option TLVs. Each of MSS, SACK-permitted, timestamp and window scale
/// may appear at most once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TcpOptions {
    pub mss: Option<u16>,
    pub sack_permitted: bool,
    pub ts_val: Option<u32>,
    pub ts_ecr: Option<u32>,
    pub win_scale: Option<u8>,
}

impl TcpOptions {
    fn parse(r: &mut Reader, opt_len: usize) -> Result<Self, EventDescription> {
        let mut opts = TcpOptions::default();
        let end = r.offset() + opt_len;

        while r.offset() < end {
            let kind = r.u8()?;
            match kind {
                k if k == TcpOptKind::Eol as u8 => break,
                k if k == TcpOptKind::Nop as u8 => continue,
                k if k == TcpOptKind::Mss as u8 => {
                    let len = r.u8()?;
                    if len != 4 {
                        return Err(EventDescription::TcpInvalidOption);
                    }
                    if opts.mss.is_some() {
                        return Err(EventDescription::TcpOptMssRepeated);
                    }
                    opts.mss = Some(r.u16()?);
                }
                k if k == TcpOptKind::WinScale as u8 => {
                    let len = r.u8()?;
                    if len != 3 {
                        return Err(EventDescription::TcpOptWinScaleInvalLen);
                    }
                    if opts.win_scale.is_some() {
                        return Err(EventDescription::TcpOptWinScaleRepeated);
                    }
                    opts.win_scale = Some(r.u8()?);
                }
                k if k == TcpOptKind::SackPermitted as u8 => {
                    let len = r.u8()?;
                    if len != 2 {
                        return Err(EventDescription::TcpInvalidOption);
                    }
                    if opts.sack_permitted {
                        return Err(EventDescription::TcpOptSackPermittedRepeated);
                    }
                    opts.sack_permitted = true;
                }
                k if k == TcpOptKind::Timestamp as u8 => {
                    let len = r.u8()?;
                    if len != 10 {
                        return Err(EventDescription::TcpOptTsInvalLen);
                    }
                    if opts.ts_val.is_some() {
                        return Err(EventDescription::TcpOptTsRepeated);
                    }
                    opts.ts_val = Some(r.u32()?);
                    opts.ts_ecr = Some(r.u32()?);
                }
                _ => return Err(EventDescription::TcpInvalidOption),
            }
        }

        if r.offset() < end {
            r.skip(end - r.offset())?;
        }

        Ok(opts)
    }
}

/// TCP segment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHdr {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_no: u32,
    pub ack_no: u32,
    /// header length in bytes (data offset * 4)
    pub hdr_len: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urg_ptr: u16,
    pub options: TcpOptions,
    /// bytes of segment payload left in the frame after the header
    pub data_len: u16,
}

impl TcpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < TCP_HDR_LEN_MIN {
            return Err(EventDescription::TcpHdrLenTooShort);
        }

        let src_port = r.u16()?;
        if src_port == 0 {
            return Err(EventDescription::TcpSrcPortZero);
        }
        let dst_port = r.u16()?;
        if dst_port == 0 {
            return Err(EventDescription::TcpDstPortZero);
        }
        let seq_no = r.u32()?;
        let ack_no = r.u32()?;

        let off_byte = r.u8()?;
        let hdr_len = ((off_byte & 0xF0) >> 4) * 4;
        if (hdr_len as usize) < TCP_HDR_LEN_MIN {
            return Err(EventDescription::TcpHdrLenTooShort);
        }

        let flags = TcpFlags::from_byte(r.u8()?);
        if flags.none_set() {
            return Err(EventDescription::TcpFlagsNoneSet);
        }
        if flags.all_set() {
            return Err(EventDescription::TcpFlagsAllSet);
        }
        if flags.syn && flags.fin {
            return Err(EventDescription::TcpFlagsSynFinSet);
        }

        let window = r.u16()?;
        let checksum = r.u16()?;
        let urg_ptr = r.u16()?;

        let options = if hdr_len as usize > TCP_HDR_LEN_MIN {
            TcpOptions::parse(r, hdr_len as usize - TCP_HDR_LEN_MIN)?
        } else {
            TcpOptions::default()
        };

        let data_len = r.remaining().min(u16::MAX as usize) as u16;

        Ok(Self {
            src_port,
            dst_port,
            seq_no,
            ack_no,
            hdr_len,
            flags,
            window,
            checksum,
            urg_ptr,
            options,
            data_len,
        })
    }
}

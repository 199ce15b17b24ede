use super::ipv6::Ipv6Hdr;
use crate::events::EventDescription;
use crate::proto::IpProtocol;
use crate::wire::{Reader, Writer};

pub const IPV4_VERSION: u8 = 4;
pub const IPV4_HDR_NO_OPTIONS: usize = 20;
pub const IPV4_HDR_LEN_MAX: usize = 60;

/// One's complement sum over a header slice. Verification holds when the
/// folded sum (checksum field included) is 0xFFFF.
pub fn checksum_fold(hdr: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = hdr.chunks_exact(2);
    for c in &mut chunks {
        sum += u32::from(u16::from_be_bytes([c[0], c[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Compute the header checksum of a serialized header whose checksum field
/// is zero.
pub fn checksum_compute(hdr: &[u8]) -> u16 {
    !checksum_fold(hdr)
}

pub fn checksum_verify(hdr: &[u8]) -> bool {
    checksum_fold(hdr) == 0xFFFF
}

pub fn is_broadcast(addr: u32) -> bool {
    addr == 0xFFFF_FFFF
}

pub fn is_multicast(addr: u32) -> bool {
    addr >> 28 == 0xE
}

pub fn is_reserved(addr: u32) -> bool {
    addr >> 28 == 0xF && !is_broadcast(addr)
}

pub fn is_loopback(addr: u32) -> bool {
    addr >> 24 == 127
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Ipv4Opt {
    EndOfOptions = 0,
    Nop = 1,
    LooseSourceRoute = 3,
    Timestamp = 4,
    CommercialSecurity = 6,
    StrictSourceRoute = 9,
    RouterAlert = 20,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4OptRouterAlert {
    pub copy_on_frag: bool,
    pub class: u8,
    pub len: u8,
    pub value: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4TsEntry {
    pub ts: u32,
    pub addr: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4OptTimestamp {
    pub copy_on_frag: bool,
    pub class: u8,
    pub len: u8,
    pub ptr: u8,
    pub overflow: u8,
    pub flag: u8,
    pub entries: Vec<Ipv4TsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4OptSourceRoute {
    pub copy_on_frag: bool,
    pub class: u8,
    pub len: u8,
    pub pointer: u8,
    pub route: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4OptCommSec {
    pub copy_on_frag: bool,
    pub class: u8,
    pub len: u8,
}

/// Parsed IPv4 option TLVs. Each recognized option is owned by the header;
/// NOP and End leave no trace beyond consumed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ipv4Options {
    pub router_alert: Option<Ipv4OptRouterAlert>,
    pub timestamp: Option<Ipv4OptTimestamp>,
    pub loose_source_route: Option<Ipv4OptSourceRoute>,
    pub strict_source_route: Option<Ipv4OptSourceRoute>,
    pub comm_sec: Option<Ipv4OptCommSec>,
}

impl Ipv4Options {
    pub fn any_present(&self) -> bool {
        self.router_alert.is_some()
            || self.timestamp.is_some()
            || self.loose_source_route.is_some()
            || self.strict_source_route.is_some()
            || self.comm_sec.is_some()
    }

    fn parse(r: &mut Reader, opt_len: usize) -> Result<Self, EventDescription> {
        let mut opts = Ipv4Options::default();
        let end = r.offset() + opt_len;

        while r.offset() < end {
            let val = r.u8()?;
            let copy_on_frag = val & 0x80 != 0;
            let class = (val & 0x60) >> 5;
            let number = val & 0x1F;

            match number {
                n if n == Ipv4Opt::EndOfOptions as u8 => break,
                n if n == Ipv4Opt::Nop as u8 => continue,
                n if n == Ipv4Opt::RouterAlert as u8 => {
                    let len = r.u8()?;
                    let value = r.u16()?;
                    opts.router_alert = Some(Ipv4OptRouterAlert { copy_on_frag, class, len, value });
                }
                n if n == Ipv4Opt::Timestamp as u8 => {
                    opts.timestamp = Some(Self::parse_timestamp(r, copy_on_frag, class)?);
                }
                n if n == Ipv4Opt::LooseSourceRoute as u8 => {
                    opts.loose_source_route = Some(Self::parse_route(r, copy_on_frag, class)?);
                }
                n if n == Ipv4Opt::StrictSourceRoute as u8 => {
                    opts.strict_source_route = Some(Self::parse_route(r, copy_on_frag, class)?);
                }
                n if n == Ipv4Opt::CommercialSecurity as u8 => {
                    let len = r.u8()?;
                    // opaque body: doi, tags
                    r.skip((len as usize).saturating_sub(2))
                        .map_err(|_| EventDescription::Ipv4UnknownOpt)?;
                    opts.comm_sec = Some(Ipv4OptCommSec { copy_on_frag, class, len });
                }
                _ => return Err(EventDescription::Ipv4UnknownOpt),
            }
        }

        // an option whose length field reaches past the header region is
        // malformed
        if r.offset() > end {
            return Err(EventDescription::Ipv4UnknownOpt);
        }
        // the remaining bytes up to the header end are padding
        if r.offset() < end {
            r.skip(end - r.offset())?;
        }

        Ok(opts)
    }

    fn parse_timestamp(
        r: &mut Reader,
        copy_on_frag: bool,
        class: u8,
    ) -> Result<Ipv4OptTimestamp, EventDescription> {
        const FLAG_TS_ONLY: u8 = 0;
        const FLAG_TS_AND_ADDR: u8 = 1;

        let len = r.u8()?;
        let ptr = r.u8()?;
        let byte = r.u8()?;
        let overflow = (byte & 0xF0) >> 4;
        let flag = byte & 0x0F;

        let mut entries = Vec::new();
        let mut parsed = 4usize;
        while parsed < len as usize {
            match flag {
                FLAG_TS_ONLY => {
                    if parsed + 4 > len as usize {
                        return Err(EventDescription::Ipv4OptTsInvalLen);
                    }
                    entries.push(Ipv4TsEntry { ts: r.u32()?, addr: None });
                    parsed += 4;
                }
                FLAG_TS_AND_ADDR => {
                    if parsed + 8 > len as usize {
                        return Err(EventDescription::Ipv4OptTsInvalLen);
                    }
                    let addr = r.u32()?;
                    let ts = r.u32()?;
                    entries.push(Ipv4TsEntry { ts, addr: Some(addr) });
                    parsed += 8;
                }
                _ => return Err(EventDescription::Ipv4OptTsInvalLen),
            }
        }

        Ok(Ipv4OptTimestamp { copy_on_frag, class, len, ptr, overflow, flag, entries })
    }

    fn parse_route(
        r: &mut Reader,
        copy_on_frag: bool,
        class: u8,
    ) -> Result<Ipv4OptSourceRoute, EventDescription> {
        let len = r.u8()?;
        if len < 3 || r.remaining() + 2 < len as usize {
            return Err(EventDescription::Ipv4StrictSourceRouteLenTruncated);
        }
        let pointer = r.u8()?;

        let mut route = Vec::new();
        let mut parsed = 3usize;
        while parsed + 4 <= len as usize {
            route.push(r.u32()?);
            parsed += 4;
        }
        // a malformed length that is not a multiple of 4 leaves a stub
        if parsed < len as usize {
            r.skip(len as usize - parsed)?;
        }

        Ok(Ipv4OptSourceRoute { copy_on_frag, class, len, pointer, route })
    }
}

/// IPv4 header with options and recursive tunnel payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Hdr {
    pub version: u8,
    pub hdr_len: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_len: u16,
    pub identification: u16,
    pub dont_frag: bool,
    pub more_frag: bool,
    pub frag_off: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub hdr_chksum: u16,
    pub src_addr: u32,
    pub dst_addr: u32,
    pub options: Ipv4Options,
    /// protocol 4: IP-in-IP tunnel payload
    pub ipip: Option<Box<Ipv4Hdr>>,
    /// protocol 41: 6in4 tunnel payload
    pub ipv6_in_ipv4: Option<Box<Ipv6Hdr>>,
}

impl Ipv4Hdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < IPV4_HDR_NO_OPTIONS {
            return Err(EventDescription::Ipv4HdrLenTooSmall);
        }

        let start = r.offset();
        let byte = r.u8()?;
        let version = (byte & 0xF0) >> 4;
        if version != IPV4_VERSION {
            return Err(EventDescription::Ipv4VersionInvalid);
        }
        let hdr_len = (byte & 0x0F) * 4;
        if (hdr_len as usize) < IPV4_HDR_NO_OPTIONS {
            return Err(EventDescription::Ipv4HdrLenTooSmall);
        }
        if hdr_len as usize > IPV4_HDR_LEN_MAX {
            return Err(EventDescription::Ipv4HdrLenTooBig);
        }

        let byte = r.u8()?;
        let dscp = (byte & 0xFC) >> 2;
        let ecn = byte & 0x03;

        let total_len = r.u16()?;
        if total_len < hdr_len as u16 {
            return Err(EventDescription::Ipv4TotalLenSmallerThanHdrLen);
        }

        let identification = r.u16()?;

        let flags_frag = r.u16()?;
        if flags_frag & 0x8000 != 0 {
            return Err(EventDescription::Ipv4ReservedSet);
        }
        let dont_frag = flags_frag & 0x4000 != 0;
        let more_frag = flags_frag & 0x2000 != 0;
        if dont_frag && more_frag {
            return Err(EventDescription::Ipv4FlagsInvalid);
        }
        let frag_off = flags_frag & 0x1FFF;

        let ttl = r.u8()?;
        if ttl == 0 {
            return Err(EventDescription::Ipv4ZeroTtl);
        }

        let protocol = r.u8()?;
        let hdr_chksum = r.u16()?;
        let src_addr = r.u32()?;
        let dst_addr = r.u32()?;

        if src_addr == dst_addr && !(is_loopback(src_addr) && is_loopback(dst_addr)) {
            return Err(EventDescription::Ipv4SrcAndDstAddrSame);
        }
        if is_broadcast(src_addr) {
            return Err(EventDescription::Ipv4SrcIsBroadcast);
        }
        if is_multicast(src_addr) {
            return Err(EventDescription::Ipv4SrcIsMulticast);
        }
        if is_reserved(src_addr) {
            return Err(EventDescription::Ipv4SrcIsReserved);
        }
        if is_reserved(dst_addr) {
            return Err(EventDescription::Ipv4DstIsReserved);
        }

        let options = if hdr_len as usize > IPV4_HDR_NO_OPTIONS {
            Ipv4Options::parse(r, hdr_len as usize - IPV4_HDR_NO_OPTIONS)?
        } else {
            Ipv4Options::default()
        };

        if r.remaining() < (total_len as usize).saturating_sub(hdr_len as usize) {
            return Err(EventDescription::Ipv4InvalidTotalLen);
        }

        if !checksum_verify(&r.as_slice()[start..start + hdr_len as usize]) {
            return Err(EventDescription::Ipv4HdrChksumInvalid);
        }

        let mut hdr = Self {
            version,
            hdr_len,
            dscp,
            ecn,
            total_len,
            identification,
            dont_frag,
            more_frag,
            frag_off,
            ttl,
            protocol,
            hdr_chksum,
            src_addr,
            dst_addr,
            options,
            ipip: None,
            ipv6_in_ipv4: None,
        };

        // tunneled payloads are parsed recursively; ownership stays
        // strictly parent -> child
        match IpProtocol::from_u8(protocol) {
            Some(IpProtocol::IpIp) => {
                hdr.ipip = Some(Box::new(Ipv4Hdr::parse(r)?));
            }
            Some(IpProtocol::Ipv6Encap) => {
                hdr.ipv6_in_ipv4 = Some(Box::new(Ipv6Hdr::parse(r)?));
            }
            _ => {}
        }

        Ok(hdr)
    }

    /// Serialize a header without options; the checksum is computed over the
    /// written bytes and patched in.
    pub fn serialize(&self, w: &mut Writer) {
        let start = w.len();
        w.put_u8((self.version << 4) | (IPV4_HDR_NO_OPTIONS as u8 / 4));
        w.put_u8((self.dscp << 2) | self.ecn);
        w.put_u16(self.total_len);
        w.put_u16(self.identification);
        let mut flags_frag = self.frag_off & 0x1FFF;
        if self.dont_frag {
            flags_frag |= 0x4000;
        }
        if self.more_frag {
            flags_frag |= 0x2000;
        }
        w.put_u16(flags_frag);
        w.put_u8(self.ttl);
        w.put_u8(self.protocol);
        let chksum_off = w.len();
        w.put_u16(0);
        w.put_u32(self.src_addr);
        w.put_u32(self.dst_addr);

        let chksum = checksum_compute(&w.as_slice()[start..]);
        w.patch_u16(chksum_off, chksum);
    }

    pub fn is_a_frag(&self) -> bool {
        self.more_frag || self.frag_off != 0
    }

    /// The upper-layer protocol after following tunnels.
    pub fn effective_protocol(&self) -> u8 {
        if let Some(inner) = &self.ipip {
            return inner.effective_protocol();
        }
        if let Some(inner) = &self.ipv6_in_ipv4 {
            return inner.effective_next_header();
        }
        self.protocol
    }

    pub fn is_dst_multicast(&self) -> bool {
        is_multicast(self.dst_addr)
    }

    pub fn is_dst_broadcast(&self) -> bool {
        is_broadcast(self.dst_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Reader;

    fn sample() -> Ipv4Hdr {
        Ipv4Hdr {
            version: 4,
            hdr_len: 20,
            dscp: 0,
            ecn: 0,
            total_len: 84,
            identification: 0x1c46,
            dont_frag: true,
            more_frag: false,
            frag_off: 0,
            ttl: 64,
            protocol: 1,
            hdr_chksum: 0,
            src_addr: 0xC0A80101,
            dst_addr: 0xC0A80102,
            options: Ipv4Options::default(),
            ipip: None,
            ipv6_in_ipv4: None,
        }
    }

    fn serialize_with_payload(hdr: &Ipv4Hdr) -> Vec<u8> {
        let mut w = Writer::new();
        hdr.serialize(&mut w);
        let payload = (hdr.total_len as usize).saturating_sub(hdr.hdr_len as usize);
        w.put_slice(&vec![0u8; payload]);
        w.into_vec()
    }

    #[test]
    fn test_round_trip_no_options() {
        let hdr = sample();
        let bytes = serialize_with_payload(&hdr);
        let mut r = Reader::new(&bytes);
        let parsed = Ipv4Hdr::parse(&mut r).unwrap();
        assert_eq!(parsed.src_addr, hdr.src_addr);
        assert_eq!(parsed.ttl, 64);
        assert_eq!(parsed.total_len, 84);
        assert!(checksum_verify(&bytes[..20]));
    }

    #[test]
    fn test_checksum_generate_then_verify() {
        for ttl in [1u8, 63, 64, 128, 255] {
            let mut hdr = sample();
            hdr.ttl = ttl;
            let bytes = serialize_with_payload(&hdr);
            assert!(checksum_verify(&bytes[..20]), "ttl {ttl}");
        }
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let bytes = {
            let mut b = serialize_with_payload(&sample());
            b[10] ^= 0xFF;
            b
        };
        let mut r = Reader::new(&bytes);
        assert_eq!(Ipv4Hdr::parse(&mut r), Err(EventDescription::Ipv4HdrChksumInvalid));
    }

    #[test]
    fn test_total_len_smaller_than_hdr_len() {
        let mut hdr = sample();
        hdr.total_len = 4;
        let bytes = serialize_with_payload(&hdr);
        let mut r = Reader::new(&bytes);
        assert_eq!(
            Ipv4Hdr::parse(&mut r),
            Err(EventDescription::Ipv4TotalLenSmallerThanHdrLen)
        );
    }

    #[test]
    fn test_df_mf_exclusive() {
        let mut hdr = sample();
        hdr.dont_frag = true;
        hdr.more_frag = true;
        let bytes = serialize_with_payload(&hdr);
        let mut r = Reader::new(&bytes);
        assert_eq!(Ipv4Hdr::parse(&mut r), Err(EventDescription::Ipv4FlagsInvalid));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut hdr = sample();
        hdr.ttl = 0;
        let bytes = serialize_with_payload(&hdr);
        let mut r = Reader::new(&bytes);
        assert_eq!(Ipv4Hdr::parse(&mut r), Err(EventDescription::Ipv4ZeroTtl));
    }

    #[test]
    fn test_src_multicast_rejected() {
        let mut hdr = sample();
        hdr.src_addr = 0xE0000001;
        let bytes = serialize_with_payload(&hdr);
        let mut r = Reader::new(&bytes);
        assert_eq!(Ipv4Hdr::parse(&mut r), Err(EventDescription::Ipv4SrcIsMulticast));
    }

    #[test]
    fn test_max_header_all_nop_options() {
        // ihl 15 = 60 bytes, the 40 option bytes are all NOP
        let mut w = Writer::new();
        w.put_u8(0x4F);
        w.put_u8(0);
        w.put_u16(60);
        w.put_u16(1);
        w.put_u16(0);
        w.put_u8(64);
        w.put_u8(6);
        let chksum_off = w.len();
        w.put_u16(0);
        w.put_u32(0x0A000001);
        w.put_u32(0x0A000002);
        w.put_slice(&[1u8; 40]);
        let chksum = checksum_compute(w.as_slice());
        w.patch_u16(chksum_off, chksum);
        let bytes = w.into_vec();

        let mut r = Reader::new(&bytes);
        let hdr = Ipv4Hdr::parse(&mut r).unwrap();
        assert_eq!(hdr.hdr_len, 60);
        assert!(!hdr.options.any_present());
        assert_eq!(r.offset(), 60);
    }

    #[test]
    fn test_router_alert_option() {
        let mut w = Writer::new();
        w.put_u8(0x46); // ihl 6 = 24 bytes
        w.put_u8(0);
        w.put_u16(24);
        w.put_u16(1);
        w.put_u16(0);
        w.put_u8(64);
        w.put_u8(2);
        let chksum_off = w.len();
        w.put_u16(0);
        w.put_u32(0x0A000001);
        w.put_u32(0xE0000016); // multicast dst is fine; src rules only
        w.put_u8(0x94); // copy=1, class=0, number=20
        w.put_u8(4);
        w.put_u16(0);
        let chksum = checksum_compute(w.as_slice());
        w.patch_u16(chksum_off, chksum);
        let bytes = w.into_vec();

        let mut r = Reader::new(&bytes);
        let hdr = Ipv4Hdr::parse(&mut r).unwrap();
        let ra = hdr.options.router_alert.unwrap();
        assert_eq!(ra.len, 4);
        assert_eq!(ra.value, 0);
        assert!(ra.copy_on_frag);
    }
}

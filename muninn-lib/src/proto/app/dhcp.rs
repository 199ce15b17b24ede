use crate::events::EventDescription;
use crate::wire::Reader;

/// BOOTP fixed part up to and including the magic cookie.
const DHCP_FIXED_LEN: usize = 240;
const DHCP_MAGIC: [u8; 4] = *b"DHCP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DhcpOptCode {
    Pad = 0,
    SubnetMask = 1,
    HostName = 12,
    ReqIpAddr = 50,
    LeaseTime = 51,
    MsgType = 53,
    ServerId = 54,
    ParamReqList = 55,
    RenewalTime = 58,
    RebindingTime = 59,
    ClientId = 61,
    End = 255,
}

/// Recognized DHCP options; unrecognized codes are skipped by length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DhcpOptions {
    pub msg_type: Option<u8>,
    pub requested_ip: Option<u32>,
    pub hostname: Option<String>,
    pub param_req_list: Vec<u8>,
    pub subnet_mask: Option<u32>,
    pub lease_time: Option<u32>,
    pub renewal_time: Option<u32>,
    pub rebinding_time: Option<u32>,
    pub server_id: Option<u32>,
    pub client_id: Vec<u8>,
}

/// DHCP message: BOOTP fixed header, magic cookie, option TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpHdr {
    pub op: u8,
    pub hw_type: u8,
    pub hw_addr_len: u8,
    pub hops: u8,
    pub transaction_id: u32,
    pub secs_elapsed: u16,
    pub broadcast: bool,
    pub client_ipaddr: u32,
    pub your_ipaddr: u32,
    pub next_server_ipaddr: u32,
    pub relay_agent_ipaddr: u32,
    pub client_macaddr: [u8; 6],
    pub server_hostname: [u8; 64],
    pub bootfilename: [u8; 128],
    pub options: DhcpOptions,
}

impl DhcpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < DHCP_FIXED_LEN {
            return Err(EventDescription::DhcpHdrLenTooShort);
        }

        let op = r.u8()?;
        let hw_type = r.u8()?;
        let hw_addr_len = r.u8()?;
        let hops = r.u8()?;
        let transaction_id = r.u32()?;
        let secs_elapsed = r.u16()?;
        let flags = r.u16()?;
        let broadcast = flags & 0x8000 != 0;
        let client_ipaddr = r.u32()?;
        let your_ipaddr = r.u32()?;
        let next_server_ipaddr = r.u32()?;
        let relay_agent_ipaddr = r.u32()?;
        let client_macaddr = r.mac()?;
        r.skip(10)?; // hw addr padding
        let mut server_hostname = [0u8; 64];
        r.copy(&mut server_hostname)?;
        let mut bootfilename = [0u8; 128];
        r.copy(&mut bootfilename)?;

        let mut magic = [0u8; 4];
        r.copy(&mut magic)?;
        if magic != DHCP_MAGIC {
            return Err(EventDescription::DhcpMagicInvalid);
        }

        let options = Self::parse_options(r)?;

        Ok(Self {
            op,
            hw_type,
            hw_addr_len,
            hops,
            transaction_id,
            secs_elapsed,
            broadcast,
            client_ipaddr,
            your_ipaddr,
            next_server_ipaddr,
            relay_agent_ipaddr,
            client_macaddr,
            server_hostname,
            bootfilename,
            options,
        })
    }

    fn parse_options(r: &mut Reader) -> Result<DhcpOptions, EventDescription> {
        let mut opts = DhcpOptions::default();

        while r.remaining() > 0 {
            let code = r.u8()?;
            if code == DhcpOptCode::End as u8 {
                break;
            }
            if code == DhcpOptCode::Pad as u8 {
                continue;
            }
            let len = r.u8()?;

            match code {
                c if c == DhcpOptCode::MsgType as u8 => {
                    if len != 1 {
                        return Err(EventDescription::DhcpOptClientIdLenInval);
                    }
                    opts.msg_type = Some(r.u8()?);
                }
                c if c == DhcpOptCode::ReqIpAddr as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptClientIdLenInval);
                    }
                    opts.requested_ip = Some(r.u32()?);
                }
                c if c == DhcpOptCode::HostName as u8 => {
                    let raw = r.bytes(len as usize)?;
                    opts.hostname = Some(String::from_utf8_lossy(raw).into_owned());
                }
                c if c == DhcpOptCode::ParamReqList as u8 => {
                    opts.param_req_list = r.bytes(len as usize)?.to_vec();
                }
                c if c == DhcpOptCode::SubnetMask as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptSubnetMaskLenInval);
                    }
                    opts.subnet_mask = Some(r.u32()?);
                }
                c if c == DhcpOptCode::LeaseTime as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptIpaddrLeaseTimeLenInval);
                    }
                    opts.lease_time = Some(r.u32()?);
                }
                c if c == DhcpOptCode::RenewalTime as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptRenewalTimeLenInval);
                    }
                    opts.renewal_time = Some(r.u32()?);
                }
                c if c == DhcpOptCode::RebindingTime as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptRebindingTimeLenInval);
                    }
                    opts.rebinding_time = Some(r.u32()?);
                }
                c if c == DhcpOptCode::ServerId as u8 => {
                    if len != 4 {
                        return Err(EventDescription::DhcpOptServerIdLenInval);
                    }
                    opts.server_id = Some(r.u32()?);
                }
                c if c == DhcpOptCode::ClientId as u8 => {
                    if len < 2 {
                        return Err(EventDescription::DhcpOptClientIdLenInval);
                    }
                    opts.client_id = r.bytes(len as usize)?.to_vec();
                }
                _ => {
                    r.skip(len as usize)?;
                }
            }
        }

        Ok(opts)
    }
}

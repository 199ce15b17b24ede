use crate::events::EventDescription;
use crate::wire::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IgmpType {
    MembershipQuery = 0x11,
    LeaveGroup = 0x17,
    MembershipReportV3 = 0x22,
}

/// IGMPv3 group record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpGroupRecord {
    pub record_type: u8,
    pub aux_data_len: u8,
    pub mcast_addr: u32,
    pub sources: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgmpBody {
    Query {
        max_resp_code: u8,
        group_addr: u32,
        /// v3 extension fields when present
        sources: Vec<u32>,
    },
    Leave {
        group_addr: u32,
    },
    ReportV3 {
        records: Vec<IgmpGroupRecord>,
    },
}

/// IGMP header (v3 queries/reports plus leave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpHdr {
    pub igmp_type: u8,
    pub checksum: u16,
    pub body: IgmpBody,
}

impl IgmpHdr {
    pub fn parse(r: &mut Reader) -> Result<Self, EventDescription> {
        if r.remaining() < 8 {
            return Err(EventDescription::IgmpInvalRecordLen);
        }

        let igmp_type = r.u8()?;
        match igmp_type {
            t if t == IgmpType::MembershipQuery as u8 => {
                let max_resp_code = r.u8()?;
                let checksum = r.u16()?;
                let group_addr = r.u32()?;
                // v3 queries append S/QRV, QQIC and a source list
                let mut sources = Vec::new();
                if r.remaining() >= 4 {
                    r.skip(2)?; // s_qrv + qqic
                    let n = r.u16()?;
                    for _ in 0..n {
                        if r.remaining() < 4 {
                            return Err(EventDescription::IgmpInvalRecordLen);
                        }
                        sources.push(r.u32()?);
                    }
                }
                Ok(Self {
                    igmp_type,
                    checksum,
                    body: IgmpBody::Query { max_resp_code, group_addr, sources },
                })
            }
            t if t == IgmpType::LeaveGroup as u8 => {
                r.skip(1)?;
                let checksum = r.u16()?;
                let group_addr = r.u32()?;
                Ok(Self { igmp_type, checksum, body: IgmpBody::Leave { group_addr } })
            }
            t if t == IgmpType::MembershipReportV3 as u8 => {
                r.skip(1)?;
                let checksum = r.u16()?;
                r.skip(2)?; // reserved
                let n_records = r.u16()?;
                let mut records = Vec::new();
                for _ in 0..n_records {
                    if r.remaining() < 8 {
                        return Err(EventDescription::IgmpInvalRecordLen);
                    }
                    let record_type = r.u8()?;
                    let aux_data_len = r.u8()?;
                    let n_sources = r.u16()?;
                    let mcast_addr = r.u32()?;
                    let mut sources = Vec::new();
                    for _ in 0..n_sources {
                        if r.remaining() < 4 {
                            return Err(EventDescription::IgmpInvalRecordLen);
                        }
                        sources.push(r.u32()?);
                    }
                    r.skip(aux_data_len as usize * 4)
                        .map_err(|_| EventDescription::IgmpInvalRecordLen)?;
                    records.push(IgmpGroupRecord { record_type, aux_data_len, mcast_addr, sources });
                }
                Ok(Self { igmp_type, checksum, body: IgmpBody::ReportV3 { records } })
            }
            _ => Err(EventDescription::IgmpUnsupportedType),
        }
    }
}

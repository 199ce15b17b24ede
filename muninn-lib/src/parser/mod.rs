//! Per-frame parser: drives the protocol decoders by dispatching on the
//! previously decoded ethertype, IP protocol and destination port.
//!
//! One `Parser` is built per frame and discarded after event emission. On
//! the first decoder failure it submits a deny event carrying the failing
//! description and whatever headers decoded up to that point.

use tracing::trace;

use crate::capture::Packet;
use crate::events::{Event, EventDescription, EventSink, EventType};
use crate::proto::l2::arp::ArpHdr;
use crate::proto::l2::eapol::EapolHdr;
use crate::proto::l2::eth::EthHdr;
use crate::proto::l2::macsec::MacsecHdr;
use crate::proto::l2::pppoe::PppoeHdr;
use crate::proto::l2::qinq::QinQHdr;
use crate::proto::l2::vlan::VlanHdr;
use crate::proto::l3::ipsec_ah::IpsecAhHdr;
use crate::proto::l3::ipv4::Ipv4Hdr;
use crate::proto::l3::ipv6::Ipv6Hdr;
use crate::proto::l4::gre::GreHdr;
use crate::proto::l4::icmp::IcmpHdr;
use crate::proto::l4::icmp6::Icmp6Hdr;
use crate::proto::l4::igmp::IgmpHdr;
use crate::proto::l4::tcp::TcpHdr;
use crate::proto::l4::udp::UdpHdr;
use crate::proto::l4::vrrp::VrrpHdr;
use crate::proto::{ports, EtherType, IpProtocol};
use crate::signatures::OsFingerprint;
use crate::stats::PacketStats;
use crate::wire::Reader;

/// Outcome of a parse+filter pass over one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Deny,
}

/// Which decoders ran for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolBits(u32);

macro_rules! protocol_bit {
    ($set:ident, $has:ident, $bit:expr) => {
        pub fn $set(&mut self) {
            self.0 |= 1 << $bit;
        }
        pub fn $has(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }
    };
}

impl ProtocolBits {
    protocol_bit!(set_eth, has_eth, 0);
    protocol_bit!(set_vlan, has_vlan, 1);
    protocol_bit!(set_qinq, has_qinq, 2);
    protocol_bit!(set_macsec, has_macsec, 3);
    protocol_bit!(set_arp, has_arp, 4);
    protocol_bit!(set_pppoe, has_pppoe, 5);
    protocol_bit!(set_eapol, has_eapol, 6);
    protocol_bit!(set_ipv4, has_ipv4, 7);
    protocol_bit!(set_ipv6, has_ipv6, 8);
    protocol_bit!(set_tcp, has_tcp, 9);
    protocol_bit!(set_udp, has_udp, 10);
    protocol_bit!(set_icmp, has_icmp, 11);
    protocol_bit!(set_icmp6, has_icmp6, 12);
    protocol_bit!(set_igmp, has_igmp, 13);
    protocol_bit!(set_gre, has_gre, 14);
    protocol_bit!(set_vrrp, has_vrrp, 15);
    protocol_bit!(set_ipsec_ah, has_ipsec_ah, 16);
    protocol_bit!(set_dhcp, has_dhcp, 17);
    protocol_bit!(set_ntp, has_ntp, 18);
    protocol_bit!(set_tls, has_tls, 19);
    protocol_bit!(set_mqtt, has_mqtt, 20);
    protocol_bit!(set_someip, has_someip, 21);
    protocol_bit!(set_tftp, has_tftp, 22);
    protocol_bit!(set_stun, has_stun, 23);
    protocol_bit!(set_snmp, has_snmp, 24);
    protocol_bit!(set_doip, has_doip, 25);
}

pub struct Parser<'a> {
    ifname: &'a str,
    sink: &'a EventSink,
    stats: &'a PacketStats,

    pub pkt_len: u32,
    pub bits: ProtocolBits,
    pub os: OsFingerprint,

    pub eth: Option<EthHdr>,
    pub vlan: Option<VlanHdr>,
    pub qinq: Option<QinQHdr>,
    pub macsec: Option<MacsecHdr>,
    pub arp: Option<ArpHdr>,
    pub pppoe: Option<PppoeHdr>,
    pub eapol: Option<EapolHdr>,
    pub ipv4: Option<Ipv4Hdr>,
    pub ipv6: Option<Ipv6Hdr>,
    pub ipsec_ah: Option<IpsecAhHdr>,
    pub tcp: Option<TcpHdr>,
    pub udp: Option<UdpHdr>,
    pub icmp: Option<IcmpHdr>,
    pub icmp6: Option<Icmp6Hdr>,
    pub igmp: Option<IgmpHdr>,
    pub gre: Option<GreHdr>,
    pub vrrp: Option<VrrpHdr>,
    pub dhcp: Option<crate::proto::app::dhcp::DhcpHdr>,
    pub ntp: Option<crate::proto::app::ntp::NtpHdr>,
    pub tls: Option<crate::proto::app::tls::TlsHdr>,
    pub mqtt: Option<crate::proto::app::mqtt::MqttHdr>,
    pub someip: Option<crate::proto::app::someip::SomeipHdr>,
    pub tftp: Option<crate::proto::app::tftp::TftpHdr>,
    pub stun: Option<crate::proto::app::stun::StunHdr>,
    pub snmp: Option<crate::proto::app::snmp::SnmpHdr>,
    #[cfg(feature = "automotive")]
    pub doip: Option<crate::proto::app::doip::DoipHdr>,
}

impl<'a> Parser<'a> {
    pub fn new(ifname: &'a str, sink: &'a EventSink, stats: &'a PacketStats) -> Self {
        Self {
            ifname,
            sink,
            stats,
            pkt_len: 0,
            bits: ProtocolBits::default(),
            os: OsFingerprint::Unknown,
            eth: None,
            vlan: None,
            qinq: None,
            macsec: None,
            arp: None,
            pppoe: None,
            eapol: None,
            ipv4: None,
            ipv6: None,
            ipsec_ah: None,
            tcp: None,
            udp: None,
            icmp: None,
            icmp6: None,
            igmp: None,
            gre: None,
            vrrp: None,
            dhcp: None,
            ntp: None,
            tls: None,
            mqtt: None,
            someip: None,
            tftp: None,
            stun: None,
            snmp: None,
            #[cfg(feature = "automotive")]
            doip: None,
        }
    }

    /// The ethertype events and filters should match on: the innermost tag
    /// wins when VLAN/QinQ/MACsec interpose.
    pub fn effective_ethertype(&self) -> u16 {
        if let Some(q) = &self.qinq {
            return q.inner.ethertype;
        }
        if let Some(v) = &self.vlan {
            return v.ethertype;
        }
        if let Some(m) = &self.macsec {
            if let Some(et) = m.ethertype {
                return et;
            }
        }
        self.eth.as_ref().map(|e| e.ethertype).unwrap_or(0)
    }

    pub fn run(&mut self, pkt: &Packet) -> Verdict {
        self.pkt_len = pkt.len() as u32;
        let mut r = Reader::new(pkt.as_slice());

        match EthHdr::parse(&mut r) {
            Ok(hdr) => {
                self.eth = Some(hdr);
                self.bits.set_eth();
            }
            Err(desc) => return self.deny(desc),
        }

        let mut ethertype = self.eth.as_ref().map(|e| e.ethertype).unwrap_or(0);

        // one tag layer may interpose between ethernet and the payload
        match EtherType::from_u16(ethertype) {
            Some(EtherType::Vlan) => match VlanHdr::parse(&mut r) {
                Ok(hdr) => {
                    ethertype = hdr.ethertype;
                    self.vlan = Some(hdr);
                    self.bits.set_vlan();
                }
                Err(desc) => return self.deny(desc),
            },
            Some(EtherType::QinQ) => match QinQHdr::parse(&mut r) {
                Ok(hdr) => {
                    ethertype = hdr.inner.ethertype;
                    self.qinq = Some(hdr);
                    self.bits.set_qinq();
                }
                Err(desc) => return self.deny(desc),
            },
            Some(EtherType::Macsec) => match MacsecHdr::parse(&mut r) {
                Ok(hdr) => {
                    let cleartext = hdr.ethertype;
                    self.macsec = Some(hdr);
                    self.bits.set_macsec();
                    match cleartext {
                        // authenticated-only: keep parsing the payload
                        Some(et) => ethertype = et,
                        // encrypted payload is opaque to the sensor
                        None => return Verdict::Ok,
                    }
                }
                Err(desc) => return self.deny(desc),
            },
            _ => {}
        }

        match self.parse_l3(&mut r, ethertype) {
            Ok(()) => {}
            Err(desc) => return self.deny(desc),
        }

        self.detect_os_signature();
        trace!(ifname = %self.ifname, pkt_len = self.pkt_len, "frame parsed");
        Verdict::Ok
    }

    fn parse_l3(&mut self, r: &mut Reader, ethertype: u16) -> Result<(), EventDescription> {
        match EtherType::from_u16(ethertype) {
            Some(EtherType::Arp) => {
                self.arp = Some(ArpHdr::parse(r)?);
                self.bits.set_arp();
                Ok(())
            }
            Some(EtherType::Ipv4) => {
                let hdr = match Ipv4Hdr::parse(r) {
                    Ok(hdr) => hdr,
                    Err(desc) => {
                        if desc == EventDescription::Ipv4HdrChksumInvalid {
                            self.stats.inc_n_ipv4_chksum_err(self.ifname);
                        }
                        return Err(desc);
                    }
                };
                let protocol = hdr.effective_protocol();
                self.ipv4 = Some(hdr);
                self.bits.set_ipv4();
                self.parse_l4(r, protocol)
            }
            Some(EtherType::Ipv6) => {
                let hdr = Ipv6Hdr::parse(r)?;
                let nh = hdr.effective_next_header();
                self.ipv6 = Some(hdr);
                self.bits.set_ipv6();
                self.parse_l4(r, nh)
            }
            Some(EtherType::PppoeSession) | Some(EtherType::PppoeDiscovery) => {
                self.pppoe = Some(PppoeHdr::parse(r)?);
                self.bits.set_pppoe();
                Ok(())
            }
            Some(EtherType::Eapol) => {
                self.eapol = Some(EapolHdr::parse(r)?);
                self.bits.set_eapol();
                Ok(())
            }
            _ => Err(EventDescription::UnsupportedEthertype),
        }
    }

    fn parse_l4(&mut self, r: &mut Reader, protocol: u8) -> Result<(), EventDescription> {
        match IpProtocol::from_u8(protocol) {
            Some(IpProtocol::Tcp) => {
                let hdr = TcpHdr::parse(r)?;
                let dst_port = hdr.dst_port;
                self.tcp = Some(hdr);
                self.bits.set_tcp();
                self.parse_app(r, dst_port, true)
            }
            Some(IpProtocol::Udp) => {
                let hdr = UdpHdr::parse(r)?;
                let dst_port = hdr.dst_port;
                self.udp = Some(hdr);
                self.bits.set_udp();
                self.parse_app(r, dst_port, false)
            }
            Some(IpProtocol::Icmp) => {
                self.icmp = Some(IcmpHdr::parse(r)?);
                self.bits.set_icmp();
                Ok(())
            }
            Some(IpProtocol::Icmp6) => {
                self.icmp6 = Some(Icmp6Hdr::parse(r)?);
                self.bits.set_icmp6();
                Ok(())
            }
            Some(IpProtocol::Igmp) => {
                self.igmp = Some(IgmpHdr::parse(r)?);
                self.bits.set_igmp();
                Ok(())
            }
            Some(IpProtocol::Gre) => {
                self.gre = Some(GreHdr::parse(r)?);
                self.bits.set_gre();
                Ok(())
            }
            Some(IpProtocol::Vrrp) => {
                self.vrrp = Some(VrrpHdr::parse(r)?);
                self.bits.set_vrrp();
                Ok(())
            }
            Some(IpProtocol::Ah) => {
                self.ipsec_ah = Some(IpsecAhHdr::parse(r)?);
                self.bits.set_ipsec_ah();
                Ok(())
            }
            // tunnels were already followed by the IPv4 decoder
            Some(IpProtocol::IpIp) | Some(IpProtocol::Ipv6Encap) | Some(IpProtocol::Esp) => Ok(()),
            None => {
                if self.bits.has_ipv4() {
                    Err(EventDescription::Ipv4ProtocolUnsupported)
                } else {
                    Err(EventDescription::Ipv6UnsupportedNh)
                }
            }
        }
    }

    fn parse_app(&mut self, r: &mut Reader, dst_port: u16, is_tcp: bool) -> Result<(), EventDescription> {
        if r.remaining() == 0 {
            return Ok(());
        }

        match dst_port {
            ports::DHCP_SERVER | ports::DHCP_CLIENT if !is_tcp => {
                self.dhcp = Some(crate::proto::app::dhcp::DhcpHdr::parse(r)?);
                self.bits.set_dhcp();
            }
            ports::NTP if !is_tcp => {
                self.ntp = Some(crate::proto::app::ntp::NtpHdr::parse(r)?);
                self.bits.set_ntp();
            }
            ports::TFTP if !is_tcp => {
                self.tftp = Some(crate::proto::app::tftp::TftpHdr::parse(r)?);
                self.bits.set_tftp();
            }
            ports::STUN if !is_tcp => {
                self.stun = Some(crate::proto::app::stun::StunHdr::parse(r)?);
                self.bits.set_stun();
            }
            ports::SNMP if !is_tcp => {
                self.snmp = Some(crate::proto::app::snmp::SnmpHdr::parse(r)?);
                self.bits.set_snmp();
            }
            ports::SOMEIP if !is_tcp => {
                self.someip = Some(crate::proto::app::someip::SomeipHdr::parse(r)?);
                self.bits.set_someip();
            }
            ports::TLS if is_tcp => {
                self.tls = Some(crate::proto::app::tls::TlsHdr::parse(r)?);
                self.bits.set_tls();
            }
            ports::MQTT if is_tcp => {
                self.mqtt = Some(crate::proto::app::mqtt::MqttHdr::parse(r)?);
                self.bits.set_mqtt();
            }
            #[cfg(feature = "automotive")]
            ports::DOIP => {
                self.doip = Some(crate::proto::app::doip::DoipHdr::parse(r)?);
                self.bits.set_doip();
            }
            _ => {}
        }

        Ok(())
    }

    /// TTL-based OS guess, recorded on events only.
    fn detect_os_signature(&mut self) {
        if let Some(ipv4) = &self.ipv4 {
            self.os = OsFingerprint::from_ttl(ipv4.ttl);
        }
    }

    fn deny(&mut self, desc: EventDescription) -> Verdict {
        self.detect_os_signature();
        let evt = self.build_event(EventType::Deny, desc, desc.auto_rule_id());
        self.sink.store(evt);
        Verdict::Deny
    }

    /// Fill an event from whatever headers decoded so far.
    pub fn build_event(&self, evt_type: EventType, desc: EventDescription, rule_id: u32) -> Event {
        let mut evt = Event::new(evt_type, desc, rule_id);
        evt.ifname = self.ifname.to_string();
        evt.pkt_len = self.pkt_len;
        evt.os = self.os;

        if let Some(eth) = &self.eth {
            evt.src_mac = eth.src_mac;
            evt.dst_mac = eth.dst_mac;
        }
        evt.ethertype = self.effective_ethertype();

        if let Some(ipv4) = &self.ipv4 {
            evt.src_addr = ipv4.src_addr;
            evt.dst_addr = ipv4.dst_addr;
            evt.ttl = ipv4.ttl;
            evt.protocol = ipv4.protocol;
        }
        if let Some(tcp) = &self.tcp {
            evt.src_port = tcp.src_port;
            evt.dst_port = tcp.dst_port;
            evt.tcp_flags = u16::from(tcp.flags.to_byte());
            evt.data_len = tcp.data_len;
        } else if let Some(udp) = &self.udp {
            evt.src_port = udp.src_port;
            evt.dst_port = udp.dst_port;
            evt.data_len = udp.data_len;
        }

        evt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Writer;

    fn harness() -> (EventSink, tokio::sync::mpsc::UnboundedReceiver<Event>, PacketStats) {
        let (sink, rx) = EventSink::capture();
        (sink, rx, PacketStats::new(Vec::<String>::new()))
    }

    fn eth(ethertype: u16, payload: &[u8]) -> Packet {
        let mut w = Writer::new();
        EthHdr {
            dst_mac: [0xff; 6],
            src_mac: [0x00, 0x1b, 0x21, 0x01, 0x02, 0x03],
            ethertype,
        }
        .serialize(&mut w);
        w.put_slice(payload);
        Packet::new(w.as_slice())
    }

    fn ipv4(protocol: u8, ttl: u8, payload: &[u8]) -> Vec<u8> {
        let hdr = crate::proto::l3::ipv4::Ipv4Hdr {
            version: 4,
            hdr_len: 20,
            dscp: 0,
            ecn: 0,
            total_len: (20 + payload.len()) as u16,
            identification: 1,
            dont_frag: true,
            more_frag: false,
            frag_off: 0,
            ttl,
            protocol,
            hdr_chksum: 0,
            src_addr: 0x0A000001,
            dst_addr: 0x0A000002,
            options: crate::proto::l3::ipv4::Ipv4Options::default(),
            ipip: None,
            ipv6_in_ipv4: None,
        };
        let mut w = Writer::new();
        hdr.serialize(&mut w);
        w.put_slice(payload);
        w.into_vec()
    }

    #[test]
    fn test_truncated_frame_denies_with_event() {
        let (sink, mut rx, stats) = harness();
        let mut p = Parser::new("eth0", &sink, &stats);
        let pkt = Packet::new(&[0u8; 10]);
        assert_eq!(p.run(&pkt), Verdict::Deny);

        let evt = rx.try_recv().expect("deny event submitted");
        assert_eq!(evt.desc, EventDescription::EthHdrLenTooSmall);
        assert_eq!(evt.evt_type, EventType::Deny);
        assert_eq!(evt.pkt_len, 10);
    }

    #[test]
    fn test_icmp_echo_sets_bits_and_fingerprint() {
        let (sink, _rx, stats) = harness();
        let mut icmp = Writer::new();
        icmp.put_u8(8);
        icmp.put_u8(0);
        icmp.put_u16(0);
        icmp.put_u16(7);
        icmp.put_u16(1);
        icmp.put_slice(&[0xAB; 8]);

        let mut p = Parser::new("eth0", &sink, &stats);
        let pkt = eth(0x0800, &ipv4(1, 64, icmp.as_slice()));
        assert_eq!(p.run(&pkt), Verdict::Ok);
        assert!(p.bits.has_eth() && p.bits.has_ipv4() && p.bits.has_icmp());
        assert!(!p.bits.has_tcp());
        assert_eq!(p.os, OsFingerprint::Linux4_10OrLater);
        assert_eq!(p.icmp.as_ref().unwrap().echo_payload_len(), Some(8));
    }

    #[test]
    fn test_vlan_tag_chains_to_inner_ethertype() {
        let (sink, _rx, stats) = harness();
        let mut payload = Writer::new();
        // vlan tag: vid 100, inner ipv4
        payload.put_u16(0x0064);
        payload.put_u16(0x0800);
        let mut udp = Writer::new();
        udp.put_u16(5353);
        udp.put_u16(5353);
        udp.put_u16(8);
        udp.put_u16(0);
        payload.put_slice(&ipv4(17, 128, udp.as_slice()));

        let mut p = Parser::new("eth0", &sink, &stats);
        let pkt = eth(0x8100, payload.as_slice());
        assert_eq!(p.run(&pkt), Verdict::Ok);
        assert!(p.bits.has_vlan() && p.bits.has_udp());
        assert_eq!(p.effective_ethertype(), 0x0800);
        assert_eq!(p.os, OsFingerprint::Win10);
    }

    #[test]
    fn test_unknown_ethertype_denied() {
        let (sink, mut rx, stats) = harness();
        let mut p = Parser::new("eth0", &sink, &stats);
        let pkt = eth(0x1234, &[0u8; 32]);
        assert_eq!(p.run(&pkt), Verdict::Deny);
        let evt = rx.try_recv().unwrap();
        assert_eq!(evt.desc, EventDescription::UnsupportedEthertype);
    }

    #[test]
    fn test_tcp_syn_dispatches_and_collects_ports() {
        let (sink, _rx, stats) = harness();
        let mut tcp = Writer::new();
        tcp.put_u16(43211);
        tcp.put_u16(443);
        tcp.put_u32(1);
        tcp.put_u32(0);
        tcp.put_u8(5 << 4);
        tcp.put_u8(0x02);
        tcp.put_u16(64240);
        tcp.put_u16(0);
        tcp.put_u16(0);

        let mut p = Parser::new("eth0", &sink, &stats);
        let pkt = eth(0x0800, &ipv4(6, 64, tcp.as_slice()));
        assert_eq!(p.run(&pkt), Verdict::Ok);
        assert!(p.bits.has_tcp());

        let evt = p.build_event(EventType::Allow, EventDescription::PortMatched, 20);
        assert_eq!(evt.src_port, 43211);
        assert_eq!(evt.dst_port, 443);
        assert_eq!(evt.tcp_flags, 0x02);
        assert_eq!(evt.ethertype, 0x0800);
    }
}

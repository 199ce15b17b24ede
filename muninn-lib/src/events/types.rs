//! Event classification: what happened, and how severe it is.
//!
//! `EventDescription` is the closed set of reasons a frame can be classified;
//! the discriminant is the on-wire description code and must stay stable.
//! Built-in detections (anything the sensor flags without a configured rule)
//! reuse the description code as their rule id; rule-driven events carry the
//! id from the rule file instead.

use serde::Serialize;

/// Severity / disposition of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum EventType {
    Allow = 0,
    Deny = 1,
    Alert = 2,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Allow => "Allow",
            EventType::Deny => "Deny",
            EventType::Alert => "Alert",
        }
    }

    pub fn from_wire(v: u8) -> Option<Self> {
        match v {
            0 => Some(EventType::Allow),
            1 => Some(EventType::Deny),
            2 => Some(EventType::Alert),
            _ => None,
        }
    }
}

/// The specific reason a packet was classified as it was.
///
/// Decoders return `Result<Hdr, EventDescription>`; the `Err` names the
/// first violated invariant of that layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum EventDescription {
    // generic
    UnknownError = 1,
    OutOfBounds = 2,
    UnsupportedEthertype = 3,

    // ethernet
    EthHdrLenTooSmall = 10,
    EthSrcMacMatched = 11,
    EthDstMacMatched = 12,
    EthEthertypeMatched = 13,

    // vlan / qinq
    VlanHdrLenTooShort = 20,
    VlanInvalVid = 21,

    // macsec
    MacsecHdrLenTooSmall = 30,
    MacsecTciScScbSet = 31,
    MacsecTciEsScSet = 32,

    // arp
    ArpHdrLenTooSmall = 40,
    ArpHwAddrLenInval = 41,
    ArpProtocolAddrLenInval = 42,
    ArpInvalOperation = 43,
    ArpFloodMaybeInProgress = 44,

    // pppoe / eapol
    PppoeHdrLenTooSmall = 50,
    EapHdrLenTooSmall = 51,
    EapTypeUnsupported = 52,

    // ipv4
    Ipv4HdrLenTooSmall = 60,
    Ipv4HdrLenTooBig = 61,
    Ipv4VersionInvalid = 62,
    Ipv4FlagsInvalid = 63,
    Ipv4HdrChksumInvalid = 64,
    Ipv4UnknownOpt = 65,
    Ipv4ZeroTtl = 66,
    Ipv4ReservedSet = 67,
    Ipv4SrcAndDstAddrSame = 68,
    Ipv4SrcIsBroadcast = 69,
    Ipv4SrcIsMulticast = 70,
    Ipv4SrcIsReserved = 71,
    Ipv4DstIsReserved = 72,
    Ipv4StrictSourceRouteLenTruncated = 73,
    Ipv4TotalLenSmallerThanHdrLen = 74,
    Ipv4InvalidTotalLen = 75,
    Ipv4OptTsInvalLen = 76,
    Ipv4ProtocolUnsupported = 77,

    // ipsec ah
    IpsecAhInvalLen = 80,
    IpsecAhZeroIcvLen = 81,

    // ipv6
    Ipv6HdrLenTooSmall = 90,
    Ipv6VersionInvalid = 91,
    Ipv6PayloadTruncated = 92,
    Ipv6DstIsZero = 93,
    Ipv6UnsupportedNh = 94,
    Ipv6ZeroHopLimit = 95,

    // tcp
    TcpHdrLenTooShort = 100,
    TcpFlagsAllSet = 101,
    TcpFlagsNoneSet = 102,
    TcpFlagsSynFinSet = 103,
    TcpInvalidOption = 104,
    TcpOptTsInvalLen = 105,
    TcpOptWinScaleInvalLen = 106,
    TcpOptMssRepeated = 107,
    TcpOptSackPermittedRepeated = 108,
    TcpOptTsRepeated = 109,
    TcpOptWinScaleRepeated = 110,
    TcpSrcPortZero = 111,
    TcpDstPortZero = 112,
    TcpAckNoSynTracked = 113,

    // udp
    UdpSrcPortInvalid = 120,
    UdpDstPortInvalid = 121,
    UdpLenTooShort = 122,
    UdpBogusMsgLen = 123,

    // icmp
    IcmpHdrLenTooShort = 130,
    IcmpEchoReqHdrLenTooShort = 131,
    IcmpEchoReplyHdrLenTooShort = 132,
    IcmpTsMsgHdrLenTooShort = 133,
    IcmpInfoMsgHdrLenTooShort = 134,
    IcmpInvalidType = 135,
    IcmpDestUnreachableInvalidCode = 136,
    IcmpTimeExceededInvalidCode = 137,
    IcmpInvalRedirMsgCode = 138,
    IcmpPktFragmented = 139,
    IcmpDestAddrMulticastInIpv4 = 140,
    IcmpDestAddrBroadcastInIpv4 = 141,
    IcmpNonZeroEchoReqPayloadLen = 142,
    IcmpNonZeroEchoReplyPayloadLen = 143,
    IcmpCovertChannelMaybeActive = 144,
    IcmpEchoFloodMaybeInProgress = 145,

    // icmpv6
    Icmp6TypeUnsupported = 150,
    Icmp6McastListenerInvalRecLen = 151,
    Icmp6EchoReqHdrLenTooShort = 152,
    Icmp6OptInvalLen = 153,

    // igmp
    IgmpUnsupportedType = 160,
    IgmpInvalRecordLen = 161,

    // gre / vrrp
    GreInvalidHdrLen = 170,
    VrrpInvalidHdrLen = 171,
    VrrpInvalidV2HdrLen = 172,

    // dhcp
    DhcpMagicInvalid = 180,
    DhcpHdrLenTooShort = 181,
    DhcpOptClientIdLenInval = 182,
    DhcpOptSubnetMaskLenInval = 183,
    DhcpOptRenewalTimeLenInval = 184,
    DhcpOptRebindingTimeLenInval = 185,
    DhcpOptIpaddrLeaseTimeLenInval = 186,
    DhcpOptServerIdLenInval = 187,

    // ntp
    NtpHdrLenTooShort = 190,

    // tls
    TlsRecordNotHandshake = 200,
    TlsVersionUnsupported = 201,

    // mqtt
    MqttHdrLenTooShort = 210,
    MqttInvalMsgType = 211,
    MqttTopicNameTooLong = 212,

    // some/ip
    SomeipHdrLenTooSmall = 220,

    // tftp
    TftpInvalOpcode = 230,
    TftpFilenameTooLong = 231,

    // stun
    StunHdrLenTooShort = 240,
    StunInvalMagicCookie = 241,

    // snmp
    SnmpHdrLenTooShort = 250,

    // doip / uds
    DoipHdrLenTooSmall = 260,
    DoipVersionMismatch = 261,
    DoipUnsupportedMsgType = 262,
    DoipVehAnnounceTooSmall = 263,
    DoipEntityStatusResponseTooSmall = 264,
    DoipRouteActivationReqTooSmall = 265,
    UdsUnknownServiceId = 266,

    // rule / filter findings
    PortMatched = 280,
    RuleMatched = 281,
}

impl From<crate::wire::OutOfBounds> for EventDescription {
    fn from(_: crate::wire::OutOfBounds) -> Self {
        EventDescription::OutOfBounds
    }
}

impl EventDescription {
    /// Description code on the event wire.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Rule id reported for built-in detections (no configured rule
    /// involved). Shares the description's numeric space so the pair stays
    /// self-describing on the wire.
    pub fn auto_rule_id(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        use EventDescription::*;
        match self {
            UnknownError => "Unknown error",
            OutOfBounds => "Frame truncated mid-field",
            UnsupportedEthertype => "Unsupported Ethertype",
            EthHdrLenTooSmall => "Ethernet header length too small",
            EthSrcMacMatched => "Ethernet source MAC matched in the ruleset",
            EthDstMacMatched => "Ethernet destination MAC matched in the ruleset",
            EthEthertypeMatched => "Ethertype matched in the ruleset",
            VlanHdrLenTooShort => "VLAN header length too small",
            VlanInvalVid => "VLAN ID invalid",
            MacsecHdrLenTooSmall => "MACsec header length too small",
            MacsecTciScScbSet => "MACsec TCI SC and SCB cannot be set at the same time",
            MacsecTciEsScSet => "MACsec TCI ES and SC cannot be set at the same time",
            ArpHdrLenTooSmall => "ARP header length too small",
            ArpHwAddrLenInval => "ARP hardware address length invalid",
            ArpProtocolAddrLenInval => "ARP protocol address length invalid",
            ArpInvalOperation => "ARP invalid operation",
            ArpFloodMaybeInProgress => "ARP flood maybe in progress",
            PppoeHdrLenTooSmall => "PPPoE header length too small",
            EapHdrLenTooSmall => "EAPoL header length too small",
            EapTypeUnsupported => "EAPoL type unsupported",
            Ipv4HdrLenTooSmall => "IPv4 header length too small",
            Ipv4HdrLenTooBig => "IPv4 header length too big",
            Ipv4VersionInvalid => "IPv4 version invalid",
            Ipv4FlagsInvalid => "IPv4 flags invalid",
            Ipv4HdrChksumInvalid => "IPv4 header checksum invalid",
            Ipv4UnknownOpt => "IPv4 unknown option",
            Ipv4ZeroTtl => "IPv4 packet TTL is zero",
            Ipv4ReservedSet => "IPv4 reserved bit is set",
            Ipv4SrcAndDstAddrSame => "IPv4 source and destination addresses are same",
            Ipv4SrcIsBroadcast => "IPv4 source is a broadcast address",
            Ipv4SrcIsMulticast => "IPv4 source is a multicast address",
            Ipv4SrcIsReserved => "IPv4 source is a reserved address",
            Ipv4DstIsReserved => "IPv4 destination is a reserved address",
            Ipv4StrictSourceRouteLenTruncated => {
                "IPv4 options: strict source route length truncated"
            }
            Ipv4TotalLenSmallerThanHdrLen => "IPv4 total length smaller than header length",
            Ipv4InvalidTotalLen => "IPv4 total length exceeds the frame",
            Ipv4OptTsInvalLen => "IPv4 options: timestamp length invalid",
            Ipv4ProtocolUnsupported => "IPv4 protocol unsupported",
            IpsecAhInvalLen => "IPsec AH length invalid",
            IpsecAhZeroIcvLen => "IPsec AH ICV length is zero",
            Ipv6HdrLenTooSmall => "IPv6 header length too small",
            Ipv6VersionInvalid => "IPv6 version invalid",
            Ipv6PayloadTruncated => "IPv6 payload truncated",
            Ipv6DstIsZero => "IPv6 destination address is zero",
            Ipv6UnsupportedNh => "IPv6 unsupported next header",
            Ipv6ZeroHopLimit => "IPv6 hop limit is zero",
            TcpHdrLenTooShort => "TCP header length too short",
            TcpFlagsAllSet => "TCP all flags are set",
            TcpFlagsNoneSet => "TCP no flags are set",
            TcpFlagsSynFinSet => "TCP SYN and FIN are both set",
            TcpInvalidOption => "TCP invalid option",
            TcpOptTsInvalLen => "TCP option timestamp has invalid length",
            TcpOptWinScaleInvalLen => "TCP option window scale has invalid length",
            TcpOptMssRepeated => "TCP option MSS repeated",
            TcpOptSackPermittedRepeated => "TCP option SACK-permitted repeated",
            TcpOptTsRepeated => "TCP option timestamp repeated",
            TcpOptWinScaleRepeated => "TCP option window scale repeated",
            TcpSrcPortZero => "TCP source port is zero",
            TcpDstPortZero => "TCP destination port is zero",
            TcpAckNoSynTracked => "TCP ACK without a tracked SYN",
            UdpSrcPortInvalid => "UDP source port invalid",
            UdpDstPortInvalid => "UDP destination port invalid",
            UdpLenTooShort => "UDP header length too short",
            UdpBogusMsgLen => "UDP message length is bogus",
            IcmpHdrLenTooShort => "ICMP header length too short",
            IcmpEchoReqHdrLenTooShort => "ICMP echo request length too short",
            IcmpEchoReplyHdrLenTooShort => "ICMP echo reply length too short",
            IcmpTsMsgHdrLenTooShort => "ICMP timestamp message length too short",
            IcmpInfoMsgHdrLenTooShort => "ICMP info message length too short",
            IcmpInvalidType => "ICMP invalid type",
            IcmpDestUnreachableInvalidCode => "ICMP destination unreachable has invalid code",
            IcmpTimeExceededInvalidCode => "ICMP time exceeded has invalid code",
            IcmpInvalRedirMsgCode => "ICMP redirect has invalid code",
            IcmpPktFragmented => "ICMP packet is fragmented",
            IcmpDestAddrMulticastInIpv4 => "ICMP destination address is multicast",
            IcmpDestAddrBroadcastInIpv4 => "ICMP destination address is broadcast",
            IcmpNonZeroEchoReqPayloadLen => "ICMP echo request carries a payload",
            IcmpNonZeroEchoReplyPayloadLen => "ICMP echo reply carries a payload",
            IcmpCovertChannelMaybeActive => "ICMP covert channel may be active",
            IcmpEchoFloodMaybeInProgress => "ICMP echo request flood maybe in progress",
            Icmp6TypeUnsupported => "ICMPv6 type unsupported",
            Icmp6McastListenerInvalRecLen => "ICMPv6 invalid multicast listener record length",
            Icmp6EchoReqHdrLenTooShort => "ICMPv6 echo request length too short",
            Icmp6OptInvalLen => "ICMPv6 option length invalid",
            IgmpUnsupportedType => "IGMP type unsupported",
            IgmpInvalRecordLen => "IGMP invalid group record length",
            GreInvalidHdrLen => "GRE header length invalid",
            VrrpInvalidHdrLen => "VRRP header length invalid",
            VrrpInvalidV2HdrLen => "VRRP v2 header length invalid",
            DhcpMagicInvalid => "DHCP magic is invalid",
            DhcpHdrLenTooShort => "DHCP header length too short",
            DhcpOptClientIdLenInval => "DHCP options: client id length invalid",
            DhcpOptSubnetMaskLenInval => "DHCP options: subnet mask length invalid",
            DhcpOptRenewalTimeLenInval => "DHCP options: renewal time length invalid",
            DhcpOptRebindingTimeLenInval => "DHCP options: rebinding time length invalid",
            DhcpOptIpaddrLeaseTimeLenInval => "DHCP options: lease time length invalid",
            DhcpOptServerIdLenInval => "DHCP options: server id length invalid",
            NtpHdrLenTooShort => "NTP header length too short",
            TlsRecordNotHandshake => "TLS record is not a handshake",
            TlsVersionUnsupported => "TLS version unsupported",
            MqttHdrLenTooShort => "MQTT header length too short",
            MqttInvalMsgType => "MQTT invalid message type",
            MqttTopicNameTooLong => "MQTT topic name exceeds the allowed length",
            SomeipHdrLenTooSmall => "SOME/IP header length too small",
            TftpInvalOpcode => "TFTP invalid opcode",
            TftpFilenameTooLong => "TFTP filename too long",
            StunHdrLenTooShort => "STUN header length too short",
            StunInvalMagicCookie => "STUN magic cookie invalid",
            SnmpHdrLenTooShort => "SNMP header length too short",
            DoipHdrLenTooSmall => "DoIP header length too small",
            DoipVersionMismatch => "DoIP version mismatched",
            DoipUnsupportedMsgType => "DoIP unsupported message type",
            DoipVehAnnounceTooSmall => "DoIP vehicle announcement too small",
            DoipEntityStatusResponseTooSmall => "DoIP entity status response too small",
            DoipRouteActivationReqTooSmall => "DoIP routing activation request too small",
            UdsUnknownServiceId => "UDS unknown service id",
            PortMatched => "Port matched in the ruleset",
            RuleMatched => "Rule predicates matched",
        }
    }
}

pub mod dhcp;
#[cfg(feature = "automotive")]
pub mod doip;
pub mod mqtt;
pub mod ntp;
pub mod snmp;
pub mod someip;
pub mod stun;
pub mod tftp;
pub mod tls;

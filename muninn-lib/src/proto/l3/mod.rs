pub mod ipsec_ah;
pub mod ipv4;
pub mod ipv6;

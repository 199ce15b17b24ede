use serde::Serialize;

/// Coarse OS label derived from the observed IPv4 TTL.
///
/// An event attribute only; never a filtering input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum OsFingerprint {
    Linux2_4,
    Linux4_10OrLater,
    Win10,
    #[default]
    Unknown,
}

impl OsFingerprint {
    /// Initial-TTL heuristic: 255 and 64 are the classic Linux defaults,
    /// 128 is Windows.
    pub fn from_ttl(ttl: u8) -> Self {
        match ttl {
            255 => OsFingerprint::Linux2_4,
            64 => OsFingerprint::Linux4_10OrLater,
            128 => OsFingerprint::Win10,
            _ => OsFingerprint::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_mapping() {
        assert_eq!(OsFingerprint::from_ttl(64), OsFingerprint::Linux4_10OrLater);
        assert_eq!(OsFingerprint::from_ttl(128), OsFingerprint::Win10);
        assert_eq!(OsFingerprint::from_ttl(255), OsFingerprint::Linux2_4);
        assert_eq!(OsFingerprint::from_ttl(63), OsFingerprint::Unknown);
    }
}

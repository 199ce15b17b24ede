//! Per-interface packet counters.
//!
//! The map is built once at startup from the configured interface list and
//! never mutated afterwards, so readers take no lock; the counters
//! themselves are atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ahash::AHashMap;

#[derive(Debug, Default)]
pub struct IfaceStats {
    pub n_rx: AtomicU64,
    pub n_allowed: AtomicU64,
    pub n_deny: AtomicU64,
    pub n_events: AtomicU64,
    pub n_ipv4_chksum_errors: AtomicU64,
    pub n_icmp_chksum_errors: AtomicU64,
    pub startup_sec: u64,
    pub startup_nsec: u64,
}

/// Counter snapshot handed to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceStatsSnapshot {
    pub n_rx: u64,
    pub n_allowed: u64,
    pub n_deny: u64,
    pub n_events: u64,
    pub startup_sec: u64,
    pub startup_nsec: u64,
}

#[derive(Debug)]
pub struct PacketStats {
    per_iface: AHashMap<String, Arc<IfaceStats>>,
}

impl PacketStats {
    pub fn new<I: IntoIterator<Item = String>>(ifnames: I) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let per_iface = ifnames
            .into_iter()
            .map(|name| {
                let stats = IfaceStats {
                    startup_sec: now.as_secs(),
                    startup_nsec: u64::from(now.subsec_nanos()),
                    ..Default::default()
                };
                (name, Arc::new(stats))
            })
            .collect();
        Self { per_iface }
    }

    pub fn iface(&self, ifname: &str) -> Option<Arc<IfaceStats>> {
        self.per_iface.get(ifname).cloned()
    }

    pub fn inc_n_rx(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_rx.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_n_allowed(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_allowed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_n_deny(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_deny.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_n_events(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_n_ipv4_chksum_err(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_ipv4_chksum_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_n_icmp_chksum_err(&self, ifname: &str) {
        if let Some(s) = self.per_iface.get(ifname) {
            s.n_icmp_chksum_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of every interface, sorted by name so replies are stable.
    pub fn snapshot(&self) -> Vec<(String, IfaceStatsSnapshot)> {
        let mut out: Vec<_> = self
            .per_iface
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    IfaceStatsSnapshot {
                        n_rx: s.n_rx.load(Ordering::Relaxed),
                        n_allowed: s.n_allowed.load(Ordering::Relaxed),
                        n_deny: s.n_deny.load(Ordering::Relaxed),
                        n_events: s.n_events.load(Ordering::Relaxed),
                        startup_sec: s.startup_sec,
                        startup_nsec: s.startup_nsec,
                    },
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

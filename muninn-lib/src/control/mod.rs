//! Control plane: a datagram endpoint on a filesystem path answering a
//! typed request/response protocol.
//!
//! Request: 1-byte message type. `GET_STATS` (0x01) is answered with the
//! type byte followed by one fixed-size record per interface, all integers
//! little-endian: ifname[20] NUL-padded, startup ts_sec u64, ts_nsec u64,
//! n_rx u64, n_allowed u64, n_deny u64.

use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixDatagram;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MuninnError, Result};
use crate::stats::PacketStats;
use crate::wire::Writer;

pub const MSGTYPE_GET_STATS: u8 = 0x01;
pub const IFNAME_MAX: usize = 20;
pub const STATS_RECORD_LEN: usize = IFNAME_MAX + 8 * 5;

pub struct ControlServer {
    sock: UnixDatagram,
    stats: Arc<PacketStats>,
}

impl ControlServer {
    pub fn bind<P: AsRef<Path>>(path: P, stats: Arc<PacketStats>) -> Result<Self> {
        let path = path.as_ref();
        // a previous run may have left the socket file behind
        let _ = std::fs::remove_file(path);
        let sock = UnixDatagram::bind(path).map_err(|e| {
            MuninnError::Control(format!("bind {} failed: {e}", path.display()))
        })?;
        info!(path = %path.display(), "control socket bound");
        Ok(Self { sock, stats })
    }

    pub async fn run(self, token: CancellationToken) {
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = self.sock.recv_from(&mut buf) => {
                    let (n, sender) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, "control receive failed");
                            continue;
                        }
                    };
                    if n == 0 {
                        continue;
                    }
                    match buf[0] {
                        MSGTYPE_GET_STATS => {
                            let reply = encode_stats_reply(&self.stats);
                            if let Some(path) = sender.as_pathname() {
                                if let Err(e) = self.sock.send_to(&reply, path).await {
                                    warn!(error = %e, "control reply failed");
                                }
                            }
                        }
                        other => debug!(msg_type = other, "ignoring unknown control request"),
                    }
                }
            }
        }
    }
}

pub fn encode_stats_reply(stats: &PacketStats) -> Vec<u8> {
    let snapshot = stats.snapshot();
    let mut w = Writer::with_capacity(1 + snapshot.len() * STATS_RECORD_LEN);
    w.put_u8(MSGTYPE_GET_STATS);
    for (ifname, snap) in snapshot {
        let mut name = [0u8; IFNAME_MAX];
        let raw = ifname.as_bytes();
        let n = raw.len().min(IFNAME_MAX - 1);
        name[..n].copy_from_slice(&raw[..n]);
        w.put_slice(&name);
        w.put_u64_le(snap.startup_sec);
        w.put_u64_le(snap.startup_nsec);
        w.put_u64_le(snap.n_rx);
        w.put_u64_le(snap.n_allowed);
        w.put_u64_le(snap.n_deny);
    }
    w.into_vec()
}

/// Decoded reply record, for clients and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    pub ifname: String,
    pub startup_sec: u64,
    pub startup_nsec: u64,
    pub n_rx: u64,
    pub n_allowed: u64,
    pub n_deny: u64,
}

pub fn decode_stats_reply(buf: &[u8]) -> Option<Vec<StatsRecord>> {
    if buf.is_empty() || buf[0] != MSGTYPE_GET_STATS {
        return None;
    }
    let mut records = Vec::new();
    let mut off = 1;
    while off + STATS_RECORD_LEN <= buf.len() {
        let name_raw = &buf[off..off + IFNAME_MAX];
        let end = name_raw.iter().position(|&b| b == 0).unwrap_or(IFNAME_MAX);
        let ifname = String::from_utf8_lossy(&name_raw[..end]).into_owned();
        let mut fields = [0u64; 5];
        for (i, field) in fields.iter_mut().enumerate() {
            let start = off + IFNAME_MAX + i * 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[start..start + 8]);
            *field = u64::from_le_bytes(raw);
        }
        records.push(StatsRecord {
            ifname,
            startup_sec: fields[0],
            startup_nsec: fields[1],
            n_rx: fields[2],
            n_allowed: fields[3],
            n_deny: fields[4],
        });
        off += STATS_RECORD_LEN;
    }
    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_encoding_round_trip() {
        let stats = PacketStats::new(vec!["eth0".to_string(), "eth1".to_string()]);
        for _ in 0..3 {
            stats.inc_n_rx("eth0");
        }
        stats.inc_n_deny("eth1");

        let reply = encode_stats_reply(&stats);
        assert_eq!(reply.len(), 1 + 2 * STATS_RECORD_LEN);

        let records = decode_stats_reply(&reply).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ifname, "eth0");
        assert_eq!(records[0].n_rx, 3);
        assert_eq!(records[1].ifname, "eth1");
        assert_eq!(records[1].n_deny, 1);
    }

    #[tokio::test]
    async fn test_get_stats_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let server_path = dir.path().join("ctl.sock");
        let client_path = dir.path().join("client.sock");

        let stats = Arc::new(PacketStats::new(vec!["eth0".to_string()]));
        stats.inc_n_rx("eth0");
        stats.inc_n_rx("eth0");

        let server = ControlServer::bind(&server_path, stats).unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(server.run(token.clone()));

        let client = UnixDatagram::bind(&client_path).unwrap();
        client.send_to(&[MSGTYPE_GET_STATS], &server_path).await.unwrap();

        let mut buf = [0u8; 4096];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        let records = decode_stats_reply(&buf[..n]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ifname, "eth0");
        assert_eq!(records[0].n_rx, 2);

        token.cancel();
        handle.await.unwrap();
    }
}

//! Event pipeline: classification types, the non-blocking store handle and
//! the drain task that fans events out to the enabled sinks.

pub mod codec;
pub mod envelope;
pub mod file_writer;
pub mod publish;
pub mod syslog;
mod types;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{
    EventEncryptionAlgorithm, EventFileFormat, EventUploadMethod, EventsConfig,
};
use crate::crypto::AesCtrKey;
use crate::error::{MuninnError, Result};
use crate::signatures::OsFingerprint;
use crate::stats::PacketStats;
use envelope::{EncryptionAlgorithm, HashAlgorithm};
use file_writer::EventFileWriter;
use publish::{MqttSink, PublishSink, UdpSink, UnixSink};
use syslog::SyslogWriter;

pub use types::{EventDescription, EventType};

/// One sensor event, immutable once built and moved by value through the
/// queue.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub evt_type: EventType,
    pub desc: EventDescription,
    pub rule_id: u32,
    pub src_mac: [u8; 6],
    pub dst_mac: [u8; 6],
    pub ethertype: u16,
    pub src_addr: u32,
    pub dst_addr: u32,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub ttl: u8,
    pub tcp_flags: u16,
    pub data_len: u16,
    pub pkt_len: u32,
    pub ifname: String,
    pub ts_sec: u64,
    pub ts_nsec: u32,
    pub os: OsFingerprint,
}

impl Event {
    /// A blank event stamped with the current wall clock; callers fill in
    /// whatever the decoded headers provide.
    pub fn new(evt_type: EventType, desc: EventDescription, rule_id: u32) -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            evt_type,
            desc,
            rule_id,
            src_mac: [0; 6],
            dst_mac: [0; 6],
            ethertype: 0,
            src_addr: 0,
            dst_addr: 0,
            protocol: 0,
            src_port: 0,
            dst_port: 0,
            ttl: 0,
            tcp_flags: 0,
            data_len: 0,
            pkt_len: 0,
            ifname: String::new(),
            ts_sec: now.as_secs(),
            ts_nsec: now.subsec_nanos(),
            os: OsFingerprint::Unknown,
        }
    }
}

/// Cloneable store handle. `store` is non-blocking and O(1): it enqueues
/// and bumps the per-interface event counter.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
    stats: Arc<PacketStats>,
}

impl EventSink {
    pub fn store(&self, evt: Event) {
        self.stats.inc_n_events(&evt.ifname);
        // the drain task owns the receiver; a send error just means
        // shutdown is already underway
        let _ = self.tx.send(evt);
    }

    /// Sink with a captive receiver, for exercising parser and filter
    /// paths without a running drain task.
    #[cfg(test)]
    pub(crate) fn capture() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self { tx, stats: Arc::new(PacketStats::new(Vec::<String>::new())) };
        (sink, rx)
    }
}

/// Drains the event queue and delivers to the enabled subset of
/// {file, syslog, console, publish}.
pub struct EventManager {
    rx: mpsc::UnboundedReceiver<Event>,
    cfg: EventsConfig,
    key: Option<AesCtrKey>,
    hash_alg: HashAlgorithm,
    publish_enc: EncryptionAlgorithm,
    file_enc: EncryptionAlgorithm,
    file: Option<EventFileWriter>,
    syslog: Option<SyslogWriter>,
    sink: Option<PublishSink>,
    crypto_errors: u64,
}

impl EventManager {
    pub async fn new(cfg: EventsConfig, stats: Arc<PacketStats>) -> Result<(EventSink, Self)> {
        let enc = match cfg.encryption_algorithm {
            EventEncryptionAlgorithm::AesCtr128 => EncryptionAlgorithm::AesCtr128,
            other => {
                return Err(MuninnError::Config(format!(
                    "encryption algorithm {other:?} is not supported by the event envelope; use aes_ctr_128"
                )))
            }
        };

        let needs_key = cfg.encrypt_log_file || cfg.event_upload_method.is_some();
        let key = if needs_key { Some(AesCtrKey::load(&cfg.encryption_key)?) } else { None };

        let file = if cfg.log_to_file {
            Some(EventFileWriter::new(
                &cfg.event_file_path,
                cfg.event_file_size_bytes,
                cfg.event_file_format,
            )?)
        } else {
            None
        };

        let syslog = if cfg.log_to_syslog {
            match SyslogWriter::new() {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "syslog unavailable, sink disabled");
                    None
                }
            }
        } else {
            None
        };

        let sink = match cfg.event_upload_method {
            Some(EventUploadMethod::Mqtt) => {
                let mqtt_cfg = cfg.mqtt_config.as_ref().ok_or_else(|| {
                    MuninnError::Config("mqtt upload selected without mqtt_config".into())
                })?;
                Some(PublishSink::Mqtt(MqttSink::new(mqtt_cfg)))
            }
            Some(EventUploadMethod::Udp) => {
                let udp_cfg = cfg.udp_config.as_ref().ok_or_else(|| {
                    MuninnError::Config("udp upload selected without udp_config".into())
                })?;
                Some(PublishSink::Udp(UdpSink::new(udp_cfg).await?))
            }
            Some(EventUploadMethod::LocalUnix) => {
                let unix_cfg = cfg.local_unix_config.as_ref().ok_or_else(|| {
                    MuninnError::Config("local_unix upload selected without local_unix_config".into())
                })?;
                Some(PublishSink::LocalUnix(UnixSink::new(unix_cfg)?))
            }
            None => None,
        };

        let file_enc = if cfg.encrypt_log_file { enc } else { EncryptionAlgorithm::None };

        let (tx, rx) = mpsc::unbounded_channel();
        let mgr = Self {
            rx,
            cfg,
            key,
            hash_alg: HashAlgorithm::Sha256,
            publish_enc: enc,
            file_enc,
            file,
            syslog,
            sink,
            crypto_errors: 0,
        };
        Ok((EventSink { tx, stats }, mgr))
    }

    /// Drain loop: wakes when the queue becomes non-empty or once per
    /// second, and flushes pending events to file before exiting on
    /// cancellation.
    pub async fn run(mut self, token: CancellationToken) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    while let Ok(evt) = self.rx.try_recv() {
                        self.deliver(evt).await;
                    }
                    if let Some(f) = &mut self.file {
                        let _ = f.flush();
                    }
                    break;
                }
                maybe = self.rx.recv() => match maybe {
                    Some(evt) => self.deliver(evt).await,
                    None => break,
                },
                _ = tick.tick() => {
                    if let Some(f) = &mut self.file {
                        let _ = f.flush();
                    }
                }
            }
        }
    }

    async fn deliver(&mut self, evt: Event) {
        if self.cfg.log_to_console {
            info!(
                evt_type = evt.evt_type.as_str(),
                desc = evt.desc.as_str(),
                rule_id = evt.rule_id,
                ifname = %evt.ifname,
                pkt_len = evt.pkt_len,
                "event"
            );
        }

        if let Some(sys) = &self.syslog {
            let line = format!(
                "{}: {} (rule {}) on {}",
                evt.evt_type.as_str(),
                evt.desc.as_str(),
                evt.rule_id,
                evt.ifname
            );
            if let Err(e) = sys.send(&line) {
                warn!(error = %e, "syslog delivery failed, skipping sink for this event");
            }
        }

        if self.file.is_some() {
            match self.file_record(&evt) {
                Ok(record) => {
                    if let Some(file) = self.file.as_mut() {
                        if let Err(e) = file.write(&record) {
                            warn!(error = %e, "event file write failed, skipping sink for this event");
                        }
                    }
                }
                Err(e) => {
                    self.crypto_errors += 1;
                    warn!(error = %e, crypto_errors = self.crypto_errors, "event dropped from file sink");
                }
            }
        }

        if let Some(sink) = &self.sink {
            match envelope::seal(&codec::encode(&evt), self.hash_alg, self.publish_enc, self.key.as_ref())
            {
                Ok(record) => {
                    if let Err(e) = sink.publish(&record).await {
                        warn!(error = %e, "publish sink failed, skipping sink for this event");
                    }
                }
                Err(e) => {
                    self.crypto_errors += 1;
                    warn!(error = %e, crypto_errors = self.crypto_errors, "event dropped from publish sink");
                }
            }
        }
    }

    fn file_record(&self, evt: &Event) -> Result<Vec<u8>> {
        match self.cfg.event_file_format {
            EventFileFormat::Binary => {
                envelope::seal(&codec::encode(evt), self.hash_alg, self.file_enc, self.key.as_ref())
            }
            EventFileFormat::Json => {
                let mut line = serde_json::to_vec(evt)
                    .map_err(|e| MuninnError::Config(format!("event json encode: {e}")))?;
                line.push(b'\n');
                Ok(line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventHashAlgorithm;

    fn test_cfg(dir: &std::path::Path) -> EventsConfig {
        EventsConfig {
            event_file_path: dir.to_str().unwrap().to_string(),
            event_file_size_bytes: 1 << 20,
            event_file_format: EventFileFormat::Binary,
            log_to_syslog: false,
            log_to_file: true,
            log_to_console: false,
            encrypt_log_file: false,
            encryption_key: String::new(),
            encryption_algorithm: EventEncryptionAlgorithm::AesCtr128,
            hash_algorithm: EventHashAlgorithm::Sha256,
            event_upload_method: None,
            mqtt_config: None,
            udp_config: None,
            local_unix_config: None,
        }
    }

    fn sample_event(ifname: &str) -> Event {
        let mut evt = Event::new(EventType::Deny, EventDescription::TcpFlagsSynFinSet, 7);
        evt.ifname = ifname.to_string();
        evt.ethertype = 0x0800;
        evt.protocol = 6;
        evt.src_port = 1234;
        evt.dst_port = 80;
        evt
    }

    #[tokio::test]
    async fn test_concurrent_stores_all_drained() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Arc::new(PacketStats::new(vec!["eth0".to_string()]));
        let (sink, mgr) = EventManager::new(test_cfg(dir.path()), stats.clone()).await.unwrap();

        let token = CancellationToken::new();
        let drain = tokio::spawn(mgr.run(token.clone()));

        const SENDERS: usize = 4;
        const PER_SENDER: usize = 25;
        let mut handles = Vec::new();
        for _ in 0..SENDERS {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..PER_SENDER {
                    sink.store(sample_event("eth0"));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // let the drain loop reach quiescence before teardown
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        drain.await.unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap[0].1.n_events, (SENDERS * PER_SENDER) as u64);

        // every record in the file opens and decodes
        let file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let content = std::fs::read(file).unwrap();
        let mut off = 0;
        let mut count = 0;
        while off < content.len() {
            let payload = envelope::open(&content[off..], None).unwrap();
            let (decoded, _) = codec::decode(&payload).unwrap();
            assert_eq!(decoded.rule_id, 7);
            off += envelope::ENVELOPE_HDR_LEN + payload.len();
            count += 1;
        }
        assert_eq!(count, SENDERS * PER_SENDER);
    }
}

//! Frame ingestion: the packet buffer, the raw-socket frame source and the
//! per-interface capture/filter task pair.
//!
//! A packet buffer is owned by exactly one task at a time; ownership moves
//! with the channel send. Per interface, frames are filtered strictly in
//! capture order; there is no cross-interface ordering.

use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::BytesMut;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{MuninnError, Result};
use crate::events::EventSink;
use crate::filters::Filters;
use crate::parser::{Parser, Verdict};
use crate::stats::PacketStats;

const RX_BUF_LEN: usize = 4096;
const PKT_QUEUE_DEPTH: usize = 1024;
/// Poll granularity for shutdown checks in the blocking capture loop.
const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// One captured frame: a contiguous buffer plus its receive timestamp.
#[derive(Debug)]
pub struct Packet {
    data: BytesMut,
    ts: SystemTime,
}

impl Packet {
    pub fn new(frame: &[u8]) -> Self {
        Self { data: BytesMut::from(frame), ts: SystemTime::now() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn timestamp(&self) -> SystemTime {
        self.ts
    }
}

/// The raw receive primitive. The sensor core only consumes byte buffers;
/// tests and the pcap side-car inject frames through the same seam.
pub trait FrameSource: Send {
    /// Blocking receive of one frame into `buf`; returns the frame length.
    /// `WouldBlock`/`TimedOut` mean "nothing yet", any other error is
    /// terminal for this interface.
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// AF_PACKET capture socket bound to one interface.
pub struct RawSocketSource {
    sock: Socket,
}

impl RawSocketSource {
    pub fn open(ifname: &str) -> Result<Self> {
        // protocol field is htons(ETH_P_ALL)
        let proto = Protocol::from(i32::from(0x0003u16.to_be()));
        let sock = Socket::new(Domain::PACKET, Type::RAW, Some(proto)).map_err(|e| {
            MuninnError::Capture { ifname: ifname.to_string(), reason: format!("socket: {e}") }
        })?;
        sock.bind_device(Some(ifname.as_bytes())).map_err(|e| {
            MuninnError::Capture { ifname: ifname.to_string(), reason: format!("bind: {e}") }
        })?;
        sock.set_read_timeout(Some(RECV_TIMEOUT)).map_err(|e| {
            MuninnError::Capture { ifname: ifname.to_string(), reason: format!("timeout: {e}") }
        })?;
        Ok(Self { sock })
    }
}

impl FrameSource for RawSocketSource {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.sock.read(buf)
    }
}

/// In-process frame source for tests and replay: frames pushed into the
/// sender side come out of `recv`.
pub struct ChannelSource {
    rx: std::sync::mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    pub fn new() -> (std::sync::mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = std::sync::mpsc::channel();
        (tx, Self { rx })
    }
}

impl FrameSource for ChannelSource {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.rx.recv_timeout(RECV_TIMEOUT) {
            Ok(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                Err(std::io::ErrorKind::TimedOut.into())
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Err(std::io::ErrorKind::BrokenPipe.into())
            }
        }
    }
}

/// The capture task and filter task of one interface, joined by a bounded
/// queue.
pub struct InterfaceRuntime {
    pub ifname: String,
    capture: JoinHandle<()>,
    filter: JoinHandle<()>,
}

impl InterfaceRuntime {
    pub fn spawn(
        ifname: String,
        mut source: Box<dyn FrameSource>,
        filters: Arc<Filters>,
        stats: Arc<PacketStats>,
        sink: EventSink,
        token: CancellationToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Packet>(PKT_QUEUE_DEPTH);

        let capture_ifname = ifname.clone();
        let capture_stats = stats.clone();
        let capture_token = token.clone();
        let capture = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; RX_BUF_LEN];
            while !capture_token.is_cancelled() {
                match source.recv(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        let pkt = Packet::new(&buf[..n]);
                        capture_stats.inc_n_rx(&capture_ifname);
                        if tx.blocking_send(pkt).is_err() {
                            break;
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue
                    }
                    Err(e) => {
                        // this interface stops capturing; the others carry on
                        warn!(ifname = %capture_ifname, error = %e, "capture terminated");
                        break;
                    }
                }
            }
        });

        let filter_ifname = ifname.clone();
        let filter_token = token;
        let filter = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = filter_token.cancelled() => break,
                    maybe = rx.recv() => {
                        let Some(pkt) = maybe else { break };
                        process_frame(&filter_ifname, &pkt, &filters, &stats, &sink);
                        // drain whatever queued while we were busy
                        while let Ok(pkt) = rx.try_recv() {
                            process_frame(&filter_ifname, &pkt, &filters, &stats, &sink);
                        }
                    }
                }
            }
            info!(ifname = %filter_ifname, "filter task stopped");
        });

        Self { ifname, capture, filter }
    }

    pub async fn join(self) {
        let _ = self.capture.await;
        let _ = self.filter.await;
    }
}

fn process_frame(
    ifname: &str,
    pkt: &Packet,
    filters: &Filters,
    stats: &PacketStats,
    sink: &EventSink,
) {
    let mut parser = Parser::new(ifname, sink, stats);
    let verdict = match parser.run(pkt) {
        Verdict::Deny => Verdict::Deny,
        Verdict::Ok => filters.run(&parser, sink),
    };
    match verdict {
        Verdict::Deny => stats.inc_n_deny(ifname),
        Verdict::Ok => stats.inc_n_allowed(ifname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_delivers_frames() {
        let (tx, mut src) = ChannelSource::new();
        tx.send(vec![1, 2, 3]).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(src.recv(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_channel_source_times_out_when_idle() {
        let (_tx, mut src) = ChannelSource::new();
        let mut buf = [0u8; 16];
        let err = src.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_packet_owns_its_bytes() {
        let frame = [0xAAu8; 60];
        let pkt = Packet::new(&frame);
        assert_eq!(pkt.len(), 60);
        assert_eq!(pkt.as_slice(), &frame);
    }
}

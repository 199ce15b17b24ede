//! Event delivery to the local syslog daemon.
//!
//! Writes RFC 3164 datagrams straight to `/dev/log`, which keeps the crate
//! free of libc bindings.

use std::os::unix::net::UnixDatagram;

const SYSLOG_PATH: &str = "/dev/log";
/// facility daemon(3) << 3 | severity warning(4)
const PRI_DAEMON_WARNING: u8 = 28;

pub struct SyslogWriter {
    sock: UnixDatagram,
    path: String,
}

impl SyslogWriter {
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(SYSLOG_PATH)
    }

    pub fn with_path(path: &str) -> std::io::Result<Self> {
        let sock = UnixDatagram::unbound()?;
        Ok(Self { sock, path: path.to_string() })
    }

    pub fn send(&self, msg: &str) -> std::io::Result<()> {
        let line = format!("<{PRI_DAEMON_WARNING}>muninn: {msg}");
        self.sock.send_to(line.as_bytes(), &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.sock");
        let server = UnixDatagram::bind(&path).unwrap();

        let w = SyslogWriter::with_path(path.to_str().unwrap()).unwrap();
        w.send("Deny: TCP SYN and FIN are both set").unwrap();

        let mut buf = [0u8; 256];
        let n = server.recv(&mut buf).unwrap();
        let line = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(line.starts_with("<28>muninn: Deny:"), "got {line}");
    }
}

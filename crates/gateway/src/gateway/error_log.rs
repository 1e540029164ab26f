use std::io;
use std::io::Write;

use tracing::error;

/// Error-reporting sink handed to applications.
///
/// Bytes written are split into lines, every complete line is emitted as an
/// `error` event under the `micro_gateway::errors` target. A trailing partial
/// line is emitted on flush or drop.
#[derive(Debug, Default)]
pub struct ErrorLog {
    peer: Option<String>,
    pending: Vec<u8>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose events carry the peer address.
    pub fn for_peer<S: Into<String>>(peer: S) -> Self {
        Self { peer: Some(peer.into()), pending: Vec::new() }
    }

    fn emit(&self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        error!(target: "micro_gateway::errors", peer = self.peer.as_deref().unwrap_or("-"), "{line}");
    }
}

impl Write for ErrorLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.emit(&line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
        Ok(())
    }
}

impl Drop for ErrorLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_partial_lines() {
        let mut log = ErrorLog::for_peer("127.0.0.1");

        write!(log, "first line\nsecond").unwrap();
        assert_eq!(log.pending, b"second");

        writeln!(log, " half").unwrap();
        assert!(log.pending.is_empty());

        log.write_all(b"dangling").unwrap();
        log.flush().unwrap();
        assert!(log.pending.is_empty());
    }
}

//! Line protocol decoder for worker output.
//!
//! The worker speaks a tiny line-oriented protocol:
//!
//! ```text
//! PROGRESS:<number>     (stdout)  -> JobEvent::Progress
//! ERROR:<message>       (stderr)  -> JobEvent::Error
//! anything else                   -> JobEvent::Log
//! ```
//!
//! [`LineDecoder`] buffers partial lines across chunk boundaries, one
//! decoder per stream. Malformed input never produces an error: it is
//! logged and dropped.

use crate::events::JobEvent;

/// Prefix of a progress line.
pub const PROGRESS_PREFIX: &str = "PROGRESS:";

/// Prefix of an error line (only meaningful on stderr).
pub const ERROR_PREFIX: &str = "ERROR:";

/// Longest line the decoder will buffer. Longer lines are dropped whole.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Which worker output stream a decoder is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Incremental decoder for one output stream.
#[derive(Debug)]
pub struct LineDecoder {
    stream: StreamKind,
    pending: Vec<u8>,
    /// Bytes dropped so far from the current oversized line.
    overflow: usize,
}

impl LineDecoder {
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            overflow: 0,
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Feed a raw chunk and return the events for every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<JobEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.buffer(&rest[..pos]);
            if let Some(event) = self.take_line() {
                events.push(event);
            }
            rest = &rest[pos + 1..];
        }

        self.buffer(rest);
        events
    }

    /// Flush an unterminated final line once the stream has closed.
    pub fn finish(&mut self) -> Option<JobEvent> {
        if self.pending.is_empty() && self.overflow == 0 {
            return None;
        }
        self.take_line()
    }

    fn buffer(&mut self, bytes: &[u8]) {
        if self.overflow > 0 || self.pending.len() + bytes.len() > MAX_LINE_BYTES {
            self.overflow += self.pending.len() + bytes.len();
            self.pending.clear();
        } else {
            self.pending.extend_from_slice(bytes);
        }
    }

    fn take_line(&mut self) -> Option<JobEvent> {
        if self.overflow > 0 {
            tracing::warn!(
                stream = self.stream.as_str(),
                len = self.overflow,
                max = MAX_LINE_BYTES,
                "Discarding oversized worker output line",
            );
            self.overflow = 0;
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        classify_line(self.stream, &line)
    }
}

/// Classify one complete line (without its `\n`).
///
/// Returns `None` for lines that carry nothing: blank lines, lines that are
/// not valid UTF-8, and `PROGRESS:` lines with an unparsable number.
pub fn classify_line(stream: StreamKind, raw: &[u8]) -> Option<JobEvent> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(
                stream = stream.as_str(),
                len = raw.len(),
                error = %e,
                "Discarding non-UTF-8 worker output line",
            );
            return None;
        }
    };

    if line.trim().is_empty() || line.contains('\0') {
        return None;
    }

    if let Some(payload) = line.strip_prefix(PROGRESS_PREFIX) {
        return match parse_progress(payload) {
            Some(progress) => Some(JobEvent::Progress { progress }),
            None => {
                tracing::warn!(
                    stream = stream.as_str(),
                    payload,
                    "Discarding malformed progress line",
                );
                None
            }
        };
    }

    if stream == StreamKind::Stderr {
        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return Some(JobEvent::Error {
                message: message.trim().to_string(),
            });
        }
    }

    Some(JobEvent::Log {
        text: line.to_string(),
    })
}

/// Parse a progress payload into a percentage clamped to `0..=100`.
fn parse_progress(payload: &str) -> Option<f64> {
    let value: f64 = payload.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 100.0))
}

//! Newline-delimited JSON framing for stream events
//!
//! One event per line. The decoder is incremental: it buffers bytes,
//! splits on record boundaries, and holds any incomplete trailing fragment
//! for the next feed rather than parsing prematurely. Truncated records
//! are expected during normal buffering; a malformed *complete* record is
//! skipped (with a log line, never silently) rather than aborting the
//! whole exchange.

use tracing::warn;

use super::StreamEvent;

/// Encode one event as a framed record
pub fn encode_frame(event: &StreamEvent) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(event)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Incremental frame decoder
///
/// `feed` returns zero or more complete events per call and retains any
/// partial trailing bytes internally between calls.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    skipped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every complete event they finish
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<StreamEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    // Dropping these silently could mask a real decoding bug
                    self.skipped += 1;
                    warn!(
                        error = %e,
                        record = %String::from_utf8_lossy(line),
                        "skipping malformed stream record"
                    );
                }
            }
        }
        events
    }

    /// Number of malformed complete records skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Bytes of the incomplete trailing fragment currently buffered
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

//! SSE line codec for event records.
//!
//! The wire format delimits records by a `data: ` line prefix and a
//! blank-line terminator. Input arrives as arbitrarily sized byte chunks
//! that may split a record mid-line, so [`SseDecoder`] buffers the trailing
//! incomplete fragment and prepends it to the next chunk. Fragments that do
//! not parse as a complete record (heartbeats, comments, torn JSON) are
//! dropped silently: protocol noise, not errors.

use crate::models::EventRecord;
use tracing::debug;

/// Line prefix carrying a record payload.
const DATA_PREFIX: &str = "data: ";

/// Stateful decoder holding the unparsed tail between chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    carry: Vec<u8>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw chunk and returns every record it completes.
    ///
    /// A trailing fragment without a newline stays buffered until the next
    /// call; at end of input an unterminated fragment is simply discarded,
    /// like any other partial frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EventRecord> {
        self.carry.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.carry.drain(..=pos).collect();
            line.pop(); // trailing '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            parse_line(&line, &mut records);
        }

        records
    }
}

/// Parse one complete line, appending a record if it carries one.
fn parse_line(line: &[u8], out: &mut Vec<EventRecord>) {
    let Ok(text) = std::str::from_utf8(line) else {
        debug!("dropping non-utf8 line ({} bytes)", line.len());
        return;
    };

    // Blank separators, comments, and non-data fields are noise to us.
    let Some(payload) = text.strip_prefix(DATA_PREFIX) else {
        return;
    };

    match serde_json::from_str::<EventRecord>(payload) {
        Ok(record) => out.push(record),
        Err(err) => debug!("dropping unparseable event fragment: {}", err),
    }
}

/// Frames a record for the outbound wire.
pub fn encode_record(record: &EventRecord) -> serde_json::Result<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(record)?))
}

//! Decoder for index-prefixed line streams (`0:...`, `1:...`).
//!
//! Only the root value on the line tagged `1:` carries data; other frames are skipped.

const PAYLOAD_PREFIX: &str = "1:";

/// Returns the payload of the first line starting with `1:`, prefix stripped.
pub fn decode(body: &str) -> Option<&str> {
    body.lines()
        .find_map(|line| line.strip_prefix(PAYLOAD_PREFIX))
        .map(|payload| payload.trim_end_matches('\r'))
}

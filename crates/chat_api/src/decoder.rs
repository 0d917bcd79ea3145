use std::str;

/// Record separator: one blank line.
pub const RECORD_SEPARATOR: &str = "\n\n";

const REPLACEMENT: char = '\u{FFFD}';

/// Incremental splitter for blank-line delimited text streams.
///
/// Bytes are decoded as UTF-8 in streaming mode: a code point split across two
/// fragments is held back until the rest of it arrives. Invalid sequences decode
/// to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending_bytes: Vec<u8>,
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment and drain every record completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        if bytes.is_empty() {
            return Vec::new();
        }

        self.decode_streaming(bytes);

        let mut records = Vec::new();
        while let Some(split) = self.buffer.find(RECORD_SEPARATOR) {
            let record = self.buffer[..split].to_string();
            self.buffer.drain(0..split + RECORD_SEPARATOR.len());
            records.push(record);
        }

        records
    }

    /// Split a complete payload in one shot.
    pub fn split_records(input: &str) -> Vec<String> {
        let mut decoder = Self::default();
        decoder.feed(input.as_bytes())
    }

    /// End of input. Never synthesizes a record; the discarded remainder, if any,
    /// is returned so callers can report it.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            self.buffer.push(REPLACEMENT);
            self.pending_bytes.clear();
        }

        let remainder = std::mem::take(&mut self.buffer);
        if remainder.trim().is_empty() {
            None
        } else {
            Some(remainder)
        }
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.pending_bytes.is_empty() && self.buffer.trim().is_empty()
    }

    fn decode_streaming(&mut self, bytes: &[u8]) {
        let owned;
        let mut input: &[u8] = if self.pending_bytes.is_empty() {
            bytes
        } else {
            self.pending_bytes.extend_from_slice(bytes);
            owned = std::mem::take(&mut self.pending_bytes);
            &owned
        };

        loop {
            match str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(error) => {
                    let (valid, rest) = input.split_at(error.valid_up_to());
                    if let Ok(text) = str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }

                    match error.error_len() {
                        Some(len) => {
                            self.buffer.push(REPLACEMENT);
                            input = &rest[len..];
                        }
                        None => {
                            // Incomplete trailing sequence; wait for the next fragment.
                            self.pending_bytes.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameDecoder;

    #[test]
    fn split_code_point_is_held_until_completed() {
        let mut decoder = FrameDecoder::new();
        let bytes = "data: é\n\n".as_bytes();
        let cut = bytes.iter().position(|byte| *byte == 0xC3).expect("lead byte");

        assert!(decoder.feed(&bytes[..=cut]).is_empty());
        assert!(!decoder.is_empty_buffer());
        assert_eq!(decoder.feed(&bytes[cut + 1..]), vec!["data: é".to_string()]);
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn separator_split_across_fragments() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: a\n").is_empty());
        assert_eq!(decoder.feed(b"\ndata: b\n\n"), vec!["data: a", "data: b"]);
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"a\xFFb\n\n"), vec!["a\u{FFFD}b".to_string()]);
    }

    #[test]
    fn finish_reports_but_never_emits_remainder() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"chunk\"").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("data: {\"type\":\"chunk\""));
        assert!(decoder.is_empty_buffer());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn empty_fragment_yields_nothing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"").is_empty());
        assert!(decoder.is_empty_buffer());
    }
}

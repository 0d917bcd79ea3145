use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::decoder::FrameDecoder;
use crate::error::ChatApiError;
use crate::events::{
    ParsedEvent, CHUNK_EVENT, COMPLETE_EVENT, ERROR_EVENT, SOURCES_EVENT, SOURCE_CHUNKS_EVENT,
    START_EVENT,
};

/// Line prefix that marks an event line inside a record.
pub const DATA_PREFIX: &str = "data:";

/// Decoder plus event extraction: bytes in, typed events out.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    decoder: FrameDecoder,
}

impl EventStreamParser {
    /// Feed arbitrary bytes and drain the events of every completed record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParsedEvent> {
        self.decoder
            .feed(bytes)
            .iter()
            .flat_map(|record| parse_record(record))
            .collect()
    }

    /// Parse a complete payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ParsedEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// End of input; an unterminated trailing record is dropped.
    pub fn finish(&mut self) {
        if let Some(remainder) = self.decoder.finish() {
            tracing::debug!(
                target: "chat_api",
                bytes = remainder.len(),
                "discarding unterminated record at end of stream"
            );
        }
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.decoder.is_empty_buffer()
    }
}

/// Extract every event carried by one record.
///
/// A malformed line is logged and skipped; the remaining lines still parse.
pub fn parse_record(record: &str) -> Vec<ParsedEvent> {
    record
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
        .filter_map(|payload| match parse_event_payload(payload) {
            Ok(event) => Some(event),
            Err(error) => {
                tracing::warn!(target: "chat_api", %error, payload, "skipping malformed event");
                None
            }
        })
        .collect()
}

/// Parse the JSON text following a `data:` prefix.
pub fn parse_event_payload(payload: &str) -> Result<ParsedEvent, ChatApiError> {
    let value = serde_json::from_str::<Value>(payload)
        .map_err(|error| ChatApiError::MalformedEvent(format!("invalid JSON: {error}")))?;
    map_event(value)
}

fn map_event(mut value: Value) -> Result<ParsedEvent, ChatApiError> {
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ChatApiError::MalformedEvent("missing string field 'type'".to_owned()))?
        .to_owned();

    Ok(match event_type.as_str() {
        START_EVENT => ParsedEvent::Start,
        CHUNK_EVENT => ParsedEvent::Chunk {
            content: take_content(&mut value, &event_type)?,
        },
        SOURCES_EVENT => ParsedEvent::Sources {
            content: take_content(&mut value, &event_type)?,
        },
        SOURCE_CHUNKS_EVENT => ParsedEvent::SourceChunks {
            content: take_content(&mut value, &event_type)?,
        },
        ERROR_EVENT => ParsedEvent::Error {
            content: take_content(&mut value, &event_type)?,
        },
        COMPLETE_EVENT => ParsedEvent::Complete,
        _ => ParsedEvent::Unrecognized {
            event_type,
            payload: value,
        },
    })
}

fn take_content<T: DeserializeOwned>(
    value: &mut Value,
    event_type: &str,
) -> Result<T, ChatApiError> {
    let content = value
        .get_mut("content")
        .map(Value::take)
        .ok_or_else(|| {
            ChatApiError::MalformedEvent(format!("'{event_type}' event is missing 'content'"))
        })?;

    serde_json::from_value(content).map_err(|error| {
        ChatApiError::MalformedEvent(format!("'{event_type}' event has invalid content: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_event_payload, parse_record, EventStreamParser};
    use crate::error::ChatApiError;
    use crate::events::{ParsedEvent, SourceChunk};

    #[test]
    fn parse_frames_incrementally() {
        let mut parser = EventStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"data: {\"type\":\"chunk\",\"content\":\"Hel\"}\n\n"));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: {\"type\":\"complete\"}\n\n"));
        assert_eq!(events.len(), 2);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn record_without_data_lines_yields_nothing() {
        assert!(parse_record("event: ping\nid: 4").is_empty());
        assert!(parse_record(": keep-alive").is_empty());
    }

    #[test]
    fn every_data_line_in_a_record_is_parsed() {
        let record = concat!(
            "data: {\"type\":\"sources\",\"content\":[\"a.pdf\"]}\n",
            "data: {\"type\":\"complete\"}"
        );
        assert_eq!(
            parse_record(record),
            vec![
                ParsedEvent::Sources {
                    content: vec!["a.pdf".to_string()],
                },
                ParsedEvent::Complete,
            ]
        );
    }

    #[test]
    fn wrong_content_shape_is_malformed() {
        let error = parse_event_payload(r#"{"type":"chunk","content":["not","text"]}"#)
            .expect_err("array content must be rejected for chunk");
        assert!(matches!(error, ChatApiError::MalformedEvent(_)));

        let error = parse_event_payload(r#"{"type":"error"}"#)
            .expect_err("error without content must be rejected");
        assert!(matches!(error, ChatApiError::MalformedEvent(_)));
    }

    #[test]
    fn source_chunks_tolerate_missing_url() {
        let event = parse_event_payload(
            r#"{"type":"source_chunks","content":[{"source":"Manual (p. 2)","content":"line 1\nline 2"}]}"#,
        )
        .expect("source chunk without url should parse");

        assert_eq!(
            event,
            ParsedEvent::SourceChunks {
                content: vec![SourceChunk::new("Manual (p. 2)", "", "line 1\nline 2")],
            }
        );
    }
}

use bytes::Bytes;
use serde::Serialize;

/// One decoded server-sent event: optional `event:` name plus joined
/// `data:` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE decoder. Feed arbitrary byte chunks; complete events
/// come out as soon as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    pending_event: Option<String>,
    pending_data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        match std::str::from_utf8(chunk) {
            Ok(text) => self.feed_str(text),
            Err(_) => Vec::new(),
        }
    }

    pub fn feed_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                self.flush_pending(&mut out);
            } else {
                self.consume_line(&line);
            }
        }
        out
    }

    /// Drain whatever is buffered at end of stream.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if !self.buffer.is_empty() {
            let mut line = std::mem::take(&mut self.buffer);
            if line.ends_with('\r') {
                line.pop();
            }
            self.consume_line(&line);
        }
        let mut out = Vec::new();
        self.flush_pending(&mut out);
        out
    }

    fn consume_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.pending_event = (!value.is_empty()).then(|| value.to_string());
            }
            "data" => self.pending_data.push(value.to_string()),
            _ => {}
        }
    }

    fn flush_pending(&mut self, out: &mut Vec<SseEvent>) {
        if self.pending_event.is_none() && self.pending_data.is_empty() {
            return;
        }
        out.push(SseEvent {
            event: self.pending_event.take(),
            data: self.pending_data.join("\n"),
        });
        self.pending_data.clear();
    }
}

/// `data: {json}\n\n` framing (OpenAI chat completions streams).
pub fn encode_data<T: Serialize>(value: &T) -> Option<Bytes> {
    let payload = serde_json::to_vec(value).ok()?;
    let mut bytes = Vec::with_capacity(payload.len() + 8);
    bytes.extend_from_slice(b"data: ");
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(b"\n\n");
    Some(Bytes::from(bytes))
}

/// `event: name\ndata: {json}\n\n` framing (Anthropic message streams).
pub fn encode_named_event<T: Serialize>(name: &str, value: &T) -> Option<Bytes> {
    let payload = serde_json::to_vec(value).ok()?;
    let mut bytes = Vec::with_capacity(payload.len() + name.len() + 16);
    bytes.extend_from_slice(b"event: ");
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(b"\ndata: ");
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(b"\n\n");
    Some(Bytes::from(bytes))
}

/// The literal terminator OpenAI-dialect streams end with.
pub const DONE_MARKER: &str = "[DONE]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed_str("data: {\"a\"").is_empty());
        let events = decoder.feed_str(":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].data, DONE_MARKER);
    }

    #[test]
    fn decodes_named_events_and_comments() {
        let mut decoder = SseDecoder::new();
        let events =
            decoder.feed_str(": keepalive\nevent: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message_stop"));
    }

    #[test]
    fn finish_drains_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed_str("data: tail").is_empty());
        let events = decoder.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    #[test]
    fn multiline_data_joined_with_newline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed_str("data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
    }
}

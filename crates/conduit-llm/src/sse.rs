//! Provider-neutral SSE frame decoder (shared by all three stream handlers
//! and by MCP's `sse` transport).
//!
//! Frames are terminated by a blank line; within a frame, `event:` sets the
//! frame's type (default `"message"`) and one or more `data:` lines are
//! joined with `\n`. A bare `{`/`[` line is tolerated as data without a
//! `data:` prefix, since some upstreams omit it.

use async_stream::stream;
use futures::Stream;

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, or `"message"` if absent.
    pub event_type: String,
    /// The joined `data:` payload.
    pub data: String,
}

/// Incremental SSE decoder holding a carry-over buffer across chunks.
///
/// `decode(concat(chunks)) == decode(chunks)` for any split of the input at
/// arbitrary byte boundaries — pushing one byte at a time yields the same
/// frames as pushing the whole buffer at once.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    /// A fresh decoder with an empty carry-over buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning any frames completed by it.
    ///
    /// Never errors: malformed or partial frames are held in the buffer (or
    /// silently dropped at frame-parse time), never raised as failures.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        // Normalize line endings so "\r\n\r\n" and "\n\n" boundaries are
        // found by the same search, regardless of where a chunk split fell.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        self.drain_complete_frames()
    }

    fn drain_complete_frames(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find("\n\n") {
            let frame = self.buffer[..idx].to_string();
            self.buffer.drain(..=idx + 1);
            if let Some(event) = parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }

    /// Signal end-of-stream. Any incomplete tail in the buffer is dropped,
    /// per the decoder's contract (`§4.3`: "at end-of-stream any partial
    /// tail is emitted only if complete; otherwise dropped").
    pub fn finish(self) {}
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event_type: Option<String> = None;
    let mut data_parts: Vec<&str> = Vec::new();

    for line in frame.split('\n') {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_parts.push(rest.trim_start());
        } else if line.starts_with('{') || line.starts_with('[') {
            data_parts.push(line);
        }
        // anything else (comments, `id:`, unrecognized fields) is ignored.
    }

    if data_parts.is_empty() {
        return None;
    }

    Some(SseEvent {
        event_type: event_type.unwrap_or_else(|| "message".to_string()),
        data: data_parts.join("\n"),
    })
}

/// Decode a byte stream (as produced by `reqwest::Response::bytes_stream`)
/// into a lazy sequence of [`SseEvent`]s.
pub fn decode_stream<S, B, E>(mut bytes: S) -> impl Stream<Item = SseEvent>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    stream! {
        let mut decoder = SseDecoder::new();
        use futures::StreamExt;
        while let Some(chunk) = bytes.next().await {
            let Ok(chunk) = chunk else { break };
            for event in decoder.push(chunk.as_ref()) {
                yield event;
            }
        }
        decoder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_content_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message_stop\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "message_stop");
        assert_eq!(events[0].data, "{}");
    }

    #[test]
    fn default_event_type_is_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(events[0].event_type, "message");
    }

    #[test]
    fn multiple_data_lines_are_newline_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn bare_brace_line_is_tolerated_as_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"{\"tolerated\":true}\n\n");
        assert_eq!(events[0].data, "{\"tolerated\":true}");
    }

    #[test]
    fn crlf_terminated_frames_decode_identically() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: done\r\ndata: {}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "done");
    }

    #[test]
    fn decode_is_invariant_to_chunk_splitting() {
        let whole = b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n";

        let mut one_shot = SseDecoder::new();
        let baseline = one_shot.push(whole);

        for split in 0..whole.len() {
            let mut decoder = SseDecoder::new();
            let mut events = decoder.push(&whole[..split]);
            events.extend(decoder.push(&whole[split..]));
            assert_eq!(events, baseline, "mismatch splitting at byte {split}");
        }
    }

    #[test]
    fn incomplete_tail_is_dropped_at_finish() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: partial\ndata: not terminated");
        assert!(events.is_empty());
        decoder.finish();
    }

    #[test]
    fn blank_lines_between_frames_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }
}

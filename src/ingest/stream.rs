//! Framing for the node's newline-delimited JSON subscriptions.

use bytes::{Buf, BytesMut};

use crate::config::EventStream;
use crate::lnd::types::StreamFrame;
use crate::lnd::NodeError;

/// Splits a chunked response body into complete lines.
///
/// Chunk boundaries carry no meaning: a message may arrive split across
/// several chunks, or several messages may share one.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, without the
    /// trailing newline. Blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);

            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Whatever is left once the body ends, if it is more than whitespace.
    pub fn finish(self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decode one line of a subscription.
///
/// Returns the event payload, `None` for a frame without one (keep-alive),
/// or the node's error frame as an error.
pub fn decode_message(
    stream: EventStream,
    line: &str,
) -> Result<Option<serde_json::Value>, NodeError> {
    let frame: StreamFrame = serde_json::from_str(line).map_err(|e| NodeError::Malformed {
        stream,
        reason: e.to_string(),
    })?;

    if let Some(error) = frame.error {
        return Err(NodeError::Stream {
            stream,
            code: error.code,
            message: error.message,
        });
    }
    Ok(frame.result.filter(|value| !value.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(br#"{"result":{"memo":"#).is_empty());
        assert!(decoder.pending() > 0);

        let lines = decoder.push(b"\"coffee\"}}\n{\"result\":{}}\n");
        assert_eq!(lines, vec![r#"{"result":{"memo":"coffee"}}"#, r#"{"result":{}}"#]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_blank_lines_and_crlf_are_skipped() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"\r\n\n{\"result\":1}\r\n");
        assert_eq!(lines, vec![r#"{"result":1}"#]);
    }

    #[test]
    fn test_finish_returns_unterminated_tail() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"result\":2}");
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"result":2}"#));

        let decoder = LineDecoder::new();
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decode_result_frame() {
        let value = decode_message(EventStream::Invoices, r#"{"result":{"value":"1000"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({"value": "1000"}));
    }

    #[test]
    fn test_decode_keepalive_frame() {
        assert!(decode_message(EventStream::Channels, "{}").unwrap().is_none());
        assert!(decode_message(EventStream::Channels, r#"{"result":null}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_error_frame() {
        let err = decode_message(
            EventStream::Transactions,
            r#"{"error":{"code":14,"message":"unavailable"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, NodeError::Stream { code: 14, .. }));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_message(EventStream::Invoices, "not json").unwrap_err();
        assert!(matches!(err, NodeError::Malformed { stream: EventStream::Invoices, .. }));
    }
}

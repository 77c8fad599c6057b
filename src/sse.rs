//! Server-sent event framing for streaming search responses.
//!
//! Each event is framed as:
//!
//! ```text
//! event: <event_type>\n
//! data: <JSON payload on one line>\n
//! \n
//! ```
//!
//! The payload is compact JSON, which never contains raw newlines, so one
//! `data:` line always suffices.

use crate::models::StreamEvent;

/// Content type for SSE responses.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Frame a single event as an SSE chunk.
pub fn format_event(event: &StreamEvent) -> String {
    let payload = serde_json::to_string(&event.data)
        .unwrap_or_else(|_| "{}".to_string());
    format!("event: {}\ndata: {}\n\n", event.event, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event_framing() {
        let event = StreamEvent::new("done", serde_json::json!({"total_scanned": 2}));
        let framed = format_event(&event);
        assert_eq!(framed, "event: done\ndata: {\"total_scanned\":2}\n\n");
    }

    #[test]
    fn test_format_event_payload_is_one_line() {
        let event = StreamEvent::new(
            "result",
            serde_json::json!({"summary": "line one\nline two", "index": 1}),
        );
        let framed = format_event(&event);
        // The embedded newline is escaped in JSON, so exactly the two
        // protocol newlines plus the terminator remain
        assert_eq!(framed.matches('\n').count(), 3);
        assert!(framed.ends_with("\n\n"));
        assert!(framed.contains("line one\\nline two"));
    }

    #[test]
    fn test_format_event_utf8_payload() {
        let event = StreamEvent::new("criteria", serde_json::json!({"lang": "中文"}));
        let framed = format_event(&event);
        assert!(framed.contains("中文"));
    }
}

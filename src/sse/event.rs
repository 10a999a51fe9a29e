//! Server-Sent Events frames.

use std::fmt;

/// Event type of streamed scan results.
pub const RESULT_EVENT_TYPE: &str = "contentscan/property/result";

/// Content type of an event stream response.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// One event sent to every streaming client.
///
/// `data` is written as a single `data:` line, so it must not contain line
/// breaks. Compact JSON never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    event_type: String,
    data: String,
}

impl SseEvent {
    /// Creates an event.
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// Returns the event type.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Encodes the event as a wire frame.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event: {}\ndata: {}\n\n", self.event_type, self.data)
    }
}

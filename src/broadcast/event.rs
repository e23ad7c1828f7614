//! Live stream event types and their wire encoding.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::capture::record::RequestRecord;

const CONNECTED_MESSAGE: &str = "SSE connection established";

/// An event pushed to live viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent<'a> {
    /// Sent once when a viewer attaches.
    Connected { message: &'static str },
    /// Keeps idle streams alive through intermediaries.
    Heartbeat { timestamp: i64 },
    /// A request was captured.
    NewRequest { data: &'a RequestRecord },
}

impl<'a> StreamEvent<'a> {
    pub fn connected() -> Self {
        StreamEvent::Connected {
            message: CONNECTED_MESSAGE,
        }
    }

    pub fn heartbeat(timestamp: i64) -> Self {
        StreamEvent::Heartbeat { timestamp }
    }

    pub fn new_request(record: &'a RequestRecord) -> Self {
        StreamEvent::NewRequest { data: record }
    }

    /// Serialize once; the frame is shared by every subscriber.
    pub fn encode(&self) -> Result<EventFrame, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(EventFrame(Arc::from(json)))
    }
}

/// A pre-serialized JSON event payload. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame(Arc<str>);

impl EventFrame {
    /// The JSON payload.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `data: <json>\n\n` text form used on event streams.
    pub fn to_sse_text(&self) -> String {
        format!("data: {}\n\n", self.0)
    }
}

impl fmt::Display for EventFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

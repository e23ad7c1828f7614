//! Live event stream endpoint (Server-Sent Events).
//!
//! # Data Flow
//! ```text
//! GET /api/events
//!     → ChannelSink + receiver (bounded by stream.buffer_capacity)
//!     → BroadcastHub::connect (connected event, register, heartbeat)
//!     → receiver adapted to an SSE body: `data: <json>\n\n`
//!
//! Viewer hangs up → body stream dropped → DisconnectGuard closes the connection
//! Connection closed → sink closed → receiver drains → body ends
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::broadcast::{ChannelSink, DisconnectGuard};
use crate::http::error::{ApiError, ApiResult};
use crate::http::server::AppState;

pub async fn event_stream(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let stream_config = &state.config.stream;
    let (sink, rx) = ChannelSink::channel(stream_config.buffer_capacity);

    let conn = state
        .pipeline
        .hub()
        .connect(Arc::new(sink), Duration::from_secs(stream_config.heartbeat_secs))
        .map_err(|_| ApiError::service_unavailable("event stream could not be opened"))?;

    let guard = DisconnectGuard::new(conn);
    let events = ReceiverStream::new(rx).map(move |frame| {
        // The guard lives as long as the body stream.
        let _guard = &guard;
        Ok::<_, Infallible>(Event::default().data(frame.as_str()))
    });

    Ok(Sse::new(events))
}

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → /api/echo/*       → handlers.rs capture_request → IngestionPipeline
//!     → /api/requests     → handlers.rs (history, single record, reset)
//!     → /api/events       → stream.rs (SSE over a SubscriberConnection)
//!     → error.rs (store/capture errors → JSON status responses)
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;
pub mod stream;

pub use error::{ApiError, ApiResult};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

//! Personal request bin library.
//!
//! Captures arbitrary inbound HTTP requests, keeps an ordered history of
//! them and streams every new capture to live viewers.

pub mod broadcast;
pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use broadcast::BroadcastHub;
pub use capture::{IngestionPipeline, RequestRecord};
pub use config::BinConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::{MemoryStore, RequestStore};

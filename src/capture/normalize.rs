//! Inbound request normalization.
//!
//! # Responsibilities
//! - Decode the body by declared content type (JSON, form, text)
//! - Flatten headers into a lowercase name → value map
//! - Rebuild the absolute URL the client addressed
//!
//! # Design Decisions
//! - Normalization never fails; undecodable bodies become a placeholder
//! - Timestamp is the arrival time, taken before the body is read

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};

use crate::capture::record::{RecordBody, RecordId, RequestRecord};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Body as handed over by the transport.
#[derive(Debug, Clone)]
pub enum RawBody {
    /// No payload was sent.
    Empty,
    Bytes(Bytes),
    /// The transport failed to deliver the payload (size limit, broken stream).
    Unreadable,
}

impl RawBody {
    pub fn from_bytes(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            RawBody::Empty
        } else {
            RawBody::Bytes(bytes)
        }
    }
}

/// Transport-level view of a request, before normalization.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Absolute URL as addressed by the client.
    pub url: String,
    pub headers: HeaderMap,
    pub body: RawBody,
    /// Milliseconds since the epoch, taken before the body was read.
    pub received_at: i64,
}

/// Build a [`RequestRecord`] from raw transport data.
pub fn normalize(raw: RawRequest) -> RequestRecord {
    let content_type = raw
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = decode_body(content_type, &raw.body);

    RequestRecord {
        id: RecordId::generate(),
        timestamp: raw.received_at,
        method: raw.method.as_str().to_ascii_uppercase(),
        url: raw.url,
        headers: collect_headers(&raw.headers),
        body,
    }
}

/// Decode a body according to its declared content type.
pub fn decode_body(content_type: Option<&str>, body: &RawBody) -> RecordBody {
    let bytes = match body {
        RawBody::Empty => return RecordBody::Absent,
        RawBody::Unreadable => return RecordBody::DecodeFailed,
        RawBody::Bytes(bytes) => bytes,
    };

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains(JSON_CONTENT_TYPE) {
        match serde_json::from_slice(bytes) {
            Ok(value) => RecordBody::Json(value),
            Err(e) => {
                tracing::debug!(error = %e, "JSON body failed to parse");
                RecordBody::DecodeFailed
            }
        }
    } else if content_type.contains(FORM_CONTENT_TYPE) {
        let fields: serde_json::Map<String, serde_json::Value> = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
            .collect();
        RecordBody::Json(serde_json::Value::Object(fields))
    } else {
        RecordBody::Text(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Flatten a header map. Repeated headers are joined with `", "`.
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// Rebuild the absolute URL for an origin-form request URI.
///
/// Scheme comes from `X-Forwarded-Proto` (default `http`), authority from
/// the `Host` header, falling back to `fallback_host`.
pub fn reconstruct_url(uri: &Uri, headers: &HeaderMap, fallback_host: &str) -> String {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or(fallback_host);
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("{}://{}{}", scheme, host, path_and_query)
}

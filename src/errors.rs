//! Error taxonomy for the ingestion and query pipeline.
//!
//! Top-level glue code (startup, migrations, CLI argument handling) keeps
//! using `anyhow::Result`, exactly as the rest of this codebase's ancestry
//! does. Components with a disposition table in the spec get a typed
//! `thiserror` enum instead, so callers can match on *which* failure
//! happened without parsing strings.

use anyhow::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Display an error, plus all the underlying "causes" (ie, wrapped errors), plus a
/// backtrace.
pub fn display_causes_and_backtrace(err: &Error) {
    eprintln!("Error: {}", err);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    eprintln!("{}", err.backtrace());
}

/// Failures that can occur while driving a single message through
/// normalization, enrichment, and the dual-store write (C2-C4).
///
/// `Geocoder` and `DuplicateQuery` are never actually propagated as hard
/// failures: both stages catch their own errors and degrade gracefully (see
/// [`crate::enrichment`]). The variants exist so that degrade path can still
/// be logged with a typed cause rather than a bare string.
#[derive(Debug, ThisError)]
pub enum IngestError {
    /// The queue payload could not be parsed as a listing message.
    #[error("malformed listing message: {0}")]
    Malformed(String),

    /// The geocoder failed or timed out. Non-fatal; logged and the listing
    /// proceeds without coordinates.
    #[error("geocoder failure: {0}")]
    Geocoder(#[source] anyhow::Error),

    /// The duplicate-candidate query against the relational store failed.
    /// Non-fatal; logged and treated as an empty candidate set.
    #[error("duplicate-candidate query failed: {0}")]
    DuplicateQuery(#[source] anyhow::Error),

    /// The relational upsert failed.
    #[error("relational write failed: {0}")]
    RelationalWrite(#[source] anyhow::Error),

    /// The search-index upsert failed after a successful relational write.
    #[error("search index write failed: {0}")]
    SearchWrite(#[source] anyhow::Error),
}

impl IngestError {
    /// Should a message that failed this way be nacked without requeue?
    ///
    /// `Geocoder` and `DuplicateQuery` should never reach this check, since
    /// both are caught and absorbed before [`crate::pipeline::ingest_one`]
    /// returns, but we give them a conservative answer anyway.
    pub fn should_nack(&self) -> bool {
        true
    }
}

/// Failures surfaced by the query API (C5), mapped directly to HTTP
/// responses. `Internal`'s source is logged but never rendered in the
/// response body.
#[derive(Debug, ThisError)]
pub enum ApiError {
    /// A request parameter was invalid. The message is safe to show to API
    /// clients.
    #[error("{0}")]
    BadRequest(String),

    /// The client exceeded its rate-limit budget.
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds until the client may retry.
        retry_after_secs: u64,
    },

    /// The search store failed while serving a read. Distinct from
    /// `Internal` because reads on this path must never be cached.
    #[error("search backend unavailable")]
    SearchUnavailable(#[source] anyhow::Error),

    /// Anything else unexpected.
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

/// The JSON body returned for any API error.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_owned(),
                Some(*retry_after_secs),
            ),
            ApiError::SearchUnavailable(err) => {
                tracing::error!(error = %err, "search backend unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                    None,
                )
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                    None,
                )
            }
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

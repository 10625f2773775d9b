//! Crate-level error type.
//!
//! Malformed stream frames are not errors: the decoder reports them as
//! [`SkipReason`](crate::sse::SkipReason) and keeps going.

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, NavError>;

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// The enrichment stream could not be fetched or broke mid-body.
    ///
    /// Callers recover by keeping the fallback packet list.
    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    /// The route has no legs or no steps; simulation cannot be armed.
    #[error("route {route_index} has no legs or steps")]
    EmptyRouteData { route_index: usize },

    #[error("route index {index} out of range ({count} routes)")]
    RouteIndexOutOfRange { index: usize, count: usize },

    #[error("no route selected")]
    NoRouteSelected,

    #[error("no routes found between the specified locations")]
    NoRoutes,

    /// `{ "error": ... }` body returned by the server.
    #[error("server error: {0}")]
    Server(String),

    #[error("invalid polyline at byte {offset}")]
    InvalidPolyline { offset: usize },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

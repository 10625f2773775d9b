//! HTTP wire protocol spoken with the Smart Drive server.
//!
//! This module owns **every message that crosses the HTTP boundary**.
//!
//! ## Endpoints
//!
//! | Path              | Method | Request                | Response                       |
//! |-------------------|--------|------------------------|--------------------------------|
//! | `/analyze_route`  | POST   | [`AnalyzeRouteRequest`] | [`AnalyzeRouteResponse`]      |
//! | `/stream_route`   | POST   | [`StreamRouteRequest`]  | `data: <VoicePacket>\n\n` ... |
//! | `/chat`           | POST   | [`ChatRequest`]         | [`ChatResponse`]              |
//! | `/clear_session`  | GET    | *(none)*                | [`SessionCleared`]            |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Route objects follow the Directions API layout; unknown fields are ignored
//!    and optional ones default, so partial routes still decode.
//! 3. Any endpoint may answer `{ "error": "..." }`, sometimes with a 200 status.

use crate::types::RoutePoint;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Route analysis  (POST /analyze_route)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRouteRequest {
    pub start: String,
    pub end: String,
}

/// Candidate routes plus one [`RouteDetails`] per route, in the same order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRouteResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub route_details: Vec<RouteDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub legs: Vec<Leg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview_polyline: Option<EncodedPolyline>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TextValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Instruction with inline HTML markup (`<b>`, `<div>`, `&nbsp;`).
    #[serde(default)]
    pub html_instructions: String,
    pub end_location: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<LatLng>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for RoutePoint {
    fn from(ll: LatLng) -> Self {
        RoutePoint::new(ll.lat, ll.lng)
    }
}

/// `{ "text": "12.3 mi", "value": 19795 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextValue {
    pub text: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedPolyline {
    pub points: String,
}

/// Server-computed summary of one candidate route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDetails {
    /// 1–10, higher is safer.
    pub safety_score: f64,
    /// Minutes.
    pub duration: f64,
    pub distance: String,
    /// First few step instructions (HTML).
    #[serde(default)]
    pub steps: Vec<String>,
}

impl std::fmt::Display for RouteDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Safety {:.1}/10 • Time {:.0} min • Dist {}",
            self.safety_score, self.duration, self.distance
        )
    }
}

// ---------------------------------------------------------------------------
// Voice packet stream  (POST /stream_route)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRouteRequest {
    pub start: String,
    pub end: String,
    pub route_index: usize,
    /// Explicit waypoint sequence for servers that annotate raw coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<RoutePoint>>,
}

// ---------------------------------------------------------------------------
// Assistant  (POST /chat, GET /clear_session)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCleared {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A body that is either the expected payload or an [`ErrorBody`].
///
/// The error arm is tried first: payloads with all-default fields would
/// otherwise swallow `{ "error": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Err(ErrorBody),
    Ok(T),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            Reply::Ok(v) => Ok(v),
            Reply::Err(e) => Err(crate::error::NavError::Server(e.error)),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint helpers
// ---------------------------------------------------------------------------

/// Every HTTP path used by the protocol, as constants.
pub mod endpoints {
    pub const ANALYZE_ROUTE: &str = "analyze_route";
    pub const STREAM_ROUTE: &str = "stream_route";
    pub const CHAT: &str = "chat";
    pub const CLEAR_SESSION: &str = "clear_session";
}

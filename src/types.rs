//! Core navigator types shared across all modules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A geographic point the simulated drive passes through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl RoutePoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for RoutePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Axis-aligned lat/lng box enclosing a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[RoutePoint]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut b = Bounds {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        for p in rest {
            b.south = b.south.min(p.latitude);
            b.north = b.north.max(p.latitude);
            b.west = b.west.min(p.longitude);
            b.east = b.east.max(p.longitude);
        }
        Some(b)
    }

    pub fn center(&self) -> RoutePoint {
        RoutePoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Voice packets
// ---------------------------------------------------------------------------

/// A text announcement tied to a checkpoint.
///
/// Both the synchronous fallback list and the streamed enrichment list use
/// this exact JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoicePacket {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl VoicePacket {
    pub fn new(text: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            text: text.into(),
            latitude,
            longitude,
        }
    }

    pub fn at(text: impl Into<String>, point: RoutePoint) -> Self {
        Self::new(text, point.latitude, point.longitude)
    }

    pub fn position(&self) -> RoutePoint {
        RoutePoint::new(self.latitude, self.longitude)
    }
}

/// Which slot a resolved packet list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketOrigin {
    /// Enriched list from `/stream_route`.
    Primary,
    /// Derived from the route's step instructions.
    Fallback,
}

// ---------------------------------------------------------------------------
// Simulation config
// ---------------------------------------------------------------------------

/// Which checkpoint's packet is announced on a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementPolicy {
    /// Announce the checkpoint at the cursor (offset 0).
    #[default]
    Current,
    /// Announce the checkpoint one ahead of the cursor (offset 1).
    Lookahead,
}

impl AnnouncementPolicy {
    pub fn offset(self) -> usize {
        match self {
            AnnouncementPolicy::Current => 0,
            AnnouncementPolicy::Lookahead => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Pause between checkpoints.
    pub tick_interval: Duration,
    pub announcement: AnnouncementPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(3000),
            announcement: AnnouncementPolicy::Current,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters for a single simulated drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub ticks: u64,
    pub advances: usize,
    pub announcements: usize,
    pub suppressed_repeats: usize,
}

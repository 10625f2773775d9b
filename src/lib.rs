//! Safe Drive navigator core
//!
//! Client-side core of the Smart Drive route-safety service: compare
//! candidate routes by safety score, stream enriched turn-by-turn voice
//! packets, and simulate a drive that announces each checkpoint once.
//!
//! ## Architecture
//!
//! ```text
//! NavigatorSession  (session.rs)   ← app context, route selection, enrichment
//!   ├── RouteClient  (client.rs)   ← /analyze_route /stream_route /chat
//!   │     └── sse    (sse.rs)      ← chunked `data:` frames → records
//!   ├── PacketSource (packets.rs)  ← primary (enriched) / fallback slots
//!   ├── route        (route.rs)    ← waypoints, fallback packets, polyline
//!   └── DriveSimulator (driver.rs) ← Tokio interval, single active run
//!         └── Simulation (simulator.rs) ← pure tick state machine
//! ```
//!
//! The decoder, route preparation and state machine have no runtime
//! dependency; the HTTP client, scheduler and session need the `client`
//! feature.

// Protocol, decoding and simulation logic are always available.
pub mod config;
pub mod error;
pub mod packets;
pub mod protocol;
pub mod route;
pub mod simulator;
pub mod sse;
pub mod types;

// Runtime-backed modules require the `client` feature.
#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod driver;
#[cfg(feature = "client")]
pub mod session;

// Convenience re-exports (client only)
#[cfg(feature = "client")]
pub use client::RouteClient;
#[cfg(feature = "client")]
pub use driver::{DriveObserver, DriveSimulator, SimulationHandle};
#[cfg(feature = "client")]
pub use session::NavigatorSession;

pub use config::NavigatorConfig;
pub use error::{NavError, Result};
pub use packets::{PacketList, PacketSource};
pub use simulator::{SimEvent, Simulation, SimulationState, ARRIVAL_TEXT};
pub use sse::{DecodeReport, FrameOutcome, SkipReason, StreamDecoder};
pub use types::{
    AnnouncementPolicy, Bounds, PacketOrigin, RoutePoint, SimulationConfig, SimulationStats,
    VoicePacket,
};

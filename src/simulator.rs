//! Drive simulation state machine.
//!
//! [`Simulation`] holds no timer. Each call to [`Simulation::tick`] performs
//! one transition and returns the events it produced; the scheduler in
//! `driver.rs` decides when ticks happen.
//!
//! ```text
//! Idle ──start──▶ Running ──cursor ≥ len──▶ Completed
//!                    │
//!                    └──cancel──▶ Cancelled
//! ```
//!
//! Per tick, in order:
//!
//! 1. announce the packet at `cursor + offset` if its text differs from the
//!    last announced text;
//! 2. if the cursor is past the last waypoint, announce arrival and complete;
//! 3. otherwise advance to `waypoints[cursor]` and increment the cursor.

use crate::packets::PacketList;
use crate::types::{AnnouncementPolicy, RoutePoint, SimulationStats, VoicePacket};
use log::debug;
use std::sync::Arc;

pub const ARRIVAL_TEXT: &str = "You have arrived at your destination";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl SimulationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationState::Completed | SimulationState::Cancelled)
    }
}

/// One observable effect of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Speak / show this packet.
    Announce(VoicePacket),
    /// Marker moved to `waypoints[index]`.
    Advance { index: usize, point: RoutePoint },
    /// Synthetic final announcement at the last waypoint.
    Arrived(VoicePacket),
}

/// Events produced by a single [`Simulation::tick`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// 1-based tick counter that produced these events.
    pub tick: u64,
    pub events: Vec<SimEvent>,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    waypoints: Arc<[RoutePoint]>,
    packets: PacketList,
    policy: AnnouncementPolicy,
    cursor: usize,
    last_announced: Option<String>,
    state: SimulationState,
    stats: SimulationStats,
}

impl Simulation {
    pub fn new(
        waypoints: impl Into<Arc<[RoutePoint]>>,
        packets: PacketList,
        policy: AnnouncementPolicy,
    ) -> Self {
        Self {
            waypoints: waypoints.into(),
            packets,
            policy,
            cursor: 0,
            last_announced: None,
            state: SimulationState::Idle,
            stats: SimulationStats::default(),
        }
    }

    /// Idle → Running. Has no effect in any other state.
    pub fn start(&mut self) {
        if self.state == SimulationState::Idle {
            self.state = SimulationState::Running;
        }
    }

    /// Running/Idle → Cancelled.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            debug!("Simulation cancelled at waypoint {}", self.cursor);
            self.state = SimulationState::Cancelled;
        }
    }

    /// Run one transition. Produces nothing unless Running.
    pub fn tick(&mut self) -> TickEvents {
        if self.state != SimulationState::Running {
            return TickEvents {
                tick: self.stats.ticks,
                events: Vec::new(),
            };
        }

        self.stats.ticks += 1;
        let mut events = Vec::new();

        if let Some(packet) = self.packets.get(self.cursor + self.policy.offset()) {
            if self.last_announced.as_deref() == Some(packet.text.as_str()) {
                self.stats.suppressed_repeats += 1;
            } else {
                self.last_announced = Some(packet.text.clone());
                self.stats.announcements += 1;
                events.push(SimEvent::Announce(packet.clone()));
            }
        }

        match self.waypoints.get(self.cursor) {
            Some(&point) => {
                events.push(SimEvent::Advance {
                    index: self.cursor,
                    point,
                });
                self.cursor += 1;
                self.stats.advances += 1;
            }
            None => {
                self.state = SimulationState::Completed;
                match self.waypoints.last() {
                    Some(&last) => {
                        events.push(SimEvent::Arrived(VoicePacket::at(ARRIVAL_TEXT, last)))
                    }
                    None => debug!("Simulation over an empty route completed immediately"),
                }
            }
        }

        TickEvents {
            tick: self.stats.ticks,
            events,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Waypoints already driven through.
    pub fn traveled(&self) -> &[RoutePoint] {
        &self.waypoints[..self.cursor.min(self.waypoints.len())]
    }

    /// Waypoints still ahead.
    pub fn upcoming(&self) -> &[RoutePoint] {
        &self.waypoints[self.cursor.min(self.waypoints.len())..]
    }

    /// Position of the marker, if it has moved yet.
    pub fn position(&self) -> Option<RoutePoint> {
        self.traveled().last().copied()
    }

    pub fn last_announced(&self) -> Option<&str> {
        self.last_announced.as_deref()
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn packets(&self) -> &PacketList {
        &self.packets
    }
}

//! DriveSimulator – schedules [`Simulation`] ticks on a Tokio interval.
//!
//! At most one run is alive per simulator. [`DriveSimulator::start`] cancels
//! the previous run before arming the new one, and [`DriveSimulator::stop`]
//! returns only once no further observer callback can fire: the tick task
//! dispatches events while holding the run lock, and cancellation flips the
//! state under that same lock.
//!
//! Observer callbacks run with the run lock held; calling back into the
//! simulator from inside a callback deadlocks.

use crate::packets::PacketList;
use crate::simulator::{SimEvent, Simulation, SimulationState};
use crate::types::{RoutePoint, SimulationConfig, SimulationStats, VoicePacket};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Receives the timed output of a run (the UI side).
pub trait DriveObserver: Send + 'static {
    /// Marker moved to `waypoints[index]`.
    fn on_advance(&mut self, index: usize, point: RoutePoint);

    /// A packet should be shown / spoken. Also used for the final arrival.
    fn on_announce(&mut self, packet: &VoicePacket);

    /// The run reached its destination. Not called on cancellation.
    fn on_completed(&mut self, _stats: &SimulationStats) {}
}

/// Identifies one run started by a [`DriveSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimulationHandle(u64);

impl SimulationHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Point-in-time view of the active run.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub handle: SimulationHandle,
    pub state: SimulationState,
    pub cursor: usize,
    pub position: Option<RoutePoint>,
    pub stats: SimulationStats,
}

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

struct Run {
    sim: Simulation,
    observer: Box<dyn DriveObserver>,
}

struct ActiveRun {
    handle: SimulationHandle,
    shared: Arc<Mutex<Run>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveRun {
    fn shut_down(self) {
        let was_running = {
            let mut run = self.shared.lock();
            let running = run.sim.state() == SimulationState::Running;
            run.sim.cancel();
            running
        };
        self.cancel.cancel();
        self.task.abort();
        if was_running {
            debug!("Run {} pre-empted", self.handle.0);
        }
    }
}

// ---------------------------------------------------------------------------
// DriveSimulator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct DriveSimulator {
    active: Option<ActiveRun>,
    next_id: u64,
}

impl DriveSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run, superseding any run already in progress.
    ///
    /// The first tick fires one `tick_interval` after this call. Must be
    /// called from within a Tokio runtime.
    pub fn start(
        &mut self,
        waypoints: impl Into<Arc<[RoutePoint]>>,
        packets: PacketList,
        config: SimulationConfig,
        observer: impl DriveObserver,
    ) -> SimulationHandle {
        if let Some(previous) = self.active.take() {
            previous.shut_down();
        }

        self.next_id += 1;
        let handle = SimulationHandle(self.next_id);

        let mut sim = Simulation::new(waypoints, packets, config.announcement);
        sim.start();
        info!(
            "Starting run {} ({} waypoints, {} packets, tick {:?}, {:?})",
            handle.0,
            sim.waypoint_count(),
            sim.packets().len(),
            config.tick_interval,
            config.announcement,
        );

        let shared = Arc::new(Mutex::new(Run {
            sim,
            observer: Box::new(observer),
        }));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            tick_loop(shared.clone(), cancel.clone(), config.tick_interval)
                .instrument(tracing::info_span!("drive", run = handle.0)),
        );

        self.active = Some(ActiveRun {
            handle,
            shared,
            cancel,
            task,
        });
        handle
    }

    /// Cancel `handle` if it is the active run. Returns whether it was.
    pub fn stop(&mut self, handle: SimulationHandle) -> bool {
        match self.active.take() {
            Some(run) if run.handle == handle => {
                run.shut_down();
                true
            }
            other => {
                self.active = other;
                false
            }
        }
    }

    /// Cancel whatever run is active.
    pub fn stop_active(&mut self) {
        if let Some(run) = self.active.take() {
            run.shut_down();
        }
    }

    /// State of the most recent run; `Idle` when none was started or it was stopped.
    pub fn state(&self) -> SimulationState {
        self.active
            .as_ref()
            .map_or(SimulationState::Idle, |a| a.shared.lock().sim.state())
    }

    pub fn snapshot(&self) -> Option<RunSnapshot> {
        self.active.as_ref().map(|a| {
            let run = a.shared.lock();
            RunSnapshot {
                handle: a.handle,
                state: run.sim.state(),
                cursor: run.sim.cursor(),
                position: run.sim.position(),
                stats: run.sim.stats().clone(),
            }
        })
    }
}

impl Drop for DriveSimulator {
    fn drop(&mut self) {
        self.stop_active();
    }
}

// ---------------------------------------------------------------------------
// Tick loop
// ---------------------------------------------------------------------------

async fn tick_loop(shared: Arc<Mutex<Run>>, cancel: CancellationToken, period: Duration) {
    let period = period.max(Duration::from_millis(1));
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }
        if !step(&shared) {
            break;
        }
    }
}

/// One tick under the run lock. Returns whether the loop should continue.
fn step(shared: &Mutex<Run>) -> bool {
    let mut guard = shared.lock();
    let Run { sim, observer } = &mut *guard;
    if sim.state() != SimulationState::Running {
        return false;
    }

    for event in sim.tick().events {
        match event {
            SimEvent::Announce(packet) => observer.on_announce(&packet),
            SimEvent::Advance { index, point } => observer.on_advance(index, point),
            SimEvent::Arrived(packet) => observer.on_announce(&packet),
        }
    }

    if sim.state() == SimulationState::Completed {
        info!("Drive completed after {} ticks", sim.stats().ticks);
        observer.on_completed(sim.stats());
        return false;
    }
    true
}

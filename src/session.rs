//! NavigatorSession – the explicit application context.
//!
//! One session per UI. It owns the analyzed routes, the selected route's
//! waypoints, the two-slot packet holder, the background enrichment task and
//! the drive simulator. All mutation goes through its methods.

use crate::client::RouteClient;
use crate::config::NavigatorConfig;
use crate::driver::{DriveObserver, DriveSimulator, RunSnapshot, SimulationHandle};
use crate::error::{NavError, Result};
use crate::packets::PacketSource;
use crate::protocol::{Route, RouteDetails, StreamRouteRequest};
use crate::route::{self, Overview};
use crate::simulator::SimulationState;
use crate::types::{PacketOrigin, RoutePoint};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The selected route, ready to simulate.
struct Armed {
    route_index: usize,
    waypoints: Arc<[RoutePoint]>,
}

struct Enrichment {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct NavigatorSession {
    config: NavigatorConfig,
    client: RouteClient,
    start: String,
    end: String,
    routes: Vec<Route>,
    details: Vec<RouteDetails>,
    selected: Option<usize>,
    armed: Option<Armed>,
    packets: Arc<RwLock<PacketSource>>,
    enrichment: Option<Enrichment>,
    simulator: DriveSimulator,
}

impl NavigatorSession {
    pub fn new(config: NavigatorConfig) -> Result<Self> {
        let client = RouteClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: NavigatorConfig, client: RouteClient) -> Self {
        Self {
            config,
            client,
            start: String::new(),
            end: String::new(),
            routes: Vec::new(),
            details: Vec::new(),
            selected: None,
            armed: None,
            packets: Arc::new(RwLock::new(PacketSource::new())),
            enrichment: None,
            simulator: DriveSimulator::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Route analysis & selection
    // -----------------------------------------------------------------------

    /// Fetch candidate routes and select the safest one.
    ///
    /// Returns the selected index. Selection errors (a route with no steps)
    /// are returned after the routes have been stored, so the caller can
    /// still pick another one.
    pub async fn analyze(&mut self, start: &str, end: &str) -> Result<usize> {
        let analysis = self.client.analyze_route(start, end).await?;
        if analysis.routes.is_empty() {
            return Err(NavError::NoRoutes);
        }

        self.start = start.to_string();
        self.end = end.to_string();
        self.routes = analysis.routes;
        self.details = analysis.route_details;

        let index = route::safest_route_index(&self.details)
            .filter(|i| *i < self.routes.len())
            .unwrap_or(0);
        info!(
            "{} candidate routes; safest is route {}",
            self.routes.len(),
            index + 1
        );
        self.select_route(index)?;
        Ok(index)
    }

    /// Make `index` the current route: derive waypoints and fallback packets,
    /// and start fetching the enriched packet stream in the background.
    ///
    /// Any enrichment still running for a previous selection is cancelled.
    pub fn select_route(&mut self, index: usize) -> Result<()> {
        let count = self.routes.len();
        let route = self
            .routes
            .get(index)
            .ok_or(NavError::RouteIndexOutOfRange { index, count })?;

        let prepared = route::prepare(index, route);

        self.cancel_enrichment();
        self.selected = Some(index);

        let prepared = match prepared {
            Ok(p) => p,
            Err(e) => {
                warn!("Route {} cannot be simulated: {}", index + 1, e);
                self.armed = None;
                self.packets.write().reset(Vec::new());
                return Err(e);
            }
        };

        let generation = self.packets.write().reset(prepared.fallback);
        self.armed = Some(Armed {
            route_index: index,
            waypoints: Arc::from(prepared.waypoints),
        });
        self.spawn_enrichment(index, generation);
        Ok(())
    }

    fn spawn_enrichment(&mut self, route_index: usize, generation: u64) {
        let client = self.client.clone();
        let packets = self.packets.clone();
        let timeout = self.config.stream_timeout();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let req = StreamRouteRequest {
            start: self.start.clone(),
            end: self.end.clone(),
            route_index,
            coordinates: None,
        };

        let task = tokio::spawn(
            async move {
                let fetched = tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Enrichment cancelled");
                        return;
                    }
                    r = tokio::time::timeout(timeout, client.stream_route(&req)) => r,
                };
                match fetched {
                    Ok(Ok(report)) => {
                        if report.malformed_count() > 0 {
                            warn!("Dropped {} malformed voice packets", report.malformed_count());
                        }
                        packets.write().install_primary(generation, report.records);
                    }
                    Ok(Err(e)) => warn!("Enhanced stream failed; using fallback: {}", e),
                    Err(_) => warn!(
                        "Enhanced stream timed out after {:?}; using fallback",
                        timeout
                    ),
                }
            }
            .instrument(tracing::info_span!("enrich", route = route_index)),
        );

        self.enrichment = Some(Enrichment { cancel, task });
    }

    fn cancel_enrichment(&mut self) {
        if let Some(e) = self.enrichment.take() {
            e.cancel.cancel();
            e.task.abort();
        }
    }

    /// Wait for the pending enrichment (bounded by the stream timeout).
    ///
    /// Returns whether an enriched list is now installed.
    pub async fn wait_for_enrichment(&mut self) -> bool {
        if let Some(e) = self.enrichment.take() {
            if let Err(err) = e.task.await {
                if !err.is_cancelled() {
                    warn!("Enrichment task failed: {}", err);
                }
            }
        }
        self.packets.read().has_primary()
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    pub fn can_simulate(&self) -> bool {
        self.armed.is_some()
    }

    /// Start a simulated drive on the selected route, superseding any
    /// running one. The packet list current at this moment is frozen for
    /// the run.
    pub fn simulate(&mut self, observer: impl DriveObserver) -> Result<SimulationHandle> {
        let (route_index, waypoints) = match (&self.armed, self.selected) {
            (Some(a), _) => (a.route_index, a.waypoints.clone()),
            (None, Some(route_index)) => return Err(NavError::EmptyRouteData { route_index }),
            (None, None) => return Err(NavError::NoRouteSelected),
        };
        let (packets, origin) = self.packets.read().resolve();
        info!(
            "Simulating route {} with {:?} packets",
            route_index + 1,
            origin
        );
        let config = self.config.simulation();
        Ok(self.simulator.start(waypoints, packets, config, observer))
    }

    pub fn stop(&mut self) {
        self.simulator.stop_active();
    }

    pub fn simulation_state(&self) -> SimulationState {
        self.simulator.state()
    }

    pub fn run_snapshot(&self) -> Option<RunSnapshot> {
        self.simulator.snapshot()
    }

    // -----------------------------------------------------------------------
    // Assistant
    // -----------------------------------------------------------------------

    pub async fn chat(&self, message: &str) -> Result<String> {
        self.client.chat(message).await
    }

    pub async fn clear_chat(&self) -> Result<()> {
        self.client.clear_session().await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn details(&self) -> &[RouteDetails] {
        &self.details
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn packet_origin(&self) -> PacketOrigin {
        self.packets.read().resolve().1
    }

    /// Overview path and bounds of the selected route.
    pub fn overview(&self) -> Result<Overview> {
        let index = self.selected.ok_or(NavError::NoRouteSelected)?;
        let count = self.routes.len();
        let route = self
            .routes
            .get(index)
            .ok_or(NavError::RouteIndexOutOfRange { index, count })?;
        route::overview(route)
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }
}

impl Drop for NavigatorSession {
    fn drop(&mut self) {
        self.cancel_enrichment();
    }
}

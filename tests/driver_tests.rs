//! DriveSimulator scheduling tests (paused Tokio clock)

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use safe_drive::{
        AnnouncementPolicy, DriveObserver, DriveSimulator, RoutePoint, SimulationConfig,
        SimulationState, SimulationStats, VoicePacket, ARRIVAL_TEXT,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::{sleep, Instant};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        log: Log,
        done: Option<oneshot::Sender<SimulationStats>>,
    }

    impl DriveObserver for Recorder {
        fn on_advance(&mut self, index: usize, _point: RoutePoint) {
            self.log.lock().push(format!("advance {index}"));
        }

        fn on_announce(&mut self, packet: &VoicePacket) {
            self.log.lock().push(format!("say {}", packet.text));
        }

        fn on_completed(&mut self, stats: &SimulationStats) {
            if let Some(tx) = self.done.take() {
                let _ = tx.send(stats.clone());
            }
        }
    }

    fn recorder() -> (Recorder, Log, oneshot::Receiver<SimulationStats>) {
        let log = Log::default();
        let (tx, rx) = oneshot::channel();
        (
            Recorder {
                log: log.clone(),
                done: Some(tx),
            },
            log,
            rx,
        )
    }

    fn route() -> (Vec<RoutePoint>, Arc<[VoicePacket]>) {
        let waypoints = vec![
            RoutePoint::new(30.10, -97.10),
            RoutePoint::new(30.20, -97.20),
            RoutePoint::new(30.30, -97.30),
        ];
        let packets = vec![
            VoicePacket::at("Turn left", waypoints[0]),
            VoicePacket::at("Turn left", waypoints[1]),
            VoicePacket::at("Arrive", waypoints[2]),
        ];
        (waypoints, Arc::from(packets))
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            tick_interval: Duration::from_millis(3000),
            announcement: AnnouncementPolicy::Current,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_step_drive_completes_after_four_ticks() {
        let (waypoints, packets) = route();
        let (observer, log, done) = recorder();
        let mut driver = DriveSimulator::new();
        let started = Instant::now();

        driver.start(waypoints, packets, config(), observer);
        assert_eq!(driver.state(), SimulationState::Running);

        let stats = done.await.expect("run completes");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(12_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(15_000), "{elapsed:?}");

        assert_eq!(
            *log.lock(),
            vec![
                "say Turn left".to_string(),
                "advance 0".into(),
                "advance 1".into(),
                "say Arrive".into(),
                "advance 2".into(),
                format!("say {ARRIVAL_TEXT}"),
            ]
        );
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.suppressed_repeats, 1);
        assert_eq!(driver.state(), SimulationState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_interval() {
        let (waypoints, packets) = route();
        let (observer, log, _done) = recorder();
        let mut driver = DriveSimulator::new();

        driver.start(waypoints, packets, config(), observer);

        sleep(Duration::from_millis(2_999)).await;
        assert!(log.lock().is_empty());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(*log.lock(), vec!["say Turn left", "advance 0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_callbacks() {
        let (waypoints, packets) = route();
        let (observer, log, done) = recorder();
        let mut driver = DriveSimulator::new();

        let handle = driver.start(waypoints, packets, config(), observer);
        sleep(Duration::from_millis(3_500)).await;
        let seen = log.lock().len();
        assert_eq!(seen, 2);

        assert!(driver.stop(handle));
        assert_eq!(driver.state(), SimulationState::Idle);
        assert!(driver.snapshot().is_none());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(log.lock().len(), seen);
        // on_completed never fired, so the sender was dropped with the run.
        assert!(done.await.is_err());

        assert!(!driver.stop(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_supersedes_previous_run() {
        let (waypoints, packets) = route();
        let (first, first_log, _first_done) = recorder();
        let (second, second_log, second_done) = recorder();
        let mut driver = DriveSimulator::new();

        let old = driver.start(waypoints.clone(), packets.clone(), config(), first);
        sleep(Duration::from_millis(3_500)).await;
        let new = driver.start(waypoints, packets, config(), second);
        assert_ne!(old, new);

        let stats = second_done.await.expect("second run completes");
        assert_eq!(stats.advances, 3);
        assert_eq!(first_log.lock().len(), 2);
        assert_eq!(second_log.lock().len(), 6);

        // The old handle no longer controls anything.
        assert!(!driver.stop(old));
        assert_eq!(
            driver.snapshot().map(|s| s.handle),
            Some(new),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_tracks_progress() {
        let (waypoints, packets) = route();
        let (observer, _log, _done) = recorder();
        let mut driver = DriveSimulator::new();
        assert_eq!(driver.state(), SimulationState::Idle);

        driver.start(waypoints.clone(), packets, config(), observer);
        sleep(Duration::from_millis(6_500)).await;

        let snap = driver.snapshot().expect("active run");
        assert_eq!(snap.state, SimulationState::Running);
        assert_eq!(snap.position, Some(waypoints[1]));
        assert_eq!(snap.stats.advances, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_route_completes_without_callbacks() {
        let (observer, log, done) = recorder();
        let mut driver = DriveSimulator::new();

        driver.start(Vec::<RoutePoint>::new(), Arc::from(Vec::new()), config(), observer);
        let stats = done.await.expect("run completes");

        assert_eq!(stats.advances, 0);
        assert!(log.lock().is_empty());
    }
}

//! NavigatorSession tests: analysis, enrichment and simulation wiring

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use safe_drive::{
        DriveObserver, NavError, NavigatorConfig, NavigatorSession, PacketOrigin, RoutePoint,
        SimulationState, SimulationStats, VoicePacket, ARRIVAL_TEXT,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Spoken {
        said: Arc<Mutex<Vec<String>>>,
        done: Option<oneshot::Sender<SimulationStats>>,
    }

    impl DriveObserver for Spoken {
        fn on_advance(&mut self, _index: usize, _point: RoutePoint) {}

        fn on_announce(&mut self, packet: &VoicePacket) {
            self.said.lock().push(packet.text.clone());
        }

        fn on_completed(&mut self, stats: &SimulationStats) {
            if let Some(tx) = self.done.take() {
                let _ = tx.send(stats.clone());
            }
        }
    }

    fn step(text: &str, lat: f64, lng: f64) -> serde_json::Value {
        json!({ "html_instructions": text, "end_location": { "lat": lat, "lng": lng } })
    }

    /// Route 0 scores 5.0, route 1 scores 9.1 and route 2 has no steps.
    fn analysis_body() -> serde_json::Value {
        json!({
            "routes": [
                { "summary": "Fast", "legs": [{ "steps": [
                    step("Head <b>east</b>", 30.0, -97.0),
                    step("Arrive", 30.1, -97.1),
                ]}]},
                { "summary": "Safe", "legs": [{ "steps": [
                    step("Head <b>south</b>", 30.2, -97.2),
                    step("Turn <b>right</b>", 30.3, -97.3),
                    step("Arrive", 30.4, -97.4),
                ]}]},
                { "summary": "Broken", "legs": [] }
            ],
            "route_details": [
                { "safety_score": 5.0, "duration": 30.0, "distance": "20 mi" },
                { "safety_score": 9.1, "duration": 34.0, "distance": "22 mi" },
                { "safety_score": 1.0, "duration": 90.0, "distance": "80 mi" }
            ]
        })
    }

    async fn server_with_routes() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze_route"))
            .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
            .mount(&server)
            .await;
        server
    }

    fn session(server: &MockServer) -> NavigatorSession {
        let config = NavigatorConfig {
            server_url: server.uri(),
            tick_interval_ms: 5,
            stream_timeout_secs: 5,
            request_timeout_secs: 5,
            ..NavigatorConfig::default()
        };
        NavigatorSession::new(config).expect("session")
    }

    async fn drive(session: &mut NavigatorSession) -> (Vec<String>, SimulationStats) {
        let said = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();
        session
            .simulate(Spoken {
                said: said.clone(),
                done: Some(tx),
            })
            .expect("simulate");
        let stats = rx.await.expect("run completes");
        let said = said.lock().clone();
        (said, stats)
    }

    // -----------------------------------------------------------------------
    // Analysis and selection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn analyze_selects_safest_route() {
        let server = server_with_routes().await;
        let mut session = session(&server);

        let index = session.analyze("A", "B").await.expect("analyze");

        assert_eq!(index, 1);
        assert_eq!(session.selected_index(), Some(1));
        assert_eq!(session.routes().len(), 3);
        assert!(session.can_simulate());
        assert_eq!(session.packet_origin(), PacketOrigin::Fallback);
    }

    #[tokio::test]
    async fn analyze_without_routes_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze_route"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "routes": [], "route_details": [] })),
            )
            .mount(&server)
            .await;
        let mut session = session(&server);

        assert!(matches!(
            session.analyze("A", "B").await,
            Err(NavError::NoRoutes)
        ));
        assert!(!session.can_simulate());
    }

    #[tokio::test]
    async fn selecting_a_route_without_steps_disables_simulation() {
        let server = server_with_routes().await;
        let mut session = session(&server);
        session.analyze("A", "B").await.expect("analyze");

        assert!(matches!(
            session.select_route(2),
            Err(NavError::EmptyRouteData { route_index: 2 })
        ));
        assert!(!session.can_simulate());
        assert!(matches!(
            session.simulate(Spoken {
                said: Arc::default(),
                done: None,
            }),
            Err(NavError::EmptyRouteData { route_index: 2 })
        ));

        assert!(matches!(
            session.select_route(7),
            Err(NavError::RouteIndexOutOfRange { index: 7, count: 3 })
        ));
    }

    #[tokio::test]
    async fn simulate_before_analysis_fails() {
        let server = MockServer::start().await;
        let mut session = session(&server);
        assert!(matches!(
            session.simulate(Spoken {
                said: Arc::default(),
                done: None,
            }),
            Err(NavError::NoRouteSelected)
        ));
        assert_eq!(session.simulation_state(), SimulationState::Idle);
    }

    // -----------------------------------------------------------------------
    // Enrichment
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn enriched_packets_replace_fallback() {
        let server = server_with_routes().await;
        let body = concat!(
            "data: {\"text\":\"Head south. Low crash risk.\",\"latitude\":30.2,\"longitude\":-97.2}\n\n",
            "data: {\"text\":\"Turn right. Watch for cyclists.\",\"latitude\":30.3,\"longitude\":-97.3}\n\n",
            "data: {\"text\":\"Arrive\",\"latitude\":30.4,\"longitude\":-97.4}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/stream_route"))
            .and(body_partial_json(json!({ "start": "A", "end": "B", "route_index": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        let mut session = session(&server);
        session.analyze("A", "B").await.expect("analyze");

        assert!(session.wait_for_enrichment().await);
        assert_eq!(session.packet_origin(), PacketOrigin::Primary);

        let (said, stats) = drive(&mut session).await;
        assert_eq!(
            said,
            vec![
                "Head south. Low crash risk.",
                "Turn right. Watch for cyclists.",
                "Arrive",
                ARRIVAL_TEXT,
            ]
        );
        assert_eq!(stats.advances, 3);
    }

    #[tokio::test]
    async fn stream_failure_keeps_fallback() {
        let server = server_with_routes().await;
        Mock::given(method("POST"))
            .and(path("/stream_route"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let mut session = session(&server);
        session.analyze("A", "B").await.expect("analyze");

        assert!(!session.wait_for_enrichment().await);
        assert_eq!(session.packet_origin(), PacketOrigin::Fallback);

        let (said, _) = drive(&mut session).await;
        assert_eq!(
            said,
            vec!["Head south", "Turn right", "Arrive", ARRIVAL_TEXT]
        );
    }

    #[tokio::test]
    async fn empty_stream_keeps_fallback() {
        let server = server_with_routes().await;
        Mock::given(method("POST"))
            .and(path("/stream_route"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(": nothing\n\n", "text/event-stream"))
            .mount(&server)
            .await;
        let mut session = session(&server);
        session.analyze("A", "B").await.expect("analyze");

        assert!(!session.wait_for_enrichment().await);
        assert_eq!(session.packet_origin(), PacketOrigin::Fallback);
    }

    #[tokio::test]
    async fn reselecting_discards_enrichment_for_previous_route() {
        let server = server_with_routes().await;
        Mock::given(method("POST"))
            .and(path("/stream_route"))
            .and(body_partial_json(json!({ "route_index": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"text\":\"Route two\",\"latitude\":1.0,\"longitude\":1.0}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/stream_route"))
            .and(body_partial_json(json!({ "route_index": 0 })))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let mut session = session(&server);
        session.analyze("A", "B").await.expect("analyze");
        assert!(session.wait_for_enrichment().await);

        session.select_route(0).expect("select");
        assert_eq!(session.packet_origin(), PacketOrigin::Fallback);
        assert!(!session.wait_for_enrichment().await);

        let (said, _) = drive(&mut session).await;
        assert_eq!(said, vec!["Head east", "Arrive", ARRIVAL_TEXT]);
    }
}

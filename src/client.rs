//! `RouteClient` – HTTP calls to the Smart Drive server.
//!
//! Cookies are kept so `/chat` history survives between calls; the server
//! keys conversation state on its session cookie.

use crate::config::NavigatorConfig;
use crate::error::{NavError, Result};
use crate::protocol::{
    endpoints, AnalyzeRouteRequest, AnalyzeRouteResponse, ChatRequest, ChatResponse, Reply,
    SessionCleared, StreamRouteRequest,
};
use crate::sse::{self, DecodeReport};
use crate::types::VoicePacket;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RouteClient {
    base: Url,
    http: Client,
    request_timeout: Duration,
}

impl RouteClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| NavError::InvalidUrl(format!("{base_url}: {e}")))?;
        // `join` replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            base,
            http,
            request_timeout,
        })
    }

    pub fn from_config(config: &NavigatorConfig) -> Result<Self> {
        Self::new(&config.server_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        self.base
            .join(endpoint)
            .map_err(|e| NavError::InvalidUrl(format!("{endpoint}: {e}")))
    }

    // -----------------------------------------------------------------------
    // Route analysis
    // -----------------------------------------------------------------------

    pub async fn analyze_route(&self, start: &str, end: &str) -> Result<AnalyzeRouteResponse> {
        info!("Analyzing routes from '{}' to '{}'", start, end);
        let resp = self
            .http
            .post(self.url(endpoints::ANALYZE_ROUTE)?)
            .timeout(self.request_timeout)
            .json(&AnalyzeRouteRequest {
                start: start.into(),
                end: end.into(),
            })
            .send()
            .await?;
        let analysis: AnalyzeRouteResponse = read_reply(resp).await?;
        if analysis.routes.len() != analysis.route_details.len() {
            warn!(
                "Server returned {} routes but {} detail entries",
                analysis.routes.len(),
                analysis.route_details.len()
            );
        }
        Ok(analysis)
    }

    // -----------------------------------------------------------------------
    // Voice packet stream
    // -----------------------------------------------------------------------

    /// Fetch and fully decode the enriched voice packet stream.
    ///
    /// Every transport failure maps to [`NavError::StreamUnavailable`].
    pub async fn stream_route(&self, req: &StreamRouteRequest) -> Result<DecodeReport<VoicePacket>> {
        let resp = self
            .http
            .post(self.url(endpoints::STREAM_ROUTE)?)
            .json(req)
            .send()
            .await
            .map_err(|e| NavError::StreamUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NavError::StreamUnavailable(format!("HTTP {status}")));
        }

        let report = sse::decode::<VoicePacket, _, _, _>(resp.bytes_stream()).await?;
        debug!(
            "Stream for route {} done: {} packets, {} skipped frames, {} tail bytes dropped",
            req.route_index,
            report.records.len(),
            report.skipped.len(),
            report.truncated_bytes
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Assistant
    // -----------------------------------------------------------------------

    pub async fn chat(&self, message: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url(endpoints::CHAT)?)
            .timeout(self.request_timeout)
            .json(&ChatRequest {
                message: message.into(),
            })
            .send()
            .await?;
        let reply: ChatResponse = read_reply(resp).await?;
        Ok(reply.response)
    }

    /// Reset the server-side conversation history.
    pub async fn clear_session(&self) -> Result<()> {
        let resp = self
            .http
            .get(self.url(endpoints::CLEAR_SESSION)?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let cleared: SessionCleared = read_reply(resp).await?;
        debug!("Session cleared: {}", cleared.status);
        Ok(())
    }
}

/// Decode a JSON body that may be an `{ "error": ... }` object.
async fn read_reply<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body = resp.bytes().await?;
    match serde_json::from_slice::<Reply<T>>(&body) {
        Ok(Reply::Ok(_)) if !status.is_success() => Err(NavError::Server(format!("HTTP {status}"))),
        Ok(reply) => reply.into_result(),
        Err(e) if status.is_success() => {
            Err(NavError::Server(format!("invalid response body: {e}")))
        }
        Err(_) => Err(NavError::Server(format!("HTTP {status}"))),
    }
}

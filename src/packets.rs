//! Two-slot voice packet holder.
//!
//! `fallback` is derived from step instructions the moment a route is
//! selected; `primary` is filled later, if ever, by the enrichment stream.
//! A simulation resolves the current list once, at start, and keeps that
//! `Arc` for the whole run.

use crate::types::{PacketOrigin, VoicePacket};
use log::{debug, info};
use std::sync::Arc;

pub type PacketList = Arc<[VoicePacket]>;

#[derive(Debug, Clone)]
pub struct PacketSource {
    primary: Option<PacketList>,
    fallback: PacketList,
    /// Bumped on every route selection; stale enrichment results are refused.
    generation: u64,
}

impl Default for PacketSource {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: Arc::from(Vec::new()),
            generation: 0,
        }
    }
}

impl PacketSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly derived fallback list and drop any enriched one.
    ///
    /// Returns the generation enrichment must present to
    /// [`install_primary`](Self::install_primary).
    pub fn reset(&mut self, fallback: Vec<VoicePacket>) -> u64 {
        self.generation += 1;
        self.primary = None;
        self.fallback = Arc::from(fallback);
        debug!(
            "Packet source reset (generation {}, {} fallback packets)",
            self.generation,
            self.fallback.len()
        );
        self.generation
    }

    /// Offer an enriched list. Refused when empty or when `generation` is
    /// no longer current.
    pub fn install_primary(&mut self, generation: u64, packets: Vec<VoicePacket>) -> bool {
        if generation != self.generation {
            debug!(
                "Ignoring enrichment for generation {} (current {})",
                generation, self.generation
            );
            return false;
        }
        if packets.is_empty() {
            debug!("Ignoring empty enrichment; keeping fallback");
            return false;
        }
        info!("Enriched voice packets ready ({} packets)", packets.len());
        self.primary = Some(Arc::from(packets));
        true
    }

    /// The list a simulation starting now should use.
    pub fn resolve(&self) -> (PacketList, PacketOrigin) {
        match &self.primary {
            Some(p) => (p.clone(), PacketOrigin::Primary),
            None => (self.fallback.clone(), PacketOrigin::Fallback),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

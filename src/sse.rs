//! Incremental server-sent-event decoder.
//!
//! The `/stream_route` body is a sequence of frames separated by a blank
//! line. Frames carrying a record look like:
//!
//! ```text
//! data: {"text":"Turn left","latitude":30.26,"longitude":-97.74}\n\n
//! ```
//!
//! Chunks arrive at arbitrary byte offsets: mid-frame, mid-delimiter, even
//! in the middle of a multi-byte UTF-8 character. [`FrameBuffer`] frames on
//! raw bytes (the delimiter is ASCII) and only decodes a frame to text once
//! it is complete, so a split character is carried over in the pending bytes.
//!
//! | Frame                      | Outcome                                   |
//! |----------------------------|-------------------------------------------|
//! | `data: <valid json>`       | [`FrameOutcome::Record`]                  |
//! | `data: <invalid json>`     | [`FrameOutcome::Skipped`] (`Malformed`)   |
//! | anything else              | [`FrameOutcome::Skipped`] (`NotData`)     |
//! | unterminated tail at EOF   | discarded, byte count in [`DecodeReport`] |

use crate::error::{NavError, Result};
use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::fmt::Display;

pub const FRAME_DELIMITER: &[u8] = b"\n\n";
pub const DATA_PREFIX: &str = "data: ";

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Pending bytes carried across chunk boundaries.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every frame it completed, in order.
    ///
    /// The trailing segment after the last delimiter stays pending, even
    /// when non-empty.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // A delimiter may straddle the previous chunk; rescan one byte back.
        let rescan_from = self.pending.len().saturating_sub(FRAME_DELIMITER.len() - 1);
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut search_from = rescan_from;
        while let Some(pos) = find_delimiter(&self.pending[search_from..]) {
            let end = search_from + pos;
            let frame = self.pending.split_to(end);
            self.pending.advance(FRAME_DELIMITER.len());
            frames.push(String::from_utf8_lossy(&frame).into_owned());
            search_from = 0;
        }
        frames
    }

    /// Bytes waiting for a closing delimiter.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// End of stream: drop the unterminated tail without parsing it.
    ///
    /// Returns the number of bytes discarded.
    pub fn finish(self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            debug!("Discarding {} bytes of unterminated frame at end of stream", dropped);
        }
        dropped
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}

// ---------------------------------------------------------------------------
// Frame parsing
// ---------------------------------------------------------------------------

/// Why a complete frame produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Frame without the `data: ` prefix (comment, `event:`, `id:`, blank).
    NotData,
    /// `data: ` frame whose payload failed JSON parsing.
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome<T> {
    Record(T),
    Skipped(SkipReason),
}

impl<T> FrameOutcome<T> {
    pub fn into_record(self) -> Option<T> {
        match self {
            FrameOutcome::Record(r) => Some(r),
            FrameOutcome::Skipped(_) => None,
        }
    }
}

/// Parse one complete frame.
pub fn parse_frame<T: DeserializeOwned>(frame: &str) -> FrameOutcome<T> {
    let Some(payload) = frame.strip_prefix(DATA_PREFIX) else {
        return FrameOutcome::Skipped(SkipReason::NotData);
    };
    match serde_json::from_str(payload) {
        Ok(record) => FrameOutcome::Record(record),
        Err(e) => FrameOutcome::Skipped(SkipReason::Malformed(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Push decoder
// ---------------------------------------------------------------------------

/// Framing plus parsing for one decode session.
#[derive(Debug)]
pub struct StreamDecoder<T> {
    buffer: FrameBuffer,
    _record: std::marker::PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Default for StreamDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> StreamDecoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::new(),
            _record: std::marker::PhantomData,
        }
    }

    /// Feed one chunk; returns the outcome of each frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameOutcome<T>> {
        self.buffer
            .push(chunk)
            .iter()
            .map(|frame| parse_frame(frame))
            .collect()
    }

    /// End of stream. Returns the number of tail bytes discarded.
    pub fn finish(self) -> usize {
        self.buffer.finish()
    }
}

// ---------------------------------------------------------------------------
// Collected result
// ---------------------------------------------------------------------------

/// Everything one decode session produced, in arrival order.
#[derive(Debug, Clone)]
pub struct DecodeReport<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkipReason>,
    /// Bytes of an unterminated final frame that were dropped.
    pub truncated_bytes: usize,
}

impl<T> Default for DecodeReport<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
            truncated_bytes: 0,
        }
    }
}

impl<T> DecodeReport<T> {
    pub fn malformed_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|r| matches!(r, SkipReason::Malformed(_)))
            .count()
    }

    fn absorb(&mut self, outcome: FrameOutcome<T>) {
        match outcome {
            FrameOutcome::Record(r) => self.records.push(r),
            FrameOutcome::Skipped(reason) => {
                if let SkipReason::Malformed(ref e) = reason {
                    debug!("Dropping malformed frame: {}", e);
                }
                self.skipped.push(reason);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stream adapters
// ---------------------------------------------------------------------------

/// Drain a byte-chunk stream and collect every record.
///
/// A transport error on any chunk fails the whole decode with
/// [`NavError::StreamUnavailable`]; malformed frames never do.
pub async fn decode<T, S, B, E>(chunks: S) -> Result<DecodeReport<T>>
where
    T: DeserializeOwned,
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut decoder = StreamDecoder::<T>::new();
    let mut report = DecodeReport::default();
    let mut chunks = std::pin::pin!(chunks);

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Stream read failed: {}", e);
            NavError::StreamUnavailable(e.to_string())
        })?;
        for outcome in decoder.feed(chunk.as_ref()) {
            report.absorb(outcome);
        }
    }

    report.truncated_bytes = decoder.finish();
    Ok(report)
}

/// Lazy variant of [`decode`]: one item per complete frame, as frames arrive.
///
/// Finite and non-restartable. The stream ends after the first transport
/// error, which is yielded as [`NavError::StreamUnavailable`].
pub fn records<T, S, E>(chunks: S) -> impl Stream<Item = Result<FrameOutcome<T>>>
where
    T: DeserializeOwned,
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    struct State<T, S> {
        chunks: Option<S>,
        decoder: StreamDecoder<T>,
        ready: VecDeque<FrameOutcome<T>>,
    }

    let init = State {
        chunks: Some(chunks),
        decoder: StreamDecoder::<T>::new(),
        ready: VecDeque::new(),
    };

    stream::unfold(init, |mut st| async move {
        loop {
            if let Some(outcome) = st.ready.pop_front() {
                return Some((Ok(outcome), st));
            }
            let chunks = st.chunks.as_mut()?;
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    let outcomes = st.decoder.feed(&chunk);
                    st.ready.extend(outcomes);
                }
                Some(Err(e)) => {
                    st.chunks = None;
                    return Some((Err(NavError::StreamUnavailable(e.to_string())), st));
                }
                None => {
                    st.chunks = None;
                    let tail = std::mem::take(&mut st.decoder);
                    tail.finish();
                    return None;
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # Trace Replay
//!
//! Feeds a recorded trace through the engine in place of a device's
//! location and telephony backends.
//!
//! This module handles:
//! - Parsing JSONL traces, one frame per line
//! - Serving each frame's fix to the loop's location requests
//! - Serving the current frame's cells to the radio layer
//! - Stopping the loop once the trace runs out
//!
//! ## Trace Format
//!
//! ```text
//! {"fix": {"latitude": 50.08, "longitude": 14.42, "captured_at": "2024-05-01T10:00:00Z"},
//!  "cells": [{"registered": true, "type": "lte", "ci": 1, "tac": 2, "dbm": -95, ...}]}
//! {"fix": null, "cells": []}
//! ```
//!
//! Blank lines are skipped. A frame whose `fix` is `null` replays a cycle
//! without a location.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cell::radio::{RadioLayer, RawCellInfo};
use crate::error::{CellScoutError, LocationError, RadioError, Result};
use crate::location::{Fix, LocationProvider};
use crate::sampling::StopSignal;

/// One recorded cycle: what the location provider and radio layer reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    pub fix: Option<Fix>,
    #[serde(default)]
    pub cells: Vec<RawCellInfo>,
}

/// Replays [`TraceFrame`]s as both a [`LocationProvider`] and a [`RadioLayer`].
///
/// Clones share the same cursor, so hand one clone to the location source and
/// another to the cell sampler. Every location request (fresh or cached)
/// moves the cursor to the next frame; the radio layer reports the cells of
/// the frame the cursor is on.
#[derive(Debug, Clone)]
pub struct TraceReplay {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    frames: Vec<TraceFrame>,
    /// Number of frames handed out so far
    consumed: AtomicUsize,
    stop: Option<StopSignal>,
}

impl TraceReplay {
    pub fn new(frames: Vec<TraceFrame>) -> Self {
        Self::build(frames, None)
    }

    /// Like [`new`](Self::new), tripping `stop` once every frame has been served.
    pub fn with_stop(frames: Vec<TraceFrame>, stop: StopSignal) -> Self {
        Self::build(frames, Some(stop))
    }

    fn build(frames: Vec<TraceFrame>, stop: Option<StopSignal>) -> Self {
        Self {
            inner: Arc::new(Inner { frames, consumed: AtomicUsize::new(0), stop }),
        }
    }

    /// Load a JSONL trace file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<TraceFrame>> {
        let file = std::fs::File::open(path.as_ref())?;
        let frames = Self::parse(std::io::BufReader::new(file))?;
        info!("Loaded {} trace frames from {}", frames.len(), path.as_ref().display());
        Ok(frames)
    }

    /// Parse JSONL frames. Line numbers in errors are 1-based.
    pub fn parse<R: BufRead>(reader: R) -> Result<Vec<TraceFrame>> {
        let mut frames = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str(&line).map_err(|e| CellScoutError::Trace {
                line: index + 1,
                message: e.to_string(),
            })?;
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn len(&self) -> usize {
        self.inner.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames.is_empty()
    }

    /// Frames not yet served.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.inner.consumed.load(Ordering::SeqCst))
    }

    fn advance(&self) -> Option<&TraceFrame> {
        let index = self.inner.consumed.fetch_add(1, Ordering::SeqCst);
        match self.inner.frames.get(index) {
            Some(frame) => Some(frame),
            None => {
                if let Some(stop) = &self.inner.stop {
                    if stop.stop() {
                        info!("Trace exhausted after {} frames, stopping", self.len());
                    }
                }
                None
            }
        }
    }

    fn current(&self) -> Option<&TraceFrame> {
        match self.inner.consumed.load(Ordering::SeqCst) {
            0 => None,
            n => self.inner.frames.get(n - 1),
        }
    }

    fn next_fix(&self) -> Option<Fix> {
        self.advance().and_then(|frame| frame.fix)
    }
}

#[async_trait]
impl LocationProvider for TraceReplay {
    async fn current_fix(&self) -> std::result::Result<Fix, LocationError> {
        self.next_fix().ok_or(LocationError::Unavailable)
    }

    async fn cached_fix(&self) -> std::result::Result<Option<Fix>, LocationError> {
        Ok(self.next_fix())
    }
}

impl RadioLayer for TraceReplay {
    fn all_cell_info(&self) -> std::result::Result<Vec<RawCellInfo>, RadioError> {
        let cells = self.current().map(|frame| frame.cells.clone()).unwrap_or_default();
        debug!("Replaying {} visible cells", cells.len());
        Ok(cells)
    }
}

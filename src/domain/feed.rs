//! Replay feed.
//!
//! Owns a static, ordered bar sequence and a cursor into it. `run` pushes
//! each remaining bar (and its overlay value, when one is present) to a
//! [`ReplaySink`], suspending for the configured interval between records.
//! Cancellation is cooperative through a [`StopHandle`] and is observed only
//! between records.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::error::ReplayError;
use super::ohlcv::{Bar, first_unordered};
use super::overlay::OverlaySample;
use super::split::SplitPoint;
use crate::ports::chart_port::ReplaySink;

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable cancellation flag shared between a feed and its controllers.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Wakes a feed that is currently suspended.
    pub fn stop(&self) {
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.inner.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for `interval` or until stopped. Returns `true` if stopped.
    fn suspend(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self
            .inner
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
        true
    }
}

/// Position of the next bar to push. Never exceeds the sequence length and
/// only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayCursor {
    position: usize,
    len: usize,
}

impl ReplayCursor {
    fn new(position: usize, len: usize) -> Self {
        Self {
            position: position.min(len),
            len,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.len
    }

    fn advance(&mut self) {
        if self.position < self.len {
            self.position += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub bars_pushed: usize,
    pub overlays_pushed: usize,
    /// Overlay samples present for a pushed bar but carrying no value.
    pub overlays_skipped: usize,
    /// Cursor position when the run ended.
    pub cursor: usize,
    pub outcome: RunOutcome,
}

#[derive(Debug)]
pub struct ReplayFeed {
    bars: Vec<Bar>,
    overlays: HashMap<i64, OverlaySample>,
    initial_len: usize,
    cursor: ReplayCursor,
    interval: Duration,
    stop: StopHandle,
}

impl ReplayFeed {
    /// Feed that replays every bar.
    pub fn initialize(
        bars: Vec<Bar>,
        overlays: Vec<OverlaySample>,
        interval: Duration,
    ) -> Result<Self, ReplayError> {
        Self::initialize_at(bars, overlays, 0, interval)
    }

    /// Feed whose cursor starts at `start`; `bars[..start]` is the initial
    /// frame.
    pub fn initialize_at(
        bars: Vec<Bar>,
        overlays: Vec<OverlaySample>,
        start: usize,
        interval: Duration,
    ) -> Result<Self, ReplayError> {
        validate_bars(&bars)?;
        if start > bars.len() {
            return Err(ReplayError::invalid(format!(
                "replay start {} is past the end of {} bars",
                start,
                bars.len()
            )));
        }
        Ok(Self::build(bars, overlays, start, start, interval))
    }

    /// Feed split into an initial frame and a replay part. Bars withheld by
    /// the split gap are neither in the initial frame nor replayed.
    pub fn initialize_split(
        bars: Vec<Bar>,
        overlays: Vec<OverlaySample>,
        split: SplitPoint,
        interval: Duration,
    ) -> Result<Self, ReplayError> {
        validate_bars(&bars)?;
        let len = bars.len();
        Ok(Self::build(
            bars,
            overlays,
            split.initial_len(len),
            split.replay_start(len),
            interval,
        ))
    }

    fn build(
        bars: Vec<Bar>,
        overlays: Vec<OverlaySample>,
        initial_len: usize,
        start: usize,
        interval: Duration,
    ) -> Self {
        let cursor = ReplayCursor::new(start, bars.len());
        let overlays = overlays.into_iter().map(|s| (s.time, s)).collect();
        Self {
            bars,
            overlays,
            initial_len,
            cursor,
            interval,
            stop: StopHandle::new(),
        }
    }

    /// Use an externally created stop handle, e.g. one already registered
    /// with an event handler.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn initial_frame(&self) -> &[Bar] {
        &self.bars[..self.initial_len]
    }

    /// Overlay samples belonging to the initial frame.
    pub fn initial_overlays(&self) -> Vec<OverlaySample> {
        self.initial_frame()
            .iter()
            .filter_map(|b| self.overlays.get(&b.time).copied())
            .collect()
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.cursor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Push every remaining bar to `sink`. Consumes the feed so a record can
    /// never be pushed twice.
    pub fn run<S: ReplaySink + ?Sized>(mut self, sink: &mut S) -> Result<RunSummary, ReplayError> {
        let mut summary = RunSummary {
            bars_pushed: 0,
            overlays_pushed: 0,
            overlays_skipped: 0,
            cursor: self.cursor.position(),
            outcome: RunOutcome::Completed,
        };

        info!(
            start = self.cursor.position(),
            remaining = self.cursor.remaining(),
            interval_ms = self.interval.as_millis() as u64,
            "replay started"
        );

        while !self.cursor.is_exhausted() {
            if self.stop.is_stopped() {
                summary.outcome = RunOutcome::Stopped;
                break;
            }

            let bar = &self.bars[self.cursor.position()];
            trace!(time = bar.time, close = bar.close, "push bar");
            if let Err(e) = sink.update(bar) {
                warn!(time = bar.time, error = %e, "sink rejected bar, aborting replay");
                return Err(e.into());
            }
            summary.bars_pushed += 1;

            if let Some(sample) = self.overlays.get(&bar.time) {
                match sample.present() {
                    Some(point) => {
                        if let Err(e) = sink.update_overlay(&point) {
                            warn!(time = bar.time, error = %e, "sink rejected overlay, aborting replay");
                            return Err(e.into());
                        }
                        summary.overlays_pushed += 1;
                    }
                    None => {
                        debug!(time = bar.time, "overlay value missing, skipped");
                        summary.overlays_skipped += 1;
                    }
                }
            }

            self.cursor.advance();

            if !self.cursor.is_exhausted() && self.stop.suspend(self.interval) {
                summary.outcome = RunOutcome::Stopped;
                break;
            }
        }

        summary.cursor = self.cursor.position();
        info!(
            bars = summary.bars_pushed,
            overlays = summary.overlays_pushed,
            skipped = summary.overlays_skipped,
            outcome = ?summary.outcome,
            "replay finished"
        );
        Ok(summary)
    }
}

fn validate_bars(bars: &[Bar]) -> Result<(), ReplayError> {
    if bars.is_empty() {
        return Err(ReplayError::invalid("no bars to replay"));
    }
    if let Some(i) = first_unordered(bars) {
        return Err(ReplayError::invalid(format!(
            "bars not sorted ascending by time: bar {} (t={}) follows t={}",
            i,
            bars[i].time,
            bars[i - 1].time
        )));
    }
    Ok(())
}

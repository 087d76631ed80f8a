//! The replay scenario: load a symbol, show the first part of it, replay
//! the rest onto the chart.
//!
//! `ReplayConfig` holds every value the scenario needs; nothing is read from
//! module state.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use super::error::ReplayError;
use super::events::{EventRegistry, HandlerId};
use super::feed::{ReplayFeed, RunSummary, StopHandle};
use super::ohlcv::derive_midpoint;
use super::overlay::{OverlayStyle, overlay_samples, present_points};
use super::split::SplitPoint;
use crate::ports::chart_port::{ChartPort, ChartReplaySink, SeriesHandle};
use crate::ports::data_port::DataPort;

/// Name of the topbar text box showing the current symbol.
pub const SYMBOL_TEXTBOX: &str = "symbol";

#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    /// JavaScript identifier of the chart handler object in the host.
    pub id: String,
    pub legend: bool,
    pub search: bool,
    /// Label of the symbol text box until the first search; the symbol
    /// itself when `None`.
    pub topbar_text: Option<String>,
    pub volume_up_color: String,
    pub volume_down_color: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            id: "chart".into(),
            legend: true,
            search: true,
            topbar_text: None,
            volume_up_color: "rgba(83,141,131,0.8)".into(),
            volume_down_color: "rgba(200,127,130,0.8)".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub symbol: String,
    pub interval: Duration,
    pub split_ratio: f64,
    pub split_gap: usize,
    /// When set, overlay values come from this column and are never derived.
    pub value_column: Option<String>,
    /// `None` disables the overlay series.
    pub overlay: Option<OverlayStyle>,
    pub chart: ChartStyle,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            symbol: "ohlcv".into(),
            interval: Duration::from_millis(200),
            split_ratio: 0.5,
            split_gap: 1,
            value_column: None,
            overlay: Some(OverlayStyle::default()),
            chart: ChartStyle::default(),
        }
    }
}

/// Chart objects created once per chart and reused by every replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSession {
    pub overlay: Option<SeriesHandle>,
    /// Leave the symbol text box as set up instead of showing the symbol.
    pub keep_label: bool,
}

/// Holds the stop handle of the replay currently running so event handlers
/// on other threads can interrupt it.
#[derive(Debug, Clone, Default)]
pub struct ActiveReplay {
    current: Arc<Mutex<StopHandle>>,
}

impl ActiveReplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install and return a fresh handle for the next replay.
    pub fn begin(&self) -> StopHandle {
        let handle = StopHandle::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = handle.clone();
        handle
    }

    pub fn stop(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

pub struct Scenario {
    config: ReplayConfig,
}

impl Scenario {
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Legend, topbar, search box and overlay series.
    pub fn setup<C: ChartPort + ?Sized>(
        &self,
        chart: &mut C,
        symbol: &str,
    ) -> Result<ChartSession, ReplayError> {
        let style = &self.config.chart;
        if style.legend {
            chart.show_legend(true)?;
        }
        let text = style.topbar_text.as_deref().unwrap_or(symbol);
        chart.topbar_textbox(SYMBOL_TEXTBOX, text)?;
        if style.search {
            chart.enable_search()?;
        }
        let overlay = match &self.config.overlay {
            Some(overlay_style) => Some(chart.create_overlay_series(overlay_style)?),
            None => None,
        };
        Ok(ChartSession {
            overlay,
            keep_label: style.topbar_text.is_some(),
        })
    }

    /// Fetch `symbol` and build its feed. Overlay values are the high/low
    /// midpoint unless a value column is configured.
    pub fn prepare(&self, data: &dyn DataPort, symbol: &str) -> Result<ReplayFeed, ReplayError> {
        let mut bars = data.fetch_bars(symbol)?;
        if bars.is_empty() {
            return Err(ReplayError::NoData {
                symbol: symbol.to_string(),
            });
        }
        if self.config.value_column.is_none() {
            derive_midpoint(&mut bars);
        }
        let overlays = if self.config.overlay.is_some() {
            overlay_samples(&bars)
        } else {
            Vec::new()
        };
        let split = SplitPoint::from_ratio(bars.len(), self.config.split_ratio, self.config.split_gap);
        info!(
            symbol,
            bars = bars.len(),
            initial = split.initial_len(bars.len()),
            replay = split.replay_len(bars.len()),
            "dataset prepared"
        );
        ReplayFeed::initialize_split(bars, overlays, split, self.config.interval)
    }

    /// Load `symbol`, show its initial frame and replay the rest.
    pub fn play<C: ChartPort + ?Sized>(
        &self,
        chart: &mut C,
        session: &ChartSession,
        data: &dyn DataPort,
        symbol: &str,
        stop: &StopHandle,
    ) -> Result<RunSummary, ReplayError> {
        chart.spinner(true)?;
        let prepared = self.prepare(data, symbol);
        chart.spinner(false)?;
        let feed = prepared?.with_stop_handle(stop.clone());

        chart.set(feed.initial_frame())?;
        if !session.keep_label {
            chart.set_topbar_text(SYMBOL_TEXTBOX, symbol)?;
        }
        if let Some(series) = session.overlay {
            chart.set_overlay(series, &present_points(&feed.initial_overlays()))?;
        }

        let mut sink = ChartReplaySink::new(chart, session.overlay);
        feed.run(&mut sink)
    }

    /// Interrupt the running replay, then forward the trimmed, non-empty
    /// query to `tx`. The stop must land before the receiver can start the
    /// next replay, or it would cancel that one instead.
    pub fn bind_search(
        &self,
        registry: &mut EventRegistry,
        active: ActiveReplay,
        tx: Sender<String>,
    ) -> HandlerId {
        registry.register_search_handler(move |query| {
            let query = query.trim();
            if query.is_empty() {
                return;
            }
            info!(query, "search requested");
            active.stop();
            if tx.send(query.to_string()).is_err() {
                warn!(query, "search dropped, replay loop has exited");
            }
        })
    }
}

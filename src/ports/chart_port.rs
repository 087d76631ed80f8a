//! Chart sink port traits.
//!
//! [`ReplaySink`] is the narrow contract the replay feed pushes through.
//! [`ChartPort`] is the full surface of the chart host used to set up a
//! replay: main series, overlay series, legend, topbar and spinner.

use crate::domain::error::SinkError;
use crate::domain::ohlcv::Bar;
use crate::domain::overlay::{OverlayPoint, OverlayStyle};

/// Identifies an overlay series created on a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesHandle(pub usize);

pub trait ReplaySink {
    fn update(&mut self, bar: &Bar) -> Result<(), SinkError>;
    fn update_overlay(&mut self, point: &OverlayPoint) -> Result<(), SinkError>;
}

pub trait ChartPort {
    /// Replace the main series with `bars`.
    fn set(&mut self, bars: &[Bar]) -> Result<(), SinkError>;

    fn update(&mut self, bar: &Bar) -> Result<(), SinkError>;

    fn create_overlay_series(&mut self, style: &OverlayStyle) -> Result<SeriesHandle, SinkError>;

    fn set_overlay(&mut self, series: SeriesHandle, points: &[OverlayPoint])
    -> Result<(), SinkError>;

    fn update_overlay(
        &mut self,
        series: SeriesHandle,
        point: &OverlayPoint,
    ) -> Result<(), SinkError>;

    fn show_legend(&mut self, visible: bool) -> Result<(), SinkError>;

    /// Add a named topbar text box.
    fn topbar_textbox(&mut self, name: &str, text: &str) -> Result<(), SinkError>;

    fn set_topbar_text(&mut self, name: &str, text: &str) -> Result<(), SinkError>;

    fn enable_search(&mut self) -> Result<(), SinkError>;

    fn spinner(&mut self, visible: bool) -> Result<(), SinkError>;
}

/// Binds a chart and an optional overlay series into a [`ReplaySink`].
pub struct ChartReplaySink<'a, C: ChartPort + ?Sized> {
    chart: &'a mut C,
    overlay: Option<SeriesHandle>,
}

impl<'a, C: ChartPort + ?Sized> ChartReplaySink<'a, C> {
    pub fn new(chart: &'a mut C, overlay: Option<SeriesHandle>) -> Self {
        Self { chart, overlay }
    }
}

impl<C: ChartPort + ?Sized> ReplaySink for ChartReplaySink<'_, C> {
    fn update(&mut self, bar: &Bar) -> Result<(), SinkError> {
        self.chart.update(bar)
    }

    fn update_overlay(&mut self, point: &OverlayPoint) -> Result<(), SinkError> {
        match self.overlay {
            Some(series) => self.chart.update_overlay(series, point),
            None => Ok(()),
        }
    }
}

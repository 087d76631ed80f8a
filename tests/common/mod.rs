#![allow(dead_code)]

pub use chartreplay::domain::error::{ReplayError, SinkError};
pub use chartreplay::domain::ohlcv::Bar;
use chartreplay::domain::overlay::{OverlayPoint, OverlayStyle};
use chartreplay::ports::chart_port::{ChartPort, SeriesHandle};
use chartreplay::ports::data_port::DataPort;
use std::collections::HashMap;

/// Every call a chart received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartCall {
    Set(Vec<i64>),
    Update(i64),
    CreateOverlay(String),
    SetOverlay(usize, Vec<OverlayPoint>),
    UpdateOverlay(usize, OverlayPoint),
    Legend(bool),
    Textbox(String, String),
    TopbarText(String, String),
    Search,
    Spinner(bool),
}

#[derive(Default)]
pub struct RecordingChart {
    pub calls: Vec<ChartCall>,
    pub overlays: usize,
    /// Fail the bar update with this timestamp.
    pub fail_update_at: Option<i64>,
}

impl RecordingChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<i64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChartCall::Update(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn overlay_updates(&self) -> Vec<OverlayPoint> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChartCall::UpdateOverlay(_, p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn sets(&self) -> Vec<Vec<i64>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ChartCall::Set(times) => Some(times.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ChartPort for RecordingChart {
    fn set(&mut self, bars: &[Bar]) -> Result<(), SinkError> {
        self.calls
            .push(ChartCall::Set(bars.iter().map(|b| b.time).collect()));
        Ok(())
    }

    fn update(&mut self, bar: &Bar) -> Result<(), SinkError> {
        if self.fail_update_at == Some(bar.time) {
            return Err(SinkError::new("update", "chart window closed"));
        }
        self.calls.push(ChartCall::Update(bar.time));
        Ok(())
    }

    fn create_overlay_series(&mut self, style: &OverlayStyle) -> Result<SeriesHandle, SinkError> {
        self.calls.push(ChartCall::CreateOverlay(style.name.clone()));
        self.overlays += 1;
        Ok(SeriesHandle(self.overlays - 1))
    }

    fn set_overlay(
        &mut self,
        series: SeriesHandle,
        points: &[OverlayPoint],
    ) -> Result<(), SinkError> {
        self.calls
            .push(ChartCall::SetOverlay(series.0, points.to_vec()));
        Ok(())
    }

    fn update_overlay(
        &mut self,
        series: SeriesHandle,
        point: &OverlayPoint,
    ) -> Result<(), SinkError> {
        self.calls.push(ChartCall::UpdateOverlay(series.0, *point));
        Ok(())
    }

    fn show_legend(&mut self, visible: bool) -> Result<(), SinkError> {
        self.calls.push(ChartCall::Legend(visible));
        Ok(())
    }

    fn topbar_textbox(&mut self, name: &str, text: &str) -> Result<(), SinkError> {
        self.calls
            .push(ChartCall::Textbox(name.to_string(), text.to_string()));
        Ok(())
    }

    fn set_topbar_text(&mut self, name: &str, text: &str) -> Result<(), SinkError> {
        self.calls
            .push(ChartCall::TopbarText(name.to_string(), text.to_string()));
        Ok(())
    }

    fn enable_search(&mut self) -> Result<(), SinkError> {
        self.calls.push(ChartCall::Search);
        Ok(())
    }

    fn spinner(&mut self, visible: bool) -> Result<(), SinkError> {
        self.calls.push(ChartCall::Spinner(visible));
        Ok(())
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ReplayError> {
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| ReplayError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, ReplayError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn make_bar(time: i64, close: f64) -> Bar {
    Bar {
        time,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
        derived: None,
    }
}

/// Bar whose derived field is set explicitly, `None` standing for NaN.
pub fn make_bar_with_value(time: i64, value: Option<f64>) -> Bar {
    Bar {
        derived: Some(value.unwrap_or(f64::NAN)),
        ..make_bar(time, 100.0)
    }
}

/// `count` bars one minute apart starting at `start`.
pub fn generate_bars(start: i64, count: usize, start_price: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| make_bar(start + 60 * i as i64, start_price + i as f64))
        .collect()
}

pub const OHLCV_HEADER: &str = "time,open,high,low,close,volume";

pub fn csv_rows(bars: &[Bar]) -> String {
    let mut out = String::from(OHLCV_HEADER);
    out.push('\n');
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.time, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    out
}

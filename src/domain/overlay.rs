//! Overlay series samples and styling.

use serde::Serialize;

use super::ohlcv::Bar;

/// One point of a named overlay series. `value` may be absent for a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySample {
    pub time: i64,
    pub value: Option<f64>,
}

impl OverlaySample {
    /// The value to push, if there is one. NaN counts as missing.
    pub fn present(&self) -> Option<OverlayPoint> {
        match self.value {
            Some(v) if !v.is_nan() => Some(OverlayPoint {
                time: self.time,
                value: v,
            }),
            _ => None,
        }
    }
}

/// A sample with a value, as sent to the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayPoint {
    pub time: i64,
    pub value: f64,
}

/// Project the derived field of each bar into overlay samples.
pub fn overlay_samples(bars: &[Bar]) -> Vec<OverlaySample> {
    bars.iter()
        .map(|b| OverlaySample {
            time: b.time,
            value: b.derived,
        })
        .collect()
}

/// Present points only, for an initial `set_overlay`.
pub fn present_points(samples: &[OverlaySample]) -> Vec<OverlayPoint> {
    samples.iter().filter_map(OverlaySample::present).collect()
}

/// Style options for a symbol overlay series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    pub name: String,
    pub shape: String,
    pub color: String,
    pub shape_size: f64,
    pub line_width: u32,
    pub join: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            name: "HL50".into(),
            shape: "circles".into(),
            color: "#049981".into(),
            shape_size: 0.3,
            line_width: 1,
            join: false,
        }
    }
}

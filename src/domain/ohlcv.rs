//! OHLCV bar representation.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    /// Unix seconds, UTC.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Per-bar overlay value; `None` when the source cell was blank or NaN.
    #[serde(skip)]
    pub derived: Option<f64>,
}

impl Bar {
    /// (high + low) / 2
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Fill the derived field with the high/low midpoint where it is absent.
pub fn derive_midpoint(bars: &mut [Bar]) {
    for bar in bars.iter_mut().filter(|b| b.derived.is_none()) {
        bar.derived = Some(bar.midpoint());
    }
}

/// Index of the first bar whose timestamp does not strictly exceed its
/// predecessor's, if any.
pub fn first_unordered(bars: &[Bar]) -> Option<usize> {
    bars.windows(2)
        .position(|w| w[1].time <= w[0].time)
        .map(|i| i + 1)
}

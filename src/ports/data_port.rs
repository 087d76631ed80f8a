//! Data access port trait.

use crate::domain::error::ReplayError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol` in source order.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ReplayError>;

    fn list_symbols(&self) -> Result<Vec<String>, ReplayError>;
}

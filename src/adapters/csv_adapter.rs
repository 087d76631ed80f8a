//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<symbol>.csv`, with a header row.
//! Columns are located by name, case-insensitively; `date` stands in for
//! `time`. Rows are returned in file order.

use crate::domain::error::ReplayError;
use crate::domain::ohlcv::Bar;
use crate::domain::time::{is_epoch_millis, parse_timestamp};
use crate::ports::data_port::DataPort;
use csv::StringRecord;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
    value_column: Option<String>,
}

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    value: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord, value_column: Option<&str>) -> Result<Self, ReplayError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| ReplayError::input(format!("missing {} column", name)))
        };

        let time = match find("time") {
            Some(i) => i,
            None => require("date").map_err(|_| ReplayError::input("missing time column"))?,
        };
        let value = match value_column {
            Some(col) => Some(require(col.trim().to_lowercase().as_str())?),
            None => None,
        };

        Ok(Self {
            time,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            value,
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            value_column: None,
        }
    }

    /// Read overlay values from `column` instead of deriving them.
    pub fn with_value_column(mut self, column: Option<String>) -> Self {
        self.value_column = column;
        self
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    pub fn read_bars<R: io::Read>(&self, reader: R) -> Result<Vec<Bar>, ReplayError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| ReplayError::input(format!("CSV header error: {}", e)))?
            .clone();
        let cols = Columns::resolve(&headers, self.value_column.as_deref())?;

        let mut bars: Vec<Bar> = Vec::new();
        for result in rdr.records() {
            let record =
                result.map_err(|e| ReplayError::input(format!("CSV parse error: {}", e)))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let time_str = field(&record, cols.time, "time", line)?;
            let time = parse_timestamp(time_str).ok_or_else(|| {
                ReplayError::input(format!("line {}: invalid timestamp {:?}", line, time_str))
            })?;
            let same_second = bars.last().is_some_and(|prev| prev.time == time);
            if same_second && is_epoch_millis(time_str) {
                return Err(ReplayError::input(format!(
                    "line {}: millisecond timestamp {} falls in the same second as the previous row; chart time has one-second resolution",
                    line, time_str
                )));
            }

            let value = match cols.value {
                Some(i) => parse_optional(field(&record, i, "value", line)?, line)?,
                None => None,
            };

            bars.push(Bar {
                time,
                open: parse_price(&record, cols.open, "open", line)?,
                high: parse_price(&record, cols.high, "high", line)?,
                low: parse_price(&record, cols.low, "low", line)?,
                close: parse_price(&record, cols.close, "close", line)?,
                volume: parse_price(&record, cols.volume, "volume", line)?,
                derived: value,
            });
        }

        Ok(bars)
    }
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, ReplayError> {
    record
        .get(index)
        .ok_or_else(|| ReplayError::input(format!("line {}: missing {} value", line, name)))
}

fn parse_price(
    record: &StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<f64, ReplayError> {
    let raw = field(record, index, name, line)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ReplayError::input(format!(
            "line {}: invalid {} value {:?}",
            line, name, raw
        ))),
    }
}

/// Blank and NaN cells are absent values.
fn parse_optional(raw: &str, line: u64) -> Result<Option<f64>, ReplayError> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| ReplayError::input(format!("line {}: invalid overlay value {:?}", line, raw)))
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ReplayError> {
        let path = self.csv_path(symbol);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ReplayError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => {
                return Err(ReplayError::input(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let bars = self.read_bars(file).map_err(|e| match e {
            ReplayError::Input { reason } => ReplayError::Input {
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })?;
        debug!(path = %path.display(), bars = bars.len(), "loaded csv");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ReplayError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            ReplayError::input(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::script_sink::ScriptSink;
use crate::domain::config_validation::validate_replay_config;
use crate::domain::error::ReplayError;
use crate::domain::events::EventRegistry;
use crate::domain::feed::{RunOutcome, RunSummary};
use crate::domain::ohlcv::{derive_midpoint, first_unordered};
use crate::domain::overlay::OverlayStyle;
use crate::domain::scenario::{ActiveReplay, ChartStyle, ReplayConfig, Scenario};
use crate::domain::split::SplitPoint;
use crate::domain::time::display_timestamp;
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "chartreplay", about = "Replay historical bars onto a chart")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a symbol, writing chart script to stdout or a file
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Read chart callback messages from stdin
        #[arg(long)]
        events: bool,
    },
    /// Validate a replay configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Summarize a symbol's dataset and split
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay {
            config,
            symbol,
            interval_ms,
            output,
            events,
        } => run_replay(&config, symbol, interval_ms, output.as_ref(), events),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ReplayError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load and validate, reporting failures the same way for every command.
fn load_validated(path: &PathBuf) -> Result<(FileConfigAdapter, ReplayConfig), ExitCode> {
    let adapter = load_config(path)?;
    let config = validate_replay_config(&adapter)
        .and_then(|_| build_replay_config(&adapter))
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })?;
    Ok((adapter, config))
}

pub fn build_replay_config(adapter: &dyn ConfigPort) -> Result<ReplayConfig, ReplayError> {
    let defaults = ReplayConfig::default();

    let interval_ms = adapter.get_int("replay", "interval_ms", 200);
    let interval_ms = u64::try_from(interval_ms).map_err(|_| ReplayError::ConfigInvalid {
        section: "replay".into(),
        key: "interval_ms".into(),
        reason: "interval_ms must be non-negative".into(),
    })?;
    let split_gap = adapter.get_int("replay", "split_gap", defaults.split_gap as i64);
    let split_gap = usize::try_from(split_gap).map_err(|_| ReplayError::ConfigInvalid {
        section: "replay".into(),
        key: "split_gap".into(),
        reason: "split_gap must be non-negative".into(),
    })?;

    let overlay = if adapter.get_bool("overlay", "enabled", true) {
        let d = OverlayStyle::default();
        let line_width = adapter.get_int("overlay", "line_width", d.line_width as i64);
        let line_width = u32::try_from(line_width).map_err(|_| ReplayError::ConfigInvalid {
            section: "overlay".into(),
            key: "line_width".into(),
            reason: "line_width must be a non-negative integer".into(),
        })?;
        Some(OverlayStyle {
            name: adapter.get_string_or("overlay", "name", &d.name),
            shape: adapter.get_string_or("overlay", "shape", &d.shape),
            color: adapter.get_string_or("overlay", "color", &d.color),
            shape_size: adapter.get_double("overlay", "shape_size", d.shape_size),
            line_width,
            join: adapter.get_bool("overlay", "join", d.join),
        })
    } else {
        None
    };

    let d = ChartStyle::default();
    let chart = ChartStyle {
        id: adapter.get_string_or("chart", "id", &d.id),
        legend: adapter.get_bool("chart", "legend", d.legend),
        search: adapter.get_bool("chart", "search", d.search),
        topbar_text: optional_string(adapter, "chart", "topbar_text"),
        volume_up_color: adapter.get_string_or("chart", "volume_up_color", &d.volume_up_color),
        volume_down_color: adapter.get_string_or(
            "chart",
            "volume_down_color",
            &d.volume_down_color,
        ),
    };

    Ok(ReplayConfig {
        symbol: adapter.get_string_or("data", "symbol", &defaults.symbol),
        interval: Duration::from_millis(interval_ms),
        split_ratio: adapter.get_double("replay", "split_ratio", defaults.split_ratio),
        split_gap,
        value_column: optional_string(adapter, "data", "value_column"),
        overlay,
        chart,
    })
}

fn optional_string(adapter: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    adapter
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn build_data_port(adapter: &dyn ConfigPort, config: &ReplayConfig) -> CsvAdapter {
    let dir = adapter.get_string_or("data", "dir", ".");
    CsvAdapter::new(PathBuf::from(dir)).with_value_column(config.value_column.clone())
}

fn run_replay(
    config_path: &PathBuf,
    symbol: Option<String>,
    interval_ms: Option<u64>,
    output: Option<&PathBuf>,
    events: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (adapter, mut config) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if let Some(s) = symbol {
        config.symbol = s;
    }
    if let Some(ms) = interval_ms {
        config.interval = Duration::from_millis(ms);
    }

    let data = build_data_port(&adapter, &config);
    let chart_style = config.chart.clone();
    let scenario = Scenario::new(config);
    let events = events.then(|| io::BufReader::new(io::stdin()));

    let result = match output {
        Some(path) => match fs::File::create(path) {
            Ok(file) => {
                let mut chart = ScriptSink::new(BufWriter::new(file), chart_style);
                run_session(&mut chart, &scenario, &data, events)
            }
            Err(e) => {
                eprintln!("error: failed to create {}: {}", path.display(), e);
                return ExitCode::from(1);
            }
        },
        None => {
            let mut chart = ScriptSink::new(io::stdout(), chart_style);
            run_session(&mut chart, &scenario, &data, events)
        }
    };

    match result {
        Ok(summaries) => {
            for s in &summaries {
                eprintln!(
                    "Replayed {} bars, {} overlay points ({} skipped){}",
                    s.bars_pushed,
                    s.overlays_pushed,
                    s.overlays_skipped,
                    if s.outcome == RunOutcome::Stopped {
                        ", stopped early"
                    } else {
                        ""
                    }
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Set up the chart and replay the configured symbol. With an event source,
/// each search received replays the searched symbol; the session ends when
/// the source is exhausted.
pub fn run_session<C, R>(
    chart: &mut C,
    scenario: &Scenario,
    data: &dyn DataPort,
    events: Option<R>,
) -> Result<Vec<RunSummary>, ReplayError>
where
    C: ChartPort + ?Sized,
    R: BufRead + Send + 'static,
{
    let first_symbol = scenario.config().symbol.clone();
    let mut session = scenario.setup(chart, &first_symbol)?;

    let active = ActiveReplay::new();
    let (tx, rx) = mpsc::channel();
    let pump = events.map(|reader| {
        let mut registry = EventRegistry::new(scenario.config().chart.id.clone());
        scenario.bind_search(&mut registry, active.clone(), tx.clone());
        thread::spawn(move || pump_events(reader, registry))
    });
    drop(tx);

    let mut summaries = Vec::new();
    let mut symbol = first_symbol;
    let mut searched = false;
    loop {
        let stop = active.begin();
        match scenario.play(chart, &session, data, &symbol, &stop) {
            Ok(summary) => summaries.push(summary),
            Err(e) if searched && !matches!(e, ReplayError::Sink(_)) => {
                warn!(symbol = %symbol, error = %e, "searched symbol could not be replayed");
            }
            Err(e) => return Err(e),
        }
        match rx.recv() {
            Ok(next) => {
                symbol = next;
                searched = true;
                session.keep_label = false;
            }
            Err(_) => break,
        }
    }

    if let Some(handle) = pump {
        if handle.join().is_err() {
            warn!("event reader thread panicked");
        }
    }
    Ok(summaries)
}

fn pump_events<R: BufRead>(reader: R, mut registry: EventRegistry) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                registry.dispatch(&line);
            }
            Err(e) => {
                warn!(error = %e, "stopped reading chart events");
                break;
            }
        }
    }
    info!("chart event stream closed");
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    match load_validated(config_path) {
        Ok(_) => {
            eprintln!("Config validated successfully");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_info(config_path: &PathBuf, symbol: Option<&str>) -> ExitCode {
    let (adapter, config) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let symbol = symbol.unwrap_or(&config.symbol);
    let data = build_data_port(&adapter, &config);

    let mut bars = match data.fetch_bars(symbol) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        eprintln!("{}: no bars", symbol);
        return ExitCode::from(3);
    };

    let len = bars.len();
    let split = SplitPoint::from_ratio(len, config.split_ratio, config.split_gap);
    println!("Symbol:         {}", symbol);
    println!("Bars:           {}", len);
    println!("First bar:      {}", display_timestamp(first.time));
    println!("Last bar:       {}", display_timestamp(last.time));
    println!("Initial frame:  {} bars", split.initial_len(len));
    println!("Replay:         {} bars", split.replay_len(len));

    if config.value_column.is_none() {
        derive_midpoint(&mut bars);
    }
    let present = bars
        .iter()
        .filter(|b| b.derived.is_some_and(|v| !v.is_nan()))
        .count();
    println!("Overlay values: {} present, {} missing", present, len - present);

    match first_unordered(&bars) {
        None => println!("Ordered:        yes"),
        Some(i) => println!("Ordered:        no (bar {} at {})", i, display_timestamp(bars[i].time)),
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &PathBuf) -> ExitCode {
    let (adapter, config) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let data = build_data_port(&adapter, &config);
    match data.list_symbols() {
        Ok(symbols) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for s in symbols {
                if writeln!(out, "{}", s).is_err() {
                    return ExitCode::from(1);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

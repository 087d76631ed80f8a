//! Chart sink that drives the chart host by emitting JavaScript.
//!
//! Every operation becomes one statement on its own line, written to the
//! wrapped writer and flushed immediately so a host reading the stream can
//! evaluate it as it arrives. Payloads are serialized with `serde_json`.

use std::collections::HashSet;
use std::io::Write;

use serde::Serialize;

use crate::domain::config_validation::is_js_identifier;
use crate::domain::error::SinkError;
use crate::domain::ohlcv::Bar;
use crate::domain::overlay::{OverlayPoint, OverlayStyle};
use crate::domain::scenario::ChartStyle;
use crate::ports::chart_port::{ChartPort, SeriesHandle};

#[derive(Serialize)]
struct VolumePoint<'a> {
    time: i64,
    value: f64,
    color: &'a str,
}

pub struct ScriptSink<W: Write> {
    out: W,
    style: ChartStyle,
    overlays: Vec<String>,
    textboxes: HashSet<String>,
    topbar_created: bool,
}

impl<W: Write> ScriptSink<W> {
    pub fn new(out: W, style: ChartStyle) -> Self {
        Self {
            out,
            style,
            overlays: Vec::new(),
            textboxes: HashSet::new(),
            topbar_created: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn id(&self) -> &str {
        &self.style.id
    }

    fn emit(&mut self, operation: &str, statement: &str) -> Result<(), SinkError> {
        writeln!(self.out, "{}", statement)
            .and_then(|_| self.out.flush())
            .map_err(|e| SinkError::new(operation, e.to_string()))
    }

    fn json<T: Serialize + ?Sized>(operation: &str, value: &T) -> Result<String, SinkError> {
        serde_json::to_string(value).map_err(|e| SinkError::new(operation, e.to_string()))
    }

    fn volume_point(&self, bar: &Bar) -> VolumePoint<'_> {
        let color = if bar.is_up() {
            &self.style.volume_up_color
        } else {
            &self.style.volume_down_color
        };
        VolumePoint {
            time: bar.time,
            value: bar.volume,
            color,
        }
    }

    fn overlay_var(&self, operation: &str, series: SeriesHandle) -> Result<String, SinkError> {
        self.overlays
            .get(series.0)
            .cloned()
            .ok_or_else(|| SinkError::new(operation, format!("unknown overlay series {}", series.0)))
    }

    fn textbox_var(&self, name: &str) -> String {
        format!("{}_topbar_{}", self.id(), name)
    }
}

impl<W: Write> ChartPort for ScriptSink<W> {
    fn set(&mut self, bars: &[Bar]) -> Result<(), SinkError> {
        let data = Self::json("set", bars)?;
        let volumes: Vec<VolumePoint<'_>> = bars.iter().map(|b| self.volume_point(b)).collect();
        let volumes = Self::json("set", &volumes)?;
        let id = self.id().to_string();
        self.emit("set", &format!("{}.series.setData({});", id, data))?;
        self.emit("set", &format!("{}.volumeSeries.setData({});", id, volumes))
    }

    fn update(&mut self, bar: &Bar) -> Result<(), SinkError> {
        let data = Self::json("update", bar)?;
        let volume = Self::json("update", &self.volume_point(bar))?;
        let id = self.id().to_string();
        self.emit("update", &format!("{}.series.update({});", id, data))?;
        self.emit("update", &format!("{}.volumeSeries.update({});", id, volume))
    }

    fn create_overlay_series(&mut self, style: &OverlayStyle) -> Result<SeriesHandle, SinkError> {
        let handle = SeriesHandle(self.overlays.len());
        let var = format!("{}_overlay{}", self.id(), handle.0);
        let name = Self::json("create_overlay_series", &style.name)?;
        let options = Self::json("create_overlay_series", style)?;
        let statement = format!(
            "var {} = {}.createSymbolSeries({}, {}).series;",
            var,
            self.id(),
            name,
            options
        );
        self.emit("create_overlay_series", &statement)?;
        self.overlays.push(var);
        Ok(handle)
    }

    fn set_overlay(
        &mut self,
        series: SeriesHandle,
        points: &[OverlayPoint],
    ) -> Result<(), SinkError> {
        let var = self.overlay_var("set_overlay", series)?;
        let data = Self::json("set_overlay", points)?;
        self.emit("set_overlay", &format!("{}.setData({});", var, data))
    }

    fn update_overlay(
        &mut self,
        series: SeriesHandle,
        point: &OverlayPoint,
    ) -> Result<(), SinkError> {
        let var = self.overlay_var("update_overlay", series)?;
        let data = Self::json("update_overlay", point)?;
        self.emit("update_overlay", &format!("{}.update({});", var, data))
    }

    fn show_legend(&mut self, visible: bool) -> Result<(), SinkError> {
        let display = if visible { "flex" } else { "none" };
        let statement = format!("{}.legend.div.style.display = '{}';", self.id(), display);
        self.emit("show_legend", &statement)
    }

    fn topbar_textbox(&mut self, name: &str, text: &str) -> Result<(), SinkError> {
        if !is_js_identifier(name) {
            return Err(SinkError::new(
                "topbar_textbox",
                format!("invalid widget name {:?}", name),
            ));
        }
        if !self.topbar_created {
            let statement = format!("{}.createTopBar();", self.id());
            self.emit("topbar_textbox", &statement)?;
            self.topbar_created = true;
        }
        let text = Self::json("topbar_textbox", text)?;
        let statement = format!(
            "var {} = {}._topBar.makeTextBoxWidget({}, 'left');",
            self.textbox_var(name),
            self.id(),
            text
        );
        self.emit("topbar_textbox", &statement)?;
        self.textboxes.insert(name.to_string());
        Ok(())
    }

    fn set_topbar_text(&mut self, name: &str, text: &str) -> Result<(), SinkError> {
        if !self.textboxes.contains(name) {
            return Err(SinkError::new(
                "set_topbar_text",
                format!("no topbar widget named {:?}", name),
            ));
        }
        let text = Self::json("set_topbar_text", text)?;
        let statement = format!("{}.innerText = {};", self.textbox_var(name), text);
        self.emit("set_topbar_text", &statement)
    }

    fn enable_search(&mut self) -> Result<(), SinkError> {
        let statement = format!("Handler.makeSearchBox({});", self.id());
        self.emit("enable_search", &statement)
    }

    fn spinner(&mut self, visible: bool) -> Result<(), SinkError> {
        let display = if visible { "block" } else { "none" };
        let statement = format!("{}.spinner.style.display = '{}';", self.id(), display);
        self.emit("spinner", &statement)
    }
}

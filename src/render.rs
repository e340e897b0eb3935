// NETLAB: Emulated Topology Scenarios and Packet-Trace Metrics
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Rendering of time series, either as interactive plotly HTML files or as raw CSV data.
use std::path::{Path, PathBuf};

use itertools::Itertools;
use plotly::{
    common::{Line, Mode, Title},
    layout::Axis,
    Layout, Plot, Scatter,
};

use crate::{metrics::Report, util::PathBufExt, Error};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TimeSeries<T> {
    pub t: Vec<f64>,
    pub y: Vec<T>,
}

impl<T> FromIterator<(f64, T)> for TimeSeries<T> {
    fn from_iter<I: IntoIterator<Item = (f64, T)>>(iter: I) -> Self {
        let (t, y) = iter.into_iter().multiunzip();
        Self { t, y }
    }
}

impl<T> TimeSeries<T> {
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// A labelled line. Missing values (`None`) are drawn as gaps.
#[derive(Debug, Clone)]
pub struct Trace {
    pub label: String,
    pub color: &'static str,
    pub data: TimeSeries<Option<f64>>,
}

/// A plot with time on the x-axis.
#[derive(Debug, Clone)]
pub struct TimeSeriesPlot {
    /// Short, filename-compatible name of the plot.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub traces: Vec<Trace>,
}

impl TimeSeriesPlot {
    /// Throughput over time.
    pub fn throughput(report: &Report) -> Self {
        Self {
            name: "throughput".to_string(),
            title: "Throughput over Time".to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Throughput (bytes/sec)".to_string(),
            traces: vec![Trace {
                label: "Throughput (bytes/sec)".to_string(),
                color: "#2563eb",
                data: report.series.iter().map(|r| (r.time, r.throughput)).collect(),
            }],
        }
    }

    /// Advertised window size over time.
    pub fn window_size(report: &Report) -> Self {
        Self {
            name: "window_size".to_string(),
            title: "TCP Window Size Over Time".to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Window Size (bytes)".to_string(),
            traces: vec![Trace {
                label: "Window Size (bytes)".to_string(),
                color: "#16a34a",
                data: report
                    .series
                    .iter()
                    .map(|r| (r.time, Some(r.window as f64)))
                    .collect(),
            }],
        }
    }

    /// Both plots of a report.
    pub fn from_report(report: &Report) -> Vec<Self> {
        vec![Self::throughput(report), Self::window_size(report)]
    }
}

/// Sink for time-series plots.
pub trait Renderer {
    fn render(&mut self, plot: &TimeSeriesPlot) -> Result<(), Error>;
}

/// Writes each plot to `<root>/<prefix>_<name>.html`.
#[derive(Debug)]
pub struct PlotlyRenderer {
    root: PathBuf,
    prefix: String,
    show: bool,
    written: Vec<PathBuf>,
}

impl PlotlyRenderer {
    pub fn new(root: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            prefix: prefix.into(),
            show: false,
            written: Vec::new(),
        }
    }

    /// Also open every rendered plot in the browser.
    pub fn show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl Renderer for PlotlyRenderer {
    fn render(&mut self, ts_plot: &TimeSeriesPlot) -> Result<(), Error> {
        std::fs::create_dir_all(&self.root)?;

        let mut plot = Plot::new();
        plot.set_layout(
            Layout::new()
                .title(Title::with_text(&ts_plot.title))
                .x_axis(Axis::new().title(Title::with_text(&ts_plot.x_label)))
                .y_axis(Axis::new().title(Title::with_text(&ts_plot.y_label))),
        );
        for trace in ts_plot.traces.iter() {
            let scatter = Scatter::new(trace.data.t.clone(), trace.data.y.clone())
                .name(&trace.label)
                .mode(Mode::Lines)
                .connect_gaps(false)
                .line(Line::new().color(trace.color));
            plot.add_trace(scatter);
        }

        let plot_path = self
            .root
            .as_path()
            .then(format!("{}_{}.html", self.prefix, ts_plot.name));
        plot.write_html(&plot_path);
        log::info!(
            "Written plot to: {}",
            plot_path.as_os_str().to_string_lossy()
        );

        if self.show {
            plot.show();
        }
        self.written.push(plot_path);
        Ok(())
    }
}

/// Writes each trace to `<root>/<prefix>_<name>_data/<label>.csv` with a `time,value` header.
#[derive(Debug)]
pub struct CsvRenderer {
    root: PathBuf,
    prefix: String,
}

impl CsvRenderer {
    pub fn new(root: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }
}

impl Renderer for CsvRenderer {
    fn render(&mut self, plot: &TimeSeriesPlot) -> Result<(), Error> {
        #[derive(serde::Serialize)]
        struct Record {
            time: f64,
            value: Option<f64>,
        }
        let folder = self
            .root
            .as_path()
            .then(format!("{}_{}_data", self.prefix, plot.name));
        std::fs::create_dir_all(&folder)?;
        for trace in plot.traces.iter() {
            let file_name = trace
                .label
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>();
            let mut writer = csv::Writer::from_path(folder.as_path().then(format!("{file_name}.csv")))?;
            for (time, value) in trace.data.t.iter().copied().zip(trace.data.y.iter().copied()) {
                writer.serialize(Record { time, value })?;
            }
            writer.flush()?;
        }
        log::info!("Written plot data to: {}", folder.to_string_lossy());
        Ok(())
    }
}

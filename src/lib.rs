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
//! Library for analyzing packet traces captured in emulated network topologies.
//!
//! A capture is read with [`trace::TraceReader`], every TCP segment is passed through an
//! [`metrics::Analysis`] which feeds the [`detector::LossDetector`], and the resulting
//! [`metrics::Report`] is drawn by a [`render::Renderer`]. The [`topology`] module describes the
//! emulated labs in which the captures are recorded.

pub mod detector;
pub mod error;
pub mod metrics;
pub mod render;
pub mod topology;
pub mod trace;
pub mod util;

pub use error::Error;

#[cfg(test)]
mod test;

pub mod prelude {
    pub use super::{
        detector::{FlowKey, LossDetector, Observation},
        metrics::{analyze_file, Analysis, AnalysisConfig, Report},
        render::{CsvRenderer, PlotlyRenderer, Renderer, TimeSeriesPlot},
        topology::{LabTopology, Scenario},
        trace::{MalformedPolicy, Segment, TraceReader},
        Error,
    };
}

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
//! Derived per-frame series and summary metrics of a capture.
use std::{fmt, net::IpAddr, path::Path};

use serde::Serialize;

use crate::{
    detector::{FlowKey, LossDetector, Observation},
    trace::{MalformedPolicy, Segment, TraceReader},
    Error,
};

/// Frames of at most this many bytes are considered control-only and excluded from the goodput.
pub const MIN_PAYLOAD_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Frames must be strictly larger than this to count towards the goodput.
    pub min_payload_len: usize,
    pub on_malformed: MalformedPolicy,
    /// Bound on the remembered sequence numbers per flow. `None` keeps all of them.
    pub history_limit: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_payload_len: MIN_PAYLOAD_LEN,
            on_malformed: MalformedPolicy::default(),
            history_limit: None,
        }
    }
}

/// An admitted frame, with its timestamp relative to the first admitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRow {
    pub time: f64,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub len: usize,
    pub window: u16,
}

/// A row of the derived series, i.e., a [`FrameRow`] plus the cumulative throughput up to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesRow {
    pub time: f64,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub len: usize,
    pub window: u16,
    /// Cumulative bytes per second. `None` while the relative time is still zero.
    pub throughput: Option<f64>,
}

/// Bytes per second after `cum_bytes` bytes were seen within `time` seconds.
pub fn throughput(cum_bytes: u64, time: f64) -> Option<f64> {
    if time == 0.0 {
        None
    } else {
        Some(cum_bytes as f64 / time)
    }
}

/// Running throughput for a sequence of `(relative time, length)` pairs.
pub fn cumulative_throughput(rows: impl IntoIterator<Item = (f64, usize)>) -> Vec<Option<f64>> {
    rows.into_iter()
        .scan(0u64, |cum_bytes, (time, len)| {
            *cum_bytes += len as u64;
            Some(throughput(*cum_bytes, time))
        })
        .collect()
}

/// Sum of all lengths strictly above `min_payload_len`.
pub fn goodput(lens: impl IntoIterator<Item = usize>, min_payload_len: usize) -> u64 {
    lens.into_iter()
        .filter(|len| *len > min_payload_len)
        .map(|len| len as u64)
        .sum()
}

/// Fraction of duplicate segments. Zero if nothing was admitted.
pub fn loss_rate(duplicates: usize, admitted: usize) -> f64 {
    if admitted == 0 {
        0.0
    } else {
        duplicates as f64 / admitted as f64
    }
}

pub fn max_window(windows: impl IntoIterator<Item = u16>) -> Option<u16> {
    windows.into_iter().max()
}

/// Summary of one analyzed capture.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Number of admitted TCP segments.
    pub admitted: usize,
    /// Segments whose sequence number was already seen on the same flow.
    pub duplicates: usize,
    /// Number of distinct flow keys.
    pub flows: usize,
    pub total_bytes: u64,
    pub goodput: u64,
    pub loss_rate: f64,
    pub max_window: Option<u16>,
    #[serde(skip)]
    pub series: Vec<SeriesRow>,
}

impl Report {
    /// Compute all metrics from the derived rows and the duplicate counter.
    pub fn aggregate(
        rows: Vec<FrameRow>,
        duplicates: usize,
        flows: usize,
        min_payload_len: usize,
    ) -> Self {
        let admitted = rows.len();
        let throughputs = cumulative_throughput(rows.iter().map(|r| (r.time, r.len)));
        let series = rows
            .into_iter()
            .zip(throughputs)
            .map(|(r, throughput)| SeriesRow {
                time: r.time,
                src_ip: r.src_ip,
                dst_ip: r.dst_ip,
                len: r.len,
                window: r.window,
                throughput,
            })
            .collect::<Vec<_>>();

        Self {
            admitted,
            duplicates,
            flows,
            total_bytes: series.iter().map(|r| r.len as u64).sum(),
            goodput: goodput(series.iter().map(|r| r.len), min_payload_len),
            loss_rate: loss_rate(duplicates, admitted),
            max_window: max_window(series.iter().map(|r| r.window)),
            series,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Goodput: {} bytes", self.goodput)?;
        writeln!(f, "Packet Loss Rate: {:.2}%", self.loss_rate * 100.0)?;
        match self.max_window {
            Some(window) => write!(f, "Max Window Size: {window} bytes"),
            None => write!(f, "Max Window Size: n/a"),
        }
    }
}

/// Accumulator threaded through a single pass over the capture.
#[derive(Debug)]
pub struct Analysis {
    min_payload_len: usize,
    detector: LossDetector,
    start_time: Option<f64>,
    rows: Vec<FrameRow>,
}

impl Analysis {
    pub fn new(config: &AnalysisConfig) -> Self {
        let detector = match config.history_limit {
            Some(limit) => LossDetector::with_history_limit(limit),
            None => LossDetector::new(),
        };
        Self {
            min_payload_len: config.min_payload_len,
            detector,
            start_time: None,
            rows: Vec::new(),
        }
    }

    /// Admit a segment.
    pub fn push(&mut self, segment: &Segment) -> Observation {
        let start_time = *self.start_time.get_or_insert(segment.time);
        self.rows.push(FrameRow {
            time: segment.time - start_time,
            src_ip: segment.src_ip,
            dst_ip: segment.dst_ip,
            len: segment.len,
            window: segment.window,
        });
        self.detector
            .observe(FlowKey::from(segment), segment.seq)
    }

    pub fn finish(self) -> Report {
        Report::aggregate(
            self.rows,
            self.detector.duplicates(),
            self.detector.num_flows(),
            self.min_payload_len,
        )
    }
}

/// Run the analysis over a stream of segments. The first error aborts the analysis.
pub fn analyze_segments(
    segments: impl IntoIterator<Item = Result<Segment, Error>>,
    config: &AnalysisConfig,
) -> Result<Report, Error> {
    let mut analysis = Analysis::new(config);
    for segment in segments {
        analysis.push(&segment?);
    }
    Ok(analysis.finish())
}

/// Analyze a capture file (`.pcap` or `.pcap.gz`).
pub fn analyze_file(path: impl AsRef<Path>, config: &AnalysisConfig) -> Result<Report, Error> {
    let path = path.as_ref();
    log::info!("Loading: {path:?}");
    let mut reader = TraceReader::open(path, config.on_malformed)?;
    let report = analyze_segments(reader.by_ref(), config)?;
    if reader.malformed() > 0 {
        log::warn!(
            "Skipped {} malformed frames out of {} in {path:?}",
            reader.malformed(),
            reader.frames()
        );
    }
    log::info!(
        "Admitted {} TCP segments of {} frames on {} flows",
        report.admitted,
        reader.frames(),
        report.flows
    );
    Ok(report)
}

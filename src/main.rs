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
use std::path::PathBuf;

use clap::Parser;

use netlab::{
    metrics::{analyze_file, AnalysisConfig, MIN_PAYLOAD_LEN},
    render::{CsvRenderer, PlotlyRenderer, Renderer, TimeSeriesPlot},
    trace::MalformedPolicy,
    util,
};

#[derive(Parser, Debug)]
#[command(author, version, about)] // get author/version information from Cargo.toml
/// Compute goodput, loss rate, and window sizes of the TCP traffic in a capture file.
struct Args {
    /// Capture file to analyze (`.pcap` or `.pcap.gz`).
    pcap_path: PathBuf,
    /// Output path for plots.
    #[arg(short, long, default_value = "./plots/")]
    output_path: PathBuf,
    /// Frames of at most this many bytes do not count towards the goodput.
    #[arg(long, default_value_t = MIN_PAYLOAD_LEN)]
    min_payload_len: usize,
    /// How to handle frames that cannot be decoded.
    #[arg(long, value_enum, default_value_t = MalformedPolicy::Abort)]
    on_malformed: MalformedPolicy,
    /// Remember at most this many sequence numbers per flow.
    #[arg(long)]
    history_limit: Option<usize>,
    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
    /// Also write the plotted series as CSV.
    #[arg(long)]
    csv: bool,
    /// Do not render any plots.
    #[arg(long)]
    no_plot: bool,
    /// Open the plots in the browser.
    #[arg(long)]
    show: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let config = AnalysisConfig {
        min_payload_len: args.min_payload_len,
        on_malformed: args.on_malformed,
        history_limit: args.history_limit,
    };

    let report = match analyze_file(&args.pcap_path, &config) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Could not analyze {:?}: {e}", args.pcap_path);
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    let stem = util::trace_stem(&args.pcap_path);
    let mut renderers: Vec<Box<dyn Renderer>> = Vec::new();
    if !args.no_plot {
        renderers.push(Box::new(
            PlotlyRenderer::new(&args.output_path, stem.clone()).show(args.show),
        ));
    }
    if args.csv {
        renderers.push(Box::new(CsvRenderer::new(&args.output_path, stem)));
    }
    for plot in TimeSeriesPlot::from_report(&report) {
        for renderer in renderers.iter_mut() {
            renderer.render(&plot)?;
        }
    }

    Ok(())
}

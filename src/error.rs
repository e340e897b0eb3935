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
//! Error type shared by the trace reader, the renderers and the topology model.
use pcap_file::DataLink;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Pcap error: {0}")]
    Pcap(#[from] pcap_file::PcapError),
    #[error("Unsupported link type {0:?}, only Ethernet captures can be analyzed.")]
    UnsupportedLinkType(DataLink),
    #[error("Frame {index} could not be decoded: {source}")]
    MalformedFrame {
        index: usize,
        #[source]
        source: etherparse::err::packet::SliceError,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid topology: {0}")]
    Topology(String),
}

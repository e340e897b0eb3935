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
//! Capture fixtures and end-to-end tests of the trace analysis.
//!
//! Captures are built in memory with `etherparse::PacketBuilder` and `pcap_file::PcapWriter`.
use std::{io::Write, path::PathBuf, time::Duration};

use etherparse::PacketBuilder;
use flate2::{write::GzEncoder, Compression};
use pcap_file::{
    pcap::{PcapHeader, PcapPacket, PcapWriter},
    DataLink,
};

use crate::{
    metrics::{analyze_file, AnalysisConfig},
    trace::MalformedPolicy,
    Error,
};

pub const H1: [u8; 4] = [10, 0, 0, 1];
pub const H3: [u8; 4] = [10, 0, 0, 3];
pub const H7: [u8; 4] = [10, 0, 0, 7];

const MAC_A: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
const MAC_B: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x07];

/// Ethernet/IPv4/TCP frame of `54 + payload_len` bytes.
pub fn tcp_frame(src: [u8; 4], dst: [u8; 4], seq: u32, window: u16, payload_len: usize) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
        .ipv4(src, dst, 64)
        .tcp(43210, 6633, seq, window);
    let payload = vec![0u8; payload_len];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();
    frame
}

pub fn tcp6_frame(seq: u32, window: u16) -> Vec<u8> {
    let mut src = [0u8; 16];
    src[..2].copy_from_slice(&[0x20, 0x01]);
    src[15] = 1;
    let mut dst = src;
    dst[15] = 7;
    let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
        .ipv6(src, dst, 64)
        .tcp(43210, 6633, seq, window);
    let mut frame = Vec::with_capacity(builder.size(0));
    builder.write(&mut frame, &[]).unwrap();
    frame
}

pub fn udp_frame(src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
        .ipv4(src, dst, 64)
        .udp(5353, 5353);
    let payload = [1u8; 32];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();
    frame
}

/// ARP request from h1 for h7.
pub fn arp_frame() -> Vec<u8> {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&MAC_A);
    frame.extend_from_slice(&[0x08, 0x06]);
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01]);
    frame.extend_from_slice(&MAC_A);
    frame.extend_from_slice(&H1);
    frame.extend_from_slice(&[0x00; 6]);
    frame.extend_from_slice(&H7);
    frame
}

/// Ethernet frame announcing IPv4, but carrying only a few bytes of the IP header.
pub fn truncated_ipv4_frame() -> Vec<u8> {
    let mut frame = MAC_B.to_vec();
    frame.extend_from_slice(&MAC_A);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(&[0x45, 0x00, 0x00, 0x28, 0x00, 0x00]);
    frame
}

pub fn write_pcap_with_datalink(datalink: DataLink, frames: &[(f64, Vec<u8>)]) -> Vec<u8> {
    let header = PcapHeader {
        datalink,
        ..Default::default()
    };
    let mut writer = PcapWriter::with_header(Vec::new(), header).unwrap();
    for (time, data) in frames {
        let packet = PcapPacket::new(Duration::from_secs_f64(*time), data.len() as u32, data);
        writer.write_packet(&packet).unwrap();
    }
    writer.into_writer()
}

/// Ethernet capture with the given `(timestamp, frame)` records.
pub fn write_pcap(frames: &[(f64, Vec<u8>)]) -> Vec<u8> {
    write_pcap_with_datalink(DataLink::ETHERNET, frames)
}

/// Write a capture into the temp directory, optionally gzip-compressed.
pub fn write_pcap_file(name: &str, frames: &[(f64, Vec<u8>)], gzip: bool) -> PathBuf {
    let path = std::env::temp_dir().join(format!("netlab_{}_{name}", std::process::id()));
    let pcap = write_pcap(frames);
    let data = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&pcap).unwrap();
        encoder.finish().unwrap()
    } else {
        pcap
    };
    std::fs::write(&path, data).unwrap();
    path
}

#[test]
fn retransmission_on_single_flow() {
    let path = write_pcap_file(
        "retransmission.pcap",
        &[
            (0.0, tcp_frame(H1, H7, 100, 1000, 100)),
            (0.5, tcp_frame(H1, H7, 200, 1000, 100)),
            (1.0, tcp_frame(H1, H7, 100, 1000, 100)),
        ],
        false,
    );
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.admitted, 3);
    assert_eq!(report.duplicates, 1);
    assert!((report.loss_rate - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn no_transport_segments() {
    let path = write_pcap_file(
        "no_tcp.pcap",
        &[
            (0.0, arp_frame()),
            (0.1, udp_frame(H1, H7)),
            (0.2, udp_frame(H7, H1)),
        ],
        false,
    );
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.admitted, 0);
    assert_eq!(report.loss_rate, 0.0);
    assert_eq!(report.max_window, None);
    assert_eq!(report.goodput, 0);
    assert!(report.series.is_empty());
}

#[test]
fn empty_capture() {
    let path = write_pcap_file("empty.pcap", &[], false);
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.admitted, 0);
    assert_eq!(report.max_window, None);
}

#[test]
fn control_frames_do_not_count_as_goodput() {
    let path = write_pcap_file(
        "goodput.pcap",
        &[
            (0.0, tcp_frame(H1, H7, 1, 1000, 0)),
            (1.0, tcp_frame(H1, H7, 2, 1000, 100)),
        ],
        false,
    );
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.total_bytes, 54 + 154);
    assert_eq!(report.goodput, 154);
    assert!(report.goodput <= report.total_bytes);
}

#[test]
fn sequence_numbers_are_scoped_per_flow() {
    let path = write_pcap_file(
        "two_flows.pcap",
        &[
            (0.0, tcp_frame(H1, H7, 100, 1000, 100)),
            (0.1, tcp_frame(H3, H7, 100, 2000, 100)),
            (0.2, tcp_frame(H1, H7, 200, 3000, 100)),
            (0.3, tcp_frame(H3, H7, 200, 4000, 100)),
        ],
        false,
    );
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.flows, 2);
    assert_eq!(report.max_window, Some(4000));
}

#[test]
fn malformed_frame_aborts_by_default() {
    let frames = [
        (0.0, tcp_frame(H1, H7, 100, 1000, 100)),
        (0.1, truncated_ipv4_frame()),
        (0.2, tcp_frame(H1, H7, 200, 1000, 100)),
    ];
    let path = write_pcap_file("malformed.pcap", &frames, false);
    assert!(matches!(
        analyze_file(&path, &AnalysisConfig::default()),
        Err(Error::MalformedFrame { index: 1, .. })
    ));

    let skip = AnalysisConfig {
        on_malformed: MalformedPolicy::Skip,
        ..Default::default()
    };
    let report = analyze_file(&path, &skip).unwrap();
    assert_eq!(report.admitted, 2);
    assert_eq!(report.duplicates, 0);
}

#[test]
fn truncated_capture_is_fatal() {
    let path = write_pcap_file(
        "truncated.pcap",
        &[(0.0, tcp_frame(H1, H7, 100, 1000, 100))],
        false,
    );
    let mut data = std::fs::read(&path).unwrap();
    // cut the last record in half
    data.truncate(data.len() - 50);
    std::fs::write(&path, data).unwrap();
    assert!(analyze_file(&path, &AnalysisConfig::default()).is_err());
}

#[test]
fn gzip_capture() {
    let frames = [
        (10.0, tcp_frame(H1, H7, 100, 1000, 100)),
        (11.0, tcp_frame(H1, H7, 100, 1000, 100)),
        (12.0, tcp_frame(H1, H7, 300, 5000, 0)),
    ];
    let path = write_pcap_file("gzip.pcap.gz", &frames, true);
    let report = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    assert_eq!(report.admitted, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.max_window, Some(5000));
    assert_eq!(report.series[0].throughput, None);
    assert_eq!(report.series[1].time, 1.0);
    assert_eq!(report.series[1].throughput, Some(308.0));
}

#[test]
fn bounded_history() {
    let frames = [
        (0.0, tcp_frame(H1, H7, 1, 1000, 100)),
        (0.1, tcp_frame(H1, H7, 2, 1000, 100)),
        (0.2, tcp_frame(H1, H7, 1, 1000, 100)),
    ];
    let path = write_pcap_file("bounded.pcap", &frames, false);
    let unbounded = analyze_file(&path, &AnalysisConfig::default()).unwrap();
    let bounded = analyze_file(
        &path,
        &AnalysisConfig {
            history_limit: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(unbounded.duplicates, 1);
    assert_eq!(bounded.duplicates, 0);
}

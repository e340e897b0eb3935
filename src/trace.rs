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
//! Reader for captured packet traces.
//!
//! A [`TraceReader`] walks a libpcap capture frame by frame and yields one [`Segment`] for every
//! Ethernet frame carrying a TCP segment over IPv4 or IPv6. All other frames (ARP, UDP, ICMP, ...)
//! are silently skipped. Frames that claim an IP encapsulation but cannot be decoded are handled
//! according to the [`MalformedPolicy`].
use std::{
    fs::File,
    io::{BufReader, Read},
    net::IpAddr,
    path::Path,
};

use etherparse::{err::packet::SliceError, LaxNetSlice, LaxSlicedPacket, TransportSlice};
use flate2::bufread::GzDecoder;
use pcap_file::{pcap::PcapReader, DataLink};

use crate::Error;

/// What to do with a frame that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MalformedPolicy {
    /// Fail the whole pass on the first malformed frame. No partial results are produced.
    #[default]
    Abort,
    /// Skip malformed frames and keep counting them.
    Skip,
}

/// A TCP segment observed in the capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Absolute capture timestamp in seconds.
    pub time: f64,
    /// Number of captured bytes of the whole link-layer frame.
    pub len: usize,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    /// TCP sequence number.
    pub seq: u32,
    /// Advertised receive window, as found in the header (not scaled).
    pub window: u16,
}

/// Lazy iterator over all TCP segments of a capture.
///
/// After the first error, the iterator is fused and only returns `None`.
pub struct TraceReader<R: Read> {
    cap: PcapReader<R>,
    policy: MalformedPolicy,
    frames: usize,
    malformed: usize,
    failed: bool,
}

impl TraceReader<Box<dyn Read>> {
    /// Open a capture file. Files ending in `.gz` are decompressed on the fly.
    pub fn open(path: impl AsRef<Path>, policy: MalformedPolicy) -> Result<Self, Error> {
        let path = path.as_ref();
        let bufreader = BufReader::new(File::open(path)?);
        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            log::debug!("Reading gzip-compressed capture {path:?}");
            Box::new(GzDecoder::new(bufreader))
        } else {
            Box::new(bufreader)
        };
        Self::new(reader, policy)
    }
}

impl<R: Read> TraceReader<R> {
    /// Create a reader from any source of libpcap data. Fails if the pcap header cannot be read,
    /// or if the capture does not contain Ethernet frames.
    pub fn new(reader: R, policy: MalformedPolicy) -> Result<Self, Error> {
        let cap = PcapReader::new(reader)?;
        let datalink = cap.header().datalink;
        if datalink != DataLink::ETHERNET {
            return Err(Error::UnsupportedLinkType(datalink));
        }
        Ok(Self {
            cap,
            policy,
            frames: 0,
            malformed: 0,
            failed: false,
        })
    }

    /// Number of frames read so far, including skipped ones.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of malformed frames skipped so far. Always zero with [`MalformedPolicy::Abort`].
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<Segment, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(next_packet) = self.cap.next_packet() {
            let packet = match next_packet {
                Ok(packet) => packet,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            let index = self.frames;
            self.frames += 1;

            match decode_tcp(&packet.data) {
                Ok(Some((src_ip, dst_ip, seq, window))) => {
                    return Some(Ok(Segment {
                        time: packet.timestamp.as_secs_f64(),
                        len: packet.data.len(),
                        src_ip,
                        dst_ip,
                        seq,
                        window,
                    }))
                }
                Ok(None) => continue,
                Err(source) => match self.policy {
                    MalformedPolicy::Abort => {
                        self.failed = true;
                        return Some(Err(Error::MalformedFrame { index, source }));
                    }
                    MalformedPolicy::Skip => {
                        log::debug!("Skipping malformed frame {index}: {source}");
                        self.malformed += 1;
                    }
                },
            }
        }
        None
    }
}

/// Decode an Ethernet frame. Returns `None` if it does not carry a TCP segment over IP.
///
/// Decoding is lax about the IP length: captures cut by the snap length and segments with a
/// total length of zero (segmentation offload) are still admitted. Only frames whose headers
/// cannot be read before reaching TCP are malformed.
fn decode_tcp(data: &[u8]) -> Result<Option<(IpAddr, IpAddr, u32, u16)>, SliceError> {
    let pkt = LaxSlicedPacket::from_ethernet(data).map_err(SliceError::Len)?;
    let addrs = match &pkt.net {
        Some(LaxNetSlice::Ipv4(ip)) => Some((
            IpAddr::V4(ip.header().source_addr()),
            IpAddr::V4(ip.header().destination_addr()),
        )),
        Some(LaxNetSlice::Ipv6(ip)) => Some((
            IpAddr::V6(ip.header().source_addr()),
            IpAddr::V6(ip.header().destination_addr()),
        )),
        _ => None,
    };
    match (addrs, pkt.transport, pkt.stop_err) {
        (Some((src_ip, dst_ip)), Some(TransportSlice::Tcp(tcp)), _) => Ok(Some((
            src_ip,
            dst_ip,
            tcp.sequence_number(),
            tcp.window_size(),
        ))),
        (_, _, Some((err, _layer))) => Err(err),
        _ => Ok(None),
    }
}

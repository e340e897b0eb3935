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
//! Retransmission-based loss proxy.
//!
//! The detector only looks at sequence numbers: a segment whose sequence number was already
//! observed on the same flow is counted as a duplicate. There is no gap analysis, no reordering
//! detection and no timer correlation. What is measured is the number of retransmissions seen at
//! the capture point, not the actual loss in the network. Connections that share an address pair
//! are merged into one flow.
//!
//! By default, the per-flow history is never pruned. Sequence numbers that wrap around in very
//! long captures are therefore reported as duplicates.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::IpAddr,
};

use crate::trace::Segment;

/// One direction of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
}

impl From<&Segment> for FlowKey {
    fn from(segment: &Segment) -> Self {
        Self {
            src_ip: segment.src_ip,
            dst_ip: segment.dst_ip,
        }
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.src_ip, self.dst_ip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    FirstSeen,
    Duplicate,
}

#[derive(Debug, Default)]
struct SeqHistory {
    seen: HashSet<u32>,
    /// insertion order, only maintained if the history is bounded
    order: VecDeque<u32>,
}

#[derive(Debug, Default)]
pub struct LossDetector {
    flows: HashMap<FlowKey, SeqHistory>,
    history_limit: Option<usize>,
    observed: usize,
    duplicates: usize,
}

impl LossDetector {
    /// Create a detector that remembers every sequence number of every flow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector that remembers at most `limit` distinct sequence numbers per flow. Once
    /// the limit is reached, the oldest inserted sequence number is forgotten.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: Some(limit.max(1)),
            ..Default::default()
        }
    }

    /// Record a segment and classify it.
    pub fn observe(&mut self, key: FlowKey, seq: u32) -> Observation {
        self.observed += 1;
        let history = self.flows.entry(key).or_default();

        if !history.seen.insert(seq) {
            self.duplicates += 1;
            log::trace!("Duplicate sequence number {seq} on {key}");
            return Observation::Duplicate;
        }

        if let Some(limit) = self.history_limit {
            history.order.push_back(seq);
            while history.order.len() > limit {
                if let Some(old) = history.order.pop_front() {
                    history.seen.remove(&old);
                }
            }
        }

        Observation::FirstSeen
    }

    /// Number of segments counted as duplicates.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Number of segments passed to [`LossDetector::observe`].
    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }
}

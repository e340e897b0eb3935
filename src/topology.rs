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
//! Declarative description of the emulated lab: switches, hosts, shaped links, and the iperf3
//! traffic that is started on the hosts.
//!
//! Nothing in here talks to an emulator. A [`LabTopology`] is validated and rendered into a plan
//! (JSON, or the shell commands each host has to run).
use std::{
    collections::{BTreeMap, HashSet},
    net::Ipv4Addr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

pub const IPERF_PORT: u16 = 6633;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Switch { name: String },
    Host { name: String, ip: Ipv4Addr },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Self::Switch { name } | Self::Host { name, .. } => name.as_str(),
        }
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Switch { .. } => None,
            Self::Host { ip, .. } => Some(*ip),
        }
    }
}

/// A bidirectional link with traffic shaping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    /// Bandwidth in Mbit/s.
    pub bw_mbit: f64,
    /// One-way delay in milliseconds.
    pub delay_ms: u32,
    /// Random loss in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<f64>,
}

impl LinkSpec {
    pub fn new(a: impl Into<String>, b: impl Into<String>, bw_mbit: f64, delay_ms: u32) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            bw_mbit,
            delay_ms,
            loss_pct: None,
        }
    }

    pub fn loss(mut self, loss_pct: f64) -> Self {
        self.loss_pct = Some(loss_pct);
        self
    }

    /// Link parameters in the `key=value` form of the emulator.
    pub fn shaping(&self) -> String {
        match self.loss_pct {
            Some(loss) => format!("bw={} delay='{}ms' loss={loss}", self.bw_mbit, self.delay_ms),
            None => format!("bw={} delay='{}ms'", self.bw_mbit, self.delay_ms),
        }
    }

    fn connects(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// An iperf3 client run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficFlow {
    pub client: String,
    pub server: String,
    pub port: u16,
    /// Target rate in Mbit/s.
    pub rate_mbit: u32,
    /// Number of parallel streams.
    pub parallel: u32,
    pub duration_s: u32,
    /// Start offset relative to the start of the experiment.
    pub start_s: u32,
    pub congestion: String,
}

impl TrafficFlow {
    /// Flow with the default lab parameters: 10 Mbit/s, 10 streams, BBR.
    pub fn new(client: impl Into<String>, server: impl Into<String>, duration_s: u32) -> Self {
        Self {
            client: client.into(),
            server: server.into(),
            port: IPERF_PORT,
            rate_mbit: 10,
            parallel: 10,
            duration_s,
            start_s: 0,
            congestion: "bbr".to_string(),
        }
    }

    pub fn start_at(mut self, start_s: u32) -> Self {
        self.start_s = start_s;
        self
    }

    /// Command that starts the client in the background.
    pub fn client_command(&self, server_ip: Ipv4Addr) -> String {
        let iperf = format!(
            "iperf3 -c {server_ip} -p {} -b {}M -P {} -t {} -C {} &",
            self.port, self.rate_mbit, self.parallel, self.duration_s, self.congestion
        );
        if self.start_s == 0 {
            iperf
        } else {
            format!("sleep {} && {iperf}", self.start_s)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST,
            port: 6633,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabTopology {
    pub name: String,
    pub controller: Controller,
    pub nodes: Vec<Node>,
    pub links: Vec<LinkSpec>,
    /// Host running the iperf3 server.
    pub server: String,
    pub server_port: u16,
    pub flows: Vec<TrafficFlow>,
}

impl LabTopology {
    pub fn new(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controller: Controller::default(),
            nodes: Vec::new(),
            links: Vec::new(),
            server: server.into(),
            server_port: IPERF_PORT,
            flows: Vec::new(),
        }
    }

    /// Builder API: add switches `s1` to `sk`.
    pub fn switches(&mut self, k: usize) -> &mut Self {
        for i in 1..=k {
            self.nodes.push(Node::Switch {
                name: format!("s{i}"),
            });
        }
        self
    }

    /// Builder API: add host `h{i}` with address `10.0.0.{i}`.
    pub fn host(&mut self, i: u8) -> &mut Self {
        self.nodes.push(Node::Host {
            name: format!("h{i}"),
            ip: Ipv4Addr::new(10, 0, 0, i),
        });
        self
    }

    /// Builder API: add a link.
    pub fn link(&mut self, link: LinkSpec) -> &mut Self {
        self.links.push(link);
        self
    }

    /// Builder API: add a client flow.
    pub fn flow(&mut self, flow: TrafficFlow) -> &mut Self {
        self.flows.push(flow);
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn find_link(&self, x: &str, y: &str) -> Option<&LinkSpec> {
        self.links.iter().find(|l| l.connects(x, y))
    }

    fn host_ip(&self, name: &str) -> Result<Ipv4Addr, Error> {
        self.node(name)
            .ok_or_else(|| Error::Topology(format!("unknown node {name}")))?
            .ip()
            .ok_or_else(|| Error::Topology(format!("{name} is not a host")))
    }

    /// Check that the topology is consistent.
    pub fn validate(&self) -> Result<(), Error> {
        let mut names = HashSet::new();
        for node in self.nodes.iter() {
            if !names.insert(node.name()) {
                return Err(Error::Topology(format!("duplicate node {}", node.name())));
            }
        }
        for link in self.links.iter() {
            for end in [&link.a, &link.b] {
                if !names.contains(end.as_str()) {
                    return Err(Error::Topology(format!("link to unknown node {end}")));
                }
            }
            if link.a == link.b {
                return Err(Error::Topology(format!("self-loop at {}", link.a)));
            }
            if !(link.bw_mbit > 0.0) {
                return Err(Error::Topology(format!(
                    "link {}-{} has no bandwidth",
                    link.a, link.b
                )));
            }
            if let Some(loss) = link.loss_pct {
                if !(0.0..=100.0).contains(&loss) {
                    return Err(Error::Topology(format!(
                        "link {}-{} has invalid loss {loss}%",
                        link.a, link.b
                    )));
                }
            }
        }
        self.host_ip(&self.server)?;
        for flow in self.flows.iter() {
            self.host_ip(&flow.client)?;
            self.host_ip(&flow.server)?;
        }
        Ok(())
    }

    pub fn server_command(&self) -> String {
        format!("iperf3 -s -p {} &", self.server_port)
    }

    /// Commands to run on each host, in order. The server is started first.
    pub fn host_commands(&self) -> Result<BTreeMap<String, Vec<String>>, Error> {
        self.validate()?;
        let mut commands: BTreeMap<String, Vec<String>> = BTreeMap::new();
        commands
            .entry(self.server.clone())
            .or_default()
            .push(self.server_command());
        for flow in self.flows.iter() {
            let server_ip = self.host_ip(&flow.server)?;
            commands
                .entry(flow.client.clone())
                .or_default()
                .push(flow.client_command(server_ip));
        }
        Ok(commands)
    }
}

/// Lab scenarios.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Chain of four switches with seven hosts. Clients h1, h3 and h4 start at 0 s, 15 s, and 30 s.
    #[default]
    Staggered,
    /// 100/50/100 Mbit/s switch chain with the bottleneck between s2 and s3. Clients h1, h3 and h4
    /// start together.
    Bottleneck,
}

impl Scenario {
    /// Build the topology. `loss_pct` configures random loss on the central link.
    pub fn build(&self, loss_pct: Option<f64>) -> LabTopology {
        let with_loss = |link: LinkSpec| match loss_pct {
            Some(loss) => link.loss(loss),
            None => link,
        };
        match self {
            Self::Staggered => {
                let mut topo = LabTopology::new("staggered", "h7");
                topo.switches(4);
                for i in 1..=7 {
                    topo.host(i);
                }
                topo.link(LinkSpec::new("h1", "s1", 10.0, 5))
                    .link(LinkSpec::new("h2", "s1", 10.0, 5))
                    .link(LinkSpec::new("s1", "s2", 20.0, 10))
                    .link(LinkSpec::new("h3", "s2", 10.0, 5))
                    .link(LinkSpec::new("h4", "s2", 10.0, 5))
                    .link(with_loss(LinkSpec::new("s2", "s3", 20.0, 10)))
                    .link(LinkSpec::new("h5", "s3", 10.0, 5))
                    .link(LinkSpec::new("h6", "s3", 10.0, 5))
                    .link(LinkSpec::new("s3", "s4", 20.0, 10))
                    .link(LinkSpec::new("h7", "s4", 10.0, 5))
                    .flow(TrafficFlow::new("h1", "h7", 150))
                    .flow(TrafficFlow::new("h3", "h7", 120).start_at(15))
                    .flow(TrafficFlow::new("h4", "h7", 90).start_at(30));
                topo
            }
            Self::Bottleneck => {
                let mut topo = LabTopology::new("bottleneck", "h7");
                topo.switches(4);
                for i in [1, 2, 3, 4, 7] {
                    topo.host(i);
                }
                topo.link(LinkSpec::new("s1", "s2", 100.0, 5))
                    .link(with_loss(LinkSpec::new("s2", "s3", 50.0, 10)))
                    .link(LinkSpec::new("s3", "s4", 100.0, 5))
                    .link(LinkSpec::new("h1", "s1", 10.0, 5))
                    .link(LinkSpec::new("h2", "s1", 10.0, 5))
                    .link(LinkSpec::new("h3", "s2", 10.0, 5))
                    .link(LinkSpec::new("h4", "s2", 10.0, 5))
                    .link(LinkSpec::new("h7", "s4", 10.0, 5))
                    .flow(TrafficFlow::new("h1", "h7", 150))
                    .flow(TrafficFlow::new("h3", "h7", 120))
                    .flow(TrafficFlow::new("h4", "h7", 90));
                topo
            }
        }
    }
}

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
use clap::{Parser, ValueEnum};

use netlab::{topology::Scenario, util};

#[derive(Parser, Debug)]
#[command(author, version, about)]
/// Print the plan of a lab scenario: its topology, or the commands to run on every host.
struct Args {
    /// Scenario to plan.
    #[arg(short, long, value_enum, default_value_t = Scenario::Staggered)]
    scenario: Scenario,
    /// Random loss (in percent) on the central switch link.
    #[arg(short, long)]
    loss: Option<f64>,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Commands)]
    format: Format,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    /// The whole topology as JSON.
    Json,
    /// Links with their shaping parameters, followed by the commands of each host.
    Commands,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let topo = args.scenario.build(args.loss);
    topo.validate()?;
    log::info!(
        "Scenario {} with {} nodes, {} links, and {} flows",
        topo.name,
        topo.nodes.len(),
        topo.links.len(),
        topo.flows.len()
    );

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&topo)?),
        Format::Commands => {
            println!(
                "controller {}:{}",
                topo.controller.ip, topo.controller.port
            );
            for link in topo.links.iter() {
                println!("link {} {} {}", link.a, link.b, link.shaping());
            }
            for (host, commands) in topo.host_commands()? {
                for command in commands {
                    println!("{host} {command}");
                }
            }
        }
    }

    Ok(())
}

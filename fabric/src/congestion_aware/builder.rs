// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Instantiate congestion-aware topologies from a network configuration.

use crate::common::config::{
    parse_expander_routing, parse_fattree_routing, NetworkConfig, TopologyKind,
};
use crate::congestion_aware::multi_dim::MultiDimTopology;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topologies::expander::ExpanderGraph;
use crate::congestion_aware::topologies::fat_tree::FatTree;
use crate::congestion_aware::topologies::fully_connected::FullyConnected;
use crate::congestion_aware::topologies::ring::Ring;
use crate::congestion_aware::topologies::switch::Switch;
use crate::congestion_aware::topologies::switch_or_expander::SwitchOrExpander;
use crate::congestion_aware::topology::{BasicTopology, NetworkTopology};
use crate::error::Error;
use std::rc::Rc;

/// Build the network a configuration describes: the dimension's topology
/// directly for one dimension, a multi-dim composition otherwise.
pub fn construct_topology(
    config: &NetworkConfig,
    sim: Rc<Simulator>,
) -> Result<NetworkTopology, Error> {
    if config.dims_count() == 1 {
        return Ok(NetworkTopology::Basic(build_dimension(config, 0, sim)?));
    }
    let mut multi = MultiDimTopology::new(Rc::clone(&sim));
    for dim in 0..config.dims_count() {
        multi.append_dimension(build_dimension(config, dim, Rc::clone(&sim))?)?;
    }
    Ok(NetworkTopology::MultiDim(multi))
}

fn build_dimension(
    config: &NetworkConfig,
    dim: usize,
    sim: Rc<Simulator>,
) -> Result<BasicTopology, Error> {
    let npus_count = config.npus_count[dim];
    let bandwidth = config.bandwidth[dim];
    let latency = config.latency[dim];

    Ok(match config.topology[dim] {
        TopologyKind::Ring => {
            BasicTopology::Ring(Ring::new(npus_count, bandwidth, latency, sim))
        }
        TopologyKind::FullyConnected => BasicTopology::FullyConnected(FullyConnected::new(
            npus_count, bandwidth, latency, sim,
        )),
        TopologyKind::Switch => {
            BasicTopology::Switch(Switch::new(npus_count, bandwidth, latency, sim))
        }
        TopologyKind::FatTree => BasicTopology::FatTree(FatTree::new(
            npus_count,
            config.fattree_radix_for(dim),
            bandwidth,
            latency,
            parse_fattree_routing(config.routing_algorithm_for(dim)),
            sim,
        )),
        TopologyKind::ExpanderGraph => {
            let inputfile = config.inputfile_for(dim).ok_or_else(|| Error::Config {
                message: format!("dimension {}: ExpanderGraph requires an inputfile", dim),
            })?;
            BasicTopology::ExpanderGraph(ExpanderGraph::from_file(
                npus_count,
                bandwidth,
                latency,
                parse_expander_routing(config.routing_algorithm_for(dim)),
                inputfile,
                config.resiliency_npus(),
                sim,
            )?)
        }
        TopologyKind::SwitchOrExpander => {
            BasicTopology::SwitchOrExpander(SwitchOrExpander::from_file(
                npus_count,
                bandwidth,
                latency,
                parse_expander_routing(config.routing_algorithm_for(dim)),
                config.inputfile_for(dim),
                config.resiliency_npus(),
                sim,
            )?)
        }
    })
}

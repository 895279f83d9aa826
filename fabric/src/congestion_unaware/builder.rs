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

//! Instantiate closed-form topologies from a network configuration.

use crate::common::config::{NetworkConfig, TopologyKind};
use crate::congestion_unaware::topologies::expander::ExpanderGraph;
use crate::congestion_unaware::topologies::fat_tree::FatTree;
use crate::congestion_unaware::topologies::fully_connected::FullyConnected;
use crate::congestion_unaware::topologies::ring::Ring;
use crate::congestion_unaware::topologies::switch::Switch;
use crate::congestion_unaware::topologies::switch_or_expander::SwitchOrExpander;
use crate::congestion_unaware::topology::{BasicTopology, MultiDimTopology, NetworkTopology};
use crate::error::Error;

pub fn construct_topology(config: &NetworkConfig) -> Result<NetworkTopology, Error> {
    if config.dims_count() == 1 {
        return Ok(NetworkTopology::Basic(build_dimension(config, 0)?));
    }
    let mut multi = MultiDimTopology::new();
    for dim in 0..config.dims_count() {
        multi.append_dimension(build_dimension(config, dim)?);
    }
    Ok(NetworkTopology::MultiDim(multi))
}

fn build_dimension(config: &NetworkConfig, dim: usize) -> Result<BasicTopology, Error> {
    let npus_count = config.npus_count[dim];
    let bandwidth = config.bandwidth[dim];
    let latency = config.latency[dim];

    Ok(match config.topology[dim] {
        TopologyKind::Ring => BasicTopology::Ring(Ring::new(npus_count, bandwidth, latency)),
        TopologyKind::FullyConnected => {
            BasicTopology::FullyConnected(FullyConnected::new(npus_count, bandwidth, latency))
        }
        TopologyKind::Switch => {
            BasicTopology::Switch(Switch::new(npus_count, bandwidth, latency))
        }
        TopologyKind::FatTree => BasicTopology::FatTree(FatTree::new(
            npus_count,
            config.fattree_radix_for(dim),
            bandwidth,
            latency,
        )),
        TopologyKind::ExpanderGraph => {
            let inputfile = config.inputfile_for(dim).ok_or_else(|| Error::Config {
                message: format!("dimension {}: ExpanderGraph requires an inputfile", dim),
            })?;
            BasicTopology::ExpanderGraph(ExpanderGraph::from_file(
                npus_count,
                bandwidth,
                latency,
                inputfile,
                config.resiliency_npus(),
            )?)
        }
        TopologyKind::SwitchOrExpander => {
            BasicTopology::SwitchOrExpander(SwitchOrExpander::from_file(
                npus_count,
                bandwidth,
                latency,
                config.inputfile_for(dim),
                config.resiliency_npus(),
            )?)
        }
    })
}

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn test_multi_dim_sums_per_dimension_delays() {
        let config = NetworkConfig::from_yaml(
            "topology: [ Ring, FullyConnected ]\n\
             npus_count: [ 8, 4 ]\n\
             bandwidth: [ 50.0, 50.0 ]\n\
             latency: [ 500, 500 ]\n",
        )
        .unwrap();
        let topology = construct_topology(&config).unwrap();
        // (1,0) -> (4,1): a 3-hop ring leg plus a 1-hop direct leg.
        assert_eq!(topology.send(1, 12, 1_048_576), 21_031 + 20_031);
        // Single-dimension transfers use just that dimension.
        assert_eq!(topology.send(1, 4, 1_048_576), 21_031);
    }
}

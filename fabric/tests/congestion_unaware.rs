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

//! End-to-end closed-form scenarios driven from configuration files.

use fabric::common::NetworkConfig;
use fabric::congestion_unaware::{construct_topology, BasicTopology, NetworkTopology};
use std::path::{Path, PathBuf};

const MB: u64 = 1_048_576;

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn build(name: &str) -> NetworkTopology {
    let config = NetworkConfig::from_file(data(name)).unwrap();
    construct_topology(&config).unwrap()
}

#[test]
fn test_ring_delay() {
    let topology = build("Ring.yml");
    assert_eq!(topology.send(1, 4, MB), 21_031);
}

#[test]
fn test_fully_connected_delay() {
    let topology = build("FullyConnected.yml");
    assert_eq!(topology.send(1, 4, MB), 20_031);
}

#[test]
fn test_switch_delay() {
    let topology = build("Switch.yml");
    assert_eq!(topology.send(1, 4, MB), 20_531);
}

#[test]
fn test_three_dim_delays() {
    let topology = build("Ring_FullyConnected_Switch.yml");
    assert_eq!(topology.npus_count(), 64);

    // Dimension 0: ring neighbors (0,0,0) -> (1,0,0).
    assert_eq!(topology.send(0, 1, MB), 4_006);
    // Dimension 1: (1,2,2) -> (1,4,2), one direct hop.
    assert_eq!(topology.send(37, 41, MB), 10_265);
    // Dimension 2: (0,5,1) -> (0,5,2), two switch hops.
    assert_eq!(topology.send(26, 42, MB), 21_531);
}

#[test]
fn test_delay_formula_matches_hops() {
    let topology = build("Ring.yml");
    for src in 0..8 {
        for dest in 0..8 {
            if src == dest {
                assert_eq!(topology.send(src, dest, MB), 0);
                continue;
            }
            let hops = topology.compute_hops_count(src, dest) as u64;
            // 1 MB at 50 GB/s serializes in 19,531.25 ns.
            assert_eq!(topology.send(src, dest, MB), hops * 500 + 19_531);
        }
    }
}

#[test]
fn test_expander_graph_delays() {
    let topology = build("ExpanderGraph.yml");
    let npus_count = topology.npus_count();

    let Some(BasicTopology::ExpanderGraph(graph)) = topology.as_basic() else {
        panic!("expected an expander graph dimension");
    };
    for node in 0..npus_count {
        assert_eq!(graph.neighbors(node).len(), 4);
    }

    let mut total_distance = 0;
    let mut pairs = 0;
    for src in 0..npus_count / 2 {
        for dest in 0..npus_count {
            if src == dest {
                continue;
            }
            let distance = graph.get_distance(src, dest);
            assert!(distance <= npus_count / 2);
            total_distance += distance;
            pairs += 1;

            // A 1-byte chunk isolates the latency term.
            assert_eq!(topology.send(src, dest, 1), (distance as u64) * 500);
        }
    }
    let average = total_distance as f64 / pairs as f64;
    assert!(average <= npus_count as f64 / 4.0);
}

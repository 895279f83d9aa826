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

//! End-to-end congestion-aware scenarios driven from configuration files.

use fabric::common::NetworkConfig;
use fabric::congestion_aware::{
    construct_topology, BasicTopology, Chunk, NetworkTopology, Simulator,
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MB: u64 = 1_048_576;

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn build(name: &str, sim: &Rc<Simulator>) -> NetworkTopology {
    let config = NetworkConfig::from_file(data(name)).unwrap();
    construct_topology(&config, Rc::clone(sim)).unwrap()
}

#[test]
fn test_ring_single_chunk() {
    let _logger = env_logger::builder().try_init();
    let sim = Rc::new(Simulator::new());
    let topology = build("Ring.yml", &sim);

    let route = topology.route(1, 4);
    assert_eq!(route.len(), 4);
    let arrived = Rc::new(Cell::new(false));
    let flag = Rc::clone(&arrived);
    topology.send(Chunk::new(MB, route, Box::new(move || flag.set(true))));
    sim.run();

    assert!(arrived.get());
    assert_eq!(sim.current_time(), 60_093);
}

#[test]
fn test_fully_connected_single_chunk() {
    let sim = Rc::new(Simulator::new());
    let topology = build("FullyConnected.yml", &sim);

    let route = topology.route(1, 4);
    topology.send(Chunk::new(MB, route, Box::new(|| {})));
    sim.run();

    assert_eq!(sim.current_time(), 20_031);
}

#[test]
fn test_switch_single_chunk() {
    let sim = Rc::new(Simulator::new());
    let topology = build("Switch.yml", &sim);

    let route = topology.route(1, 4);
    assert_eq!(route.len(), 3);
    topology.send(Chunk::new(MB, route, Box::new(|| {})));
    sim.run();

    assert_eq!(sim.current_time(), 40_062);
}

#[test]
fn test_all_gather_on_ring() {
    let sim = Rc::new(Simulator::new());
    let topology = build("Ring.yml", &sim);
    let npus_count = topology.npus_count();

    let completed = Rc::new(Cell::new(0u32));
    for src in 0..npus_count {
        for dest in 0..npus_count {
            if src == dest {
                continue;
            }
            let route = topology.route(src, dest);
            let counter = Rc::clone(&completed);
            topology.send(Chunk::new(
                MB,
                route,
                Box::new(move || counter.set(counter.get() + 1)),
            ));
        }
    }
    sim.run();

    assert_eq!(completed.get(), 56);
    // Shortest-direction routing caps any link's load at ten chunks; the
    // busiest links drain after nine queued serializations plus one full
    // communication delay.
    assert_eq!(sim.current_time(), 196_310);
    // Contention showed up on the wire.
    let summary = topology.congestion_summary();
    assert!(!summary.is_empty());
    assert!(summary[0].2 >= summary.last().unwrap().2);
}

#[test]
fn test_self_route_completes_without_time_advance() {
    let sim = Rc::new(Simulator::new());
    let topology = build("Ring.yml", &sim);

    let route = topology.route(3, 3);
    assert_eq!(route.len(), 1);
    let arrived = Rc::new(Cell::new(false));
    let flag = Rc::clone(&arrived);
    topology.send(Chunk::new(MB, route, Box::new(move || flag.set(true))));

    assert!(arrived.get());
    assert!(sim.finished());
    assert_eq!(sim.current_time(), 0);
}

#[test]
fn test_expander_graph_from_config() {
    let sim = Rc::new(Simulator::new());
    let topology = build("ExpanderGraph.yml", &sim);
    let npus_count = topology.npus_count();

    let Some(BasicTopology::ExpanderGraph(graph)) = topology.as_basic() else {
        panic!("expected an expander graph dimension");
    };
    for node in 0..npus_count {
        assert_eq!(graph.neighbors(node).len(), 4);
    }

    // Tiny chunks serialize in zero time, leaving hops * latency.
    let mut total_distance = 0;
    let mut pairs = 0;
    for src in 0..npus_count / 2 {
        for dest in 0..npus_count {
            if src == dest {
                continue;
            }
            let route = topology.route(src, dest);
            let hops = route.len() - 1;
            total_distance += hops;
            pairs += 1;

            let start = sim.current_time();
            topology.send(Chunk::new(1, route, Box::new(|| {})));
            sim.run();
            assert_eq!(sim.current_time() - start, (hops as u64) * 500);
        }
    }
    let average = total_distance as f64 / pairs as f64;
    assert!(average <= npus_count as f64 / 4.0);
}

#[test]
fn test_switch_or_expander_modes() {
    let sim = Rc::new(Simulator::new());
    let topology = build("SwitchOrExpander.yml", &sim);
    let npus_count = topology.npus_count();

    let Some(BasicTopology::SwitchOrExpander(hybrid)) = topology.as_basic() else {
        panic!("expected a switch-or-expander dimension");
    };

    hybrid.set_moe_routing_all(true);
    for src in 0..npus_count {
        for dest in 0..npus_count {
            if src == dest {
                continue;
            }
            let route = topology.route(src, dest);
            assert!(route.len() <= 5);
            let hops = topology.compute_hops_count(src, dest);
            assert!(hops <= 4);
            assert_eq!(hops, route.len() - 1);
        }
    }

    hybrid.set_moe_routing_all(false);
    for src in 0..npus_count {
        for dest in 0..npus_count {
            if src == dest {
                continue;
            }
            let route = topology.route(src, dest);
            assert_eq!(route.len(), 3);
            assert_eq!(topology.compute_hops_count(src, dest), 2);
        }
    }
}

#[test]
fn test_multi_dim_transfer_time() {
    let sim = Rc::new(Simulator::new());
    let config = NetworkConfig::from_yaml(
        "topology: [ FullyConnected, Switch ]\n\
         npus_count: [ 2, 2 ]\n\
         bandwidth: [ 50.0, 50.0 ]\n\
         latency: [ 500, 500 ]\n",
    )
    .unwrap();
    let topology = construct_topology(&config, Rc::clone(&sim)).unwrap();

    // (0,0) -> (1,1): one direct hop, then two hops through the slice's
    // switch, each taking one communication delay.
    let route = topology.route(0, 3);
    assert_eq!(route.len(), 4);
    topology.send(Chunk::new(MB, route, Box::new(|| {})));
    sim.run();
    assert_eq!(sim.current_time(), 60_093);
}

#[test]
fn test_universal_route_invariants() {
    let sim = Rc::new(Simulator::new());
    for name in ["Ring.yml", "FullyConnected.yml", "Switch.yml", "ExpanderGraph.yml"] {
        let topology = build(name, &sim);
        let npus_count = topology.npus_count();
        for src in 0..npus_count {
            for dest in 0..npus_count {
                let route = topology.route(src, dest);
                assert!(!route.is_empty());
                assert_eq!(route[0].borrow().id(), src);
                assert_eq!(route.last().unwrap().borrow().id(), dest);
                assert_eq!(topology.compute_hops_count(src, dest), route.len() - 1);
                for pair in route.windows(2) {
                    assert!(pair[0].borrow().connected(pair[1].borrow().id()));
                }
            }
        }
    }
}

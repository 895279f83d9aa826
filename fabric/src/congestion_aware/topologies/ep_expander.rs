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

//! Expander whose routes are precomputed offline and loaded from a JSON
//! file. Route selection is a weighted sample over the alternatives of a
//! pair; per-layer permutations remap local ranks onto expander nodes so
//! successive layers spread load differently.

use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::Route;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topology::{DeviceArena, TopologyOps};
use crate::error::Error;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// One precomputed route alternative between a pair of nodes.
#[derive(Clone, Debug, Deserialize)]
pub struct WeightedRoute {
    pub path: Vec<DeviceId>,
    pub hops: usize,
    /// Selection probability; the weights of a pair sum to roughly 1.
    pub weight: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EpRoutesMetadata {
    pub node_count: usize,
    pub degree: usize,
    /// Endpoint count when the graph also contains switch nodes that must
    /// stay out of the rank permutation.
    #[serde(default)]
    pub ep_nodes: Option<usize>,
}

/// On-disk pre-routed expander description.
#[derive(Clone, Debug, Deserialize)]
pub struct EpRoutesSpec {
    pub metadata: EpRoutesMetadata,
    pub routes: HashMap<String, HashMap<String, Vec<WeightedRoute>>>,
}

impl EpRoutesSpec {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|err| Error::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct EpExpander {
    arena: DeviceArena,
    degree: usize,
    ep_node_count: usize,
    routes: HashMap<DeviceId, HashMap<DeviceId, Vec<WeightedRoute>>>,
    layer_permutations: RefCell<HashMap<usize, Vec<DeviceId>>>,
    /// 0 means every layer gets its own permutation; N > 0 repeats the
    /// permutations every N layers.
    num_permutation_layers: Cell<usize>,
    // retained for slice cloning
    spec: Rc<EpRoutesSpec>,
}

impl EpExpander {
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let spec = EpRoutesSpec::from_file(path)?;
        Self::from_spec(Rc::new(spec), bandwidth, latency, sim)
    }

    pub fn from_spec(
        spec: Rc<EpRoutesSpec>,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let node_count = spec.metadata.node_count;
        if node_count == 0 {
            return Err(Error::Topology {
                message: "pre-routed expander: node_count must be positive".into(),
            });
        }
        let ep_node_count = spec.metadata.ep_nodes.unwrap_or(node_count);

        let mut routes: HashMap<DeviceId, HashMap<DeviceId, Vec<WeightedRoute>>> =
            HashMap::new();
        let mut adjacency: Vec<Vec<DeviceId>> = vec![Vec::new(); node_count];
        for (src_key, destinations) in &spec.routes {
            let src = parse_node_key(src_key, node_count)?;
            let entry = routes.entry(src).or_default();
            for (dest_key, options) in destinations {
                let dest = parse_node_key(dest_key, node_count)?;
                if options.is_empty() {
                    return Err(Error::Topology {
                        message: format!(
                            "pre-routed expander: pair ({}, {}) has no routes",
                            src, dest
                        ),
                    });
                }
                for option in options {
                    for &node in &option.path {
                        if node >= node_count {
                            return Err(Error::Topology {
                                message: format!(
                                    "pre-routed expander: path node {} exceeds node_count {}",
                                    node, node_count
                                ),
                            });
                        }
                    }
                    for hop in option.path.windows(2) {
                        if !adjacency[hop[0]].contains(&hop[1]) {
                            adjacency[hop[0]].push(hop[1]);
                            adjacency[hop[1]].push(hop[0]);
                        }
                    }
                }
                entry.insert(dest, options.clone());
            }
        }

        let arena = DeviceArena::new(node_count, node_count, bandwidth, latency, sim);
        for (node, neighbors) in adjacency.iter().enumerate() {
            for &neighbor in neighbors {
                if node < neighbor {
                    arena.connect(node, neighbor, true);
                }
            }
        }
        log::debug!(
            "pre-routed expander: {} nodes, degree {}, routes for {} sources",
            node_count,
            spec.metadata.degree,
            routes.len()
        );

        Ok(Self {
            arena,
            degree: spec.metadata.degree,
            ep_node_count,
            routes,
            layer_permutations: RefCell::new(HashMap::new()),
            num_permutation_layers: Cell::new(0),
            spec,
        })
    }

    pub(crate) fn arena(&self) -> &DeviceArena {
        &self.arena
    }

    pub(crate) fn clone_slice(&self) -> Self {
        let clone = Self::from_spec(
            Rc::clone(&self.spec),
            self.arena.bandwidth(),
            self.arena.latency(),
            Rc::clone(self.arena.sim()),
        )
        .expect("cloning an already-validated pre-routed expander cannot fail");
        clone.set_num_permutation_layers(self.num_permutation_layers.get());
        clone
    }

    pub fn node_count(&self) -> usize {
        self.arena.devices_count()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn ep_node_count(&self) -> usize {
        self.ep_node_count
    }

    /// When set to N > 0, permutations repeat every N layers; 0 gives
    /// every layer its own permutation. Changing this drops the cache.
    pub fn set_num_permutation_layers(&self, layers: usize) {
        self.num_permutation_layers.set(layers);
        self.layer_permutations.borrow_mut().clear();
    }

    pub fn num_permutation_layers(&self) -> usize {
        self.num_permutation_layers.get()
    }

    /// Deterministic rank permutation of a layer, generated on first use.
    pub fn permutation(&self, layer: usize) -> Vec<DeviceId> {
        let layers = self.num_permutation_layers.get();
        let effective = if layers > 0 { layer % layers } else { layer };
        if let Some(permutation) = self.layer_permutations.borrow().get(&effective) {
            return permutation.clone();
        }
        let mut permutation: Vec<DeviceId> = (0..self.ep_node_count).collect();
        let mut rng = Xoshiro256StarStar::seed_from_u64(effective as u64);
        permutation.shuffle(&mut rng);
        self.layer_permutations
            .borrow_mut()
            .insert(effective, permutation.clone());
        permutation
    }

    fn select_route(&self, src: DeviceId, dest: DeviceId) -> &WeightedRoute {
        let options = self
            .routes
            .get(&src)
            .and_then(|destinations| destinations.get(&dest))
            .unwrap_or_else(|| {
                panic!("pre-routed expander: no routes for pair ({}, {})", src, dest)
            });
        if options.len() == 1 {
            return &options[0];
        }
        let sample = self.arena.sim().random_fraction();
        let mut cumulative = 0.0;
        for option in options {
            cumulative += option.weight;
            if sample < cumulative {
                return option;
            }
        }
        // Weights may not sum exactly to 1; the last entry is the fallback.
        options.last().unwrap()
    }

    /// Route between permuted ranks of the given layer.
    pub fn route_with_permutation(
        &self,
        src: DeviceId,
        dest: DeviceId,
        layer: usize,
    ) -> Route {
        if src == dest {
            return self.arena.realize(&[src]);
        }
        let permutation = self.permutation(layer);
        self.route(permutation[src], permutation[dest])
    }

    /// All route alternatives of a permuted pair, for packet spraying.
    pub fn all_routes_with_permutation(
        &self,
        src: DeviceId,
        dest: DeviceId,
        layer: usize,
    ) -> Vec<Route> {
        if src == dest {
            return vec![self.arena.realize(&[src])];
        }
        let permutation = self.permutation(layer);
        let (src, dest) = (permutation[src], permutation[dest]);
        let options = self
            .routes
            .get(&src)
            .and_then(|destinations| destinations.get(&dest))
            .unwrap_or_else(|| {
                panic!("pre-routed expander: no routes for pair ({}, {})", src, dest)
            });
        options
            .iter()
            .map(|option| self.arena.realize(&option.path))
            .collect()
    }
}

fn parse_node_key(key: &str, node_count: usize) -> Result<DeviceId, Error> {
    let node: DeviceId = key.parse().map_err(|_| Error::Topology {
        message: format!("pre-routed expander: invalid node id {:?}", key),
    })?;
    if node >= node_count {
        return Err(Error::Topology {
            message: format!(
                "pre-routed expander: node id {} exceeds node_count {}",
                node, node_count
            ),
        });
    }
    Ok(node)
}

impl TopologyOps for EpExpander {
    fn npus_count(&self) -> usize {
        self.arena.npus_count()
    }

    fn devices_count(&self) -> usize {
        self.arena.devices_count()
    }

    fn bandwidth(&self) -> Bandwidth {
        self.arena.bandwidth()
    }

    fn latency(&self) -> Latency {
        self.arena.latency()
    }

    fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        let devices = self.arena.devices_count();
        assert!(src < devices, "src device {} out of range 0..{}", src, devices);
        assert!(dest < devices, "dest device {} out of range 0..{}", dest, devices);
        if src == dest {
            return self.arena.realize(&[src]);
        }
        let selected = self.select_route(src, dest);
        self.arena.realize(&selected.path)
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        self.routes
            .get(&src)
            .and_then(|destinations| destinations.get(&dest))
            .and_then(|options| options.iter().map(|option| option.hops).min())
            .unwrap_or_else(|| {
                panic!("pre-routed expander: no routes for pair ({}, {})", src, dest)
            })
    }
}

#[cfg(test)]
mod ep_expander_tests {
    use super::*;

    /// Square 0-1-2-3 with a weighted two-route pair (0, 2).
    fn square_spec() -> Rc<EpRoutesSpec> {
        let entry = |path: &[DeviceId], weight: f64| WeightedRoute {
            path: path.to_vec(),
            hops: path.len() - 1,
            weight,
        };
        let mut routes: HashMap<String, HashMap<String, Vec<WeightedRoute>>> = HashMap::new();
        let mut from_zero = HashMap::new();
        from_zero.insert("1".to_string(), vec![entry(&[0, 1], 1.0)]);
        from_zero.insert(
            "2".to_string(),
            vec![entry(&[0, 1, 2], 0.75), entry(&[0, 3, 2], 0.25)],
        );
        from_zero.insert("3".to_string(), vec![entry(&[0, 3], 1.0)]);
        routes.insert("0".to_string(), from_zero);
        Rc::new(EpRoutesSpec {
            metadata: EpRoutesMetadata {
                node_count: 4,
                degree: 2,
                ep_nodes: None,
            },
            routes,
        })
    }

    fn expander() -> EpExpander {
        EpExpander::from_spec(square_spec(), 50.0, 500, Rc::new(Simulator::new())).unwrap()
    }

    #[test]
    fn test_links_built_from_route_paths() {
        let topology = expander();
        assert_eq!(topology.node_count(), 4);
        let route = topology.route(0, 1);
        assert!(route[0].borrow().connected(1));
    }

    #[test]
    fn test_weighted_selection_returns_listed_paths() {
        let topology = expander();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let route = topology.route(0, 2);
            let ids: Vec<_> = route.iter().map(|device| device.borrow().id()).collect();
            assert!(ids == vec![0, 1, 2] || ids == vec![0, 3, 2], "unexpected {:?}", ids);
            seen.insert(ids);
        }
        // With weight 0.25 on the alternative, 64 draws hit both paths.
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_min_hops_reported() {
        let topology = expander();
        assert_eq!(topology.compute_hops_count(0, 2), 2);
        assert_eq!(topology.compute_hops_count(0, 3), 1);
        assert_eq!(topology.compute_hops_count(1, 1), 0);
    }

    #[test]
    fn test_permutations_are_deterministic_and_complete() {
        let topology = expander();
        let first = topology.permutation(3);
        let second = topology.permutation(3);
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..4).collect::<Vec<_>>());
    }

    #[test]
    fn test_permutation_layers_repeat() {
        let topology = expander();
        topology.set_num_permutation_layers(2);
        assert_eq!(topology.permutation(1), topology.permutation(3));
        assert_eq!(topology.permutation(0), topology.permutation(2));
    }

    #[test]
    fn test_all_routes_with_permutation_identity_pair() {
        let topology = expander();
        let routes = topology.all_routes_with_permutation(2, 2, 0);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].len(), 1);
    }
}

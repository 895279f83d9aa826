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

//! Regular expander graph loaded from an external adjacency description.
//!
//! With resiliency spares enabled the graph carries `npus_count / 8` extra
//! devices beyond the NPUs; spares never originate traffic but may appear
//! as intermediate hops.

use crate::common::config::ExpanderRouting;
use crate::common::graph::{ExpanderAdjacency, ExpanderGraphSpec};
use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::Route;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topology::{DeviceArena, TopologyOps};
use crate::error::Error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Number of alternative paths enumerated per pair in top-K routing.
const TOP_K_PATHS: usize = 16;

/// Lowest path rank eligible for top-K sampling, when enough paths exist.
const TOP_K_MIN_RANK: usize = 4;

#[derive(Debug)]
pub struct ExpanderGraph {
    arena: DeviceArena,
    adjacency: ExpanderAdjacency,
    routing: ExpanderRouting,
    route_cache: RefCell<HashMap<(DeviceId, DeviceId), Vec<DeviceId>>>,
    top_k_cache: RefCell<HashMap<(DeviceId, DeviceId), Vec<Vec<DeviceId>>>>,
    // retained for slice cloning
    spec: Rc<ExpanderGraphSpec>,
    resiliency: bool,
}

impl ExpanderGraph {
    pub fn from_file<P: AsRef<Path>>(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: ExpanderRouting,
        path: P,
        resiliency: bool,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let spec = ExpanderGraphSpec::from_file(path)?;
        Self::from_spec(npus_count, bandwidth, latency, routing, Rc::new(spec), resiliency, sim)
    }

    pub fn from_spec(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: ExpanderRouting,
        spec: Rc<ExpanderGraphSpec>,
        resiliency: bool,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let adjacency = ExpanderAdjacency::from_spec(npus_count, &spec, resiliency)?;
        let arena = DeviceArena::new(
            npus_count,
            adjacency.node_count(),
            bandwidth,
            latency,
            sim,
        );
        for (a, b) in adjacency.edges() {
            arena.connect(a, b, true);
        }
        Ok(Self {
            arena,
            adjacency,
            routing,
            route_cache: RefCell::new(HashMap::new()),
            top_k_cache: RefCell::new(HashMap::new()),
            spec,
            resiliency,
        })
    }

    pub(crate) fn arena(&self) -> &DeviceArena {
        &self.arena
    }

    pub(crate) fn clone_slice(&self) -> Self {
        Self::from_spec(
            self.arena.npus_count(),
            self.arena.bandwidth(),
            self.arena.latency(),
            self.routing,
            Rc::clone(&self.spec),
            self.resiliency,
            Rc::clone(self.arena.sim()),
        )
        .expect("cloning an already-validated expander graph cannot fail")
    }

    pub fn neighbors(&self, device: DeviceId) -> &[DeviceId] {
        self.adjacency.neighbors(device)
    }

    pub fn declared_degree(&self) -> usize {
        self.adjacency.declared_degree()
    }

    /// Minimum hop count between two devices, memoized.
    pub fn get_distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.check_pair(src, dest);
        self.adjacency.distance(src, dest)
    }

    fn check_pair(&self, src: DeviceId, dest: DeviceId) {
        let devices = self.arena.devices_count();
        assert!(src < devices, "src device {} out of range 0..{}", src, devices);
        assert!(dest < devices, "dest device {} out of range 0..{}", dest, devices);
    }

    fn shortest_route_ids(&self, src: DeviceId, dest: DeviceId) -> Vec<DeviceId> {
        if let Some(ids) = self.route_cache.borrow().get(&(src, dest)) {
            return ids.clone();
        }
        let ids = self
            .adjacency
            .shortest_path(src, dest)
            .unwrap_or_else(|| panic!("expander graph: no path from {} to {}", src, dest));
        self.route_cache.borrow_mut().insert((src, dest), ids.clone());
        ids
    }

    /// Sample one of the precomputed top-K paths, preferring the longer
    /// alternatives: ranks below `TOP_K_MIN_RANK` are skipped whenever
    /// enough paths exist.
    fn top_k_route_ids(&self, src: DeviceId, dest: DeviceId) -> Vec<DeviceId> {
        if !self.top_k_cache.borrow().contains_key(&(src, dest)) {
            let paths = self.adjacency.k_shortest_paths(src, dest, TOP_K_PATHS);
            assert!(
                !paths.is_empty(),
                "expander graph: no path from {} to {}",
                src,
                dest
            );
            self.top_k_cache.borrow_mut().insert((src, dest), paths);
        }
        let cache = self.top_k_cache.borrow();
        let paths = &cache[&(src, dest)];
        let index = if paths.len() > TOP_K_MIN_RANK {
            TOP_K_MIN_RANK + self.arena.sim().random_index(paths.len() - TOP_K_MIN_RANK)
        } else {
            self.arena.sim().random_index(paths.len())
        };
        paths[index].clone()
    }
}

impl TopologyOps for ExpanderGraph {
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
        self.check_pair(src, dest);
        if src == dest {
            return self.arena.realize(&[src]);
        }
        let ids = match self.routing {
            ExpanderRouting::ShortestPath => self.shortest_route_ids(src, dest),
            ExpanderRouting::RandomTopK => self.top_k_route_ids(src, dest),
        };
        self.arena.realize(&ids)
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.get_distance(src, dest)
    }
}

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

//! Three-level fat tree with radix parameter `k` (even, positive).
//!
//! Geometry: `k/2` pods; each pod holds `k` leaf switches and `k/2` spine
//! switches, for `k²/2` leaves and `k²/4` spines in total, over `(k/2)²`
//! core switches. NPUs attach `k/2` per leaf. Cores form a
//! `(k/2) x (k/2)` grid indexed `column * (k/2) + row`; spine position `i`
//! of every pod connects to all cores of column `i`.
//!
//! Device id layout:
//!
//! ```text
//! [0, N)                 NPUs
//! [N, N + k²/2)          leaf switches
//! [N + k²/2, N + 3k²/4)  spine switches
//! [N + 3k²/4, ...)       core switches
//! ```
//!
//! Routing goes up and down the levels: two hops inside a leaf, four
//! inside a pod, six across pods. The up and down spine positions are
//! always equal since only cores of the chosen spine's column connect
//! both pods.

use crate::common::config::FatTreeRouting;
use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::Route;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topology::{check_npu_pair, DeviceArena, TopologyOps};
use std::rc::Rc;

#[derive(Debug)]
pub struct FatTree {
    arena: DeviceArena,
    k: usize,
    routing: FatTreeRouting,
    npu_to_leaf: Vec<usize>,
}

impl FatTree {
    pub fn new(
        npus_count: usize,
        k: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: FatTreeRouting,
        sim: Rc<Simulator>,
    ) -> Self {
        assert!(k > 0 && k % 2 == 0, "fat-tree radix ({}) must be even and positive", k);
        let leaves = k * k / 2;
        let spines = k * k / 4;
        let cores = (k / 2) * (k / 2);
        assert!(
            npus_count <= leaves * (k / 2),
            "fat tree of radix {} holds at most {} NPUs, got {}",
            k,
            leaves * (k / 2),
            npus_count
        );

        let devices_count = npus_count + leaves + spines + cores;
        let arena = DeviceArena::new(npus_count, devices_count, bandwidth, latency, sim);

        // Fill leaves left to right, k/2 NPUs each.
        let mut npu_to_leaf = Vec::with_capacity(npus_count);
        for npu in 0..npus_count {
            npu_to_leaf.push(npu / (k / 2));
        }

        let topology = Self {
            arena,
            k,
            routing,
            npu_to_leaf,
        };

        for npu in 0..npus_count {
            topology
                .arena
                .connect(npu, topology.leaf_device(topology.npu_to_leaf[npu]), true);
        }
        // Each leaf reaches every spine of its pod.
        let pods = k / 2;
        for pod in 0..pods {
            for leaf_in_pod in 0..k {
                for spine_pos in 0..k / 2 {
                    topology.arena.connect(
                        topology.leaf_device(pod * k + leaf_in_pod),
                        topology.spine_device(pod * (k / 2) + spine_pos),
                        true,
                    );
                }
            }
        }
        // Spine position i of every pod reaches all cores of column i.
        for pod in 0..pods {
            for spine_pos in 0..k / 2 {
                for core_row in 0..k / 2 {
                    topology.arena.connect(
                        topology.spine_device(pod * (k / 2) + spine_pos),
                        topology.core_device(spine_pos * (k / 2) + core_row),
                        true,
                    );
                }
            }
        }
        topology
    }

    pub(crate) fn arena(&self) -> &DeviceArena {
        &self.arena
    }

    pub(crate) fn clone_slice(&self) -> Self {
        Self::new(
            self.arena.npus_count(),
            self.k,
            self.arena.bandwidth(),
            self.arena.latency(),
            self.routing,
            Rc::clone(self.arena.sim()),
        )
    }

    fn leaf_device(&self, leaf: usize) -> DeviceId {
        self.arena.npus_count() + leaf
    }

    fn spine_device(&self, spine: usize) -> DeviceId {
        self.arena.npus_count() + self.k * self.k / 2 + spine
    }

    fn core_device(&self, core: usize) -> DeviceId {
        self.arena.npus_count() + self.k * self.k / 2 + self.k * self.k / 4 + core
    }

    fn spine_position(&self, leaf_in_pod: usize) -> usize {
        match self.routing {
            FatTreeRouting::Deterministic => leaf_in_pod % (self.k / 2),
            FatTreeRouting::Random => self.arena.sim().random_index(self.k / 2),
        }
    }

    fn core_row(&self, dest_leaf_in_pod: usize) -> usize {
        match self.routing {
            FatTreeRouting::Deterministic => dest_leaf_in_pod % (self.k / 2),
            FatTreeRouting::Random => self.arena.sim().random_index(self.k / 2),
        }
    }
}

impl TopologyOps for FatTree {
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
        check_npu_pair(self.npus_count(), src, dest);
        if src == dest {
            return self.arena.realize(&[src]);
        }

        let src_leaf = self.npu_to_leaf[src];
        let dest_leaf = self.npu_to_leaf[dest];
        if src_leaf == dest_leaf {
            return self
                .arena
                .realize(&[src, self.leaf_device(src_leaf), dest]);
        }

        let src_pod = src_leaf / self.k;
        let dest_pod = dest_leaf / self.k;
        let src_leaf_in_pod = src_leaf % self.k;
        let dest_leaf_in_pod = dest_leaf % self.k;
        let spine_pos = self.spine_position(src_leaf_in_pod);

        if src_pod == dest_pod {
            let spine = src_pod * (self.k / 2) + spine_pos;
            return self.arena.realize(&[
                src,
                self.leaf_device(src_leaf),
                self.spine_device(spine),
                self.leaf_device(dest_leaf),
                dest,
            ]);
        }

        let core = spine_pos * (self.k / 2) + self.core_row(dest_leaf_in_pod);
        self.arena.realize(&[
            src,
            self.leaf_device(src_leaf),
            self.spine_device(src_pod * (self.k / 2) + spine_pos),
            self.core_device(core),
            self.spine_device(dest_pod * (self.k / 2) + spine_pos),
            self.leaf_device(dest_leaf),
            dest,
        ])
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        check_npu_pair(self.npus_count(), src, dest);
        if src == dest {
            return 0;
        }
        let src_leaf = self.npu_to_leaf[src];
        let dest_leaf = self.npu_to_leaf[dest];
        if src_leaf == dest_leaf {
            2
        } else if src_leaf / self.k == dest_leaf / self.k {
            4
        } else {
            6
        }
    }
}

#[cfg(test)]
mod fat_tree_tests {
    use super::*;

    fn fat_tree(npus: usize, k: usize, routing: FatTreeRouting) -> FatTree {
        FatTree::new(npus, k, 50.0, 500, routing, Rc::new(Simulator::new()))
    }

    fn assert_route_valid(topology: &FatTree, src: DeviceId, dest: DeviceId) {
        let route = topology.route(src, dest);
        assert_eq!(route[0].borrow().id(), src);
        assert_eq!(route.last().unwrap().borrow().id(), dest);
        for pair in route.windows(2) {
            assert!(
                pair[0].borrow().connected(pair[1].borrow().id()),
                "route {}->{} has unconnected hop {}->{}",
                src,
                dest,
                pair[0].borrow().id(),
                pair[1].borrow().id()
            );
        }
    }

    #[test]
    fn test_device_layout_counts() {
        // k=4: 8 leaves, 4 spines, 4 cores, 2 pods, 2 NPUs per leaf.
        let topology = fat_tree(16, 4, FatTreeRouting::Deterministic);
        assert_eq!(topology.npus_count(), 16);
        assert_eq!(topology.devices_count(), 16 + 8 + 4 + 4);
    }

    #[test]
    fn test_hop_classes() {
        let topology = fat_tree(16, 4, FatTreeRouting::Deterministic);
        // NPUs 0 and 1 share leaf 0; NPU 2 is on leaf 1 (same pod);
        // NPU 8 is on leaf 4, pod 1.
        assert_eq!(topology.compute_hops_count(0, 1), 2);
        assert_eq!(topology.compute_hops_count(0, 2), 4);
        assert_eq!(topology.compute_hops_count(0, 8), 6);
        assert_eq!(topology.route(0, 1).len(), 3);
        assert_eq!(topology.route(0, 2).len(), 5);
        assert_eq!(topology.route(0, 8).len(), 7);
    }

    #[test]
    fn test_deterministic_routes_are_valid() {
        let topology = fat_tree(16, 4, FatTreeRouting::Deterministic);
        for src in 0..16 {
            for dest in 0..16 {
                assert_route_valid(&topology, src, dest);
                assert_eq!(
                    topology.compute_hops_count(src, dest),
                    topology.route(src, dest).len() - 1
                );
            }
        }
    }

    #[test]
    fn test_random_routes_are_valid() {
        let topology = fat_tree(16, 4, FatTreeRouting::Random);
        for _ in 0..8 {
            for src in 0..16 {
                for dest in 0..16 {
                    assert_route_valid(&topology, src, dest);
                }
            }
        }
    }

    #[test]
    fn test_partially_populated_tree() {
        let topology = fat_tree(6, 4, FatTreeRouting::Deterministic);
        for src in 0..6 {
            for dest in 0..6 {
                assert_route_valid(&topology, src, dest);
            }
        }
    }

    #[test]
    #[should_panic(expected = "even and positive")]
    fn test_odd_radix_rejected() {
        fat_tree(4, 3, FatTreeRouting::Deterministic);
    }
}

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

use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::Route;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topology::{check_npu_pair, DeviceArena, TopologyOps};
use std::rc::Rc;

/// N NPUs arranged in a bidirectional cycle.
///
/// Routing takes the shorter direction around the ring; an exact tie goes
/// clockwise (towards increasing ids).
#[derive(Debug)]
pub struct Ring {
    arena: DeviceArena,
}

impl Ring {
    pub fn new(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Self {
        let arena = DeviceArena::new(npus_count, npus_count, bandwidth, latency, sim);
        if npus_count > 1 {
            for npu in 0..npus_count {
                arena.connect(npu, (npu + 1) % npus_count, true);
            }
        }
        Self { arena }
    }

    pub(crate) fn arena(&self) -> &DeviceArena {
        &self.arena
    }

    pub(crate) fn clone_slice(&self) -> Self {
        Self::new(
            self.arena.npus_count(),
            self.arena.bandwidth(),
            self.arena.latency(),
            Rc::clone(self.arena.sim()),
        )
    }

    /// Hops travelled clockwise from `src` to `dest`.
    fn clockwise_distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        let n = self.arena.npus_count();
        (dest + n - src) % n
    }
}

impl TopologyOps for Ring {
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
        let n = self.arena.npus_count();
        let clockwise = self.clockwise_distance(src, dest);
        let counterclockwise = (n - clockwise) % n;

        let mut ids = vec![src];
        let mut current = src;
        if clockwise <= counterclockwise {
            while current != dest {
                current = (current + 1) % n;
                ids.push(current);
            }
        } else {
            while current != dest {
                current = (current + n - 1) % n;
                ids.push(current);
            }
        }
        self.arena.realize(&ids)
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        check_npu_pair(self.npus_count(), src, dest);
        let n = self.arena.npus_count();
        let clockwise = self.clockwise_distance(src, dest);
        clockwise.min((n - clockwise) % n)
    }
}

#[cfg(test)]
mod ring_tests {
    use super::*;

    fn ring(npus: usize) -> Ring {
        Ring::new(npus, 50.0, 500, Rc::new(Simulator::new()))
    }

    fn ids(route: &Route) -> Vec<DeviceId> {
        route.iter().map(|device| device.borrow().id()).collect()
    }

    #[test]
    fn test_shorter_direction_wins() {
        let topology = ring(8);
        assert_eq!(ids(&topology.route(1, 4)), vec![1, 2, 3, 4]);
        assert_eq!(ids(&topology.route(1, 6)), vec![1, 0, 7, 6]);
        assert_eq!(topology.compute_hops_count(1, 4), 3);
        assert_eq!(topology.compute_hops_count(1, 6), 3);
    }

    #[test]
    fn test_tie_breaks_clockwise() {
        let topology = ring(8);
        assert_eq!(ids(&topology.route(0, 4)), vec![0, 1, 2, 3, 4]);
        assert_eq!(topology.compute_hops_count(0, 4), 4);
    }

    #[test]
    fn test_self_route_is_single_device() {
        let topology = ring(8);
        assert_eq!(ids(&topology.route(5, 5)), vec![5]);
        assert_eq!(topology.compute_hops_count(5, 5), 0);
    }

    #[test]
    fn test_consecutive_devices_connected() {
        let topology = ring(8);
        for src in 0..8 {
            for dest in 0..8 {
                let route = topology.route(src, dest);
                for pair in route.windows(2) {
                    assert!(pair[0].borrow().connected(pair[1].borrow().id()));
                }
            }
        }
    }

    #[test]
    fn test_hops_match_route_length() {
        let topology = ring(7);
        for src in 0..7 {
            for dest in 0..7 {
                assert_eq!(
                    topology.compute_hops_count(src, dest),
                    topology.route(src, dest).len() - 1
                );
            }
        }
    }
}

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

/// Every NPU pair is directly connected; all routes are one hop.
#[derive(Debug)]
pub struct FullyConnected {
    arena: DeviceArena,
}

impl FullyConnected {
    pub fn new(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Self {
        let arena = DeviceArena::new(npus_count, npus_count, bandwidth, latency, sim);
        for npu in 0..npus_count {
            for peer in 0..npu {
                arena.connect(npu, peer, true);
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
}

impl TopologyOps for FullyConnected {
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
        self.arena.realize(&[src, dest])
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        check_npu_pair(self.npus_count(), src, dest);
        usize::from(src != dest)
    }
}

#[cfg(test)]
mod fully_connected_tests {
    use super::*;

    #[test]
    fn test_all_pairs_one_hop() {
        let topology = FullyConnected::new(8, 50.0, 500, Rc::new(Simulator::new()));
        for src in 0..8 {
            for dest in 0..8 {
                let route = topology.route(src, dest);
                if src == dest {
                    assert_eq!(route.len(), 1);
                } else {
                    assert_eq!(route.len(), 2);
                    assert!(route[0].borrow().connected(dest));
                }
                assert_eq!(topology.compute_hops_count(src, dest), route.len() - 1);
            }
        }
    }
}

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

/// N NPUs hanging off a single switch device with id N; every route
/// crosses the switch, so all NPU pairs are two hops apart.
#[derive(Debug)]
pub struct Switch {
    arena: DeviceArena,
}

impl Switch {
    pub fn new(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Self {
        let arena = DeviceArena::new(npus_count, npus_count + 1, bandwidth, latency, sim);
        let switch = npus_count;
        for npu in 0..npus_count {
            arena.connect(npu, switch, true);
        }
        Self { arena }
    }

    pub fn switch_id(&self) -> DeviceId {
        self.arena.npus_count()
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

impl TopologyOps for Switch {
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
        self.arena.realize(&[src, self.switch_id(), dest])
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        check_npu_pair(self.npus_count(), src, dest);
        if src == dest {
            0
        } else {
            2
        }
    }
}

#[cfg(test)]
mod switch_tests {
    use super::*;

    #[test]
    fn test_routes_cross_the_switch() {
        let topology = Switch::new(8, 50.0, 500, Rc::new(Simulator::new()));
        let route = topology.route(1, 4);
        let ids: Vec<_> = route.iter().map(|device| device.borrow().id()).collect();
        assert_eq!(ids, vec![1, 8, 4]);
        assert_eq!(topology.compute_hops_count(1, 4), 2);
        assert_eq!(topology.route(3, 3).len(), 1);
    }
}

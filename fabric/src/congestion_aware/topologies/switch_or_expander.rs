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

//! Hybrid topology holding both a single switch and, optionally, an
//! expander graph over the same NPUs.
//!
//! Each device carries a MoE-routing flag. A pair of devices with the
//! flag set routes through the expander (when one exists); otherwise
//! traffic crosses the switch. Mixing modes within one pair is a
//! programmer error.

use crate::common::config::ExpanderRouting;
use crate::common::graph::ExpanderGraphSpec;
use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::Route;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topologies::expander::ExpanderGraph;
use crate::congestion_aware::topologies::switch::Switch;
use crate::congestion_aware::topology::TopologyOps;
use crate::error::Error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug)]
pub struct SwitchOrExpander {
    switch: Switch,
    expander: Option<ExpanderGraph>,
    moe_routing: RefCell<HashMap<DeviceId, bool>>,
}

impl SwitchOrExpander {
    pub fn from_file<P: AsRef<Path>>(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: ExpanderRouting,
        inputfile: Option<P>,
        resiliency: bool,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let spec = match inputfile {
            Some(path) => Some(Rc::new(ExpanderGraphSpec::from_file(path)?)),
            None => None,
        };
        Self::from_spec(npus_count, bandwidth, latency, routing, spec, resiliency, sim)
    }

    pub fn from_spec(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        routing: ExpanderRouting,
        spec: Option<Rc<ExpanderGraphSpec>>,
        resiliency: bool,
        sim: Rc<Simulator>,
    ) -> Result<Self, Error> {
        let switch = Switch::new(npus_count, bandwidth, latency, Rc::clone(&sim));
        let expander = match spec {
            Some(spec) => Some(ExpanderGraph::from_spec(
                npus_count,
                bandwidth,
                latency,
                routing,
                spec,
                resiliency,
                sim,
            )?),
            None => None,
        };
        Ok(Self {
            switch,
            expander,
            moe_routing: RefCell::new(HashMap::new()),
        })
    }

    pub fn expander(&self) -> Option<&ExpanderGraph> {
        self.expander.as_ref()
    }

    /// Set the MoE-routing flag of one device.
    pub fn set_moe_routing(&self, device: DeviceId, enabled: bool) {
        assert!(
            device < self.devices_count(),
            "device {} out of range 0..{}",
            device,
            self.devices_count()
        );
        self.moe_routing.borrow_mut().insert(device, enabled);
    }

    /// Set the MoE-routing flag of every device.
    pub fn set_moe_routing_all(&self, enabled: bool) {
        let mut moe_routing = self.moe_routing.borrow_mut();
        for device in 0..self.devices_count() {
            moe_routing.insert(device, enabled);
        }
    }

    pub fn moe_routing(&self, device: DeviceId) -> bool {
        self.moe_routing.borrow().get(&device).copied().unwrap_or(false)
    }

    /// The routing mode of a pair; both endpoints must agree.
    fn pair_mode(&self, src: DeviceId, dest: DeviceId) -> bool {
        let src_mode = self.moe_routing(src);
        let dest_mode = self.moe_routing(dest);
        assert_eq!(
            src_mode, dest_mode,
            "mixed MoE routing modes for pair ({}, {})",
            src, dest
        );
        src_mode
    }

    pub fn get_distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        match (&self.expander, self.pair_mode(src, dest)) {
            (Some(expander), true) => expander.get_distance(src, dest),
            _ => self.switch.compute_hops_count(src, dest),
        }
    }

    pub(crate) fn clone_slice(&self) -> Self {
        Self {
            switch: self.switch.clone_slice(),
            expander: self.expander.as_ref().map(ExpanderGraph::clone_slice),
            moe_routing: RefCell::new(self.moe_routing.borrow().clone()),
        }
    }

    pub(crate) fn congestion_summary(&self) -> Vec<(DeviceId, DeviceId, u64)> {
        let mut summary = self.switch.arena().congestion_summary();
        if let Some(expander) = &self.expander {
            summary.extend(expander.arena().congestion_summary());
        }
        summary.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        summary
    }
}

impl TopologyOps for SwitchOrExpander {
    fn npus_count(&self) -> usize {
        self.switch.npus_count()
    }

    fn devices_count(&self) -> usize {
        // Expander devices (including any spares) plus the switch.
        match &self.expander {
            Some(expander) => expander.devices_count() + 1,
            None => self.switch.devices_count(),
        }
    }

    fn bandwidth(&self) -> Bandwidth {
        self.switch.bandwidth()
    }

    fn latency(&self) -> Latency {
        self.switch.latency()
    }

    fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        match (&self.expander, self.pair_mode(src, dest)) {
            (Some(expander), true) => expander.route(src, dest),
            _ => self.switch.route(src, dest),
        }
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        match (&self.expander, self.pair_mode(src, dest)) {
            (Some(expander), true) => expander.compute_hops_count(src, dest),
            _ => self.switch.compute_hops_count(src, dest),
        }
    }
}

#[cfg(test)]
mod switch_or_expander_tests {
    use super::*;

    fn circulant_16() -> Rc<ExpanderGraphSpec> {
        let adjacency = (0..16usize)
            .map(|node| {
                [1usize, 4]
                    .iter()
                    .flat_map(|&jump| [(node + jump) % 16, (node + 16 - jump) % 16])
                    .collect()
            })
            .collect();
        Rc::new(ExpanderGraphSpec {
            node_count: 16,
            degree: 4,
            groups: None,
            connected_graph_adjacency: Some(adjacency),
            split_graph_adjacency: None,
        })
    }

    fn hybrid() -> SwitchOrExpander {
        SwitchOrExpander::from_spec(
            16,
            50.0,
            500,
            ExpanderRouting::ShortestPath,
            Some(circulant_16()),
            false,
            Rc::new(Simulator::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_switch_mode_routes_have_three_devices() {
        let topology = hybrid();
        for src in 0..16 {
            for dest in 0..16 {
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
    fn test_moe_mode_routes_through_expander() {
        let topology = hybrid();
        topology.set_moe_routing_all(true);
        for src in 0..16 {
            for dest in 0..16 {
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
    }

    #[test]
    fn test_mode_toggles_back_to_switch() {
        let topology = hybrid();
        topology.set_moe_routing_all(true);
        topology.set_moe_routing_all(false);
        assert_eq!(topology.route(0, 9).len(), 3);
    }

    #[test]
    fn test_without_expander_always_switch() {
        let topology = SwitchOrExpander::from_spec(
            8,
            50.0,
            500,
            ExpanderRouting::ShortestPath,
            None,
            false,
            Rc::new(Simulator::new()),
        )
        .unwrap();
        topology.set_moe_routing_all(true);
        assert_eq!(topology.route(0, 5).len(), 3);
        assert_eq!(topology.devices_count(), 9);
    }

    #[test]
    #[should_panic(expected = "mixed MoE routing modes")]
    fn test_mixed_mode_pair_panics() {
        let topology = hybrid();
        topology.set_moe_routing(0, true);
        topology.route(0, 1);
    }
}

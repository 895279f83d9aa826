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

//! Common capability of all congestion-aware topologies and the device
//! pool they are built on.

use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::{Chunk, Route};
use crate::congestion_aware::device::Device;
use crate::congestion_aware::link::Link;
use crate::congestion_aware::multi_dim::MultiDimTopology;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topologies::ep_expander::EpExpander;
use crate::congestion_aware::topologies::expander::ExpanderGraph;
use crate::congestion_aware::topologies::fat_tree::FatTree;
use crate::congestion_aware::topologies::fully_connected::FullyConnected;
use crate::congestion_aware::topologies::ring::Ring;
use crate::congestion_aware::topologies::switch::Switch;
use crate::congestion_aware::topologies::switch_or_expander::SwitchOrExpander;
use std::cell::RefCell;
use std::rc::Rc;

/// Capability shared by every topology: produce routes and hop counts and
/// inject chunks into the network.
///
/// A route always starts at `src`, ends at `dest`, and every consecutive
/// pair of devices on it is connected by a link. `route(i, i)` is the
/// single-device route and completes immediately when sent.
pub trait TopologyOps {
    /// Number of NPU endpoints.
    fn npus_count(&self) -> usize;

    /// Number of devices, NPUs and infrastructure nodes combined.
    fn devices_count(&self) -> usize;

    /// Per-link bandwidth of this topology, in GB/s.
    fn bandwidth(&self) -> Bandwidth;

    /// Per-link latency of this topology, in nanoseconds.
    fn latency(&self) -> Latency;

    fn route(&self, src: DeviceId, dest: DeviceId) -> Route;

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.route(src, dest).len() - 1
    }

    /// Inject a chunk at the first device of its route.
    fn send(&self, chunk: Chunk) {
        let device = Rc::clone(chunk.current_device());
        let device = device.borrow();
        device.send(chunk);
    }
}

/// Pool of devices a topology wires up, with uniform link parameters.
#[derive(Debug)]
pub(crate) struct DeviceArena {
    sim: Rc<Simulator>,
    devices: Vec<Rc<RefCell<Device>>>,
    npus_count: usize,
    bandwidth: Bandwidth,
    latency: Latency,
}

impl DeviceArena {
    pub fn new(
        npus_count: usize,
        devices_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        sim: Rc<Simulator>,
    ) -> Self {
        assert!(npus_count > 0, "topology needs at least one NPU");
        assert!(devices_count >= npus_count);
        assert!(bandwidth > 0.0, "bandwidth ({}) must be positive", bandwidth);
        let devices = (0..devices_count)
            .map(|id| Rc::new(RefCell::new(Device::new(id))))
            .collect();
        Self {
            sim,
            devices,
            npus_count,
            bandwidth,
            latency,
        }
    }

    pub fn sim(&self) -> &Rc<Simulator> {
        &self.sim
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn devices_count(&self) -> usize {
        self.devices.len()
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn device(&self, id: DeviceId) -> &Rc<RefCell<Device>> {
        self.devices
            .get(id)
            .unwrap_or_else(|| panic!("device id {} out of range", id))
    }

    /// Wire `src` towards `dest`; a bidirectional connect creates two
    /// independent links.
    pub fn connect(&self, src: DeviceId, dest: DeviceId, bidirectional: bool) {
        assert_ne!(src, dest, "cannot connect device {} to itself", src);
        let forward = Link::new(self.bandwidth, self.latency, Rc::clone(&self.sim));
        self.device(src)
            .borrow_mut()
            .connect(dest, Rc::new(RefCell::new(forward)));
        if bidirectional {
            let backward = Link::new(self.bandwidth, self.latency, Rc::clone(&self.sim));
            self.device(dest)
                .borrow_mut()
                .connect(src, Rc::new(RefCell::new(backward)));
        }
    }

    /// Turn a device-id path into a route of shared device handles.
    pub fn realize(&self, ids: &[DeviceId]) -> Route {
        ids.iter().map(|&id| Rc::clone(self.device(id))).collect()
    }

    /// Per-link queueing totals, busiest first.
    pub fn congestion_summary(&self) -> Vec<(DeviceId, DeviceId, u64)> {
        let mut summary = Vec::new();
        for device in &self.devices {
            let device = device.borrow();
            for (to, link) in device.outbound_links() {
                let queued = link.borrow().queued_count();
                if queued > 0 {
                    summary.push((device.id(), to, queued));
                }
            }
        }
        summary.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        summary
    }
}

/// The closed family of one-dimensional topologies.
#[derive(Debug)]
pub enum BasicTopology {
    Ring(Ring),
    FullyConnected(FullyConnected),
    Switch(Switch),
    FatTree(FatTree),
    ExpanderGraph(ExpanderGraph),
    SwitchOrExpander(SwitchOrExpander),
    EpExpander(EpExpander),
}

impl BasicTopology {
    fn ops(&self) -> &dyn TopologyOps {
        match self {
            Self::Ring(topology) => topology,
            Self::FullyConnected(topology) => topology,
            Self::Switch(topology) => topology,
            Self::FatTree(topology) => topology,
            Self::ExpanderGraph(topology) => topology,
            Self::SwitchOrExpander(topology) => topology,
            Self::EpExpander(topology) => topology,
        }
    }

    pub fn npus_count(&self) -> usize {
        self.ops().npus_count()
    }

    pub fn devices_count(&self) -> usize {
        self.ops().devices_count()
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.ops().bandwidth()
    }

    pub fn latency(&self) -> Latency {
        self.ops().latency()
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        self.ops().route(src, dest)
    }

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.ops().compute_hops_count(src, dest)
    }

    pub fn send(&self, chunk: Chunk) {
        self.ops().send(chunk)
    }

    pub fn congestion_summary(&self) -> Vec<(DeviceId, DeviceId, u64)> {
        match self {
            Self::Ring(topology) => topology.arena().congestion_summary(),
            Self::FullyConnected(topology) => topology.arena().congestion_summary(),
            Self::Switch(topology) => topology.arena().congestion_summary(),
            Self::FatTree(topology) => topology.arena().congestion_summary(),
            Self::ExpanderGraph(topology) => topology.arena().congestion_summary(),
            Self::SwitchOrExpander(topology) => topology.congestion_summary(),
            Self::EpExpander(topology) => topology.arena().congestion_summary(),
        }
    }

    /// Deep copy used to instantiate per-slice topologies in multi-dim
    /// routing; devices and links are rebuilt from scratch.
    pub(crate) fn clone_slice(&self) -> BasicTopology {
        match self {
            Self::Ring(topology) => Self::Ring(topology.clone_slice()),
            Self::FullyConnected(topology) => Self::FullyConnected(topology.clone_slice()),
            Self::Switch(topology) => Self::Switch(topology.clone_slice()),
            Self::FatTree(topology) => Self::FatTree(topology.clone_slice()),
            Self::ExpanderGraph(topology) => Self::ExpanderGraph(topology.clone_slice()),
            Self::SwitchOrExpander(topology) => {
                Self::SwitchOrExpander(topology.clone_slice())
            }
            Self::EpExpander(topology) => Self::EpExpander(topology.clone_slice()),
        }
    }
}

/// A constructed network: either a single dimension or a multi-dim
/// composition.
#[derive(Debug)]
pub enum NetworkTopology {
    Basic(BasicTopology),
    MultiDim(MultiDimTopology),
}

impl NetworkTopology {
    pub fn npus_count(&self) -> usize {
        match self {
            Self::Basic(topology) => topology.npus_count(),
            Self::MultiDim(topology) => topology.npus_count(),
        }
    }

    pub fn devices_count(&self) -> usize {
        match self {
            Self::Basic(topology) => topology.devices_count(),
            Self::MultiDim(topology) => topology.devices_count(),
        }
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        match self {
            Self::Basic(topology) => topology.route(src, dest),
            Self::MultiDim(topology) => topology.route(src, dest),
        }
    }

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        match self {
            Self::Basic(topology) => topology.compute_hops_count(src, dest),
            Self::MultiDim(topology) => topology.compute_hops_count(src, dest),
        }
    }

    pub fn send(&self, chunk: Chunk) {
        match self {
            Self::Basic(topology) => topology.send(chunk),
            Self::MultiDim(topology) => topology.send(chunk),
        }
    }

    pub fn congestion_summary(&self) -> Vec<(DeviceId, DeviceId, u64)> {
        match self {
            Self::Basic(topology) => topology.congestion_summary(),
            Self::MultiDim(topology) => topology.congestion_summary(),
        }
    }

    pub fn as_basic(&self) -> Option<&BasicTopology> {
        match self {
            Self::Basic(topology) => Some(topology),
            Self::MultiDim(_) => None,
        }
    }
}

/// Panic unless `src` and `dest` name NPUs of the topology.
pub(crate) fn check_npu_pair(npus_count: usize, src: DeviceId, dest: DeviceId) {
    assert!(src < npus_count, "src NPU {} out of range 0..{}", src, npus_count);
    assert!(
        dest < npus_count,
        "dest NPU {} out of range 0..{}",
        dest,
        npus_count
    );
}

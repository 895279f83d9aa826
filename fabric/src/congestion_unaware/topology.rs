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

//! Closed-form delay model: no devices, no links, no event queue.
//!
//! A transfer of `size` bytes over `hops` links costs
//! `hops * latency + size / bandwidth` nanoseconds; contention is ignored.

use crate::common::units::{bw_gbps_to_bpns, Bandwidth, ChunkSize, DeviceId, EventTime, Latency};
use crate::congestion_unaware::topologies::expander::ExpanderGraph;
use crate::congestion_unaware::topologies::fat_tree::FatTree;
use crate::congestion_unaware::topologies::fully_connected::FullyConnected;
use crate::congestion_unaware::topologies::ring::Ring;
use crate::congestion_unaware::topologies::switch::Switch;
use crate::congestion_unaware::topologies::switch_or_expander::SwitchOrExpander;

/// Shared shape of every closed-form topology.
pub(crate) struct ClosedForm {
    npus_count: usize,
    bandwidth: Bandwidth,
    latency: Latency,
}

impl ClosedForm {
    pub fn new(npus_count: usize, bandwidth: Bandwidth, latency: Latency) -> Self {
        assert!(npus_count > 0, "topology needs at least one NPU");
        assert!(bandwidth > 0.0, "bandwidth ({}) must be positive", bandwidth);
        Self {
            npus_count,
            bandwidth,
            latency,
        }
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn check_pair(&self, src: DeviceId, dest: DeviceId) {
        assert!(src < self.npus_count, "src NPU {} out of range 0..{}", src, self.npus_count);
        assert!(
            dest < self.npus_count,
            "dest NPU {} out of range 0..{}",
            dest,
            self.npus_count
        );
    }
}

/// Hop counting plus the closed-form transfer delay.
pub trait TopologyOps {
    fn npus_count(&self) -> usize;

    fn bandwidth(&self) -> Bandwidth;

    fn latency(&self) -> Latency;

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize;

    /// Delay of sending `size` bytes from `src` to `dest`; a self-send
    /// takes zero simulated time.
    fn send(&self, src: DeviceId, dest: DeviceId, size: ChunkSize) -> EventTime {
        if src == dest {
            return 0;
        }
        let hops = self.compute_hops_count(src, dest);
        (hops as f64 * self.latency() as f64
            + size as f64 / bw_gbps_to_bpns(self.bandwidth())) as EventTime
    }
}

/// The closed family of one-dimensional closed-form topologies.
pub enum BasicTopology {
    Ring(Ring),
    FullyConnected(FullyConnected),
    Switch(Switch),
    FatTree(FatTree),
    ExpanderGraph(ExpanderGraph),
    SwitchOrExpander(SwitchOrExpander),
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
        }
    }

    pub fn npus_count(&self) -> usize {
        self.ops().npus_count()
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.ops().bandwidth()
    }

    pub fn latency(&self) -> Latency {
        self.ops().latency()
    }

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.ops().compute_hops_count(src, dest)
    }

    pub fn send(&self, src: DeviceId, dest: DeviceId, size: ChunkSize) -> EventTime {
        self.ops().send(src, dest, size)
    }
}

/// Dimension-ordered composition of closed-form topologies: a transfer
/// pays each differing dimension's delay in turn.
pub struct MultiDimTopology {
    dims: Vec<BasicTopology>,
    npus_count: usize,
}

impl MultiDimTopology {
    pub fn new() -> Self {
        Self {
            dims: Vec::new(),
            npus_count: 1,
        }
    }

    pub fn append_dimension(&mut self, topology: BasicTopology) {
        self.npus_count *= topology.npus_count();
        self.dims.push(topology);
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn dims_count(&self) -> usize {
        self.dims.len()
    }

    pub fn translate_address(&self, npu: DeviceId) -> Vec<DeviceId> {
        assert!(npu < self.npus_count, "NPU {} out of range 0..{}", npu, self.npus_count);
        let mut leftover = npu;
        let mut address = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            address.push(leftover % dim.npus_count());
            leftover /= dim.npus_count();
        }
        address
    }

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        let src_address = self.translate_address(src);
        let dest_address = self.translate_address(dest);
        self.dims
            .iter()
            .enumerate()
            .filter(|(dim, _)| src_address[*dim] != dest_address[*dim])
            .map(|(dim, topology)| {
                topology.compute_hops_count(src_address[dim], dest_address[dim])
            })
            .sum()
    }

    pub fn send(&self, src: DeviceId, dest: DeviceId, size: ChunkSize) -> EventTime {
        let src_address = self.translate_address(src);
        let dest_address = self.translate_address(dest);
        self.dims
            .iter()
            .enumerate()
            .filter(|(dim, _)| src_address[*dim] != dest_address[*dim])
            .map(|(dim, topology)| topology.send(src_address[dim], dest_address[dim], size))
            .sum()
    }
}

impl Default for MultiDimTopology {
    fn default() -> Self {
        Self::new()
    }
}

/// A constructed closed-form network.
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

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        match self {
            Self::Basic(topology) => topology.compute_hops_count(src, dest),
            Self::MultiDim(topology) => topology.compute_hops_count(src, dest),
        }
    }

    pub fn send(&self, src: DeviceId, dest: DeviceId, size: ChunkSize) -> EventTime {
        match self {
            Self::Basic(topology) => topology.send(src, dest, size),
            Self::MultiDim(topology) => topology.send(src, dest, size),
        }
    }

    pub fn as_basic(&self) -> Option<&BasicTopology> {
        match self {
            Self::Basic(topology) => Some(topology),
            Self::MultiDim(_) => None,
        }
    }
}

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

//! Composition of basic topologies along dimensions.
//!
//! A global NPU id decomposes into a mixed-radix address with dimension 0
//! varying fastest: `global = sum(a_i * prod(n_j, j < i))`. Every
//! combination of the other dimensions' coordinates owns an independent
//! copy of a dimension's topology, its slice.
//!
//! Routing is dimension-ordered: each dimension where the addresses
//! differ contributes its slice's local route, translated into global
//! coordinates. The composite owns the global devices; NPUs sit below
//! `npus_count` and every slice's infrastructure nodes get dense ids
//! above it. Links between consecutive global devices are realized
//! lazily with the bandwidth and latency of the dimension being crossed.

use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_aware::chunk::{Chunk, Route};
use crate::congestion_aware::device::Device;
use crate::congestion_aware::link::Link;
use crate::congestion_aware::simulator::Simulator;
use crate::congestion_aware::topology::BasicTopology;
use crate::error::Error;
use itertools::Itertools;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
struct Dimension {
    prototype: BasicTopology,
    slices: Vec<BasicTopology>,
    npus_count: usize,
    /// Infrastructure devices (switches etc.) per slice.
    infra_count: usize,
    /// Start of this dimension's infrastructure ids, relative to the end
    /// of the NPU range.
    infra_offset: usize,
    bandwidth: Bandwidth,
    latency: Latency,
}

#[derive(Debug)]
pub struct MultiDimTopology {
    sim: Rc<Simulator>,
    dims: Vec<Dimension>,
    devices: Vec<Rc<RefCell<Device>>>,
    npus_count: usize,
}

impl MultiDimTopology {
    pub fn new(sim: Rc<Simulator>) -> Self {
        Self {
            sim,
            dims: Vec::new(),
            devices: Vec::new(),
            npus_count: 1,
        }
    }

    /// Append a dimension, validating that its topology can route every
    /// NPU pair. Slices and the global device pool are rebuilt, so all
    /// dimensions must be appended before routing starts.
    pub fn append_dimension(&mut self, topology: BasicTopology) -> Result<(), Error> {
        validate_dimension(&topology, self.dims.len())?;

        let npus_count = topology.npus_count();
        let infra_count = topology.devices_count() - npus_count;
        self.dims.push(Dimension {
            slices: Vec::new(),
            npus_count,
            infra_count,
            infra_offset: 0,
            bandwidth: topology.bandwidth(),
            latency: topology.latency(),
            prototype: topology,
        });
        self.npus_count *= npus_count;
        self.rebuild();
        Ok(())
    }

    /// Re-derive slices, infrastructure id ranges and the device pool
    /// from the current dimension list.
    fn rebuild(&mut self) {
        let dims_count = self.dims.len();
        let sizes: Vec<usize> = self.dims.iter().map(|dim| dim.npus_count).collect();

        let mut infra_total = 0;
        for dim_index in 0..dims_count {
            let slices_count: usize = sizes
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != dim_index)
                .map(|(_, &size)| size)
                .product();
            let slices = (0..slices_count)
                .map(|_| self.dims[dim_index].prototype.clone_slice())
                .collect();
            let dim = &mut self.dims[dim_index];
            dim.slices = slices;
            dim.infra_offset = infra_total;
            infra_total += slices_count * dim.infra_count;
        }

        self.devices = (0..self.npus_count + infra_total)
            .map(|id| Rc::new(RefCell::new(Device::new(id))))
            .collect();
    }

    pub fn npus_count(&self) -> usize {
        self.npus_count
    }

    pub fn devices_count(&self) -> usize {
        self.devices.len()
    }

    pub fn dims_count(&self) -> usize {
        self.dims.len()
    }

    pub fn npus_count_per_dim(&self) -> Vec<usize> {
        self.dims.iter().map(|dim| dim.npus_count).collect()
    }

    /// Break a global NPU id into per-dimension coordinates.
    pub fn translate_address(&self, npu: DeviceId) -> Vec<DeviceId> {
        assert!(npu < self.npus_count, "NPU {} out of range 0..{}", npu, self.npus_count);
        let mut leftover = npu;
        let mut address = Vec::with_capacity(self.dims.len());
        for dim in &self.dims {
            address.push(leftover % dim.npus_count);
            leftover /= dim.npus_count;
        }
        address
    }

    fn linearize_address(&self, address: &[DeviceId]) -> DeviceId {
        let mut global = 0;
        let mut stride = 1;
        for (coordinate, dim) in address.iter().zip(&self.dims) {
            global += coordinate * stride;
            stride *= dim.npus_count;
        }
        global
    }

    /// Index of the slice of `dim_index` holding the given address.
    fn slice_index(&self, dim_index: usize, address: &[DeviceId]) -> usize {
        let mut index = 0;
        for (other, dim) in self.dims.iter().enumerate() {
            if other != dim_index {
                index = index * dim.npus_count + address[other];
            }
        }
        index
    }

    /// Global id of a local device of one slice: NPUs map through the
    /// address, infrastructure nodes into the dimension's id block.
    fn globalize(
        &self,
        dim_index: usize,
        slice_index: usize,
        address: &[DeviceId],
        local: DeviceId,
    ) -> DeviceId {
        let dim = &self.dims[dim_index];
        if local < dim.npus_count {
            let mut address = address.to_vec();
            address[dim_index] = local;
            return self.linearize_address(&address);
        }
        self.npus_count
            + dim.infra_offset
            + slice_index * dim.infra_count
            + (local - dim.npus_count)
    }

    fn ensure_link(
        &self,
        src: DeviceId,
        dest: DeviceId,
        bandwidth: Bandwidth,
        latency: Latency,
    ) {
        if !self.devices[src].borrow().connected(dest) {
            let link = Link::new(bandwidth, latency, Rc::clone(&self.sim));
            self.devices[src]
                .borrow_mut()
                .connect(dest, Rc::new(RefCell::new(link)));
        }
        if !self.devices[dest].borrow().connected(src) {
            let link = Link::new(bandwidth, latency, Rc::clone(&self.sim));
            self.devices[dest]
                .borrow_mut()
                .connect(src, Rc::new(RefCell::new(link)));
        }
    }

    pub fn route(&self, src: DeviceId, dest: DeviceId) -> Route {
        assert!(src < self.npus_count, "src NPU {} out of range 0..{}", src, self.npus_count);
        assert!(
            dest < self.npus_count,
            "dest NPU {} out of range 0..{}",
            dest,
            self.npus_count
        );

        let mut current = self.translate_address(src);
        let dest_address = self.translate_address(dest);
        let mut global_ids = vec![src];

        for dim_index in 0..self.dims.len() {
            if current[dim_index] == dest_address[dim_index] {
                continue;
            }
            let slice_index = self.slice_index(dim_index, &current);
            let dim = &self.dims[dim_index];
            let local_route =
                dim.slices[slice_index].route(current[dim_index], dest_address[dim_index]);
            let local_ids: Vec<DeviceId> = local_route
                .iter()
                .map(|device| device.borrow().id())
                .collect();
            assert!(
                local_ids.len() >= 2,
                "dimension {} produced an empty transfer route",
                dim_index
            );

            let mut previous = *global_ids.last().unwrap();
            for &local in &local_ids[1..] {
                let global = self.globalize(dim_index, slice_index, &current, local);
                self.ensure_link(previous, global, dim.bandwidth, dim.latency);
                global_ids.push(global);
                previous = global;
            }
            current[dim_index] = dest_address[dim_index];
        }

        global_ids
            .iter()
            .map(|&id| Rc::clone(&self.devices[id]))
            .collect()
    }

    pub fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.route(src, dest).len() - 1
    }

    pub fn send(&self, chunk: Chunk) {
        let device = Rc::clone(chunk.current_device());
        let device = device.borrow();
        device.send(chunk);
    }

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

/// Every pair of the dimension's topology must produce a route with the
/// right endpoints before the dimension may join the composite.
fn validate_dimension(topology: &BasicTopology, dim_index: usize) -> Result<(), Error> {
    let npus_count = topology.npus_count();
    for (src, dest) in (0..npus_count).cartesian_product(0..npus_count) {
        let route = topology.route(src, dest);
        if route.is_empty()
            || route[0].borrow().id() != src
            || route.last().unwrap().borrow().id() != dest
        {
            return Err(Error::Topology {
                message: format!(
                    "dimension {}: invalid route for NPU pair ({}, {})",
                    dim_index, src, dest
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod multi_dim_tests {
    use super::*;
    use crate::congestion_aware::topologies::fully_connected::FullyConnected;
    use crate::congestion_aware::topologies::ring::Ring;
    use crate::congestion_aware::topologies::switch::Switch;
    use itertools::Itertools;

    fn compose(sim: &Rc<Simulator>, dims: Vec<BasicTopology>) -> MultiDimTopology {
        let mut multi = MultiDimTopology::new(Rc::clone(sim));
        for dim in dims {
            multi.append_dimension(dim).unwrap();
        }
        multi
    }

    fn ids(route: &Route) -> Vec<DeviceId> {
        route.iter().map(|device| device.borrow().id()).collect()
    }

    #[test]
    fn test_address_translation_roundtrip() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Ring(Ring::new(2, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::FullyConnected(FullyConnected::new(8, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::FullyConnected(FullyConnected::new(4, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        assert_eq!(multi.npus_count(), 64);
        assert_eq!(multi.translate_address(47), vec![1, 7, 2]);
        for npu in 0..64 {
            let address = multi.translate_address(npu);
            assert_eq!(multi.linearize_address(&address), npu);
        }
    }

    #[test]
    fn test_single_dimension_transfer() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Ring(Ring::new(4, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::Ring(Ring::new(3, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        // 1 -> 3 differs only in dimension 0: a ring walk 1, 2, 3.
        assert_eq!(ids(&multi.route(1, 3)), vec![1, 2, 3]);
        // 2 -> 10 differs only in dimension 1: (2,0) -> (2,2).
        assert_eq!(ids(&multi.route(2, 10)), vec![2, 10]);
    }

    #[test]
    fn test_dimension_ordered_transfer() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Ring(Ring::new(2, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::FullyConnected(FullyConnected::new(2, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        // (0,0) -> (1,1): dimension 0 first, then dimension 1.
        let route = multi.route(0, 3);
        assert_eq!(ids(&route), vec![0, 1, 3]);
        for pair in route.windows(2) {
            assert!(pair[0].borrow().connected(pair[1].borrow().id()));
        }
    }

    #[test]
    fn test_switch_dimension_gets_global_infra_ids() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Switch(Switch::new(2, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::Ring(Ring::new(2, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        // 4 NPUs, one switch per slice of dimension 0, two slices.
        assert_eq!(multi.devices_count(), 6);
        assert_eq!(ids(&multi.route(0, 1)), vec![0, 4, 1]);
        assert_eq!(ids(&multi.route(2, 3)), vec![2, 5, 3]);
        // Crossing both dimensions passes through the slice's own switch.
        assert_eq!(ids(&multi.route(0, 3)), vec![0, 4, 1, 3]);
    }

    #[test]
    fn test_all_pairs_route_valid() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Ring(Ring::new(3, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::Switch(Switch::new(2, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::FullyConnected(FullyConnected::new(2, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        let sizes = multi.npus_count_per_dim();
        let total: usize = sizes.iter().product();
        for (src, dest) in (0..total).cartesian_product(0..total) {
            let route = multi.route(src, dest);
            assert_eq!(route[0].borrow().id(), src);
            assert_eq!(route.last().unwrap().borrow().id(), dest);
            for pair in route.windows(2) {
                assert!(pair[0].borrow().connected(pair[1].borrow().id()));
            }
        }
    }

    #[test]
    fn test_route_to_self_is_single_device() {
        let sim = Rc::new(Simulator::new());
        let multi = compose(
            &sim,
            vec![
                BasicTopology::Ring(Ring::new(4, 50.0, 500, Rc::clone(&sim))),
                BasicTopology::Ring(Ring::new(4, 50.0, 500, Rc::clone(&sim))),
            ],
        );
        assert_eq!(ids(&multi.route(9, 9)), vec![9]);
    }
}

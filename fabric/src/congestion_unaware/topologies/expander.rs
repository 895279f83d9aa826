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

use crate::common::graph::{ExpanderAdjacency, ExpanderGraphSpec};
use crate::common::units::{Bandwidth, DeviceId, Latency};
use crate::congestion_unaware::topology::{ClosedForm, TopologyOps};
use crate::error::Error;
use std::path::Path;
use std::rc::Rc;

/// Closed-form expander graph; hops are memoized shortest-path distances
/// over the loaded adjacency.
pub struct ExpanderGraph {
    base: ClosedForm,
    adjacency: ExpanderAdjacency,
}

impl ExpanderGraph {
    pub fn from_file<P: AsRef<Path>>(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        path: P,
        resiliency: bool,
    ) -> Result<Self, Error> {
        let spec = ExpanderGraphSpec::from_file(path)?;
        Self::from_spec(npus_count, bandwidth, latency, Rc::new(spec), resiliency)
    }

    pub fn from_spec(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        spec: Rc<ExpanderGraphSpec>,
        resiliency: bool,
    ) -> Result<Self, Error> {
        let adjacency = ExpanderAdjacency::from_spec(npus_count, &spec, resiliency)?;
        Ok(Self {
            base: ClosedForm::new(npus_count, bandwidth, latency),
            adjacency,
        })
    }

    pub fn neighbors(&self, device: DeviceId) -> &[DeviceId] {
        self.adjacency.neighbors(device)
    }

    pub fn declared_degree(&self) -> usize {
        self.adjacency.declared_degree()
    }

    pub fn get_distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.adjacency.distance(src, dest)
    }
}

impl TopologyOps for ExpanderGraph {
    fn npus_count(&self) -> usize {
        self.base.npus_count()
    }

    fn bandwidth(&self) -> Bandwidth {
        self.base.bandwidth()
    }

    fn latency(&self) -> Latency {
        self.base.latency()
    }

    fn compute_hops_count(&self, src: DeviceId, dest: DeviceId) -> usize {
        self.adjacency.distance(src, dest)
    }
}

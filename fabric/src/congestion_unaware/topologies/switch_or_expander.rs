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
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Closed-form hybrid: expander distances for MoE-enabled pairs, the
/// two-hop switch path otherwise.
pub struct SwitchOrExpander {
    base: ClosedForm,
    expander: Option<ExpanderAdjacency>,
    moe_routing: RefCell<HashMap<DeviceId, bool>>,
}

impl SwitchOrExpander {
    pub fn from_file<P: AsRef<Path>>(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        inputfile: Option<P>,
        resiliency: bool,
    ) -> Result<Self, Error> {
        let spec = match inputfile {
            Some(path) => Some(Rc::new(ExpanderGraphSpec::from_file(path)?)),
            None => None,
        };
        Self::from_spec(npus_count, bandwidth, latency, spec, resiliency)
    }

    pub fn from_spec(
        npus_count: usize,
        bandwidth: Bandwidth,
        latency: Latency,
        spec: Option<Rc<ExpanderGraphSpec>>,
        resiliency: bool,
    ) -> Result<Self, Error> {
        let expander = match spec {
            Some(spec) => Some(ExpanderAdjacency::from_spec(npus_count, &spec, resiliency)?),
            None => None,
        };
        Ok(Self {
            base: ClosedForm::new(npus_count, bandwidth, latency),
            expander,
            moe_routing: RefCell::new(HashMap::new()),
        })
    }

    pub fn set_moe_routing(&self, device: DeviceId, enabled: bool) {
        self.moe_routing.borrow_mut().insert(device, enabled);
    }

    pub fn set_moe_routing_all(&self, enabled: bool) {
        let mut moe_routing = self.moe_routing.borrow_mut();
        for device in 0..self.base.npus_count() {
            moe_routing.insert(device, enabled);
        }
    }

    pub fn moe_routing(&self, device: DeviceId) -> bool {
        self.moe_routing.borrow().get(&device).copied().unwrap_or(false)
    }

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
}

impl TopologyOps for SwitchOrExpander {
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
        self.base.check_pair(src, dest);
        if src == dest {
            return 0;
        }
        match (&self.expander, self.pair_mode(src, dest)) {
            (Some(expander), true) => expander.distance(src, dest),
            _ => 2,
        }
    }
}

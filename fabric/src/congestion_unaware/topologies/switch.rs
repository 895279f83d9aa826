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
use crate::congestion_unaware::topology::{ClosedForm, TopologyOps};

/// Closed-form single-switch topology; every pair is two hops.
pub struct Switch {
    base: ClosedForm,
}

impl Switch {
    pub fn new(npus_count: usize, bandwidth: Bandwidth, latency: Latency) -> Self {
        Self {
            base: ClosedForm::new(npus_count, bandwidth, latency),
        }
    }
}

impl TopologyOps for Switch {
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
    fn test_reference_delay() {
        let topology = Switch::new(8, 50.0, 500);
        assert_eq!(topology.send(1, 4, 1_048_576), 20_531);
    }
}

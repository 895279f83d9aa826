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

/// Closed-form fat tree: two hops inside a leaf, four inside a pod, six
/// across pods. NPUs attach `k/2` per leaf; each pod spans `k` leaves.
pub struct FatTree {
    base: ClosedForm,
    k: usize,
}

impl FatTree {
    pub fn new(npus_count: usize, k: usize, bandwidth: Bandwidth, latency: Latency) -> Self {
        assert!(k > 0 && k % 2 == 0, "fat-tree radix ({}) must be even and positive", k);
        assert!(
            npus_count <= k * k * k / 4,
            "fat tree of radix {} holds at most {} NPUs, got {}",
            k,
            k * k * k / 4,
            npus_count
        );
        Self {
            base: ClosedForm::new(npus_count, bandwidth, latency),
            k,
        }
    }
}

impl TopologyOps for FatTree {
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
        let src_leaf = src / (self.k / 2);
        let dest_leaf = dest / (self.k / 2);
        if src_leaf == dest_leaf {
            2
        } else if src_leaf / self.k == dest_leaf / self.k {
            4
        } else {
            6
        }
    }
}

#[cfg(test)]
mod fat_tree_tests {
    use super::*;

    #[test]
    fn test_hop_classes() {
        let topology = FatTree::new(16, 4, 50.0, 500);
        assert_eq!(topology.compute_hops_count(0, 1), 2);
        assert_eq!(topology.compute_hops_count(0, 2), 4);
        assert_eq!(topology.compute_hops_count(0, 8), 6);
    }

    #[test]
    fn test_delay_scales_with_hops() {
        let topology = FatTree::new(16, 4, 50.0, 500);
        let same_leaf = topology.send(0, 1, 1_048_576);
        let cross_pod = topology.send(0, 8, 1_048_576);
        assert_eq!(cross_pod - same_leaf, 4 * 500);
    }
}

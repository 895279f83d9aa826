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

//! Scalar units shared by both simulation models.

/// Dense identifier of an NPU or infrastructure device, 0..devices_count.
pub type DeviceId = usize;

/// Payload size of a chunk, in bytes.
pub type ChunkSize = u64;

/// Link bandwidth, in GB/s.
pub type Bandwidth = f64;

/// Link latency, in nanoseconds.
pub type Latency = u64;

/// Simulated timestamp, in nanoseconds.
pub type EventTime = u64;

/// Convert a bandwidth from GB/s into bytes per nanosecond.
///
/// Bandwidths are interpreted on the 2^30 scale, so 1 GB/s transfers
/// 2^30 bytes per 10^9 ns. All published reference timings of this model
/// assume this scaling.
pub fn bw_gbps_to_bpns(bw_gbps: Bandwidth) -> Bandwidth {
    assert!(bw_gbps > 0.0, "bandwidth ({}) must be positive", bw_gbps);

    bw_gbps * (1u64 << 30) as f64 / 1e9
}

#[cfg(test)]
mod units_tests {
    use super::*;

    #[test]
    fn test_bandwidth_conversion() {
        // 50 GB/s carries 2^20 bytes in exactly 19,531.25 ns.
        let bpns = bw_gbps_to_bpns(50.0);
        let serialization = (1u64 << 20) as f64 / bpns;
        assert_eq!(serialization, 19_531.25);
    }

    #[test]
    #[should_panic]
    fn test_zero_bandwidth_rejected() {
        bw_gbps_to_bpns(0.0);
    }
}

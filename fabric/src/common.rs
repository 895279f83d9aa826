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

//! Units, event queue, configuration and graph descriptions shared by the
//! congestion-aware and congestion-unaware models.

pub mod config;
pub mod event_queue;
pub mod graph;
pub mod units;

pub use config::{
    parse_expander_routing, parse_fattree_routing, ExpanderRouting, FatTreeRouting,
    NetworkConfig, TopologyKind,
};
pub use event_queue::{EventCallback, EventQueue};
pub use graph::{ExpanderAdjacency, ExpanderGraphSpec, ExpanderGroups};
pub use units::{bw_gbps_to_bpns, Bandwidth, ChunkSize, DeviceId, EventTime, Latency};

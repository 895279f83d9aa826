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

//! Discrete-event analytical network simulator for collective
//! communication on multi-dimensional accelerator interconnects.
//!
//! A declarative topology configuration ([`common::NetworkConfig`]) is
//! instantiated into either a congestion-aware network, where chunks
//! traverse devices and links under an event queue with per-link
//! serialization and queueing, or a congestion-unaware one computing
//! transfer delays in closed form.
//!
//! Topology building blocks: Ring, FullyConnected, Switch, FatTree,
//! ExpanderGraph, SwitchOrExpander and the pre-routed EpExpander,
//! composable along dimensions with dimension-ordered routing.

pub mod common;
pub mod congestion_aware;
pub mod congestion_unaware;
mod error;

pub use crate::common::units::{
    bw_gbps_to_bpns, Bandwidth, ChunkSize, DeviceId, EventTime, Latency,
};
pub use crate::common::NetworkConfig;
pub use crate::error::Error;

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

//! Congestion-unaware simulation: transfer delays come straight from the
//! closed form `hops * latency + size / bandwidth`, with no queueing and
//! no event scheduling. Useful for fast lower bounds.

pub mod builder;
pub mod topologies;
pub mod topology;

pub use builder::construct_topology;
pub use topologies::{
    ExpanderGraph, FatTree, FullyConnected, Ring, Switch, SwitchOrExpander,
};
pub use topology::{BasicTopology, MultiDimTopology, NetworkTopology, TopologyOps};

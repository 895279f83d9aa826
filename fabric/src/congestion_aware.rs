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

//! Congestion-aware simulation: chunks travel device by device over
//! half-duplex links that serialize one chunk at a time, with queueing at
//! busy links and all time advance driven by the event queue.
//!
//! ```no_run
//! use fabric::common::NetworkConfig;
//! use fabric::congestion_aware::{construct_topology, Chunk, Simulator};
//! use std::rc::Rc;
//!
//! let config = NetworkConfig::from_file("Ring.yml").unwrap();
//! let sim = Rc::new(Simulator::new());
//! let topology = construct_topology(&config, Rc::clone(&sim)).unwrap();
//!
//! let route = topology.route(1, 4);
//! topology.send(Chunk::new(1_048_576, route, Box::new(|| {})));
//! sim.run();
//! println!("finished at {} ns", sim.current_time());
//! ```

pub mod builder;
pub mod chunk;
pub mod device;
pub mod link;
pub mod multi_dim;
pub mod simulator;
pub mod topologies;
pub mod topology;

pub use builder::construct_topology;
pub use chunk::{Chunk, ChunkCallback, Route};
pub use device::Device;
pub use link::Link;
pub use multi_dim::MultiDimTopology;
pub use simulator::{QueueDiscipline, Simulator};
pub use topologies::{
    EpExpander, EpRoutesSpec, ExpanderGraph, FatTree, FullyConnected, Ring, Switch,
    SwitchOrExpander, WeightedRoute,
};
pub use topology::{BasicTopology, NetworkTopology, TopologyOps};

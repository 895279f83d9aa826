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

//! Closed-form counterparts of the one-dimensional topologies.

pub mod expander;
pub mod fat_tree;
pub mod fully_connected;
pub mod ring;
pub mod switch;
pub mod switch_or_expander;

pub use expander::ExpanderGraph;
pub use fat_tree::FatTree;
pub use fully_connected::FullyConnected;
pub use ring::Ring;
pub use switch::Switch;
pub use switch_or_expander::SwitchOrExpander;

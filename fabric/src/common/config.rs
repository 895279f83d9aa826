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

//! Network configuration loader.
//!
//! A configuration describes one topology per dimension together with the
//! per-dimension NPU counts, bandwidths and latencies:
//!
//! ```yaml
//! topology: [ Ring ]
//! npus_count: [ 8 ]
//! bandwidth: [ 50.0 ]
//! latency: [ 500 ]
//! ```

use crate::common::units::{Bandwidth, Latency};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Topology building block assignable to a dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum TopologyKind {
    Ring,
    FullyConnected,
    Switch,
    FatTree,
    ExpanderGraph,
    SwitchOrExpander,
}

/// Path-selection policy of a fat-tree dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FatTreeRouting {
    #[default]
    Deterministic,
    Random,
}

/// Path-selection policy of an expander-graph dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpanderRouting {
    #[default]
    ShortestPath,
    RandomTopK,
}

/// Declarative multi-dimensional network description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub topology: Vec<TopologyKind>,
    pub npus_count: Vec<usize>,
    pub bandwidth: Vec<Bandwidth>,
    pub latency: Vec<Latency>,
    /// Per-dimension graph description file (expander topologies).
    #[serde(default)]
    pub inputfile: Option<Vec<String>>,
    /// Per-dimension routing algorithm name; empty string selects the
    /// topology's default.
    #[serde(default)]
    pub routing_algorithm: Option<Vec<String>>,
    /// Per-dimension fat-tree radix; defaults to 4.
    #[serde(default)]
    pub fattree_radix: Option<Vec<usize>>,
    /// Provision an extra npus_count/8 spare devices in expander graphs.
    #[serde(default)]
    pub resiliency_npus: Option<bool>,
}

impl NetworkConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: NetworkConfig =
            serde_yaml::from_str(&text).map_err(|err| Error::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let config: NetworkConfig =
            serde_yaml::from_str(text).map_err(|err| Error::Parse {
                path: "<inline>".into(),
                message: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn dims_count(&self) -> usize {
        self.topology.len()
    }

    pub fn inputfile_for(&self, dim: usize) -> Option<&str> {
        self.inputfile
            .as_ref()
            .and_then(|files| files.get(dim))
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }

    pub fn routing_algorithm_for(&self, dim: usize) -> &str {
        self.routing_algorithm
            .as_ref()
            .and_then(|algos| algos.get(dim))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn fattree_radix_for(&self, dim: usize) -> usize {
        self.fattree_radix
            .as_ref()
            .and_then(|radices| radices.get(dim))
            .copied()
            .unwrap_or(4)
    }

    pub fn resiliency_npus(&self) -> bool {
        self.resiliency_npus.unwrap_or(false)
    }

    fn validate(&self) -> Result<(), Error> {
        let dims = self.dims_count();
        if dims == 0 {
            return Err(Error::Config {
                message: "topology list is empty".into(),
            });
        }

        let check_len = |name: &str, len: usize| -> Result<(), Error> {
            if len != dims {
                return Err(Error::Config {
                    message: format!(
                        "length of {} ({}) doesn't match dimensions ({})",
                        name, len, dims
                    ),
                });
            }
            Ok(())
        };
        check_len("npus_count", self.npus_count.len())?;
        check_len("bandwidth", self.bandwidth.len())?;
        check_len("latency", self.latency.len())?;

        // npus_count of 1 is allowed: no communication on that dimension.
        for &npus in &self.npus_count {
            if npus < 1 {
                return Err(Error::Config {
                    message: format!("npus_count ({}) should be at least 1", npus),
                });
            }
        }
        for &bandwidth in &self.bandwidth {
            if bandwidth <= 0.0 {
                return Err(Error::Config {
                    message: format!("bandwidth ({}) should be larger than 0", bandwidth),
                });
            }
        }
        for dim in 0..dims {
            if self.topology[dim] == TopologyKind::FatTree {
                let radix = self.fattree_radix_for(dim);
                if radix == 0 || radix % 2 != 0 {
                    return Err(Error::Config {
                        message: format!(
                            "fattree_radix ({}) should be even and positive",
                            radix
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Resolve a fat-tree routing-algorithm name, defaulting on unknown input.
pub fn parse_fattree_routing(name: &str) -> FatTreeRouting {
    match name {
        "" | "Deterministic" => FatTreeRouting::Deterministic,
        "Random" => FatTreeRouting::Random,
        other => {
            log::warn!(
                "unknown fat-tree routing algorithm {:?}, defaulting to Deterministic",
                other
            );
            FatTreeRouting::Deterministic
        }
    }
}

/// Resolve an expander routing-algorithm name, defaulting on unknown input.
pub fn parse_expander_routing(name: &str) -> ExpanderRouting {
    match name {
        "" | "ShortestPath" => ExpanderRouting::ShortestPath,
        "RandomTopK" => ExpanderRouting::RandomTopK,
        other => {
            log::warn!(
                "unknown expander routing algorithm {:?}, defaulting to ShortestPath",
                other
            );
            ExpanderRouting::ShortestPath
        }
    }
}

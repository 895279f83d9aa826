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

use std::fmt;
use std::path::PathBuf;

/// Errors surfaced while loading configurations or constructing topologies.
///
/// Routing preconditions and simulation-time invariants are programmer
/// errors and panic instead; only externally-caused failures flow through
/// this type.
#[derive(Debug)]
pub enum Error {
    /// A configuration or graph file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// A configuration or graph file could not be parsed.
    Parse { path: PathBuf, message: String },
    /// The network configuration is semantically invalid.
    Config { message: String },
    /// A topology could not be constructed from its inputs.
    Topology { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "(network/io) failed to read {}: {}", path.display(), source)
            }
            Self::Parse { path, message } => {
                write!(f, "(network/parse) {}: {}", path.display(), message)
            }
            Self::Config { message } => write!(f, "(network/config) {}", message),
            Self::Topology { message } => write!(f, "(network/topology) {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

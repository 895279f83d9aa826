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

//! Expander-graph descriptions and the path algorithms running on them.
//!
//! Both simulation models consume the same JSON graph files, so the parsed
//! description and the adjacency structure live here. The adjacency keeps
//! an ordered neighbor list per node: breadth-first tie-breaking follows
//! that order, which makes routing deterministic for a given file.

use crate::common::units::DeviceId;
use crate::error::Error;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// On-disk expander graph description.
///
/// Edges are undirected; a pair may be listed from both endpoints or from
/// only one, and is deduplicated on load.
#[derive(Clone, Debug, Deserialize)]
pub struct ExpanderGraphSpec {
    pub node_count: usize,
    pub degree: usize,
    #[serde(default)]
    pub groups: Option<ExpanderGroups>,
    #[serde(default)]
    pub connected_graph_adjacency: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub split_graph_adjacency: Option<Vec<Vec<usize>>>,
}

/// Node partition used by split-mode graphs.
#[derive(Clone, Debug, Deserialize)]
pub struct ExpanderGroups {
    #[serde(rename = "A")]
    pub a: Vec<usize>,
    #[serde(rename = "B")]
    pub b: Vec<usize>,
}

impl ExpanderGraphSpec {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|err| Error::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Regular-graph adjacency with memoized distance queries.
#[derive(Debug)]
pub struct ExpanderAdjacency {
    graph: UnGraph<(), ()>,
    neighbors: Vec<Vec<DeviceId>>,
    degree: usize,
    distance_cache: RefCell<HashMap<(DeviceId, DeviceId), usize>>,
}

impl ExpanderAdjacency {
    /// Build the adjacency for `npus_count` local NPUs from a parsed graph
    /// description.
    ///
    /// Mode selection: a file with `node_count == 2 * npus_count` is a
    /// split graph and contributes only the within-group-A edges of its
    /// secondary adjacency, with local ids assigned in group-A order.
    /// Otherwise the full adjacency is used and `node_count` must equal
    /// `npus_count`, or `npus_count + npus_count / 8` when resiliency
    /// spares are provisioned.
    pub fn from_spec(
        npus_count: usize,
        spec: &ExpanderGraphSpec,
        resiliency: bool,
    ) -> Result<Self, Error> {
        if spec.node_count == 2 * npus_count {
            Self::from_split_spec(npus_count, spec)
        } else {
            Self::from_full_spec(npus_count, spec, resiliency)
        }
    }

    fn from_full_spec(
        npus_count: usize,
        spec: &ExpanderGraphSpec,
        resiliency: bool,
    ) -> Result<Self, Error> {
        let expected = if resiliency {
            npus_count + npus_count / 8
        } else {
            npus_count
        };
        if spec.node_count != expected {
            return Err(Error::Topology {
                message: format!(
                    "expander graph: NPU count ({}) does not match graph node count ({}) \
                     and is not half for split mode",
                    expected, spec.node_count
                ),
            });
        }
        let adjacency =
            spec.connected_graph_adjacency
                .as_ref()
                .ok_or_else(|| Error::Topology {
                    message: "expander graph: missing connected_graph_adjacency".into(),
                })?;
        log::debug!("expander graph: using full graph with {} nodes", spec.node_count);

        let mut built = Self::with_nodes(spec.node_count, spec.degree);
        for (node, node_neighbors) in adjacency.iter().enumerate() {
            for &neighbor in node_neighbors {
                built.add_edge(node, neighbor);
            }
        }
        built.verify_degree();
        Ok(built)
    }

    fn from_split_spec(npus_count: usize, spec: &ExpanderGraphSpec) -> Result<Self, Error> {
        let groups = spec.groups.as_ref().ok_or_else(|| Error::Topology {
            message: "expander graph: split mode requires node groups".into(),
        })?;
        let adjacency = spec
            .split_graph_adjacency
            .as_ref()
            .ok_or_else(|| Error::Topology {
                message: "expander graph: missing split_graph_adjacency".into(),
            })?;
        if groups.a.len() != npus_count {
            return Err(Error::Topology {
                message: format!(
                    "expander graph: group A has {} nodes but {} NPUs were requested",
                    groups.a.len(),
                    npus_count
                ),
            });
        }
        log::debug!(
            "expander graph: using split graph, {} NPUs from {} node graph",
            npus_count,
            spec.node_count
        );

        // Local NPU ids follow the order of group A.
        let mut node_to_npu = HashMap::new();
        for (local, &original) in groups.a.iter().enumerate() {
            node_to_npu.insert(original, local);
        }

        let mut built = Self::with_nodes(groups.a.len(), spec.degree);
        for (node, node_neighbors) in adjacency.iter().enumerate() {
            let Some(&local) = node_to_npu.get(&node) else {
                continue;
            };
            for neighbor in node_neighbors {
                if let Some(&neighbor_local) = node_to_npu.get(neighbor) {
                    built.add_edge(local, neighbor_local);
                }
            }
        }
        built.verify_degree();
        Ok(built)
    }

    fn with_nodes(node_count: usize, degree: usize) -> Self {
        let mut graph = UnGraph::new_undirected();
        for _ in 0..node_count {
            graph.add_node(());
        }
        Self {
            graph,
            neighbors: vec![Vec::new(); node_count],
            degree,
            distance_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Record an undirected edge, ignoring repeats of an already-known
    /// pair (files may list each edge from both endpoints).
    fn add_edge(&mut self, a: DeviceId, b: DeviceId) {
        if a == b {
            log::warn!("expander graph: cannot connect node {} to itself", a);
            return;
        }
        if a >= self.neighbors.len() || b >= self.neighbors.len() {
            log::warn!("expander graph: edge ({}, {}) references unknown node", a, b);
            return;
        }
        if self.neighbors[a].contains(&b) {
            return;
        }
        self.neighbors[a].push(b);
        self.neighbors[b].push(a);
        self.graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }

    fn verify_degree(&self) {
        for (node, node_neighbors) in self.neighbors.iter().enumerate() {
            if node_neighbors.len() != self.degree {
                log::warn!(
                    "expander graph: node {} has degree {} but expected {}",
                    node,
                    node_neighbors.len(),
                    self.degree
                );
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn declared_degree(&self) -> usize {
        self.degree
    }

    pub fn neighbors(&self, node: DeviceId) -> &[DeviceId] {
        &self.neighbors[node]
    }

    /// All undirected edges, each reported once as `(smaller, larger)`.
    pub fn edges(&self) -> impl Iterator<Item = (DeviceId, DeviceId)> + '_ {
        self.graph.edge_indices().map(|edge| {
            let (a, b) = self.graph.edge_endpoints(edge).unwrap();
            (a.index().min(b.index()), a.index().max(b.index()))
        })
    }

    /// Minimum hop count between two nodes, memoized. Unit edge weights
    /// make this Dijkstra equivalent to a breadth-first search.
    pub fn distance(&self, src: DeviceId, dest: DeviceId) -> usize {
        if src == dest {
            return 0;
        }
        if let Some(&distance) = self.distance_cache.borrow().get(&(src, dest)) {
            return distance;
        }
        let distances = dijkstra(
            &self.graph,
            NodeIndex::new(src),
            Some(NodeIndex::new(dest)),
            |_| 1usize,
        );
        let distance = *distances
            .get(&NodeIndex::new(dest))
            .unwrap_or_else(|| panic!("expander graph: no path from {} to {}", src, dest));
        self.distance_cache.borrow_mut().insert((src, dest), distance);
        distance
    }

    /// Breadth-first shortest path in neighbor-list order; the first path
    /// reaching `dest` wins ties.
    pub fn shortest_path(&self, src: DeviceId, dest: DeviceId) -> Option<Vec<DeviceId>> {
        self.constrained_shortest_path(src, dest, &HashSet::new(), &HashSet::new())
    }

    fn constrained_shortest_path(
        &self,
        src: DeviceId,
        dest: DeviceId,
        banned_edges: &HashSet<(DeviceId, DeviceId)>,
        banned_nodes: &HashSet<DeviceId>,
    ) -> Option<Vec<DeviceId>> {
        if src == dest {
            return Some(vec![src]);
        }
        if banned_nodes.contains(&src) {
            return None;
        }
        let mut parent: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(src);
        queue.push_back(src);

        'search: while let Some(current) = queue.pop_front() {
            for &neighbor in &self.neighbors[current] {
                if visited.contains(&neighbor)
                    || banned_nodes.contains(&neighbor)
                    || banned_edges.contains(&(current, neighbor))
                {
                    continue;
                }
                visited.insert(neighbor);
                parent.insert(neighbor, current);
                if neighbor == dest {
                    break 'search;
                }
                queue.push_back(neighbor);
            }
        }

        if !parent.contains_key(&dest) {
            return None;
        }
        let mut path = vec![dest];
        let mut current = dest;
        while current != src {
            current = parent[&current];
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Up to `k` shortest simple paths via iterative spur-path generation:
    /// for every prefix of each accepted path, ban the edges that would
    /// reproduce an accepted path and the nodes of the root prefix, then
    /// take the best remaining candidate.
    pub fn k_shortest_paths(
        &self,
        src: DeviceId,
        dest: DeviceId,
        k: usize,
    ) -> Vec<Vec<DeviceId>> {
        let Some(first) = self.shortest_path(src, dest) else {
            return Vec::new();
        };
        let mut accepted = vec![first];
        let mut candidates: Vec<Vec<DeviceId>> = Vec::new();

        while accepted.len() < k {
            let previous = accepted.last().unwrap().clone();
            for spur_index in 0..previous.len() - 1 {
                let root = &previous[..=spur_index];
                let spur_node = previous[spur_index];

                let mut banned_edges = HashSet::new();
                for path in &accepted {
                    if path.len() > spur_index + 1 && path[..=spur_index] == *root {
                        banned_edges.insert((path[spur_index], path[spur_index + 1]));
                    }
                }
                let banned_nodes: HashSet<DeviceId> =
                    root[..spur_index].iter().copied().collect();

                if let Some(spur_path) =
                    self.constrained_shortest_path(spur_node, dest, &banned_edges, &banned_nodes)
                {
                    let mut total = root[..spur_index].to_vec();
                    total.extend(spur_path);
                    if !accepted.contains(&total) && !candidates.contains(&total) {
                        candidates.push(total);
                    }
                }
            }

            if candidates.is_empty() {
                break;
            }
            let best = candidates
                .iter()
                .enumerate()
                .min_by_key(|(_, path)| path.len())
                .map(|(index, _)| index)
                .unwrap();
            accepted.push(candidates.remove(best));
        }
        accepted
    }
}

#[cfg(test)]
mod graph_tests {
    use super::*;

    /// Circulant graph on `n` nodes with the given jump set.
    fn circulant_spec(n: usize, jumps: &[usize]) -> ExpanderGraphSpec {
        let adjacency = (0..n)
            .map(|node| {
                jumps
                    .iter()
                    .flat_map(|&jump| [(node + jump) % n, (node + n - jump) % n])
                    .collect()
            })
            .collect();
        ExpanderGraphSpec {
            node_count: n,
            degree: 2 * jumps.len(),
            groups: None,
            connected_graph_adjacency: Some(adjacency),
            split_graph_adjacency: None,
        }
    }

    #[test]
    fn test_edges_deduplicated() {
        let adjacency = ExpanderAdjacency::from_spec(8, &circulant_spec(8, &[1]), false).unwrap();
        // A ring listed from both endpoints still has exactly n edges.
        assert_eq!(adjacency.edges().count(), 8);
        for node in 0..8 {
            assert_eq!(adjacency.neighbors(node).len(), 2);
        }
    }

    #[test]
    fn test_distance_and_shortest_path_agree() {
        let adjacency =
            ExpanderAdjacency::from_spec(16, &circulant_spec(16, &[1, 4]), false).unwrap();
        for src in 0..16 {
            for dest in 0..16 {
                let path = adjacency.shortest_path(src, dest).unwrap();
                assert_eq!(path.len() - 1, adjacency.distance(src, dest));
                assert_eq!(path[0], src);
                assert_eq!(*path.last().unwrap(), dest);
            }
        }
    }

    #[test]
    fn test_k_shortest_paths_are_simple_and_sorted() {
        let adjacency =
            ExpanderAdjacency::from_spec(16, &circulant_spec(16, &[1, 4]), false).unwrap();
        let paths = adjacency.k_shortest_paths(0, 7, 16);
        assert!(!paths.is_empty());
        for pair in paths.windows(2) {
            assert!(pair[0].len() <= pair[1].len());
        }
        for path in &paths {
            assert_eq!(path[0], 0);
            assert_eq!(*path.last().unwrap(), 7);
            let unique: HashSet<_> = path.iter().collect();
            assert_eq!(unique.len(), path.len(), "path revisits a node: {:?}", path);
            for hop in path.windows(2) {
                assert!(adjacency.neighbors(hop[0]).contains(&hop[1]));
            }
        }
        // All enumerated paths are distinct.
        let distinct: HashSet<_> = paths.iter().collect();
        assert_eq!(distinct.len(), paths.len());
    }

    #[test]
    fn test_split_mode_uses_group_a_order() {
        // 8-node file split into two groups of 4; group A is a 4-cycle.
        let spec = ExpanderGraphSpec {
            node_count: 8,
            degree: 2,
            groups: Some(ExpanderGroups {
                a: vec![0, 2, 4, 6],
                b: vec![1, 3, 5, 7],
            }),
            connected_graph_adjacency: None,
            split_graph_adjacency: Some(vec![
                vec![2, 6],
                vec![3, 7],
                vec![0, 4],
                vec![1, 5],
                vec![2, 6],
                vec![3, 7],
                vec![4, 0],
                vec![5, 1],
            ]),
        };
        let adjacency = ExpanderAdjacency::from_spec(4, &spec, false).unwrap();
        assert_eq!(adjacency.node_count(), 4);
        // Original node 2 became local 1, neighboring locals 0 and 2.
        assert_eq!(adjacency.neighbors(1), &[0, 2]);
    }

    #[test]
    fn test_full_mode_node_count_mismatch() {
        let err = ExpanderAdjacency::from_spec(9, &circulant_spec(8, &[1]), false).unwrap_err();
        assert!(err.to_string().contains("node count"));
    }
}

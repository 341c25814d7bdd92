//! Layered proximity graph backing the vector index.
//!
//! A compact HNSW variant over cosine distance. Vectors are l2-normalised
//! before insertion (the facade enforces this), so distance is
//! `1 - dot(a, b)`. Layer assignment draws from a seeded generator, which
//! makes graph construction deterministic for identical input sequences.
//!
//! The graph is not internally synchronised; [`crate::index::VectorIndex`]
//! wraps it in a single reader-writer lock so a search can never observe a
//! partial insert.

use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// Hard cap on graph depth; levels beyond this are clamped.
const MAX_LAYERS: usize = 32;

/// Seed for the layer-assignment generator. Fixed so identical insertion
/// sequences build identical graphs.
const LAYER_RNG_SEED: u64 = 0x5e3e_317e;

#[derive(Debug, Clone)]
struct Node {
    vector: Vec<f32>,
    max_layer: usize,
}

#[derive(Debug, Default)]
struct Layer {
    /// node id -> neighbour ids, in connection order
    edges: HashMap<String, Vec<String>>,
}

impl Layer {
    fn neighbors(&self, id: &str) -> &[String] {
        self.edges.get(id).map_or(&[], |v| v.as_slice())
    }

    fn connect(&mut self, from: &str, to: &str) {
        let list = self.edges.entry(from.to_string()).or_default();
        if !list.iter().any(|n| n == to) {
            list.push(to.to_string());
        }
    }
}

/// Search candidate ordered so that a `BinaryHeap` pops the smallest
/// distance first.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    distance: f32,
    id: String,
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Hierarchical navigable small-world graph over cosine distance.
pub(crate) struct HnswGraph {
    m: usize,
    ef_construction: usize,
    level_norm: f64,
    nodes: HashMap<String, Node>,
    layers: Vec<Layer>,
    entry_point: Option<String>,
    rng: StdRng,
}

impl std::fmt::Debug for HnswGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswGraph")
            .field("m", &self.m)
            .field("num_nodes", &self.nodes.len())
            .field("num_layers", &self.layers.len())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

impl HnswGraph {
    pub(crate) fn new(m: usize, ef_construction: usize) -> Self {
        Self {
            m: m.max(2),
            ef_construction: ef_construction.max(m),
            level_norm: 1.0 / (m.max(2) as f64).ln(),
            nodes: HashMap::new(),
            layers: vec![Layer::default()],
            entry_point: None,
            rng: StdRng::seed_from_u64(LAYER_RNG_SEED),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.layers = vec![Layer::default()];
        self.entry_point = None;
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        1.0 - dot
    }

    fn random_level(&mut self) -> usize {
        let u: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-u.ln() * self.level_norm).floor();
        (level as usize).min(MAX_LAYERS - 1)
    }

    fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 { self.m * 2 } else { self.m }
    }

    /// Insert a normalised vector. The caller guarantees the id is not
    /// already present.
    pub(crate) fn insert(&mut self, id: String, vector: Vec<f32>) {
        debug_assert!(!self.nodes.contains_key(&id));

        let level = self.random_level();
        while self.layers.len() <= level {
            self.layers.push(Layer::default());
        }

        let entry = self.entry_point.clone();
        self.nodes.insert(
            id.clone(),
            Node {
                vector: vector.clone(),
                max_layer: level,
            },
        );

        let Some(entry_id) = entry else {
            self.entry_point = Some(id);
            return;
        };

        let entry_layer = self.nodes[&entry_id].max_layer;
        let mut current = entry_id;

        // Greedy descent through the layers above the new node's level.
        for layer in ((level + 1)..=entry_layer).rev() {
            current = self.closest_on_layer(&current, &vector, layer);
        }

        // Connect on every layer the node participates in.
        for layer in (0..=level.min(entry_layer)).rev() {
            let candidates = self.search_layer(&current, &vector, self.ef_construction, layer);
            let selected: Vec<String> = candidates
                .iter()
                .filter(|(nid, _)| *nid != id)
                .take(self.m)
                .map(|(nid, _)| nid.clone())
                .collect();

            for neighbor in &selected {
                self.layers[layer].connect(&id, neighbor);
                self.layers[layer].connect(neighbor, &id);
                self.prune(layer, neighbor);
            }

            if let Some((closest, _)) = candidates.iter().find(|(nid, _)| *nid != id) {
                current = closest.clone();
            }
        }

        if level > entry_layer {
            self.entry_point = Some(id);
        }
    }

    /// Remove a node and every edge referencing it. Returns whether it was
    /// present.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };

        for layer in self.layers.iter_mut().take(node.max_layer + 1) {
            layer.edges.remove(id);
            for neighbors in layer.edges.values_mut() {
                neighbors.retain(|n| n != id);
            }
        }

        if self.entry_point.as_deref() == Some(id) {
            // Deterministic replacement: highest layer, then smallest id.
            self.entry_point = self
                .nodes
                .iter()
                .max_by(|(a_id, a), (b_id, b)| {
                    a.max_layer.cmp(&b.max_layer).then_with(|| b_id.cmp(a_id))
                })
                .map(|(nid, _)| nid.clone());
        }
        true
    }

    /// Nearest neighbours of `query`, as `(id, distance)` pairs sorted by
    /// ascending distance. Returns at most `ef` candidates.
    pub(crate) fn search(&self, query: &[f32], ef: usize) -> Vec<(String, f32)> {
        let Some(entry_id) = self.entry_point.clone() else {
            return Vec::new();
        };
        let entry_layer = self.nodes[&entry_id].max_layer;

        let mut current = entry_id;
        for layer in (1..=entry_layer).rev() {
            current = self.closest_on_layer(&current, query, layer);
        }

        let mut results = self.search_layer(&current, query, ef, 0);
        results.truncate(ef);
        results
    }

    /// Greedy single-step descent: the closest reachable node on one layer.
    fn closest_on_layer(&self, entry: &str, query: &[f32], layer: usize) -> String {
        let mut current = entry.to_string();
        let mut current_dist = Self::distance(&self.nodes[&current].vector, query);

        loop {
            let mut improved = false;
            for neighbor in self.layers[layer].neighbors(&current) {
                if let Some(node) = self.nodes.get(neighbor) {
                    let dist = Self::distance(&node.vector, query);
                    if dist < current_dist {
                        current = neighbor.clone();
                        current_dist = dist;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search within one layer. Returns up to `ef` candidates sorted by
    /// ascending distance.
    fn search_layer(
        &self,
        entry: &str,
        query: &[f32],
        ef: usize,
        layer: usize,
    ) -> Vec<(String, f32)> {
        let Some(entry_node) = self.nodes.get(entry) else {
            return Vec::new();
        };
        let ef = ef.max(1);

        let entry_dist = Self::distance(&entry_node.vector, query);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(entry.to_string());

        // `candidates` pops closest-first; `best` holds negated distances so
        // its peek is the farthest kept result.
        let mut candidates = BinaryHeap::new();
        let mut best = BinaryHeap::new();
        candidates.push(Candidate {
            distance: entry_dist,
            id: entry.to_string(),
        });
        best.push(Candidate {
            distance: -entry_dist,
            id: entry.to_string(),
        });

        while let Some(closest) = candidates.pop() {
            let farthest_kept = best.peek().map_or(f32::MAX, |c: &Candidate| -c.distance);
            if closest.distance > farthest_kept && best.len() >= ef {
                break;
            }

            for neighbor in self.layers[layer].neighbors(&closest.id) {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let Some(node) = self.nodes.get(neighbor) else {
                    continue;
                };
                let dist = Self::distance(&node.vector, query);
                let farthest_kept = best.peek().map_or(f32::MAX, |c: &Candidate| -c.distance);
                if dist < farthest_kept || best.len() < ef {
                    candidates.push(Candidate {
                        distance: dist,
                        id: neighbor.clone(),
                    });
                    best.push(Candidate {
                        distance: -dist,
                        id: neighbor.clone(),
                    });
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }

        let mut results: Vec<(String, f32)> = best
            .into_iter()
            .map(|c| (c.id, -c.distance))
            .collect();
        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results
    }

    /// Trim a node's neighbour list back to the per-layer connection cap,
    /// keeping the closest.
    fn prune(&mut self, layer: usize, id: &str) {
        let cap = self.max_connections(layer);
        let neighbors = self.layers[layer].neighbors(id).to_vec();
        if neighbors.len() <= cap {
            return;
        }
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        let mut ranked: Vec<(String, f32)> = neighbors
            .into_iter()
            .filter_map(|nid| {
                self.nodes
                    .get(&nid)
                    .map(|n| (nid.clone(), Self::distance(&node.vector, &n.vector)))
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(cap);

        self.layers[layer]
            .edges
            .insert(id.to_string(), ranked.into_iter().map(|(nid, _)| nid).collect());
    }
}

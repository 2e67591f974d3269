//! Deterministic layered (Sugiyama-style) layout
//!
//! Steps, all stable with respect to declaration order:
//!
//! 1. cycle breaking: depth-first search in declaration order, every back
//!    edge is reversed
//! 2. ranking: longest path from the sources
//! 3. ordering: barycenter sweeps, down then up, a fixed number of times
//! 4. coordinates: ranks are spaced along the rank axis, nodes within a rank
//!    along the other axis, every rank centered on the widest one
//!
//! The result is the center of every node, in input order.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::LayoutDirection;

/// Number of down+up barycenter sweeps
const ORDERING_SWEEPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayeredParams {
    pub direction: LayoutDirection,
    pub node_width: f64,
    pub node_height: f64,

    /// Gap between neighbours in the same rank
    pub node_spacing: f64,

    /// Gap between consecutive ranks
    pub rank_spacing: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Lay out `nodes` connected by `edges` (pairs of node ids)
///
/// Edges with an unknown endpoint and self-edges do not take part in the
/// layout. Duplicate node ids are laid out separately; edges refer to the
/// first occurrence.
pub fn layered(nodes: &[&str], edges: &[(&str, &str)], params: &LayeredParams) -> Vec<Point> {
    if nodes.is_empty() {
        return vec![];
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, id) in nodes.iter().enumerate() {
        index.entry(*id).or_insert(i);
    }

    let mut seen = HashSet::new();
    let mut successors: Vec<Vec<usize>> = vec![vec![]; nodes.len()];
    for (source, target) in edges {
        let (Some(&from), Some(&to)) = (index.get(source), index.get(target)) else {
            debug!("layout ignores edge {source} -> {target}: unknown node");
            continue;
        };
        if from == to {
            debug!("layout ignores self-edge on {source}");
            continue;
        }
        if seen.insert((from, to)) {
            successors[from].push(to);
        }
    }

    let successors = break_cycles(&successors);
    let ranks = longest_path_ranks(&successors);
    let layers = order_layers(&successors, &ranks);

    assign_coordinates(&layers, nodes.len(), params)
}

/// Reverse back edges found by a depth-first search in declaration order
fn break_cycles(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let n = successors.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut acyclic: Vec<Vec<usize>> = vec![vec![]; n];

    for root in 0..n {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (node, index of the next successor to look at)
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::OnStack;

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            match successors[node].get(*next) {
                Some(&target) => {
                    *next += 1;
                    match marks[target] {
                        Mark::OnStack => acyclic[target].push(node),
                        Mark::Done => acyclic[node].push(target),
                        Mark::Unvisited => {
                            acyclic[node].push(target);
                            marks[target] = Mark::OnStack;
                            stack.push((target, 0));
                        }
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }

    // a reversed edge may duplicate an existing one
    for targets in &mut acyclic {
        let mut seen = HashSet::new();
        targets.retain(|target| seen.insert(*target));
    }

    acyclic
}

/// Rank of every node: length of the longest path reaching it
fn longest_path_ranks(successors: &[Vec<usize>]) -> Vec<usize> {
    let n = successors.len();
    let mut in_degree = vec![0usize; n];
    for targets in successors {
        for &target in targets {
            in_degree[target] += 1;
        }
    }

    let mut ranks = vec![0usize; n];
    let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

    while let Some(node) = ready.pop_front() {
        for &target in &successors[node] {
            ranks[target] = ranks[target].max(ranks[node] + 1);
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push_back(target);
            }
        }
    }

    ranks
}

/// Group nodes by rank and reduce crossings with barycenter sweeps
fn order_layers(successors: &[Vec<usize>], ranks: &[usize]) -> Vec<Vec<usize>> {
    let n = successors.len();
    let depth = ranks.iter().copied().max().unwrap_or(0) + 1;

    let mut layers: Vec<Vec<usize>> = vec![vec![]; depth];
    for node in 0..n {
        layers[ranks[node]].push(node);
    }

    let mut predecessors: Vec<Vec<usize>> = vec![vec![]; n];
    for (node, targets) in successors.iter().enumerate() {
        for &target in targets {
            predecessors[target].push(node);
        }
    }

    let mut position = vec![0usize; n];
    for layer in &layers {
        index_layer(layer, &mut position);
    }

    for _ in 0..ORDERING_SWEEPS {
        for rank in 1..depth {
            sort_by_barycenter(&mut layers[rank], &predecessors, &position);
            index_layer(&layers[rank], &mut position);
        }
        for rank in (0..depth.saturating_sub(1)).rev() {
            sort_by_barycenter(&mut layers[rank], successors, &position);
            index_layer(&layers[rank], &mut position);
        }
    }

    layers
}

fn index_layer(layer: &[usize], position: &mut [usize]) {
    for (i, &node) in layer.iter().enumerate() {
        position[node] = i;
    }
}

/// Stable sort by mean neighbour position; nodes without neighbours keep
/// their current position as key
fn sort_by_barycenter(layer: &mut [usize], neighbours: &[Vec<usize>], position: &[usize]) {
    let mut keyed: Vec<(f64, usize)> = layer
        .iter()
        .map(|&node| {
            let adjacent = &neighbours[node];
            let key = if adjacent.is_empty() {
                position[node] as f64
            } else {
                adjacent.iter().map(|&other| position[other] as f64).sum::<f64>()
                    / adjacent.len() as f64
            };
            (key, node)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (slot, (_, node)) in layer.iter_mut().zip(keyed) {
        *slot = node;
    }
}

fn assign_coordinates(layers: &[Vec<usize>], n: usize, params: &LayeredParams) -> Vec<Point> {
    let (in_rank_extent, rank_extent) = match params.direction {
        LayoutDirection::TopToBottom => (params.node_width, params.node_height),
        LayoutDirection::LeftToRight => (params.node_height, params.node_width),
    };
    let in_rank_step = in_rank_extent + params.node_spacing;
    let rank_step = rank_extent + params.rank_spacing;

    let span = |count: usize| {
        if count == 0 {
            0.0
        } else {
            count as f64 * in_rank_extent + (count - 1) as f64 * params.node_spacing
        }
    };
    let widest = layers.iter().map(|layer| span(layer.len())).fold(0.0, f64::max);

    let mut centers = vec![Point::default(); n];
    for (rank, layer) in layers.iter().enumerate() {
        let offset = (widest - span(layer.len())) / 2.0;
        let along_rank = rank as f64 * rank_step + rank_extent / 2.0;

        for (i, &node) in layer.iter().enumerate() {
            let across = offset + i as f64 * in_rank_step + in_rank_extent / 2.0;
            centers[node] = match params.direction {
                LayoutDirection::TopToBottom => Point {
                    x: across,
                    y: along_rank,
                },
                LayoutDirection::LeftToRight => Point {
                    x: along_rank,
                    y: across,
                },
            };
        }
    }

    centers
}

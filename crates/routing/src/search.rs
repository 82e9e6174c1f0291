//! Path search over a [`TopologyGraph`].
//!
//! [`shortest_path`] finds the fewest-segment path; [`all_paths`] enumerates
//! every simple path up to a hop limit, for diagnostics. Neither weighs
//! geometry: a long segment counts the same as a short one.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::identifiers::SegmentIdentifier;
use crate::models::types::Path;
use crate::topology::TopologyGraph;

/// Hop limit for [`all_paths`] when the caller has no better bound
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Breadth-first search seeded from every start candidate at once.
///
/// The first end candidate reached wins. Neighbors are explored in graph
/// insertion order and seeds in slice order, so equal-length alternatives
/// resolve the same way every time. A segment that is both a start and an end
/// candidate is returned as a single-segment path.
pub fn shortest_path(
    start_candidates: &[SegmentIdentifier],
    end_candidates: &[SegmentIdentifier],
    graph: &TopologyGraph,
) -> Option<Path> {
    let targets: HashSet<&SegmentIdentifier> = end_candidates.iter().collect();

    if let Some(both) = start_candidates.iter().find(|s| targets.contains(s)) {
        return Some(Path::single(both.clone()));
    }

    // parent[x] = segment we reached x from; seeds have none
    let mut parent: HashMap<SegmentIdentifier, Option<SegmentIdentifier>> = HashMap::new();
    let mut queue = VecDeque::new();

    for start in start_candidates {
        if !parent.contains_key(start) {
            parent.insert(start.clone(), None);
            queue.push_back(start.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        for neighbor in graph.neighbors(&current) {
            if parent.contains_key(neighbor) {
                continue;
            }
            parent.insert(neighbor.clone(), Some(current.clone()));

            if targets.contains(neighbor) {
                let path = reconstruct(&parent, neighbor.clone())?;
                log::debug!(
                    "Shortest path {} -> {}: {} segments",
                    path.first(),
                    path.last(),
                    path.len()
                );
                return Some(path);
            }
            queue.push_back(neighbor.clone());
        }
    }

    log::debug!(
        "No path between {} start and {} end candidates ({} segments explored)",
        start_candidates.len(),
        end_candidates.len(),
        parent.len()
    );
    None
}

fn reconstruct(
    parent: &HashMap<SegmentIdentifier, Option<SegmentIdentifier>>,
    end: SegmentIdentifier,
) -> Option<Path> {
    let mut segments = vec![end];
    while let Some(Some(previous)) = segments.last().and_then(|id| parent.get(id)) {
        segments.push(previous.clone());
    }
    segments.reverse();
    Path::from_segments(segments).ok()
}

/// Every simple path from `start` to `end` with at most `max_depth` hops.
///
/// Depth-first over an explicit stack. Each branch carries its own visited
/// set, so a segment may appear in several paths but never twice in one.
/// Paths come out in depth-first discovery order, following neighbor
/// insertion order. Returns an empty list when nothing connects.
pub fn all_paths(
    start: &SegmentIdentifier,
    end: &SegmentIdentifier,
    graph: &TopologyGraph,
    max_depth: usize,
) -> Vec<Path> {
    if start == end {
        return vec![Path::single(start.clone())];
    }

    let mut found = Vec::new();
    let mut stack: Vec<(Vec<SegmentIdentifier>, HashSet<SegmentIdentifier>)> =
        vec![(vec![start.clone()], HashSet::from([start.clone()]))];

    while let Some((path, visited)) = stack.pop() {
        let Some(current) = path.last() else {
            continue;
        };

        if current == end {
            if let Ok(path) = Path::from_segments(path) {
                found.push(path);
            }
            continue;
        }

        // Hops so far = path.len() - 1
        if path.len() > max_depth {
            continue;
        }

        // Reverse so the first neighbor is popped first
        for neighbor in graph.neighbors(current).iter().rev() {
            if visited.contains(neighbor) {
                continue;
            }
            let mut branch_path = path.clone();
            branch_path.push(neighbor.clone());
            let mut branch_visited = visited.clone();
            branch_visited.insert(neighbor.clone());
            stack.push((branch_path, branch_visited));
        }
    }

    log::debug!(
        "{} path(s) from {} to {} within {} hops",
        found.len(),
        start,
        end,
        max_depth
    );
    found
}

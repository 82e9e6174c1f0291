//! Chain merging: turn the polylines of a path into one continuous line.
//!
//! Input order does not matter. The chain is started at an unshared endpoint,
//! then grown one polyline at a time from its tail, reversing pieces that
//! point the wrong way and dropping the duplicated junction coordinate.
//! Coordinates are compared exactly, since every input comes from the same
//! vertex source.

use std::cmp::Ordering;
use std::collections::HashMap;

use geo::{Coord, LineString};

use crate::models::types::{InvalidInput, MergeError, MergedGeometry, Segment};

/// Exact key for a coordinate; `-0.0` and `0.0` share a key
fn exact_key(coord: Coord<f64>) -> (u64, u64) {
    ((coord.x + 0.0).to_bits(), (coord.y + 0.0).to_bits())
}

/// Merge polylines known to form one connected, non-branching chain.
///
/// The output holds `Σ len - (n - 1)` coordinates and every input appears
/// exactly once, forwards or reversed. A lone polyline is returned as is.
pub fn merge_chain(polylines: &[LineString<f64>]) -> Result<MergedGeometry, MergeError> {
    let lines: Vec<&LineString<f64>> = polylines.iter().collect();
    merge_labeled(&lines, |idx| format!("#{}", idx))
}

/// [`merge_chain`] over segments; errors name segment ids instead of positions.
pub fn merge_segments(segments: &[Segment]) -> Result<MergedGeometry, MergeError> {
    let lines: Vec<&LineString<f64>> = segments.iter().map(Segment::geometry).collect();
    merge_labeled(&lines, |idx| segments[idx].id.to_string())
}

fn merge_labeled(
    lines: &[&LineString<f64>],
    label: impl Fn(usize) -> String,
) -> Result<MergedGeometry, MergeError> {
    if lines.is_empty() {
        return Err(InvalidInput::EmptyChain.into());
    }
    if let Some((index, line)) = lines.iter().enumerate().find(|(_, l)| l.0.len() < 2) {
        return Err(InvalidInput::DegeneratePolyline {
            index,
            points: line.0.len(),
        }
        .into());
    }

    if lines.len() == 1 {
        return Ok(MergedGeometry {
            line: lines[0].clone(),
            ambiguous_start: false,
        });
    }

    // How many first/last points land on each coordinate
    let mut frequency: HashMap<(u64, u64), usize> = HashMap::new();
    for line in lines {
        *frequency.entry(exact_key(first(line))).or_default() += 1;
        *frequency.entry(exact_key(last(line))).or_default() += 1;
    }
    let is_chain_end = |coord: Coord<f64>| frequency.get(&exact_key(coord)) == Some(&1);

    let (start_idx, reverse_start, ambiguous_start) = match choose_start(lines, is_chain_end) {
        Some((idx, reverse)) => (idx, reverse, false),
        None => {
            log::warn!(
                "No unshared endpoint among {} polylines, starting from {}",
                lines.len(),
                label(0)
            );
            (0, false, true)
        }
    };

    let mut chain: Vec<Coord<f64>> = if reverse_start {
        lines[start_idx].0.iter().rev().copied().collect()
    } else {
        lines[start_idx].0.clone()
    };
    let mut last_label = label(start_idx);
    let mut remaining: Vec<usize> = (0..lines.len()).filter(|&i| i != start_idx).collect();

    while !remaining.is_empty() {
        let tail = chain[chain.len() - 1];

        let next = remaining.iter().copied().find_map(|idx| {
            let line = lines[idx];
            if first(line) == tail {
                Some((idx, false))
            } else if last(line) == tail {
                Some((idx, true))
            } else {
                None
            }
        });

        let Some((next_idx, reverse)) = next else {
            return Err(MergeError::BrokenChain {
                last: last_label,
                at: tail,
                remaining: remaining.iter().map(|&i| label(i)).collect(),
            });
        };

        // Skip the junction coordinate, it is already the tail
        if reverse {
            chain.extend(lines[next_idx].0.iter().rev().skip(1).copied());
        } else {
            chain.extend(lines[next_idx].0.iter().skip(1).copied());
        }
        last_label = label(next_idx);
        remaining.retain(|&i| i != next_idx);
    }

    log::debug!(
        "Merged {} polylines into {} coordinates",
        lines.len(),
        chain.len()
    );

    Ok(MergedGeometry {
        line: LineString::new(chain),
        ambiguous_start,
    })
}

/// Polyline holding the chain's starting end, and whether to reverse it.
///
/// A chain has two unshared ends; the lower one by (x, y) is taken so the
/// result does not depend on input order.
fn choose_start(
    lines: &[&LineString<f64>],
    is_chain_end: impl Fn(Coord<f64>) -> bool,
) -> Option<(usize, bool)> {
    lines
        .iter()
        .enumerate()
        .flat_map(|(idx, line)| [(idx, false, first(line)), (idx, true, last(line))])
        .filter(|&(_, _, coord)| is_chain_end(coord))
        .min_by(|a, b| compare_coords(a.2, b.2).then(a.0.cmp(&b.0)))
        .map(|(idx, reverse, _)| (idx, reverse))
}

fn compare_coords(a: Coord<f64>, b: Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn first(line: &LineString<f64>) -> Coord<f64> {
    line.0[0]
}

fn last(line: &LineString<f64>) -> Coord<f64> {
    line.0[line.0.len() - 1]
}

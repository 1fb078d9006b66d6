//! Exclusion filter.
//!
//! The operator sees each candidate with its 0-based index and types a
//! whitespace-separated list of indices to drop from the run.

use std::collections::HashSet;

use crate::discovery::NeighborCandidate;

/// Parse a whitespace-separated exclusion index list.
///
/// Tokens that are not valid indices are ignored.
pub fn parse_exclusions(input: &str) -> HashSet<usize> {
    input
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Retain the candidates whose index is not excluded, preserving original
/// relative order.
///
/// Out-of-range indices have no effect; an empty exclusion set returns the
/// input unchanged.
pub fn filter_exclusions(
    candidates: Vec<NeighborCandidate>,
    excluded: &HashSet<usize>,
) -> Vec<NeighborCandidate> {
    candidates
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !excluded.contains(index))
        .map(|(_, candidate)| candidate)
        .collect()
}

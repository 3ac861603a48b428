//! Cluster reference resolution (§3, §9).
//!
//! Not grounded in `original_source` (the kept pack's GUI files describe
//! clusters/arrays as named groupings but the membership-resolution logic
//! itself lives in a GUI-tree file outside the kept set); implemented
//! directly from the rule spec.md §9 states verbatim: "first tracked member
//! > first-in-order member > barycentre of all members", cached per cluster
//! id and recomputed only on a membership or tracking-flag change, per that
//! same design note's suggestion.

use std::collections::HashMap;

use wfs_core::{InputObject, Position};

#[derive(Debug, Clone, PartialEq)]
struct ClusterMembership {
    member_indices: Vec<usize>,
    tracking_flags: Vec<bool>,
}

impl ClusterMembership {
    fn capture(inputs: &[InputObject], cluster_id: u8) -> Self {
        let mut member_indices = Vec::new();
        let mut tracking_flags = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            if input.cluster_id == cluster_id {
                member_indices.push(index);
                tracking_flags.push(input.tracking_active);
            }
        }
        Self { member_indices, tracking_flags }
    }
}

fn barycentre(positions: impl Iterator<Item = Position>) -> Position {
    let mut sum = Position::ORIGIN;
    let mut count = 0usize;
    for position in positions {
        sum = sum.add(&position);
        count += 1;
    }
    if count == 0 {
        Position::ORIGIN
    } else {
        sum.scale(1.0 / count as f64)
    }
}

/// Resolves, per named cluster, the position its tracking members should
/// follow. Caches the resolution and only recomputes when a cluster's
/// membership or `tracking_active` flags have changed since the last call
/// (§9).
#[derive(Debug, Default)]
pub struct ClusterResolver {
    cache: HashMap<u8, (ClusterMembership, Position)>,
}

impl ClusterResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `positions` must be indexed the same as `inputs` (each input's
    /// current composite or target position).
    pub fn resolve(&mut self, inputs: &[InputObject], cluster_id: u8, positions: &[Position]) -> Position {
        let membership = ClusterMembership::capture(inputs, cluster_id);

        if let Some((cached_membership, cached_position)) = self.cache.get(&cluster_id) {
            if *cached_membership == membership {
                return *cached_position;
            }
        }

        let resolved = Self::compute(&membership, positions);
        self.cache.insert(cluster_id, (membership, resolved));
        resolved
    }

    fn compute(membership: &ClusterMembership, positions: &[Position]) -> Position {
        let first_tracked = membership
            .member_indices
            .iter()
            .zip(&membership.tracking_flags)
            .find(|(_, &tracking)| tracking)
            .map(|(&index, _)| positions[index]);
        if let Some(position) = first_tracked {
            return position;
        }

        if let Some(&first) = membership.member_indices.first() {
            return positions[first];
        }

        barycentre(membership.member_indices.iter().map(|&index| positions[index]))
    }

    /// Drops every cached resolution, forcing a fresh computation on the
    /// next `resolve` call for every cluster.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

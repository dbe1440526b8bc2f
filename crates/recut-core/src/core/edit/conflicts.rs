//! Operation Conflict Matrix
//!
//! Symmetric compatibility table over operation-type pairs, scoped per clip:
//! two operations conflict only when they touch at least one common clip and
//! their type pair is marked incompatible.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::plan::{EditPlan, OperationType};

/// A detected incompatibility between two operations of one plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub first_index: usize,
    pub first_type: OperationType,
    pub second_index: usize,
    pub second_type: OperationType,
    /// Clips touched by both operations
    pub shared_clips: Vec<usize>,
}

impl Conflict {
    pub fn message(&self) -> String {
        format!(
            "Conflicting operations on clip(s) {:?}: operation {} ({}) and operation {} ({}) are incompatible",
            self.shared_clips, self.first_index, self.first_type, self.second_index, self.second_type
        )
    }
}

/// Set of incompatible operation-type pairs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictMatrix {
    incompatible: HashSet<(OperationType, OperationType)>,
}

impl ConflictMatrix {
    /// A matrix where every pair is compatible
    pub fn permissive() -> Self {
        Self {
            incompatible: HashSet::new(),
        }
    }

    fn key(a: OperationType, b: OperationType) -> (OperationType, OperationType) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Marks a pair incompatible (order does not matter)
    pub fn with_rule(mut self, a: OperationType, b: OperationType) -> Self {
        self.incompatible.insert(Self::key(a, b));
        self
    }

    /// Marks a pair compatible again
    pub fn allow(mut self, a: OperationType, b: OperationType) -> Self {
        self.incompatible.remove(&Self::key(a, b));
        self
    }

    pub fn is_compatible(&self, a: OperationType, b: OperationType) -> bool {
        !self.incompatible.contains(&Self::key(a, b))
    }

    pub fn rule_count(&self) -> usize {
        self.incompatible.len()
    }

    /// Finds every incompatible pair of operations sharing a clip.
    /// Each operation pair is reported once with all clips it shares.
    pub fn conflicts_in(&self, plan: &EditPlan) -> Vec<Conflict> {
        let mut by_clip: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for (op_index, op) in plan.operations.iter().enumerate() {
            for clip in op.distinct_targets() {
                by_clip.entry(clip).or_default().insert(op_index);
            }
        }

        let mut shared: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for (clip, ops) in &by_clip {
            if ops.len() < 2 {
                continue;
            }
            let ops: Vec<usize> = ops.iter().copied().collect();
            for (i, &first) in ops.iter().enumerate() {
                for &second in &ops[i + 1..] {
                    let first_type = plan.operations[first].operation_type();
                    let second_type = plan.operations[second].operation_type();
                    if !self.is_compatible(first_type, second_type) {
                        shared.entry((first, second)).or_default().push(*clip);
                    }
                }
            }
        }

        shared
            .into_iter()
            .map(|((first, second), shared_clips)| Conflict {
                first_index: first,
                first_type: plan.operations[first].operation_type(),
                second_index: second,
                second_type: plan.operations[second].operation_type(),
                shared_clips,
            })
            .collect()
    }
}

impl Default for ConflictMatrix {
    /// Trim/split on the same clip, and reorders with overlapping clip sets
    fn default() -> Self {
        Self::permissive()
            .with_rule(OperationType::Trim, OperationType::Split)
            .with_rule(OperationType::Reorder, OperationType::Reorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::edit::plan::EditOperation;

    #[test]
    fn test_default_rules_are_symmetric() {
        let matrix = ConflictMatrix::default();

        assert!(!matrix.is_compatible(OperationType::Trim, OperationType::Split));
        assert!(!matrix.is_compatible(OperationType::Split, OperationType::Trim));
        assert!(!matrix.is_compatible(OperationType::Reorder, OperationType::Reorder));
        assert!(matrix.is_compatible(OperationType::Trim, OperationType::Reorder));
        assert_eq!(matrix.rule_count(), 2);
    }

    #[test]
    fn test_trim_and_split_same_clip_conflict() {
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::trim_duration(0, 3.0))
            .add_operation(EditOperation::split(0, 1.0));

        let conflicts = ConflictMatrix::default().conflicts_in(&plan);
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.shared_clips, vec![0]);
        assert!(conflict.message().contains("trim"));
        assert!(conflict.message().contains("split"));
    }

    #[test]
    fn test_trim_and_split_different_clips_ok() {
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::trim_duration(0, 3.0))
            .add_operation(EditOperation::split(1, 1.0));

        assert!(ConflictMatrix::default().conflicts_in(&plan).is_empty());
    }

    #[test]
    fn test_overlapping_reorders_reported_once() {
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::reorder(vec![0, 1, 2], vec![2, 1, 0]))
            .add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]));

        let conflicts = ConflictMatrix::default().conflicts_in(&plan);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].shared_clips, vec![1, 2]);
    }

    #[test]
    fn test_disjoint_reorders_ok() {
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::reorder(vec![0, 1], vec![1, 0]))
            .add_operation(EditOperation::reorder(vec![2, 3], vec![3, 2]));

        assert!(ConflictMatrix::default().conflicts_in(&plan).is_empty());
    }

    #[test]
    fn test_custom_rule_and_allow() {
        let plan = EditPlan::new("x")
            .add_operation(EditOperation::speed(0, 2.0))
            .add_operation(EditOperation::trim_duration(0, 1.0));

        let strict = ConflictMatrix::default().with_rule(OperationType::Speed, OperationType::Trim);
        assert_eq!(strict.conflicts_in(&plan).len(), 1);

        let relaxed = strict.allow(OperationType::Trim, OperationType::Speed);
        assert!(relaxed.conflicts_in(&plan).is_empty());
    }
}

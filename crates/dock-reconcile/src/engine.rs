use std::collections::{BTreeMap, BTreeSet};

use crate::{CheckStatus, ExistingLine, LineInput, LineUpdate, ReconcileError, ReconcilePlan};

/// Refuse any line mutation on a submitted check.
pub fn ensure_lines_mutable(check_id: i64, status: CheckStatus) -> Result<(), ReconcileError> {
    if status.is_frozen() {
        return Err(ReconcileError::CheckSubmitted { check_id });
    }
    Ok(())
}

/// Shape checks that need no storage lookup: unique keys, non-negative quantities.
pub fn validate_submission(submitted: &[LineInput]) -> Result<(), ReconcileError> {
    let mut seen = BTreeSet::new();
    for line in submitted {
        if !seen.insert(line.requirement_id) {
            return Err(ReconcileError::DuplicateRequirement {
                requirement_id: line.requirement_id,
            });
        }
        if line.actual_quantity < 0 {
            return Err(ReconcileError::NegativeQuantity {
                requirement_id: line.requirement_id,
                actual_quantity: line.actual_quantity,
            });
        }
    }
    Ok(())
}

pub fn submitted_requirement_ids(submitted: &[LineInput]) -> BTreeSet<i64> {
    submitted.iter().map(|l| l.requirement_id).collect()
}

/// Compare the submitted requirement ids with the ids actually found on the
/// check's vessel. Any difference rejects the batch; the error lists the
/// offending ids in ascending order.
pub fn check_requirement_scope(
    submitted: &BTreeSet<i64>,
    found_on_vessel: &BTreeSet<i64>,
) -> Result<(), ReconcileError> {
    if submitted == found_on_vessel {
        return Ok(());
    }
    let requirement_ids: Vec<i64> = submitted
        .symmetric_difference(found_on_vessel)
        .copied()
        .collect();
    Err(ReconcileError::RequirementScopeMismatch { requirement_ids })
}

/// Build the keyed upsert-and-prune plan for one check.
///
/// Scope validation against the vessel happens before this (it needs storage);
/// this step only enforces [`validate_submission`].
pub fn reconcile(
    check_id: i64,
    existing: &[ExistingLine],
    submitted: &[LineInput],
) -> Result<ReconcilePlan, ReconcileError> {
    validate_submission(submitted)?;

    let by_requirement: BTreeMap<i64, &ExistingLine> =
        existing.iter().map(|l| (l.requirement_id, l)).collect();

    let mut plan = ReconcilePlan::empty(check_id);
    let mut kept: BTreeSet<i64> = BTreeSet::new();

    for line in submitted {
        match by_requirement.get(&line.requirement_id) {
            Some(current) => {
                kept.insert(line.requirement_id);
                let changed = current.actual_quantity != line.actual_quantity
                    || current.condition != line.condition
                    || current.notes != line.notes;
                plan.to_update.push(LineUpdate {
                    line_id: current.line_id,
                    requirement_id: line.requirement_id,
                    actual_quantity: line.actual_quantity,
                    condition: line.condition,
                    notes: line.notes.clone(),
                    changed,
                });
            }
            None => plan.to_insert.push(line.clone()),
        }
    }

    plan.to_delete = by_requirement
        .iter()
        .filter(|(req, _)| !kept.contains(req))
        .map(|(_, l)| l.line_id)
        .collect();
    plan.to_delete.sort_unstable();

    Ok(plan)
}

//! dock-reconcile
//!
//! Inventory-check line reconciliation.
//!
//! A line submission is a desired-state declaration over the check's lines,
//! keyed by `(check_id, requirement_id)`:
//! - submitted keys already present are updated in place (line id preserved)
//! - new keys are inserted
//! - present keys missing from the submission are deleted
//!
//! Lines of a submitted check are frozen. Every submitted requirement must
//! belong to the check's vessel; a single mismatch rejects the whole batch.
//!
//! Deterministic, pure logic. No IO. Persistence applies the plan in one
//! transaction.

mod engine;
mod types;

pub use engine::{
    check_requirement_scope, ensure_lines_mutable, reconcile, submitted_requirement_ids,
    validate_submission,
};
pub use types::*;

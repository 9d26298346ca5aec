//! Reconciliation decision logic.
//!
//! Pure functions: given the incoming (email, phone) pair and the snapshot
//! of contacts matching either field, compute which store mutations the
//! request requires. No store access, no clock reads, no randomness. Given
//! the same snapshot and input the decision is always the same; every
//! ordering decision is made on (`created_at`, `id`), never on collection
//! iteration order.

use std::collections::BTreeMap;

use crate::contact::{Contact, ContactId};
use crate::error::ExecutionError;

/// One store mutation (or the absence of one) demanded by a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing matched; a brand-new cluster is formed.
    CreateNewPrimary,

    /// The exact pair already exists and no merge is required; the existing
    /// cluster is returned unchanged.
    NoOp {
        /// The cluster's canonical record.
        primary_id: ContactId,
    },

    /// The pair is new but overlaps an existing cluster; an alias record is
    /// created under that cluster's primary.
    CreateSecondary {
        /// The cluster's canonical record.
        primary_id: ContactId,
    },

    /// The submission bridged two clusters; the younger primary is demoted
    /// under the older one and its contacts re-linked.
    MergeClusters {
        /// Primary that keeps the cluster (earliest `created_at`).
        surviving_primary_id: ContactId,
        /// Primary being demoted to secondary.
        demoted_primary_id: ContactId,
    },
}

/// Computes the ordered action sequence for one submission.
///
/// `matched` is every non-deleted contact whose email or phone equals the
/// input; `primaries` maps each resolved cluster-primary id to its record
/// (a matched secondary's primary need not itself be in `matched`, so the
/// caller fetches them). Merges come first, losers ordered by
/// (`created_at`, `id`); exactly one non-merge action follows unless a
/// merge already covered the exact pair.
///
/// # Errors
/// [`ExecutionError::PrimaryNotFound`] when a matched contact links to a
/// primary absent from `primaries` (vanished between read and resolve).
pub fn decide(
    email: Option<&str>,
    phone: Option<&str>,
    matched: &[Contact],
    primaries: &BTreeMap<ContactId, Contact>,
) -> Result<Vec<ReconcileAction>, ExecutionError> {
    if matched.is_empty() {
        return Ok(vec![ReconcileAction::CreateNewPrimary]);
    }

    // Resolve every match to its cluster primary (one hop) and order the
    // candidates by age. The oldest primary survives any merge.
    let mut candidates: Vec<&Contact> = Vec::new();
    for contact in matched {
        let primary_id = contact.primary_id();
        let primary = primaries
            .get(&primary_id)
            .ok_or(ExecutionError::PrimaryNotFound { id: primary_id })?;
        if !candidates.iter().any(|c| c.id == primary.id) {
            candidates.push(primary);
        }
    }
    candidates.sort_by_key(|c| (c.created_at, c.id));

    let surviving = candidates[0].id;
    let mut actions: Vec<ReconcileAction> = candidates[1..]
        .iter()
        .map(|demoted| ReconcileAction::MergeClusters {
            surviving_primary_id: surviving,
            demoted_primary_id: demoted.id,
        })
        .collect();
    let merged = !actions.is_empty();

    // Exact-pair check: Option equality on both fields, so an absent input
    // field only matches a record where that field is absent too.
    let pair_exists = matched.iter().any(|c| c.matches_pair(email, phone));

    if pair_exists {
        if !merged {
            actions.push(ReconcileAction::NoOp {
                primary_id: surviving,
            });
        }
        // A merge alone covers an already-stored pair; no new record.
    } else {
        actions.push(ReconcileAction::CreateSecondary {
            primary_id: surviving,
        });
    }

    Ok(actions)
}

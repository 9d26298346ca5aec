//! Reconciliation engine.
//!
//! Orchestrates one identify request end to end: open a store transaction,
//! query the matching contacts, run the decision logic, apply the resulting
//! mutations (creates, merges, re-links), assemble the identity view, and
//! commit. Every step between open and commit runs inside the same
//! transaction, so concurrent requests over overlapping records serialize
//! and any failure rolls the whole write set back.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::contact::{Contact, ContactId, LinkPrecedence};
use crate::error::{ExecutionError, IdweldResult};
use crate::identify::{IdentifyRequest, IdentityView};
use crate::matcher::{self, ReconcileAction};
use crate::storage::{ContactStore, ContactTx, StorageError};
use crate::view::build_view;

/// Contact reconciliation engine.
///
/// Holds no mutable state of its own; the store handle is injected at
/// construction and every request opens its own transaction, so a single
/// engine is safe to share across threads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use idweld::{IdentifyRequest, ReconcileEngine};
/// use idweld::storage::InMemoryContactStore;
///
/// let engine = ReconcileEngine::new(Arc::new(InMemoryContactStore::new()));
/// let view = engine
///     .identify(&IdentifyRequest::new(Some("a@x.com"), Some("111")))
///     .unwrap();
/// assert!(view.secondary_contact_ids.is_empty());
/// ```
#[derive(Clone)]
pub struct ReconcileEngine {
    contacts: Arc<dyn ContactStore>,
}

impl ReconcileEngine {
    /// Creates an engine over the given store.
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        Self { contacts }
    }

    /// Reconciles one (email, phone) submission.
    ///
    /// Returns the aggregated view of the cluster the submission resolved
    /// to, after any contact creation or cluster merge it triggered.
    ///
    /// # Errors
    /// - [`crate::ValidationError::MissingIdentifier`] when both fields are
    ///   absent or blank; the store is never touched.
    /// - [`ExecutionError::PrimaryNotFound`] when a linked primary vanished
    ///   concurrently; retryable.
    /// - [`ExecutionError::Storage`] on backend failure; the transaction is
    ///   dropped and nothing is persisted.
    pub fn identify(&self, request: &IdentifyRequest) -> IdweldResult<IdentityView> {
        request.validate()?;
        let email = request.email();
        let phone = request.phone_number();
        info!(?email, ?phone, "processing identify request");

        let mut tx = self.contacts.transaction().map_err(ExecutionError::from)?;

        let matched = tx.find_by_email_or_phone(email, phone)?;
        let primaries = resolve_primaries(tx.as_ref(), &matched)?;
        let actions = matcher::decide(email, phone, &matched, &primaries)?;
        debug!(
            matched = matched.len(),
            clusters = primaries.len(),
            actions = actions.len(),
            "reconciliation plan computed"
        );

        let mut primary_id = None;
        for action in &actions {
            match *action {
                ReconcileAction::CreateNewPrimary => {
                    let created =
                        tx.create_contact(email, phone, LinkPrecedence::Primary, None)?;
                    info!(id = %created.id, "created new primary contact");
                    primary_id = Some(created.id);
                }
                ReconcileAction::NoOp { primary_id: id } => {
                    debug!(primary = %id, "exact pair already stored");
                    primary_id = Some(id);
                }
                ReconcileAction::CreateSecondary { primary_id: id } => {
                    let created =
                        tx.create_contact(email, phone, LinkPrecedence::Secondary, Some(id))?;
                    info!(id = %created.id, primary = %id, "created secondary contact");
                    primary_id = Some(id);
                }
                ReconcileAction::MergeClusters {
                    surviving_primary_id,
                    demoted_primary_id,
                } => {
                    merge_clusters(tx.as_mut(), surviving_primary_id, demoted_primary_id)?;
                    primary_id = Some(surviving_primary_id);
                }
            }
        }
        let primary_id = primary_id.ok_or_else(|| {
            ExecutionError::Storage(StorageError::Backend(
                "reconciliation produced no actions".to_string(),
            ))
        })?;

        // Re-read inside the transaction so the view reflects every
        // mutation this request made.
        let primary = tx
            .get(primary_id)?
            .ok_or(ExecutionError::PrimaryNotFound { id: primary_id })?;
        let secondaries = tx.find_secondaries_of(primary_id)?;
        let view = build_view(&primary, &secondaries);

        tx.commit()?;
        info!(primary = %view.primary_contact_id, "identify request reconciled");
        Ok(view)
    }
}

/// Fetches the cluster primary for every matched contact.
///
/// A matched primary stands for itself; a matched secondary's primary is
/// fetched by id (its cluster head may not have matched the query).
fn resolve_primaries(
    tx: &dyn ContactTx,
    matched: &[Contact],
) -> Result<BTreeMap<ContactId, Contact>, ExecutionError> {
    let mut primaries = BTreeMap::new();
    for contact in matched {
        let primary_id = contact.primary_id();
        if primaries.contains_key(&primary_id) {
            continue;
        }
        let primary = if contact.id == primary_id {
            contact.clone()
        } else {
            tx.get(primary_id)?
                .ok_or(ExecutionError::PrimaryNotFound { id: primary_id })?
        };
        primaries.insert(primary_id, primary);
    }
    Ok(primaries)
}

/// Realizes one `MergeClusters` decision.
///
/// Re-links every contact of the losing cluster to the survivor, then
/// demotes the loser itself. Links are always flattened: after this runs no
/// secondary points at the demoted primary.
fn merge_clusters(
    tx: &mut dyn ContactTx,
    surviving: ContactId,
    demoted: ContactId,
) -> Result<(), ExecutionError> {
    let adopted = tx.find_secondaries_of(demoted)?;
    for secondary in &adopted {
        tx.update_precedence_and_link(secondary.id, LinkPrecedence::Secondary, Some(surviving))?;
    }
    tx.update_precedence_and_link(demoted, LinkPrecedence::Secondary, Some(surviving))
        .map_err(|err| match err {
            StorageError::ContactNotFound(id) => ExecutionError::PrimaryNotFound { id },
            other => ExecutionError::Storage(other),
        })?;
    info!(
        surviving = %surviving,
        demoted = %demoted,
        relinked = adopted.len(),
        "merged identity clusters"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryContactStore;

    fn engine_with_store() -> (ReconcileEngine, Arc<InMemoryContactStore>) {
        let store = Arc::new(InMemoryContactStore::new());
        (ReconcileEngine::new(store.clone()), store)
    }

    fn identify(engine: &ReconcileEngine, email: Option<&str>, phone: Option<&str>) -> IdentityView {
        engine.identify(&IdentifyRequest::new(email, phone)).unwrap()
    }

    #[test]
    fn test_empty_submission_never_reaches_store() {
        let (engine, store) = engine_with_store();
        let err = engine
            .identify(&IdentifyRequest::new(Some(" "), None))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.dump().unwrap().is_empty());
    }

    #[test]
    fn test_fresh_submission_creates_primary() {
        let (engine, store) = engine_with_store();
        let view = identify(&engine, Some("a@x.com"), Some("111"));
        assert_eq!(view.primary_contact_id, ContactId::from_raw(1));
        assert_eq!(view.emails, vec!["a@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111"]);
        assert!(view.secondary_contact_ids.is_empty());
        assert_eq!(store.dump().unwrap().len(), 1);
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let (engine, store) = engine_with_store();
        let first = identify(&engine, Some("a@x.com"), Some("111"));
        let second = identify(&engine, Some("a@x.com"), Some("111"));
        assert_eq!(first.primary_contact_id, second.primary_contact_id);
        assert_eq!(store.dump().unwrap().len(), 1);
    }

    #[test]
    fn test_overlap_creates_linked_secondary() {
        let (engine, _) = engine_with_store();
        identify(&engine, Some("a@x.com"), Some("111"));
        let view = identify(&engine, Some("a@x.com"), Some("222"));

        assert_eq!(view.primary_contact_id, ContactId::from_raw(1));
        assert_eq!(view.secondary_contact_ids, vec![ContactId::from_raw(2)]);
        assert_eq!(view.phone_numbers, vec!["111", "222"]);
    }

    #[test]
    fn test_dangling_secondary_link_is_retryable() {
        let (engine, store) = engine_with_store();
        store
            .insert(Contact::new_secondary(
                2.into(),
                Some("a@x.com".into()),
                None,
                9.into(),
            ))
            .unwrap();

        let err = engine
            .identify(&IdentifyRequest::new(Some("a@x.com"), None))
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_failed_request_persists_nothing() {
        let (engine, store) = engine_with_store();
        identify(&engine, Some("a@x.com"), Some("111"));
        store
            .insert(Contact::new_secondary(
                7.into(),
                None,
                Some("999".into()),
                42.into(),
            ))
            .unwrap();

        // Bridges the healthy cluster and the dangling one; must fail and
        // leave the healthy cluster untouched.
        let err = engine
            .identify(&IdentifyRequest::new(Some("a@x.com"), Some("999")))
            .unwrap_err();
        assert!(err.is_retryable());

        let contacts = store.dump().unwrap();
        assert_eq!(contacts.len(), 2);
        let primary = contacts.iter().find(|c| c.id == 1.into()).unwrap();
        assert!(primary.is_primary());
    }
}

//! In-memory storage backend.
//!
//! Thread-safe reference implementation of the storage traits, intended for
//! embedded usage and tests. A transaction holds the state mutex for its
//! whole lifetime, which gives reconciliation requests the serializable
//! isolation the engine requires; an undo snapshot taken at begin makes
//! drop-without-commit roll every write back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::contact::{Contact, ContactId, LinkPrecedence};
use crate::storage::traits::{ContactStore, ContactTx, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

fn normalize_field(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

#[derive(Debug, Clone, Default)]
struct ContactState {
    contacts: BTreeMap<ContactId, Contact>,
    by_email: HashMap<String, BTreeSet<ContactId>>,
    by_phone: HashMap<String, BTreeSet<ContactId>>,
    next_id: u64,
}

impl ContactState {
    fn index(&mut self, contact: &Contact) {
        if let Some(email) = &contact.email {
            self.by_email.entry(email.clone()).or_default().insert(contact.id);
        }
        if let Some(phone) = &contact.phone {
            self.by_phone.entry(phone.clone()).or_default().insert(contact.id);
        }
    }

    fn live(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id).filter(|c| !c.is_deleted())
    }
}

/// In-memory [`ContactStore`].
///
/// # Examples
///
/// ```
/// use idweld::storage::{ContactStore, InMemoryContactStore};
/// use idweld::LinkPrecedence;
///
/// let store = InMemoryContactStore::new();
/// let mut tx = store.transaction().unwrap();
/// let created = tx
///     .create_contact(Some("a@x.com"), None, LinkPrecedence::Primary, None)
///     .unwrap();
/// tx.commit().unwrap();
/// assert_eq!(created.id, 1.into());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    state: Mutex<ContactState>,
}

impl InMemoryContactStore {
    /// Creates an empty store. Ids are assigned from 1 upward.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fully formed contact, bypassing id assignment.
    ///
    /// Intended for tests and data import: the caller controls id,
    /// timestamps and link fields. The id sequence advances past the seeded
    /// id so later creates never collide.
    ///
    /// # Errors
    /// [`StorageError::Backend`] if the id is already taken.
    pub fn insert(&self, contact: Contact) -> Result<(), StorageError> {
        let mut state = self.state.lock().map_err(|_| lock_err("contact state"))?;
        if state.contacts.contains_key(&contact.id) {
            return Err(StorageError::Backend(format!(
                "duplicate contact id: {}",
                contact.id
            )));
        }
        state.next_id = state.next_id.max(contact.id.as_u64());
        state.index(&contact);
        state.contacts.insert(contact.id, contact);
        Ok(())
    }

    /// Snapshot of every live contact, ascending by id. Test support.
    pub fn dump(&self) -> Result<Vec<Contact>, StorageError> {
        let state = self.state.lock().map_err(|_| lock_err("contact state"))?;
        Ok(state
            .contacts
            .values()
            .filter(|c| !c.is_deleted())
            .cloned()
            .collect())
    }
}

impl ContactStore for InMemoryContactStore {
    fn transaction(&self) -> Result<Box<dyn ContactTx + '_>, StorageError> {
        let guard = self.state.lock().map_err(|_| lock_err("contact state"))?;
        let undo = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            undo: Some(undo),
        }))
    }
}

/// Transaction over [`InMemoryContactStore`].
///
/// Holds the state mutex until commit or drop, serializing concurrent
/// reconciliations.
struct MemoryTx<'a> {
    guard: MutexGuard<'a, ContactState>,
    // Present until commit; restored on drop to roll back.
    undo: Option<ContactState>,
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            *self.guard = undo;
        }
    }
}

impl ContactTx for MemoryTx<'_> {
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StorageError> {
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        let phone = phone.map(str::trim).filter(|s| !s.is_empty());
        if email.is_none() && phone.is_none() {
            return Err(StorageError::InvalidQuery(
                "find_by_email_or_phone requires an email or a phone number".to_string(),
            ));
        }

        let mut ids = BTreeSet::new();
        if let Some(set) = email.and_then(|e| self.guard.by_email.get(e)) {
            ids.extend(set.iter().copied());
        }
        if let Some(set) = phone.and_then(|p| self.guard.by_phone.get(p)) {
            ids.extend(set.iter().copied());
        }

        Ok(ids
            .into_iter()
            .filter_map(|id| self.guard.live(id).cloned())
            .collect())
    }

    fn find_secondaries_of(&self, primary_id: ContactId) -> Result<Vec<Contact>, StorageError> {
        Ok(self
            .guard
            .contacts
            .values()
            .filter(|c| !c.is_deleted() && c.linked_id == Some(primary_id))
            .cloned()
            .collect())
    }

    fn get(&self, id: ContactId) -> Result<Option<Contact>, StorageError> {
        Ok(self.guard.live(id).cloned())
    }

    fn create_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, StorageError> {
        match (precedence, linked_id) {
            (LinkPrecedence::Primary, Some(_)) => {
                return Err(StorageError::Backend(
                    "primary contact must not carry a linked_id".to_string(),
                ));
            }
            (LinkPrecedence::Secondary, None) => {
                return Err(StorageError::Backend(
                    "secondary contact requires a linked_id".to_string(),
                ));
            }
            _ => {}
        }

        let email = normalize_field(email);
        let phone = normalize_field(phone);
        let id = ContactId::from_raw(self.guard.next_id + 1);
        self.guard.next_id = id.as_u64();

        let contact = match linked_id {
            Some(primary_id) => Contact::new_secondary(id, email, phone, primary_id),
            None => Contact::new_primary(id, email, phone),
        };
        self.guard.index(&contact);
        self.guard.contacts.insert(id, contact.clone());
        Ok(contact)
    }

    fn update_precedence_and_link(
        &mut self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<(), StorageError> {
        let contact = self
            .guard
            .contacts
            .get_mut(&id)
            .filter(|c| !c.is_deleted())
            .ok_or(StorageError::ContactNotFound(id))?;
        contact.precedence = precedence;
        contact.linked_id = linked_id;
        contact.updated_at = Utc::now();
        Ok(())
    }

    fn soft_delete(&mut self, id: ContactId) -> Result<(), StorageError> {
        let contact = self
            .guard
            .contacts
            .get_mut(&id)
            .filter(|c| !c.is_deleted())
            .ok_or(StorageError::ContactNotFound(id))?;
        let now = Utc::now();
        contact.deleted_at = Some(now);
        contact.updated_at = now;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        self.undo = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(
        tx: &mut dyn ContactTx,
        email: Option<&str>,
        phone: Option<&str>,
        linked: Option<ContactId>,
    ) -> Contact {
        let precedence = if linked.is_some() {
            LinkPrecedence::Secondary
        } else {
            LinkPrecedence::Primary
        };
        tx.create_contact(email, phone, precedence, linked).unwrap()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = InMemoryContactStore::new();
        let mut tx = store.transaction().unwrap();
        let a = create(tx.as_mut(), Some("a@x.com"), None, None);
        let b = create(tx.as_mut(), None, Some("111"), None);
        assert_eq!(a.id, ContactId::from_raw(1));
        assert_eq!(b.id, ContactId::from_raw(2));
        tx.commit().unwrap();
    }

    #[test]
    fn test_or_match_covers_both_fields() {
        let store = InMemoryContactStore::new();
        let mut tx = store.transaction().unwrap();
        create(tx.as_mut(), Some("a@x.com"), Some("111"), None);
        create(tx.as_mut(), Some("b@x.com"), Some("222"), None);

        let hits = tx.find_by_email_or_phone(Some("a@x.com"), Some("222")).unwrap();
        assert_eq!(hits.len(), 2);

        let hits = tx.find_by_email_or_phone(None, Some("222")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].email.as_deref(), Some("b@x.com"));
    }

    #[test]
    fn test_query_without_keys_is_rejected() {
        let store = InMemoryContactStore::new();
        let tx = store.transaction().unwrap();
        let err = tx.find_by_email_or_phone(None, Some("  ")).unwrap_err();
        assert!(matches!(err, StorageError::InvalidQuery(_)));
    }

    #[test]
    fn test_soft_deleted_contacts_do_not_match() {
        let store = InMemoryContactStore::new();
        let mut tx = store.transaction().unwrap();
        let a = create(tx.as_mut(), Some("a@x.com"), None, None);
        tx.soft_delete(a.id).unwrap();

        assert!(tx.find_by_email_or_phone(Some("a@x.com"), None).unwrap().is_empty());
        assert!(tx.get(a.id).unwrap().is_none());
        assert!(matches!(
            tx.soft_delete(a.id),
            Err(StorageError::ContactNotFound(_))
        ));
        tx.commit().unwrap();
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let store = InMemoryContactStore::new();
        {
            let mut tx = store.transaction().unwrap();
            create(tx.as_mut(), Some("a@x.com"), None, None);
            // dropped uncommitted
        }
        let tx = store.transaction().unwrap();
        assert!(tx.find_by_email_or_phone(Some("a@x.com"), None).unwrap().is_empty());
    }

    #[test]
    fn test_commit_publishes_writes() {
        let store = InMemoryContactStore::new();
        let mut tx = store.transaction().unwrap();
        create(tx.as_mut(), Some("a@x.com"), None, None);
        tx.commit().unwrap();

        let tx = store.transaction().unwrap();
        assert_eq!(tx.find_by_email_or_phone(Some("a@x.com"), None).unwrap().len(), 1);
    }

    #[test]
    fn test_update_precedence_and_link_relinks() {
        let store = InMemoryContactStore::new();
        let mut tx = store.transaction().unwrap();
        let p1 = create(tx.as_mut(), Some("a@x.com"), None, None);
        let p2 = create(tx.as_mut(), None, Some("111"), None);
        tx.update_precedence_and_link(p2.id, LinkPrecedence::Secondary, Some(p1.id))
            .unwrap();

        let got = tx.get(p2.id).unwrap().unwrap();
        assert_eq!(got.precedence, LinkPrecedence::Secondary);
        assert_eq!(got.linked_id, Some(p1.id));
        assert!(got.updated_at >= got.created_at);

        let secondaries = tx.find_secondaries_of(p1.id).unwrap();
        assert_eq!(secondaries.len(), 1);
        assert_eq!(secondaries[0].id, p2.id);
    }

    #[test]
    fn test_seeded_contacts_do_not_collide_with_sequence() {
        let store = InMemoryContactStore::new();
        store
            .insert(Contact::new_primary(5.into(), Some("a@x.com".into()), None))
            .unwrap();

        let mut tx = store.transaction().unwrap();
        let created = create(tx.as_mut(), Some("b@x.com"), None, None);
        assert_eq!(created.id, ContactId::from_raw(6));
        tx.commit().unwrap();

        assert!(store
            .insert(Contact::new_primary(5.into(), None, Some("9".into())))
            .is_err());
    }
}

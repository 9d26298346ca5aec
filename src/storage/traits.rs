//! Abstract storage traits for contact records.
//!
//! These traits define the contract a backend must implement for the
//! reconciliation engine. By using traits, we enable:
//! - In-memory backends for testing and embedded use
//! - Database-backed backends for production
//!
//! A reconciliation request never talks to the store directly; it opens a
//! [`ContactTx`] and performs its whole read-decide-write sequence inside
//! it. The transaction is the isolation and atomicity boundary required by
//! the algorithm: two requests matching overlapping records must not
//! interleave, and a failed request must leave no partial cluster mutation
//! behind.

use thiserror::Error;

use crate::contact::{Contact, ContactId, LinkPrecedence};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Contact not found (or soft-deleted).
    #[error("contact not found: {0}")]
    ContactNotFound(ContactId),

    /// A query was issued with no usable key.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Handle to a contact store.
///
/// The only operation is opening a transaction; everything else happens on
/// the [`ContactTx`] it yields. Implementations must be safe to share across
/// threads.
pub trait ContactStore: Send + Sync {
    /// Opens an isolated read-write transaction.
    ///
    /// The transaction must provide at least serializable isolation with
    /// respect to other transactions from the same store: no other request's
    /// writes become visible mid-transaction and this transaction's writes
    /// stay invisible until [`ContactTx::commit`].
    fn transaction(&self) -> Result<Box<dyn ContactTx + '_>, StorageError>;
}

/// One reconciliation request's isolated session against the store.
///
/// Dropping a transaction without calling [`ContactTx::commit`] discards
/// every write made through it.
pub trait ContactTx {
    /// Non-deleted contacts whose email OR phone matches the given values.
    ///
    /// Either input may be absent but not both. Results are ordered by
    /// ascending id.
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StorageError>;

    /// Non-deleted secondaries linked to `primary_id`, ascending by id.
    fn find_secondaries_of(&self, primary_id: ContactId) -> Result<Vec<Contact>, StorageError>;

    /// Fetch a single non-deleted contact.
    fn get(&self, id: ContactId) -> Result<Option<Contact>, StorageError>;

    /// Create a contact, assigning its id and timestamps.
    fn create_contact(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<Contact, StorageError>;

    /// Rewrite a contact's precedence and link, bumping `updated_at`.
    ///
    /// # Errors
    /// [`StorageError::ContactNotFound`] if the contact is missing or
    /// soft-deleted.
    fn update_precedence_and_link(
        &mut self,
        id: ContactId,
        precedence: LinkPrecedence,
        linked_id: Option<ContactId>,
    ) -> Result<(), StorageError>;

    /// Soft-delete a contact, excluding it from all future queries.
    fn soft_delete(&mut self, id: ContactId) -> Result<(), StorageError>;

    /// Publish every write made through this transaction.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_store_object_safe(_: &dyn ContactStore) {}
    fn _assert_tx_object_safe(_: &dyn ContactTx) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ContactNotFound(ContactId::from_raw(3));
        assert!(err.to_string().contains("contact not found: 3"));

        let err = StorageError::Backend("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}

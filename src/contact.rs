//! Contact records and link precedence.
//!
//! A `Contact` is the only persisted entity. Contacts sharing an email or
//! phone number are clustered under one PRIMARY record; every other record
//! in the cluster is a SECONDARY alias pointing directly at that primary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable contact identifier.
///
/// Ids are assigned by the store from a monotone sequence, so ordering by id
/// is ordering by insertion. The reconciliation algorithm relies on this for
/// deterministic tie-breaking and for the ascending-id orderings in the
/// identity view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ContactId(u64);

impl ContactId {
    /// Creates a contact ID from a raw sequence number.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ContactId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ContactId> for u64 {
    fn from(id: ContactId) -> Self {
        id.0
    }
}

/// Whether a contact is the canonical record of its cluster or an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    /// Canonical identity record for a cluster.
    Primary,
    /// Alias record linked to exactly one primary.
    Secondary,
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// One persisted contact record.
///
/// Invariants maintained by the store and the merge path:
/// - `linked_id` is `Some` iff `precedence` is [`LinkPrecedence::Secondary`],
///   and it always names a primary record (links are flattened on merge,
///   never chained).
/// - `id` and `created_at` never change after creation.
///
/// # Examples
///
/// ```
/// use idweld::Contact;
///
/// let contact = Contact::new_primary(1.into(), Some("a@x.com".into()), None);
/// assert!(contact.is_primary());
/// assert_eq!(contact.primary_id(), 1.into());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique identifier, immutable once assigned.
    pub id: ContactId,

    /// Email address, if one was submitted for this record.
    pub email: Option<String>,

    /// Phone number, if one was submitted for this record.
    pub phone: Option<String>,

    /// Primary this record aliases; `None` for primaries.
    pub linked_id: Option<ContactId>,

    /// Primary or secondary.
    pub precedence: LinkPrecedence,

    /// Creation time; the tie-break key when electing a surviving primary.
    pub created_at: DateTime<Utc>,

    /// Last mutation time (precedence/link changes, soft delete).
    pub updated_at: DateTime<Utc>,

    /// Soft-deletion marker; deleted contacts never match queries.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Creates a primary contact with the current time as `created_at`.
    #[must_use]
    pub fn new_primary(id: ContactId, email: Option<String>, phone: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            phone,
            linked_id: None,
            precedence: LinkPrecedence::Primary,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Creates a secondary contact linked to `primary_id`.
    #[must_use]
    pub fn new_secondary(
        id: ContactId,
        email: Option<String>,
        phone: Option<String>,
        primary_id: ContactId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            phone,
            linked_id: Some(primary_id),
            precedence: LinkPrecedence::Secondary,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true if this contact is its cluster's canonical record.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.precedence == LinkPrecedence::Primary
    }

    /// Returns true if this contact has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Resolves this contact to its cluster's primary id.
    ///
    /// One hop at most: a primary resolves to itself, a secondary resolves
    /// via `linked_id`. Chains cannot occur because merges flatten links.
    #[must_use]
    pub fn primary_id(&self) -> ContactId {
        self.linked_id.unwrap_or(self.id)
    }

    /// Exact (email, phone) pair equality.
    ///
    /// An absent field matches only an absent field, so resubmitting a
    /// previously seen single-field pair is recognized as already stored.
    #[must_use]
    pub fn matches_pair(&self, email: Option<&str>, phone: Option<&str>) -> bool {
        self.email.as_deref() == email && self.phone.as_deref() == phone
    }
}

//! Request and response types for an identify call.
//!
//! These are the transport-agnostic shapes the engine exchanges with its
//! caller. Field names serialize in the wire form callers expect
//! (`phoneNumber`, `primaryContactId`, ...).

use serde::{Deserialize, Serialize};

use crate::contact::ContactId;
use crate::error::ValidationError;

/// An incoming (email, phone) submission.
///
/// At least one field must carry a non-blank value; blank strings are
/// normalized to `None` before the engine sees them.
///
/// # Examples
///
/// ```
/// use idweld::IdentifyRequest;
///
/// let req = IdentifyRequest::new(Some("a@x.com"), None);
/// assert!(req.validate().is_ok());
/// assert!(IdentifyRequest::new(None, Some("  ")).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    /// Email address, if submitted.
    #[serde(default)]
    pub email: Option<String>,

    /// Phone number, if submitted.
    #[serde(default)]
    pub phone_number: Option<String>,
}

fn normalize(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

impl IdentifyRequest {
    /// Creates a request, trimming fields and dropping blanks.
    #[must_use]
    pub fn new(email: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            email: normalize(email),
            phone_number: normalize(phone_number),
        }
    }

    /// Rejects a submission carrying neither identifier.
    ///
    /// This runs at the boundary: on failure the engine is never invoked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let email = self.email.as_deref().map(str::trim).unwrap_or_default();
        let phone = self
            .phone_number
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if email.is_empty() && phone.is_empty() {
            return Err(ValidationError::MissingIdentifier);
        }
        Ok(())
    }

    /// Email, trimmed, `None` when blank.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Phone number, trimmed, `None` when blank.
    #[must_use]
    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Aggregated view of one identity cluster.
///
/// Built after all mutations for a request have been applied, so it always
/// reflects the post-merge cluster including any contact created by the
/// request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    /// Id of the cluster's canonical record.
    pub primary_contact_id: ContactId,

    /// Primary's email first, then distinct secondary emails by ascending id.
    pub emails: Vec<String>,

    /// Primary's phone first, then distinct secondary phones by ascending id.
    pub phone_numbers: Vec<String>,

    /// Ids of all current secondaries, ascending.
    pub secondary_contact_ids: Vec<ContactId>,
}

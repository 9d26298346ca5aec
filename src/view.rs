//! Aggregated identity view construction.
//!
//! Turns the final cluster (post-merge, including any contact the request
//! just created) into the response shape: canonical id, every distinct
//! email and phone number, and the secondary ids.

use std::collections::HashSet;

use crate::contact::Contact;
use crate::identify::IdentityView;

/// Builds the identity view for a cluster.
///
/// Ordering is fixed: the primary's value first (when present), then each
/// distinct secondary value in ascending id order. Duplicates are dropped,
/// absent values skipped. `secondaries` may arrive in any order; it is
/// sorted here.
#[must_use]
pub fn build_view(primary: &Contact, secondaries: &[Contact]) -> IdentityView {
    let mut ordered: Vec<&Contact> = secondaries.iter().collect();
    ordered.sort_by_key(|c| c.id);

    let mut emails = Vec::new();
    let mut seen_emails = HashSet::new();
    let mut phone_numbers = Vec::new();
    let mut seen_phones = HashSet::new();

    for contact in std::iter::once(primary).chain(ordered.iter().copied()) {
        if let Some(email) = &contact.email {
            if seen_emails.insert(email.clone()) {
                emails.push(email.clone());
            }
        }
        if let Some(phone) = &contact.phone {
            if seen_phones.insert(phone.clone()) {
                phone_numbers.push(phone.clone());
            }
        }
    }

    IdentityView {
        primary_contact_id: primary.id,
        emails,
        phone_numbers,
        secondary_contact_ids: ordered.iter().map(|c| c.id).collect(),
    }
}

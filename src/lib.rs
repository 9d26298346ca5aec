//! # idweld - Contact Identity Reconciliation
//!
//! idweld resolves customer identity across contact records submitted over
//! time. Each submission is an (email, phone) pair; records that share
//! either value belong to the same real-world customer and are clustered
//! under one canonical PRIMARY contact with zero or more SECONDARY aliases.
//!
//! ## Core Concepts
//!
//! - **Contact**: one persisted record with optional email and phone
//! - **Cluster**: one primary plus every secondary linked to it
//! - **Merge**: demoting the younger of two primaries when a submission
//!   bridges their clusters
//! - **IdentityView**: the aggregated response (primary id, all emails, all
//!   phone numbers, secondary ids)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use idweld::{IdentifyRequest, ReconcileEngine};
//! use idweld::storage::InMemoryContactStore;
//!
//! let engine = ReconcileEngine::new(Arc::new(InMemoryContactStore::new()));
//!
//! engine.identify(&IdentifyRequest::new(Some("doc@flux.io"), Some("717171"))).unwrap();
//! let view = engine
//!     .identify(&IdentifyRequest::new(Some("doc@flux.io"), Some("919191")))
//!     .unwrap();
//!
//! assert_eq!(view.phone_numbers, vec!["717171", "919191"]);
//! assert_eq!(view.secondary_contact_ids.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod contact;
pub mod engine;
pub mod error;
pub mod identify;
pub mod matcher;
pub mod storage;
pub mod view;

// Re-export primary types at crate root for convenience
pub use contact::{Contact, ContactId, LinkPrecedence};
pub use engine::ReconcileEngine;
pub use error::{ExecutionError, IdweldError, IdweldResult, ValidationError};
pub use identify::{IdentifyRequest, IdentityView};
pub use matcher::ReconcileAction;
pub use view::build_view;

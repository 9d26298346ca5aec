//! Storage abstraction and backends.
//!
//! The engine only depends on [`ContactStore`] / [`ContactTx`];
//! [`InMemoryContactStore`] is the reference backend.

mod memory;
mod traits;

pub use memory::InMemoryContactStore;
pub use traits::{ContactStore, ContactTx, StorageError};

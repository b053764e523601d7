//! Document-store contract and in-memory backend for Tally.
//!
//! The engine talks to storage through the async repository traits in
//! [`repo`]. Backends assign write timestamps and entry sequence numbers and
//! provide two atomic multi-document primitives: transfer-pair insert and
//! ledger-entry batch append. [`MemoryStore`] is the reference
//! implementation of the contract and the test backend. [`LockRegistry`]
//! provides the per-key write serialization the engine layers on top.

pub mod error;
pub mod locks;
pub mod memory;
pub mod repo;

pub use error::StoreError;
pub use locks::LockRegistry;
pub use memory::MemoryStore;
pub use repo::{
    AccountRepo, EntryDraft, LedgerEntryRepo, LedgerRepo, Store, TransactionDraft, TransactionRepo,
};

//! Shared type definitions.

pub mod id;

pub use id::{AccountId, EntryId, LedgerId, TransactionId};

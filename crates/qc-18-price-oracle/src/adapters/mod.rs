//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the outbound ports for tests and standalone nodes.

mod kv_store;
mod sources;

pub use kv_store::{FileBackedKVStore, InMemoryKVStore};
pub use sources::{StaticParamsSource, StaticValidatorSource};

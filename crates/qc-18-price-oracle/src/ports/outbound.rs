//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Interfaces the host implements for the oracle.

use crate::domain::{Params, ValidatorPowers};
use crate::error::{KVStoreError, OracleResult};

/// Byte-addressable durable store used by the checkpoint cache.
///
/// Production: the host's state database.
/// Testing: `InMemoryKVStore` (adapters/kv_store.rs)
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Apply every operation or none of them.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

/// Current validator power table
///
/// Read once on a fresh start. Later changes arrive through
/// `OracleApi::update_validators`.
pub trait ValidatorPowerSource: Send + Sync {
    fn current_validators(&self) -> OracleResult<ValidatorPowers>;
}

/// Current consensus params
pub trait ParamsSource: Send + Sync {
    fn current_params(&self) -> OracleResult<Params>;
}

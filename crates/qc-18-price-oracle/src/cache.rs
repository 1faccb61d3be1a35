//! # Checkpoint Cache
//!
//! Buffers everything a block changed (accepted submissions, validator and
//! params replacements, forced seals) and flushes it to the durable store
//! once, at block end. Recovery reads the retained window back as a
//! [`CheckpointHistory`] and replays it.
//!
//! ## Layout
//!
//! ```text
//! {prefix}checkpoint/height     → last committed height (u64, big-endian)
//! {prefix}msgs/{h:be}           → Vec<MessageRecord>
//! {prefix}validators/{h:be}     → ValidatorPowers in effect after block h
//! {prefix}params/{h:be}         → Params in effect after block h
//! {prefix}seals/{h:be}          → block h ended with a forced seal
//! ```
//!
//! Retention keeps messages of the last `max_nonce + extra_retention` blocks,
//! plus the newest table entries in effect at the start of that window.

use crate::domain::{Params, PriceSubmission, ValidatorPowers};
use crate::error::{CacheError, KVStoreError};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const HEIGHT_KEY: &[u8] = b"checkpoint/height";
const MSGS: &[u8] = b"msgs/";
const VALIDATORS: &[u8] = b"validators/";
const PARAMS: &[u8] = b"params/";
const SEALS: &[u8] = b"seals/";

/// An accepted submission, normalized, with its execution height
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub height: u64,
    pub submission: PriceSubmission,
}

/// Committed history read back from the store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckpointHistory {
    pub last_height: Option<u64>,
    pub messages: BTreeMap<u64, Vec<MessageRecord>>,
    pub validators: BTreeMap<u64, ValidatorPowers>,
    pub params: BTreeMap<u64, Params>,
    pub forced_seals: BTreeSet<u64>,
}

impl CheckpointHistory {
    /// Validator table in effect during block `height`
    pub fn validators_before(&self, height: u64) -> Option<&ValidatorPowers> {
        self.validators.range(..height).next_back().map(|(_, v)| v)
    }

    /// Params in effect during block `height`
    pub fn params_before(&self, height: u64) -> Option<&Params> {
        self.params.range(..height).next_back().map(|(_, p)| p)
    }

    pub fn message_count(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }
}

/// Result of a commit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub height: u64,
    pub messages: usize,
    pub pruned: usize,
}

/// Per-process write buffer in front of the durable store
#[derive(Debug)]
pub struct CheckpointCache {
    prefix: Vec<u8>,
    extra_retention: u64,
    last_committed: Option<u64>,
    messages: Vec<MessageRecord>,
    validators: Option<ValidatorPowers>,
    params: Option<Params>,
    forced_seal: bool,
}

impl CheckpointCache {
    pub fn new(prefix: impl Into<Vec<u8>>, extra_retention: u64) -> Self {
        Self {
            prefix: prefix.into(),
            extra_retention,
            last_committed: None,
            messages: Vec::new(),
            validators: None,
            params: None,
            forced_seal: false,
        }
    }

    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.messages.is_empty()
            || self.validators.is_some()
            || self.params.is_some()
            || self.forced_seal
    }

    pub fn record_message(&mut self, height: u64, submission: PriceSubmission) {
        self.messages.push(MessageRecord { height, submission });
    }

    pub fn record_validators(&mut self, validators: ValidatorPowers) {
        self.validators = Some(validators);
    }

    pub fn record_params(&mut self, params: Params) {
        self.params = Some(params);
    }

    pub fn record_forced_seal(&mut self) {
        self.forced_seal = true;
    }

    fn key(&self, kind: &[u8], height: Option<u64>) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + kind.len() + 8);
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(kind);
        if let Some(height) = height {
            key.extend_from_slice(&height.to_be_bytes());
        }
        key
    }

    /// Entries of one kind as `(height, raw value)`, ascending
    fn scan<S: KeyValueStore>(
        &self,
        store: &S,
        kind: &[u8],
    ) -> Result<Vec<(u64, Vec<u8>)>, CacheError> {
        let prefix = self.key(kind, None);
        store
            .prefix_scan(&prefix)?
            .into_iter()
            .map(|(key, value)| {
                let height = key[prefix.len()..]
                    .try_into()
                    .map(u64::from_be_bytes)
                    .map_err(|_| KVStoreError::Corrupted {
                        key: hex::encode(&key),
                    })?;
                Ok((height, value))
            })
            .collect()
    }

    /// Persist the tables a fresh start runs with, keyed at `height`.
    ///
    /// Recovery needs the tables in effect before the first committed block.
    pub fn write_baseline<S: KeyValueStore>(
        &self,
        store: &mut S,
        height: u64,
        params: &Params,
        validators: &ValidatorPowers,
    ) -> Result<(), CacheError> {
        store.atomic_batch_write(vec![
            BatchOperation::put(self.key(PARAMS, Some(height)), encode(params)?),
            BatchOperation::put(self.key(VALIDATORS, Some(height)), encode(validators)?),
        ])?;
        debug!(height, "[qc-18] Baseline tables written");
        Ok(())
    }

    /// Flush the buffer for block `height` in one atomic batch and prune
    /// entries that left the retention window.
    ///
    /// On error the buffer is kept.
    pub fn commit<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        height: u64,
        max_nonce: u32,
    ) -> Result<CommitSummary, CacheError> {
        if let Some(last) = self.last_committed {
            if height <= last {
                return Err(CacheError::AlreadyCommitted {
                    height,
                    last_committed: last,
                });
            }
        }
        if let Some(stray) = self.messages.iter().find(|m| m.height != height) {
            return Err(CacheError::HeightMismatch {
                expected: height,
                found: stray.height,
            });
        }

        let mut ops = vec![BatchOperation::put(
            self.key(HEIGHT_KEY, None),
            height.to_be_bytes().to_vec(),
        )];
        if !self.messages.is_empty() {
            ops.push(BatchOperation::put(
                self.key(MSGS, Some(height)),
                encode(&self.messages)?,
            ));
        }
        if let Some(validators) = &self.validators {
            ops.push(BatchOperation::put(
                self.key(VALIDATORS, Some(height)),
                encode(validators)?,
            ));
        }
        if let Some(params) = &self.params {
            ops.push(BatchOperation::put(
                self.key(PARAMS, Some(height)),
                encode(params)?,
            ));
        }
        if self.forced_seal {
            ops.push(BatchOperation::put(self.key(SEALS, Some(height)), vec![1u8]));
        }

        let window_start = height
            .saturating_add(1)
            .saturating_sub(max_nonce as u64 + self.extra_retention);
        let mut pruned = 0;
        for kind in [MSGS, SEALS] {
            for (h, _) in self.scan(store, kind)? {
                if h < window_start {
                    ops.push(BatchOperation::delete(self.key(kind, Some(h))));
                    pruned += 1;
                }
            }
        }
        for kind in [VALIDATORS, PARAMS] {
            let heights: Vec<u64> = self.scan(store, kind)?.into_iter().map(|(h, _)| h).collect();
            // Keep the newest entry in effect at the window start
            if let Some(&keep) = heights.iter().filter(|h| **h < window_start).last() {
                for &h in heights.iter().filter(|h| **h < keep) {
                    ops.push(BatchOperation::delete(self.key(kind, Some(h))));
                    pruned += 1;
                }
            }
        }

        store.atomic_batch_write(ops)?;

        let summary = CommitSummary {
            height,
            messages: self.messages.len(),
            pruned,
        };
        self.last_committed = Some(height);
        self.messages.clear();
        self.validators = None;
        self.params = None;
        self.forced_seal = false;

        info!(
            height,
            messages = summary.messages,
            pruned,
            "[qc-18] Checkpoint committed"
        );
        Ok(summary)
    }

    /// Read the retained history. Also restores the last committed height.
    pub fn load<S: KeyValueStore>(&mut self, store: &S) -> Result<CheckpointHistory, CacheError> {
        let last_height = match store.get(&self.key(HEIGHT_KEY, None))? {
            Some(raw) => Some(
                raw.as_slice()
                    .try_into()
                    .map(u64::from_be_bytes)
                    .map_err(|_| KVStoreError::Corrupted {
                        key: String::from_utf8_lossy(HEIGHT_KEY).into_owned(),
                    })?,
            ),
            None => None,
        };

        let mut history = CheckpointHistory {
            last_height,
            ..CheckpointHistory::default()
        };
        for (h, raw) in self.scan(store, MSGS)? {
            history.messages.insert(h, decode(&raw)?);
        }
        for (h, raw) in self.scan(store, VALIDATORS)? {
            history.validators.insert(h, decode(&raw)?);
        }
        for (h, raw) in self.scan(store, PARAMS)? {
            history.params.insert(h, decode(&raw)?);
        }
        for (h, _) in self.scan(store, SEALS)? {
            history.forced_seals.insert(h);
        }

        self.last_committed = last_height;
        debug!(
            last_height = ?last_height,
            messages = history.message_count(),
            "[qc-18] Checkpoint history loaded"
        );
        Ok(history)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    bincode::serialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, CacheError> {
    bincode::deserialize(raw).map_err(|e| CacheError::Serialization(e.to_string()))
}

//! Oracle service configuration

use std::env;

/// Price Oracle configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleConfig {
    /// Key prefix of every checkpoint entry in the durable store
    pub store_prefix: String,
    /// Blocks of messages kept beyond the `max_nonce` replay window
    pub extra_retention_blocks: u64,
    /// Keep one speculative branch for all checks between two block ends.
    /// When false, every check runs on a fresh copy of the committed state.
    pub reuse_speculative_branch: bool,
    /// Seal every open round at the block end after a validator-set change
    pub force_seal_on_validator_change: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            store_prefix: "oracle/".to_string(),
            extra_retention_blocks: 0,
            reuse_speculative_branch: true,
            force_seal_on_validator_change: true,
        }
    }
}

impl OracleConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_ORACLE_STORE_PREFIX`: store key prefix (default: oracle/)
    /// - `QC_ORACLE_EXTRA_RETENTION`: extra retained blocks (default: 0)
    /// - `QC_ORACLE_REUSE_SPECULATIVE`: reuse the speculative branch (default: true)
    /// - `QC_ORACLE_FORCE_SEAL`: force seal on validator change (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_prefix: env::var("QC_ORACLE_STORE_PREFIX").unwrap_or(defaults.store_prefix),
            extra_retention_blocks: env::var("QC_ORACLE_EXTRA_RETENTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.extra_retention_blocks),
            reuse_speculative_branch: env::var("QC_ORACLE_REUSE_SPECULATIVE")
                .map(|v| flag(&v))
                .unwrap_or(defaults.reuse_speculative_branch),
            force_seal_on_validator_change: env::var("QC_ORACLE_FORCE_SEAL")
                .map(|v| flag(&v))
                .unwrap_or(defaults.force_seal_on_validator_change),
        }
    }
}

fn flag(value: &str) -> bool {
    value.to_lowercase() != "false" && value != "0"
}

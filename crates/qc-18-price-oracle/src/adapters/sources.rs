//! Fixed validator and params providers
//!
//! For nodes whose tables come from genesis, and for tests.

use crate::domain::{Params, ValidatorPowers};
use crate::error::{OracleResult, ParamsError};
use crate::ports::outbound::{ParamsSource, ValidatorPowerSource};
use parking_lot::RwLock;

/// Validator table held in memory, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticValidatorSource {
    powers: RwLock<ValidatorPowers>,
}

impl StaticValidatorSource {
    pub fn new(powers: ValidatorPowers) -> Self {
        Self {
            powers: RwLock::new(powers),
        }
    }

    pub fn set(&self, powers: ValidatorPowers) {
        *self.powers.write() = powers;
    }
}

impl ValidatorPowerSource for StaticValidatorSource {
    fn current_validators(&self) -> OracleResult<ValidatorPowers> {
        Ok(self.powers.read().clone())
    }
}

/// Params snapshot held in memory
#[derive(Debug, Default)]
pub struct StaticParamsSource {
    params: RwLock<Params>,
}

impl StaticParamsSource {
    pub fn new(params: Params) -> Self {
        Self {
            params: RwLock::new(params),
        }
    }

    /// Load and validate a genesis params document (JSON)
    pub fn from_json(document: &str) -> OracleResult<Self> {
        let params: Params =
            serde_json::from_str(document).map_err(|e| ParamsError::Decode(e.to_string()))?;
        params.validate()?;
        Ok(Self::new(params))
    }

    pub fn set(&self, params: Params) {
        *self.params.write() = params;
    }
}

impl ParamsSource for StaticParamsSource {
    fn current_params(&self) -> OracleResult<Params> {
        Ok(self.params.read().clone())
    }
}

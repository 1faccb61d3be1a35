//! Ports module for the Price Oracle subsystem

pub mod inbound;
pub mod outbound;

pub use inbound::OracleApi;
pub use outbound::{BatchOperation, KeyValueStore, ParamsSource, ValidatorPowerSource};

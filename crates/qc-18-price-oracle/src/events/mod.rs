//! Events module for the Price Oracle subsystem

pub mod outgoing;

pub use outgoing::{BlockEndReport, FinalizedPriceEvent, SealedRound, SubmissionOutcome};

//! # Price Oracle Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Params, validator sets, seeded block plans, nodes
//! └── integration/      # Cross-module flows
//!     ├── scenario.rs   # Quorum and liveness walk-throughs
//!     ├── determinism.rs# Independent nodes, same blocks, same state
//!     ├── recovery.rs   # Crash at block k, recover, continue
//!     └── capacity.rs   # Flooding validators
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::recovery
//! cargo bench -p qc-tests
//! ```

pub mod fixtures;

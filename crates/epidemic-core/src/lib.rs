#![forbid(unsafe_code)]
//! epidemic-core: the data model, error taxonomy, and configuration shared
//! by the simulation engine and CLI.

pub mod config;
pub mod error;
pub mod merge;
pub mod model;

// # Conventions
//
// - **Errors**: this crate's own functions return [`error::ScenarioError`]
//   (or a category within it); downstream CLI boundaries wrap these in
//   `anyhow::Result`.
// - **Logging**: `epidemic-sim` and `epidemic-cli` instrument with
//   `tracing`; this crate is pure data/config and logs nothing itself.

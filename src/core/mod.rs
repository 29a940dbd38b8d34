//! Core provisioning logic — types, parsing, script generation, the run loop.

pub mod codegen;
pub mod error;
pub mod journal;
pub mod parser;
pub mod provisioner;
pub mod state;
pub mod types;

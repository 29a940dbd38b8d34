//! kiln — ordered, fail-fast environment provisioning.
//!
//! Applies native package installs, toolchain component additions and
//! global runtime installs to a base image, in the order written, stopping
//! at the first failure.

pub mod cli;
pub mod core;
pub mod providers;
pub mod transport;
pub mod tripwire;

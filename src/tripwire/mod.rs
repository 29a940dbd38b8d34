//! Tripwire — provenance tracing, BLAKE3 step hashing, presence verification.

pub mod eventlog;
pub mod hasher;
pub mod verify;

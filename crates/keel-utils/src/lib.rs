//! Shared helpers for the keel workspace: checksums, filesystem primitives,
//! per-resource locks and timestamps.

pub mod error;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod path;
pub mod time;

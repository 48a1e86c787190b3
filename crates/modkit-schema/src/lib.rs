//! Shared types and wire formats for modkit.
//!
//! Everything here is plain data: digests, transfer accounting, archive
//! classification and the JSON bodies the server returns.

pub mod hash;
pub mod types;

// Re-exports
pub use hash::*;
pub use types::*;

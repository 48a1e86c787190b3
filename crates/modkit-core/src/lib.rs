pub mod checksum;
pub mod config;
pub mod install;
pub mod io;
pub mod paths;
pub mod remote;
pub mod tree;

pub mod reporter;

pub use paths::*;
pub use reporter::{NullProgress, ProgressSink, Scaled};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("modkit-core/", env!("CARGO_PKG_VERSION"));

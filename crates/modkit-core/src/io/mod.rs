//! IO modules - side effects (network, subprocesses)

pub mod download;
pub mod extract;
pub mod upload;

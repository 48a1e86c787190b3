//! Resolve command

use std::path::Path;

use modkit_core::tree::ipath;

/// Print `path` with each component in its on-disk casing
pub fn resolve(path: &Path) {
    println!("{}", ipath(path).display());
}

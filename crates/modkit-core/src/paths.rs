use dirs::home_dir;
use std::path::PathBuf;

/// Returns the primary configuration directory, or None if the user's home cannot be resolved.
pub fn try_modkit_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("MODKIT_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".modkit"))
}

/// Returns the modkit home directory (`~/.modkit`).
///
/// Falls back to `.modkit` in the working directory when neither
/// `MODKIT_HOME` nor a home directory is available.
pub fn modkit_home() -> PathBuf {
    try_modkit_home().unwrap_or_else(|| PathBuf::from(".modkit"))
}

/// Configuration file: ~/.modkit/config.toml
pub fn config_path() -> PathBuf {
    modkit_home().join("config.toml")
}

/// Scratch space for downloads and extraction: ~/.modkit/tmp
pub fn tmp_path() -> PathBuf {
    modkit_home().join("tmp")
}

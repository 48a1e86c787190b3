//! Command implementations

pub mod extract;
pub mod hash;
pub mod install;
pub mod merge;
pub mod probe;
pub mod publish;
pub mod resolve;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use modkit_core::config::Config;
use modkit_core::install::Context;
use modkit_core::tree::CaseFix;
use modkit_core::{NullProgress, ProgressSink};

use crate::ui::TerminalProgress;

/// Load configuration and build the shared pipeline context.
pub(crate) fn context(quiet: bool) -> Result<Context> {
    let config = Config::load().context("Failed to load configuration")?;
    let client = reqwest::Client::builder()
        .user_agent(modkit_core::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let progress: Arc<dyn ProgressSink> = if quiet {
        Arc::new(NullProgress)
    } else {
        Arc::new(TerminalProgress::new())
    };
    Ok(Context::from_config(&config, client, progress))
}

/// Extraction tool from the configuration.
pub(crate) fn extractor() -> Result<modkit_core::io::extract::ArchiveExtractor> {
    let config = Config::load().context("Failed to load configuration")?;
    Ok(modkit_core::io::extract::ArchiveExtractor::new(
        config.seven_zip,
    ))
}

/// Policy requested on the command line, if any.
pub fn case_override(case_fix: Option<CaseFix>, no_case_fix: bool) -> Option<CaseFix> {
    if no_case_fix { Some(CaseFix::Off) } else { case_fix }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_override() {
        assert_eq!(case_override(None, false), None);
        assert_eq!(case_override(None, true), Some(CaseFix::Off));
        assert_eq!(
            case_override(Some(CaseFix::TopLevel), false),
            Some(CaseFix::TopLevel)
        );
    }
}

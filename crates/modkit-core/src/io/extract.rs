//! Archive extraction module
//!
//! Unpacks archives by driving an external 7-Zip compatible tool. Compound
//! archives (`pkg.tar.gz`) take two passes: the outer layer is unpacked next
//! to the archive, then the intermediate `.tar` is unpacked into the real
//! output directory and deleted.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use modkit_schema::ArchiveHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Which pass of an extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Plain one-pass extraction.
    Single,
    /// First pass of a compound archive (outer compression layer).
    Outer,
    /// Second pass of a compound archive (the intermediate container).
    Inner,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single stage",
            Self::Outer => "outer stage",
            Self::Inner => "inner stage",
        })
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The tool could not be started at all.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and exited nonzero. There is no structured reason.
    #[error("{tool} failed on {} ({stage}, exit code {code:?})", .archive.display())]
    Failed {
        tool: String,
        archive: PathBuf,
        stage: Stage,
        code: Option<i32>,
    },
}

/// Result of running an external program.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// True for exit code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Seam between the extractor and process spawning.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only when the process could not be started.
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<CommandOutput>;
}

/// Spawns real processes and forwards their output to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<CommandOutput> {
        debug!("Running {} {:?}", program.display(), args);
        let output = Command::new(program).args(args).output()?;

        for line in String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
        {
            if !line.trim().is_empty() {
                debug!("{}: {}", program.display(), line);
            }
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Options for [`ArchiveExtractor::extract`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Overwrite files that already exist in the output directory (`-y`).
    pub overwrite: bool,
    /// Only extract these members. `None` extracts everything.
    pub entries: Option<Vec<String>>,
}

impl ExtractOptions {
    /// Extract everything, replacing existing files.
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            entries: None,
        }
    }
}

/// Drives the external compression tool.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor<R: CommandRunner = SystemRunner> {
    tool: PathBuf,
    runner: R,
}

impl ArchiveExtractor<SystemRunner> {
    /// Use the tool at `tool` (a path or a name looked up on `PATH`).
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self::with_runner(tool, SystemRunner)
    }
}

impl<R: CommandRunner> ArchiveExtractor<R> {
    /// Use a custom process runner.
    pub fn with_runner(tool: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            tool: tool.into(),
            runner,
        }
    }

    /// The configured tool.
    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Whether the tool can be found and answers `-h`.
    pub fn tool_available(&self) -> bool {
        if which::which(&self.tool).is_err() {
            debug!("{} not found", self.tool.display());
            return false;
        }

        match self.runner.run(&self.tool, &[OsString::from("-h")]) {
            Ok(out) => out.success(),
            Err(e) => {
                warn!("Call to {} failed: {e}", self.tool.display());
                false
            }
        }
    }

    /// Ask the tool to list `path`; a successful listing means it is an archive.
    pub fn is_archive(&self, path: &Path) -> bool {
        let args = [OsString::from("l"), path.as_os_str().to_os_string()];
        match self.runner.run(&self.tool, &args) {
            Ok(out) => out.success(),
            Err(e) => {
                warn!("Call to {} failed: {e}", self.tool.display());
                false
            }
        }
    }

    /// Unpack `archive` into `out_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Spawn`] if the tool cannot be started and
    /// [`ExtractError::Failed`] on a nonzero exit at either stage. Partially
    /// extracted files are left in place.
    pub fn extract(
        &self,
        archive: &Path,
        out_dir: &Path,
        opts: &ExtractOptions,
    ) -> Result<(), ExtractError> {
        let handle = ArchiveHandle::new(archive);
        info!(
            "Extracting {} into {}",
            archive.display(),
            out_dir.display()
        );

        if handle.is_compound() {
            self.extract_compound(&handle, out_dir, opts)
        } else {
            self.run_extract(archive, out_dir, opts, Stage::Single)
        }
    }

    fn extract_compound(
        &self,
        handle: &ArchiveHandle,
        out_dir: &Path,
        opts: &ExtractOptions,
    ) -> Result<(), ExtractError> {
        // Nothing exists yet if this fails, so there is nothing to clean up.
        self.run_extract(
            handle.path(),
            &handle.parent(),
            &ExtractOptions::overwrite(),
            Stage::Outer,
        )?;

        let inner = handle.intermediate();
        let result = self.run_extract(&inner, out_dir, opts, Stage::Inner);

        if let Err(e) = fs::remove_file(&inner) {
            warn!("Failed to remove {}: {e}", inner.display());
        }

        result
    }

    fn run_extract(
        &self,
        archive: &Path,
        out_dir: &Path,
        opts: &ExtractOptions,
        stage: Stage,
    ) -> Result<(), ExtractError> {
        let args = extract_args(archive, out_dir, opts);
        let output = self
            .runner
            .run(&self.tool, &args)
            .map_err(|source| ExtractError::Spawn {
                tool: self.tool.display().to_string(),
                source,
            })?;

        if output.success() {
            Ok(())
        } else {
            Err(ExtractError::Failed {
                tool: self.tool.display().to_string(),
                archive: archive.to_path_buf(),
                stage,
                code: output.code,
            })
        }
    }
}

/// `x -o<out> [-y] <archive> [<entry> ...]`
fn extract_args(archive: &Path, out_dir: &Path, opts: &ExtractOptions) -> Vec<OsString> {
    let mut out_flag = OsString::from("-o");
    out_flag.push(out_dir);

    let mut args = vec![OsString::from("x"), out_flag];
    if opts.overwrite {
        args.push(OsString::from("-y"));
    }
    args.push(archive.as_os_str().to_os_string());
    if let Some(entries) = &opts.entries {
        args.extend(entries.iter().map(OsString::from));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    type Behavior = Box<dyn Fn(&[String]) -> i32 + Send + Sync>;

    /// Records invocations and simulates the tool's effects.
    struct FakeRunner {
        calls: Mutex<Vec<Vec<String>>>,
        behavior: Behavior,
    }

    impl FakeRunner {
        fn new(behavior: impl Fn(&[String]) -> i32 + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                behavior: Box::new(behavior),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for &FakeRunner {
        fn run(&self, _program: &Path, args: &[OsString]) -> io::Result<CommandOutput> {
            let args: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let code = (self.behavior)(&args);
            self.calls.lock().unwrap().push(args);
            Ok(CommandOutput {
                code: Some(code),
                ..CommandOutput::default()
            })
        }
    }

    fn out_dir(args: &[String]) -> PathBuf {
        PathBuf::from(args[1].strip_prefix("-o").unwrap())
    }

    #[test]
    fn test_single_stage_arguments() {
        let runner = FakeRunner::new(|_| 0);
        let extractor = ArchiveExtractor::with_runner("7z", &runner);
        let opts = ExtractOptions {
            overwrite: true,
            entries: Some(vec!["data/a.vp".into(), "b.txt".into()]),
        };

        extractor
            .extract(Path::new("/dl/pkg.7z"), Path::new("/out"), &opts)
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![vec!["x", "-o/out", "-y", "/dl/pkg.7z", "data/a.vp", "b.txt"]]
        );
    }

    #[test]
    fn test_single_stage_without_overwrite_omits_flag() {
        let runner = FakeRunner::new(|_| 0);
        let extractor = ArchiveExtractor::with_runner("7z", &runner);

        extractor
            .extract(Path::new("pkg.zip"), Path::new("out"), &ExtractOptions::default())
            .unwrap();

        assert_eq!(runner.calls(), vec![vec!["x", "-oout", "pkg.zip"]]);
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let runner = FakeRunner::new(|_| 2);
        let extractor = ArchiveExtractor::with_runner("7z", &runner);

        let err = extractor
            .extract(Path::new("pkg.zip"), Path::new("out"), &ExtractOptions::default())
            .unwrap_err();

        assert!(matches!(
            err,
            ExtractError::Failed {
                stage: Stage::Single,
                code: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_compound_archive_two_passes_and_cleanup() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.tar.gz");
        fs::write(&archive, b"gz").unwrap();
        let out = dir.path().join("content");

        let runner = FakeRunner::new(|args| {
            let target = out_dir(args);
            if args.iter().any(|a| a.ends_with("pkg.tar.gz")) {
                fs::write(target.join("pkg.tar"), b"tar").unwrap();
            } else {
                fs::create_dir_all(&target).unwrap();
                fs::write(target.join("readme.txt"), b"hello").unwrap();
            }
            0
        });
        let extractor = ArchiveExtractor::with_runner("7z", &runner);
        let opts = ExtractOptions {
            overwrite: false,
            entries: Some(vec!["readme.txt".into()]),
        };

        extractor.extract(&archive, &out, &opts).unwrap();

        assert!(out.join("readme.txt").exists());
        assert!(!dir.path().join("pkg.tar").exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        // Stage one: into the archive's directory, overwriting, no filter.
        assert_eq!(out_dir(&calls[0]), dir.path());
        assert_eq!(calls[0][2], "-y");
        assert_eq!(calls[0].len(), 4);
        // Stage two: caller's options, intermediate as input.
        assert_eq!(out_dir(&calls[1]), out);
        assert!(calls[1][2].ends_with("pkg.tar"));
        assert_eq!(calls[1][3], "readme.txt");
    }

    #[test]
    fn test_compound_outer_failure_skips_inner() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.tar.bz2");
        fs::write(&archive, b"bz").unwrap();

        let runner = FakeRunner::new(|_| 1);
        let extractor = ArchiveExtractor::with_runner("7z", &runner);

        let err = extractor
            .extract(&archive, &dir.path().join("out"), &ExtractOptions::default())
            .unwrap_err();

        assert!(matches!(err, ExtractError::Failed { stage: Stage::Outer, .. }));
        assert_eq!(runner.calls().len(), 1);
        assert!(archive.exists());
    }

    #[test]
    fn test_compound_inner_failure_still_removes_intermediate() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.tar.xz");
        fs::write(&archive, b"xz").unwrap();

        let runner = FakeRunner::new(|args| {
            if args.iter().any(|a| a.ends_with("pkg.tar.xz")) {
                fs::write(out_dir(args).join("pkg.tar"), b"tar").unwrap();
                0
            } else {
                2
            }
        });
        let extractor = ArchiveExtractor::with_runner("7z", &runner);

        let err = extractor
            .extract(&archive, &dir.path().join("out"), &ExtractOptions::default())
            .unwrap_err();

        assert!(matches!(err, ExtractError::Failed { stage: Stage::Inner, .. }));
        assert!(!dir.path().join("pkg.tar").exists());
    }

    #[test]
    fn test_is_archive_uses_listing_exit_code() {
        let runner = FakeRunner::new(|args| i32::from(!args[1].ends_with(".7z")));
        let extractor = ArchiveExtractor::with_runner("7z", &runner);

        assert!(extractor.is_archive(Path::new("mod.7z")));
        assert!(!extractor.is_archive(Path::new("notes.txt")));
        assert_eq!(runner.calls()[0], vec!["l", "mod.7z"]);
    }

    #[test]
    fn test_missing_tool() {
        let extractor = ArchiveExtractor::new("definitely-not-a-real-7z-binary");
        assert!(!extractor.tool_available());
        assert!(!extractor.is_archive(Path::new("pkg.7z")));

        let err = extractor
            .extract(Path::new("pkg.zip"), Path::new("out"), &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }
}

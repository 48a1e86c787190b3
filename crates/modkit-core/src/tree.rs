//! Case-insensitive path resolution and tree merging.
//!
//! Archives are authored with case-sensitive names but get installed into
//! trees that may already hold the same entries with different casing (or
//! live on a case-insensitive filesystem). [`ipath`] maps a mis-cased path
//! to the entry that actually exists, [`movetree`] folds an extracted tree
//! into a destination without creating case-variant duplicates.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Case-folded view of one directory listing.
///
/// Maps the lowercase form of every name to the first on-disk casing seen.
#[derive(Debug, Default, Clone)]
pub struct PathMapping {
    folded: HashMap<String, OsString>,
}

impl PathMapping {
    /// List `dir` and index its entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn read(dir: &Path) -> io::Result<Self> {
        let mut mapping = Self::default();
        for entry in fs::read_dir(dir)? {
            mapping.register(&entry?.file_name());
        }
        Ok(mapping)
    }

    /// The true casing of `name`, if a case-insensitive match is indexed.
    pub fn lookup(&self, name: &OsStr) -> Option<&OsStr> {
        self.folded.get(&fold(name)).map(OsString::as_os_str)
    }

    /// Index `name`. Returns false if a different casing already owns the slot.
    pub fn register(&mut self, name: &OsStr) -> bool {
        let key = fold(name);
        if self.folded.contains_key(&key) {
            return false;
        }
        self.folded.insert(key, name.to_os_string());
        true
    }
}

fn fold(name: &OsStr) -> String {
    name.to_string_lossy().to_lowercase()
}

/// Map a possibly mis-cased path to an existing one.
///
/// Best effort: returns `path` untouched when it already exists, and also
/// when nothing matching can be found. Parents are resolved before
/// children, so mismatches at several levels are all corrected.
pub fn ipath(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }

    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };

    // A bare relative name lives in the working directory.
    let listing_dir = if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else if parent.exists() {
        parent.to_path_buf()
    } else {
        let resolved = ipath(parent);
        if !resolved.exists() {
            return path.to_path_buf();
        }
        resolved
    };

    let Ok(mapping) = PathMapping::read(&listing_dir) else {
        return path.to_path_buf();
    };

    match mapping.lookup(name) {
        Some(actual) if parent.as_os_str().is_empty() => PathBuf::from(actual),
        Some(actual) => listing_dir.join(actual),
        None => path.to_path_buf(),
    }
}

/// How [`movetree`] treats names that differ from existing entries only by case.
///
/// Spelled `off`, `top-level` or `recursive` in config files and on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseFix {
    /// Create entries exactly as named in the source.
    Off,
    /// Reconcile the top directory only; nested levels use [`CaseFix::Off`].
    TopLevel,
    /// Reconcile at every level of the tree.
    #[default]
    Recursive,
}

impl CaseFix {
    fn is_active(self) -> bool {
        self != Self::Off
    }

    /// Policy handed to the next directory level.
    fn nested(self) -> Self {
        match self {
            Self::TopLevel => Self::Off,
            other => other,
        }
    }
}

impl FromStr for CaseFix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "false" => Ok(Self::Off),
            "top-level" | "toplevel" => Ok(Self::TopLevel),
            "recursive" | "true" => Ok(Self::Recursive),
            other => Err(format!(
                "unknown case policy '{other}' (expected off, top-level or recursive)"
            )),
        }
    }
}

/// A write redirected to an existing sibling's casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCollision {
    /// Path the source tree asked for.
    pub requested: PathBuf,
    /// Existing path that received the entry instead.
    pub resolved: PathBuf,
}

/// What a [`movetree`] call did.
#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    /// Files moved into the destination.
    pub files_moved: usize,
    /// Case substitutions performed.
    pub collisions: Vec<MergeCollision>,
}

/// Move the contents of `src` inside `dest`, so `src/a/r/z.dat` ends up as
/// `dest/a/r/z.dat`.
///
/// Existing destination files are overwritten. Files are moved, not copied;
/// directories left behind in `src` are not removed.
///
/// # Errors
///
/// Returns the first filesystem error hit. Entries handled before the error
/// stay where they were moved.
pub fn movetree(src: &Path, dest: &Path, case_fix: CaseFix) -> io::Result<MergeReport> {
    let mut report = MergeReport::default();
    merge_dir(src, dest, case_fix, &mut report)?;
    Ok(report)
}

fn merge_dir(
    src: &Path,
    dest: &Path,
    case_fix: CaseFix,
    report: &mut MergeReport,
) -> io::Result<()> {
    if !dest.is_dir() {
        fs::create_dir_all(dest)?;
    }

    // One listing per level, shared by every entry below.
    let mut shadow = if case_fix.is_active() {
        Some(PathMapping::read(dest)?)
    } else {
        None
    };

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let spath = entry.path();
        let mut dpath = dest.join(&name);

        if let Some(shadow) = shadow.as_mut() {
            if !dpath.exists() {
                match shadow.lookup(&name).map(OsStr::to_os_string) {
                    Some(existing) => {
                        let resolved = dest.join(existing);
                        warn!(
                            "Changing path \"{}\" to \"{}\" to avoid case problems",
                            dpath.display(),
                            resolved.display()
                        );
                        report.collisions.push(MergeCollision {
                            requested: dpath,
                            resolved: resolved.clone(),
                        });
                        dpath = resolved;
                    }
                    None => {
                        shadow.register(&name);
                    }
                }
            }
        }

        if entry.file_type()?.is_dir() {
            merge_dir(&spath, &dpath, case_fix.nested(), report)?;
        } else {
            if dpath.exists() {
                fs::remove_file(&dpath)?;
            }
            move_file(&spath, &dpath)?;
            report.files_moved += 1;
        }
    }

    Ok(())
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Copying {} across devices", from.display());
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Relative path -> content for every file under `root`.
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
        WalkDir::new(root)
            .into_iter()
            .map(Result::unwrap)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_ipath_existing_path_unchanged() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Data").join("mod.vp");
        write(&file, "x");

        assert_eq!(ipath(&file), file);
    }

    #[test]
    fn test_ipath_corrects_casing_at_every_level() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Data").join("Tables").join("Ships.tbl");
        write(&file, "x");

        let miscased = dir.path().join("data").join("TABLES").join("ships.TBL");
        assert_eq!(ipath(&miscased), file);
    }

    #[test]
    fn test_ipath_returns_input_without_match() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Data")).unwrap();

        let missing = dir.path().join("nowhere").join("file.txt");
        assert_eq!(ipath(&missing), missing);

        // Parent resolves but the leaf does not exist anywhere.
        let leaf = dir.path().join("data").join("new.vp");
        assert_eq!(ipath(&leaf), leaf);
    }

    #[test]
    fn test_movetree_replicates_tree_and_overwrites() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");

        write(&src.join("a/r/z.dat"), "new z");
        write(&src.join("top.txt"), "top");
        write(&dest.join("a/r/z.dat"), "old z");
        write(&dest.join("keep.txt"), "keep");

        let expected = snapshot(&src);
        let report = movetree(&src, &dest, CaseFix::Off).unwrap();

        assert_eq!(report.files_moved, 2);
        let merged = snapshot(&dest);
        for (rel, content) in &expected {
            assert_eq!(merged.get(rel), Some(content));
        }
        assert_eq!(merged.get(Path::new("keep.txt")).unwrap(), "keep");

        // Files are consumed, directories stay behind.
        assert!(snapshot(&src).is_empty());
        assert!(src.join("a/r").is_dir());
    }

    #[test]
    fn test_movetree_creates_missing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("x.txt"), "x");

        let dest = dir.path().join("deep/dest");
        movetree(&src, &dest, CaseFix::Recursive).unwrap();
        assert_eq!(fs::read_to_string(dest.join("x.txt")).unwrap(), "x");
    }

    #[test]
    fn test_movetree_redirects_case_collision() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&dest.join("Foo"), "old");
        write(&src.join("foo"), "new");

        let report = movetree(&src, &dest, CaseFix::Recursive).unwrap();

        assert_eq!(names(&dest), vec!["Foo"]);
        assert_eq!(fs::read_to_string(dest.join("Foo")).unwrap(), "new");
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].resolved, dest.join("Foo"));
    }

    #[test]
    fn test_movetree_without_case_fix_keeps_source_casing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&dest.join("Data/a.txt"), "a");
        write(&src.join("data/b.txt"), "b");

        let report = movetree(&src, &dest, CaseFix::Off).unwrap();

        assert!(report.collisions.is_empty());
        assert!(dest.join("data/b.txt").exists());
    }

    #[test]
    fn test_movetree_recursive_policy_reaches_nested_levels() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&dest.join("Data/Tables/a.tbl"), "a");
        write(&src.join("data/tables/b.tbl"), "b");

        movetree(&src, &dest, CaseFix::Recursive).unwrap();

        assert_eq!(names(&dest), vec!["Data"]);
        assert_eq!(names(&dest.join("Data")), vec!["Tables"]);
        assert_eq!(names(&dest.join("Data/Tables")), vec!["a.tbl", "b.tbl"]);
    }

    #[test]
    fn test_movetree_top_level_policy_stops_after_first_level() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&dest.join("Data/Tables/a.tbl"), "a");
        write(&src.join("data/tables/b.tbl"), "b");

        let report = movetree(&src, &dest, CaseFix::TopLevel).unwrap();

        assert_eq!(report.collisions.len(), 1);
        assert_eq!(names(&dest.join("Data")), vec!["Tables", "tables"]);
    }

    #[test]
    fn test_movetree_registers_new_names_for_later_siblings() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&src.join("readme.txt"), "one");
        write(&src.join("README.TXT"), "two");
        fs::create_dir_all(&dest).unwrap();

        let report = movetree(&src, &dest, CaseFix::Recursive).unwrap();

        assert_eq!(names(&dest).len(), 1);
        assert_eq!(report.files_moved, 2);
        assert_eq!(report.collisions.len(), 1);
    }

    #[test]
    fn test_path_mapping_first_casing_wins() {
        let mut mapping = PathMapping::default();
        assert!(mapping.register(OsStr::new("Foo")));
        assert!(!mapping.register(OsStr::new("FOO")));
        assert_eq!(mapping.lookup(OsStr::new("foo")), Some(OsStr::new("Foo")));
        assert_eq!(mapping.lookup(OsStr::new("FOO")), Some(OsStr::new("Foo")));
        assert_eq!(mapping.lookup(OsStr::new("bar")), None);
    }

    #[test]
    fn test_case_fix_parses_policy_names() {
        assert_eq!("off".parse::<CaseFix>(), Ok(CaseFix::Off));
        assert_eq!("Top-Level".parse::<CaseFix>(), Ok(CaseFix::TopLevel));
        assert_eq!("recursive".parse::<CaseFix>(), Ok(CaseFix::Recursive));
        assert!("sometimes".parse::<CaseFix>().is_err());
    }
}

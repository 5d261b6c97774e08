use super::filter::{extension_of, FileFilter};
use super::summary::ScanSummary;
use crate::error::Error;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Compile glob ignore patterns, logging and skipping invalid ones.
pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Lists the regular files under `root` that pass `filter`, in file-name
/// order. Directories and files matching an ignore pattern (by name or full
/// path) are pruned. Symlinks are followed, so a linked file or directory is
/// listed under the link's name. Unreadable entries (including dangling links
/// and link loops) are logged and counted in `summary.walk_errors`; see
/// [`check_walk_errors`].
pub fn list_candidates(
    root: &Path,
    recursive: bool,
    ignore_patterns: &[Pattern],
    filter: &dyn FileFilter,
    summary: &mut ScanSummary,
) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::FileAccess {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let is_ignored = |path: &Path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ignore_patterns
            .iter()
            .any(|p| p.matches(&name) || p.matches_path(path))
    };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.path()));

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error walking '{}': {}", root.display(), err);
                summary.walk_errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let accepted = filter.accept(&name);
        summary.record_filter(extension_of(&name).as_deref(), accepted);
        if accepted {
            candidates.push(entry.into_path());
        } else {
            debug!("Filter reject: {}", name);
        }
    }

    summary.candidates += candidates.len();
    Ok(candidates)
}

/// A listing with unreadable entries is incomplete. It fails the build unless
/// races are tolerated, in which case the gap is only warned about.
pub(crate) fn check_walk_errors(
    root: &Path,
    walk_errors: usize,
    tolerate_races: bool,
) -> Result<(), Error> {
    if walk_errors == 0 {
        return Ok(());
    }
    if tolerate_races {
        warn!(
            "{} entries under '{}' could not be read and are left out of the inventory.",
            walk_errors,
            root.display()
        );
        return Ok(());
    }
    Err(Error::FileAccess {
        path: root.to_path_buf(),
        reason: format!("{} entries could not be listed", walk_errors),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::filter::MediaFilter;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("skipme")).unwrap();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join("notes.txt"), "n").unwrap();
        fs::write(root.join("sub/b.jpg"), "b").unwrap();
        fs::write(root.join("sub/deeper/c.png"), "c").unwrap();
        fs::write(root.join("skipme/d.jpg"), "d").unwrap();
        dir
    }

    #[test]
    fn test_single_level() {
        let dir = fixture();
        let filter = MediaFilter::new("inventory.json", false);
        let mut summary = ScanSummary::default();
        let files = list_candidates(dir.path(), false, &[], &filter, &mut summary).unwrap();
        assert_eq!(files, vec![dir.path().join("a.jpg")]);
        assert_eq!(summary.rejected[".txt"], 1);
        assert_eq!(summary.candidates, 1);
    }

    #[test]
    fn test_recursive_with_ignore() {
        let dir = fixture();
        let filter = MediaFilter::new("inventory.json", false);
        let mut summary = ScanSummary::default();
        let ignore = compile_ignore_patterns(&["skipme".to_string(), "[".to_string()]);
        let mut files = list_candidates(dir.path(), true, &ignore, &filter, &mut summary).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.jpg"),
                dir.path().join("sub/b.jpg"),
                dir.path().join("sub/deeper/c.png"),
            ]
        );
        assert_eq!(summary.passed[".jpg"], 2);
        assert_eq!(summary.passed[".png"], 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_listed() {
        let dir = fixture();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("real.jpg"), "r").unwrap();
        std::os::unix::fs::symlink(outside.path().join("real.jpg"), dir.path().join("linked.jpg"))
            .unwrap();

        let filter = MediaFilter::new("inventory.json", false);
        let mut summary = ScanSummary::default();
        let files = list_candidates(dir.path(), false, &[], &filter, &mut summary).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.jpg"), dir.path().join("linked.jpg")]
        );
        assert_eq!(summary.passed[".jpg"], 2);
        assert_eq!(summary.walk_errors, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_counts_as_walk_error() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("gone.jpg"), dir.path().join("broken.jpg"))
            .unwrap();

        let filter = MediaFilter::new("inventory.json", false);
        let mut summary = ScanSummary::default();
        let files = list_candidates(dir.path(), false, &[], &filter, &mut summary).unwrap();
        assert_eq!(files, vec![dir.path().join("a.jpg")]);
        assert_eq!(summary.walk_errors, 1);
    }

    #[test]
    fn test_check_walk_errors() {
        let root = Path::new("/photos");
        assert!(check_walk_errors(root, 0, false).is_ok());
        assert!(check_walk_errors(root, 2, true).is_ok());
        let err = check_walk_errors(root, 2, false).unwrap_err();
        assert!(matches!(err, Error::FileAccess { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = fixture();
        let filter = MediaFilter::new("inventory.json", false);
        let mut summary = ScanSummary::default();
        let result = list_candidates(&dir.path().join("a.jpg"), true, &[], &filter, &mut summary);
        assert!(matches!(result, Err(Error::FileAccess { .. })));
    }
}

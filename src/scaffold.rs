//! Scaffold merging: runtime boilerplate injected around user code.
//!
//! The merge is strictly "bundle wins": a path that already exists in the
//! bundle is never rewritten. Directories that exist on both sides are
//! still descended so each child is decided individually; an existing
//! (even empty) bundle directory does not block its scaffold siblings.

use std::fs;
use std::path::Path;

use crate::error::{BuildError, Result};

/// What a merge did, for the orchestrator's log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeReport {
    pub copied: usize,
    pub skipped: usize,
}

/// Merge `scaffold_dir` into `bundle_root`.
///
/// A missing scaffold directory is a no-op, not a failure: some runtimes
/// need no scaffolding.
pub fn merge_scaffold(scaffold_dir: &Path, bundle_root: &Path) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    if !scaffold_dir.is_dir() {
        return Ok(report);
    }
    merge_tree(scaffold_dir, bundle_root, &mut report)?;
    Ok(report)
}

fn merge_tree(src: &Path, dst: &Path, report: &mut MergeReport) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|e| BuildError::Merge {
        path: src.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| BuildError::Merge {
            path: src.to_path_buf(),
            source: e,
        })?;
        let source_path = entry.path();
        let target_path = dst.join(entry.file_name());

        if source_path.is_dir() {
            if !target_path.exists() {
                fs::create_dir(&target_path).map_err(|e| BuildError::Merge {
                    path: target_path.clone(),
                    source: e,
                })?;
                report.copied += 1;
            }
            merge_tree(&source_path, &target_path, report)?;
        } else if target_path.exists() {
            report.skipped += 1;
        } else {
            fs::copy(&source_path, &target_path).map_err(|e| BuildError::Merge {
                path: target_path.clone(),
                source: e,
            })?;
            report.copied += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn snapshot(root: &Path) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                    out.insert(rel, fs::read_to_string(&path).unwrap());
                }
            }
        }
        walk(root, root, &mut out);
        out
    }

    #[test]
    fn test_missing_scaffold_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("bundle");
        fs::create_dir(&bundle).unwrap();
        write(&bundle, "app.py", "user code");

        let report = merge_scaffold(&tmp.path().join("absent"), &bundle).unwrap();
        assert_eq!(report.copied, 0);
        assert_eq!(snapshot(&bundle).len(), 1);
    }

    #[test]
    fn test_bundle_files_are_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let scaffold = tmp.path().join("scaffold");
        let bundle = tmp.path().join("bundle");
        fs::create_dir(&bundle).unwrap();
        write(&scaffold, "wsgi.py", "scaffold wsgi");
        write(&scaffold, "app.py", "scaffold app");
        write(&bundle, "app.py", "user app");

        let report = merge_scaffold(&scaffold, &bundle).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(fs::read_to_string(bundle.join("app.py")).unwrap(), "user app");
        assert_eq!(
            fs::read_to_string(bundle.join("wsgi.py")).unwrap(),
            "scaffold wsgi"
        );
    }

    #[test]
    fn test_existing_directories_are_descended() {
        let tmp = tempfile::tempdir().unwrap();
        let scaffold = tmp.path().join("scaffold");
        let bundle = tmp.path().join("bundle");
        write(&scaffold, "static/index.html", "<html>");
        write(&scaffold, "static/style.css", "body {}");
        write(&bundle, "static/index.html", "user html");

        merge_scaffold(&scaffold, &bundle).unwrap();

        // The shared directory did not block the sibling file, and the
        // user's copy of the shared file survived.
        assert_eq!(
            fs::read_to_string(bundle.join("static/index.html")).unwrap(),
            "user html"
        );
        assert_eq!(
            fs::read_to_string(bundle.join("static/style.css")).unwrap(),
            "body {}"
        );
    }

    #[test]
    fn test_empty_bundle_directory_still_receives_children() {
        let tmp = tempfile::tempdir().unwrap();
        let scaffold = tmp.path().join("scaffold");
        let bundle = tmp.path().join("bundle");
        write(&scaffold, "conf/default.yaml", "a: 1");
        fs::create_dir_all(bundle.join("conf")).unwrap();

        merge_scaffold(&scaffold, &bundle).unwrap();
        assert_eq!(
            fs::read_to_string(bundle.join("conf/default.yaml")).unwrap(),
            "a: 1"
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let scaffold = tmp.path().join("scaffold");
        let bundle = tmp.path().join("bundle");
        write(&scaffold, "wsgi.py", "scaffold wsgi");
        write(&scaffold, "static/style.css", "body {}");
        fs::create_dir(&bundle).unwrap();
        write(&bundle, "app.py", "user app");

        merge_scaffold(&scaffold, &bundle).unwrap();
        let after_once = snapshot(&bundle);

        let report = merge_scaffold(&scaffold, &bundle).unwrap();
        assert_eq!(report.copied, 0);
        assert_eq!(snapshot(&bundle), after_once);
    }
}

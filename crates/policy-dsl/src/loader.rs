//! Loader: turn a directory of policy files into compiled policies.
//!
//! One file = one policy, named from the basename without extension.
//! Recognised extensions are `.policy` and `.cgp`, case-insensitive.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DslError, DslResult};
use crate::policy::Policy;

/// Search paths probed, in order, when no explicit directory is given.
pub const DEFAULT_SEARCH_PATHS: [&str; 3] =
    [".relicta/policies", ".github/relicta/policies", "policies"];

/// Loader behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderOptions {
    /// Collect per-file errors instead of aborting on the first one.
    pub ignore_errors: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
}

/// A per-file load failure.
#[derive(Debug, Clone)]
pub struct LoadError {
    /// The file that failed.
    pub file: PathBuf,
    /// Rendered error.
    pub error: String,
}

/// The outcome of a directory load.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Successfully compiled policies, in stable file order.
    pub policies: Vec<Policy>,
    /// Per-file failures (only populated with `ignore_errors`).
    pub errors: Vec<LoadError>,
}

/// Load every policy file under `dir`.
///
/// Without `ignore_errors` the first failing file aborts the load; with it,
/// failures are collected into the result and the rest of the directory is
/// still processed.
pub fn load_dir(dir: &Path, opts: &LoaderOptions) -> DslResult<LoadResult> {
    let mut files = Vec::new();
    collect_files(dir, opts.recursive, &mut files)?;
    files.sort();

    let mut result = LoadResult::default();
    for file in files {
        match load_file(&file) {
            Ok(policy) => result.policies.push(policy),
            Err(e) if opts.ignore_errors => {
                result.errors.push(LoadError { file, error: e.to_string() });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}

/// Load the first default search path that exists under `repo_root`.
/// An empty result (no directory present) is not an error.
pub fn load_default(repo_root: &Path, opts: &LoaderOptions) -> DslResult<LoadResult> {
    for rel in DEFAULT_SEARCH_PATHS {
        let dir = repo_root.join(rel);
        if dir.is_dir() {
            return load_dir(&dir, opts);
        }
    }
    Ok(LoadResult::default())
}

/// Load and compile a single policy file.
pub fn load_file(path: &Path) -> DslResult<Policy> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| DslError::Compile(format!("cannot derive policy name from {path:?}")))?;
    let source = fs::read_to_string(path)?;
    crate::compile_source(&name, &source)
}

fn has_policy_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_lowercase();
            ext == "policy" || ext == "cgp"
        })
        .unwrap_or(false)
}

fn collect_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> DslResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_files(&path, recursive, out)?;
            }
        } else if has_policy_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const GOOD: &str = r#"
        rule "breaking-changes" {
          priority = 100
          when { change.breaking > 0 }
          then { require_approval(count: 1) }
        }
        defaults { decision = "approve" }
    "#;

    const BAD: &str = r#"rule "broken" { when { ??? } then { } }"#;

    #[test]
    fn loads_policy_and_cgp_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("base.policy"), GOOD).unwrap();
        fs::write(dir.path().join("extra.CGP"), GOOD).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = load_dir(dir.path(), &LoaderOptions::default()).unwrap();
        assert_eq!(result.policies.len(), 2);
        // Stable file order: sorted by path.
        assert_eq!(result.policies[0].name, "base");
        assert_eq!(result.policies[1].name, "extra");
    }

    #[test]
    fn first_error_aborts_by_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.policy"), BAD).unwrap();
        fs::write(dir.path().join("b.policy"), GOOD).unwrap();
        assert!(load_dir(dir.path(), &LoaderOptions::default()).is_err());
    }

    #[test]
    fn ignore_errors_collects_partial_result() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.policy"), BAD).unwrap();
        fs::write(dir.path().join("b.policy"), GOOD).unwrap();

        let opts = LoaderOptions { ignore_errors: true, recursive: false };
        let result = load_dir(dir.path(), &opts).unwrap();
        assert_eq!(result.policies.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].file.ends_with("a.policy"));
    }

    #[test]
    fn recursion_is_opt_in() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("team");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("nested.policy"), GOOD).unwrap();

        let flat = load_dir(dir.path(), &LoaderOptions::default()).unwrap();
        assert!(flat.policies.is_empty());

        let opts = LoaderOptions { ignore_errors: false, recursive: true };
        let deep = load_dir(dir.path(), &opts).unwrap();
        assert_eq!(deep.policies.len(), 1);
        assert_eq!(deep.policies[0].name, "nested");
    }

    #[test]
    fn default_search_paths_probe_in_order() {
        let root = tempdir().unwrap();
        let fallback = root.path().join("policies");
        fs::create_dir_all(&fallback).unwrap();
        fs::write(fallback.join("p.policy"), GOOD).unwrap();

        let preferred = root.path().join(".relicta/policies");
        fs::create_dir_all(&preferred).unwrap();
        fs::write(preferred.join("q.policy"), GOOD).unwrap();

        let result = load_default(root.path(), &LoaderOptions::default()).unwrap();
        assert_eq!(result.policies.len(), 1);
        assert_eq!(result.policies[0].name, "q");
    }

    #[test]
    fn missing_search_paths_yield_empty_result() {
        let root = tempdir().unwrap();
        let result = load_default(root.path(), &LoaderOptions::default()).unwrap();
        assert!(result.policies.is_empty());
        assert!(result.errors.is_empty());
    }
}

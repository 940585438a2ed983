//! Engine binary discovery.
//!
//! Search order, first match wins:
//! 1. the starting directory itself
//! 2. known build-output directories under it
//! 3. the same two checks in each parent, up to [`MAX_PARENT_DEPTH`] levels
//! 4. the runtime-data directory named by [`RUNTIME_DIR_VAR`], under each of
//!    [`RUNTIME_SUBDIRS`]
//!
//! Not finding the binary is not an error; the caller decides on a fallback.

use std::path::{Path, PathBuf};

/// Base name of the engine executable (without platform suffix).
pub const ENGINE_NAME: &str = "hbk-play";

/// Build-output directories checked relative to each search level.
pub const BUILD_OUTPUT_DIRS: &[&str] = &[
    "bazel-bin",
    "bazel-out/k8-opt/bin",
    "bazel-out/x64_windows-opt/bin",
    "target/release",
    "target/debug",
];

pub const MAX_PARENT_DEPTH: usize = 10;

/// Environment variable naming the runtime-data (runfiles) directory.
pub const RUNTIME_DIR_VAR: &str = "RUNFILES_DIR";

pub const RUNTIME_SUBDIRS: &[&str] = &["hibiki", "_main"];

/// Platform file name of the engine, e.g. `hbk-play.exe` on Windows.
pub fn engine_binary_name() -> String {
    format!("{}{}", ENGINE_NAME, std::env::consts::EXE_SUFFIX)
}

#[derive(Debug, Clone)]
pub struct BinaryLocator {
    root: PathBuf,
    runtime_dir: Option<PathBuf>,
    max_parent_depth: usize,
}

impl BinaryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runtime_dir: None,
            max_parent_depth: MAX_PARENT_DEPTH,
        }
    }

    /// Rooted at the working directory, runtime dir from [`RUNTIME_DIR_VAR`].
    pub fn from_env() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut locator = Self::new(root);
        locator.runtime_dir = std::env::var_os(RUNTIME_DIR_VAR).map(PathBuf::from);
        locator
    }

    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    pub fn with_max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        for dir in self.root.ancestors().take(self.max_parent_depth + 1) {
            if let Some(found) = search_dir(dir, name) {
                tracing::debug!(path = %found.display(), "Located engine binary");
                return Some(found);
            }
        }

        let runtime_dir = self.runtime_dir.as_ref()?;
        let found = RUNTIME_SUBDIRS
            .iter()
            .map(|sub| runtime_dir.join(sub).join(name))
            .find(|p| p.is_file());
        if let Some(ref path) = found {
            tracing::debug!(path = %path.display(), "Located engine binary in runtime dir");
        }
        found
    }
}

fn search_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    std::iter::once(dir.join(name))
        .chain(BUILD_OUTPUT_DIRS.iter().map(|b| dir.join(b).join(name)))
        .find(|p| p.is_file())
}

/// Locate `name` starting from the working directory.
pub fn resolve_binary_path(name: &str) -> Option<PathBuf> {
    BinaryLocator::from_env().locate(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const NAME: &str = "hbk-play";

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"#!/bin/sh\n").unwrap();
    }

    #[test]
    fn finds_binary_in_root() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join(NAME));

        let found = BinaryLocator::new(tmp.path()).locate(NAME);
        assert_eq!(found, Some(tmp.path().join(NAME)));
    }

    #[test]
    fn finds_binary_in_build_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let expected = tmp.path().join("bazel-out/k8-opt/bin").join(NAME);
        touch(&expected);

        let found = BinaryLocator::new(tmp.path()).locate(NAME);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn root_wins_over_build_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join(NAME));
        touch(&tmp.path().join("bazel-bin").join(NAME));

        let found = BinaryLocator::new(tmp.path()).locate(NAME);
        assert_eq!(found, Some(tmp.path().join(NAME)));
    }

    #[test]
    fn build_dir_order_is_respected() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("target/debug").join(NAME));
        touch(&tmp.path().join("bazel-bin").join(NAME));

        let found = BinaryLocator::new(tmp.path()).locate(NAME);
        assert_eq!(found, Some(tmp.path().join("bazel-bin").join(NAME)));
    }

    #[test]
    fn walks_up_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let expected = tmp.path().join("bazel-bin").join(NAME);
        touch(&expected);
        let nested = tmp.path().join("ui/src/main");
        fs::create_dir_all(&nested).unwrap();

        let found = BinaryLocator::new(&nested).locate(NAME);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn nearest_parent_wins() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join(NAME));
        let mid = tmp.path().join("a");
        touch(&mid.join(NAME));
        let nested = mid.join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = BinaryLocator::new(&nested).locate(NAME);
        assert_eq!(found, Some(mid.join(NAME)));
    }

    #[test]
    fn parent_walk_is_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join(NAME));
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let locator = BinaryLocator::new(&nested).with_max_parent_depth(2);
        assert_eq!(locator.locate(NAME), None);

        let locator = BinaryLocator::new(&nested).with_max_parent_depth(3);
        assert_eq!(locator.locate(NAME), Some(tmp.path().join(NAME)));
    }

    #[test]
    fn falls_back_to_runtime_dir() {
        let root = tempfile::tempdir().unwrap();
        let runtime = tempfile::tempdir().unwrap();
        let expected = runtime.path().join("_main").join(NAME);
        touch(&expected);

        let found = BinaryLocator::new(root.path())
            .with_runtime_dir(runtime.path())
            .locate(NAME);
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn runtime_subdir_order_is_respected() {
        let root = tempfile::tempdir().unwrap();
        let runtime = tempfile::tempdir().unwrap();
        touch(&runtime.path().join("_main").join(NAME));
        touch(&runtime.path().join("hibiki").join(NAME));

        let found = BinaryLocator::new(root.path())
            .with_runtime_dir(runtime.path())
            .locate(NAME);
        assert_eq!(found, Some(runtime.path().join("hibiki").join(NAME)));
    }

    #[test]
    fn directory_with_binary_name_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(NAME)).unwrap();

        let locator = BinaryLocator::new(tmp.path()).with_max_parent_depth(0);
        assert_eq!(locator.locate(NAME), None);
    }

    #[test]
    fn missing_binary_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = BinaryLocator::new(tmp.path()).with_max_parent_depth(0);
        assert_eq!(locator.locate("definitely-not-an-engine"), None);
    }

    #[test]
    fn binary_name_carries_platform_suffix() {
        let name = engine_binary_name();
        assert!(name.starts_with(ENGINE_NAME));
        assert!(name.ends_with(std::env::consts::EXE_SUFFIX));
    }
}

//! Source file discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::BuildError;

/// Extensions handed to the compiler driver. Case matters: `.C` is C++.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "C", "cc", "cpp", "cxx"];

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Collect every compilable file under `module_dir/source_dir`.
///
/// Paths are returned relative to `module_dir` (so `src/main.c`, not an
/// absolute path) and sorted by their string form, giving the same command
/// line for the same tree on every host.
///
/// # Errors
///
/// * [`BuildError::Precondition`] if the source directory does not exist
/// * [`BuildError::NoSources`] if nothing matched
/// * [`BuildError::Io`] if the walk fails part-way
pub fn collect_sources(module_dir: &Path, source_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let root = module_dir.join(source_dir);
    if !root.is_dir() {
        return Err(BuildError::precondition(format!(
            "source directory '{}' does not exist",
            root.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| BuildError::Io {
            action: "walking source directory",
            path: err.path().unwrap_or(&root).to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() || !is_source_file(entry.path()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(module_dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        sources.push(relative);
    }

    if sources.is_empty() {
        return Err(BuildError::NoSources { root });
    }

    sources.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("a/main.c")));
        assert!(is_source_file(Path::new("test_QNX.C")));
        assert!(is_source_file(Path::new("x.cpp")));
        assert!(!is_source_file(Path::new("x.hpp")));
        assert!(!is_source_file(Path::new("x.h")));
        assert!(!is_source_file(Path::new("Makefile")));
        assert!(!is_source_file(Path::new("x.CPP")));
    }

    #[test]
    fn test_collect_matches_only_source_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/util/a.cpp");
        touch(temp.path(), "src/main.c");
        touch(temp.path(), "src/vehicle_state/vehicle_state.hpp");
        touch(temp.path(), "src/safety/fault_detector.cc");
        touch(temp.path(), "src/README.md");
        touch(temp.path(), "other/ignored.c");

        let sources = collect_sources(temp.path(), Path::new("src")).unwrap();
        assert_eq!(
            sources,
            vec![
                PathBuf::from("src/main.c"),
                PathBuf::from("src/safety/fault_detector.cc"),
                PathBuf::from("src/util/a.cpp"),
            ]
        );
    }

    #[test]
    fn test_collect_is_repeatable() {
        let temp = TempDir::new().unwrap();
        for rel in ["src/z.c", "src/a/b.cpp", "src/m.cxx", "src/a.C"] {
            touch(temp.path(), rel);
        }
        let first = collect_sources(temp.path(), Path::new("src")).unwrap();
        let second = collect_sources(temp.path(), Path::new("src")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_collect_orders_by_full_path_string() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/a/b.c");
        touch(temp.path(), "src/a.c");
        touch(temp.path(), "src/a-b.c");

        let sources = collect_sources(temp.path(), Path::new("src")).unwrap();
        assert_eq!(
            sources,
            vec![
                PathBuf::from("src/a-b.c"),
                PathBuf::from("src/a.c"),
                PathBuf::from("src/a/b.c"),
            ]
        );
    }

    #[test]
    fn test_collect_empty_tree_is_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/only_header.hpp");
        let err = collect_sources(temp.path(), Path::new("src")).unwrap_err();
        assert!(matches!(err, BuildError::NoSources { .. }));
    }

    #[test]
    fn test_collect_missing_dir_is_precondition() {
        let temp = TempDir::new().unwrap();
        let err = collect_sources(temp.path(), Path::new("src")).unwrap_err();
        assert!(matches!(err, BuildError::Precondition { .. }));
    }
}

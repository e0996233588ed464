//! Directory scanning
//!
//! Recursive listing of rotated files and classification of directories
//! that hold nothing but (transitively) empty directories.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// List every non-directory entry below `root`, depth first.
///
/// Any directory that cannot be read fails the whole scan.
pub fn list_all_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    collect_files(root, &mut result)?;
    Ok(result)
}

fn collect_files(dir: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::scan(dir, format!("Failed to read directory: {}", e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::scan(dir, format!("Failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            Error::scan(&path, format!("Failed to stat entry: {}", e))
        })?;

        if file_type.is_dir() {
            collect_files(&path, result)?;
        } else {
            result.push(path);
        }
    }

    Ok(())
}

/// List every directory strictly below `root` that is empty.
///
/// A directory is empty when it has no entries, or when all of its entries
/// are directories that are themselves empty. Children come before their
/// parents, so removing the list in order never hits a non-empty directory.
pub fn list_empty_directories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    classify(root, true, &mut result)?;
    Ok(result)
}

fn classify(dir: &Path, is_root: bool, result: &mut Vec<PathBuf>) -> Result<bool> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::scan(dir, format!("Failed to read directory: {}", e))
    })?;

    let mut empty = true;
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::scan(dir, format!("Failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).map_err(|e| {
            Error::scan(&path, format!("Failed to stat entry: {}", e))
        })?;

        // Every child is classified, even after the parent is known non-empty
        let child_empty = is_dir && classify(&path, false, result)?;
        empty &= child_empty;
    }

    if empty && !is_root {
        result.push(dir.to_path_buf());
    }
    Ok(empty)
}

/// Remove every empty directory below `root`, returning how many went away.
///
/// Individual removal failures are logged and skipped.
pub fn remove_empty_directories(root: &Path) -> Result<usize> {
    let mut removed = 0;
    for dir in list_empty_directories(root)? {
        match fs::remove_dir(&dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "removed empty directory");
                removed += 1;
            }
            Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove empty directory"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_list_all_files() -> Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();

        touch(&root.join("a.log"));
        touch(&root.join("2023/05/15.log"));
        touch(&root.join("2023/06/01[1].log"));
        fs::create_dir_all(root.join("empty/deeper"))?;

        let files: HashSet<_> = list_all_files(root)?.into_iter().collect();
        let expected: HashSet<_> = [
            root.join("a.log"),
            root.join("2023/05/15.log"),
            root.join("2023/06/01[1].log"),
        ]
        .into_iter()
        .collect();
        assert_eq!(files, expected);
        Ok(())
    }

    #[test]
    fn test_list_all_files_missing_root() {
        let temp_dir = tempdir().unwrap();
        let err = list_all_files(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Scan { .. }));
    }

    #[test]
    fn test_empty_directory_classification() -> Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();

        // a/ is empty only through empty children
        fs::create_dir_all(root.join("a/b/c"))?;
        fs::create_dir_all(root.join("a/d"))?;
        // e/ has a file deep inside, but e/g is empty on its own
        touch(&root.join("e/f/file.log"));
        fs::create_dir_all(root.join("e/g"))?;
        // h/ mixes a file with an empty directory
        touch(&root.join("h/file.log"));
        fs::create_dir_all(root.join("h/i"))?;

        let empty = list_empty_directories(root)?;
        let set: HashSet<_> = empty.iter().cloned().collect();
        let expected: HashSet<_> = [
            root.join("a"),
            root.join("a/b"),
            root.join("a/b/c"),
            root.join("a/d"),
            root.join("e/g"),
            root.join("h/i"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set, expected);
        assert_eq!(empty.len(), expected.len());

        // Children always precede their parents
        let pos = |p: PathBuf| empty.iter().position(|x| *x == p).unwrap();
        assert!(pos(root.join("a/b/c")) < pos(root.join("a/b")));
        assert!(pos(root.join("a/b")) < pos(root.join("a")));
        Ok(())
    }

    #[test]
    fn test_root_is_never_listed() -> Result<()> {
        let temp_dir = tempdir()?;
        assert!(list_empty_directories(temp_dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_remove_empty_directories() -> Result<()> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("2023/05/15"))?;
        touch(&root.join("2023/06/01.log"));

        let removed = remove_empty_directories(root)?;
        assert_eq!(removed, 2);
        assert!(!root.join("2023/05").exists());
        assert!(root.join("2023/06/01.log").exists());
        assert!(root.exists());
        Ok(())
    }
}

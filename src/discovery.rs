use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{io_error, CbsError};

/// Finds the `.cbs` sources named on the command line.
///
/// Files are taken as given whatever their extension; directories are
/// walked recursively for `.cbs` files. The result is sorted and free of
/// duplicates so batches are processed in a deterministic order.
#[derive(Debug)]
pub struct SourceDiscoverer;

impl SourceDiscoverer {
    // =====================
    // Public API - File Discovery
    // =====================

    pub fn discover<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>, CbsError> {
        let mut files = Vec::new();
        for root in roots {
            let root = root.as_ref();
            if root.is_file() {
                files.push(root.to_path_buf());
                continue;
            }
            files.extend(Self::discover_cbs_files(root)?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Recursively scans a directory for `.cbs` files.
    pub fn discover_cbs_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, CbsError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root.as_ref()) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .unwrap_or_else(|| root.as_ref())
                    .display()
                    .to_string();
                io_error(&path, &std::io::Error::from(e))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !Self::is_cbs_file(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    // =====================
    // Internal - File System Utilities
    // =====================

    /// Returns true if the given path has a .cbs extension.
    fn is_cbs_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "cbs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/b.cbs"), "Type b").unwrap();
        fs::write(dir.path().join("a.cbs"), "Type a").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes").unwrap();

        let files = SourceDiscoverer::discover(&[dir.path()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.cbs"), PathBuf::from("nested/b.cbs")]);
    }

    #[test]
    fn explicit_files_are_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        fs::write(&file, "Type x").unwrap();
        let files = SourceDiscoverer::discover(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_roots_are_io_errors() {
        let err = SourceDiscoverer::discover(&[Path::new("/nonexistent/cbs-dir")]).unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Io);
    }
}

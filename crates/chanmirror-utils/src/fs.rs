use std::{ffi::OsString, fs, io::ErrorKind, path::Path};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Removes the specified file or directory safely.
    ///
    /// If the path does not exist, this function returns `Ok(())` without error. If the path
    /// points to a directory, it and all of its contents are removed recursively, equivalent to
    /// [`std::fs::remove_dir_all`]. If the path points to a file, it is removed with
    /// [`std::fs::remove_file`].
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError::File`] if the removal fails for any reason other than
    /// the path not existing (e.g., permission denied, path is in use, etc.).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chanmirror_utils::error::FileSystemResult;
    /// use chanmirror_utils::fs::{FileSystemProvider, StandardFileSystemProvider};
    ///
    /// fn main() -> FileSystemResult<()> {
    ///     let fs = StandardFileSystemProvider;
    ///     fs.safe_remove("/srv/mirror/noarch/stale.tar.bz2")?;
    ///     Ok(())
    /// }
    /// ```
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Creates a directory structure if it doesn't exist.
    ///
    /// If the directory already exists, this function does nothing. If the path exists but
    /// is not a directory, this function returns an error.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Lists the names of the regular files directly inside `dir`, sorted.
    ///
    /// Returns `Ok(None)` when the directory does not exist. Subdirectories and symlinks to
    /// directories are skipped. Names are returned as found on disk, including those that
    /// are not valid UTF-8.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    /// * [`FileSystemError::Directory`] if the directory cannot be read.
    fn list_files<P: AsRef<Path>>(&self, dir: P) -> FileSystemResult<Option<Vec<OsString>>>;

    /// Replaces the contents of `path` with `contents`.
    ///
    /// The data is written to a hidden sibling file first and then renamed over `path`,
    /// so readers never observe a partially written file.
    fn atomic_write<P: AsRef<Path>>(&self, path: P, contents: &[u8]) -> FileSystemResult<()>;
}

#[derive(Default, Clone)]
pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(());
        }

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        result.map_err(|err| {
            FileSystemError::File {
                path: path.to_path_buf(),
                action: "remove",
                source: err,
            }
        })
    }

    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).map_err(|err| {
                FileSystemError::Directory {
                    path: path.to_path_buf(),
                    action: "create",
                    source: err,
                }
            })?;
        } else if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn list_files<P: AsRef<Path>>(&self, dir: P) -> FileSystemResult<Option<Vec<OsString>>> {
        let dir = dir.as_ref();
        let read_failed = |err| {
            FileSystemError::Directory {
                path: dir.to_path_buf(),
                action: "read",
                source: err,
            }
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(_) if !dir.is_dir() => {
                return Err(FileSystemError::NotADirectory {
                    path: dir.to_path_buf(),
                })
            }
            Err(err) => return Err(read_failed(err)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(read_failed)?;
            if entry.path().is_file() {
                files.push(entry.file_name());
            }
        }
        files.sort();

        Ok(Some(files))
    }

    fn atomic_write<P: AsRef<Path>>(&self, path: P, contents: &[u8]) -> FileSystemResult<()> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).map_err(|err| {
            FileSystemError::File {
                path: tmp_path.clone(),
                action: "write",
                source: err,
            }
        })?;

        fs::rename(&tmp_path, path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            FileSystemError::File {
                path: path.to_path_buf(),
                action: "replace",
                source: err,
            }
        })
    }
}

/// Creates a directory structure if it doesn't exist.
///
/// See [`FileSystemProvider::ensure_dir_exists`] for detailed documentation.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

/// Removes the specified file or directory safely.
///
/// See [`FileSystemProvider::safe_remove`] for detailed documentation.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.safe_remove(path)
}

/// Lists regular files in a directory.
///
/// See [`FileSystemProvider::list_files`] for detailed documentation.
pub fn list_files<P: AsRef<Path>>(dir: P) -> FileSystemResult<Option<Vec<OsString>>> {
    StandardFileSystemProvider.list_files(dir)
}

/// Writes a file through a temporary sibling and a rename.
///
/// See [`FileSystemProvider::atomic_write`] for detailed documentation.
pub fn atomic_write<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    StandardFileSystemProvider.atomic_write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_safe_remove_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_file.txt");
        fs::write(&file_path, "hello").unwrap();
        safe_remove(&file_path).unwrap();
        assert!(!file_path.exists());
    }

    #[test]
    fn test_safe_remove_non_existent() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("non_existent.txt");
        safe_remove(&file_path).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("linux-64");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());

        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(ensure_dir_exists(&file_path).is_err());
    }

    #[test]
    fn test_list_files_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(list_files(dir.path().join("noarch")).unwrap().is_none());
    }

    #[test]
    fn test_list_files_sorted_and_skips_dirs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.conda"), "b").unwrap();
        fs::write(dir.path().join("a.tar.bz2"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = list_files(dir.path()).unwrap().unwrap();
        assert_eq!(files, vec![OsString::from("a.tar.bz2"), OsString::from("b.conda")]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_files_keeps_non_utf8_names() {
        use std::os::unix::ffi::OsStringExt;

        let dir = tempdir().unwrap();
        let raw = OsString::from_vec(b"junk\xff.conda".to_vec());
        fs::write(dir.path().join(&raw), "junk").unwrap();
        fs::write(dir.path().join("a.conda"), "a").unwrap();

        let files = list_files(dir.path()).unwrap().unwrap();
        assert_eq!(files, vec![OsString::from("a.conda"), raw]);
    }

    #[test]
    fn test_list_files_on_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(matches!(
            list_files(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("repodata.json");
        fs::write(&path, "old").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join(".repodata.json.tmp").exists());
    }

    #[test]
    fn test_atomic_write_missing_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("repodata.json");
        assert!(atomic_write(&path, b"data").is_err());
    }
}

use std::{fs, path::Path};

use chanmirror_utils::{error::HashError, hash::calculate_sha256};

use crate::{error::IntegrityError, package::PackageRecord};

/// Decides whether a file on disk is the artifact a [`PackageRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    /// Compare SHA-256 digests in addition to sizes.
    pub check_sha256: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            check_sha256: true,
        }
    }
}

impl Validator {
    pub fn new(check_sha256: bool) -> Self {
        Self {
            check_sha256,
        }
    }

    /// Checks, in order: the file is non-empty, its length equals `record.size`, and (when
    /// enabled) its SHA-256 equals `record.sha256`, ignoring case.
    pub fn validate(&self, record: &PackageRecord, path: &Path) -> Result<(), IntegrityError> {
        let metadata = fs::metadata(path).map_err(|err| {
            IntegrityError::Unreadable {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        let actual = metadata.len();
        if actual == 0 {
            return Err(IntegrityError::EmptyFile {
                path: path.to_path_buf(),
            });
        }
        if actual != record.size {
            return Err(IntegrityError::SizeMismatch {
                path: path.to_path_buf(),
                expected: record.size,
                actual,
            });
        }

        if self.check_sha256 {
            let digest = calculate_sha256(path).map_err(|err| {
                match err {
                    HashError::ReadFailed {
                        path,
                        source,
                    } => {
                        IntegrityError::Unreadable {
                            path,
                            source,
                        }
                    }
                }
            })?;
            if !digest.eq_ignore_ascii_case(&record.sha256) {
                return Err(IntegrityError::HashMismatch {
                    path: path.to_path_buf(),
                    expected: record.sha256.clone(),
                    actual: digest,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chanmirror_utils::hash::hash_bytes;
    use tempfile::tempdir;

    use super::*;

    fn record_for(data: &[u8]) -> PackageRecord {
        PackageRecord {
            platform: "noarch".into(),
            filename: "pkg-1.0-0.tar.bz2".into(),
            name: "pkg".into(),
            version: "1.0".into(),
            build: "0".into(),
            build_number: 0,
            depends: Vec::new(),
            url: "https://example.org/noarch/pkg-1.0-0.tar.bz2".into(),
            size: data.len() as u64,
            sha256: hash_bytes(data),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg-1.0-0.tar.bz2");
        fs::write(&path, b"package bytes").unwrap();

        let mut record = record_for(b"package bytes");
        Validator::default().validate(&record, &path).unwrap();

        record.sha256 = record.sha256.to_uppercase();
        assert!(Validator::default().validate(&record, &path).is_ok());
    }

    #[test]
    fn test_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg-1.0-0.tar.bz2");
        fs::write(&path, b"").unwrap();

        let err = Validator::default()
            .validate(&record_for(b""), &path)
            .unwrap_err();
        assert!(matches!(err, IntegrityError::EmptyFile { .. }));
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg-1.0-0.tar.bz2");
        fs::write(&path, b"short").unwrap();

        let err = Validator::default()
            .validate(&record_for(b"much longer"), &path)
            .unwrap_err();
        assert!(matches!(
            err,
            IntegrityError::SizeMismatch {
                expected: 11,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_hash_mismatch_and_size_only_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkg-1.0-0.tar.bz2");
        fs::write(&path, b"bytes-B").unwrap();
        let record = record_for(b"bytes-A");

        let err = Validator::default().validate(&record, &path).unwrap_err();
        assert!(matches!(err, IntegrityError::HashMismatch { .. }));

        Validator::new(false).validate(&record, &path).unwrap();
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = Validator::default()
            .validate(&record_for(b"x"), &dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, IntegrityError::Unreadable { .. }));
    }
}

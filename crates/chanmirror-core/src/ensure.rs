use std::{fs, path::Path, sync::Arc};

use chanmirror_dl::{download::Download, transport::Transport, types::Progress};
use chanmirror_utils::fs::ensure_dir_exists;
use tracing::{debug, info, warn};

use crate::{error::EnsureError, package::PackageRecord, validate::Validator};

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// A valid copy was already on disk.
    Present,
    Downloaded,
    /// Dry run: the package is missing or invalid and would be fetched.
    WouldDownload,
}

fn remove_file(path: &Path) -> Result<(), EnsureError> {
    fs::remove_file(path).map_err(|err| {
        EnsureError::Io {
            action: format!("removing {}", path.display()),
            source: err,
        }
    })
}

/// Makes `repo_root/platform/filename` a verified copy of `record`.
///
/// An invalid existing file is deleted before the download, and a download that fails
/// validation is deleted again. A dry run never touches the filesystem. A record whose
/// platform or file name would resolve outside `repo_root/platform` is refused.
pub fn ensure(
    record: &PackageRecord,
    repo_root: &Path,
    dry_run: bool,
    transport: &dyn Transport,
    validator: &Validator,
    chunk_size: usize,
    progress: Option<ProgressCallback>,
) -> Result<EnsureOutcome, EnsureError> {
    if !record.has_safe_path() {
        return Err(EnsureError::UnsafePath {
            platform: record.platform.clone(),
            filename: record.filename.clone(),
        });
    }

    let package_dir = repo_root.join(&record.platform);
    let target = package_dir.join(&record.filename);

    if target.exists() {
        match validator.validate(record, &target) {
            Ok(()) => {
                debug!("{} is already valid", target.display());
                return Ok(EnsureOutcome::Present);
            }
            Err(err) => {
                warn!("{}", err);
                if !dry_run {
                    remove_file(&target)?;
                }
            }
        }
    }

    if dry_run {
        return Ok(EnsureOutcome::WouldDownload);
    }

    ensure_dir_exists(&package_dir)?;

    info!("Downloading {}", record.url);
    let mut download = Download::new(&record.url, &target).chunk_size(chunk_size);
    if let Some(cb) = progress {
        download = download.progress(move |p| cb(p));
    }
    download.execute(transport)?;

    if let Err(err) = validator.validate(record, &target) {
        remove_file(&target)?;
        return Err(err.into());
    }

    Ok(EnsureOutcome::Downloaded)
}

use std::{ffi::OsString, path::Path};

use chanmirror_events::{EventSink, LogLevel, MirrorEvent};
use chanmirror_utils::fs::{list_files, safe_remove};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    constants::{REPODATA_FILENAME, RESERVED_FILENAMES},
    package::{PackageRecord, PlatformPackages},
    repodata::load_repodata,
    validate::Validator,
    MirrorResult,
};

/// What is on disk for one platform, as seen by the local index.
///
/// `packages`, `invalid_packages` and `unknown_files` are disjoint; the two lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocalRepositoryState {
    pub platform: String,
    pub packages: PlatformPackages,
    pub invalid_packages: Vec<String>,
    pub unknown_files: Vec<String>,
    pub removed: bool,
    pub removed_files: Vec<String>,
    pub degraded: bool,
}

impl LocalRepositoryState {
    fn empty(platform: &str, removed: bool) -> Self {
        Self {
            platform: platform.to_string(),
            removed,
            ..Default::default()
        }
    }
}

/// Classifies every file of `repo_root/platform` against the local `repodata.json`.
///
/// A missing platform directory is an empty state. An index that cannot be read or parsed
/// marks every file unknown and sets `degraded`; nothing is removed in that case. With
/// `remove`, invalid and unknown files are deleted and their names moved to
/// `removed_files`. File names that are not valid UTF-8 are reported lossily as unknown.
pub fn analyze(
    repo_root: &Path,
    platform: &str,
    remove: bool,
    validator: &Validator,
    events: &dyn EventSink,
) -> MirrorResult<LocalRepositoryState> {
    let package_dir = repo_root.join(platform);
    let mut state = LocalRepositoryState::empty(platform, remove);

    let Some(files) = list_files(&package_dir)? else {
        debug!("{} does not exist, nothing to analyze", package_dir.display());
        return Ok(state);
    };

    // Names are kept as found on disk so undecodable ones can still be removed.
    let candidates: Vec<(String, OsString)> = files
        .into_iter()
        .filter(|raw| {
            !RESERVED_FILENAMES
                .iter()
                .any(|reserved| raw.to_str() == Some(*reserved))
        })
        .map(|raw| (raw.to_string_lossy().into_owned(), raw))
        .collect();

    let undecodable = candidates
        .iter()
        .filter(|(_, raw)| raw.to_str().is_none())
        .count();
    if undecodable > 0 {
        warn!(
            "{} file names in {} are not valid UTF-8",
            undecodable,
            package_dir.display()
        );
    }

    let repodata_path = package_dir.join(REPODATA_FILENAME);
    let declared = match load_repodata(&repodata_path) {
        Ok(Some(document)) => document.packages,
        Ok(None) => {
            debug!("{} has no index", package_dir.display());
            PlatformPackages::new()
        }
        Err(err) => {
            warn!("Can't decode current repodata in {}: {}", repodata_path.display(), err);
            events.emit(MirrorEvent::Log {
                level: LogLevel::Warning,
                message: format!("{}: {err}", repodata_path.display()),
            });
            state.unknown_files = candidates.into_iter().map(|(name, _)| name).collect();
            state.unknown_files.sort();
            state.degraded = true;
            return Ok(state);
        }
    };

    let checked: Vec<(String, OsString, Option<(PackageRecord, bool)>)> = candidates
        .into_par_iter()
        .map(|(name, raw)| {
            let verdict = raw
                .to_str()
                .and_then(|filename| declared.get(filename))
                .map(|record| {
                    let path = package_dir.join(&raw);
                    let valid = match validator.validate(record, &path) {
                        Ok(()) => true,
                        Err(err) => {
                            debug!("{}", err);
                            false
                        }
                    };
                    (record.clone(), valid)
                });
            (name, raw, verdict)
        })
        .collect();

    let mut doomed: Vec<(String, OsString)> = Vec::new();
    for (name, raw, verdict) in checked {
        match verdict {
            Some((record, true)) => {
                state.packages.insert(name, record);
                continue;
            }
            Some((_, false)) => state.invalid_packages.push(name.clone()),
            None => state.unknown_files.push(name.clone()),
        }
        doomed.push((name, raw));
    }
    state.invalid_packages.sort();
    state.unknown_files.sort();

    if remove {
        doomed.sort();
        state.invalid_packages.clear();
        state.unknown_files.clear();

        for (name, raw) in doomed {
            let path = package_dir.join(&raw);
            info!("Removing '{}' invalid file", path.display());
            safe_remove(&path)?;
            events.emit(MirrorEvent::FileRemoved {
                platform: platform.to_string(),
                filename: name.clone(),
            });
            state.removed_files.push(name);
        }
    }

    Ok(state)
}

use std::{collections::BTreeSet, fs, path::Path};

use chanmirror_core::{
    constants::REPODATA_FILENAME,
    error::{ErrorContext, MirrorError},
    MirrorResult,
};

/// Reads a newline-delimited packages list.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn read_packages_list(path: &Path) -> MirrorResult<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading packages list {}", path.display()))?;
    Ok(parse_packages_list(&content))
}

pub fn parse_packages_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// `configured` plus every subdirectory of `repo_root` that holds a `repodata.json`.
pub fn local_platforms(repo_root: &Path, configured: &[String]) -> MirrorResult<Vec<String>> {
    let mut platforms: BTreeSet<String> = configured.iter().cloned().collect();

    let entries = match fs::read_dir(repo_root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(platforms.into_iter().collect())
        }
        Err(err) => {
            return Err(MirrorError::IoError {
                action: format!("reading directory {}", repo_root.display()),
                source: err,
            })
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() && path.join(REPODATA_FILENAME).is_file() {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                platforms.insert(name.to_string());
            }
        }
    }

    Ok(platforms.into_iter().collect())
}

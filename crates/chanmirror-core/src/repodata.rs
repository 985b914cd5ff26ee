use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use bzip2::{read::MultiBzDecoder, write::BzEncoder, Compression};
use chanmirror_utils::fs::{atomic_write, ensure_dir_exists};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    constants::{REPODATA_FILENAME, REPODATA_FILENAME_COMPRESSED},
    error::RepodataError,
    package::{PackageRecord, PlatformPackages},
    MirrorResult,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepodataInfo {
    #[serde(default)]
    pub subdir: String,
}

/// The per-platform index: `{"info": {"subdir": ...}, "packages": {fn: record}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepodataDocument {
    pub info: RepodataInfo,
    pub packages: PlatformPackages,
}

#[derive(Deserialize)]
struct RawRepodata {
    #[serde(default)]
    info: Option<RepodataInfo>,
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
    #[serde(default, rename = "packages.conda")]
    packages_conda: BTreeMap<String, PackageRecord>,
}

impl RepodataDocument {
    pub fn new(platform: &str, packages: PlatformPackages) -> Self {
        Self {
            info: RepodataInfo {
                subdir: platform.to_string(),
            },
            packages,
        }
    }

    /// Parses a repodata document.
    ///
    /// Entries of `packages.conda` are folded into `packages`. Records without `fn` take the
    /// map key, records without `subdir` take `info.subdir`, falling back to
    /// `default_subdir` when the document does not name its platform.
    pub fn from_slice(
        bytes: &[u8],
        origin: &str,
        default_subdir: Option<&str>,
    ) -> Result<Self, RepodataError> {
        let raw: RawRepodata = serde_json::from_slice(bytes).map_err(|source| {
            RepodataError::Parse {
                origin: origin.to_string(),
                source,
            }
        })?;

        let mut subdir = raw.info.map(|info| info.subdir).unwrap_or_default();
        if subdir.is_empty() {
            subdir = default_subdir.unwrap_or_default().to_string();
        }

        let mut packages = raw.packages;
        for (filename, record) in raw.packages_conda {
            packages.entry(filename).or_insert(record);
        }
        for (filename, record) in packages.iter_mut() {
            if record.filename.is_empty() {
                record.filename = filename.clone();
            }
            if record.platform.is_empty() {
                record.platform = subdir.clone();
            }
        }

        Ok(Self {
            info: RepodataInfo {
                subdir,
            },
            packages,
        })
    }

    /// Serializes the document in canonical form.
    ///
    /// Object keys are sorted at every level, indentation is two spaces, non-ASCII characters
    /// are written as `\uXXXX` escapes, no line carries trailing whitespace and the output
    /// ends with exactly one newline.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, RepodataError> {
        let value = serde_json::to_value(self).map_err(RepodataError::Serialize)?;
        let pretty =
            serde_json::to_string_pretty(&sort_keys(value)).map_err(RepodataError::Serialize)?;

        let mut out = String::with_capacity(pretty.len() + 1);
        for line in escape_non_ascii(&pretty).lines() {
            out.push_str(line.trim_end());
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// Outside string literals JSON is pure ASCII, so escaping every non-ASCII char is safe.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

pub fn compress_bz2(data: &[u8]) -> Result<Vec<u8>, RepodataError> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(RepodataError::Compress)?;
    encoder.finish().map_err(RepodataError::Compress)
}

pub fn decompress_bz2(data: &[u8]) -> Result<Vec<u8>, RepodataError> {
    let mut out = Vec::new();
    MultiBzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(RepodataError::Decompress)?;
    Ok(out)
}

/// Reads `path` as a repodata document. A missing file is `Ok(None)`.
///
/// The parent directory name is used as the platform when the document does not declare one.
pub fn load_repodata(path: &Path) -> Result<Option<RepodataDocument>, RepodataError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(RepodataError::Read {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    let default_subdir = path
        .parent()
        .and_then(|parent| parent.file_name())
        .and_then(|name| name.to_str());

    RepodataDocument::from_slice(&bytes, &path.display().to_string(), default_subdir).map(Some)
}

/// Copies every entry of `old` whose file name is absent from `new` and returns how many were
/// carried over. Entries present in both keep the value from `new`.
pub fn merge(old: &PlatformPackages, new: &mut PlatformPackages) -> usize {
    let mut count = 0;
    for (filename, record) in old {
        if !new.contains_key(filename) {
            new.insert(filename.clone(), record.clone());
            count += 1;
        }
    }
    count
}

/// Writes `repodata.json` and `repodata.json.bz2` for `platform` under `repo_root`.
///
/// Both files hold the same canonical bytes; each is replaced through a temporary sibling so
/// an interrupted write leaves the previous file intact. Returns the path of the plain index.
pub fn write_repodata(
    platform: &str,
    repo_root: &Path,
    packages: &PlatformPackages,
) -> MirrorResult<PathBuf> {
    let package_dir = repo_root.join(platform);
    ensure_dir_exists(&package_dir)?;

    let document = RepodataDocument::new(platform, packages.clone());
    let data = document.to_canonical_bytes()?;
    debug!(
        "serialized {} packages for {} ({} bytes)",
        packages.len(),
        platform,
        data.len()
    );

    let json_path = package_dir.join(REPODATA_FILENAME);
    atomic_write(&json_path, &data)?;
    info!("Written {}", json_path.display());

    let bz2_path = package_dir.join(REPODATA_FILENAME_COMPRESSED);
    atomic_write(&bz2_path, &compress_bz2(&data)?)?;
    info!("Written {}", bz2_path.display());

    Ok(json_path)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn record(platform: &str, filename: &str, name: &str) -> PackageRecord {
        PackageRecord {
            platform: platform.to_string(),
            filename: filename.to_string(),
            name: name.to_string(),
            version: "1.0".to_string(),
            build: "0".to_string(),
            build_number: 0,
            depends: Vec::new(),
            url: format!("https://example.org/{platform}/{filename}"),
            size: 1024,
            sha256: "b".repeat(64),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_canonical_bytes_layout() {
        let mut packages = PlatformPackages::new();
        let mut rec = record("linux-64", "a-1.0-0.conda", "a");
        rec.extra.insert("license".into(), json!("MIT"));
        packages.insert(rec.filename.clone(), rec);

        let bytes = RepodataDocument::new("linux-64", packages)
            .to_canonical_bytes()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("{\n  \"info\": {\n    \"subdir\": \"linux-64\"\n  },\n"));
        assert!(text.ends_with("}\n"));
        assert!(!text.ends_with("}\n\n"));
        assert!(text.lines().all(|line| line == line.trim_end()));

        let keys: Vec<_> = text
            .lines()
            .filter(|line| line.starts_with("      \""))
            .map(|line| line.trim().split('"').nth(1).unwrap().to_string())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"fn".to_string()));
        assert!(keys.contains(&"subdir".to_string()));
    }

    #[test]
    fn test_canonical_bytes_empty_packages() {
        let bytes = RepodataDocument::new("noarch", PlatformPackages::new())
            .to_canonical_bytes()
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\n  \"info\": {\n    \"subdir\": \"noarch\"\n  },\n  \"packages\": {}\n}\n"
        );
    }

    #[test]
    fn test_escape_non_ascii() {
        assert_eq!(escape_non_ascii("\"caf\u{e9}\""), "\"caf\\u00e9\"");
        assert_eq!(escape_non_ascii("\u{1f600}"), "\\ud83d\\ude00");
        assert_eq!(escape_non_ascii("plain"), "plain");
        assert_eq!(escape_non_ascii("del\u{7f}"), "del\u{7f}");
    }

    #[test]
    fn test_bz2_round_trip() {
        let data = b"{\n  \"packages\": {}\n}\n".repeat(50);
        let compressed = compress_bz2(&data).unwrap();
        assert!(compressed.starts_with(b"BZh"));
        assert_eq!(decompress_bz2(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decompress_garbage() {
        assert!(decompress_bz2(b"definitely not bzip2").is_err());
    }

    #[test]
    fn test_from_slice_fills_missing_fields() {
        let doc = RepodataDocument::from_slice(
            br#"{
                "info": {"subdir": "linux-64"},
                "packages": {"a-1.0-0.tar.bz2": {"name": "a", "version": "1.0"}},
                "packages.conda": {"b-2.0-0.conda": {"name": "b", "version": "2.0", "subdir": "linux-64"}}
            }"#,
            "inline",
            None,
        )
        .unwrap();

        assert_eq!(doc.info.subdir, "linux-64");
        assert_eq!(doc.packages.len(), 2);
        let a = &doc.packages["a-1.0-0.tar.bz2"];
        assert_eq!(a.filename, "a-1.0-0.tar.bz2");
        assert_eq!(a.platform, "linux-64");
        assert_eq!(doc.packages["b-2.0-0.conda"].filename, "b-2.0-0.conda");
    }

    #[test]
    fn test_from_slice_default_subdir() {
        let doc = RepodataDocument::from_slice(
            br#"{"packages": {"a.conda": {"name": "a", "version": "1"}}}"#,
            "inline",
            Some("noarch"),
        )
        .unwrap();
        assert_eq!(doc.info.subdir, "noarch");
        assert_eq!(doc.packages["a.conda"].platform, "noarch");
    }

    #[test]
    fn test_from_slice_malformed() {
        let err = RepodataDocument::from_slice(b"{not json", "broken.json", None).unwrap_err();
        assert!(matches!(err, RepodataError::Parse { .. }));
    }

    #[test]
    fn test_merge_retains_old_entries() {
        let mut old = PlatformPackages::new();
        old.insert("a.conda".into(), record("noarch", "a.conda", "a"));
        let mut stale_b = record("noarch", "b.conda", "b");
        stale_b.size = 1;
        old.insert("b.conda".into(), stale_b);

        let mut new = PlatformPackages::new();
        new.insert("b.conda".into(), record("noarch", "b.conda", "b"));

        assert_eq!(merge(&old, &mut new), 1);
        assert_eq!(new.len(), 2);
        assert_eq!(new["b.conda"].size, 1024);
        assert!(new.contains_key("a.conda"));
    }

    #[test]
    fn test_write_and_load_repodata() {
        let dir = tempdir().unwrap();
        let mut packages = PlatformPackages::new();
        packages.insert(
            "a-1.0-0.conda".into(),
            record("linux-64", "a-1.0-0.conda", "a"),
        );

        let path = write_repodata("linux-64", dir.path(), &packages).unwrap();
        assert_eq!(path, dir.path().join("linux-64").join(REPODATA_FILENAME));

        let plain = fs::read(&path).unwrap();
        let compressed = fs::read(dir.path().join("linux-64").join(REPODATA_FILENAME_COMPRESSED)).unwrap();
        assert_eq!(decompress_bz2(&compressed).unwrap(), plain);

        let loaded = load_repodata(&path).unwrap().unwrap();
        assert_eq!(loaded.packages, packages);

        write_repodata("linux-64", dir.path(), &packages).unwrap();
        assert_eq!(fs::read(&path).unwrap(), plain);
    }

    #[test]
    fn test_load_repodata_missing() {
        let dir = tempdir().unwrap();
        assert!(load_repodata(&dir.path().join(REPODATA_FILENAME))
            .unwrap()
            .is_none());
    }
}

use std::collections::{btree_map, BTreeMap};

use chanmirror_utils::{hash::is_sha256_hex, path::is_single_component};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Packages of one platform, keyed by file name.
pub type PlatformPackages = BTreeMap<String, PackageRecord>;

/// Metadata for one downloadable package artifact, as it appears in `repodata.json`.
///
/// Fields the mirror does not interpret (`md5`, `license`, `timestamp`, `constrains`, ...)
/// are kept in [`PackageRecord::extra`] so they survive a load/write cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(rename = "subdir", default)]
    pub platform: String,

    #[serde(rename = "fn", default)]
    pub filename: String,

    pub name: String,

    pub version: String,

    #[serde(default)]
    pub build: String,

    #[serde(default)]
    pub build_number: u64,

    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PackageRecord {
    /// Whether the record carries everything needed to fetch and verify the artifact.
    pub fn is_mirrorable(&self) -> bool {
        self.has_safe_path()
            && !self.url.is_empty()
            && self.size > 0
            && is_sha256_hex(&self.sha256)
    }

    /// Whether `platform` and `filename` each name a single path component, so the artifact
    /// lands directly inside `<root>/<platform>/`.
    pub fn has_safe_path(&self) -> bool {
        is_single_component(&self.platform) && is_single_component(&self.filename)
    }

    /// `name-version-build`, the conventional display form.
    pub fn dist_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }
}

/// Resolved packages grouped by platform.
///
/// Inserting a `(platform, filename)` pair that is already present keeps the first record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedSet {
    platforms: BTreeMap<String, PlatformPackages>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record`, returning `false` if its key was already taken.
    pub fn insert(&mut self, record: PackageRecord) -> bool {
        let packages = self.platforms.entry(record.platform.clone()).or_default();
        match packages.entry(record.filename.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, platform: &str) -> Option<&PlatformPackages> {
        self.platforms.get(platform)
    }

    /// Platforms that have at least one package, in sorted order.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms
            .iter()
            .filter(|(_, packages)| !packages.is_empty())
            .map(|(platform, _)| platform.as_str())
    }

    pub fn len(&self) -> usize {
        self.platforms.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlatformPackages)> {
        self.platforms.iter()
    }
}

impl FromIterator<PackageRecord> for ResolvedSet {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(platform: &str, filename: &str, size: u64) -> PackageRecord {
        PackageRecord {
            platform: platform.to_string(),
            filename: filename.to_string(),
            name: "zlib".to_string(),
            version: "1.3.1".to_string(),
            build: "h4ab18f5_1".to_string(),
            build_number: 1,
            depends: vec!["libgcc-ng >=12".to_string()],
            url: format!("https://example.org/{platform}/{filename}"),
            size,
            sha256: "a".repeat(64),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_record_serde_renames_and_extra_fields() {
        let value = json!({
            "subdir": "linux-64",
            "fn": "zlib-1.3.1-h4ab18f5_1.conda",
            "name": "zlib",
            "version": "1.3.1",
            "build": "h4ab18f5_1",
            "build_number": 1,
            "depends": ["libgcc-ng >=12"],
            "size": 1024,
            "sha256": "a".repeat(64),
            "md5": "0123456789abcdef0123456789abcdef",
            "license": "Zlib",
            "timestamp": 1716874300000u64
        });

        let rec: PackageRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(rec.platform, "linux-64");
        assert_eq!(rec.filename, "zlib-1.3.1-h4ab18f5_1.conda");
        assert_eq!(rec.extra.get("license"), Some(&json!("Zlib")));
        assert!(rec.url.is_empty());

        assert_eq!(serde_json::to_value(&rec).unwrap(), value);
    }

    #[test]
    fn test_record_missing_optional_fields() {
        let rec: PackageRecord = serde_json::from_value(json!({
            "name": "tzdata",
            "version": "2024a"
        }))
        .unwrap();
        assert!(rec.filename.is_empty());
        assert!(rec.depends.is_empty());
        assert_eq!(rec.size, 0);
        assert!(!rec.is_mirrorable());
    }

    #[test]
    fn test_is_mirrorable() {
        assert!(record("noarch", "a.conda", 10).is_mirrorable());
        assert!(!record("noarch", "a.conda", 0).is_mirrorable());

        let mut rec = record("noarch", "a.conda", 10);
        rec.sha256 = "abc".into();
        assert!(!rec.is_mirrorable());
    }

    #[test]
    fn test_path_traversal_is_not_mirrorable() {
        let rec = record("noarch", "../../escaped.conda", 10);
        assert!(!rec.has_safe_path());
        assert!(!rec.is_mirrorable());

        let rec = record("..", "a.conda", 10);
        assert!(!rec.has_safe_path());

        let rec = record("linux-64", "sub\\a.conda", 10);
        assert!(!rec.is_mirrorable());
    }

    #[test]
    fn test_resolved_set_first_wins() {
        let mut set = ResolvedSet::new();
        assert!(set.insert(record("linux-64", "zlib.conda", 10)));
        assert!(!set.insert(record("linux-64", "zlib.conda", 99)));
        assert!(set.insert(record("noarch", "zlib.conda", 20)));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("linux-64").unwrap()["zlib.conda"].size, 10);
        assert_eq!(set.platforms().collect::<Vec<_>>(), vec!["linux-64", "noarch"]);
    }

    #[test]
    fn test_dist_name() {
        assert_eq!(
            record("linux-64", "x", 1).dist_name(),
            "zlib-1.3.1-h4ab18f5_1"
        );
    }
}

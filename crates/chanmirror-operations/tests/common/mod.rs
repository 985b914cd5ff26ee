#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use chanmirror_config::config::Config;
use chanmirror_core::{error::ResolutionError, package::PackageRecord, resolver::Resolver};
use chanmirror_dl::transport::{MemoryTransport, Transport};
use chanmirror_events::EventSinkHandle;
use chanmirror_operations::MirrorContext;
use chanmirror_utils::hash::hash_bytes;

pub const UPSTREAM: &str = "https://repo.example.org/main";

/// Answers each spec with a fixed list of records.
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<PackageRecord>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: &str, records: Vec<PackageRecord>) -> Self {
        self.table.insert(spec.to_string(), records);
        self
    }
}

impl Resolver for StaticResolver {
    fn resolve_spec(
        &self,
        spec: &str,
        _pinned: &[String],
        _exclude_pinned: bool,
    ) -> Result<Vec<PackageRecord>, ResolutionError> {
        self.table.get(spec).cloned().ok_or_else(|| {
            ResolutionError::NotFound {
                spec: spec.to_string(),
            }
        })
    }
}

pub fn artifact(platform: &str, name: &str, data: &[u8]) -> PackageRecord {
    let filename = format!("{name}-1.0-0.conda");
    PackageRecord {
        platform: platform.to_string(),
        url: format!("{UPSTREAM}/{platform}/{filename}"),
        filename,
        name: name.to_string(),
        version: "1.0".to_string(),
        build: "0".to_string(),
        build_number: 0,
        depends: Vec::new(),
        size: data.len() as u64,
        sha256: hash_bytes(data),
        extra: BTreeMap::new(),
    }
}

pub fn context(
    root: &Path,
    transport: Arc<MemoryTransport>,
    resolver: StaticResolver,
    events: EventSinkHandle,
) -> MirrorContext {
    let transport: Arc<dyn Transport> = transport;
    MirrorContext::new(Config::default_config(), events, transport, root)
        .with_resolver(Arc::new(resolver))
}

pub fn specs(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

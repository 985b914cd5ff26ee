use std::collections::BTreeMap;

use chanmirror_events::{EventSink, MirrorEvent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::ResolutionError,
    package::{PackageRecord, ResolvedSet},
};

/// Turns a package spec into the concrete records needed to install it.
///
/// Implementations must only return records with `url`, `size` and `sha256` populated.
pub trait Resolver: Send + Sync {
    /// Resolves `spec` together with its dependencies.
    ///
    /// With `exclude_pinned`, `pinned` only constrains the solution. Otherwise every pinned
    /// spec is installed alongside `spec`.
    fn resolve_spec(
        &self,
        spec: &str,
        pinned: &[String],
        exclude_pinned: bool,
    ) -> Result<Vec<PackageRecord>, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSpec {
    pub spec: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeSummary {
    pub total_size: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub resolved: ResolvedSet,
    pub failed: Vec<FailedSpec>,
}

impl Resolution {
    /// Total bytes and package count per platform.
    pub fn size_summary(&self) -> BTreeMap<String, SizeSummary> {
        self.resolved
            .iter()
            .filter(|(_, packages)| !packages.is_empty())
            .map(|(platform, packages)| {
                let summary = SizeSummary {
                    total_size: packages.values().map(|record| record.size).sum(),
                    count: packages.len(),
                };
                (platform.clone(), summary)
            })
            .collect()
    }
}

/// Resolves each spec on its own and unions the results.
///
/// A spec that fails is recorded in [`Resolution::failed`]; the remaining specs still
/// resolve. Blank specs are skipped. Records whose platform or file name is not a single
/// path component are dropped.
pub fn resolve(
    resolver: &dyn Resolver,
    specs: &[String],
    pinned: &[String],
    exclude_pinned: bool,
    events: &dyn EventSink,
) -> Resolution {
    let specs: Vec<&str> = specs
        .iter()
        .map(|spec| spec.trim())
        .filter(|spec| !spec.is_empty())
        .collect();

    events.emit(MirrorEvent::Resolving {
        total_specs: specs.len(),
    });

    let mut resolution = Resolution::default();
    for spec in specs {
        info!("Resolving {}", spec);
        match resolver.resolve_spec(spec, pinned, exclude_pinned) {
            Ok(records) => {
                let packages = records.len();
                let added = records
                    .into_iter()
                    .filter(|record| {
                        if record.has_safe_path() {
                            return true;
                        }
                        warn!(
                            "Ignoring {}/{} from {}: not a plain file name",
                            record.platform, record.filename, spec
                        );
                        false
                    })
                    .filter(|record| resolution.resolved.insert(record.clone()))
                    .count();
                debug!("{} -> {} packages ({} new)", spec, packages, added);
                events.emit(MirrorEvent::SpecResolved {
                    spec: spec.to_string(),
                    packages,
                });
            }
            Err(err) => {
                warn!("Failed to resolve {}: {}", spec, err);
                events.emit(MirrorEvent::SpecFailed {
                    spec: spec.to_string(),
                    reason: err.to_string(),
                });
                resolution.failed.push(FailedSpec {
                    spec: spec.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    resolution
}

/// Size of the dependency closure of `specs`, per platform.
pub fn closure_size(
    resolver: &dyn Resolver,
    specs: &[String],
    pinned: &[String],
    exclude_pinned: bool,
    events: &dyn EventSink,
) -> (Vec<FailedSpec>, BTreeMap<String, SizeSummary>) {
    let resolution = resolve(resolver, specs, pinned, exclude_pinned, events);
    let summary = resolution.size_summary();
    (resolution.failed, summary)
}

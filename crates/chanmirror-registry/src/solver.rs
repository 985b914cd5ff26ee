//! Greedy dependency resolution against a channel index.

use std::collections::{BTreeMap, HashMap};

use chanmirror_core::{error::ResolutionError, package::PackageRecord, resolver::Resolver};
use chanmirror_dl::transport::Transport;
use tracing::{debug, info};

use crate::{
    channel::Channel,
    error::Result,
    matchspec::MatchSpec,
    metadata::fetch_repodata,
    version::Version,
};

/// Resolves specs against the records of one channel.
///
/// For every requested name the newest candidate (then highest build number) that satisfies
/// all constraints seen so far is chosen and its dependencies followed depth first. A later
/// constraint that the chosen record violates is a conflict; there is no backtracking.
pub struct ChannelResolver {
    channel: Channel,
    index: HashMap<String, Vec<PackageRecord>>,
}

impl ChannelResolver {
    pub fn new(channel: Channel, records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let mut index: HashMap<String, Vec<(Version, PackageRecord)>> = HashMap::new();
        for record in records {
            index
                .entry(record.name.clone())
                .or_default()
                .push((Version::parse(&record.version), record));
        }

        let index = index
            .into_iter()
            .map(|(name, mut candidates)| {
                candidates.sort_by(|(va, a), (vb, b)| {
                    vb.cmp(va)
                        .then_with(|| b.build_number.cmp(&a.build_number))
                        .then_with(|| a.platform.cmp(&b.platform))
                        .then_with(|| a.filename.cmp(&b.filename))
                });
                (name, candidates.into_iter().map(|(_, record)| record).collect())
            })
            .collect();

        Self {
            channel,
            index,
        }
    }

    /// Loads the repodata of every platform in `platforms` from `channel`.
    pub fn from_channel(
        channel: &Channel,
        platforms: &[String],
        transport: &dyn Transport,
    ) -> Result<Self> {
        let mut records = Vec::new();
        for platform in platforms {
            info!("Downloading repo metadata from {}", channel.platform_url(platform));
            let packages = fetch_repodata(channel, platform, transport)?;
            debug!("{}: {} packages", platform, packages.len());
            records.extend(packages.into_values());
        }
        Ok(Self::new(channel.clone(), records))
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Number of distinct package names known to the resolver.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn install(
        &self,
        root: MatchSpec,
        solve: &mut Solve,
    ) -> std::result::Result<(), ResolutionError> {
        let mut stack = vec![root];

        while let Some(spec) = stack.pop() {
            if spec.is_virtual() {
                debug!("Skipping virtual package {}", spec);
                continue;
            }

            if let Some(chosen) = solve.chosen.get(&spec.name) {
                if !spec.matches(chosen) {
                    return Err(ResolutionError::Conflict {
                        name: spec.name.clone(),
                        chosen: chosen.dist_name(),
                        spec: spec.to_string(),
                    });
                }
                continue;
            }

            let constraints = solve.constraints.entry(spec.name.clone()).or_default();
            constraints.push(spec.clone());

            let Some(candidates) = self.index.get(&spec.name) else {
                return Err(ResolutionError::NotFound {
                    spec: spec.to_string(),
                });
            };
            let Some(record) = candidates
                .iter()
                .find(|record| constraints.iter().all(|c| c.matches(record)))
            else {
                let wanted = constraints
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("`, `");
                return Err(ResolutionError::Unsatisfiable(format!(
                    "No candidate for `{}` satisfies `{}`",
                    spec.name, wanted
                )));
            };

            debug!("{} -> {}", spec, record.filename);
            for dep in record.depends.iter().rev() {
                stack.push(MatchSpec::parse(dep)?);
            }
            solve.chosen.insert(spec.name.clone(), record.clone());
        }

        Ok(())
    }
}

#[derive(Default)]
struct Solve {
    chosen: BTreeMap<String, PackageRecord>,
    constraints: HashMap<String, Vec<MatchSpec>>,
}

impl Resolver for ChannelResolver {
    fn resolve_spec(
        &self,
        spec: &str,
        pinned: &[String],
        exclude_pinned: bool,
    ) -> std::result::Result<Vec<PackageRecord>, ResolutionError> {
        let root = MatchSpec::parse(spec)?;
        let pins = pinned
            .iter()
            .filter(|pin| !pin.trim().is_empty())
            .map(|pin| MatchSpec::parse(pin))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut solve = Solve::default();
        for pin in &pins {
            solve
                .constraints
                .entry(pin.name.clone())
                .or_default()
                .push(pin.clone());
        }

        self.install(root, &mut solve)?;
        if !exclude_pinned {
            for pin in pins {
                self.install(pin, &mut solve)?;
            }
        }

        Ok(solve.chosen.into_values().collect())
    }
}

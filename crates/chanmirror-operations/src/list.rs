use chanmirror_core::{state::analyze, MirrorResult};
use tracing::debug;

use crate::{utils::local_platforms, ListEntry, MirrorContext};

/// Every valid package of the mirror, sorted by platform, name and version.
pub fn list_packages(ctx: &MirrorContext) -> MirrorResult<Vec<ListEntry>> {
    let validator = ctx.validator();
    let platforms = local_platforms(ctx.repo_root(), &ctx.config().get_platforms())?;

    let mut entries = Vec::new();
    for platform in &platforms {
        let state = analyze(
            ctx.repo_root(),
            platform,
            false,
            &validator,
            ctx.events().as_ref(),
        )?;
        debug!(
            platform = platform.as_str(),
            packages = state.packages.len(),
            "listing platform"
        );

        entries.extend(state.packages.into_values().map(|record| {
            ListEntry {
                platform: platform.clone(),
                name: record.name,
                version: record.version,
                filename: record.filename,
                size: record.size,
            }
        }));
    }

    entries.sort();
    Ok(entries)
}

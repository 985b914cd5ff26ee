use chanmirror_core::{state::analyze, MirrorResult};
use tracing::debug;

use crate::{utils::local_platforms, MirrorContext, PlatformValidationReport};

/// Checks every local platform against its index.
///
/// With `remove` (the `clean` action) invalid and unknown files are deleted. The index itself
/// is left as is.
pub fn validate_mirror(
    ctx: &MirrorContext,
    remove: bool,
) -> MirrorResult<Vec<PlatformValidationReport>> {
    let validator = ctx.validator();
    let platforms = local_platforms(ctx.repo_root(), &ctx.config().get_platforms())?;
    debug!(platforms = platforms.len(), remove, "validating mirror");

    platforms
        .iter()
        .map(|platform| {
            analyze(
                ctx.repo_root(),
                platform,
                remove,
                &validator,
                ctx.events().as_ref(),
            )
            .map(PlatformValidationReport::from)
        })
        .collect()
}

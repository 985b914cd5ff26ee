use std::fmt::Write;

use chanmirror_core::MirrorResult;
use chanmirror_operations::{clone::sync_mirror, MirrorContext, SyncMode, SyncReport};
use chanmirror_utils::bytes::format_bytes;
use tracing::{debug, info};

use crate::{
    progress,
    utils::{json_output, print_json},
};

pub async fn sync_packages(
    ctx: &MirrorContext,
    specs: &[String],
    mode: SyncMode,
) -> MirrorResult<()> {
    debug!(specs = specs.len(), ?mode, "starting sync");

    let report = sync_mirror(ctx, specs, mode).await?;

    if json_output() {
        return print_json(&report);
    }

    let summary = render_sync_report(&report);
    progress::suspend(|| print!("{summary}"));

    if report.failed() > 0 {
        info!(
            "{} packages failed; run the command again to retry them",
            report.failed()
        );
    }

    Ok(())
}

pub fn render_sync_report(report: &SyncReport) -> String {
    let mut out = String::new();
    for platform in &report.platforms {
        let _ = writeln!(out, "{}", platform.platform);
        let _ = writeln!(
            out,
            "    size: {} ({})",
            platform.total_size,
            format_bytes(platform.total_size, 2)
        );
        let _ = writeln!(out, "    packages: {}", platform.count);
        let _ = writeln!(out, "    new packages: {}", platform.new);
        let _ = writeln!(out, "    invalid packages: {}", platform.failed);
        for filename in &platform.failed_packages {
            let _ = writeln!(out, "        {filename}");
        }
    }
    out
}

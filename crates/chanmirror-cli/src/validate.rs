use std::fmt::Write;

use chanmirror_core::MirrorResult;
use chanmirror_operations::{validate::validate_mirror, MirrorContext, PlatformValidationReport};
use tracing::{debug, warn};

use crate::{
    progress,
    utils::{json_output, print_json},
};

/// Runs `validate`, or `clean` when `remove` is set.
pub fn validate_packages(ctx: &MirrorContext, remove: bool) -> MirrorResult<()> {
    debug!(remove, "validating target directory");

    let reports = validate_mirror(ctx, remove)?;

    for report in reports.iter().filter(|report| report.degraded) {
        warn!(
            "{}: index could not be read, every file was treated as unknown",
            report.platform
        );
    }

    if json_output() {
        return print_json(&reports);
    }

    let summary = render_validation_reports(&reports, remove);
    progress::suspend(|| print!("{summary}"));
    Ok(())
}

pub fn render_validation_reports(reports: &[PlatformValidationReport], remove: bool) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "{}", report.platform);
        let _ = writeln!(out, "    packages: {}", report.packages);
        let _ = writeln!(out, "    unknown_files: {:?}", report.unknown_files);
        let _ = writeln!(out, "    invalid_packages: {:?}", report.invalid_packages);
        if remove {
            let _ = writeln!(out, "    removed: {:?}", report.removed_files);
        }
    }
    out
}

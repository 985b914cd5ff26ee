use std::fmt::Write;

use chanmirror_core::MirrorResult;
use chanmirror_operations::{list::list_packages, ListEntry, MirrorContext};
use tracing::debug;

use crate::{
    progress,
    utils::{json_output, print_json},
};

pub fn list_mirror(ctx: &MirrorContext) -> MirrorResult<()> {
    let entries = list_packages(ctx)?;
    debug!(entries = entries.len(), "listed mirror");

    if json_output() {
        return print_json(&entries);
    }

    let listing = render_list(&entries);
    progress::suspend(|| print!("{listing}"));
    Ok(())
}

pub fn render_list(entries: &[ListEntry]) -> String {
    entries.iter().fold(String::new(), |mut out, entry| {
        let _ = writeln!(out, "{}: {}={}", entry.platform, entry.name, entry.version);
        out
    })
}

use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, Arc, LazyLock},
    time::Duration,
};

use chanmirror_events::{MirrorEvent, OperationId, VerifyStage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::{Cyan, Green, Red};

use crate::utils::{Colored, Icons};

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the background progress thread started by [`spawn_event_handler`].
///
/// Every sender of the event channel must be dropped before [`finish`](ProgressGuard::finish),
/// otherwise the join blocks forever.
pub struct ProgressGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressGuard {
    /// Waits for the handler thread to drain the remaining events.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix}  {wide_bar:.cyan/dim}  {bytes}/{total_bytes}  {bytes_per_sec}  {eta}",
    )
    .unwrap()
    .progress_chars("━━─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap()
}

/// `platform/filename` with the file name highlighted.
fn colored_prefix(platform: &str, filename: &str) -> String {
    format!(
        "{}{}",
        nu_ansi_term::Style::new()
            .dimmed()
            .paint(format!("{platform}/")),
        Cyan.paint(filename)
    )
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = MULTI.add(ProgressBar::new_spinner());
    pb.set_style(spinner_style());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spawns a thread that renders [`MirrorEvent`]s as indicatif bars.
///
/// Each download gets one bar for its whole lifetime; it turns into a spinner while the file
/// is verified and is cleared once the package passes or fails. A single spinner at the bottom
/// shows the progress of the current platform.
pub fn spawn_event_handler(receiver: Receiver<MirrorEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<OperationId, ProgressBar> = HashMap::new();
        let mut resolve_job: Option<ProgressBar> = None;
        let mut batch_job: Option<ProgressBar> = None;
        let mut batch_msg: Option<String> = None;

        // Keeps the batch spinner below the download bars added after it.
        macro_rules! reposition_batch {
            ($batch_job:expr, $batch_msg:expr) => {
                if let Some(old) = $batch_job.take() {
                    old.finish_and_clear();
                    if let Some(ref msg) = $batch_msg {
                        $batch_job = Some(create_spinner(msg));
                    }
                }
            };
        }

        while let Ok(event) = receiver.recv() {
            match event {
                MirrorEvent::Resolving {
                    total_specs,
                } => {
                    resolve_job = Some(create_spinner(&format!("Resolving {total_specs} specs")));
                }
                MirrorEvent::SpecResolved {
                    spec, ..
                }
                | MirrorEvent::SpecFailed {
                    spec, ..
                } => {
                    if let Some(pb) = &resolve_job {
                        pb.set_message(format!("Resolved {spec}"));
                    }
                }
                MirrorEvent::PlatformStarted {
                    platform,
                    packages,
                } => {
                    if let Some(pb) = resolve_job.take() {
                        pb.finish_and_clear();
                    }
                    if let Some(pb) = batch_job.take() {
                        pb.finish_and_clear();
                    }
                    let msg = format!("{platform}: 0/{packages}");
                    batch_job = Some(create_spinner(&msg));
                    batch_msg = Some(msg);
                }

                MirrorEvent::DownloadStarting {
                    op_id,
                    platform,
                    filename,
                    total,
                } => {
                    let pb = MULTI.add(ProgressBar::new(total));
                    pb.set_style(download_style());
                    pb.set_prefix(colored_prefix(&platform, &filename));
                    pb.enable_steady_tick(Duration::from_millis(100));
                    jobs.insert(op_id, pb);
                    reposition_batch!(batch_job, batch_msg);
                }
                MirrorEvent::DownloadProgress {
                    op_id,
                    current,
                    ..
                } => {
                    if let Some(pb) = jobs.get(&op_id) {
                        pb.set_position(current);
                    }
                }
                MirrorEvent::DownloadComplete {
                    op_id,
                    filename,
                    ..
                } => {
                    if let Some(pb) = jobs.get(&op_id) {
                        pb.set_style(spinner_style());
                        pb.set_message(format!("{filename}: verifying"));
                    }
                }
                MirrorEvent::Verifying {
                    op_id,
                    stage,
                    ..
                } => {
                    if matches!(stage, VerifyStage::Passed | VerifyStage::Failed(_)) {
                        if let Some(pb) = jobs.remove(&op_id) {
                            pb.finish_and_clear();
                        }
                    }
                }
                MirrorEvent::PackageFailed {
                    op_id,
                    platform,
                    filename,
                    reason,
                } => {
                    if let Some(pb) = jobs.remove(&op_id) {
                        pb.finish_and_clear();
                    }
                    MULTI.suspend(|| {
                        eprintln!(
                            " {} {}/{}: {}",
                            Colored(Red, Icons::CROSS),
                            platform,
                            Colored(Cyan, &filename),
                            Colored(Red, &reason)
                        );
                    });
                }
                MirrorEvent::RepodataWritten {
                    platform,
                    packages,
                    ..
                } => {
                    if let Some(pb) = batch_job.take() {
                        pb.finish_and_clear();
                    }
                    batch_msg = None;
                    MULTI.suspend(|| {
                        eprintln!(
                            " {} {}: {} packages indexed",
                            Colored(Green, Icons::CHECK),
                            Colored(Cyan, &platform),
                            packages
                        );
                    });
                }
                MirrorEvent::BatchProgress {
                    platform,
                    completed,
                    total,
                    failed,
                } => {
                    let fail_msg = if failed > 0 {
                        format!(" ({failed} failed)")
                    } else {
                        String::new()
                    };
                    let msg = format!("{platform}: {completed}/{total}{fail_msg}");
                    batch_msg = Some(msg.clone());
                    let pb = batch_job.get_or_insert_with(|| create_spinner(&msg));
                    pb.set_message(msg);
                }

                _ => {}
            }
        }

        if let Some(pb) = resolve_job.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = batch_job.take() {
            pb.finish_and_clear();
        }
        for (_, pb) in jobs {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}

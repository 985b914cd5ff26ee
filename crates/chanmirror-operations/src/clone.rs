use std::{collections::BTreeSet, sync::Arc};

use chanmirror_core::{
    ensure::{ensure, EnsureOutcome},
    error::{EnsureError, MirrorError},
    package::{PackageRecord, PlatformPackages},
    repodata::{merge, write_repodata},
    resolver::{resolve, Resolver},
    state::analyze,
    MirrorResult,
};
use chanmirror_events::{MirrorEvent, VerifyStage};
use chanmirror_registry::{Channel, ChannelResolver};
use chanmirror_utils::{bytes::format_bytes, fs::ensure_dir_exists};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

use crate::{
    progress::{create_progress_bridge, next_op_id},
    MirrorContext, PlatformSyncReport, SyncMode, SyncReport,
};

/// Fetches the upstream indexes of the configured platforms and builds a resolver over them.
pub async fn load_upstream(ctx: &MirrorContext, channel: &str) -> MirrorResult<Arc<dyn Resolver>> {
    let parsed = Channel::parse(channel).map_err(|err| err.into_mirror_error(channel))?;
    let platforms = ctx.config().get_platforms();
    let transport = ctx.transport().clone();
    info!("Loading channel {} ({})", parsed.name(), parsed);

    let resolver = tokio::task::spawn_blocking(move || {
        ChannelResolver::from_channel(&parsed, &platforms, transport.as_ref())
    })
    .await
    .map_err(|err| MirrorError::Task(err.to_string()))?
    .map_err(|err| err.into_mirror_error(channel))?;

    debug!(
        "{} package names available in {}",
        resolver.len(),
        resolver.channel()
    );
    Ok(Arc::new(resolver))
}

struct PackageOutcome {
    filename: String,
    size: u64,
    result: Result<EnsureOutcome, String>,
}

/// Per-platform accumulator. Only the aggregating loop in [`sync_platform`] touches it.
#[derive(Default)]
struct PlatformProgress {
    total_size: u64,
    count: usize,
    new: usize,
    failed_packages: Vec<String>,
}

impl PlatformProgress {
    fn apply(&mut self, outcome: PackageOutcome) {
        match outcome.result {
            Ok(result) => {
                if result != EnsureOutcome::Present {
                    self.new += 1;
                }
                self.count += 1;
                self.total_size += outcome.size;
            }
            Err(_) => self.failed_packages.push(outcome.filename),
        }
    }
}

/// Runs `clone` or `check` for `specs`.
///
/// Specs are resolved once; every platform in the configuration or in the resolved set is
/// then reconciled against the target directory. Package failures are reported per platform
/// and never stop the run. On `Clone` each platform gets a fresh `repodata.json` that also
/// keeps the valid entries of the previous index.
pub async fn sync_mirror(
    ctx: &MirrorContext,
    specs: &[String],
    mode: SyncMode,
) -> MirrorResult<SyncReport> {
    let dry_run = mode.is_dry_run();
    let resolver = ctx.resolver()?;
    debug!(specs = specs.len(), dry_run, "synchronizing mirror");

    if !dry_run {
        ensure_dir_exists(ctx.repo_root())?;
    }

    let config = ctx.config();
    let resolution = resolve(
        resolver.as_ref(),
        specs,
        &config.get_pinned_packages(),
        config.exclude_pinned(),
        ctx.events().as_ref(),
    );
    for (platform, summary) in resolution.size_summary() {
        info!(
            "{}: {} packages, {} in total",
            platform,
            summary.count,
            format_bytes(summary.total_size, 2)
        );
    }

    let platforms: BTreeSet<String> = config
        .get_platforms()
        .into_iter()
        .chain(resolution.resolved.platforms().map(String::from))
        .collect();

    let mut reports = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let desired = resolution
            .resolved
            .get(&platform)
            .cloned()
            .unwrap_or_default();
        reports.push(sync_platform(ctx, &platform, desired, dry_run).await?);
    }

    Ok(SyncReport {
        dry_run,
        platforms: reports,
        failed_specs: resolution.failed,
    })
}

async fn sync_platform(
    ctx: &MirrorContext,
    platform: &str,
    desired: PlatformPackages,
    dry_run: bool,
) -> MirrorResult<PlatformSyncReport> {
    let validator = ctx.validator();
    let local = analyze(ctx.repo_root(), platform, false, &validator, ctx.events().as_ref())?;
    debug!(
        platform,
        local = local.packages.len(),
        desired = desired.len(),
        "analyzed platform"
    );

    ctx.events().emit(MirrorEvent::PlatformStarted {
        platform: platform.to_string(),
        packages: desired.len(),
    });

    let total = desired.len() as u32;
    let semaphore = Arc::new(Semaphore::new(ctx.config().concurrency()));
    let (tx, mut rx) = mpsc::unbounded_channel::<PackageOutcome>();

    // Jobs are dispatched from their own task so outcomes are consumed as they finish.
    let records: Vec<PackageRecord> = desired.values().cloned().collect();
    let dispatch_ctx = ctx.clone();
    let dispatcher = tokio::spawn(async move {
        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| MirrorError::Task(err.to_string()))?;
            let ctx = dispatch_ctx.clone();
            let tx = tx.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                let outcome = process_package(&ctx, &record, dry_run);
                drop(permit);
                let _ = tx.send(outcome);
            }));
        }
        Ok::<_, MirrorError>(handles)
    });

    let mut progress = PlatformProgress::default();
    let mut completed = 0;
    while let Some(outcome) = rx.recv().await {
        progress.apply(outcome);
        completed += 1;
        ctx.events().emit(MirrorEvent::BatchProgress {
            platform: platform.to_string(),
            completed,
            total,
            failed: progress.failed_packages.len() as u32,
        });
    }

    let handles = dispatcher
        .await
        .map_err(|err| MirrorError::Task(format!("Join handle error: {err}")))??;
    for handle in handles {
        handle
            .await
            .map_err(|err| MirrorError::Task(format!("Join handle error: {err}")))?;
    }

    progress.failed_packages.sort();

    let mut index = desired;
    for filename in &progress.failed_packages {
        index.remove(filename);
    }
    // A failed package may have deleted the file its previous entry described.
    let retained: PlatformPackages = local
        .packages
        .into_iter()
        .filter(|(filename, _)| {
            !progress.failed_packages.contains(filename)
                || ctx.repo_root().join(platform).join(filename).is_file()
        })
        .collect();
    let old = merge(&retained, &mut index);

    let repodata = if dry_run {
        None
    } else {
        let path = write_repodata(platform, ctx.repo_root(), &index)?;
        ctx.events().emit(MirrorEvent::RepodataWritten {
            platform: platform.to_string(),
            path: path.clone(),
            packages: index.len(),
        });
        Some(path)
    };

    Ok(PlatformSyncReport {
        platform: platform.to_string(),
        total_size: progress.total_size,
        count: progress.count,
        new: progress.new,
        old,
        failed: progress.failed_packages.len(),
        failed_packages: progress.failed_packages,
        repodata,
    })
}

fn process_package(ctx: &MirrorContext, record: &PackageRecord, dry_run: bool) -> PackageOutcome {
    let op_id = next_op_id();
    let events = ctx.events();
    let progress = (!dry_run).then(|| {
        create_progress_bridge(
            events.clone(),
            op_id,
            record.platform.clone(),
            record.filename.clone(),
        )
    });

    let result = ensure(
        record,
        ctx.repo_root(),
        dry_run,
        ctx.transport().as_ref(),
        &ctx.validator(),
        ctx.config().get_chunk_size(),
        progress,
    );

    let result = match result {
        Ok(outcome) => {
            match outcome {
                EnsureOutcome::Present => {
                    events.emit(MirrorEvent::PackagePresent {
                        op_id,
                        platform: record.platform.clone(),
                        filename: record.filename.clone(),
                    });
                }
                EnsureOutcome::Downloaded => {
                    info!(
                        "Downloaded: {}, file_size: {}, sha256: {}",
                        record.url, record.size, record.sha256
                    );
                    events.emit(MirrorEvent::Verifying {
                        op_id,
                        platform: record.platform.clone(),
                        filename: record.filename.clone(),
                        stage: VerifyStage::Passed,
                    });
                }
                EnsureOutcome::WouldDownload => {
                    debug!("{} would be downloaded", record.filename);
                }
            }
            Ok(outcome)
        }
        Err(err) => {
            error!("{}: {}", record.filename, err);
            if let EnsureError::Integrity(_) = err {
                events.emit(MirrorEvent::Verifying {
                    op_id,
                    platform: record.platform.clone(),
                    filename: record.filename.clone(),
                    stage: VerifyStage::Failed(err.to_string()),
                });
            }
            events.emit(MirrorEvent::PackageFailed {
                op_id,
                platform: record.platform.clone(),
                filename: record.filename.clone(),
                reason: err.to_string(),
            });
            Err(err.to_string())
        }
    };

    PackageOutcome {
        filename: record.filename.clone(),
        size: record.size,
        result,
    }
}

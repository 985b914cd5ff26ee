use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chanmirror_core::ensure::ProgressCallback;
use chanmirror_dl::types::Progress;
use chanmirror_events::{EventSinkHandle, MirrorEvent, OperationId};

/// Creates a download progress callback that re-emits each update as a [`MirrorEvent`].
pub fn create_progress_bridge(
    events: EventSinkHandle,
    op_id: OperationId,
    platform: String,
    filename: String,
) -> ProgressCallback {
    Arc::new(move |progress: Progress| {
        let event = match progress {
            Progress::Starting {
                total,
            } => {
                MirrorEvent::DownloadStarting {
                    op_id,
                    platform: platform.clone(),
                    filename: filename.clone(),
                    total,
                }
            }
            Progress::Chunk {
                current,
                total,
            } => {
                MirrorEvent::DownloadProgress {
                    op_id,
                    platform: platform.clone(),
                    filename: filename.clone(),
                    current,
                    total,
                }
            }
            Progress::Complete {
                total,
            } => {
                MirrorEvent::DownloadComplete {
                    op_id,
                    platform: platform.clone(),
                    filename: filename.clone(),
                    total,
                }
            }
        };
        events.emit(event);
    })
}

/// Generates a unique operation ID.
pub fn next_op_id() -> OperationId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use chanmirror_events::CollectorSink;

    use super::*;

    #[test]
    fn test_next_op_id_is_unique() {
        let id1 = next_op_id();
        let id2 = next_op_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_progress_bridge() {
        let collector = Arc::new(CollectorSink::default());
        let events: EventSinkHandle = collector.clone();
        let bridge = create_progress_bridge(events, 7, "noarch".into(), "a.conda".into());

        bridge(Progress::Starting {
            total: 1024,
        });
        bridge(Progress::Chunk {
            current: 512,
            total: 1024,
        });
        bridge(Progress::Complete {
            total: 1024,
        });

        let events = collector.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[1],
            MirrorEvent::DownloadProgress {
                op_id: 7,
                current: 512,
                ..
            }
        ));
        assert_eq!(collector.downloaded(), vec!["a.conda"]);
    }
}

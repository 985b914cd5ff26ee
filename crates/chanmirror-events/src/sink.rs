use std::sync::mpsc::{self, Receiver, Sender};

use crate::{LogLevel, MirrorEvent};

/// Trait for consuming events.
///
/// Each frontend provides its own implementation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MirrorEvent);

    fn log(&self, level: LogLevel, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.emit(MirrorEvent::Log {
            level,
            message: message.into(),
        });
    }
}

/// Channel-based event sink.
///
/// Sends events through a standard mpsc channel. The receiver end is drained by the
/// CLI progress thread.
pub struct ChannelSink {
    sender: Sender<MirrorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<MirrorEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: MirrorEvent) {
        let _ = self.sender.send(event);
    }
}

/// No-op event sink for quiet or JSON runs.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: MirrorEvent) {}
}

/// Collector sink that stores all events for inspection.
///
/// Useful in tests to verify that expected events were emitted.
#[derive(Default)]
pub struct CollectorSink {
    events: std::sync::Mutex<Vec<MirrorEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<MirrorEvent> {
        self.events.lock().unwrap().clone()
    }

    /// File names of every [`MirrorEvent::DownloadComplete`] seen so far.
    pub fn downloaded(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| {
                match event {
                    MirrorEvent::DownloadComplete {
                        filename, ..
                    } => Some(filename.clone()),
                    _ => None,
                }
            })
            .collect()
    }

    /// File names of every [`MirrorEvent::FileRemoved`] seen so far.
    pub fn removed(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| {
                match event {
                    MirrorEvent::FileRemoved {
                        filename, ..
                    } => Some(filename.clone()),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: MirrorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

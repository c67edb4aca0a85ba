use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

/// Where the pipeline currently is. Stages always advance in declaration
/// order, though some may be skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uploading,
    Submitting,
    Queued,
    Generating,
    Downloading,
    Encoding,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage: Stage,
    pub message: String,
}

/// Emits [`ProgressEvent`]s to an optional channel. Reported percentages are
/// monotonic: a stage that computes a lower number than one already sent is
/// raised to the previous value.
#[derive(Debug)]
pub struct ProgressSink {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
    floor: AtomicU8,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(tx),
                floor: AtomicU8::new(0),
            },
            rx,
        )
    }

    /// A sink that swallows every event.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            floor: AtomicU8::new(0),
        }
    }

    pub fn emit(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        let percent = percent
            .max(self.floor.fetch_max(percent, Ordering::Relaxed))
            .min(100);
        let message = message.into();
        tracing::debug!(percent, ?stage, message, "Progress");
        if let Some(sender) = &self.sender {
            // A dropped receiver just means nobody is listening anymore.
            let _ = sender.send(ProgressEvent {
                percent,
                stage,
                message,
            });
        }
    }
}

/*!
 * Progress aggregation for the large-file copy phase
 *
 * Copy workers publish one sample per write into a bounded channel; a single
 * aggregator thread drains it, keeps the running total and renders the live
 * progress line. A full channel blocks producers until the aggregator catches up.
 */

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Bytes written by one worker in one write call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub bytes: u64,
}

/// Producer side; clone one per worker
#[derive(Clone)]
pub struct ProgressPublisher {
    sender: Option<Sender<ProgressSample>>,
}

impl ProgressPublisher {
    /// Create a publisher over a bounded channel of `capacity` samples
    pub fn new(capacity: usize) -> (Self, ProgressSubscriber) {
        let (tx, rx) = bounded(capacity);
        (
            ProgressPublisher { sender: Some(tx) },
            ProgressSubscriber { receiver: rx },
        )
    }

    /// Publisher that drops every sample
    pub fn noop() -> Self {
        ProgressPublisher { sender: None }
    }

    /// Blocks while the channel is full
    pub fn publish(&self, bytes: u64) {
        if let Some(ref tx) = self.sender {
            // Only fails once the aggregator is gone
            let _ = tx.send(ProgressSample { bytes });
        }
    }
}

/// Consumer side of the progress channel
pub struct ProgressSubscriber {
    receiver: Receiver<ProgressSample>,
}

impl ProgressSubscriber {
    /// Blocking receive; `None` once every publisher is dropped and the queue is empty
    pub fn recv(&self) -> Option<ProgressSample> {
        self.receiver.recv().ok()
    }
}

/// Dedicated thread accumulating samples from every copy worker
pub struct ProgressAggregator {
    handle: thread::JoinHandle<u64>,
}

impl ProgressAggregator {
    /// Start draining `subscriber`. `total_hint` sizes the bar (bytes expected).
    pub fn spawn(subscriber: ProgressSubscriber, total_hint: u64, show_progress: bool) -> Self {
        let bar = if show_progress {
            let pb = ProgressBar::new(total_hint);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let handle = thread::spawn(move || {
            let mut total = 0u64;
            while let Some(sample) = subscriber.recv() {
                total += sample.bytes;
                bar.set_position(total);
            }
            bar.finish();
            debug!("Progress stream closed after {} bytes", total);
            total
        });

        Self { handle }
    }

    /// Wait for the stream to close and return the drained total.
    /// Every publisher clone must be dropped first or this blocks forever.
    pub fn finish(self) -> u64 {
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("Progress aggregator panicked");
            0
        })
    }
}

//! Change aggregation and debouncing
//!
//! A single task owns the path → event map and the debounce deadline.
//! Callers only ever talk to it through a channel, so a flush can never race
//! with a concurrent insert: an event either lands before the map is taken
//! for a batch or after it, never in between.

use crate::callbacks::FlushCallback;
use crate::config::TransientPolicy;
use crate::types::{Batch, ChangeEvent, ChangeKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Default quiet period before a flush
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

enum Message {
	Observe(ChangeEvent),
	Stop,
}

/// Latest event for a path plus the first kind seen in the current window
struct Slot {
	event: ChangeEvent,
	first_kind: ChangeKind,
}

/// Coalesces accepted changes and flushes them after a quiet period
///
/// Every `observe` restarts the countdown, so a flush happens only after
/// `window` has passed with no new events. Stopping cancels a pending
/// countdown and drops whatever was collected.
pub struct ChangeAggregator {
	tx: mpsc::UnboundedSender<Message>,
	handle: JoinHandle<()>,
}

impl ChangeAggregator {
	/// Spawn the aggregation task on the current tokio runtime
	///
	/// `on_flush` runs on the aggregation task; it should hand the batch off
	/// (spawn, send on a channel) rather than block.
	pub fn spawn(
		window: Duration,
		policy: TransientPolicy,
		on_flush: Arc<dyn FlushCallback>,
	) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let handle = tokio::spawn(run(rx, window, policy, on_flush));
		Self { tx, handle }
	}

	/// Record a change that already passed the path filter
	pub fn observe(&self, event: ChangeEvent) {
		if self.tx.send(Message::Observe(event)).is_err() {
			debug!("Aggregator stopped, dropping event");
		}
	}

	/// Cancel any pending flush and wait for the task to exit
	pub async fn stop(self) {
		let _ = self.tx.send(Message::Stop);
		if let Err(e) = self.handle.await {
			debug!("Aggregator task ended abnormally: {}", e);
		}
	}
}

async fn run(
	mut rx: mpsc::UnboundedReceiver<Message>,
	window: Duration,
	policy: TransientPolicy,
	on_flush: Arc<dyn FlushCallback>,
) {
	let mut pending: HashMap<PathBuf, Slot> = HashMap::new();
	let mut deadline: Option<Instant> = None;

	loop {
		let message = match deadline {
			None => rx.recv().await,
			Some(at) => {
				tokio::select! {
					message = rx.recv() => message,
					_ = time::sleep_until(at) => {
						deadline = None;
						if let Some(batch) = take_batch(&mut pending, policy) {
							debug!("Flushing batch {} with {} path(s)", batch.id(), batch.len());
							on_flush.on_flush(batch);
						}
						continue;
					}
				}
			}
		};

		match message {
			Some(Message::Observe(event)) => {
				trace!("observe {} {}", event.kind, event.path.display());
				coalesce(&mut pending, event);
				deadline = Some(Instant::now() + window);
			}
			Some(Message::Stop) | None => {
				if !pending.is_empty() {
					debug!("Aggregator stopping, dropping {} pending change(s)", pending.len());
				}
				break;
			}
		}
	}
}

/// Store `event` as the latest state of its path
fn coalesce(pending: &mut HashMap<PathBuf, Slot>, event: ChangeEvent) {
	match pending.get_mut(&event.path) {
		Some(slot) => slot.event = event,
		None => {
			let first_kind = event.kind;
			pending.insert(event.path.clone(), Slot { event, first_kind });
		}
	}
}

/// Drain the map into a batch. Returns `None` when nothing is left to send.
fn take_batch(pending: &mut HashMap<PathBuf, Slot>, policy: TransientPolicy) -> Option<Batch> {
	if pending.is_empty() {
		return None;
	}

	let mut batch = Batch::new();
	for (path, slot) in pending.drain() {
		let transient = slot.first_kind.is_creation() && slot.event.kind.is_removal();
		if transient && policy == TransientPolicy::Skip {
			debug!("Skipping {}: created and removed within one window", path.display());
			continue;
		}
		batch.insert(slot.event);
	}

	if batch.is_empty() {
		None
	} else {
		Some(batch)
	}
}


// vim: ts=4

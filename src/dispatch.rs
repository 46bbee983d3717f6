//! Turns sync requests into transport operations
//!
//! Incremental batches fan out into one operation per path. Operations run
//! concurrently up to a configured limit and never cancel each other: every
//! planned path gets its chance, and each failure becomes one entry in the
//! outcome's error list.

use crate::callbacks::{NoTransferCallback, TransferCallback};
use crate::config::SyncConfig;
use crate::error::{ConfigError, TransferError};
use crate::transport::{self, Transport};
use crate::types::{Batch, SyncOutcome, SyncRequest};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default bound on concurrent per-path transfers
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// One remote operation planned from a batch entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOp {
	Push(PathBuf),
	Delete(PathBuf),
}

impl PlannedOp {
	pub fn path(&self) -> &Path {
		match self {
			PlannedOp::Push(path) | PlannedOp::Delete(path) => path,
		}
	}
}

pub struct SyncDispatcher {
	source_root: PathBuf,
	transport: Arc<dyn Transport>,
	limit: Arc<Semaphore>,
	callback: Arc<dyn TransferCallback>,
}

impl SyncDispatcher {
	pub fn new(source_root: impl Into<PathBuf>, transport: Arc<dyn Transport>, max_concurrent: usize) -> Self {
		Self {
			source_root: source_root.into(),
			transport,
			limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
			callback: Arc::new(NoTransferCallback),
		}
	}

	/// Dispatcher with the backend and limits described by `config`
	pub fn from_config(config: &SyncConfig, source_root: &Path) -> Self {
		let transport = transport::from_config(config, source_root);
		Self::new(source_root, transport, config.max_concurrent_transfers)
	}

	pub fn with_callback(mut self, callback: Arc<dyn TransferCallback>) -> Self {
		self.callback = callback;
		self
	}

	pub fn transport(&self) -> &dyn Transport {
		self.transport.as_ref()
	}

	/// Reject requests the backend cannot serve at all
	pub fn check(&self, request: &SyncRequest) -> Result<(), ConfigError> {
		match request {
			SyncRequest::FullTree { .. } if !self.transport.supports_full_tree() => {
				Err(ConfigError::UnsupportedMode {
					method: self.transport.name().to_string(),
					mode: "full-tree sync".to_string(),
				})
			}
			_ => Ok(()),
		}
	}

	/// Execute one request and report the result
	pub async fn execute(&self, request: SyncRequest) -> SyncOutcome {
		if let Err(e) = self.check(&request) {
			warn!("{}", e);
			return SyncOutcome { succeeded: false, files_attempted: 0, duration_ms: 0, errors: vec![e.to_string()] };
		}

		match request {
			SyncRequest::Incremental(batch) => self.sync_batch(batch).await,
			SyncRequest::FullTree { mirror_deletes } => self.sync_full_tree(mirror_deletes).await,
		}
	}

	/// Push one flushed batch
	pub async fn sync_batch(&self, batch: Batch) -> SyncOutcome {
		let batch_id = batch.id();
		let ops = self.plan(batch);
		if ops.is_empty() {
			debug!("Batch {}: nothing to transfer", batch_id);
			return SyncOutcome::noop();
		}

		info!("Batch {}: transferring {} path(s) via {}", batch_id, ops.len(), self.transport.name());
		let start = Instant::now();
		let attempted = ops.len();

		let results = join_all(ops.into_iter().map(|op| self.run_op(op))).await;
		let errors: Vec<String> = results.into_iter().filter_map(|r| r.err()).map(|e| e.to_string()).collect();

		let outcome = SyncOutcome::from_errors(attempted, start.elapsed(), errors);
		if outcome.succeeded {
			info!("Batch {}: synced in {}ms", batch_id, outcome.duration_ms);
		} else {
			warn!("Batch {}: {} of {} transfer(s) failed", batch_id, outcome.errors.len(), attempted);
		}
		outcome
	}

	/// Push the whole source tree
	pub async fn sync_full_tree(&self, mirror_deletes: bool) -> SyncOutcome {
		if let Err(e) = self.check(&SyncRequest::FullTree { mirror_deletes }) {
			return SyncOutcome { succeeded: false, files_attempted: 0, duration_ms: 0, errors: vec![e.to_string()] };
		}

		if mirror_deletes {
			warn!("Mirror-deletes enabled: remote entries missing locally will be removed");
		}
		info!("Full-tree sync of {} via {}", self.source_root.display(), self.transport.name());

		let start = Instant::now();
		let errors = match self.transport.push_tree(mirror_deletes).await {
			Ok(()) => vec![],
			Err(e) => vec![e.to_string()],
		};
		SyncOutcome::from_errors(0, start.elapsed(), errors)
	}

	/// Translate batch entries into operations this backend can perform
	pub fn plan(&self, batch: Batch) -> Vec<PlannedOp> {
		let can_delete = self.transport.supports_path_delete();
		let mut ops = Vec::new();

		for event in batch.into_events() {
			if event.kind.carries_content() {
				ops.push(PlannedOp::Push(event.path));
			} else if event.kind.is_removal() && can_delete {
				ops.push(PlannedOp::Delete(event.path));
			} else {
				debug!("Dropping {} {}", event.kind, event.path.display());
			}
		}
		ops
	}

	async fn run_op(&self, op: PlannedOp) -> Result<(), TransferError> {
		// Semaphore is never closed
		let _permit = self.limit.acquire().await.ok();

		let path = op.path().to_path_buf();
		self.callback.on_transfer_start(&path);

		let result = match &op {
			PlannedOp::Push(relative) => {
				if self.source_root.join(relative).exists() {
					self.transport.push_path(relative).await
				} else {
					// Deleted between detection and dispatch
					debug!("{} no longer exists locally, skipping", relative.display());
					Ok(())
				}
			}
			PlannedOp::Delete(relative) => self.transport.delete_path(relative).await,
		};

		self.callback.on_transfer_complete(&path, result.as_ref().map(|_| ()));
		result
	}
}


// vim: ts=4

//! Callback traits for batch delivery and transfer reporting

use crate::error::TransferError;
use crate::types::Batch;
use std::path::Path;

/// Receives each batch flushed by the aggregator
pub trait FlushCallback: Send + Sync {
	fn on_flush(&self, batch: Batch);
}

impl<F> FlushCallback for F
where
	F: Fn(Batch) + Send + Sync,
{
	fn on_flush(&self, batch: Batch) {
		self(batch)
	}
}

/// Callback for per-path transfer events
pub trait TransferCallback: Send + Sync {
	/// Called right before a transfer for `path` is started
	fn on_transfer_start(&self, path: &Path);

	/// Called once the transfer for `path` has finished
	fn on_transfer_complete(&self, path: &Path, result: Result<(), &TransferError>);
}

/// Default transfer callback that does nothing
pub struct NoTransferCallback;

impl TransferCallback for NoTransferCallback {
	fn on_transfer_start(&self, _path: &Path) {}
	fn on_transfer_complete(&self, _path: &Path, _result: Result<(), &TransferError>) {}
}

/// Transfer callback that reports through `tracing`
pub struct LogTransferCallback;

impl TransferCallback for LogTransferCallback {
	fn on_transfer_start(&self, path: &Path) {
		tracing::debug!("Transferring {}", path.display());
	}

	fn on_transfer_complete(&self, path: &Path, result: Result<(), &TransferError>) {
		match result {
			Ok(()) => tracing::info!("  synced {}", path.display()),
			Err(e) => tracing::warn!("  failed {}: {}", path.display(), e),
		}
	}
}

// vim: ts=4

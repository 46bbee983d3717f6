//! Signal handling for graceful termination

use tracing::{debug, warn};

/// Signal that ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	Interrupt,
	Terminate,
}

impl Shutdown {
	/// Exit status after a graceful stop
	///
	/// Ctrl-C exits cleanly; SIGTERM keeps 128 + signal.
	pub fn exit_code(self) -> i32 {
		match self {
			Shutdown::Interrupt => 0,
			Shutdown::Terminate => 143, // 128 + SIGTERM(15)
		}
	}
}

/// Resolve once SIGINT or SIGTERM arrives
///
/// If a handler cannot be installed, only Ctrl-C is waited for.
pub async fn wait_for_shutdown() -> Shutdown {
	use tokio::signal;

	let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
		Ok(stream) => stream,
		Err(e) => {
			warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
			if let Err(e) = signal::ctrl_c().await {
				warn!("Failed to listen for Ctrl-C: {}", e);
			}
			return Shutdown::Interrupt;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => {
			debug!("Received SIGTERM, shutting down...");
			Shutdown::Terminate
		}
		res = signal::ctrl_c() => {
			if let Err(e) = res {
				warn!("Failed to listen for Ctrl-C: {}", e);
			}
			debug!("Received SIGINT, shutting down...");
			Shutdown::Interrupt
		}
	}
}


// vim: ts=4

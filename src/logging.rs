//! Logging setup and tracing prelude
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Watching {}", root.display());
//! warn!("Batch {}: 1 of 3 transfer(s) failed", id);
//! ```

pub use tracing::{debug, error, info, warn};

/// Default filter when `RUST_LOG` is unset
pub fn default_directive(verbose: bool) -> &'static str {
	if verbose {
		"debug"
	} else {
		"info"
	}
}

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO and above by default, DEBUG with `verbose`. `RUST_LOG`
/// overrides both:
///
/// ```bash
/// RUST_LOG=filesyncer=trace filesyncer watch
/// RUST_LOG=filesyncer::watch=trace,filesyncer::dispatch=debug filesyncer watch
/// ```
pub fn init_tracing(verbose: bool) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive(verbose))),
		)
		.with_target(verbose)
		.with_writer(std::io::stderr)
		.init();
}


// vim: ts=4

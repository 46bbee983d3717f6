//! Remote reachability check
//!
//! Runs a trivial command over ssh in batch mode. Anything other than a clean
//! exit within the deadline counts as unreachable: refused connections, auth
//! failures, a missing ssh binary, a hung handshake.

use crate::error::ConnectivityError;
use crate::transport::ssh_command_args;
use crate::types::RemoteEndpoint;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default probe deadline
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted to ssh after its own connect timeout fires
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Command the remote side runs to prove the session works
const PROBE_COMMAND: &str = "echo ok";

/// Arguments for the probe's ssh invocation
pub fn probe_args(endpoint: &RemoteEndpoint, timeout: Duration) -> Vec<String> {
	let mut args = vec!["-o".to_string(), format!("ConnectTimeout={}", connect_timeout_secs(timeout))];
	args.extend(ssh_command_args(endpoint, PROBE_COMMAND));
	args
}

/// Whether `endpoint` accepts a non-interactive ssh session within `timeout`
///
/// Never fails; every problem is reported as `false`.
pub async fn probe(endpoint: &RemoteEndpoint, timeout: Duration) -> bool {
	let mut cmd = Command::new("ssh");
	cmd.args(probe_args(endpoint, timeout))
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.kill_on_drop(true);

	match tokio::time::timeout(timeout + KILL_GRACE, cmd.status()).await {
		Ok(Ok(status)) if status.success() => {
			debug!("Probe of {} succeeded", endpoint);
			true
		}
		Ok(Ok(status)) => {
			debug!("Probe of {} exited with {}", endpoint, status);
			false
		}
		Ok(Err(e)) => {
			debug!("Probe of {} could not start ssh: {}", endpoint, e);
			false
		}
		Err(_) => {
			debug!("Probe of {} timed out", endpoint);
			false
		}
	}
}

/// Probe and turn an unreachable endpoint into an error
pub async fn ensure_reachable(endpoint: &RemoteEndpoint, timeout: Duration) -> Result<(), ConnectivityError> {
	info!("Checking connection to {}...", endpoint);
	if probe(endpoint, timeout).await {
		info!("Connected to {}", endpoint);
		Ok(())
	} else {
		Err(ConnectivityError::Unreachable { endpoint: endpoint.to_string() })
	}
}

/// Whole seconds for ssh's ConnectTimeout, never below one
fn connect_timeout_secs(timeout: Duration) -> u64 {
	let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
	secs.max(1)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Instant;

	#[test]
	fn test_connect_timeout_rounds_up() {
		assert_eq!(connect_timeout_secs(Duration::from_millis(5000)), 5);
		assert_eq!(connect_timeout_secs(Duration::from_millis(1500)), 2);
		assert_eq!(connect_timeout_secs(Duration::from_millis(10)), 1);
		assert_eq!(connect_timeout_secs(Duration::ZERO), 1);
	}

	#[test]
	fn test_probe_args() {
		let endpoint = RemoteEndpoint::new("example.com", "deploy");
		let args = probe_args(&endpoint, Duration::from_secs(3));

		assert_eq!(&args[..2], &["-o", "ConnectTimeout=3"]);
		assert!(args.contains(&"BatchMode=yes".to_string()));
		assert_eq!(args[args.len() - 2], "deploy@example.com");
		assert_eq!(args[args.len() - 1], "echo ok");
	}

	#[tokio::test]
	async fn test_unroutable_host_returns_false_within_deadline() {
		// TEST-NET-1, reserved and never routed
		let endpoint = RemoteEndpoint::new("192.0.2.1", "nobody");
		let timeout = Duration::from_secs(1);

		let start = Instant::now();
		let reachable = probe(&endpoint, timeout).await;

		assert!(!reachable);
		assert!(start.elapsed() < timeout + KILL_GRACE + Duration::from_secs(2));
	}

	#[tokio::test]
	async fn test_ensure_reachable_reports_endpoint() {
		let mut endpoint = RemoteEndpoint::new("192.0.2.1", "nobody");
		endpoint.port = 2222;

		let err = ensure_reachable(&endpoint, Duration::from_secs(1)).await.unwrap_err();
		assert!(err.to_string().contains("nobody@192.0.2.1:2222"));
	}
}

// vim: ts=4

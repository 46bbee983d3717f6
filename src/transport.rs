//! Remote-copy backends
//!
//! Each backend shells out to `rsync`, `scp` or `ssh`. Argument construction
//! is kept in plain functions so it can be tested without the binaries.

use crate::config::{SyncConfig, SyncMethod};
use crate::error::TransferError;
use crate::types::RemoteEndpoint;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Entries excluded from every full-tree transfer
const ALWAYS_EXCLUDED: &str = ".git";

/// A way of copying local paths to the remote destination
#[async_trait]
pub trait Transport: Send + Sync {
	/// Backend name for messages ("rsync", "scp")
	fn name(&self) -> &'static str;

	/// Whether [`push_tree`](Transport::push_tree) is available
	fn supports_full_tree(&self) -> bool;

	/// Whether removed paths can be deleted remotely one by one
	fn supports_path_delete(&self) -> bool {
		false
	}

	/// Copy one file, keeping its path relative to the source root
	async fn push_path(&self, relative: &Path) -> Result<(), TransferError>;

	/// Copy the whole source tree, optionally deleting remote extras
	async fn push_tree(&self, mirror_deletes: bool) -> Result<(), TransferError>;

	/// Remove one path on the remote side
	async fn delete_path(&self, relative: &Path) -> Result<(), TransferError>;
}

/// Build the backend selected by `config` for the absolute `source_root`
pub fn from_config(config: &SyncConfig, source_root: &Path) -> Arc<dyn Transport> {
	let endpoint = config.endpoint();
	match config.sync_method {
		SyncMethod::Rsync => Arc::new(RsyncTransport {
			source_root: source_root.to_path_buf(),
			destination: config.destination.clone(),
			endpoint,
			excludes: config.ignore_patterns.clone(),
			propagate_deletes: config.propagate_deletes,
		}),
		SyncMethod::Scp => Arc::new(ScpTransport {
			source_root: source_root.to_path_buf(),
			destination: config.destination.clone(),
			endpoint,
		}),
	}
}

// ============================================================================
// RSYNC
// ============================================================================

/// rsync over ssh; the only backend that can mirror a whole tree
#[derive(Debug, Clone)]
pub struct RsyncTransport {
	pub source_root: PathBuf,
	pub destination: String,
	pub endpoint: RemoteEndpoint,
	pub excludes: Vec<String>,
	pub propagate_deletes: bool,
}

impl RsyncTransport {
	/// Arguments for copying a single path with `--relative`
	pub fn path_args(&self, relative: &Path) -> Vec<String> {
		let mut args = vec!["-az".to_string(), "--relative".to_string()];
		args.push("-e".to_string());
		args.push(rsync_shell(&self.endpoint));

		// "/root/./sub/file" makes --relative recreate only "sub/file" remotely
		args.push(format!("{}/./{}", trim_trailing_slash(&self.source_root), to_remote(relative)));
		args.push(remote_spec(&self.endpoint, &self.destination));
		args
	}

	/// Arguments for a full-tree copy
	pub fn tree_args(&self, mirror_deletes: bool) -> Vec<String> {
		let mut args = vec!["-az".to_string()];
		if mirror_deletes {
			args.push("--delete".to_string());
		}
		args.push("-e".to_string());
		args.push(rsync_shell(&self.endpoint));

		for pattern in &self.excludes {
			args.push("--exclude".to_string());
			args.push(pattern.clone());
		}
		args.push("--exclude".to_string());
		args.push(ALWAYS_EXCLUDED.to_string());

		// Trailing slash: copy the contents, not the directory itself
		args.push(format!("{}/", trim_trailing_slash(&self.source_root)));
		args.push(remote_spec(&self.endpoint, &self.destination));
		args
	}
}

#[async_trait]
impl Transport for RsyncTransport {
	fn name(&self) -> &'static str {
		"rsync"
	}

	fn supports_full_tree(&self) -> bool {
		true
	}

	fn supports_path_delete(&self) -> bool {
		self.propagate_deletes
	}

	async fn push_path(&self, relative: &Path) -> Result<(), TransferError> {
		run("rsync", &self.path_args(relative), &relative.display().to_string()).await
	}

	async fn push_tree(&self, mirror_deletes: bool) -> Result<(), TransferError> {
		run("rsync", &self.tree_args(mirror_deletes), &self.source_root.display().to_string())
			.await
	}

	async fn delete_path(&self, relative: &Path) -> Result<(), TransferError> {
		let target = remote_join(&self.destination, relative);
		let args = ssh_command_args(&self.endpoint, &format!("rm -rf -- {}", shell_quote(&target)));
		run("ssh", &args, &relative.display().to_string()).await
	}
}

// ============================================================================
// SCP
// ============================================================================

/// Plain scp; per-path copies only
#[derive(Debug, Clone)]
pub struct ScpTransport {
	pub source_root: PathBuf,
	pub destination: String,
	pub endpoint: RemoteEndpoint,
}

impl ScpTransport {
	pub fn path_args(&self, relative: &Path) -> Vec<String> {
		let mut args = vec!["-P".to_string(), self.endpoint.port.to_string()];
		if let Some(key) = &self.endpoint.private_key_path {
			args.push("-i".to_string());
			args.push(key.display().to_string());
		}
		args.push("-p".to_string());
		args.push(self.source_root.join(relative).display().to_string());
		args.push(remote_spec(&self.endpoint, &remote_join(&self.destination, relative)));
		args
	}
}

#[async_trait]
impl Transport for ScpTransport {
	fn name(&self) -> &'static str {
		"scp"
	}

	fn supports_full_tree(&self) -> bool {
		false
	}

	async fn push_path(&self, relative: &Path) -> Result<(), TransferError> {
		let label = relative.display().to_string();

		// scp does not create missing parent directories
		if let Some(parent) = relative.parent().filter(|p| !p.as_os_str().is_empty()) {
			let dir = remote_join(&self.destination, parent);
			let args = ssh_command_args(&self.endpoint, &format!("mkdir -p {}", shell_quote(&dir)));
			run("ssh", &args, &label).await?;
		}

		run("scp", &self.path_args(relative), &label).await
	}

	async fn push_tree(&self, _mirror_deletes: bool) -> Result<(), TransferError> {
		Err(TransferError::Failed {
			program: "scp".to_string(),
			path: self.source_root.display().to_string(),
			code: None,
			stderr: "full-tree sync requires rsync".to_string(),
		})
	}

	async fn delete_path(&self, relative: &Path) -> Result<(), TransferError> {
		Err(TransferError::Failed {
			program: "scp".to_string(),
			path: relative.display().to_string(),
			code: None,
			stderr: "scp cannot delete remote files".to_string(),
		})
	}
}

// ============================================================================
// HELPERS
// ============================================================================

/// Run `program` to completion, mapping spawn failures and non-zero exits
async fn run(program: &str, args: &[String], path: &str) -> Result<(), TransferError> {
	debug!("{} {}", program, args.join(" "));

	let output = Command::new(program)
		.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.output()
		.await
		.map_err(|e| TransferError::SpawnFailed {
			program: program.to_string(),
			path: path.to_string(),
			source: e,
		})?;

	if output.status.success() {
		Ok(())
	} else {
		Err(TransferError::Failed {
			program: program.to_string(),
			path: path.to_string(),
			code: output.status.code(),
			stderr: String::from_utf8_lossy(&output.stderr).to_string(),
		})
	}
}

/// Value for rsync's `-e` option
fn rsync_shell(endpoint: &RemoteEndpoint) -> String {
	let mut shell = format!("ssh -p {}", endpoint.port);
	if let Some(key) = &endpoint.private_key_path {
		shell.push_str(&format!(" -i {}", key.display()));
	}
	shell
}

/// Non-interactive ssh invocation running `remote_command`
pub(crate) fn ssh_command_args(endpoint: &RemoteEndpoint, remote_command: &str) -> Vec<String> {
	let mut args = vec![
		"-p".to_string(),
		endpoint.port.to_string(),
		"-o".to_string(),
		"BatchMode=yes".to_string(),
	];
	if let Some(key) = &endpoint.private_key_path {
		args.push("-i".to_string());
		args.push(key.display().to_string());
	}
	args.push(endpoint.target());
	args.push(remote_command.to_string());
	args
}

/// `user@host:path`
fn remote_spec(endpoint: &RemoteEndpoint, path: &str) -> String {
	format!("{}:{}", endpoint.target(), path)
}

/// Relative local path in remote (`/`-separated) form
fn to_remote(relative: &Path) -> String {
	relative
		.components()
		.filter_map(|c| match c {
			Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("/")
}

/// Join a relative local path under the remote destination root
pub fn remote_join(destination: &str, relative: &Path) -> String {
	let rel = to_remote(relative);
	let base = destination.trim_end_matches('/');
	if rel.is_empty() {
		destination.to_string()
	} else if base.is_empty() {
		format!("/{}", rel)
	} else {
		format!("{}/{}", base, rel)
	}
}

fn trim_trailing_slash(path: &Path) -> String {
	let s = path.display().to_string();
	if s.len() > 1 {
		s.trim_end_matches('/').to_string()
	} else {
		s
	}
}

/// Single-quote `s` for a POSIX shell
fn shell_quote(s: &str) -> String {
	format!("'{}'", s.replace('\'', r"'\''"))
}


// vim: ts=4

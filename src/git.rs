//! Git-tracked-file queries
//!
//! Tracking status is optional metadata: every failure mode here surfaces
//! as a [`FilterError`] that the path filter recovers as "untracked".

use crate::error::FilterError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Source of version-control tracking information
#[async_trait]
pub trait TrackingQuery: Send + Sync {
	/// Whether `path` (relative to the work tree) is tracked
	async fn is_tracked(&self, path: &Path) -> Result<bool, FilterError>;

	/// Every tracked file, relative to the work tree; empty outside a repository
	async fn tracked_files(&self) -> Result<Vec<PathBuf>, FilterError>;
}

/// [`TrackingQuery`] backed by the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
	work_tree: PathBuf,
	is_repo: bool,
}

impl GitCli {
	pub fn new(work_tree: impl Into<PathBuf>) -> Self {
		let work_tree = work_tree.into();
		let is_repo = work_tree.join(".git").exists();
		Self { work_tree, is_repo }
	}

	pub fn is_repository(&self) -> bool {
		self.is_repo
	}

	fn command(&self) -> Command {
		let mut cmd = Command::new("git");
		cmd.current_dir(&self.work_tree)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());
		cmd
	}
}

#[async_trait]
impl TrackingQuery for GitCli {
	async fn is_tracked(&self, path: &Path) -> Result<bool, FilterError> {
		if !self.is_repo {
			return Err(FilterError::NotARepository);
		}

		let output = self
			.command()
			.arg("ls-files")
			.arg("--error-unmatch")
			.arg("--")
			.arg(path)
			.output()
			.await
			.map_err(|e| FilterError::GitUnavailable { message: e.to_string() })?;

		// --error-unmatch exits non-zero for untracked paths
		if !output.status.success() {
			debug!("git ls-files: {} is untracked", path.display());
			return Ok(false);
		}
		Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
	}

	async fn tracked_files(&self) -> Result<Vec<PathBuf>, FilterError> {
		if !self.is_repo {
			debug!("{} is not a git repository, nothing is tracked", self.work_tree.display());
			return Ok(vec![]);
		}

		let output = self
			.command()
			.arg("ls-files")
			.output()
			.await
			.map_err(|e| FilterError::GitUnavailable { message: e.to_string() })?;

		if !output.status.success() {
			return Err(FilterError::GitUnavailable {
				message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		Ok(String::from_utf8_lossy(&output.stdout)
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty())
			.map(PathBuf::from)
			.collect())
	}
}


// vim: ts=4

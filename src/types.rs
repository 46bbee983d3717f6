//! Core data types flowing through the watch → aggregate → dispatch pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Kind of filesystem mutation observed for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
	Add,
	Modify,
	Remove,
	DirAdd,
	DirRemove,
}

impl ChangeKind {
	/// True for `Remove` and `DirRemove`
	pub fn is_removal(self) -> bool {
		matches!(self, ChangeKind::Remove | ChangeKind::DirRemove)
	}

	/// True for `Add` and `DirAdd`
	pub fn is_creation(self) -> bool {
		matches!(self, ChangeKind::Add | ChangeKind::DirAdd)
	}

	/// Kinds that carry file content to push
	pub fn carries_content(self) -> bool {
		matches!(self, ChangeKind::Add | ChangeKind::Modify)
	}

	pub fn is_dir(self) -> bool {
		matches!(self, ChangeKind::DirAdd | ChangeKind::DirRemove)
	}
}

impl fmt::Display for ChangeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChangeKind::Add => write!(f, "add"),
			ChangeKind::Modify => write!(f, "change"),
			ChangeKind::Remove => write!(f, "unlink"),
			ChangeKind::DirAdd => write!(f, "addDir"),
			ChangeKind::DirRemove => write!(f, "unlinkDir"),
		}
	}
}

/// One observed change, relative to the source root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
	pub kind: ChangeKind,
	pub path: PathBuf,
	pub observed_at: SystemTime,
}

impl ChangeEvent {
	pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
		Self { kind, path: path.into(), observed_at: SystemTime::now() }
	}
}

/// Coalesced set of changes, at most one per path
///
/// Built by the aggregator at flush time and handed to the dispatcher once.
#[derive(Debug, Clone)]
pub struct Batch {
	id: Uuid,
	events: BTreeMap<PathBuf, ChangeEvent>,
}

impl Batch {
	pub fn new() -> Self {
		Self { id: Uuid::new_v4(), events: BTreeMap::new() }
	}

	/// Build a batch from a list of events. Later events for the same path
	/// replace earlier ones.
	pub fn from_events(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
		let mut batch = Self::new();
		for event in events {
			batch.insert(event);
		}
		batch
	}

	/// Insert or replace the entry for `event.path`
	pub fn insert(&mut self, event: ChangeEvent) {
		self.events.insert(event.path.clone(), event);
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn get(&self, path: &Path) -> Option<&ChangeEvent> {
		self.events.get(path)
	}

	pub fn events(&self) -> impl Iterator<Item = &ChangeEvent> {
		self.events.values()
	}

	pub fn into_events(self) -> Vec<ChangeEvent> {
		self.events.into_values().collect()
	}
}

impl Default for Batch {
	fn default() -> Self {
		Self::new()
	}
}

/// What the dispatcher is asked to do
#[derive(Debug, Clone)]
pub enum SyncRequest {
	/// Push the paths of one flushed batch
	Incremental(Batch),

	/// Push the whole source tree
	FullTree { mirror_deletes: bool },
}

/// Terminal report for one sync request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
	pub succeeded: bool,
	pub files_attempted: usize,
	pub duration_ms: u64,
	pub errors: Vec<String>,
}

impl SyncOutcome {
	/// Outcome for a request that had nothing to transfer
	pub fn noop() -> Self {
		Self { succeeded: true, files_attempted: 0, duration_ms: 0, errors: vec![] }
	}

	pub fn from_errors(files_attempted: usize, elapsed: Duration, errors: Vec<String>) -> Self {
		Self {
			succeeded: errors.is_empty(),
			files_attempted,
			duration_ms: elapsed.as_millis() as u64,
			errors,
		}
	}
}

/// SSH endpoint for the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
	pub host: String,
	pub username: String,
	pub port: u16,
	pub private_key_path: Option<PathBuf>,
}

impl RemoteEndpoint {
	pub const DEFAULT_PORT: u16 = 22;

	pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
		Self {
			host: host.into(),
			username: username.into(),
			port: Self::DEFAULT_PORT,
			private_key_path: None,
		}
	}

	/// `user@host` as used on ssh/scp/rsync command lines
	pub fn target(&self) -> String {
		format!("{}@{}", self.username, self.host)
	}
}

impl fmt::Display for RemoteEndpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}:{}", self.username, self.host, self.port)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_batch_keeps_last_event_per_path() {
		let batch = Batch::from_events(vec![
			ChangeEvent::new(ChangeKind::Add, "a.txt"),
			ChangeEvent::new(ChangeKind::Modify, "a.txt"),
			ChangeEvent::new(ChangeKind::Remove, "b.txt"),
		]);

		assert_eq!(batch.len(), 2);
		assert_eq!(batch.get(Path::new("a.txt")).map(|e| e.kind), Some(ChangeKind::Modify));
		assert_eq!(batch.get(Path::new("b.txt")).map(|e| e.kind), Some(ChangeKind::Remove));
	}

	#[test]
	fn test_change_kind_classes() {
		assert!(ChangeKind::Remove.is_removal());
		assert!(ChangeKind::DirRemove.is_removal());
		assert!(!ChangeKind::Modify.is_removal());
		assert!(ChangeKind::Add.carries_content());
		assert!(!ChangeKind::DirAdd.carries_content());
	}

	#[test]
	fn test_outcome_from_errors() {
		let ok = SyncOutcome::from_errors(3, Duration::from_millis(12), vec![]);
		assert!(ok.succeeded);
		assert_eq!(ok.duration_ms, 12);

		let failed = SyncOutcome::from_errors(3, Duration::ZERO, vec!["boom".to_string()]);
		assert!(!failed.succeeded);
		assert_eq!(failed.errors.len(), 1);
	}

	#[test]
	fn test_endpoint_target() {
		let endpoint = RemoteEndpoint::new("example.com", "deploy");
		assert_eq!(endpoint.port, 22);
		assert_eq!(endpoint.target(), "deploy@example.com");
		assert_eq!(endpoint.to_string(), "deploy@example.com:22");
	}
}

// vim: ts=4

//! Filesystem watching
//!
//! Raw `notify` events are translated into [`ChangeEvent`]s relative to the
//! source root, held back until the file has been quiet for the settle delay,
//! run through the [`PathFilter`] and handed to the [`ChangeAggregator`].
//! The pipeline runs on one task so events for a path keep their order.

use crate::aggregator::ChangeAggregator;
use crate::callbacks::FlushCallback;
use crate::config::{SyncConfig, TransientPolicy};
use crate::error::SyncError;
use crate::exclusion::{PathFilter, PatternMatcher};
use crate::types::{ChangeEvent, ChangeKind};
use ignore::WalkBuilder;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

/// Timing knobs for a watch session
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
	pub debounce: Duration,
	pub settle: Duration,
	pub transient_policy: TransientPolicy,
}

impl WatchOptions {
	pub fn from_config(config: &SyncConfig) -> Self {
		Self {
			debounce: config.debounce(),
			settle: config.settle(),
			transient_policy: config.transient_policy,
		}
	}
}

/// A running watcher feeding an aggregator
pub struct WatchSession {
	root: PathBuf,
	watcher: RecommendedWatcher,
	stop_tx: oneshot::Sender<()>,
	task: JoinHandle<()>,
}

impl WatchSession {
	/// Watch the source directory named by `config`
	pub fn start(config: &SyncConfig, on_flush: Arc<dyn FlushCallback>) -> Result<Self, SyncError> {
		let root = fs::canonicalize(config.source_dir())?;
		let filter = PathFilter::from_config(config, &root)?;
		let coarse = PatternMatcher::new(&config.ignore_patterns)?;
		Self::start_with(&root, filter, coarse, WatchOptions::from_config(config), on_flush)
	}

	/// Watch `root` with an explicitly built filter
	pub fn start_with(
		root: &Path,
		filter: PathFilter,
		coarse: PatternMatcher,
		options: WatchOptions,
		on_flush: Arc<dyn FlushCallback>,
	) -> Result<Self, SyncError> {
		let root = root.to_path_buf();
		let (raw_tx, raw_rx) = mpsc::unbounded_channel();

		let mut watcher = RecommendedWatcher::new(
			move |res: notify::Result<Event>| {
				let _ = raw_tx.send(res);
			},
			notify::Config::default(),
		)?;
		watcher.watch(&root, RecursiveMode::Recursive)?;

		let aggregator = ChangeAggregator::spawn(options.debounce, options.transient_policy, on_flush);
		let (stop_tx, stop_rx) = oneshot::channel();
		let pipeline = Pipeline { root: root.clone(), coarse, filter, aggregator };
		let task = tokio::spawn(pipeline.run(raw_rx, stop_rx, options.settle));

		info!("Watching {}", root.display());
		Ok(Self { root, watcher, stop_tx, task })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Stop watching; pending, unflushed changes are dropped
	pub async fn stop(self) {
		drop(self.watcher);
		let _ = self.stop_tx.send(());
		if let Err(e) = self.task.await {
			debug!("Watch pipeline ended abnormally: {}", e);
		}
		info!("Stopped watching {}", self.root.display());
	}
}

struct Pipeline {
	root: PathBuf,
	coarse: PatternMatcher,
	filter: PathFilter,
	aggregator: ChangeAggregator,
}

impl Pipeline {
	async fn run(
		self,
		mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
		mut stop_rx: oneshot::Receiver<()>,
		settle: Duration,
	) {
		let mut settler = Settler::new(settle);

		loop {
			let deadline = settler.next_deadline();
			tokio::select! {
				_ = &mut stop_rx => break,
				raw = raw_rx.recv() => {
					let event = match raw {
						Some(Ok(event)) => event,
						Some(Err(e)) => {
							warn!("Watcher error: {}", e);
							continue;
						}
						None => break,
					};
					for change in translate(&self.root, event) {
						if self.coarse.is_excluded(&change.path) {
							continue;
						}
						for ready in settler.push(change, Instant::now()) {
							self.forward(ready).await;
						}
					}
				}
				_ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
					for ready in settler.release_due(Instant::now()) {
						self.forward(ready).await;
					}
				}
			}
		}

		self.aggregator.stop().await;
	}

	async fn forward(&self, event: ChangeEvent) {
		let new_dir = (event.kind == ChangeKind::DirAdd
			&& !self.filter.is_ignored(&event.path, event.kind))
		.then(|| event.path.clone());

		self.accept(event).await;

		// A directory moved or unpacked into the tree arrives as one event
		if let Some(dir) = new_dir {
			for file in self.existing_files(dir).await {
				if !self.coarse.is_excluded(&file.path) {
					self.accept(file).await;
				}
			}
		}
	}

	async fn accept(&self, event: ChangeEvent) {
		if self.filter.accepts(&event.path, event.kind).await {
			self.aggregator.observe(event);
		} else {
			trace!("Filtered {} {}", event.kind, event.path.display());
		}
	}

	async fn existing_files(&self, dir: PathBuf) -> Vec<ChangeEvent> {
		let root = self.root.clone();
		match task::spawn_blocking(move || files_under(&root, &dir)).await {
			Ok(files) => files,
			Err(e) => {
				warn!("Directory scan failed: {}", e);
				vec![]
			}
		}
	}
}

/// Directories never descended into when scanning a new directory
const PRUNED_DIRS: &[&str] = &["node_modules", ".git"];

/// `Add` events for every file already under `dir` (relative to `root`)
pub fn files_under(root: &Path, dir: &Path) -> Vec<ChangeEvent> {
	let walker = WalkBuilder::new(root.join(dir))
		.standard_filters(false)
		.follow_links(false)
		.filter_entry(|entry| {
			entry.file_name().to_str().map(|name| !PRUNED_DIRS.contains(&name)).unwrap_or(true)
		})
		.build();

	let mut files = Vec::new();
	for entry in walker {
		match entry {
			Ok(entry) if entry.file_type().map(|t| t.is_file()).unwrap_or(false) => {
				if let Ok(relative) = entry.path().strip_prefix(root) {
					files.push(ChangeEvent::new(ChangeKind::Add, relative));
				}
			}
			Ok(_) => {}
			Err(e) => debug!("Skipping entry under {}: {}", dir.display(), e),
		}
	}
	files
}

// ============================================================================
// EVENT TRANSLATION
// ============================================================================

/// Map one notify event to zero or more changes relative to `root`
pub fn translate(root: &Path, event: Event) -> Vec<ChangeEvent> {
	let mut changes = Vec::new();

	if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
		if let [from, to] = event.paths.as_slice() {
			let is_dir = existing_dir(to);
			let (gone, came) = match is_dir {
				Some(true) => (ChangeKind::DirRemove, ChangeKind::DirAdd),
				_ => (ChangeKind::Remove, ChangeKind::Add),
			};
			changes.push((gone, from.clone()));
			if is_dir.is_some() {
				changes.push((came, to.clone()));
			}
		}
	} else {
		for path in &event.paths {
			if let Some(kind) = classify(&event.kind, existing_dir(path)) {
				changes.push((kind, path.clone()));
			}
		}
	}

	changes
		.into_iter()
		.filter_map(|(kind, path)| {
			let relative = path.strip_prefix(root).ok()?;
			if relative.as_os_str().is_empty() {
				return None;
			}
			Some(ChangeEvent::new(kind, relative))
		})
		.collect()
}

/// Change kind for a notify event on a path
///
/// `is_dir` is the current state of the path on disk, `None` if it no
/// longer exists.
pub fn classify(kind: &EventKind, is_dir: Option<bool>) -> Option<ChangeKind> {
	let by_type = |is_dir: Option<bool>| match is_dir {
		Some(true) => Some(ChangeKind::DirAdd),
		Some(false) => Some(ChangeKind::Add),
		None => None,
	};

	match kind {
		EventKind::Create(CreateKind::Folder) => Some(ChangeKind::DirAdd),
		EventKind::Create(CreateKind::File) => Some(ChangeKind::Add),
		EventKind::Create(_) => by_type(is_dir),
		EventKind::Modify(ModifyKind::Metadata(_)) => None,
		EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Remove),
		EventKind::Modify(ModifyKind::Name(_)) => by_type(is_dir).or(Some(ChangeKind::Remove)),
		EventKind::Modify(_) => match is_dir {
			Some(false) => Some(ChangeKind::Modify),
			_ => None,
		},
		EventKind::Remove(RemoveKind::Folder) => Some(ChangeKind::DirRemove),
		EventKind::Remove(_) => Some(ChangeKind::Remove),
		EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
	}
}

fn existing_dir(path: &Path) -> Option<bool> {
	fs::symlink_metadata(path).ok().map(|m| m.is_dir())
}

// ============================================================================
// WRITE SETTLING
// ============================================================================

/// Holds content changes until a path has been quiet for the settle delay
///
/// Removals and directory events pass straight through. A removal first
/// releases any content change still held for the same path so per-path
/// order is preserved.
struct Settler {
	quiet: Duration,
	held: HashMap<PathBuf, (ChangeEvent, Instant)>,
}

impl Settler {
	fn new(quiet: Duration) -> Self {
		Self { quiet, held: HashMap::new() }
	}

	/// Accept a change; returns the changes ready to forward now
	fn push(&mut self, event: ChangeEvent, now: Instant) -> Vec<ChangeEvent> {
		if self.quiet.is_zero() {
			return vec![event];
		}

		if event.kind.carries_content() {
			let due = now + self.quiet;
			match self.held.get_mut(&event.path) {
				// A file still being written reports as added once it settles
				Some((held, at)) => {
					if held.kind != ChangeKind::Add {
						held.kind = event.kind;
					}
					held.observed_at = event.observed_at;
					*at = due;
				}
				None => {
					self.held.insert(event.path.clone(), (event, due));
				}
			}
			return vec![];
		}

		let mut ready = Vec::with_capacity(2);
		if let Some((held, _)) = self.held.remove(&event.path) {
			ready.push(held);
		}
		ready.push(event);
		ready
	}

	fn next_deadline(&self) -> Option<Instant> {
		self.held.values().map(|(_, at)| *at).min()
	}

	/// Changes whose quiet period has elapsed, oldest deadline first
	fn release_due(&mut self, now: Instant) -> Vec<ChangeEvent> {
		let due: Vec<PathBuf> =
			self.held.iter().filter(|(_, (_, at))| *at <= now).map(|(path, _)| path.clone()).collect();

		let mut ready: Vec<(ChangeEvent, Instant)> =
			due.iter().filter_map(|path| self.held.remove(path)).collect();
		ready.sort_by_key(|(_, at)| *at);
		ready.into_iter().map(|(event, _)| event).collect()
	}
}


// vim: ts=4

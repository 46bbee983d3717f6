//! Watch sessions against a real directory

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use filesyncer::config::TransientPolicy;
use filesyncer::exclusion::{IgnoreFileMatcher, PathFilter, PatternMatcher};
use filesyncer::types::{Batch, ChangeKind};
use filesyncer::watch::{WatchOptions, WatchSession};

const OPTIONS: WatchOptions = WatchOptions {
	debounce: Duration::from_millis(150),
	settle: Duration::from_millis(50),
	transient_policy: TransientPolicy::Propagate,
};

fn start(dir: &TempDir, patterns: &[&str]) -> (WatchSession, mpsc::UnboundedReceiver<Batch>) {
	let root = fs::canonicalize(dir.path()).unwrap();
	let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
	let filter = PathFilter::new(IgnoreFileMatcher::new(&root, &patterns, false).unwrap(), None);
	let coarse = PatternMatcher::new(&patterns).unwrap();

	let (tx, rx) = mpsc::unbounded_channel();
	let on_flush = move |batch: Batch| {
		let _ = tx.send(batch);
	};
	let session = WatchSession::start_with(&root, filter, coarse, OPTIONS, Arc::new(on_flush)).unwrap();
	(session, rx)
}

/// Collect batches until one mentions `path`
async fn wait_for(rx: &mut mpsc::UnboundedReceiver<Batch>, path: &str) -> Batch {
	loop {
		let batch = timeout(Duration::from_secs(10), rx.recv())
			.await
			.expect("no batch within 10s")
			.expect("aggregator stopped");
		if batch.get(Path::new(path)).is_some() {
			return batch;
		}
	}
}

#[tokio::test]
async fn test_new_file_is_reported_relative_to_root() {
	let dir = TempDir::new().unwrap();
	let (session, mut rx) = start(&dir, &[]);
	tokio::time::sleep(Duration::from_millis(100)).await;

	fs::create_dir(dir.path().join("src")).unwrap();
	fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

	let batch = wait_for(&mut rx, "src/main.rs").await;
	let kind = batch.get(Path::new("src/main.rs")).map(|e| e.kind);
	assert!(matches!(kind, Some(ChangeKind::Add) | Some(ChangeKind::Modify)));

	session.stop().await;
}

#[tokio::test]
async fn test_ignored_paths_never_reported() {
	let dir = TempDir::new().unwrap();
	let (session, mut rx) = start(&dir, &["*.log"]);
	tokio::time::sleep(Duration::from_millis(100)).await;

	fs::write(dir.path().join("debug.log"), "noise").unwrap();
	fs::write(dir.path().join("keep.txt"), "signal").unwrap();

	let batch = wait_for(&mut rx, "keep.txt").await;
	assert!(batch.get(Path::new("debug.log")).is_none());

	session.stop().await;
}

#[tokio::test]
async fn test_removal_is_reported() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("doomed.txt");
	fs::write(&file, "bye").unwrap();

	let (session, mut rx) = start(&dir, &[]);
	tokio::time::sleep(Duration::from_millis(100)).await;
	fs::remove_file(&file).unwrap();

	let batch = wait_for(&mut rx, "doomed.txt").await;
	assert_eq!(batch.get(Path::new("doomed.txt")).map(|e| e.kind), Some(ChangeKind::Remove));

	session.stop().await;
}

#[tokio::test]
async fn test_directory_moved_in_reports_its_files() {
	let dir = TempDir::new().unwrap();
	let staging = TempDir::new_in(dir.path().parent().unwrap()).unwrap();
	let pkg = staging.path().join("pkg");
	fs::create_dir_all(pkg.join("lib")).unwrap();
	fs::create_dir_all(pkg.join("logs")).unwrap();
	fs::write(pkg.join("index.js"), "module.exports = 1").unwrap();
	fs::write(pkg.join("lib/util.js"), "module.exports = 2").unwrap();
	fs::write(pkg.join("logs/run.log"), "noise").unwrap();

	let (session, mut rx) = start(&dir, &["*.log"]);
	tokio::time::sleep(Duration::from_millis(100)).await;
	fs::rename(&pkg, dir.path().join("pkg")).unwrap();

	let wanted = ["pkg/index.js", "pkg/lib/util.js"];
	let mut seen: Vec<Batch> = Vec::new();
	while !wanted.iter().all(|p| seen.iter().any(|b| b.get(Path::new(p)).is_some())) {
		let batch = timeout(Duration::from_secs(10), rx.recv())
			.await
			.expect("moved-in files not reported within 10s")
			.expect("aggregator stopped");
		seen.push(batch);
	}

	for path in wanted {
		let kind = seen.iter().find_map(|b| b.get(Path::new(path))).map(|e| e.kind);
		assert_eq!(kind, Some(ChangeKind::Add), "{}", path);
	}
	assert!(seen.iter().all(|b| b.get(Path::new("pkg/logs/run.log")).is_none()));

	session.stop().await;
}

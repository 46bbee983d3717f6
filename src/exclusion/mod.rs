//! Exclusion and filtering system
//!
//! [`PathFilter`] decides whether a change is eligible for sync. Checks run
//! cheapest first: gitignore-style patterns, then (optionally) the git
//! tracking query, which is an out-of-process call and never runs for a
//! path the patterns already rejected.

mod ignore;
mod patterns;

pub use self::ignore::IgnoreFileMatcher;
pub use patterns::PatternMatcher;

use crate::config::SyncConfig;
use crate::error::FilterError;
use crate::git::{GitCli, TrackingQuery};
use crate::types::ChangeKind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Eligibility check applied to every raw change
pub struct PathFilter {
	ignore_matcher: IgnoreFileMatcher,

	/// Present only when git-tracking mode is enabled
	tracking: Option<Arc<dyn TrackingQuery>>,
}

impl PathFilter {
	pub fn new(ignore_matcher: IgnoreFileMatcher, tracking: Option<Arc<dyn TrackingQuery>>) -> Self {
		Self { ignore_matcher, tracking }
	}

	/// Build the filter described by `config` for the source root `base_path`
	pub fn from_config(config: &SyncConfig, base_path: &Path) -> Result<Self, FilterError> {
		let ignore_matcher = IgnoreFileMatcher::new(
			base_path,
			&config.ignore_patterns,
			config.exclude_from_git_ignore,
		)?;

		let tracking: Option<Arc<dyn TrackingQuery>> = if config.use_git_tracking {
			Some(Arc::new(GitCli::new(base_path)))
		} else {
			None
		};

		Ok(Self::new(ignore_matcher, tracking))
	}

	/// Pattern check only
	pub fn is_ignored(&self, path: &Path, kind: ChangeKind) -> bool {
		self.ignore_matcher.is_ignored(path, kind.is_dir())
	}

	/// Decide whether a change to `path` should be synced
	pub async fn accepts(&self, path: &Path, kind: ChangeKind) -> bool {
		if self.is_ignored(path, kind) {
			return false;
		}

		let Some(tracking) = &self.tracking else {
			return true;
		};

		// Removals skip the tracking query
		if kind.is_removal() {
			return true;
		}

		match tracking.is_tracked(path).await {
			Ok(tracked) => tracked,
			Err(e) => {
				debug!("Tracking query failed for {}: {}; treating as untracked", path.display(), e);
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashSet;
	use std::path::PathBuf;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tempfile::TempDir;

	/// Fixed tracked set that counts how often it is asked
	struct FakeTracking {
		tracked: HashSet<PathBuf>,
		fail: bool,
		queries: AtomicUsize,
	}

	impl FakeTracking {
		fn new(tracked: &[&str]) -> Self {
			Self {
				tracked: tracked.iter().map(PathBuf::from).collect(),
				fail: false,
				queries: AtomicUsize::new(0),
			}
		}

		fn failing() -> Self {
			Self { fail: true, ..Self::new(&[]) }
		}
	}

	#[async_trait]
	impl TrackingQuery for FakeTracking {
		async fn is_tracked(&self, path: &Path) -> Result<bool, FilterError> {
			self.queries.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err(FilterError::GitUnavailable { message: "no git".to_string() });
			}
			Ok(self.tracked.contains(path))
		}

		async fn tracked_files(&self) -> Result<Vec<PathBuf>, FilterError> {
			Ok(self.tracked.iter().cloned().collect())
		}
	}

	fn filter(
		dir: &TempDir,
		patterns: &[&str],
		tracking: Option<Arc<FakeTracking>>,
	) -> PathFilter {
		let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
		let matcher = IgnoreFileMatcher::new(dir.path(), &patterns, false).unwrap();
		PathFilter::new(matcher, tracking.map(|t| t as Arc<dyn TrackingQuery>))
	}

	#[tokio::test]
	async fn test_ignored_pattern_rejected() {
		let temp_dir = TempDir::new().unwrap();
		let filter = filter(&temp_dir, &["dist/**"], None);

		assert!(!filter.accepts(Path::new("dist/bundle.js"), ChangeKind::Add).await);
		assert!(filter.accepts(Path::new("src/app.js"), ChangeKind::Add).await);
	}

	#[tokio::test]
	async fn test_untracked_add_rejected_remove_accepted() {
		let temp_dir = TempDir::new().unwrap();
		let tracking = Arc::new(FakeTracking::new(&["tracked.rs"]));
		let filter = filter(&temp_dir, &[], Some(tracking));

		assert!(!filter.accepts(Path::new("new.rs"), ChangeKind::Add).await);
		assert!(!filter.accepts(Path::new("new.rs"), ChangeKind::Modify).await);
		assert!(filter.accepts(Path::new("new.rs"), ChangeKind::Remove).await);
		assert!(filter.accepts(Path::new("olddir"), ChangeKind::DirRemove).await);
		assert!(filter.accepts(Path::new("tracked.rs"), ChangeKind::Modify).await);
	}

	#[tokio::test]
	async fn test_ignored_path_never_queries_git() {
		let temp_dir = TempDir::new().unwrap();
		let tracking = Arc::new(FakeTracking::new(&["dist/bundle.js"]));
		let filter = filter(&temp_dir, &["dist/**"], Some(tracking.clone()));

		// Ignored even though tracked, and even for removals
		assert!(!filter.accepts(Path::new("dist/bundle.js"), ChangeKind::Modify).await);
		assert!(!filter.accepts(Path::new("dist/bundle.js"), ChangeKind::Remove).await);
		assert!(!filter.accepts(Path::new(".git/HEAD"), ChangeKind::Modify).await);
		assert_eq!(tracking.queries.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_git_failure_treated_as_untracked() {
		let temp_dir = TempDir::new().unwrap();
		let filter = filter(&temp_dir, &[], Some(Arc::new(FakeTracking::failing())));

		assert!(!filter.accepts(Path::new("a.txt"), ChangeKind::Add).await);
		assert!(filter.accepts(Path::new("a.txt"), ChangeKind::Remove).await);
	}

	#[tokio::test]
	async fn test_accepts_is_deterministic() {
		let temp_dir = TempDir::new().unwrap();
		let tracking = Arc::new(FakeTracking::new(&["a.txt"]));
		let filter = filter(&temp_dir, &["*.log"], Some(tracking));

		for _ in 0..3 {
			assert!(filter.accepts(Path::new("a.txt"), ChangeKind::Modify).await);
			assert!(!filter.accepts(Path::new("b.log"), ChangeKind::Modify).await);
		}
	}

	#[test]
	fn test_coarse_globs_never_exclude_what_gitignore_keeps() {
		let temp_dir = TempDir::new().unwrap();
		let patterns: Vec<String> =
			["doc/*.txt", "*.log", "build/", "/config.local", "dist/**", "src/**/gen", "?.tmp"]
				.iter()
				.map(|s| s.to_string())
				.collect();
		let coarse = PatternMatcher::new(&patterns).unwrap();
		let precise = IgnoreFileMatcher::new(temp_dir.path(), &patterns, false).unwrap();

		let paths = [
			"doc/a.txt",
			"doc/server/arch.txt",
			"src/doc/a.txt",
			"app.log",
			"logs/deep/app.log",
			"build",
			"build/out.o",
			"lib/build/out.o",
			"config.local",
			"sub/config.local",
			"dist/x/y.js",
			"src/dist/y.js",
			"src/a/b/gen",
			"a.tmp",
			"dir/a.tmp",
			"ab.tmp",
			"src/main.rs",
		];

		for path in paths {
			let path = Path::new(path);
			if coarse.is_excluded(path) {
				assert!(precise.is_ignored(path, false), "{} excluded early but kept by gitignore", path.display());
			}
		}
		assert!(coarse.is_excluded(Path::new("doc/a.txt")));
		assert!(!coarse.is_excluded(Path::new("doc/server/arch.txt")));
	}

	#[tokio::test]
	async fn test_from_config_without_repository() {
		let temp_dir = TempDir::new().unwrap();
		let config = SyncConfig {
			use_git_tracking: true,
			ignore_patterns: vec!["tmp/**".to_string()],
			..SyncConfig::example()
		};
		let filter = PathFilter::from_config(&config, temp_dir.path()).unwrap();

		// No .git directory: everything non-removal is untracked
		assert!(!filter.accepts(Path::new("a.txt"), ChangeKind::Add).await);
		assert!(filter.accepts(Path::new("a.txt"), ChangeKind::Remove).await);
		assert!(!filter.accepts(Path::new("tmp/x"), ChangeKind::Remove).await);
	}
}

// vim: ts=4

//! Glob exclusions applied by the watch facility before events reach the
//! path filter

use crate::error::FilterError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Glob matcher for the watcher's coarse exclusion list
///
/// This is a cheap first cut that keeps event floods from large generated
/// trees out of the pipeline. Precise gitignore semantics live in
/// [`IgnoreFileMatcher`](super::IgnoreFileMatcher).
pub struct PatternMatcher {
	/// Compiled user patterns
	exclude_set: GlobSet,

	/// Always-excluded patterns (built-in)
	always_exclude: GlobSet,
}

impl PatternMatcher {
	pub fn new(exclude_patterns: &[String]) -> Result<Self, FilterError> {
		let always_exclude = Self::build_always_excluded()?;

		// A negation can re-include anything excluded earlier, which a flat
		// glob set cannot express. Leave user patterns to the precise matcher then.
		let has_negation = exclude_patterns.iter().any(|p| p.starts_with('!'));
		let exclude_set = if has_negation {
			GlobSet::empty()
		} else {
			let globs: Vec<String> = exclude_patterns.iter().filter_map(|p| to_glob(p)).collect();
			Self::build_glob_set(&globs)?
		};

		Ok(Self { exclude_set, always_exclude })
	}

	fn build_always_excluded() -> Result<GlobSet, FilterError> {
		let patterns = vec![
			"**/node_modules/**", // dependency trees
			"**/.git/**",         // version-control metadata
			"**/.git",
		];

		Self::build_glob_set(&patterns.into_iter().map(String::from).collect::<Vec<_>>())
	}

	fn build_glob_set(patterns: &[String]) -> Result<GlobSet, FilterError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in patterns {
			// `*` and `?` stop at `/` as they do in gitignore
			let glob = GlobBuilder::new(pattern)
				.literal_separator(true)
				.build()
				.map_err(|e| FilterError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		builder
			.build()
			.map_err(|e| FilterError::InvalidPattern(format!("Failed to build pattern set: {}", e)))
	}

	/// Check if a relative path is excluded by any pattern
	pub fn is_excluded(&self, path: &Path) -> bool {
		self.always_exclude.is_match(path) || self.exclude_set.is_match(path)
	}
}

/// Glob matching a subset of what the gitignore `pattern` ignores
///
/// A pattern with no inner `/` matches at any depth, a trailing `/` limits it
/// to a directory (so only that directory's contents are matched here), and
/// anything else is anchored at the root. Blank lines and comments yield
/// `None`.
fn to_glob(pattern: &str) -> Option<String> {
	let pattern = pattern.trim_end();
	if pattern.is_empty() || pattern.starts_with('#') {
		return None;
	}

	let dir_only = pattern.ends_with('/');
	let body = pattern.trim_end_matches('/');
	let anchored = body.contains('/');
	let body = body.trim_start_matches('/');
	if body.is_empty() {
		return None;
	}

	let mut glob = if anchored || body.starts_with("**") { body.to_string() } else { format!("**/{}", body) };
	if dir_only {
		glob.push_str("/**");
	}
	Some(glob)
}


// vim: ts=4

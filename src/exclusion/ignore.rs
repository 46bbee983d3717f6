//! Gitignore-semantics matching for the path filter
//!
//! Uses the `ignore` crate (same as ripgrep) so negation, directory-only
//! patterns and anchoring behave the way git does.

use crate::error::FilterError;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Rules that are always present regardless of configuration
const ALWAYS_IGNORED: &[&str] = &[".git", ".git/**"];

/// Compiled ignore rules for one source root
///
/// Rules are layered in this order, later rules winning as in git:
/// explicit deny patterns, the root `.gitignore` (optional), the `.git` rule.
pub struct IgnoreFileMatcher {
	/// Base directory for relative path resolution
	base_path: PathBuf,

	gitignore: Gitignore,
}

impl IgnoreFileMatcher {
	/// Build a matcher for `base_path`
	///
	/// # Arguments
	/// * `patterns` - Explicit deny patterns in gitignore syntax
	/// * `respect_gitignore` - Also load `<base_path>/.gitignore` if it exists
	pub fn new(
		base_path: &Path,
		patterns: &[String],
		respect_gitignore: bool,
	) -> Result<Self, FilterError> {
		let mut builder = GitignoreBuilder::new(base_path);

		for pattern in patterns {
			builder
				.add_line(None, pattern)
				.map_err(|e| FilterError::InvalidPattern(format!("{}: {}", pattern, e)))?;
		}

		if respect_gitignore {
			let gitignore = base_path.join(".gitignore");
			if gitignore.exists() {
				// add() returns Option<Error>, None on success
				if let Some(err) = builder.add(&gitignore) {
					tracing::warn!("Failed to read {}: {}", gitignore.display(), err);
				}
			}
		}

		for pattern in ALWAYS_IGNORED {
			builder
				.add_line(None, pattern)
				.map_err(|e| FilterError::InvalidPattern(format!("{}: {}", pattern, e)))?;
		}

		let gitignore = builder.build().map_err(|e| FilterError::IgnoreFile(e.to_string()))?;

		Ok(Self { base_path: base_path.to_path_buf(), gitignore })
	}

	/// Check if a path (or any of its parent directories) is ignored
	pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
		let relative_path = self.relative(path);

		if self.gitignore.matched(relative_path, is_dir).is_ignore() {
			return true;
		}

		// "node_modules/" must also cover "node_modules/pkg/index.js"
		for ancestor in relative_path.ancestors().skip(1) {
			if ancestor == Path::new("") || ancestor == Path::new(".") {
				break;
			}
			if self.gitignore.matched(ancestor, true).is_ignore() {
				return true;
			}
		}

		false
	}

	fn relative<'a>(&self, path: &'a Path) -> &'a Path {
		if path.is_absolute() {
			path.strip_prefix(&self.base_path).unwrap_or(path)
		} else {
			path
		}
	}
}


// vim: ts=4

//! Error types for filesyncer operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type
#[derive(Debug)]
pub enum SyncError {
	/// Invalid or missing configuration
	Config(ConfigError),

	/// Remote host could not be reached
	Connectivity(ConnectivityError),

	/// A single transfer failed
	Transfer(TransferError),

	/// Watch facility failed to start or reported an error
	Watch { message: String },

	/// I/O error
	Io(io::Error),
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config(e) => write!(f, "Configuration error: {}", e),
			SyncError::Connectivity(e) => write!(f, "Connectivity error: {}", e),
			SyncError::Transfer(e) => write!(f, "Transfer error: {}", e),
			SyncError::Watch { message } => write!(f, "Watch error: {}", message),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Config(e) => Some(e),
			SyncError::Connectivity(e) => Some(e),
			SyncError::Transfer(e) => Some(e),
			SyncError::Io(e) => Some(e),
			SyncError::Watch { .. } => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<ConfigError> for SyncError {
	fn from(e: ConfigError) -> Self {
		SyncError::Config(e)
	}
}

impl From<ConnectivityError> for SyncError {
	fn from(e: ConnectivityError) -> Self {
		SyncError::Connectivity(e)
	}
}

impl From<TransferError> for SyncError {
	fn from(e: TransferError) -> Self {
		SyncError::Transfer(e)
	}
}

impl From<FilterError> for SyncError {
	fn from(e: FilterError) -> Self {
		// Only pattern construction errors escape the filter
		SyncError::Config(ConfigError::InvalidValue {
			field: "ignorePatterns".to_string(),
			message: e.to_string(),
		})
	}
}

impl From<notify::Error> for SyncError {
	fn from(e: notify::Error) -> Self {
		SyncError::Watch { message: e.to_string() }
	}
}

/// Configuration errors, fatal before any watch/sync attempt
#[derive(Debug)]
pub enum ConfigError {
	/// Config file does not exist
	NotFound { path: PathBuf },

	/// Refusing to overwrite an existing config file
	AlreadyExists { path: PathBuf },

	/// Config file could not be parsed
	Parse { path: PathBuf, message: String },

	/// A required field is missing or empty
	MissingField { field: String },

	/// A field holds an out-of-range or unknown value
	InvalidValue { field: String, message: String },

	/// Selected transport cannot perform the requested mode
	UnsupportedMode { method: String, mode: String },

	/// Reading or writing the config file failed
	Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::NotFound { path } => {
				write!(
					f,
					"Config file not found: {}\nRun 'filesyncer init' to create one.",
					path.display()
				)
			}
			ConfigError::AlreadyExists { path } => {
				write!(f, "Config file already exists: {}", path.display())
			}
			ConfigError::Parse { path, message } => {
				write!(f, "Failed to parse {}: {}", path.display(), message)
			}
			ConfigError::MissingField { field } => write!(f, "Missing required field: {}", field),
			ConfigError::InvalidValue { field, message } => {
				write!(f, "Invalid value for {}: {}", field, message)
			}
			ConfigError::UnsupportedMode { method, mode } => {
				write!(f, "Sync method '{}' does not support {}", method, mode)
			}
			ConfigError::Io { path, source } => {
				write!(f, "Failed to access {}: {}", path.display(), source)
			}
		}
	}
}

impl Error for ConfigError {}

/// Remote reachability errors
#[derive(Debug)]
pub enum ConnectivityError {
	/// Probe returned false
	Unreachable { endpoint: String },
}

impl fmt::Display for ConnectivityError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConnectivityError::Unreachable { endpoint } => {
				write!(f, "Failed to connect to remote server {}", endpoint)
			}
		}
	}
}

impl Error for ConnectivityError {}

/// Per-path transfer failures
#[derive(Debug)]
pub enum TransferError {
	/// Transport binary could not be started
	SpawnFailed { program: String, path: String, source: io::Error },

	/// Transport exited non-zero
	Failed { program: String, path: String, code: Option<i32>, stderr: String },
}

impl fmt::Display for TransferError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransferError::SpawnFailed { program, path, source } => {
				write!(f, "Failed to start {} for {}: {}", program, path, source)
			}
			TransferError::Failed { program, path, code, stderr } => {
				let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
				write!(f, "{} failed for {} (exit {}): {}", program, path, code, stderr.trim())
			}
		}
	}
}

impl Error for TransferError {}

/// Path filtering errors
///
/// Git query failures are recovered by the filter itself; only pattern
/// construction errors reach callers.
#[derive(Debug)]
pub enum FilterError {
	/// `git` could not be run
	GitUnavailable { message: String },

	/// Source directory is not a git work tree
	NotARepository,

	/// Failed to compile a glob or gitignore pattern
	InvalidPattern(String),

	/// Failed to read or parse an ignore file
	IgnoreFile(String),
}

impl fmt::Display for FilterError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FilterError::GitUnavailable { message } => write!(f, "git unavailable: {}", message),
			FilterError::NotARepository => write!(f, "not a git repository"),
			FilterError::InvalidPattern(msg) => write!(f, "Invalid exclusion pattern: {}", msg),
			FilterError::IgnoreFile(msg) => write!(f, "Ignore file error: {}", msg),
		}
	}
}

impl Error for FilterError {}


// vim: ts=4

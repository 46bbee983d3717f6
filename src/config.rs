//! Configuration for filesyncer
//!
//! The config file (`sync.json` by default) describes one local → remote
//! mapping. JSON files are read with `json5` so comments and trailing commas
//! are tolerated; files ending in `.toml` are read as TOML. Saving always
//! writes pretty-printed JSON.

use crate::error::ConfigError;
use crate::types::RemoteEndpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sync.json";

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
	// ========================================================================
	// LOCAL / REMOTE MAPPING
	// ========================================================================
	/// Local directory to watch
	pub source: String,

	/// Remote directory that mirrors `source`
	pub destination: String,

	pub host: String,
	pub username: String,
	pub port: u16,

	/// SSH identity file; `~/` is expanded against `$HOME`
	#[serde(skip_serializing_if = "Option::is_none")]
	pub private_key_path: Option<String>,

	// ========================================================================
	// FILTERING
	// ========================================================================
	/// Gitignore-style deny patterns
	pub ignore_patterns: Vec<String>,

	/// Only sync files tracked by git (removals always pass)
	pub use_git_tracking: bool,

	/// Also honor the `.gitignore` in the source root
	pub exclude_from_git_ignore: bool,

	// ========================================================================
	// AGGREGATION
	// ========================================================================
	/// Quiet period before a batch is flushed
	pub debounce_ms: u64,

	/// How long a path must be quiet before the watcher reports it
	pub settle_ms: u64,

	/// What to do with paths created and removed within one window
	pub transient_policy: TransientPolicy,

	// ========================================================================
	// TRANSFER
	// ========================================================================
	pub sync_method: SyncMethod,

	/// Remove remote entries absent locally during full-tree sync
	pub delete_remote_files: bool,

	/// Delete removed paths remotely during incremental sync (rsync only)
	pub propagate_deletes: bool,

	/// Upper bound on concurrent per-path transfers
	pub max_concurrent_transfers: usize,

	/// Connection probe timeout
	pub probe_timeout_ms: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		SyncConfig {
			source: String::new(),
			destination: String::new(),
			host: String::new(),
			username: String::new(),
			port: RemoteEndpoint::DEFAULT_PORT,
			private_key_path: None,

			ignore_patterns: vec![],
			use_git_tracking: false,
			exclude_from_git_ignore: true,

			debounce_ms: 1000,
			settle_ms: 200,
			transient_policy: TransientPolicy::Propagate,

			sync_method: SyncMethod::Rsync,
			delete_remote_files: false,
			propagate_deletes: false,
			max_concurrent_transfers: 8,
			probe_timeout_ms: 5000,
		}
	}
}

impl SyncConfig {
	/// Starter configuration written by `filesyncer init`
	pub fn example() -> Self {
		SyncConfig {
			source: ".".to_string(),
			destination: "/var/www/app".to_string(),
			host: "example.com".to_string(),
			username: "user".to_string(),
			private_key_path: Some("~/.ssh/id_rsa".to_string()),
			ignore_patterns: vec![
				"node_modules/**".to_string(),
				"dist/**".to_string(),
				".git/**".to_string(),
			],
			..Default::default()
		}
	}

	/// Check required fields and value ranges
	pub fn validate(&self) -> Result<(), ConfigError> {
		for (field, value) in [
			("source", &self.source),
			("destination", &self.destination),
			("host", &self.host),
			("username", &self.username),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::MissingField { field: field.to_string() });
			}
		}

		if self.port == 0 {
			return Err(invalid("port", "must be between 1 and 65535"));
		}
		if self.debounce_ms == 0 {
			return Err(invalid("debounceMs", "must be greater than 0"));
		}
		if self.max_concurrent_transfers == 0 {
			return Err(invalid("maxConcurrentTransfers", "must be greater than 0"));
		}
		if self.probe_timeout_ms == 0 {
			return Err(invalid("probeTimeoutMs", "must be greater than 0"));
		}
		if self.propagate_deletes && self.sync_method == SyncMethod::Scp {
			return Err(ConfigError::UnsupportedMode {
				method: self.sync_method.to_string(),
				mode: "propagateDeletes".to_string(),
			});
		}
		Ok(())
	}

	/// Remote endpoint described by this config
	pub fn endpoint(&self) -> RemoteEndpoint {
		RemoteEndpoint {
			host: self.host.clone(),
			username: self.username.clone(),
			port: self.port,
			private_key_path: self.private_key_path.as_deref().map(expand_home),
		}
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}

	pub fn probe_timeout(&self) -> Duration {
		Duration::from_millis(self.probe_timeout_ms)
	}

	/// Local source directory as a path
	pub fn source_dir(&self) -> PathBuf {
		PathBuf::from(&self.source)
	}
}

fn invalid(field: &str, message: &str) -> ConfigError {
	ConfigError::InvalidValue { field: field.to_string(), message: message.to_string() }
}

/// Expand a leading `~/` against `$HOME`
pub fn expand_home(path: &str) -> PathBuf {
	expand_home_in(path, std::env::var_os("HOME").map(PathBuf::from).as_deref())
}

/// Expand a leading `~/` against `home`; unchanged when `home` is unknown
pub fn expand_home_in(path: &str, home: Option<&Path>) -> PathBuf {
	match (path.strip_prefix("~/"), home) {
		(Some(rest), Some(home)) => home.join(rest),
		_ => PathBuf::from(path),
	}
}

// ============================================================================
// LOADING & SAVING
// ============================================================================

/// Owns the config file location
#[derive(Debug, Clone)]
pub struct ConfigFile {
	path: PathBuf,
}

impl ConfigFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `sync.json` in the current directory
	pub fn default_location() -> Self {
		Self::new(DEFAULT_CONFIG_FILE)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn exists(&self) -> bool {
		self.path.exists()
	}

	/// Read, parse and validate the config file
	pub fn load(&self) -> Result<SyncConfig, ConfigError> {
		if !self.path.exists() {
			return Err(ConfigError::NotFound { path: self.path.clone() });
		}
		let content = fs::read_to_string(&self.path)
			.map_err(|e| ConfigError::Io { path: self.path.clone(), source: e })?;

		let config = parse_config(&self.path, &content)?;
		config.validate()?;
		Ok(config)
	}

	/// Validate and write `config` as pretty JSON
	pub fn save(&self, config: &SyncConfig) -> Result<(), ConfigError> {
		config.validate()?;
		let json = serde_json::to_string_pretty(config)
			.map_err(|e| ConfigError::Parse { path: self.path.clone(), message: e.to_string() })?;
		fs::write(&self.path, json + "\n")
			.map_err(|e| ConfigError::Io { path: self.path.clone(), source: e })
	}

	/// Write the starter config; never overwrites an existing file
	pub fn create_default(&self) -> Result<SyncConfig, ConfigError> {
		if self.exists() {
			return Err(ConfigError::AlreadyExists { path: self.path.clone() });
		}
		let config = SyncConfig::example();
		self.save(&config)?;
		Ok(config)
	}
}

fn parse_config(path: &Path, content: &str) -> Result<SyncConfig, ConfigError> {
	let is_toml = path.extension().map(|ext| ext == "toml").unwrap_or(false);
	if is_toml {
		toml::from_str(content)
			.map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
	} else {
		json5::from_str(content)
			.map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
	}
}

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// Transport backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
	#[default]
	Rsync,
	Scp,
}

impl FromStr for SyncMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"rsync" => Ok(Self::Rsync),
			"scp" => Ok(Self::Scp),
			_ => Err(format!("syncMethod must be either \"rsync\" or \"scp\", got {}", s)),
		}
	}
}

impl fmt::Display for SyncMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Rsync => write!(f, "rsync"),
			Self::Scp => write!(f, "scp"),
		}
	}
}

/// Handling of a path that was created and then removed inside one
/// debounce window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransientPolicy {
	/// Keep the removal in the batch (last kind wins)
	#[default]
	Propagate,

	/// Drop the path; it never reached the remote
	Skip,
}

impl FromStr for TransientPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"propagate" | "delete" => Ok(Self::Propagate),
			"skip" => Ok(Self::Skip),
			_ => Err(format!("Unknown transient policy: {}. Valid options: propagate, skip", s)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn valid_config() -> SyncConfig {
		SyncConfig::example()
	}

	#[test]
	fn test_config_default() {
		let config = SyncConfig::default();
		assert_eq!(config.port, 22);
		assert_eq!(config.debounce_ms, 1000);
		assert_eq!(config.sync_method, SyncMethod::Rsync);
		assert!(!config.delete_remote_files);
		assert!(config.exclude_from_git_ignore);
	}

	#[test]
	fn test_validate_missing_field() {
		let config = SyncConfig { host: String::new(), ..valid_config() };
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("Missing required field: host"));
	}

	#[test]
	fn test_validate_port_zero() {
		let config = SyncConfig { port: 0, ..valid_config() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_validate_scp_cannot_propagate_deletes() {
		let config =
			SyncConfig { sync_method: SyncMethod::Scp, propagate_deletes: true, ..valid_config() };
		assert!(matches!(config.validate(), Err(ConfigError::UnsupportedMode { .. })));
	}

	#[test]
	fn test_load_json5_with_comments() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("sync.json");
		fs::write(
			&path,
			r#"{
				// deploy target
				"source": ".",
				"destination": "/srv/app",
				"host": "web1",
				"username": "deploy",
				"syncMethod": "scp",
				"ignorePatterns": ["dist/**"],
			}"#,
		)
		.unwrap();

		let config = ConfigFile::new(&path).load().unwrap();
		assert_eq!(config.host, "web1");
		assert_eq!(config.sync_method, SyncMethod::Scp);
		assert_eq!(config.ignore_patterns, vec!["dist/**".to_string()]);
		assert_eq!(config.port, 22);
	}

	#[test]
	fn test_load_toml() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("sync.toml");
		fs::write(
			&path,
			"source = \".\"\ndestination = \"/srv\"\nhost = \"h\"\nusername = \"u\"\nport = 2222\n",
		)
		.unwrap();

		let config = ConfigFile::new(&path).load().unwrap();
		assert_eq!(config.port, 2222);
	}

	#[test]
	fn test_load_rejects_unknown_sync_method() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("sync.json");
		fs::write(
			&path,
			r#"{"source":".","destination":"/d","host":"h","username":"u","syncMethod":"ftp"}"#,
		)
		.unwrap();

		assert!(matches!(ConfigFile::new(&path).load(), Err(ConfigError::Parse { .. })));
	}

	#[test]
	fn test_load_missing_file() {
		let temp_dir = TempDir::new().unwrap();
		let file = ConfigFile::new(temp_dir.path().join("nope.json"));
		assert!(matches!(file.load(), Err(ConfigError::NotFound { .. })));
	}

	#[test]
	fn test_create_default_refuses_overwrite() {
		let temp_dir = TempDir::new().unwrap();
		let file = ConfigFile::new(temp_dir.path().join("sync.json"));

		let created = file.create_default().unwrap();
		assert_eq!(file.load().unwrap(), created);
		assert!(matches!(file.create_default(), Err(ConfigError::AlreadyExists { .. })));
	}

	#[test]
	fn test_expand_home() {
		let home = Path::new("/home/tester");
		assert_eq!(expand_home_in("~/.ssh/key", Some(home)), PathBuf::from("/home/tester/.ssh/key"));
		assert_eq!(expand_home_in("/keys/id", Some(home)), PathBuf::from("/keys/id"));
		assert_eq!(expand_home_in("~user/key", Some(home)), PathBuf::from("~user/key"));
		assert_eq!(expand_home_in("~/.ssh/key", None), PathBuf::from("~/.ssh/key"));
	}

	#[test]
	fn test_endpoint_keeps_absolute_key_path() {
		let config =
			SyncConfig { private_key_path: Some("/keys/deploy".to_string()), ..valid_config() };
		let endpoint = config.endpoint();
		assert_eq!(endpoint.private_key_path, Some(PathBuf::from("/keys/deploy")));
	}

	#[test]
	fn test_sync_method_from_str() {
		assert_eq!("RSYNC".parse::<SyncMethod>().unwrap(), SyncMethod::Rsync);
		assert!("ftp".parse::<SyncMethod>().is_err());
	}
}

// vim: ts=4

//! # filesyncer - Watch a directory and push changes to a remote host
//!
//! filesyncer watches a local source tree, filters and coalesces the changes
//! it sees, and pushes each resulting batch to a remote destination over
//! rsync or scp.
//!
//! ```text
//! notify -> watch (settle) -> PathFilter -> ChangeAggregator -> SyncDispatcher -> Transport
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filesyncer::config::ConfigFile;
//! use filesyncer::dispatch::SyncDispatcher;
//! use filesyncer::types::SyncRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigFile::default_location().load()?;
//!     let dispatcher = SyncDispatcher::from_config(&config, &config.source_dir());
//!     let outcome = dispatcher.execute(SyncRequest::FullTree { mirror_deletes: false }).await;
//!     println!("succeeded: {}", outcome.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Watching
//!
//! ```rust,ignore
//! use filesyncer::watch::WatchSession;
//! use std::sync::Arc;
//!
//! let session = WatchSession::start(&config, Arc::new(|batch| println!("{} change(s)", batch.len())))?;
//! // ...
//! session.stop().await;
//! ```

pub mod aggregator;
pub mod callbacks;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exclusion;
pub mod git;
pub mod logging;
pub mod probe;
pub mod transport;
pub mod types;
pub mod utils;
pub mod watch;

// Re-export commonly used types and functions
pub use aggregator::ChangeAggregator;
pub use config::{ConfigFile, SyncConfig};
pub use dispatch::SyncDispatcher;
pub use error::{ConfigError, ConnectivityError, FilterError, SyncError, TransferError};
pub use exclusion::PathFilter;
pub use probe::probe;
pub use types::{Batch, ChangeEvent, ChangeKind, RemoteEndpoint, SyncOutcome, SyncRequest};

// vim: ts=4

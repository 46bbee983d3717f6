//! Utility modules for common functionality

pub mod signal;

pub use signal::{wait_for_shutdown, Shutdown};

// vim: ts=4

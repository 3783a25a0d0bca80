//! # Quiesce Server
//!
//! Process wrapper around [`quiesce_core`]: loads configuration, installs
//! logging, delivers ready events over HTTP and stops on SIGINT/SIGTERM.

pub mod infra;

pub use infra::notifier::HttpNotifier;

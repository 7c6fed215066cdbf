//! mongod process lifecycle
//!
//! The only part of the harness that spawns or kills an OS process. A
//! [`ServerLauncher`] starts `mongod` on a fixed host and port with a
//! throwaway data directory and waits until it accepts connections; the
//! resulting [`ServerInstance`] terminates the process and removes the data
//! directory on [`ServerInstance::release`], or on drop if release was
//! never reached.

pub mod instance;
pub mod launcher;
mod output;

pub use instance::{ServerInstance, ServerState};
pub use launcher::{parse_version, ServerLauncher};

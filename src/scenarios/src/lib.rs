//! RBAC reproduction scenarios
//!
//! Each [`Scenario`] starts a fresh authorization-enabled server, creates
//! the first administrator through the bootstrap exemption, provisions a
//! restricted user (and, for some scenarios, a custom role), seeds one
//! collection, and asserts what the restricted user sees when listing
//! collections. The server is released whatever happens in between.

pub mod expectation;
pub mod runner;
pub mod scenario;

pub use expectation::Expectation;
pub use runner::{settle, with_server, ScenarioPhase, ScenarioReport, ScenarioRunner};
pub use scenario::{seed_document, Scenario, LIST_COLLECTIONS};

//! Driver sessions
//!
//! Opens anonymous or credential-authenticated connections to a single
//! server and exposes the handful of operations the scenarios need:
//! administrative commands, a document insert, and collection listing.
//! Server replies are classified into the harness error taxonomy so that an
//! authorization denial is never confused with any other failure.

pub mod classify;
pub mod factory;
pub mod session;

pub use factory::SessionFactory;
pub use session::Session;

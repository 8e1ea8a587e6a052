//! Shared test utilities for relaysync.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with `#[track_caller]`
//! - [`trace`] - Shared, ordered record of hardware and notifier calls
//! - [`mock`] - Recording implementations of the manager's collaborator traits
//! - [`prelude`] - Convenience re-exports
//!
//! Mocks share one [`trace::EventTrace`], so a test can assert the exact
//! interleaving of feedback, zero-cross, relay and notifier calls.

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod mock;
pub mod must;
pub mod prelude;
pub mod trace;

pub use must::*;

//! # relaysync-zerocross
//!
//! Zero-cross edge plumbing for synchronized relay switching.
//!
//! This crate provides:
//! - `ZeroCrossSource` trait for edge-detection drivers
//! - `SyncState`, the atomic pending flag shared by worker and edge context
//! - `Rendezvous`, the one-slot handoff from edge context back to the worker
//! - `SimulatedZeroCross` for hosted environments and tests
//!
//! ## State Machine
//!
//! ```text
//! Idle ──arm()──► Pending ──claim()──► Switching
//!  ▲                 │                     │
//!  │             cancel()              complete()
//!  │                 │                     │
//!  └─────────────────┴─────────────────────┘
//! ```
//!
//! `arm()` only succeeds from `Idle`, so a second synchronization can never
//! be armed before the first one completes. `claim()` only succeeds from
//! `Pending`, so extra or spurious edges are absorbed.
//!
//! ## Example
//!
//! ```rust
//! use relaysync_zerocross::prelude::*;
//!
//! let state = SyncState::new();
//! let rendezvous = Rendezvous::new();
//!
//! state.arm().expect("idle");
//! assert!(state.arm().is_err());
//!
//! // edge context
//! if state.claim() {
//!     state.complete().expect("switching");
//!     rendezvous.release();
//! }
//!
//! // worker context
//! assert!(rendezvous.wait());
//! assert_eq!(state.status(), SyncStatus::Idle);
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]

pub mod edge;
pub mod error;
pub mod prelude;
pub mod rendezvous;
pub mod simulated;
pub mod state;

pub use edge::{EdgeCallback, EdgeLevel, ZeroCrossSource};
pub use error::{ZeroCrossError, ZeroCrossResult};
pub use rendezvous::Rendezvous;
pub use simulated::{MainsHandle, SimulatedZeroCross};
pub use state::{SyncMetrics, SyncState, SyncStatus};

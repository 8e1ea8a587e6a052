//! Prelude module for zero-cross synchronization types.

pub use crate::edge::{EdgeCallback, EdgeLevel, ZeroCrossSource};
pub use crate::error::{ZeroCrossError, ZeroCrossResult};
pub use crate::rendezvous::Rendezvous;
pub use crate::simulated::{MAINS_HZ_RANGE, MainsHandle, SimulatedZeroCross};
pub use crate::state::{SyncMetrics, SyncState, SyncStatus};

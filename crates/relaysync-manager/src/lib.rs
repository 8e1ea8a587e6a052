//! # relaysync-manager
//!
//! Switches AC relays at a fixed offset from the mains zero-cross and tunes
//! that offset per relay from measured contact timing.
//!
//! A [`RelayManager`] owns one worker thread that drains a bounded queue of
//! [`RelayAction`]s. Each action is executed end to end before the next one
//! starts:
//!
//! 1. engage the relay's feedback device (if any) and let it stabilize
//! 2. arm the zero-cross source and block until the edge handler has
//!    switched the relay after `delay_on_us` / `delay_off_us`
//! 3. wait out the inrush window, then pause or stop feedback capture
//! 4. recalibrate the delays from the feedback result and persist them
//! 5. publish the status and feedback-availability notifications
//!
//! Without a zero-cross source the switch runs directly on the worker with
//! the same timing and notifications.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use relaysync_manager::prelude::*;
//!
//! struct Led(u8);
//!
//! impl Relay for Led {
//!     fn id(&self) -> u8 { self.0 }
//!     fn turn_on(&self) {}
//!     fn turn_off(&self) {}
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ManagerConfig {
//!     capture_time_ms: 0,
//!     inrush_time_ms: 0,
//!     ..ManagerConfig::default()
//! };
//! let mut builder = RelayManager::builder(config)?;
//! builder.register(Arc::new(Led(0)), None)?;
//!
//! let mut manager = builder.start()?;
//! manager.submit(RelayAction::on(0))?;
//! manager.shutdown();
//! assert_eq!(manager.stats().completed(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]

pub mod action;
pub mod active;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hardware;
pub mod manager;
pub mod notify;
pub mod prelude;
pub mod registry;
pub mod synchronizer;

pub use action::{ACTION_WIRE_LEN, RelayAction, RelayRequest};
pub use active::{ActiveObject, EventHandler, StateEvent, StateResult, WorkerConfig};
pub use config::ManagerConfig;
pub use coordinator::{ActionCoordinator, ActionOutcome, ActionTiming};
pub use error::{
    ActionError, ConfigError, ManagerError, ManagerResult, MessageError, MessageFormatError,
    QueueFullError, RegistrationError, UnknownRequestError,
};
pub use hardware::{FeedbackDevice, Relay};
pub use manager::{
    COMMAND_TOPIC_ROOT, ManagerState, ManagerStats, RelayManager, RelayManagerBuilder,
    is_command_topic,
};
pub use notify::{LogPublisher, Notifier, Publisher, TopicNotifier};
pub use registry::{RelayEntry, RelayRegistry};
pub use synchronizer::{PendingSwitch, SwitchOutcome, ZeroCrossSynchronizer, ZeroCrossTester};

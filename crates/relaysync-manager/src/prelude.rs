//! Prelude module for relay manager types.

pub use crate::action::{RelayAction, RelayRequest};
pub use crate::config::ManagerConfig;
pub use crate::coordinator::ActionOutcome;
pub use crate::error::{
    ActionError, ConfigError, ManagerError, MessageError, QueueFullError, RegistrationError,
};
pub use crate::hardware::{FeedbackDevice, Relay};
pub use crate::manager::{RelayManager, RelayManagerBuilder};
pub use crate::notify::{Notifier, Publisher, TopicNotifier};
pub use crate::synchronizer::ZeroCrossTester;

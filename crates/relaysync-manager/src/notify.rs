//! Result notifications.

use tracing::info;

use crate::action::RelayAction;

/// Receives the outcome of each completed action.
pub trait Notifier: Send + Sync {
    /// The action completed; `action` is republished unchanged.
    fn status(&self, action: &RelayAction);

    /// A feedback measurement is available. `byte` is `b'1'` after a turn-on
    /// and `b'0'` after a turn-off.
    fn feedback_available(&self, relay_id: u8, byte: u8);
}

/// Byte-level publish transport.
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`.
    fn publish(&self, topic: &str, payload: &[u8]);
}

impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn publish(&self, topic: &str, payload: &[u8]) {
        (**self).publish(topic, payload);
    }
}

/// Publisher that writes every publication to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) {
        info!(topic, ?payload, "publish");
    }
}

/// Root of status topics.
pub const STATUS_TOPIC_ROOT: &str = "stat/value";
/// Root of feedback-availability topics.
pub const FEEDBACK_TOPIC_ROOT: &str = "stat/fdbk";

/// [`Notifier`] that publishes to `stat/value/<base>` and
/// `stat/fdbk/<base>`.
#[derive(Debug)]
pub struct TopicNotifier<P> {
    publisher: P,
    status_topic: String,
    feedback_topic: String,
}

impl<P: Publisher> TopicNotifier<P> {
    /// Publish under `base` through `publisher`.
    pub fn new(publisher: P, base: &str) -> Self {
        Self {
            publisher,
            status_topic: format!("{STATUS_TOPIC_ROOT}/{base}"),
            feedback_topic: format!("{FEEDBACK_TOPIC_ROOT}/{base}"),
        }
    }

    /// Status topic.
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Feedback topic.
    pub fn feedback_topic(&self) -> &str {
        &self.feedback_topic
    }

    /// The wrapped publisher.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<P: Publisher> Notifier for TopicNotifier<P> {
    fn status(&self, action: &RelayAction) {
        self.publisher.publish(&self.status_topic, &action.encode());
    }

    fn feedback_available(&self, _relay_id: u8, byte: u8) {
        self.publisher.publish(&self.feedback_topic, &[byte]);
    }
}

//! Zero-cross edge levels and the edge source trait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Active edge(s) of the zero-cross signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EdgeLevel {
    /// Low-to-high transition.
    Rising = 1,
    /// High-to-low transition.
    Falling = 2,
    /// Either transition.
    #[default]
    Both = 3,
}

impl EdgeLevel {
    /// `true` if an `edge` event fires for a source enabled at `self`.
    #[inline]
    pub fn accepts(self, edge: EdgeLevel) -> bool {
        (self as u8) & (edge as u8) != 0
    }

    /// The opposite single edge; `Both` maps to itself.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            EdgeLevel::Rising => EdgeLevel::Falling,
            EdgeLevel::Falling => EdgeLevel::Rising,
            EdgeLevel::Both => EdgeLevel::Both,
        }
    }
}

/// Handler invoked from edge context with the edge that fired.
pub type EdgeCallback = Arc<dyn Fn(EdgeLevel) + Send + Sync>;

/// Zero-cross edge-detection driver.
///
/// `enable_events` installs `on_edge` and starts delivering edges matching
/// `level` from edge (interrupt) context. `disable_events` stops delivery.
pub trait ZeroCrossSource: Send + Sync {
    /// Start delivering edges matching `level` to `on_edge`.
    fn enable_events(&self, level: EdgeLevel, on_edge: EdgeCallback);

    /// Stop delivering edges for `level`.
    fn disable_events(&self, level: EdgeLevel);
}

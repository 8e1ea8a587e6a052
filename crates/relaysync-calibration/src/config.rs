//! Per-relay switching-delay configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, CalibrationResult, IntegrityViolation};

/// Maximum switching delay (50ms). Valid delays are strictly below this.
pub const MAX_SWITCHING_DELAY_US: u32 = 50_000;

/// Default and minimum switching delay (8ms).
pub const DEFAULT_SWITCHING_DELAY_US: u32 = 8_000;

/// Default comparison delta (5% of a 10ms semicycle).
pub const DEFAULT_SWITCHING_DELTA_US: u32 = 500;

/// Size in bytes of one persisted record.
pub const RECORD_LEN: usize = 12;

/// Timing parameters for one relay.
///
/// The record is persisted as three little-endian `u32` values in field
/// order, [`RECORD_LEN`] bytes in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Delay from zero-cross edge to the turn-on command, in µs.
    pub delay_on_us: u32,
    /// Delay from zero-cross edge to the turn-off command, in µs.
    pub delay_off_us: u32,
    /// Tolerance window for feedback classification, in µs.
    pub delta_us: u32,
}

impl CalibrationConfig {
    /// Factory default applied when restore or integrity fails.
    pub const DEFAULT: Self = Self {
        delay_on_us: DEFAULT_SWITCHING_DELAY_US,
        delay_off_us: DEFAULT_SWITCHING_DELAY_US,
        delta_us: DEFAULT_SWITCHING_DELTA_US,
    };

    /// Create a config from its three fields.
    pub const fn new(delay_on_us: u32, delay_off_us: u32, delta_us: u32) -> Self {
        Self {
            delay_on_us,
            delay_off_us,
            delta_us,
        }
    }

    /// Check the range invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated field.
    pub fn check(&self) -> Result<(), IntegrityViolation> {
        let range = DEFAULT_SWITCHING_DELAY_US..MAX_SWITCHING_DELAY_US;
        if !range.contains(&self.delay_on_us) {
            return Err(IntegrityViolation::DelayOnOutOfRange(self.delay_on_us));
        }
        if !range.contains(&self.delay_off_us) {
            return Err(IntegrityViolation::DelayOffOutOfRange(self.delay_off_us));
        }
        if self.delta_us == 0 {
            return Err(IntegrityViolation::ZeroDelta);
        }
        Ok(())
    }

    /// `true` if the range invariant holds.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Encode to the fixed-size persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Codec`] if encoding fails.
    pub fn to_record(&self) -> CalibrationResult<Vec<u8>> {
        bincode::serde::encode_to_vec(self, record_config())
            .map_err(|e| CalibrationError::Codec(e.to_string()))
    }

    /// Decode from a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Codec`] if the record is not exactly
    /// [`RECORD_LEN`] bytes or cannot be decoded.
    pub fn from_record(bytes: &[u8]) -> CalibrationResult<Self> {
        if bytes.len() != RECORD_LEN {
            return Err(CalibrationError::Codec(format!(
                "record is {} bytes, expected {RECORD_LEN}",
                bytes.len()
            )));
        }
        let (cfg, _) = bincode::serde::decode_from_slice(bytes, record_config())
            .map_err(|e| CalibrationError::Codec(e.to_string()))?;
        Ok(cfg)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn record_config() -> impl bincode::config::Config {
    // Fixed-width little-endian integers keep the record at 12 bytes.
    bincode::config::legacy()
}

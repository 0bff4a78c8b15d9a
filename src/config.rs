//! Card Configuration
//!
//! Attach-time settings for the card set: which card is plugged in, the host
//! CPU clock that drives the 6522 timers, and how many phoneme requests the
//! speech worker may hold.

use serde::{Deserialize, Serialize};

use crate::{MockingboardError, Result};

/// NTSC Apple II CPU clock (14.31818 MHz * 65 / 912)
pub const HOST_CLOCK_NTSC_HZ: u32 = 1_020_484;

/// Housekeeping rate used when no 6522 owns the update timer
pub const FALLBACK_UPDATE_HZ: u32 = 60;

/// Default depth of the phoneme request queue
pub const DEFAULT_SPEECH_QUEUE_DEPTH: usize = 16;

/// Which card is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    /// Classic Mockingboard: one 6522 + AY pair per PIA, two cards
    Mockingboard,
    /// Applied Engineering Phasor: two AYs per 6522, native dual-chip addressing
    Phasor,
}

/// Card set configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardConfig {
    /// Attached card type
    pub kind: CardKind,
    /// Host CPU clock in Hz
    pub host_clock_hz: u32,
    /// Maximum number of queued phoneme requests
    pub speech_queue_depth: usize,
}

impl CardConfig {
    /// Two classic Mockingboards (slots 4 and 5) on an NTSC host
    pub fn mockingboard() -> Self {
        CardConfig {
            kind: CardKind::Mockingboard,
            host_clock_hz: HOST_CLOCK_NTSC_HZ,
            speech_queue_depth: DEFAULT_SPEECH_QUEUE_DEPTH,
        }
    }

    /// A single Phasor (slot 4) on an NTSC host
    pub fn phasor() -> Self {
        CardConfig {
            kind: CardKind::Phasor,
            ..Self::mockingboard()
        }
    }

    /// Whether the Phasor enable flag is set
    pub fn phasor_enabled(&self) -> bool {
        self.kind == CardKind::Phasor
    }

    /// Cycles between PSG updates when no timer owns the update slot
    pub fn fallback_update_period(&self) -> u32 {
        self.host_clock_hz / FALLBACK_UPDATE_HZ
    }

    /// Check the configuration for values the card cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host_clock_hz < FALLBACK_UPDATE_HZ {
            return Err(MockingboardError::ConfigError(format!(
                "host clock {} Hz is below the {} Hz housekeeping rate",
                self.host_clock_hz, FALLBACK_UPDATE_HZ
            )));
        }
        if self.speech_queue_depth == 0 {
            return Err(MockingboardError::ConfigError(
                "speech queue depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self::mockingboard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_mockingboard() {
        let config = CardConfig::default();
        assert_eq!(config.kind, CardKind::Mockingboard);
        assert!(!config.phasor_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_period_is_sixtieth_of_clock() {
        let config = CardConfig::mockingboard();
        assert_eq!(config.fallback_update_period(), 17_008);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = CardConfig::phasor();
        assert!(config.phasor_enabled());

        config.host_clock_hz = 0;
        assert!(config.validate().is_err());

        let config = CardConfig {
            speech_queue_depth: 0,
            ..CardConfig::phasor()
        };
        assert!(matches!(
            config.validate(),
            Err(MockingboardError::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = CardConfig::phasor();
        let json = serde_json::to_string(&config).unwrap();
        let back: CardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}

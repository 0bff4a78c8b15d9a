//! Mockingboard / Phasor Sound Card Emulator
//!
//! A register-level emulator of the Sweet Micro Systems Mockingboard and the
//! Applied Engineering Phasor for Apple II emulators. The card set couples
//! two 6522 PIAs per card to AY-3-8910 sound generators and an SSI263 speech
//! chip, with the Votrax SC-01 phoneme interface translated on the fly.
//!
//! # Features
//! - 6522 register file with timer 1 (free-running/one-shot) and timer 2
//! - Single-owner update timer with a 60 Hz housekeeping fallback
//! - Host IRQ aggregation over every 6522 plus the Phasor speech line
//! - AY-3-8910 bus decoding, including Phasor dual-chip selects
//! - SSI263 register model and a non-blocking phoneme playback worker
//! - Mockingboard and Phasor (compatible and native) address layouts
//! - Bit-exact per-card snapshots
//!
//! The emulator does not synthesize audio: sound generator and phoneme audio
//! are host collaborators ([`PsgSink`], [`PhonemeOutput`]).
//!
//! # Quick start
//! ```no_run
//! use mockingboard::{CardConfig, ImmediateSpeech, IrqLines, Mockingboard, PsgRegisterBank};
//!
//! let config = CardConfig::mockingboard();
//! let mut card = Mockingboard::new(
//!     config,
//!     IrqLines::default(),
//!     PsgRegisterBank::new(mockingboard::NUM_PSGS, config.host_clock_hz),
//!     ImmediateSpeech::new(),
//! )
//! .unwrap();
//! card.write(0, 0x03, 0xFF); // DDRA: all outputs
//! card.write(0, 0x02, 0x07); // DDRB: BC1, BDIR, !RESET
//! card.update_cycles(17_030);
//! let irq = card.irq().asserted();
//! ```

#![warn(missing_docs)]

pub mod address; // Card Address Decoding
pub mod card; // Card Set
pub mod config; // Card Configuration
pub mod irq; // Interrupt Aggregation
pub mod psg; // AY-3-8910 Bus Decoding
pub mod snapshot; // Card Snapshots
pub mod speech; // SSI263 + Votrax
pub mod timer; // 6522 Timer Engine
pub mod via6522; // 6522 PIA

/// Cards in the set (slots 4 and 5; a Phasor uses only the first)
pub const NUM_CARDS: usize = 2;
/// 6522 units across the card set
pub const NUM_PIAS: usize = NUM_CARDS * 2;
/// Sound generators across the card set
pub const NUM_PSGS: usize = 4;

/// Error types for card emulator operations
#[derive(thiserror::Error, Debug)]
pub enum MockingboardError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Snapshot image could not be restored
    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    /// IO error (speech worker thread spawn)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for MockingboardError {
    /// Converts a String into `MockingboardError::Other`.
    ///
    /// Prefer `ConfigError` or `SnapshotError` where the failure has a
    /// specific cause.
    fn from(msg: String) -> Self {
        MockingboardError::Other(msg)
    }
}

impl From<&str> for MockingboardError {
    /// Converts a string slice into `MockingboardError::Other`.
    fn from(msg: &str) -> Self {
        MockingboardError::Other(msg.to_string())
    }
}

/// Result type for card emulator operations
pub type Result<T> = std::result::Result<T, MockingboardError>;

// Public API exports
pub use address::Layout;
pub use card::{Mockingboard, PiaUnit};
pub use config::{CardConfig, CardKind};
pub use irq::{InterruptLine, IrqLines, IrqSource};
pub use psg::{PsgFunction, PsgRegister, PsgRegisterBank, PsgSink};
pub use snapshot::{CardSnapshot, UnitSnapshot};
pub use speech::{ImmediateSpeech, PhonemeOutput, PhonemePlayer, Ssi263, SpeechWorker};
pub use via6522::{Via6522, ViaRegister};

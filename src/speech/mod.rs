//! SSI263 Speech Chip
//!
//! Register model of the Silicon Systems SSI263 phoneme synthesizer fitted
//! to the Mockingboard "Sound/Speech I" and the Phasor, plus the SC-01
//! (Votrax) code path and the worker thread that waits for phoneme audio to
//! finish.
//!
//! The chip signals "ready for the next phoneme" on its A/!R pin. On the
//! Mockingboard that pin lands on CA1 of the second 6522; on the Phasor it
//! goes straight to the CPU's IRQ line.

pub mod votrax;
pub mod worker;

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

pub use worker::{PhonemePlayer, SpeechWorker};

/// Phoneme bits of the duration/phoneme register
pub const PHONEME_MASK: u8 = 0x3F;
/// Duration-mode bits of the duration/phoneme register
pub const DURATION_MODE_MASK: u8 = 0xC0;
/// Control bit of the control/articulation/amplitude register
pub const CONTROL_MASK: u8 = 0x80;
/// Articulation bits of the control/articulation/amplitude register
pub const ARTICULATION_MASK: u8 = 0x70;
/// Amplitude bits of the control/articulation/amplitude register
pub const AMPLITUDE_MASK: u8 = 0x0F;
/// Rate bits of the rate/inflection register
pub const RATE_MASK: u8 = 0xF0;
/// A/!R pin mirror in the current-mode byte
pub const PIN_MASK: u8 = 0x01;

/// PCR value Mockingboard drivers program for SSI263 interrupts (CA1 positive edge)
pub const PCR_SSI263: u8 = 0x0C;
/// PCR value Votrax drivers program (CB2 pulse output, CB1 positive edge)
pub const PCR_VOTRAX: u8 = 0xB0;

/// SSI263 register (offset from the chip base)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum SpeechRegister {
    /// Duration / phoneme - $0
    DurationPhoneme = 0x00,
    /// Inflection - $1
    Inflection = 0x01,
    /// Rate / inflection - $2
    RateInflection = 0x02,
    /// Control / articulation / amplitude - $3
    ControlArticulationAmplitude = 0x03,
    /// Filter frequency - $4
    FilterFrequency = 0x04,
}

impl SpeechRegister {
    /// Convert a raw register number; offsets past the filter register have no register
    pub fn from_addr(addr: u8) -> Option<Self> {
        Self::from_u8(addr)
    }
}

impl fmt::Display for SpeechRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechRegister::DurationPhoneme => write!(f, "DURPHON"),
            SpeechRegister::Inflection => write!(f, "INFLECT"),
            SpeechRegister::RateInflection => write!(f, "RATEINF"),
            SpeechRegister::ControlArticulationAmplitude => write!(f, "CTTRAMP"),
            SpeechRegister::FilterFrequency => write!(f, "FILFREQ"),
        }
    }
}

/// Duration mode (top two bits of duration/phoneme)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechMode {
    /// 00: transitioned inflection
    TransitionedInflection,
    /// 01: immediate inflection
    ImmediateInflection,
    /// 10: frame-immediate inflection
    FrameImmediateInflection,
    /// 11: A/!R interrupt disabled
    IrqDisabled,
}

impl SpeechMode {
    /// Mode encoded in the top two bits of `value`
    pub fn from_bits(value: u8) -> Self {
        match value >> 6 {
            0 => SpeechMode::TransitionedInflection,
            1 => SpeechMode::ImmediateInflection,
            2 => SpeechMode::FrameImmediateInflection,
            _ => SpeechMode::IrqDisabled,
        }
    }
}

/// What the card must do after a speech register write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeechWrite {
    /// Drop the pending speech interrupt
    pub clear_irq: bool,
    /// Phoneme to hand to the playback collaborator
    pub play: Option<u8>,
}

/// SSI263 register file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssi263 {
    pub(crate) duration_phoneme: u8,
    pub(crate) inflection: u8,
    pub(crate) rate_inflection: u8,
    pub(crate) control_articulation_amplitude: u8,
    pub(crate) filter_frequency: u8,
    pub(crate) current_mode: u8,
}

impl Ssi263 {
    /// Create a zeroed chip
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Write a register
    ///
    /// `phoneme_active` is only consulted on a Phasor, where rewriting
    /// phoneme 0 while a phoneme is still sounding is not a new request.
    pub fn write(
        &mut self,
        reg: SpeechRegister,
        value: u8,
        phasor: bool,
        phoneme_active: bool,
    ) -> SpeechWrite {
        match reg {
            SpeechRegister::DurationPhoneme => {
                self.current_mode &= !PIN_MASK;
                self.duration_phoneme = value;
                let play = if !phasor || value != 0 || !phoneme_active {
                    Some(value & PHONEME_MASK)
                } else {
                    None
                };
                return SpeechWrite {
                    clear_irq: true,
                    play,
                };
            }
            SpeechRegister::Inflection => self.inflection = value,
            SpeechRegister::RateInflection => self.rate_inflection = value,
            SpeechRegister::ControlArticulationAmplitude => {
                let falling = self.control_articulation_amplitude & CONTROL_MASK != 0
                    && value & CONTROL_MASK == 0;
                if falling {
                    self.current_mode = self.duration_phoneme & DURATION_MODE_MASK;
                }
                self.control_articulation_amplitude = value;
            }
            SpeechRegister::FilterFrequency => self.filter_frequency = value,
        }
        SpeechWrite::default()
    }

    /// Read any register: only A/!R is visible, in bit 7
    pub fn read(&self) -> u8 {
        (self.current_mode & PIN_MASK) << 7
    }

    /// A phoneme finished; returns whether the chip raises its interrupt
    ///
    /// A/!R rises unless the interrupt mode is disabled. `irq_routed` tells
    /// whether that line reaches the CPU in the current wiring (always on a
    /// Phasor, via CA1 only when the PCR is programmed for it on a
    /// Mockingboard).
    pub fn finish_phoneme(&mut self, irq_routed: bool) -> bool {
        if self.mode() == SpeechMode::IrqDisabled {
            return false;
        }
        self.current_mode |= PIN_MASK;
        irq_routed
    }

    /// Latched duration mode
    pub fn mode(&self) -> SpeechMode {
        SpeechMode::from_bits(self.current_mode)
    }

    /// Current-mode byte
    pub fn current_mode(&self) -> u8 {
        self.current_mode
    }

    /// Duration/phoneme register
    pub fn duration_phoneme(&self) -> u8 {
        self.duration_phoneme
    }

    /// Control/articulation/amplitude register
    pub fn control_articulation_amplitude(&self) -> u8 {
        self.control_articulation_amplitude
    }

    /// Inflection register
    pub fn inflection(&self) -> u8 {
        self.inflection
    }

    /// Rate/inflection register
    pub fn rate_inflection(&self) -> u8 {
        self.rate_inflection
    }

    /// Filter frequency register
    pub fn filter_frequency(&self) -> u8 {
        self.filter_frequency
    }
}

/// A finished phoneme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhonemeDone {
    /// PIA whose speech chip issued the phoneme
    pub device: usize,
    /// SSI263 phoneme code
    pub phoneme: u8,
}

/// Phoneme playback as seen from the emulation thread
///
/// None of these calls may block.
pub trait PhonemeOutput {
    /// Start (or queue) `phoneme` on behalf of PIA `device`
    fn play_phoneme(&mut self, device: usize, phoneme: u8);

    /// Whether a phoneme is sounding or queued
    fn phoneme_active(&self) -> bool;

    /// Take the next finished phoneme, if any
    fn poll_complete(&mut self) -> Option<PhonemeDone>;

    /// Drop queued phonemes (card reset)
    fn cancel(&mut self) {}
}

/// Speech output without audio: each phoneme finishes at the next poll
#[derive(Debug, Default, Clone)]
pub struct ImmediateSpeech {
    pending: std::collections::VecDeque<PhonemeDone>,
    played: Vec<u8>,
}

impl ImmediateSpeech {
    /// Create an idle output
    pub fn new() -> Self {
        Self::default()
    }

    /// Every phoneme dispatched so far
    pub fn played(&self) -> &[u8] {
        &self.played
    }
}

impl PhonemeOutput for ImmediateSpeech {
    fn play_phoneme(&mut self, device: usize, phoneme: u8) {
        self.played.push(phoneme);
        self.pending.push_back(PhonemeDone { device, phoneme });
    }

    fn phoneme_active(&self) -> bool {
        !self.pending.is_empty()
    }

    fn poll_complete(&mut self) -> Option<PhonemeDone> {
        self.pending.pop_front()
    }

    fn cancel(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_phoneme_write_dispatches() {
        let mut chip = Ssi263::new();
        chip.current_mode = 0xC1;
        let effect = chip.write(SpeechRegister::DurationPhoneme, 0xC5, false, true);
        assert_eq!(
            effect,
            SpeechWrite {
                clear_irq: true,
                play: Some(0x05)
            }
        );
        assert_eq!(chip.current_mode(), 0xC0);
        assert_eq!(chip.duration_phoneme(), 0xC5);
    }

    #[test]
    fn test_phasor_suppresses_silence_retrigger() {
        let mut chip = Ssi263::new();
        let effect = chip.write(SpeechRegister::DurationPhoneme, 0x00, true, true);
        assert!(effect.clear_irq);
        assert_eq!(effect.play, None);

        let effect = chip.write(SpeechRegister::DurationPhoneme, 0x00, true, false);
        assert_eq!(effect.play, Some(0x00));

        let effect = chip.write(SpeechRegister::DurationPhoneme, 0x00, false, true);
        assert_eq!(effect.play, Some(0x00));
    }

    #[test]
    fn test_mode_latches_on_control_falling_edge() {
        let mut chip = Ssi263::new();
        chip.write(SpeechRegister::DurationPhoneme, 0x80, false, false);
        chip.write(SpeechRegister::ControlArticulationAmplitude, 0x70, false, false);
        assert_eq!(chip.current_mode(), 0x00, "no edge: low -> low");

        chip.write(SpeechRegister::ControlArticulationAmplitude, 0xF0, false, false);
        assert_eq!(chip.current_mode(), 0x00, "rising edge does not latch");

        chip.write(SpeechRegister::ControlArticulationAmplitude, 0x70, false, false);
        assert_eq!(chip.mode(), SpeechMode::FrameImmediateInflection);

        chip.write(SpeechRegister::DurationPhoneme, 0xC0, false, false);
        assert_eq!(chip.mode(), SpeechMode::FrameImmediateInflection, "persists");
    }

    #[test]
    fn test_read_exposes_pin_only() {
        let mut chip = Ssi263::new();
        chip.write(SpeechRegister::FilterFrequency, 0xFF, false, false);
        assert_eq!(chip.read(), 0x00);
        assert!(chip.finish_phoneme(true));
        assert_eq!(chip.read(), 0x80);
        assert_eq!(chip.filter_frequency(), 0xFF);
    }

    #[test]
    fn test_finish_respects_irq_disabled_mode() {
        let mut chip = Ssi263::new();
        chip.current_mode = 0xC0;
        assert!(!chip.finish_phoneme(true));
        assert_eq!(chip.read(), 0x00);

        chip.current_mode = 0x40;
        assert!(chip.finish_phoneme(true));
    }

    #[test]
    fn test_pin_rises_without_irq_routing() {
        let mut chip = Ssi263::new();
        assert!(!chip.finish_phoneme(false));
        assert_eq!(chip.read(), 0x80);
        assert_eq!(chip.current_mode(), PIN_MASK);
    }

    #[test]
    fn test_immediate_speech() {
        let mut output = ImmediateSpeech::new();
        output.play_phoneme(1, 0x05);
        assert!(output.phoneme_active());
        assert_eq!(
            output.poll_complete(),
            Some(PhonemeDone {
                device: 1,
                phoneme: 0x05
            })
        );
        assert!(!output.phoneme_active());
        assert_eq!(output.played(), &[0x05]);
    }
}

//! 6522 Peripheral Interface Adapter
//!
//! Register storage and the side effects of host reads and writes. The
//! Mockingboard uses the 6522 as a dumb latch in front of the sound chips:
//! port A carries PSG data, port B carries the PSG bus-control lines, and
//! timer 1 paces the music driver.
//!
//! Decisions that span more than one PIA (who owns the update timer, what
//! port B is routed to) are returned to the caller as a [`ViaEvent`] rather
//! than taken here.

pub mod registers;

pub use registers::{InterruptFlags, ViaRegister, ACR_TIMER1_FREE_RUN, CAUSE_MASK};

use serde::{Deserialize, Serialize};

use crate::irq::flag_summary;

/// Follow-up work a register write hands back to the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViaEvent {
    /// Nothing beyond the register update
    None,
    /// ORB written; carries the value masked by DDRB
    PortB(u8),
    /// T1C-H written: counter reloaded from the latch
    Timer1Loaded,
    /// T2C-H written: counter reloaded from the latch
    Timer2Loaded,
    /// IER written with the set bit
    EnableSet,
    /// IER written with the clear bit and timer 1 is no longer enabled
    Timer1Disabled,
}

/// Timer underflows seen during one countdown step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Underflows {
    /// Timer 1 wrapped past zero
    pub timer1: bool,
    /// Timer 2 wrapped past zero
    pub timer2: bool,
}

/// MOS/Synertek 6522 register file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via6522 {
    pub(crate) orb: u8,
    pub(crate) ora: u8,
    pub(crate) ddrb: u8,
    pub(crate) ddra: u8,
    pub(crate) timer1_counter: u16,
    pub(crate) timer1_latch: u16,
    pub(crate) timer2_counter: u16,
    pub(crate) timer2_latch: u16,
    pub(crate) serial_shift: u8,
    pub(crate) acr: u8,
    pub(crate) pcr: u8,
    pub(crate) ifr: u8,
    pub(crate) ier: u8,
}

impl Via6522 {
    /// Create a PIA with every register zeroed
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Write a register and apply its side effects
    pub fn write(&mut self, reg: ViaRegister, value: u8) -> ViaEvent {
        let event = match reg {
            ViaRegister::Orb => {
                self.orb = value & self.ddrb;
                ViaEvent::PortB(self.orb)
            }
            ViaRegister::Ora => {
                self.ora = value & self.ddra;
                ViaEvent::None
            }
            ViaRegister::Ddrb => {
                self.ddrb = value;
                ViaEvent::None
            }
            ViaRegister::Ddra => {
                self.ddra = value;
                ViaEvent::None
            }
            ViaRegister::Timer1CounterLo | ViaRegister::Timer1LatchLo => {
                self.timer1_latch = (self.timer1_latch & 0xFF00) | value as u16;
                ViaEvent::None
            }
            ViaRegister::Timer1CounterHi => {
                self.ifr &= !InterruptFlags::TIMER1.bits();
                self.timer1_latch = ((value as u16) << 8) | (self.timer1_latch & 0x00FF);
                self.timer1_counter = self.timer1_latch;
                ViaEvent::Timer1Loaded
            }
            ViaRegister::Timer1LatchHi => {
                self.timer1_latch = ((value as u16) << 8) | (self.timer1_latch & 0x00FF);
                self.ifr &= !InterruptFlags::TIMER1.bits();
                ViaEvent::None
            }
            ViaRegister::Timer2Lo => {
                self.timer2_latch = (self.timer2_latch & 0xFF00) | value as u16;
                ViaEvent::None
            }
            ViaRegister::Timer2Hi => {
                self.ifr &= !InterruptFlags::TIMER2.bits();
                self.timer2_latch = ((value as u16) << 8) | (self.timer2_latch & 0x00FF);
                self.timer2_counter = self.timer2_latch;
                ViaEvent::Timer2Loaded
            }
            ViaRegister::SerialShift => ViaEvent::None,
            ViaRegister::Acr => {
                self.acr = value;
                ViaEvent::None
            }
            ViaRegister::Pcr => {
                self.pcr = value;
                ViaEvent::None
            }
            ViaRegister::Ifr => {
                // Bit 7 cannot be cleared directly; it follows the causes
                self.ifr &= !(value & CAUSE_MASK);
                ViaEvent::None
            }
            ViaRegister::Ier => {
                if value & InterruptFlags::SUMMARY.bits() != 0 {
                    self.ier |= value & CAUSE_MASK;
                    ViaEvent::EnableSet
                } else {
                    self.ier &= !value & CAUSE_MASK;
                    if self.timer1_enabled() {
                        ViaEvent::None
                    } else {
                        ViaEvent::Timer1Disabled
                    }
                }
            }
            ViaRegister::OraNoHandshake => ViaEvent::None,
        };
        self.update_summary();
        event
    }

    /// Read a register, applying read side effects
    pub fn read(&mut self, reg: ViaRegister) -> u8 {
        let value = match reg {
            ViaRegister::Orb => self.orb,
            ViaRegister::Ora | ViaRegister::OraNoHandshake => self.ora,
            ViaRegister::Ddrb => self.ddrb,
            ViaRegister::Ddra => self.ddra,
            ViaRegister::Timer1CounterLo => {
                self.ifr &= !InterruptFlags::TIMER1.bits();
                self.timer1_counter as u8
            }
            ViaRegister::Timer1CounterHi => (self.timer1_counter >> 8) as u8,
            ViaRegister::Timer1LatchLo => self.timer1_latch as u8,
            ViaRegister::Timer1LatchHi => (self.timer1_latch >> 8) as u8,
            ViaRegister::Timer2Lo => {
                self.ifr &= !InterruptFlags::TIMER2.bits();
                self.timer2_counter as u8
            }
            ViaRegister::Timer2Hi => (self.timer2_counter >> 8) as u8,
            ViaRegister::SerialShift => self.serial_shift,
            ViaRegister::Acr => self.acr,
            ViaRegister::Pcr => self.pcr,
            ViaRegister::Ifr => self.ifr,
            // Enable state is never read back by card drivers
            ViaRegister::Ier => InterruptFlags::SUMMARY.bits(),
        };
        self.update_summary();
        value
    }

    /// Set interrupt cause bits (hardware side)
    pub fn raise(&mut self, flags: InterruptFlags) {
        self.ifr |= flags.bits() & CAUSE_MASK;
        self.update_summary();
    }

    /// Clear interrupt cause bits (hardware side)
    pub fn acknowledge(&mut self, flags: InterruptFlags) {
        self.ifr &= !(flags.bits() & CAUSE_MASK);
        self.update_summary();
    }

    /// Recompute IFR bit 7 from the enabled causes
    pub fn update_summary(&mut self) {
        if flag_summary(self.ifr, self.ier) {
            self.ifr |= InterruptFlags::SUMMARY.bits();
        } else {
            self.ifr &= CAUSE_MASK;
        }
    }

    /// Count both timers down by `clocks` cycles (at most 0x7FFF per call)
    pub fn count_down(&mut self, clocks: u16) -> Underflows {
        debug_assert!(clocks < 0x8000);
        let old_timer1 = self.timer1_counter;
        let old_timer2 = self.timer2_counter;
        self.timer1_counter = self.timer1_counter.wrapping_sub(clocks);
        self.timer2_counter = self.timer2_counter.wrapping_sub(clocks);
        Underflows {
            timer1: old_timer1 & 0x8000 == 0 && self.timer1_counter & 0x8000 != 0,
            timer2: old_timer2 & 0x8000 == 0 && self.timer2_counter & 0x8000 != 0,
        }
    }

    /// Reload timer 1 from its current latch
    pub fn reload_timer1(&mut self) {
        self.timer1_counter = self.timer1_latch;
    }

    /// Whether timer 1 runs continuously (ACR bit 6)
    pub fn timer1_free_running(&self) -> bool {
        self.acr & ACR_TIMER1_FREE_RUN != 0
    }

    /// Whether the timer 1 interrupt is enabled
    pub fn timer1_enabled(&self) -> bool {
        self.ier & InterruptFlags::TIMER1.bits() != 0
    }

    /// IFR bit 7
    pub fn irq_active(&self) -> bool {
        self.ifr & InterruptFlags::SUMMARY.bits() != 0
    }

    /// Interrupt flag register
    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    /// Interrupt enable register
    pub fn ier(&self) -> u8 {
        self.ier
    }

    /// Interrupt flags as bitflags
    pub fn flags(&self) -> InterruptFlags {
        InterruptFlags::from_bits_truncate(self.ifr)
    }

    /// Output register A
    pub fn ora(&self) -> u8 {
        self.ora
    }

    /// Output register B
    pub fn orb(&self) -> u8 {
        self.orb
    }

    /// Data direction register B
    pub fn ddrb(&self) -> u8 {
        self.ddrb
    }

    /// Data direction register A
    pub fn ddra(&self) -> u8 {
        self.ddra
    }

    /// Auxiliary control register
    pub fn acr(&self) -> u8 {
        self.acr
    }

    /// Peripheral control register
    pub fn pcr(&self) -> u8 {
        self.pcr
    }

    /// Timer 1 counter
    pub fn timer1_counter(&self) -> u16 {
        self.timer1_counter
    }

    /// Timer 1 latch
    pub fn timer1_latch(&self) -> u16 {
        self.timer1_latch
    }

    /// Timer 2 counter
    pub fn timer2_counter(&self) -> u16 {
        self.timer2_counter
    }
}

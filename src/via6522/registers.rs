//! 6522 Register Definitions
//!
//! The 16 registers of the peripheral interface adapter and the bit layout
//! shared by the interrupt flag and interrupt enable registers.

use std::fmt;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// 6522 register address (offset from the PIA base)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum ViaRegister {
    /// Output register B - $0
    Orb = 0x00,
    /// Output register A (with handshake) - $1
    Ora = 0x01,
    /// Data direction B - $2
    Ddrb = 0x02,
    /// Data direction A - $3
    Ddra = 0x03,
    /// Timer 1 counter low - $4
    Timer1CounterLo = 0x04,
    /// Timer 1 counter high - $5
    Timer1CounterHi = 0x05,
    /// Timer 1 latch low - $6
    Timer1LatchLo = 0x06,
    /// Timer 1 latch high - $7
    Timer1LatchHi = 0x07,
    /// Timer 2 low - $8
    Timer2Lo = 0x08,
    /// Timer 2 high - $9
    Timer2Hi = 0x09,
    /// Serial shift register - $A
    SerialShift = 0x0A,
    /// Auxiliary control - $B
    Acr = 0x0B,
    /// Peripheral control - $C
    Pcr = 0x0C,
    /// Interrupt flags - $D
    Ifr = 0x0D,
    /// Interrupt enable - $E
    Ier = 0x0E,
    /// Output register A (no handshake) - $F
    OraNoHandshake = 0x0F,
}

impl ViaRegister {
    /// Convert a raw register number to a register, wrapping at 16
    pub fn from_addr(addr: u8) -> Self {
        debug_assert!(addr <= 0x0F, "6522 register index {addr:#04x} out of range");
        // Every 4-bit value has a variant
        Self::from_u8(addr & 0x0F).unwrap_or(ViaRegister::OraNoHandshake)
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ViaRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViaRegister::Orb => "ORB",
            ViaRegister::Ora => "ORA",
            ViaRegister::Ddrb => "DDRB",
            ViaRegister::Ddra => "DDRA",
            ViaRegister::Timer1CounterLo => "T1C-L",
            ViaRegister::Timer1CounterHi => "T1C-H",
            ViaRegister::Timer1LatchLo => "T1L-L",
            ViaRegister::Timer1LatchHi => "T1L-H",
            ViaRegister::Timer2Lo => "T2C-L",
            ViaRegister::Timer2Hi => "T2C-H",
            ViaRegister::SerialShift => "SR",
            ViaRegister::Acr => "ACR",
            ViaRegister::Pcr => "PCR",
            ViaRegister::Ifr => "IFR",
            ViaRegister::Ier => "IER",
            ViaRegister::OraNoHandshake => "ORA(NH)",
        };
        write!(f, "${:X} ({})", self.addr(), name)
    }
}

bitflags! {
    /// Interrupt flag / enable register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptFlags: u8 {
        /// CA2 edge
        const CA2 = 0x01;
        /// CA1 edge; the speech chip's A/!R line on the Mockingboard
        const PERIPHERAL = 0x02;
        /// Shift register complete
        const SHIFT = 0x04;
        /// CB2 edge
        const CB2 = 0x08;
        /// CB1 edge
        const CB1 = 0x10;
        /// Timer 2 underflow
        const TIMER2 = 0x20;
        /// Timer 1 underflow
        const TIMER1 = 0x40;
        /// IFR: any enabled source active. IER write: set (1) or clear (0).
        const SUMMARY = 0x80;
    }
}

/// ACR bit 6: timer 1 continuous (free-running) mode
pub const ACR_TIMER1_FREE_RUN: u8 = 0x40;

/// Cause bits of the flag/enable registers
pub const CAUSE_MASK: u8 = 0x7F;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conversion() {
        assert_eq!(ViaRegister::from_addr(0x00), ViaRegister::Orb);
        assert_eq!(ViaRegister::from_addr(0x05), ViaRegister::Timer1CounterHi);
        assert_eq!(ViaRegister::from_addr(0x0E), ViaRegister::Ier);
        assert_eq!(ViaRegister::from_addr(0x0F), ViaRegister::OraNoHandshake);
        for addr in 0..16u8 {
            assert_eq!(ViaRegister::from_addr(addr).addr(), addr);
        }
    }

    #[test]
    fn test_register_display() {
        assert_eq!(ViaRegister::Ifr.to_string(), "$D (IFR)");
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(InterruptFlags::TIMER1.bits(), 0x40);
        assert_eq!(InterruptFlags::all().bits() & CAUSE_MASK, 0x7F);
    }
}

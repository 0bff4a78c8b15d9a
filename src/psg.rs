//! AY-3-8910 Bus Decoding
//!
//! The card never talks to the PSG data bus directly: port B of each 6522
//! drives the PSG's BDIR/BC1 lines (BC2 is tied high) and !RESET, while port A
//! carries the data byte. This module turns a port B write into the bus
//! function the PSG sees and, on a Phasor, into the set of chips selected.

use std::fmt;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Number of PSG registers
pub const PSG_REGISTER_COUNT: usize = 16;

/// PSG function selected by the BDIR/BC2/BC1 lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PsgFunction {
    /// !RESET held low
    Reset,
    /// BDIR=0 BC2=0 BC1=0
    Nop0,
    /// BDIR=0 BC2=0 BC1=1
    Nop1,
    /// BDIR=0 BC2=1 BC1=0
    Inactive,
    /// BDIR=0 BC2=1 BC1=1: read from PSG (no bus driver modeled)
    Read,
    /// BDIR=1 BC2=0 BC1=0
    Nop4,
    /// BDIR=1 BC2=0 BC1=1
    Nop5,
    /// BDIR=1 BC2=1 BC1=0: write port A into the latched register
    Write,
    /// BDIR=1 BC2=1 BC1=1: latch port A as the register address
    Latch,
}

impl PsgFunction {
    /// Port B bit 0: BC1
    pub const BC1: u8 = 0x01;
    /// Port B bit 1: BDIR
    pub const BDIR: u8 = 0x02;
    /// Port B bit 2: !RESET
    pub const RESET: u8 = 0x04;

    /// Function for a raw combination of the three bus lines
    pub fn from_bus_lines(bdir: bool, bc2: bool, bc1: bool) -> Self {
        match (bdir, bc2, bc1) {
            (false, false, false) => PsgFunction::Nop0,
            (false, false, true) => PsgFunction::Nop1,
            (false, true, false) => PsgFunction::Inactive,
            (false, true, true) => PsgFunction::Read,
            (true, false, false) => PsgFunction::Nop4,
            (true, false, true) => PsgFunction::Nop5,
            (true, true, false) => PsgFunction::Write,
            (true, true, true) => PsgFunction::Latch,
        }
    }

    /// Decode a port B value as wired on the card (BC2 hardwired high)
    pub fn decode(port_b: u8) -> Self {
        if port_b & Self::RESET == 0 {
            return PsgFunction::Reset;
        }
        Self::from_bus_lines(port_b & Self::BDIR != 0, true, port_b & Self::BC1 != 0)
    }

    /// Whether this function changes PSG state
    pub fn mutates(&self) -> bool {
        matches!(self, PsgFunction::Reset | PsgFunction::Write | PsgFunction::Latch)
    }
}

bitflags! {
    /// PSGs behind one 6522 selected by a port B write
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChipSelect: u8 {
        /// First PSG of the pair
        const FIRST = 0x01;
        /// Second PSG of the pair (Phasor only)
        const SECOND = 0x02;
    }
}

impl ChipSelect {
    /// Chip select for a port B value
    ///
    /// Phasor native mode decodes the active-low selects on PB3/PB4; every
    /// other configuration only has the first chip.
    pub fn from_port_b(port_b: u8, phasor_native: bool) -> Self {
        if phasor_native {
            ChipSelect::from_bits_truncate(!(port_b >> 3) & 0x03)
        } else {
            ChipSelect::FIRST
        }
    }

    /// Selected slots (0 = first chip, 1 = second chip)
    pub fn slots(self) -> impl Iterator<Item = usize> {
        [(ChipSelect::FIRST, 0), (ChipSelect::SECOND, 1)]
            .into_iter()
            .filter(move |(select, _)| self.contains(*select))
            .map(|(_, slot)| slot)
    }
}

/// Global PSG index of chip `slot` (0 or 1) behind PIA `device`
pub fn psg_index(device: usize, slot: usize) -> usize {
    device + 2 * slot
}

/// Sound generator core collaborator
pub trait PsgSink {
    /// Commit `value` to register `register` of PSG `chip`
    fn write_register(&mut self, chip: usize, register: u8, value: u8);

    /// Reset PSG `chip`
    fn reset(&mut self, chip: usize);

    /// New PSG master clock for every chip (Phasor clock doubling)
    fn set_clock(&mut self, _clock_hz: u32) {}

    /// Service the generators after `period_cycles` host cycles
    fn update(&mut self, _period_cycles: u32) {}
}

/// AY-3-8910 register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
pub enum PsgRegister {
    /// Channel A tone period (fine) - R0
    ChAFine = 0x00,
    /// Channel A tone period (coarse) - R1
    ChACoarse = 0x01,
    /// Channel B tone period (fine) - R2
    ChBFine = 0x02,
    /// Channel B tone period (coarse) - R3
    ChBCoarse = 0x03,
    /// Channel C tone period (fine) - R4
    ChCFine = 0x04,
    /// Channel C tone period (coarse) - R5
    ChCCoarse = 0x05,
    /// Noise period - R6
    NoisePeriod = 0x06,
    /// Mixer / I/O enable - R7
    Enable = 0x07,
    /// Channel A amplitude - R8
    ChAAmplitude = 0x08,
    /// Channel B amplitude - R9
    ChBAmplitude = 0x09,
    /// Channel C amplitude - R10
    ChCAmplitude = 0x0A,
    /// Envelope period (fine) - R11
    EnvelopeFine = 0x0B,
    /// Envelope period (coarse) - R12
    EnvelopeCoarse = 0x0C,
    /// Envelope shape - R13
    EnvelopeShape = 0x0D,
    /// I/O port A - R14
    PortA = 0x0E,
    /// I/O port B - R15
    PortB = 0x0F,
}

impl PsgRegister {
    /// Convert a latched address to a register; addresses above 15 are not registers
    pub fn from_addr(addr: u8) -> Option<Self> {
        Self::from_u8(addr)
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for PsgRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsgRegister::ChAFine => write!(f, "R0 (Channel A Fine)"),
            PsgRegister::ChACoarse => write!(f, "R1 (Channel A Coarse)"),
            PsgRegister::ChBFine => write!(f, "R2 (Channel B Fine)"),
            PsgRegister::ChBCoarse => write!(f, "R3 (Channel B Coarse)"),
            PsgRegister::ChCFine => write!(f, "R4 (Channel C Fine)"),
            PsgRegister::ChCCoarse => write!(f, "R5 (Channel C Coarse)"),
            PsgRegister::NoisePeriod => write!(f, "R6 (Noise Period)"),
            PsgRegister::Enable => write!(f, "R7 (Enable)"),
            PsgRegister::ChAAmplitude => write!(f, "R8 (Channel A Amplitude)"),
            PsgRegister::ChBAmplitude => write!(f, "R9 (Channel B Amplitude)"),
            PsgRegister::ChCAmplitude => write!(f, "R10 (Channel C Amplitude)"),
            PsgRegister::EnvelopeFine => write!(f, "R11 (Envelope Fine)"),
            PsgRegister::EnvelopeCoarse => write!(f, "R12 (Envelope Coarse)"),
            PsgRegister::EnvelopeShape => write!(f, "R13 (Envelope Shape)"),
            PsgRegister::PortA => write!(f, "R14 (I/O Port A)"),
            PsgRegister::PortB => write!(f, "R15 (I/O Port B)"),
        }
    }
}

/// Register-only PSG sink: keeps the 16 registers of each chip
#[derive(Debug, Clone)]
pub struct PsgRegisterBank {
    /// Register values per chip
    chips: Vec<[u8; PSG_REGISTER_COUNT]>,
    /// Master clock last requested
    clock_hz: u32,
    /// Number of update calls
    updates: u64,
}

impl PsgRegisterBank {
    /// Create a bank of `count` zeroed chips
    pub fn new(count: usize, clock_hz: u32) -> Self {
        PsgRegisterBank {
            chips: vec![[0; PSG_REGISTER_COUNT]; count],
            clock_hz,
            updates: 0,
        }
    }

    /// Read a register of a chip
    pub fn read(&self, chip: usize, register: PsgRegister) -> u8 {
        self.chips[chip][register.addr() as usize]
    }

    /// All registers of a chip
    pub fn dump_registers(&self, chip: usize) -> [u8; PSG_REGISTER_COUNT] {
        self.chips[chip]
    }

    /// Current master clock
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Number of update calls received
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl PsgSink for PsgRegisterBank {
    fn write_register(&mut self, chip: usize, register: u8, value: u8) {
        self.chips[chip][(register & 0x0F) as usize] = value;
    }

    fn reset(&mut self, chip: usize) {
        self.chips[chip] = [0; PSG_REGISTER_COUNT];
    }

    fn set_clock(&mut self, clock_hz: u32) {
        self.clock_hz = clock_hz;
    }

    fn update(&mut self, _period_cycles: u32) {
        self.updates += 1;
    }
}

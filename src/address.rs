//! Card Address Decoding
//!
//! Maps an offset inside a card's $Cn00-$CnFF window to the chips it
//! selects. The classic Mockingboard decodes contiguous windows; the Phasor
//! drives the two 6522 chip selects from independent address lines, so a
//! single access may reach both PIAs (reads are OR-ed) or neither.

use bitflags::bitflags;

/// Base of the first 6522
pub const PIA_A_OFFSET: u8 = 0x00;
/// Base of the SSI263
pub const SPEECH_OFFSET: u8 = 0x40;
/// Base of the second 6522
pub const PIA_B_OFFSET: u8 = 0x80;
/// Registers per 6522
pub const PIA_WINDOW: u8 = 0x10;
/// Registers in the SSI263 window
pub const SPEECH_WINDOW: u8 = 0x05;

/// Offset line driving the Phasor's first 6522 chip select
const PHASOR_CS_A: u8 = 0x10;
/// Offset line driving the Phasor's second 6522 chip select
const PHASOR_CS_B: u8 = 0x80;

/// Address layout of the attached card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Classic Mockingboard windows
    Mockingboard,
    /// Phasor emulating a Mockingboard: bit 7 picks the PIA
    PhasorCompatible,
    /// Phasor native mode: independent chip selects
    PhasorNative,
}

impl Layout {
    /// Layout for a Phasor enable flag and mode bit
    pub fn new(phasor_enabled: bool, phasor_native: bool) -> Self {
        match (phasor_enabled, phasor_native) {
            (false, _) => Layout::Mockingboard,
            (true, false) => Layout::PhasorCompatible,
            (true, true) => Layout::PhasorNative,
        }
    }

    /// Whether this layout belongs to a Phasor
    pub fn is_phasor(&self) -> bool {
        !matches!(self, Layout::Mockingboard)
    }
}

bitflags! {
    /// 6522s of a card selected by one access
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PiaSelect: u8 {
        /// First PIA ("A", even device)
        const A = 0x01;
        /// Second PIA ("B", odd device)
        const B = 0x02;
    }
}

impl PiaSelect {
    /// Device indices selected on card `card`
    pub fn devices(self, card: usize) -> impl Iterator<Item = usize> {
        [(PiaSelect::A, 0), (PiaSelect::B, 1)]
            .into_iter()
            .filter(move |(select, _)| self.contains(*select))
            .map(move |(_, unit)| card * 2 + unit)
    }
}

/// Chips reached by one access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// 6522s selected
    pub pias: PiaSelect,
    /// SSI263 selected
    pub speech: bool,
    /// Register index within the selected chips
    pub reg: u8,
}

impl Decoded {
    /// Nothing on the card answers
    pub fn is_unmapped(&self) -> bool {
        self.pias.is_empty() && !self.speech
    }
}

/// Decode a card window offset; total over every offset
pub fn decode(layout: Layout, offset: u8) -> Decoded {
    let reg = offset & 0x0F;
    let speech = (SPEECH_OFFSET..SPEECH_OFFSET + SPEECH_WINDOW).contains(&offset);
    let pias = match layout {
        Layout::Mockingboard => {
            if (PIA_A_OFFSET..PIA_A_OFFSET + PIA_WINDOW).contains(&offset) {
                PiaSelect::A
            } else if (PIA_B_OFFSET..PIA_B_OFFSET + PIA_WINDOW).contains(&offset) {
                PiaSelect::B
            } else {
                PiaSelect::empty()
            }
        }
        Layout::PhasorCompatible => {
            if offset & PIA_B_OFFSET == 0 {
                PiaSelect::A
            } else {
                PiaSelect::B
            }
        }
        Layout::PhasorNative => {
            let mut select = PiaSelect::empty();
            select.set(PiaSelect::A, offset & PHASOR_CS_A != 0);
            select.set(PiaSelect::B, offset & PHASOR_CS_B != 0);
            select
        }
    };
    // The SSI263 never shares an access with a PIA on the classic card
    let pias = if speech && layout == Layout::Mockingboard {
        PiaSelect::empty()
    } else {
        pias
    };
    Decoded { pias, speech, reg }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mockingboard_windows() {
        let a = decode(Layout::Mockingboard, 0x04);
        assert_eq!(a.pias, PiaSelect::A);
        assert_eq!(a.reg, 0x04);
        assert!(!a.speech);

        let b = decode(Layout::Mockingboard, 0x8E);
        assert_eq!(b.pias, PiaSelect::B);
        assert_eq!(b.reg, 0x0E);

        let speech = decode(Layout::Mockingboard, 0x43);
        assert!(speech.speech);
        assert!(speech.pias.is_empty());
        assert_eq!(speech.reg, 0x03);

        assert!(decode(Layout::Mockingboard, 0x10).is_unmapped());
        assert!(decode(Layout::Mockingboard, 0x45).is_unmapped());
        assert!(decode(Layout::Mockingboard, 0xFF).is_unmapped());
    }

    #[test]
    fn test_phasor_compatible_mirrors() {
        assert_eq!(decode(Layout::PhasorCompatible, 0x24).pias, PiaSelect::A);
        assert_eq!(decode(Layout::PhasorCompatible, 0xF4).pias, PiaSelect::B);
        let shared = decode(Layout::PhasorCompatible, 0x40);
        assert_eq!(shared.pias, PiaSelect::A);
        assert!(shared.speech);
    }

    #[test]
    fn test_phasor_native_chip_selects() {
        assert!(decode(Layout::PhasorNative, 0x00).is_unmapped());
        assert_eq!(decode(Layout::PhasorNative, 0x10).pias, PiaSelect::A);
        assert_eq!(decode(Layout::PhasorNative, 0x80).pias, PiaSelect::B);
        assert_eq!(decode(Layout::PhasorNative, 0x95).pias, PiaSelect::all());
        assert_eq!(decode(Layout::PhasorNative, 0x95).reg, 0x05);
        let speech = decode(Layout::PhasorNative, 0x42);
        assert!(speech.speech);
        assert!(speech.pias.is_empty());
    }

    #[test]
    fn test_decode_is_total() {
        for layout in [Layout::Mockingboard, Layout::PhasorCompatible, Layout::PhasorNative] {
            for offset in 0..=255u8 {
                let decoded = decode(layout, offset);
                assert!(decoded.reg <= 0x0F);
            }
        }
    }

    #[test]
    fn test_device_indices() {
        let devices: Vec<usize> = PiaSelect::all().devices(1).collect();
        assert_eq!(devices, vec![2, 3]);
        assert_eq!(Layout::new(true, true), Layout::PhasorNative);
        assert!(!Layout::new(false, true).is_phasor());
    }
}

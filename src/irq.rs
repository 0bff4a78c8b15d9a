//! Interrupt Aggregation
//!
//! Every 6522 on the card set drives the same host IRQ line. The line is the
//! OR of each PIA's IFR summary bit; the SSI263 on a Phasor bypasses the
//! PIAs and has a source of its own.

use crate::via6522::{Via6522, CAUSE_MASK};

/// Host interrupt sources owned by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqSource {
    /// OR of all 6522 summary bits
    Via,
    /// Phasor speech chip, wired straight to the CPU
    Speech,
}

/// Host CPU interrupt line
pub trait InterruptLine {
    /// Pull the line for `source`
    fn assert_irq(&mut self, source: IrqSource);

    /// Release the line for `source`
    fn deassert_irq(&mut self, source: IrqSource);
}

/// IFR bit 7: set iff an enabled cause is flagged
#[inline]
pub fn flag_summary(flags: u8, enables: u8) -> bool {
    flags & enables & CAUSE_MASK != 0
}

/// Refresh every PIA's summary bit and return the combined host line
pub fn aggregate<'a>(vias: impl IntoIterator<Item = &'a mut Via6522>) -> bool {
    let mut line = false;
    for via in vias {
        via.update_summary();
        line |= via.irq_active();
    }
    line
}

/// Drive the host line from an aggregate; called on every recomputation
pub fn drive(line: bool, host: &mut impl InterruptLine) {
    if line {
        host.assert_irq(IrqSource::Via);
    } else {
        host.deassert_irq(IrqSource::Via);
    }
}

/// Plain record of the two host IRQ sources, for headless hosts and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqLines {
    /// 6522 source asserted
    pub via: bool,
    /// Speech source asserted
    pub speech: bool,
    /// Number of assert/deassert calls received
    pub calls: u64,
}

impl IrqLines {
    /// Whether any source holds the line
    pub fn asserted(&self) -> bool {
        self.via || self.speech
    }

    fn set(&mut self, source: IrqSource, level: bool) {
        self.calls += 1;
        match source {
            IrqSource::Via => self.via = level,
            IrqSource::Speech => self.speech = level,
        }
    }
}

impl InterruptLine for IrqLines {
    fn assert_irq(&mut self, source: IrqSource) {
        self.set(source, true);
    }

    fn deassert_irq(&mut self, source: IrqSource) {
        self.set(source, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::via6522::{InterruptFlags, ViaRegister};

    #[test]
    fn test_flag_summary_all_pairs() {
        for flags in 0..=255u8 {
            for enables in 0..=255u8 {
                assert_eq!(
                    flag_summary(flags, enables),
                    (flags & enables & 0x7F) != 0,
                    "flags={flags:#04x} enables={enables:#04x}"
                );
            }
        }
    }

    #[test]
    fn test_aggregate_ors_all_pias() {
        let mut vias = vec![Via6522::new(); 4];
        assert!(!aggregate(vias.iter_mut()));

        vias[3].write(ViaRegister::Ier, 0xA0);
        vias[3].raise(InterruptFlags::TIMER2);
        assert!(aggregate(vias.iter_mut()));

        vias[3].acknowledge(InterruptFlags::TIMER2);
        vias[1].raise(InterruptFlags::TIMER1);
        assert!(!aggregate(vias.iter_mut()), "timer 1 not enabled on PIA 1");
    }

    #[test]
    fn test_drive_calls_every_time() {
        let mut lines = IrqLines::default();
        drive(true, &mut lines);
        drive(true, &mut lines);
        assert!(lines.via);
        assert_eq!(lines.calls, 2);
        drive(false, &mut lines);
        assert!(!lines.asserted());
    }
}

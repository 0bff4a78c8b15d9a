//! Card Set
//!
//! [`Mockingboard`] owns every chip on the attached cards: four 6522 units
//! (two per card), each with the SSI263 slot and the PSG register shadow that
//! sits behind it, the timer engine, and the three host collaborators. All
//! bus traffic, cycle updates, snapshots and resets go through it.
//!
//! Device numbering: card `c` holds PIA `2c` ("A") and `2c + 1` ("B").
//! The speech chip of a card answers on its B unit.

use log::{debug, trace, warn};

use crate::address::{self, Layout};
use crate::config::CardConfig;
use crate::irq::{self, InterruptLine, IrqSource};
use crate::psg::{psg_index, ChipSelect, PsgFunction, PsgSink, PSG_REGISTER_COUNT};
use crate::speech::{
    votrax, PhonemeDone, PhonemeOutput, SpeechRegister, Ssi263, PCR_SSI263, PCR_VOTRAX,
};
use crate::timer::TimerEngine;
use crate::via6522::{InterruptFlags, Via6522, ViaEvent, ViaRegister};
use crate::{Result, NUM_CARDS, NUM_PIAS, NUM_PSGS};

/// Largest countdown applied to the 6522 timers in one step
///
/// Underflow is detected on bit 15 going high, so a step must stay well
/// below 0x8000.
pub const TIMER_STEP_CYCLES: u32 = 0x4000;

/// One 6522 together with the chips it fronts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PiaUnit {
    /// The 6522 itself
    pub(crate) via: Via6522,
    /// SSI263 register file (only reachable on B units)
    pub(crate) speech: Ssi263,
    /// PSG register latched by the last latch-address cycle
    pub(crate) psg_register: u8,
    /// Shadow of the 16 registers of the first and second PSG
    pub(crate) psg_shadow: [[u8; PSG_REGISTER_COUNT]; 2],
    /// Phasor speech interrupt held on the host line
    pub(crate) speech_irq: bool,
}

impl PiaUnit {
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// The 6522
    pub fn via(&self) -> &Via6522 {
        &self.via
    }

    /// The SSI263
    pub fn speech(&self) -> &Ssi263 {
        &self.speech
    }

    /// Latched PSG register index
    pub fn psg_register(&self) -> u8 {
        self.psg_register
    }

    /// Shadowed registers of the PSG in `slot` (0 or 1)
    pub fn psg_registers(&self, slot: usize) -> &[u8; PSG_REGISTER_COUNT] {
        &self.psg_shadow[slot & 1]
    }

    /// Whether the Phasor speech interrupt is pending
    pub fn speech_irq(&self) -> bool {
        self.speech_irq
    }
}

/// Mockingboard / Phasor card set
///
/// Generic over the host interrupt line `I`, the sound generator core `P` and
/// the phoneme playback output `S`.
#[derive(Debug)]
pub struct Mockingboard<I, P, S> {
    pub(crate) units: [PiaUnit; NUM_PIAS],
    pub(crate) timers: TimerEngine,
    pub(crate) config: CardConfig,
    pub(crate) layout: Layout,
    psg_clock_doubled: bool,
    pub(crate) irq: I,
    pub(crate) psg: P,
    speech: S,
}

impl<I, P, S> Mockingboard<I, P, S>
where
    I: InterruptLine,
    P: PsgSink,
    S: PhonemeOutput,
{
    /// Attach a card set
    ///
    /// Every register starts at zero; a Phasor starts in
    /// Mockingboard-compatible mode.
    pub fn new(config: CardConfig, irq: I, psg: P, speech: S) -> Result<Self> {
        config.validate()?;
        debug!(
            "card: attached {:?} at {} Hz",
            config.kind, config.host_clock_hz
        );
        Ok(Mockingboard {
            units: Default::default(),
            timers: TimerEngine::new(config.fallback_update_period()),
            layout: Layout::new(config.phasor_enabled(), false),
            config,
            psg_clock_doubled: false,
            irq,
            psg,
            speech,
        })
    }

    /// Card reset: zero every chip, release the timer and the IRQ lines
    pub fn reset(&mut self) {
        for unit in self.units.iter_mut() {
            unit.reset();
        }
        self.timers.reset();
        for chip in 0..NUM_PSGS {
            self.psg.reset(chip);
        }
        self.speech.cancel();
        self.layout = Layout::new(self.config.phasor_enabled(), false);
        if self.psg_clock_doubled {
            self.set_psg_clock_doubled(false);
        }
        self.irq.deassert_irq(IrqSource::Speech);
        self.update_irq();
        debug!("card: reset");
    }

    /// Host read of `offset` inside card `card`'s I/O window
    pub fn read(&mut self, card: usize, offset: u8) -> u8 {
        if !self.card_present(card) {
            return 0x00;
        }
        let decoded = address::decode(self.layout, offset);
        let reg = ViaRegister::from_addr(decoded.reg);
        let mut value = 0x00;
        for device in decoded.pias.devices(card) {
            value |= self.read_via(device, reg);
        }
        if decoded.speech {
            value |= self.read_speech(speech_device(card));
        }
        value
    }

    /// Host write of `value` to `offset` inside card `card`'s I/O window
    pub fn write(&mut self, card: usize, offset: u8, value: u8) {
        if !self.card_present(card) {
            return;
        }
        let decoded = address::decode(self.layout, offset);
        if decoded.is_unmapped() {
            trace!("card {card}: write {value:#04x} to unmapped offset {offset:#04x}");
            return;
        }
        let reg = ViaRegister::from_addr(decoded.reg);
        for device in decoded.pias.devices(card) {
            self.write_via(device, reg, value);
        }
        if decoded.speech {
            if let Some(reg) = SpeechRegister::from_addr(decoded.reg) {
                self.write_speech(speech_device(card), reg, value);
            }
        }
    }

    /// Read a 6522 register of `device`
    pub fn read_via(&mut self, device: usize, reg: ViaRegister) -> u8 {
        let Some(unit) = self.units.get_mut(device) else {
            debug_assert!(false, "PIA {device} out of range");
            return 0x00;
        };
        let value = unit.via.read(reg);
        self.update_irq();
        value
    }

    /// Write a 6522 register of `device` and carry out what follows from it
    pub fn write_via(&mut self, device: usize, reg: ViaRegister, value: u8) {
        let Some(unit) = self.units.get_mut(device) else {
            debug_assert!(false, "PIA {device} out of range");
            return;
        };
        match unit.via.write(reg, value) {
            ViaEvent::None => {}
            ViaEvent::PortB(port_b) => self.port_b_write(device, port_b),
            ViaEvent::Timer1Loaded | ViaEvent::EnableSet => {
                self.timers.start(device, &self.units[device].via);
            }
            ViaEvent::Timer2Loaded => self.timers.arm_timer2(device),
            ViaEvent::Timer1Disabled => self.timers.stop(device),
        }
        self.update_irq();
    }

    /// Read the SSI263 behind `device`
    pub fn read_speech(&mut self, device: usize) -> u8 {
        match self.units.get(device) {
            Some(unit) => unit.speech.read(),
            None => {
                debug_assert!(false, "PIA {device} out of range");
                0x00
            }
        }
    }

    /// Write a register of the SSI263 behind `device`
    pub fn write_speech(&mut self, device: usize, reg: SpeechRegister, value: u8) {
        if device >= NUM_PIAS {
            debug_assert!(false, "PIA {device} out of range");
            return;
        }
        let phasor = self.layout.is_phasor();
        let active = self.speech.phoneme_active();
        let effect = self.units[device].speech.write(reg, value, phasor, active);
        trace!("speech {device}: {reg} <- {value:#04x}");

        if effect.clear_irq {
            if phasor {
                self.units[device].speech_irq = false;
                self.drive_speech_line();
            } else {
                self.units[device].via.acknowledge(InterruptFlags::PERIPHERAL);
            }
        }
        if let Some(phoneme) = effect.play {
            self.speech.play_phoneme(device, phoneme);
        }
        self.update_irq();
    }

    /// Phasor soft switch access at slot I/O `offset`
    ///
    /// Bit 0 selects native addressing, bit 2 doubles the PSG clock.
    /// Ignored unless a Phasor is attached.
    pub fn phasor_io(&mut self, offset: u8) {
        if !self.config.phasor_enabled() {
            return;
        }
        let native = offset & 0x01 != 0;
        let doubled = offset & 0x04 != 0;
        let layout = Layout::new(true, native);
        if layout != self.layout {
            debug!("card: Phasor switched to {layout:?}");
            self.layout = layout;
        }
        if doubled != self.psg_clock_doubled {
            self.set_psg_clock_doubled(doubled);
        }
    }

    /// Whether the Phasor PSG clock is doubled
    pub fn psg_clock_doubled(&self) -> bool {
        self.psg_clock_doubled
    }

    pub(crate) fn set_psg_clock_doubled(&mut self, doubled: bool) {
        self.psg_clock_doubled = doubled;
        let clock = self.psg_clock_hz();
        debug!("card: PSG clock now {clock} Hz");
        self.psg.set_clock(clock);
    }

    /// Advance every 6522 timer by `cycles` host cycles
    ///
    /// Called by the host at instruction boundaries. Services the PSGs on
    /// each owner underflow (or on the fallback period), collects finished
    /// phonemes and recomputes the host IRQ line.
    pub fn update_cycles(&mut self, cycles: u32) {
        let fallback = self.timers.fallback_period();
        let mut remaining = cycles;
        while remaining > 0 {
            let step = remaining.min(TIMER_STEP_CYCLES);
            remaining -= step;
            let mut unowned = if self.timers.owner().is_none() { step } else { 0 };
            for device in 0..NUM_PIAS {
                let underflows = self.units[device].via.count_down(step as u16);
                if underflows.timer1 && self.timers.owner() == Some(device) {
                    self.timer1_underflow(device);
                    if self.timers.owner().is_none() {
                        // Cycles since the wrap through zero
                        let since = 0x1_0000 - self.units[device].via.timer1_counter() as u32;
                        unowned = since.min(step);
                    }
                }
                if underflows.timer2 && self.timers.fire_timer2(device) {
                    trace!("timer: PIA {device} timer 2 underflow");
                    self.units[device].via.raise(InterruptFlags::TIMER2);
                }
            }
            for _ in 0..self.timers.advance_fallback(unowned) {
                self.psg.update(fallback);
            }
        }

        while let Some(done) = self.speech.poll_complete() {
            self.finish_phoneme(done);
        }
        self.update_irq();
    }

    /// Recompute every summary bit and drive the host line
    pub fn update_irq(&mut self) {
        let line = irq::aggregate(self.units.iter_mut().map(|unit| &mut unit.via));
        irq::drive(line, &mut self.irq);
    }

    fn card_present(&self, card: usize) -> bool {
        debug_assert!(card < NUM_CARDS, "card {card} out of range");
        card < NUM_CARDS && !(self.layout.is_phasor() && card > 0)
    }

    fn psg_clock_hz(&self) -> u32 {
        if self.psg_clock_doubled {
            self.config.host_clock_hz.saturating_mul(2)
        } else {
            self.config.host_clock_hz
        }
    }

    fn timer1_underflow(&mut self, device: usize) {
        trace!("timer: PIA {device} timer 1 underflow");
        self.units[device].via.raise(InterruptFlags::TIMER1);
        self.psg.update(self.timers.update_period());

        let via = &mut self.units[device].via;
        if via.timer1_free_running() {
            via.reload_timer1();
            self.timers.start(device, via);
        } else {
            self.timers.stop(device);
        }
    }

    fn port_b_write(&mut self, device: usize, port_b: u8) {
        let via = &self.units[device].via;
        if via.ddrb() == 0xFF && via.pcr() == PCR_VOTRAX {
            self.votrax_write(device, port_b);
            return;
        }

        let native = self.layout == Layout::PhasorNative;
        let select = ChipSelect::from_port_b(port_b, native);
        let data = via.ora();
        let function = PsgFunction::decode(port_b);
        if !function.mutates() {
            return;
        }
        match function {
            PsgFunction::Reset => {
                for slot in select.slots() {
                    self.units[device].psg_shadow[slot] = [0; PSG_REGISTER_COUNT];
                    if let Some(chip) = chip_index(device, slot) {
                        self.psg.reset(chip);
                    }
                }
            }
            PsgFunction::Write => {
                let register = self.units[device].psg_register;
                for slot in select.slots() {
                    self.units[device].psg_shadow[slot][register as usize] = data;
                    if let Some(chip) = chip_index(device, slot) {
                        trace!("psg {chip}: R{register} <- {data:#04x}");
                        self.psg.write_register(chip, register, data);
                    }
                }
            }
            PsgFunction::Latch => {
                if data as usize >= PSG_REGISTER_COUNT {
                    if select.contains(ChipSelect::SECOND) {
                        warn!("psg: PIA {device} latch of {data:#04x} ignored");
                    }
                } else {
                    self.units[device].psg_register = data;
                }
            }
            // No bus driver on the data lines
            _ => {}
        }
    }

    fn votrax_write(&mut self, device: usize, code: u8) {
        let phoneme = votrax::translate(code);
        trace!("votrax {device}: {code:#04x} -> SSI263 {phoneme:#04x}");
        self.units[device].via.acknowledge(InterruptFlags::PERIPHERAL);
        self.speech.play_phoneme(device, phoneme);
    }

    fn finish_phoneme(&mut self, done: PhonemeDone) {
        let device = done.device;
        if device >= NUM_PIAS {
            return;
        }
        let phasor = self.layout.is_phasor();
        let unit = &mut self.units[device];
        if unit.via.pcr() == PCR_VOTRAX {
            unit.via.raise(InterruptFlags::PERIPHERAL);
            return;
        }
        let routed = phasor || unit.via.pcr() == PCR_SSI263;
        if unit.speech.finish_phoneme(routed) {
            trace!("speech {device}: phoneme {:#04x} done", done.phoneme);
            if phasor {
                unit.speech_irq = true;
                self.drive_speech_line();
            } else {
                unit.via.raise(InterruptFlags::PERIPHERAL);
            }
        }
    }

    pub(crate) fn drive_speech_line(&mut self) {
        if self.units.iter().any(|unit| unit.speech_irq) {
            self.irq.assert_irq(IrqSource::Speech);
        } else {
            self.irq.deassert_irq(IrqSource::Speech);
        }
    }

    /// Unit state of `device`
    pub fn unit(&self, device: usize) -> &PiaUnit {
        &self.units[device]
    }

    /// Timer engine
    pub fn timers(&self) -> &TimerEngine {
        &self.timers
    }

    /// PIA owning the update timer
    pub fn timer_owner(&self) -> Option<usize> {
        self.timers.owner()
    }

    /// Cycles between PSG updates
    pub fn update_period(&self) -> u32 {
        self.timers.update_period()
    }

    /// Current address layout
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Attach-time configuration
    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Host interrupt line
    pub fn irq(&self) -> &I {
        &self.irq
    }

    /// Sound generator core
    pub fn psg(&self) -> &P {
        &self.psg
    }

    /// Phoneme output
    pub fn speech(&self) -> &S {
        &self.speech
    }

    /// Phoneme output, mutably
    pub fn speech_mut(&mut self) -> &mut S {
        &mut self.speech
    }
}

/// PIA that carries the speech chip of `card`
pub fn speech_device(card: usize) -> usize {
    card * 2 + 1
}

/// Global PSG index for `slot` of `device`, if that chip exists
pub(crate) fn chip_index(device: usize, slot: usize) -> Option<usize> {
    let chip = psg_index(device, slot);
    (chip < NUM_PSGS).then_some(chip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::IrqLines;
    use crate::psg::{PsgRegister, PsgRegisterBank};
    use crate::speech::ImmediateSpeech;

    type TestCard = Mockingboard<IrqLines, PsgRegisterBank, ImmediateSpeech>;

    fn new_card(config: CardConfig) -> TestCard {
        Mockingboard::new(
            config,
            IrqLines::default(),
            PsgRegisterBank::new(NUM_PSGS, config.host_clock_hz),
            ImmediateSpeech::new(),
        )
        .unwrap()
    }

    /// Program PIA A of card 0 for PSG access and write one register
    fn psg_write(card: &mut TestCard, base: u8, register: u8, value: u8) {
        card.write(0, base + 0x03, 0xFF);
        card.write(0, base + 0x02, 0x07);
        card.write(0, base + 0x01, register);
        card.write(0, base, 0x07);
        card.write(0, base, 0x04);
        card.write(0, base + 0x01, value);
        card.write(0, base, 0x06);
        card.write(0, base, 0x04);
    }

    #[test]
    fn test_psg_latch_and_write() {
        let mut card = new_card(CardConfig::mockingboard());
        psg_write(&mut card, 0x00, 0x08, 0x0F);
        assert_eq!(card.psg().read(0, PsgRegister::ChAAmplitude), 0x0F);
        assert_eq!(card.unit(0).psg_register(), 0x08);
        assert_eq!(card.unit(0).psg_registers(0)[8], 0x0F);

        psg_write(&mut card, 0x80, 0x07, 0x38);
        assert_eq!(card.psg().read(1, PsgRegister::Enable), 0x38);
    }

    #[test]
    fn test_latch_above_fifteen_is_ignored() {
        let mut card = new_card(CardConfig::mockingboard());
        psg_write(&mut card, 0x00, 0x03, 0x01);
        card.write(0, 0x01, 0x10);
        card.write(0, 0x00, 0x07);
        assert_eq!(card.unit(0).psg_register(), 0x03);
    }

    #[test]
    fn test_psg_reset_clears_shadow() {
        let mut card = new_card(CardConfig::mockingboard());
        psg_write(&mut card, 0x00, 0x00, 0x55);
        card.write(0, 0x00, 0x00);
        assert_eq!(card.psg().read(0, PsgRegister::ChAFine), 0x00);
        assert_eq!(card.unit(0).psg_registers(0)[0], 0x00);
        assert_eq!(card.unit(0).psg_register(), 0x00);
    }

    #[test]
    fn test_unmapped_offsets() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x20, 0xFF);
        assert_eq!(card.read(0, 0x20), 0x00);
        assert_eq!(card.read(1, 0xC0), 0x00);
    }

    #[test]
    fn test_timer1_arm_and_underflow() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x0B, 0x40);
        card.write(0, 0x0E, 0xC0);
        card.write(0, 0x04, 0x00);
        card.write(0, 0x05, 0x10);
        assert_eq!(card.timer_owner(), Some(0));
        assert_eq!(card.update_period(), 0x1000);
        assert!(!card.irq().via);

        card.update_cycles(0x1001);
        assert!(card.irq().via);
        assert_eq!(card.psg().updates(), 1);
        assert_eq!(card.unit(0).via().timer1_counter(), 0x1000);
        assert_eq!(card.timer_owner(), Some(0));

        card.read(0, 0x04);
        assert!(!card.irq().via);
    }

    #[test]
    fn test_b_unit_never_owns_timer() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x8E, 0xC0);
        card.write(0, 0x84, 0x00);
        card.write(0, 0x85, 0x10);
        assert_eq!(card.timer_owner(), None);
        assert_eq!(card.update_period(), 17_008);
    }

    #[test]
    fn test_one_shot_timer_stops() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x0E, 0xC0);
        card.write(0, 0x04, 0x20);
        card.write(0, 0x05, 0x00);
        card.update_cycles(0x21);
        assert_eq!(card.timer_owner(), None);
        assert!(card.unit(0).via().flags().contains(InterruptFlags::TIMER1));
    }

    #[test]
    fn test_timer2_fires_once() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x0E, 0xA0);
        card.write(0, 0x08, 0x10);
        card.write(0, 0x09, 0x00);
        card.update_cycles(0x11);
        assert!(card.irq().via);
        card.write(0, 0x0D, 0x20);
        assert!(!card.irq().via);
        card.update_cycles(0x10000);
        assert!(!card.irq().via);
    }

    #[test]
    fn test_fallback_updates_without_owner() {
        let mut card = new_card(CardConfig::mockingboard());
        card.update_cycles(17_008 * 3);
        assert_eq!(card.psg().updates(), 3);
    }

    #[test]
    fn test_fallback_counts_only_unowned_cycles() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x0E, 0xC0);
        card.write(0, 0x04, 0x00);
        card.write(0, 0x05, 0x01);
        // One-shot owner underflows 0x100 cycles in and releases the slot
        card.update_cycles(17_008);
        assert_eq!(card.timer_owner(), None);
        assert_eq!(card.psg().updates(), 1);

        card.update_cycles(0x100);
        assert_eq!(card.psg().updates(), 2);
    }

    #[test]
    fn test_speech_completion_on_mockingboard() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x8E, 0x82);
        card.write(0, 0x8C, PCR_SSI263);
        card.write(0, 0x40, 0x45);
        assert_eq!(card.speech().played(), &[0x05]);
        card.update_cycles(1);
        assert!(card.irq().via);
        assert_eq!(card.read(0, 0x40), 0x80);

        card.write(0, 0x40, 0x06);
        assert!(!card.irq().via);
        assert_eq!(card.read(0, 0x41), 0x00);
    }

    #[test]
    fn test_speech_pin_rises_without_ca1_interrupt() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x8E, 0x82);
        card.write(0, 0x40, 0x05);
        card.update_cycles(1);
        assert_eq!(card.read(0, 0x40), 0x80);
        assert_eq!(card.unit(1).via().ifr() & 0x02, 0x00);
        assert!(!card.irq().via);
    }

    #[test]
    fn test_speech_completion_on_phasor() {
        let mut card = new_card(CardConfig::phasor());
        card.write(0, 0x40, 0x05);
        card.update_cycles(1);
        assert!(card.irq().speech);
        assert!(card.unit(1).speech_irq());
        card.write(0, 0x40, 0x06);
        assert!(!card.irq().speech);
    }

    #[test]
    fn test_phasor_native_selects_both_psgs() {
        let mut card = new_card(CardConfig::phasor());
        card.phasor_io(0x01);
        assert_eq!(card.layout(), Layout::PhasorNative);
        // Both chip selects low: PB3/PB4 clear
        card.write(0, 0x13, 0xFF);
        card.write(0, 0x12, 0xFF);
        card.write(0, 0x11, 0x09);
        card.write(0, 0x10, 0x07);
        card.write(0, 0x11, 0x0C);
        card.write(0, 0x10, 0x06);
        assert_eq!(card.psg().read(0, PsgRegister::ChBAmplitude), 0x0C);
        assert_eq!(card.psg().read(2, PsgRegister::ChBAmplitude), 0x0C);

        // PB4 high deselects the second chip
        card.write(0, 0x11, 0x0A);
        card.write(0, 0x10, 0x16);
        assert_eq!(card.psg().read(0, PsgRegister::ChBAmplitude), 0x0A);
        assert_eq!(card.psg().read(2, PsgRegister::ChBAmplitude), 0x0C);
    }

    #[test]
    fn test_phasor_clock_switch() {
        let mut card = new_card(CardConfig::phasor());
        card.phasor_io(0x04);
        assert_eq!(card.psg().clock_hz(), 2 * 1_020_484);
        assert_eq!(card.layout(), Layout::PhasorCompatible);
        card.reset();
        assert_eq!(card.psg().clock_hz(), 1_020_484);

        let mut plain = new_card(CardConfig::mockingboard());
        plain.phasor_io(0x05);
        assert_eq!(plain.layout(), Layout::Mockingboard);
    }

    #[test]
    fn test_reset_releases_everything() {
        let mut card = new_card(CardConfig::mockingboard());
        card.write(0, 0x0E, 0xC0);
        card.write(0, 0x05, 0x01);
        card.update_cycles(0x200);
        assert!(card.irq().via);
        card.reset();
        assert!(!card.irq().asserted());
        assert_eq!(card.timer_owner(), None);
        assert_eq!(card.unit(0), &PiaUnit::default());
    }
}

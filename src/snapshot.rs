//! Card Snapshots
//!
//! Bit-exact save and restore of one card (two 6522 units). The byte image
//! is:
//!
//! ```text
//! "MB" version layout | unit A (57 bytes) | unit B (57 bytes)
//!
//! layout: bits 0-1 address layout, bit 7 Phasor PSG clock doubled
//!
//! unit: ORB ORA DDRB DDRA T1C(lo,hi) T1L(lo,hi) T2C(lo,hi) T2L(lo,hi)
//!       SR ACR PCR IFR IER                                      17 bytes
//!       DURPHON INFLECT RATEINF CTTRAMP FILFREQ CURRENT_MODE     6 bytes
//!       PSG primary R0-R15, PSG secondary R0-R15                32 bytes
//!       latched PSG register, flags                              2 bytes
//! ```
//!
//! The persisted IFR summary bit is never trusted: restore masks it and
//! recomputes every line.

use bitflags::bitflags;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::address::Layout;
use crate::card::{chip_index, Mockingboard};
use crate::irq::InterruptLine;
use crate::psg::{PsgSink, PSG_REGISTER_COUNT};
use crate::speech::{PhonemeOutput, Ssi263};
use crate::timer::TimerState;
use crate::via6522::{InterruptFlags, Via6522, CAUSE_MASK};
use crate::{MockingboardError, Result, NUM_CARDS};

/// Snapshot magic
pub const SNAPSHOT_MAGIC: [u8; 2] = *b"MB";
/// Snapshot format version
pub const SNAPSHOT_VERSION: u8 = 1;
/// Bytes per unit image
pub const UNIT_IMAGE_LEN: usize = 57;
/// Bytes per card image
pub const CARD_IMAGE_LEN: usize = 4 + 2 * UNIT_IMAGE_LEN;
/// Layout byte bit for the doubled Phasor PSG clock
const CLOCK_DOUBLED: u8 = 0x80;

bitflags! {
    /// Per-unit state that does not live in a register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UnitFlags: u8 {
        /// Timer 1 interrupt pending
        const TIMER1_PENDING = 0x01;
        /// Timer 2 interrupt pending
        const TIMER2_PENDING = 0x02;
        /// Speech interrupt pending
        const SPEECH_PENDING = 0x04;
        /// Unit owns the update timer
        const TIMER1_OWNER = 0x08;
        /// One-shot timer 2 armed
        const TIMER2_ARMED = 0x10;
    }
}

/// One 6522 unit with its speech chip and PSG shadow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// 6522 registers
    pub via: Via6522,
    /// SSI263 registers
    pub speech: Ssi263,
    /// Registers of the first and second PSG
    pub psg: [[u8; PSG_REGISTER_COUNT]; 2],
    /// Latched PSG register
    pub psg_register: u8,
    /// [`UnitFlags`] bits
    pub flags: u8,
}

impl UnitSnapshot {
    /// Flag byte as bitflags
    pub fn flags(&self) -> UnitFlags {
        UnitFlags::from_bits_truncate(self.flags)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let via = &self.via;
        out.extend_from_slice(&[via.orb, via.ora, via.ddrb, via.ddra]);
        for word in [
            via.timer1_counter,
            via.timer1_latch,
            via.timer2_counter,
            via.timer2_latch,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&[via.serial_shift, via.acr, via.pcr, via.ifr, via.ier]);

        let speech = &self.speech;
        out.extend_from_slice(&[
            speech.duration_phoneme,
            speech.inflection,
            speech.rate_inflection,
            speech.control_articulation_amplitude,
            speech.filter_frequency,
            speech.current_mode,
        ]);

        out.extend_from_slice(&self.psg[0]);
        out.extend_from_slice(&self.psg[1]);
        out.push(self.psg_register);
        out.push(self.flags);
    }

    fn decode(image: &[u8]) -> Self {
        debug_assert_eq!(image.len(), UNIT_IMAGE_LEN);
        let word = |at: usize| u16::from_le_bytes([image[at], image[at + 1]]);
        let via = Via6522 {
            orb: image[0],
            ora: image[1],
            ddrb: image[2],
            ddra: image[3],
            timer1_counter: word(4),
            timer1_latch: word(6),
            timer2_counter: word(8),
            timer2_latch: word(10),
            serial_shift: image[12],
            acr: image[13],
            pcr: image[14],
            ifr: image[15],
            ier: image[16],
        };
        let speech = Ssi263 {
            duration_phoneme: image[17],
            inflection: image[18],
            rate_inflection: image[19],
            control_articulation_amplitude: image[20],
            filter_frequency: image[21],
            current_mode: image[22],
        };
        let mut psg = [[0; PSG_REGISTER_COUNT]; 2];
        psg[0].copy_from_slice(&image[23..39]);
        psg[1].copy_from_slice(&image[39..55]);
        UnitSnapshot {
            via,
            speech,
            psg,
            psg_register: image[55],
            flags: image[56],
        }
    }
}

/// Snapshot of one card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnapshot {
    /// Address layout at save time (0 Mockingboard, 1 Phasor compatible, 2 Phasor native)
    pub layout: u8,
    /// Phasor PSG clock doubled at save time
    #[serde(default)]
    pub psg_clock_doubled: bool,
    /// Unit A then unit B
    pub units: [UnitSnapshot; 2],
}

impl CardSnapshot {
    /// Serialize to the card byte image
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CARD_IMAGE_LEN);
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.push(SNAPSHOT_VERSION);
        let clock = if self.psg_clock_doubled { CLOCK_DOUBLED } else { 0 };
        out.push(self.layout | clock);
        for unit in &self.units {
            unit.encode(&mut out);
        }
        out
    }

    /// Parse a card byte image
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != CARD_IMAGE_LEN {
            return Err(MockingboardError::SnapshotError(format!(
                "expected {} bytes, got {}",
                CARD_IMAGE_LEN,
                data.len()
            )));
        }
        if data[0..2] != SNAPSHOT_MAGIC {
            return Err(MockingboardError::SnapshotError(
                "bad snapshot magic".to_string(),
            ));
        }
        if data[2] != SNAPSHOT_VERSION {
            return Err(MockingboardError::SnapshotError(format!(
                "unsupported snapshot version {}",
                data[2]
            )));
        }
        let layout = data[3] & !CLOCK_DOUBLED;
        let psg_clock_doubled = data[3] & CLOCK_DOUBLED != 0;
        if psg_clock_doubled && !layout_from_byte(layout)?.is_phasor() {
            return Err(MockingboardError::SnapshotError(
                "doubled PSG clock on a Mockingboard layout".to_string(),
            ));
        }
        let body = &data[4..];
        Ok(CardSnapshot {
            layout,
            psg_clock_doubled,
            units: [
                UnitSnapshot::decode(&body[..UNIT_IMAGE_LEN]),
                UnitSnapshot::decode(&body[UNIT_IMAGE_LEN..]),
            ],
        })
    }
}

fn layout_to_byte(layout: Layout) -> u8 {
    match layout {
        Layout::Mockingboard => 0,
        Layout::PhasorCompatible => 1,
        Layout::PhasorNative => 2,
    }
}

fn layout_from_byte(byte: u8) -> Result<Layout> {
    match byte {
        0 => Ok(Layout::Mockingboard),
        1 => Ok(Layout::PhasorCompatible),
        2 => Ok(Layout::PhasorNative),
        other => Err(MockingboardError::SnapshotError(format!(
            "unknown layout {other}"
        ))),
    }
}

impl<I, P, S> Mockingboard<I, P, S>
where
    I: InterruptLine,
    P: PsgSink,
    S: PhonemeOutput,
{
    /// Capture card `card`
    pub fn snapshot(&self, card: usize) -> Result<CardSnapshot> {
        self.check_card(card)?;
        let phasor = self.layout.is_phasor();
        let mut snapshot = CardSnapshot {
            layout: layout_to_byte(self.layout),
            psg_clock_doubled: self.psg_clock_doubled(),
            units: Default::default(),
        };
        for (slot, image) in snapshot.units.iter_mut().enumerate() {
            let device = card * 2 + slot;
            let unit = &self.units[device];
            let ifr = InterruptFlags::from_bits_truncate(unit.via.ifr);

            let mut flags = UnitFlags::empty();
            flags.set(UnitFlags::TIMER1_PENDING, ifr.contains(InterruptFlags::TIMER1));
            flags.set(UnitFlags::TIMER2_PENDING, ifr.contains(InterruptFlags::TIMER2));
            flags.set(
                UnitFlags::SPEECH_PENDING,
                if phasor {
                    unit.speech_irq
                } else {
                    ifr.contains(InterruptFlags::PERIPHERAL)
                },
            );
            flags.set(
                UnitFlags::TIMER1_OWNER,
                self.timers.state(device) == TimerState::Armed,
            );
            flags.set(UnitFlags::TIMER2_ARMED, self.timers.timer2_armed(device));

            *image = UnitSnapshot {
                via: unit.via.clone(),
                speech: unit.speech.clone(),
                psg: unit.psg_shadow,
                psg_register: unit.psg_register,
                flags: flags.bits(),
            };
        }
        Ok(snapshot)
    }

    /// Put card `card` back into the state `snapshot` describes
    ///
    /// PSG registers are replayed into the sound generator core and the IRQ
    /// lines are recomputed from the restored flags.
    pub fn restore(&mut self, card: usize, snapshot: &CardSnapshot) -> Result<()> {
        self.check_card(card)?;
        let layout = layout_from_byte(snapshot.layout)?;
        if layout.is_phasor() != self.config.phasor_enabled() {
            return Err(MockingboardError::SnapshotError(format!(
                "snapshot layout {layout:?} does not match attached {:?}",
                self.config.kind
            )));
        }
        self.layout = layout;
        self.set_psg_clock_doubled(layout.is_phasor() && snapshot.psg_clock_doubled);

        let mut owner = self.timers.owner().filter(|device| device / 2 != card);
        for (slot, image) in snapshot.units.iter().enumerate() {
            let device = card * 2 + slot;
            let flags = image.flags();
            let unit = &mut self.units[device];

            unit.via = image.via.clone();
            unit.via.ifr &= CAUSE_MASK;
            let mut pending = InterruptFlags::empty();
            pending.set(InterruptFlags::TIMER1, flags.contains(UnitFlags::TIMER1_PENDING));
            pending.set(InterruptFlags::TIMER2, flags.contains(UnitFlags::TIMER2_PENDING));
            if layout.is_phasor() {
                unit.speech_irq = flags.contains(UnitFlags::SPEECH_PENDING);
            } else {
                unit.speech_irq = false;
                pending.set(
                    InterruptFlags::PERIPHERAL,
                    flags.contains(UnitFlags::SPEECH_PENDING),
                );
            }
            unit.via.raise(pending);

            unit.speech = image.speech.clone();
            unit.psg_register = image.psg_register & 0x0F;
            unit.psg_shadow = image.psg;

            for (psg_slot, registers) in image.psg.iter().enumerate() {
                if let Some(chip) = chip_index(device, psg_slot) {
                    for (register, value) in registers.iter().enumerate() {
                        self.psg.write_register(chip, register as u8, *value);
                    }
                }
            }

            if flags.contains(UnitFlags::TIMER1_OWNER) {
                owner = Some(device);
            }
            self.timers
                .restore_timer2(device, flags.contains(UnitFlags::TIMER2_ARMED));
        }
        let period = owner.map_or(0, |device| self.units[device].via.timer1_latch);
        self.timers.restore_owner(owner, period);

        self.drive_speech_line();
        self.update_irq();
        debug!("snapshot: restored card {card} ({layout:?}, timer owner {owner:?})");
        Ok(())
    }

    fn check_card(&self, card: usize) -> Result<()> {
        if card >= NUM_CARDS {
            return Err(MockingboardError::SnapshotError(format!(
                "card {card} out of range"
            )));
        }
        if self.config.phasor_enabled() && card > 0 {
            return Err(MockingboardError::SnapshotError(format!(
                "card {card} is not mapped on a Phasor"
            )));
        }
        Ok(())
    }
}

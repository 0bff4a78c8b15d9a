//! Headless Mockingboard demo
//!
//! Runs a driver-style detection, starts a tune timer, speaks a Votrax
//! phrase and prints the resulting card snapshot as JSON.
//!
//! Usage: `mockingboard [--phasor] [--frames N]`

use std::env;

use anyhow::{bail, Context, Result};
use log::info;

use mockingboard::{
    CardConfig, ImmediateSpeech, IrqLines, Mockingboard, PsgRegister, PsgRegisterBank, NUM_PSGS,
};

type DemoCard = Mockingboard<IrqLines, PsgRegisterBank, ImmediateSpeech>;

/// Cycles per NTSC video frame
const CYCLES_PER_FRAME: u32 = 17_030;
/// Timer 1 latch for a 60 Hz tune interrupt
const TUNE_LATCH: u16 = 0x4272;

/// "HELLO" in SC-01 codes, terminated by a pause
const VOTRAX_HELLO: [u8; 5] = [0x1B, 0x02, 0x18, 0x26, 0x03];

struct Options {
    phasor: bool,
    frames: u32,
}

fn parse_args() -> Result<Options> {
    let mut options = Options {
        phasor: false,
        frames: 10,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--phasor" => options.phasor = true,
            "--frames" => {
                let value = args.next().context("--frames needs a value")?;
                options.frames = value
                    .parse()
                    .with_context(|| format!("invalid frame count '{value}'"))?;
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(options)
}

/// Write one PSG register through PIA A of card 0
fn psg_write(card: &mut DemoCard, register: u8, value: u8) {
    card.write(0, 0x01, register);
    card.write(0, 0x00, 0x07); // latch
    card.write(0, 0x00, 0x04); // inactive
    card.write(0, 0x01, value);
    card.write(0, 0x00, 0x06); // write
    card.write(0, 0x00, 0x04);
}

/// Detection as drivers do it: timer 1 must be counting down
fn detect(card: &mut DemoCard) -> bool {
    let first = card.read(0, 0x04);
    card.update_cycles(8);
    let second = card.read(0, 0x04);
    first.wrapping_sub(second) == 8
}

fn init_tune(card: &mut DemoCard) {
    card.write(0, 0x03, 0xFF);
    card.write(0, 0x02, 0x07);
    card.write(0, 0x00, 0x00); // PSG reset
    card.write(0, 0x00, 0x04);

    psg_write(card, PsgRegister::ChAFine.addr(), 0xFE);
    psg_write(card, PsgRegister::ChACoarse.addr(), 0x00);
    psg_write(card, PsgRegister::Enable.addr(), 0x3E);
    psg_write(card, PsgRegister::ChAAmplitude.addr(), 0x0F);

    card.write(0, 0x0B, 0x40); // timer 1 free-running
    card.write(0, 0x04, TUNE_LATCH as u8);
    card.write(0, 0x05, (TUNE_LATCH >> 8) as u8);
    card.write(0, 0x0E, 0xC0);
}

fn run_frames(card: &mut DemoCard, frames: u32) -> u32 {
    let mut interrupts = 0;
    for _ in 0..frames {
        card.update_cycles(CYCLES_PER_FRAME);
        if card.irq().asserted() {
            interrupts += 1;
            card.read(0, 0x04); // acknowledge timer 1
        }
    }
    interrupts
}

fn speak(card: &mut DemoCard) {
    card.write(0, 0x82, 0xFF);
    card.write(0, 0x8C, 0xB0);
    card.write(0, 0x8E, 0x82);
    for code in VOTRAX_HELLO {
        card.write(0, 0x80, code);
        card.update_cycles(1);
        if card.irq().asserted() {
            card.write(0, 0x8D, 0x02);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let options = parse_args()?;

    let config = if options.phasor {
        CardConfig::phasor()
    } else {
        CardConfig::mockingboard()
    };
    let mut card = Mockingboard::new(
        config,
        IrqLines::default(),
        PsgRegisterBank::new(NUM_PSGS, config.host_clock_hz),
        ImmediateSpeech::new(),
    )?;

    init_tune(&mut card);
    if !detect(&mut card) {
        bail!("card not detected: timer 1 is not counting");
    }
    info!("card detected in slot 4 ({:?})", config.kind);

    let interrupts = run_frames(&mut card, options.frames);
    info!(
        "{} frames, {} timer interrupts, {} PSG updates",
        options.frames,
        interrupts,
        card.psg().updates()
    );

    speak(&mut card);
    info!("spoke {:02x?}", card.speech().played());

    let snapshot = card.snapshot(0)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

//! 6522 Timer Engine
//!
//! Only one PIA at a time drives the PSG update rate: the "A" PIA of a pair
//! that last armed timer 1 with its interrupt enabled. When nobody owns the
//! slot, a fixed 60 Hz housekeeping period keeps the generators serviced.

use log::debug;

use crate::via6522::Via6522;

/// Per-PIA timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    /// Not driving the update rate
    #[default]
    Idle,
    /// Owns the update slot
    Armed,
}

/// Timer ownership and PSG update pacing
#[derive(Debug, Clone)]
pub struct TimerEngine {
    /// PIA that owns the update slot
    owner: Option<usize>,
    /// Owner's latch at the last (re)arm
    period: u16,
    /// Update period when no PIA owns the slot
    fallback_period: u32,
    /// Cycles accumulated toward the next fallback update
    elapsed: u32,
    /// Per-PIA one-shot timer 2 armed flags
    timer2_armed: [bool; crate::NUM_PIAS],
}

impl TimerEngine {
    /// Create an idle engine
    pub fn new(fallback_period: u32) -> Self {
        TimerEngine {
            owner: None,
            period: 0,
            fallback_period: fallback_period.max(1),
            elapsed: 0,
            timer2_armed: [false; crate::NUM_PIAS],
        }
    }

    /// Return every timer to idle
    pub fn reset(&mut self) {
        self.owner = None;
        self.period = 0;
        self.elapsed = 0;
        self.timer2_armed = [false; crate::NUM_PIAS];
    }

    /// Try to arm timer 1 of `device`; returns whether it now owns the slot
    ///
    /// Only an even ("A") PIA with the timer 1 interrupt enabled can arm.
    /// The period is always the latch as it is right now.
    pub fn start(&mut self, device: usize, via: &Via6522) -> bool {
        if device & 1 != 0 || !via.timer1_enabled() {
            return false;
        }
        if self.owner != Some(device) {
            debug!("timer: PIA {device} owns the update slot, period {:#06x}", via.timer1_latch());
        }
        self.owner = Some(device);
        self.period = via.timer1_latch();
        true
    }

    /// Disarm timer 1 of `device` if it owns the slot
    pub fn stop(&mut self, device: usize) {
        if self.owner == Some(device) {
            debug!("timer: PIA {device} released the update slot");
            self.owner = None;
            self.elapsed = 0;
        }
    }

    /// State of `device`'s timer 1
    pub fn state(&self, device: usize) -> TimerState {
        if self.owner == Some(device) {
            TimerState::Armed
        } else {
            TimerState::Idle
        }
    }

    /// PIA holding the update slot
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    /// Cycles between PSG updates under the current ownership
    pub fn update_period(&self) -> u32 {
        match self.owner {
            Some(_) => self.period as u32,
            None => self.fallback_period,
        }
    }

    /// Fallback period in cycles
    pub fn fallback_period(&self) -> u32 {
        self.fallback_period
    }

    /// Count housekeeping cycles while no PIA owns the slot
    ///
    /// Returns how many fallback periods completed.
    pub fn advance_fallback(&mut self, cycles: u32) -> u32 {
        if self.owner.is_some() {
            return 0;
        }
        let total = self.elapsed as u64 + cycles as u64;
        let periods = total / self.fallback_period as u64;
        self.elapsed = (total % self.fallback_period as u64) as u32;
        periods as u32
    }

    /// Put ownership back as a snapshot recorded it
    pub(crate) fn restore_owner(&mut self, owner: Option<usize>, period: u16) {
        self.owner = owner;
        self.period = period;
        self.elapsed = 0;
    }

    /// Set the timer 2 arm of `device` as a snapshot recorded it
    pub(crate) fn restore_timer2(&mut self, device: usize, armed: bool) {
        self.timer2_armed[device] = armed;
    }

    /// Arm the one-shot timer 2 of `device`
    pub fn arm_timer2(&mut self, device: usize) {
        self.timer2_armed[device] = true;
    }

    /// Consume the timer 2 arm; returns whether it was armed
    pub fn fire_timer2(&mut self, device: usize) -> bool {
        std::mem::take(&mut self.timer2_armed[device])
    }

    /// Whether `device`'s timer 2 is armed
    pub fn timer2_armed(&self, device: usize) -> bool {
        self.timer2_armed[device]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::via6522::ViaRegister;

    fn enabled_via(latch: u16) -> Via6522 {
        let mut via = Via6522::new();
        via.write(ViaRegister::Ier, 0xC0);
        via.write(ViaRegister::Timer1LatchLo, latch as u8);
        via.write(ViaRegister::Timer1CounterHi, (latch >> 8) as u8);
        via
    }

    #[test]
    fn test_only_a_pia_with_enable_can_arm() {
        let mut engine = TimerEngine::new(17_008);
        let via = enabled_via(0x4000);
        assert!(!engine.start(1, &via));
        assert_eq!(engine.owner(), None);

        let disabled = Via6522::new();
        assert!(!engine.start(0, &disabled));

        assert!(engine.start(2, &via));
        assert_eq!(engine.owner(), Some(2));
        assert_eq!(engine.state(2), TimerState::Armed);
        assert_eq!(engine.update_period(), 0x4000);
    }

    #[test]
    fn test_ownership_is_single() {
        let mut engine = TimerEngine::new(17_008);
        engine.start(0, &enabled_via(0x1000));
        engine.start(2, &enabled_via(0x2000));
        assert_eq!(engine.state(0), TimerState::Idle);
        assert_eq!(engine.owner(), Some(2));

        engine.stop(0);
        assert_eq!(engine.owner(), Some(2));
        engine.stop(2);
        assert_eq!(engine.owner(), None);
        assert_eq!(engine.update_period(), 17_008);
    }

    #[test]
    fn test_rearm_uses_current_latch() {
        let mut engine = TimerEngine::new(17_008);
        let mut via = enabled_via(0x1000);
        engine.start(0, &via);
        via.write(ViaRegister::Timer1LatchLo, 0x00);
        via.write(ViaRegister::Timer1LatchHi, 0x30);
        engine.start(0, &via);
        assert_eq!(engine.update_period(), 0x3000);
    }

    #[test]
    fn test_fallback_accumulates() {
        let mut engine = TimerEngine::new(100);
        assert_eq!(engine.advance_fallback(60), 0);
        assert_eq!(engine.advance_fallback(60), 1);
        assert_eq!(engine.advance_fallback(250), 2);

        engine.start(0, &enabled_via(0x10));
        assert_eq!(engine.advance_fallback(1_000), 0);
    }

    #[test]
    fn test_timer2_one_shot() {
        let mut engine = TimerEngine::new(100);
        engine.arm_timer2(3);
        assert!(engine.timer2_armed(3));
        assert!(engine.fire_timer2(3));
        assert!(!engine.fire_timer2(3));
    }
}

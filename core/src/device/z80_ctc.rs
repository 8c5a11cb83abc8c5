//! Z80 CTC (Counter/Timer Circuit) — four independent 8-bit down-counters,
//! each a daisy-chain node. Channel 0 is highest priority.
//!
//! Supports the programming sequence real software uses: a control byte
//! (interrupt enable, mode, prescaler, edge select, time-constant-follows
//! flag, optional software reset) optionally followed by a time-constant
//! byte. Counter-mode channels decrement on `trigger()`; timer-mode
//! channels decrement on `tick()` at a rate divided by the CPU clock and
//! the programmed prescaler (16 or 256).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Timer,
    Counter,
}

use std::cell::Cell;

struct CtcChannel {
    mode: Mode,
    prescaler: u16, // 16 or 256
    time_constant: u8,
    counter: u16, // down-counter, reloaded from time_constant
    ie: bool,
    vector_base: u8, // only meaningful on channel 0
    expect_time_constant: bool,
    started: bool,
    /// Interrupt-latch state is `Cell`-wrapped so the daisy chain can be
    /// queried and acknowledged from `Bus::check_interrupts`, which only
    /// borrows `&self` (§5 "single-threaded cooperative" model; no locking
    /// needed for the interior mutation).
    under_service: Cell<bool>,
    zero_count_pending: Cell<bool>,
    prescale_accum: u32,
}

impl CtcChannel {
    fn new() -> Self {
        Self {
            mode: Mode::Timer,
            prescaler: 16,
            time_constant: 0,
            counter: 0,
            ie: false,
            vector_base: 0,
            expect_time_constant: false,
            started: false,
            under_service: Cell::new(false),
            zero_count_pending: Cell::new(false),
            prescale_accum: 0,
        }
    }

    fn write_control(&mut self, value: u8) {
        if self.expect_time_constant {
            self.time_constant = value;
            self.expect_time_constant = false;
            self.counter = if value == 0 { 256 } else { value as u16 };
            self.started = true;
            return;
        }
        if value & 0x01 == 0 {
            // Vector byte for channel 0 (shared by the whole CTC on real hw).
            self.vector_base = value & 0xF8;
            return;
        }
        self.ie = value & 0x80 != 0;
        self.mode = if value & 0x40 != 0 {
            Mode::Counter
        } else {
            Mode::Timer
        };
        self.prescaler = if value & 0x20 != 0 { 256 } else { 16 };
        if value & 0x02 != 0 {
            // Software reset: stop counting until retriggered.
            self.started = false;
        }
        self.expect_time_constant = value & 0x04 != 0;
        if !self.expect_time_constant {
            self.started = self.mode == Mode::Counter;
        }
    }

    fn read(&self) -> u8 {
        self.counter.min(0xFF) as u8
    }

    /// External trigger edge (counter mode, or timer mode's start trigger).
    fn trigger(&mut self) {
        if !self.started {
            self.started = true;
            return;
        }
        if self.mode == Mode::Counter {
            self.decrement();
        }
    }

    /// Advance by `cpu_cycles` system clock ticks (timer mode only).
    fn tick(&mut self, cpu_cycles: u32) {
        if self.mode != Mode::Timer || !self.started {
            return;
        }
        self.prescale_accum += cpu_cycles;
        while self.prescale_accum >= self.prescaler as u32 {
            self.prescale_accum -= self.prescaler as u32;
            self.decrement();
        }
    }

    fn decrement(&mut self) {
        if self.counter <= 1 {
            self.counter = if self.time_constant == 0 {
                256
            } else {
                self.time_constant as u16
            };
            if self.ie {
                self.zero_count_pending.set(true);
            }
        } else {
            self.counter -= 1;
        }
    }
}

/// A Z80 CTC: four channels, channel 0 highest priority in the daisy chain.
pub struct Z80Ctc {
    channels: [CtcChannel; 4],
}

impl Default for Z80Ctc {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80Ctc {
    pub fn new() -> Self {
        Self {
            channels: [
                CtcChannel::new(),
                CtcChannel::new(),
                CtcChannel::new(),
                CtcChannel::new(),
            ],
        }
    }

    pub fn read(&mut self, channel: u8) -> u8 {
        self.channels[(channel & 0x03) as usize].read()
    }

    pub fn write(&mut self, channel: u8, value: u8) {
        self.channels[(channel & 0x03) as usize].write_control(value);
    }

    /// External clock/trigger edge on the named channel.
    pub fn trigger(&mut self, channel: u8) {
        self.channels[(channel & 0x03) as usize].trigger();
    }

    /// Advance all timer-mode channels by the system clock, in CPU T-states.
    pub fn tick(&mut self, cpu_cycles: u32) {
        for ch in &mut self.channels {
            ch.tick(cpu_cycles);
        }
    }

    /// True if channel 2 has just toggled its zero-count (used by KC85 for
    /// the video blink generator and cassette-motor timing).
    pub fn take_zero_count(&mut self, channel: u8) -> bool {
        let ch = &self.channels[(channel & 0x03) as usize];
        let fired = ch.zero_count_pending.get();
        ch.zero_count_pending.set(false);
        fired
    }

    pub fn interrupt_pending(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.ie && c.zero_count_pending.get() && !c.under_service.get())
    }

    /// Acknowledge the highest-priority pending channel, returning its
    /// vector (channel index * 2 added to the shared base vector). Also
    /// consumes the latched zero-count so it isn't re-requested after RETI.
    pub fn acknowledge(&self) -> u8 {
        let base = self.channels[0].vector_base;
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.ie && ch.zero_count_pending.get() && !ch.under_service.get() {
                ch.under_service.set(true);
                ch.zero_count_pending.set(false);
                return base.wrapping_add((i as u8) * 2);
            }
        }
        0xFF
    }

    pub fn notify_reti(&self) {
        if let Some(ch) = self.channels.iter().find(|c| c.under_service.get()) {
            ch.under_service.set(false);
        }
    }
}

//! Z80 PIO (Parallel Input/Output) — two independent 8-bit ports with
//! interrupt-on-input-match logic, wired as a daisy-chain peripheral.
//!
//! Only the control-register programming this machine actually uses is
//! modeled in full: mode select (0=output, 1=input, 2=bidirectional,
//! 3=bit control), interrupt vector load, and interrupt enable/disable.
//! Mode 3 (bit control) mask programming is accepted but the mask is not
//! consulted for interrupt generation — KC85 software drives the PIO in
//! modes 0/1 only.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortMode {
    Output,
    Input,
    Bidirectional,
    BitControl,
}

/// One half (A or B) of a Z80 PIO.
#[derive(Debug)]
pub struct PioPort {
    mode: PortMode,
    output: u8,
    input: u8,
    vector: u8,
    ie: bool,
    /// `Cell`-wrapped so the daisy chain can be acknowledged from
    /// `Bus::check_interrupts`, which only borrows `&self`.
    under_service: std::cell::Cell<bool>,
    /// Next control write is expected to be the interrupt vector.
    expect_vector: bool,
}

impl PioPort {
    fn new() -> Self {
        Self {
            mode: PortMode::Input,
            output: 0,
            input: 0,
            vector: 0,
            ie: false,
            under_service: std::cell::Cell::new(false),
            expect_vector: false,
        }
    }

    fn data_read(&mut self) -> u8 {
        match self.mode {
            PortMode::Output => self.output,
            _ => self.input,
        }
    }

    fn data_write(&mut self, value: u8) {
        self.output = value;
    }

    /// Control port write: mode select (bits 7-6 = 11 with bits 5-0 = 0x0F),
    /// interrupt vector byte, or interrupt enable control word (bits 7-6 = 11
    /// is mode select; bit 0 = 0 with bit 7 = enable/disable marks an IE word).
    fn control_write(&mut self, value: u8) {
        if self.expect_vector {
            self.vector = value;
            self.expect_vector = false;
            return;
        }
        if value & 0x0F == 0x0F {
            self.mode = match value >> 6 {
                0 => PortMode::Output,
                1 => PortMode::Input,
                2 => PortMode::Bidirectional,
                _ => PortMode::BitControl,
            };
        } else if value & 0x01 == 0 {
            // Interrupt control word: bit7 = IE, bit4 = next byte is a vector.
            self.ie = value & 0x80 != 0;
        } else {
            // Anything else with bit0 set and not a mode-select byte is an
            // interrupt vector load.
            self.expect_vector = true;
        }
    }

    fn set_input(&mut self, value: u8) {
        self.input = value;
    }
}

/// A Z80 PIO: two ports (A, B), each an independent daisy-chain node.
pub struct Z80Pio {
    pub a: PioPort,
    pub b: PioPort,
    /// Edge-triggered "ready" latch per port, set by the board when new
    /// input data has arrived; cleared once the CPU reads the port.
    ready_a: bool,
    ready_b: bool,
}

impl Default for Z80Pio {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80Pio {
    pub fn new() -> Self {
        Self {
            a: PioPort::new(),
            b: PioPort::new(),
            ready_a: false,
            ready_b: false,
        }
    }

    /// Current output latch of port A, as driven by the last data write —
    /// boards wire this to bank-switch/control latches outside the PIO itself.
    pub fn output_a(&self) -> u8 {
        self.a.output
    }

    pub fn output_b(&self) -> u8 {
        self.b.output
    }

    /// Register offset 0=data A, 1=data B, 2=control A, 3=control B.
    pub fn read(&mut self, offset: u8) -> u8 {
        match offset & 0x03 {
            0 => {
                self.ready_a = false;
                self.a.data_read()
            }
            1 => {
                self.ready_b = false;
                self.b.data_read()
            }
            _ => 0xFF, // control registers are write-only
        }
    }

    pub fn write(&mut self, offset: u8, value: u8) {
        match offset & 0x03 {
            0 => self.a.data_write(value),
            1 => self.b.data_write(value),
            2 => self.a.control_write(value),
            3 => self.b.control_write(value),
            _ => unreachable!(),
        }
    }

    /// Board-side latch: external hardware presents new input data on port A.
    pub fn set_port_a_input(&mut self, value: u8) {
        self.a.set_input(value);
        self.ready_a = true;
    }

    pub fn set_port_b_input(&mut self, value: u8) {
        self.b.set_input(value);
        self.ready_b = true;
    }

    /// True if either port has a latched, enabled interrupt and is not
    /// already under service by a higher-priority request.
    pub fn interrupt_pending(&self) -> bool {
        (self.a.ie && self.ready_a && !self.a.under_service.get())
            || (self.b.ie && self.ready_b && !self.b.under_service.get())
    }

    /// Acknowledge the highest-priority pending interrupt (A before B) and
    /// return its vector byte, marking it under service until RETI.
    pub fn acknowledge(&self) -> u8 {
        if self.a.ie && self.ready_a && !self.a.under_service.get() {
            self.a.under_service.set(true);
            self.a.vector
        } else {
            self.b.under_service.set(true);
            self.b.vector
        }
    }

    /// Clear whichever port is under service (RETI re-enables the chain).
    pub fn notify_reti(&self) {
        if self.a.under_service.get() {
            self.a.under_service.set(false);
        } else {
            self.b.under_service.set(false);
        }
    }
}

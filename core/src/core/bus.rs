/// Identifies who is accessing the bus (for multi-CPU/DMA arbitration)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BusMaster {
    Cpu(usize), // CPU 0, CPU 1, etc.
    Dma,        // DMA reads through the bus (sees ROM banking overlays)
    DmaVram,    // DMA reads directly from video RAM, bypassing banking overlays
                // (used by blitter dest reads for keepmask blending — matches MAME's
                // blit_pixel reading from m_vram[] instead of the address space)
}

/// Generic bus interface supporting halt/arbitration (TSC, RDY, BUSREQ, etc.)
pub trait Bus {
    type Address: Copy + Into<u64>; // u16 for 8-bit, u32 for 16/32-bit
    type Data; // u8 or u16

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);

    /// Read from I/O port address space (separate from memory on Z80).
    /// Default maps to memory read; override for CPUs with separate I/O.
    fn io_read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data {
        self.read(master, addr)
    }

    /// Write to I/O port address space (separate from memory on Z80).
    /// Default maps to memory write; override for CPUs with separate I/O.
    fn io_write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data) {
        self.write(master, addr, data)
    }

    /// Check if the bus is halted for this master (TSC/RDY/BUSREQ).
    /// Returns true if the master must pause before the next bus cycle.
    fn is_halted_for(&self, master: BusMaster) -> bool;

    /// Generic interrupt query. CPUs pick what they need.
    fn check_interrupts(&self, target: BusMaster) -> InterruptState;

    /// Notify the bus that `target` has decoded a RETI. Daisy-chained
    /// peripherals use this to clear their "interrupt under service" latch
    /// and re-enable lower-priority devices. No-op for flat memory buses.
    fn notify_reti(&mut self, _target: BusMaster) {}

    /// Perform the actual IM2 interrupt-acknowledge bus cycle: the
    /// highest-priority pending daisy-chain peripheral places its vector
    /// byte on the data bus and latches itself "under service" until the
    /// matching RETI. Unlike `check_interrupts`, this mutates bus state and
    /// must be called at most once per accepted interrupt — exactly when
    /// the CPU commits to servicing it, not on every instruction-boundary
    /// poll. Default returns 0xFF (the Z80's open-bus floating value).
    fn acknowledge_interrupt(&mut self, _target: BusMaster) -> u8 {
        0xFF
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct InterruptState {
    pub nmi: bool,
    pub irq: bool,
    pub firq: bool, // 6809-specific; ignored by other CPUs
    /// Vector byte placed on the data bus by the acknowledging daisy-chain
    /// peripheral during a Z80 IM2 interrupt-acknowledge cycle. Ignored by
    /// IM0/IM1 and by CPUs without vectored interrupts.
    pub irq_vector: u8,
}

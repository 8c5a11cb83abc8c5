pub mod z80_ctc;
pub mod z80_pio;

pub use z80_ctc::Z80Ctc;
pub use z80_pio::Z80Pio;

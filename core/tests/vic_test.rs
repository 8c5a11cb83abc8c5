use kc85_core::video::{Vic, VicMemory};

struct ZeroMemory;
impl VicMemory for ZeroMemory {
    fn vic_fetch(&mut self, _addr: u16) -> u8 {
        0
    }
}

/// Returns 0x0E for color-RAM addresses ($D800-$D827) and 0xFF everywhere
/// else, so every character cell decodes to a solid foreground pixel in
/// color 0x0E regardless of the screen code or character-generator address
/// the decoder computes.
struct SolidForegroundMemory;
impl VicMemory for SolidForegroundMemory {
    fn vic_fetch(&mut self, addr: u16) -> u8 {
        if (0xD800..0xD828).contains(&addr) { 0x0E } else { 0xFF }
    }
}

#[test]
fn h_count_advances_and_wraps_into_next_raster_line() {
    let mut vic = Vic::new();
    let mut mem = ZeroMemory;
    assert_eq!(vic.raster_line(), 0);
    for _ in 0..63 {
        vic.tick(&mut mem);
    }
    assert_eq!(vic.raster_line(), 1);
}

#[test]
fn raster_irq_fires_when_raster_line_matches_compare_value() {
    let mut vic = Vic::new();
    let mut mem = ZeroMemory;
    vic.write_register(0x1A, 0x01); // enable raster IRQ
    vic.write_register(0x12, 10); // compare against line 10

    let mut fired = false;
    for _ in 0..(11 * 63) {
        let out = vic.tick(&mut mem);
        fired |= out.irq;
    }

    assert!(fired);
    assert!(vic.irq_pending());
    assert_eq!(vic.read_register(0x19) & 0x80, 0x80);

    // Writing a 1 to the IRST bit acknowledges it.
    vic.write_register(0x19, 0x01);
    assert!(!vic.irq_pending());
}

#[test]
fn collision_registers_are_write_ignored_and_clear_on_read() {
    let mut vic = Vic::new();
    vic.regs.bytes[0x1E] = 0x03; // simulate a sprite-sprite collision already latched

    vic.write_register(0x1E, 0xFF);
    assert_eq!(vic.regs.bytes[0x1E], 0x03, "external write must not alter the collision latch");

    let value = vic.read_register(0x1E);
    assert_eq!(value & 0x0F, 0x03);
    assert_eq!(vic.regs.bytes[0x1E], 0, "reading the collision register clears it");
}

/// Runs the VIC through raster line 48 (the first possible bad line) with
/// DEN and CSEL set, and checks every one of the 40 character columns
/// produced a foreground pixel (§4.2 "40 character cells").
#[test]
fn forty_character_columns_are_rendered_on_a_bad_line() {
    let mut vic = Vic::new();
    let mut mem = SolidForegroundMemory;
    vic.write_register(0x11, 0x10); // DEN, YSCROLL=0
    vic.write_register(0x16, 0x08); // CSEL: 40-column mode

    for _ in 0..(49 * 63) {
        vic.tick(&mut mem);
    }

    let row = &vic.framebuffer[48 * 320..49 * 320];
    assert!(row.iter().all(|&px| px == 0x0E), "all 320 pixels across 40 columns should be foreground");
}

/// With CSEL clear (38-column mode), the leftmost and rightmost character
/// columns are forced into the border color instead of being rendered
/// (§8 "clipped by the left border when CSEL is set").
#[test]
fn thirty_eight_column_mode_borders_the_outer_columns() {
    let mut vic = Vic::new();
    let mut mem = SolidForegroundMemory;
    vic.write_register(0x11, 0x10); // DEN, YSCROLL=0, CSEL left at 0

    for _ in 0..(49 * 63) {
        vic.tick(&mut mem);
    }

    let row = &vic.framebuffer[48 * 320..49 * 320];
    let border = vic.regs.border_color();
    assert!(row[0..8].iter().all(|&px| px == border), "column 0 must be bordered in 38-column mode");
    assert!(row[312..320].iter().all(|&px| px == border), "column 39 must be bordered in 38-column mode");
    assert!(row[8..312].iter().all(|&px| px == 0x0E), "columns 1-38 must still render");
}

//! MOS 6569 (VIC-II) video controller: raster unit, memory addressing,
//! video matrix/graphics sequencer, border unit, eight sprite units, and
//! the CRT beam — driven by a per-line, per-tick hardware schedule rather
//! than by on-demand stepping (§4.2, §9 "Video per-tick state machine").

pub mod pixels;
pub mod registers;
pub mod sprites;

use pixels::{decode_pixel, detect_sprite_background_collision, detect_sprite_sprite_collision, multiplex};
use registers::Registers;
use sprites::Sprite;

pub const SCREEN_WIDTH: usize = 320;
pub const SCREEN_HEIGHT: usize = 200;
const TICKS_PER_LINE: u32 = 63;
const LINES_PER_FRAME: u32 = 312;
const FIRST_BAD_LINE: u32 = 48;
const LAST_BAD_LINE: u32 = 247;

/// Host-provided memory view for the VIC's own 14-bit address space, which
/// may differ from the CPU's view of the same backing RAM (§6 "Fetch callback").
pub trait VicMemory {
    fn vic_fetch(&mut self, addr: u16) -> u8;
}

/// Pin-equivalent outputs asserted by the VIC during a tick (§9 "Bus as a value").
#[derive(Clone, Copy, Debug, Default)]
pub struct VicOutputs {
    pub ba: bool,
    pub aec: bool,
    pub irq: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct IrqLatch {
    irst: bool,
    imbc: bool,
    immc: bool,
    ilp: bool,
}

impl IrqLatch {
    fn pending(&self, enable: u8) -> bool {
        (self.irst && enable & 0x01 != 0)
            || (self.immc && enable & 0x02 != 0)
            || (self.imbc && enable & 0x04 != 0)
            || (self.ilp && enable & 0x08 != 0)
    }

    fn status_byte(&self, enable: u8) -> u8 {
        let mut b = 0u8;
        if self.irst { b |= 0x01; }
        if self.immc { b |= 0x02; }
        if self.imbc { b |= 0x04; }
        if self.ilp { b |= 0x08; }
        if self.pending(enable) { b |= 0x80; }
        b
    }
}

pub struct Vic {
    pub regs: Registers,
    pub framebuffer: Vec<u8>, // SCREEN_WIDTH * SCREEN_HEIGHT color indices

    h_count: u32, // 1..=63, the per-line program counter
    v_count: u32, // 0..=311, current raster line

    vc: u16,
    vc_base: u16,
    rc: u8,
    vmli: u8,

    display_state: bool,
    bad_line: bool,
    bad_lines_enabled: bool,

    main_border: bool,
    vertical_border: bool,

    video_matrix_line: [u16; 40], // latched c-access data for the current char row
    graphics_shift: u8,
    current_g_data: u8,
    current_c_data: u16,

    sprites: [Sprite; 8],
    sprite_ptr: [u8; 8],

    irq_latch: IrqLatch,
    raster_irq_line: u16,

    x_pixel: usize, // 0..SCREEN_WIDTH, current beam column within visible area
}

impl Default for Vic {
    fn default() -> Self {
        Self::new()
    }
}

impl Vic {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            framebuffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            h_count: 1,
            v_count: 0,
            vc: 0,
            vc_base: 0,
            rc: 0,
            vmli: 0,
            display_state: false,
            bad_line: false,
            bad_lines_enabled: false,
            main_border: true,
            vertical_border: false,
            video_matrix_line: [0; 40],
            graphics_shift: 0,
            current_g_data: 0,
            current_c_data: 0,
            sprites: [Sprite::new(); 8],
            sprite_ptr: [0; 8],
            irq_latch: IrqLatch::default(),
            raster_irq_line: 0,
        }
    }

    pub fn read_register(&mut self, addr: u8) -> u8 {
        let a = addr & 0x3F;
        match a {
            0x11 => {
                let live = (self.v_count & 0x100 != 0) as u8;
                (self.regs.read(a) & 0x7F) | (live << 7)
            }
            0x12 => (self.v_count & 0xFF) as u8,
            0x19 => self.irq_latch.status_byte(self.regs.irq_enable()) | 0x70,
            0x1E => self.regs.read(0x1E),
            0x1F => self.regs.read(0x1F),
            _ => self.regs.read(a),
        }
    }

    pub fn write_register(&mut self, addr: u8, value: u8) {
        let a = addr & 0x3F;
        self.regs.write(a, value);
        if a == 0x12 || a == 0x11 {
            self.raster_irq_line = self.regs.raster_compare();
        }
        if a == 0x19 {
            // Writing a 1 to a latch bit clears it; writing 0 leaves it alone.
            if value & 0x01 != 0 { self.irq_latch.irst = false; }
            if value & 0x02 != 0 { self.irq_latch.immc = false; }
            if value & 0x04 != 0 { self.irq_latch.imbc = false; }
            if value & 0x08 != 0 { self.irq_latch.ilp = false; }
        }
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_latch.pending(self.regs.irq_enable())
    }

    pub fn raster_line(&self) -> u32 {
        self.v_count
    }

    /// Advance the VIC by exactly one 1.77 MHz tick: one schedule step, at
    /// most one memory fetch, up to eight decoded pixels, and updated
    /// outputs (§4.2 "Contract").
    pub fn tick(&mut self, mem: &mut dyn VicMemory) -> VicOutputs {
        let mut out = VicOutputs { ba: false, aec: false, irq: false };

        match self.h_count {
            1..=10 => {
                self.sprite_dma_access(mem);
                if (1..=7).contains(&self.h_count) {
                    out.ba = self.any_sprite_dma_in(&[3, 4, 5, 6, 7]);
                }
            }
            11..=14 => {
                if self.h_count == 14 {
                    self.check_bad_line();
                }
                out.ba = self.bad_line;
            }
            15 => {
                self.vc = self.vc_base;
                self.vmli = 0;
                if self.bad_line {
                    self.rc = 0;
                }
                out.ba = self.bad_line;
                self.do_c_access(mem);
            }
            16 => {
                for s in &mut self.sprites {
                    s.tick15_mc_base_bump();
                }
                self.update_border_left();
            }
            // 40 ticks, one per character column (§4.2 "40 character cells"). The
            // housekeeping that real hardware spreads across ticks 55-58 is pushed
            // two ticks later (to 57-59) to make room for the full column count.
            17..=56 => {
                let col = (self.h_count - 17) as usize;
                if col == self.left_border_clear_column() && !self.vertical_border {
                    self.main_border = false;
                }
                self.do_g_access(mem);
                self.render_char_column(mem);
                if self.h_count < 56 {
                    self.do_c_access(mem);
                }
                if col == self.right_border_set_column() {
                    self.main_border = true;
                }
            }
            57 => {
                self.update_border_right();
                for s in &mut self.sprites {
                    s.end_of_line_clear_display();
                }
                self.evaluate_sprite_dma();
            }
            58 => {
                self.evaluate_sprite_dma();
            }
            59 => {
                self.load_sprite_mc();
                if self.rc == 7 {
                    self.vc_base = self.vc;
                    if !self.bad_line {
                        self.display_state = false;
                    }
                }
                if self.display_state {
                    self.rc = (self.rc + 1) & 0x07;
                }
            }
            60..=62 => {}
            63 => {
                self.end_of_line();
            }
            _ => unreachable!(),
        }

        // Real hardware staggers AEC a cycle behind BA; this model ties them
        // together since nothing here distinguishes the two beyond the CPU
        // bus-arbitration stall driven by BA (§5).
        out.aec = out.ba;
        out.irq = self.irq_pending();
        self.advance_h_count();
        out
    }

    fn advance_h_count(&mut self) {
        if self.h_count >= TICKS_PER_LINE {
            self.h_count = 1;
        } else {
            self.h_count += 1;
        }
    }

    fn end_of_line(&mut self) {
        self.v_count += 1;
        if self.v_count >= LINES_PER_FRAME {
            self.v_count = 0;
            self.vc_base = 0;
        }
        // IRST for line 0 is raised on tick 1 of the new line (via
        // check_raster_irq below), not here on the tick-63 wrap (§8).
        self.check_raster_irq();
    }

    fn check_raster_irq(&mut self) {
        if self.v_count == self.raster_irq_line as u32 {
            self.irq_latch.irst = true;
        }
    }

    fn check_bad_line(&mut self) {
        let in_range = (FIRST_BAD_LINE..=LAST_BAD_LINE).contains(&self.v_count);
        if self.v_count == FIRST_BAD_LINE && self.regs.den() {
            self.bad_lines_enabled = true;
        }
        self.bad_line = in_range
            && self.bad_lines_enabled
            && (self.v_count & 0x07) as u8 == self.regs.yscroll();
        if self.bad_line {
            self.display_state = true;
        }
    }

    fn do_c_access(&mut self, mem: &mut dyn VicMemory) {
        if !self.bad_line {
            return;
        }
        let base = self.regs.video_matrix_base();
        let addr = base | self.vc;
        let screen_code = mem.vic_fetch(addr);
        let color = mem.vic_fetch(0xD800 | self.vc) & 0x0F;
        let entry = (screen_code as u16) | ((color as u16) << 8);
        if (self.vmli as usize) < 40 {
            self.video_matrix_line[self.vmli as usize] = entry;
        }
    }

    fn do_g_access(&mut self, mem: &mut dyn VicMemory) {
        let col = (self.h_count - 17) as usize;
        let c_data = self.video_matrix_line[col.min(39)];
        let addr = if self.display_state {
            if self.regs.bmm() {
                self.regs.bitmap_base() | ((self.vc << 3) | self.rc as u16)
            } else {
                self.regs.char_base() | (((c_data & 0xFF) << 3) | self.rc as u16)
            }
        } else {
            0x3FFF
        };
        self.current_g_data = mem.vic_fetch(addr);
        self.current_c_data = c_data;
        self.vc = self.vc.wrapping_add(1);
        self.vmli = self.vmli.wrapping_add(1);
    }

    fn render_char_column(&mut self, _mem: &mut dyn VicMemory) {
        let col = (self.h_count - 17) as usize;
        if col >= 40 {
            return;
        }
        let line_y = self.v_count as usize;
        if line_y >= SCREEN_HEIGHT {
            return;
        }
        let mut opaque = [false; 8];
        let mut any_foreground = false;
        for bit in 0..8u8 {
            let px_x = col * 8 + bit as usize;
            if px_x >= SCREEN_WIDTH {
                continue;
            }
            let g = decode_pixel(&self.regs, self.current_c_data, self.current_g_data, bit);
            any_foreground |= g.is_foreground;

            let sprite_pixels = self.sample_sprites(px_x, &mut opaque);
            let border = self.main_border || self.vertical_border;
            let out_color = multiplex(&self.regs, g, &sprite_pixels, border);
            self.framebuffer[line_y * SCREEN_WIDTH + px_x] = out_color;
        }

        let ss_mask = detect_sprite_sprite_collision(&opaque);
        if ss_mask != 0 {
            self.regs.bytes[0x1E] |= ss_mask;
            self.irq_latch.immc = true;
        }
        let sb_mask = detect_sprite_background_collision(&opaque, any_foreground);
        if sb_mask != 0 {
            self.regs.bytes[0x1F] |= sb_mask;
            self.irq_latch.imbc = true;
        }
    }

    fn sample_sprites(&mut self, px_x: usize, opaque: &mut [bool; 8]) -> [Option<(usize, u8, bool)>; 8] {
        let mut out: [Option<(usize, u8, bool)>; 8] = [None; 8];
        for n in 0..8 {
            let sx = self.regs.sprite_x(n) as usize;
            if !self.sprites[n].display_enabled {
                continue;
            }
            if px_x < sx || px_x >= sx + 24 {
                continue;
            }
            let x_expand = (self.regs.sprite_x_expand() >> n) & 1 != 0;
            let multicolor = (self.regs.sprite_multicolor_enable() >> n) & 1 != 0;
            let value = self.sprites[n].shift_pixel(x_expand, multicolor);
            if value == 0 {
                continue;
            }
            opaque[n] = true;
            let color = if multicolor {
                match value {
                    1 => self.regs.sprite_multicolor(0),
                    2 => self.regs.sprite_color(n),
                    3 => self.regs.sprite_multicolor(1),
                    _ => 0,
                }
            } else {
                self.regs.sprite_color(n)
            };
            out[n] = Some((n, color, multicolor));
        }
        out
    }

    fn any_sprite_dma_in(&self, indices: &[usize]) -> bool {
        indices.iter().any(|&i| self.sprites[i].dma_enabled)
    }

    fn sprite_dma_access(&mut self, mem: &mut dyn VicMemory) {
        let pair = ((self.h_count - 1) / 2) as usize; // ticks 1..10 cover sprites 3..7 and wrap
        let n = (pair + 3) % 8;
        if !self.sprites[n].dma_enabled {
            return;
        }
        let base = self.regs.video_matrix_base();
        let ptr_addr = base | 0x03F8 | (n as u16);
        self.sprite_ptr[n] = mem.vic_fetch(ptr_addr);
        let data_base = (self.sprite_ptr[n] as u16) << 6;
        let mc = self.sprites[n].mc;
        let b0 = mem.vic_fetch(data_base | (mc as u16));
        let b1 = mem.vic_fetch(data_base | ((mc as u16) + 1));
        let b2 = mem.vic_fetch(data_base | ((mc as u16) + 2));
        self.sprites[n].load_shift(b0, b1, b2);
        self.sprites[n].mc = self.sprites[n].mc.wrapping_add(3) & 0x3F;
    }

    fn evaluate_sprite_dma(&mut self) {
        let enable = self.regs.sprite_enable();
        let yexp = self.regs.sprite_y_expand();
        let raster_y = (self.v_count & 0xFF) as u8;
        for n in 0..8 {
            let bit_enabled = (enable >> n) & 1 != 0;
            let bit_yexp = (yexp >> n) & 1 != 0;
            let sy = self.regs.sprite_y(n);
            self.sprites[n].evaluate_dma(bit_enabled, bit_yexp, sy, raster_y);
        }
    }

    fn load_sprite_mc(&mut self) {
        let enable = self.regs.sprite_enable();
        let raster_y = (self.v_count & 0xFF) as u8;
        for n in 0..8 {
            let bit_enabled = (enable >> n) & 1 != 0;
            let sy = self.regs.sprite_y(n);
            self.sprites[n].tick16_mc_base_finish();
            self.sprites[n].tick58_load_mc(bit_enabled, sy, raster_y);
        }
    }

    /// Top row comparison (§4.2 "border unit"): clears the vertical border
    /// flip-flop once the display window begins for this line. The column
    /// (left/right) comparisons that gate `main_border` happen per-column
    /// in the tick-17..=56 loop (`left_border_clear_column`/`right_border_set_column`).
    fn update_border_left(&mut self) {
        if self.v_count as u16 == self.top_comparison_line() {
            self.vertical_border = false;
        }
    }

    /// Bottom row comparison: raises the vertical border flip-flop once the
    /// display window has ended for this frame; DEN=0 forces border for the
    /// whole frame regardless of line.
    fn update_border_right(&mut self) {
        if self.v_count as u16 == self.bottom_comparison_line() {
            self.vertical_border = true;
        }
        if !self.regs.den() {
            self.main_border = true;
        }
    }

    fn top_comparison_line(&self) -> u16 {
        if self.regs.rsel() { 51 } else { 55 }
    }

    fn bottom_comparison_line(&self) -> u16 {
        if self.regs.rsel() { 251 } else { 247 }
    }

    /// Column index (0-based, within the 40-column window) at which the left
    /// border clears: immediately (column 0) in 40-column mode, one column
    /// later in 38-column mode, per CSEL (§4.2, §8 "clipped by the left
    /// border when CSEL is set").
    fn left_border_clear_column(&self) -> usize {
        if self.regs.csel() { 0 } else { 1 }
    }

    /// Column index at which the right border re-asserts: after the last
    /// column (39) in 40-column mode, one column earlier in 38-column mode.
    fn right_border_set_column(&self) -> usize {
        if self.regs.csel() { 39 } else { 38 }
    }
}

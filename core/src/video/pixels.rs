//! Graphics-sequencer bit-pattern decoding and the color multiplexer
//! (§4.2, the eight display-mode table and "Color multiplexer").

use super::registers::Registers;

/// One decoded background/foreground pixel pair plus its source, before
/// sprite priority is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphicsPixel {
    pub color: u8,
    /// True if this pixel belongs to the foreground (character/bitmap data)
    /// rather than the background — used by sprite-bitmap priority and by
    /// sprite-bitmap collision detection.
    pub is_foreground: bool,
}

/// Decode one pixel out of a fetched c-data/g-data pair for the given
/// display mode (ECM/BMM/MCM), following the standard VIC-II mode table.
/// `bit_index` counts 0..7 left-to-right within the 8-pixel g-access byte;
/// for multicolor modes only even indices produce a new 2-bit group.
pub fn decode_pixel(
    regs: &Registers,
    c_data: u16,
    g_data: u8,
    bit_index: u8,
) -> GraphicsPixel {
    let ecm = regs.ecm();
    let bmm = regs.bmm();
    let mcm = regs.mcm();
    let color_nibble = ((c_data >> 8) & 0x0F) as u8;

    match (ecm, bmm, mcm) {
        // Standard text mode.
        (false, false, false) => {
            let bit = (g_data >> (7 - bit_index)) & 1;
            if bit != 0 {
                GraphicsPixel { color: color_nibble, is_foreground: true }
            } else {
                GraphicsPixel { color: regs.background_color(0), is_foreground: false }
            }
        }
        // Multicolor text mode.
        (false, false, true) => {
            if color_nibble & 0x08 == 0 {
                let bit = (g_data >> (7 - bit_index)) & 1;
                if bit != 0 {
                    GraphicsPixel { color: color_nibble, is_foreground: true }
                } else {
                    GraphicsPixel { color: regs.background_color(0), is_foreground: false }
                }
            } else {
                let pair = (g_data >> (6 - (bit_index & !1))) & 0x03;
                let (color, fg) = match pair {
                    0 => (regs.background_color(0), false),
                    1 => (regs.background_color(1), false),
                    2 => (regs.background_color(2), false),
                    _ => (color_nibble & 0x07, true),
                };
                GraphicsPixel { color, is_foreground: fg }
            }
        }
        // Standard bitmap mode.
        (false, true, false) => {
            let bit = (g_data >> (7 - bit_index)) & 1;
            let hi = ((c_data >> 4) & 0x0F) as u8;
            let lo = (c_data & 0x0F) as u8;
            if bit != 0 {
                GraphicsPixel { color: hi, is_foreground: true }
            } else {
                GraphicsPixel { color: lo, is_foreground: false }
            }
        }
        // Multicolor bitmap mode.
        (false, true, true) => {
            let pair = (g_data >> (6 - (bit_index & !1))) & 0x03;
            let hi = ((c_data >> 4) & 0x0F) as u8;
            let lo = (c_data & 0x0F) as u8;
            let (color, fg) = match pair {
                0 => (regs.background_color(0), false),
                1 => (lo, false),
                2 => (hi, true),
                _ => (color_nibble, true),
            };
            GraphicsPixel { color, is_foreground: fg }
        }
        // ECM text mode: top two bits of the screen-code select one of four
        // background colors; the character generator index is masked to 6 bits.
        (true, false, _) => {
            let bg_index = ((c_data >> 6) & 0x03) as usize;
            let bit = (g_data >> (7 - bit_index)) & 1;
            if bit != 0 {
                GraphicsPixel { color: color_nibble, is_foreground: true }
            } else {
                GraphicsPixel { color: regs.background_color(bg_index), is_foreground: false }
            }
        }
        // ECM+BMM and ECM+MCM+BMM are invalid combinations: VIC-II paints
        // solid black for the whole pixel.
        (true, true, _) => GraphicsPixel { color: 0, is_foreground: false },
    }
}

/// Combine the decoded graphics pixel with up to 8 sprite pixels per the
/// documented priority rules: sprites are prioritized by number (0 highest),
/// each sprite can be individually set to draw behind or in front of the
/// foreground graphics via its priority bit, and the border overrides
/// everything when active.
#[allow(clippy::too_many_arguments)]
pub fn multiplex(
    regs: &Registers,
    graphics: GraphicsPixel,
    sprite_pixels: &[Option<(usize, u8, bool)>; 8], // (sprite#, color, is_multicolor_hi) if opaque
    border_active: bool,
) -> u8 {
    if border_active {
        return regs.border_color();
    }
    let priority = regs.sprite_priority();
    for n in 0..8 {
        if let Some((sn, color, _)) = sprite_pixels[n] {
            let behind_graphics = (priority >> sn) & 1 != 0;
            if behind_graphics && graphics.is_foreground {
                continue;
            }
            return color;
        }
    }
    graphics.color
}

/// Sprite-sprite collision: any two sprites with simultaneously opaque
/// pixels at the same dot set bits in $D01E for both sprites involved.
pub fn detect_sprite_sprite_collision(opaque: &[bool; 8]) -> u8 {
    let mut mask = 0u8;
    for i in 0..8 {
        if !opaque[i] {
            continue;
        }
        for j in 0..8 {
            if i != j && opaque[j] {
                mask |= 1 << i;
                break;
            }
        }
    }
    mask
}

/// Sprite-background collision: a sprite pixel opaque at the same dot as a
/// foreground graphics pixel sets that sprite's bit in $D01F.
pub fn detect_sprite_background_collision(opaque: &[bool; 8], graphics_is_foreground: bool) -> u8 {
    if !graphics_is_foreground {
        return 0;
    }
    let mut mask = 0u8;
    for i in 0..8 {
        if opaque[i] {
            mask |= 1 << i;
        }
    }
    mask
}

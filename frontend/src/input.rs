use std::collections::HashMap;

use sdl2::keyboard::Scancode;

/// Maps SDL scancodes to KC85/CAOS key codes. Letters and digits use their
/// ASCII values; control keys use the handful of CAOS codes guests actually
/// rely on. This is a convenience mapping, not a faithful reproduction of
/// the real serial keyboard's scan table (see `Kc85System::handle_keyboard`).
pub struct KeyMap {
    map: HashMap<Scancode, u8>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn bind(&mut self, scancode: Scancode, key_code: u8) {
        self.map.insert(scancode, key_code);
    }

    pub fn get(&self, scancode: Scancode) -> Option<u8> {
        self.map.get(&scancode).copied()
    }
}

/// Build the default KC85 key map: A-Z, 0-9, space, enter, backspace, and
/// the arrow keys (mapped to CAOS's cursor-control codes).
pub fn default_key_map() -> KeyMap {
    let mut km = KeyMap::new();

    for (letter, scancode) in [
        ('A', Scancode::A), ('B', Scancode::B), ('C', Scancode::C), ('D', Scancode::D),
        ('E', Scancode::E), ('F', Scancode::F), ('G', Scancode::G), ('H', Scancode::H),
        ('I', Scancode::I), ('J', Scancode::J), ('K', Scancode::K), ('L', Scancode::L),
        ('M', Scancode::M), ('N', Scancode::N), ('O', Scancode::O), ('P', Scancode::P),
        ('Q', Scancode::Q), ('R', Scancode::R), ('S', Scancode::S), ('T', Scancode::T),
        ('U', Scancode::U), ('V', Scancode::V), ('W', Scancode::W), ('X', Scancode::X),
        ('Y', Scancode::Y), ('Z', Scancode::Z),
    ] {
        km.bind(scancode, letter as u8);
    }

    for (digit, scancode) in [
        ('0', Scancode::Num0), ('1', Scancode::Num1), ('2', Scancode::Num2),
        ('3', Scancode::Num3), ('4', Scancode::Num4), ('5', Scancode::Num5),
        ('6', Scancode::Num6), ('7', Scancode::Num7), ('8', Scancode::Num8),
        ('9', Scancode::Num9),
    ] {
        km.bind(scancode, digit as u8);
    }

    km.bind(Scancode::Space, 0x20);
    km.bind(Scancode::Return, 0x0D);
    km.bind(Scancode::Backspace, 0x08);
    km.bind(Scancode::Left, 0x08);
    km.bind(Scancode::Right, 0x09);
    km.bind(Scancode::Down, 0x0A);
    km.bind(Scancode::Up, 0x0B);

    km
}

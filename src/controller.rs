#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Key {
    B,
    Y,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
    A,
    X,
    L,
    R,
}

impl Key {
    /// Position in the 16-bit report, B is shifted out first.
    fn mask(self) -> u16 {
        1 << (15 - self as u16)
    }
}

pub fn keys_to_bits(keys: &[Key]) -> u16 {
    keys.iter().fold(0, |acc, k| acc | k.mask())
}

/// The two serial pads behind 0x4016/0x4017.
#[derive(Default, Debug)]
pub struct Controller {
    pub data: [u16; 2],
    shift: [u16; 2],
    strobe: bool,
}

impl Controller {
    pub fn set_keys(&mut self, port: usize, keys: &[Key]) {
        self.data[port] = keys_to_bits(keys);
        if self.strobe {
            self.shift[port] = self.data[port];
        }
    }

    /// Bit 0 high keeps reloading the shift registers, the falling edge
    /// leaves them latched for reading.
    pub fn write_strobe(&mut self, data: u8) {
        self.strobe = data & 1 != 0;
        if self.strobe {
            self.shift = self.data;
        }
    }

    pub fn read(&mut self, port: usize) -> u8 {
        if self.strobe {
            self.shift[port] = self.data[port];
        }
        let bit = (self.shift[port] >> 15) as u8;
        // Once empty the pad keeps returning 1
        self.shift[port] = self.shift[port] << 1 | 1;
        if port == 1 {
            0x1C | bit
        } else {
            bit
        }
    }
}

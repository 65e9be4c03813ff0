/// 16-bit CPU register with byte views.
///
/// The 65816 treats A, X, Y, S and D either as a full word or as a low byte
/// (with the high byte preserved or forced to zero, depending on the mode
/// flags), so all access goes through these accessors.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Reg16(u16);

impl Reg16 {
    pub const fn new(word: u16) -> Reg16 {
        Reg16(word)
    }

    pub fn word(self) -> u16 {
        self.0
    }

    pub fn set_word(&mut self, word: u16) {
        self.0 = word;
    }

    pub fn low(self) -> u8 {
        self.0 as u8
    }

    pub fn set_low(&mut self, data: u8) {
        self.0 = (self.0 & 0xFF00) | data as u16;
    }

    pub fn high(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn set_high(&mut self, data: u8) {
        self.0 = (self.0 & 0x00FF) | (data as u16) << 8;
    }
}

//! CPU address space as 256 64KB banks.

pub const CYCLE_FAST: u64 = 6;
pub const CYCLE_SLOW: u64 = 8;
pub const CYCLE_XSLOW: u64 = 12;

const BANK_SIZE: u32 = 0x10000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryKind {
    Wram,
    Rom,
    Sram,
}

/// A direct view of one of the backing arrays.
///
/// LoROM windows only expose 32KB per bank, the low half mirrors the high.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub kind: MemoryKind,
    pub base: usize,
    pub lorom: bool,
}

impl Window {
    pub fn wram(base: usize) -> Window {
        Window {
            kind: MemoryKind::Wram,
            base,
            lorom: false,
        }
    }

    pub fn rom(base: usize, lorom: bool) -> Window {
        Window {
            kind: MemoryKind::Rom,
            base,
            lorom,
        }
    }

    pub fn sram(base: usize, lorom: bool) -> Window {
        Window {
            kind: MemoryKind::Sram,
            base,
            lorom,
        }
    }

    fn index(&self, offset: u16) -> usize {
        if self.lorom {
            self.base + (offset & 0x7FFF) as usize
        } else {
            self.base + offset as usize
        }
    }

    fn advance(self, banks: usize) -> Window {
        let stride = if self.lorom { 0x8000 } else { 0x10000 };
        Window {
            base: self.base + stride * banks,
            ..self
        }
    }
}

/// Banks 00-3F/80-BF: the low 8KB is WRAM, 2000-5FFF is register space and
/// the windows cover 6000-7FFF and 8000-FFFF.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemBank {
    pub sram: Option<Window>,
    pub rom: Option<Window>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    System(SystemBank),
    /// 0000-7FFF and 8000-FFFF backed by different arrays, as in LoROM
    /// SRAM banks where the upper half stays ROM.
    Split { low: Window, high: Window },
    OpenBus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Region {
    Memory(Window),
    Trap(Trap),
}

#[derive(Copy, Clone, Debug)]
pub struct Bank {
    pub region: Region,
    pub speed: u64,
}

impl Default for Bank {
    fn default() -> Bank {
        Bank {
            region: Region::Trap(Trap::OpenBus),
            speed: CYCLE_SLOW,
        }
    }
}

pub struct MemoryMap {
    banks: Vec<Bank>,
    pub wram: Vec<u8>,
    rom: Vec<u8>,
    sram: Vec<u8>,
}

impl Default for MemoryMap {
    fn default() -> MemoryMap {
        let mut map = MemoryMap {
            banks: vec![Bank::default(); 256],
            wram: vec![0; 0x20000],
            rom: Vec::new(),
            sram: Vec::new(),
        };
        map.set_trap(0x000000, 0x400000, Trap::System(SystemBank::default()));
        map.set_trap(0x800000, 0x400000, Trap::System(SystemBank::default()));
        map.set_bank(0x7E0000, 0x20000, Window::wram(0));
        map
    }
}

fn bank_range(addr: u32, size: u32) -> std::ops::Range<usize> {
    debug_assert!(addr % BANK_SIZE == 0, "bank address {addr:06X} is not aligned");
    debug_assert!(size % BANK_SIZE == 0, "bank size {size:X} is not aligned");
    debug_assert!(addr as u64 + size as u64 <= 0x1000000);
    let start = (addr / BANK_SIZE) as usize;
    start..(start + (size / BANK_SIZE) as usize).min(256)
}

impl MemoryMap {
    /// Maps `size` bytes starting at `addr` onto a backing array. The window
    /// advances by one bank stride per bank.
    pub fn set_bank(&mut self, addr: u32, size: u32, window: Window) {
        for (i, bank) in bank_range(addr, size).enumerate() {
            self.banks[bank].region = Region::Memory(window.advance(i));
        }
    }

    pub fn set_trap(&mut self, addr: u32, size: u32, trap: Trap) {
        for (i, bank) in bank_range(addr, size).enumerate() {
            let trap = match trap {
                Trap::System(sys) => Trap::System(SystemBank {
                    sram: sys.sram.map(|w| w.advance(i)),
                    rom: sys.rom.map(|w| w.advance(i)),
                }),
                Trap::Split { low, high } => Trap::Split {
                    low: low.advance(i),
                    high: high.advance(i),
                },
                Trap::OpenBus => Trap::OpenBus,
            };
            self.banks[bank].region = Region::Trap(trap);
        }
    }

    pub fn set_mem_speed(&mut self, addr: u32, size: u32, cycles: u64) {
        for bank in bank_range(addr, size) {
            self.banks[bank].speed = cycles;
        }
    }

    pub fn bank(&self, addr: u32) -> &Bank {
        &self.banks[(addr >> 16) as usize & 0xFF]
    }

    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.rom = rom;
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn load_sram(&mut self, size: usize, backup: Option<Vec<u8>>) {
        self.sram = vec![0; size];
        if let Some(data) = backup {
            let len = data.len().min(size);
            self.sram[..len].copy_from_slice(&data[..len]);
        }
    }

    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    pub fn read(&self, window: Window, addr: u32) -> u8 {
        let index = window.index(addr as u16);
        let mem = match window.kind {
            MemoryKind::Wram => &self.wram,
            MemoryKind::Rom => &self.rom,
            MemoryKind::Sram => &self.sram,
        };
        if mem.is_empty() {
            return (addr >> 8) as u8;
        }
        mem[index % mem.len()]
    }

    pub fn write(&mut self, window: Window, addr: u32, data: u8) {
        let index = window.index(addr as u16);
        let mem = match window.kind {
            MemoryKind::Wram => &mut self.wram,
            MemoryKind::Sram => &mut self.sram,
            MemoryKind::Rom => return,
        };
        if !mem.is_empty() {
            let len = mem.len();
            mem[index % len] = data;
        }
    }
}

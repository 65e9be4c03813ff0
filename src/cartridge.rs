use anyhow::{bail, Result};
use log::{info, warn};

use crate::memory::{MemoryMap, SystemBank, Trap, Window};

const COPIER_HEADER: usize = 0x200;
const LOROM_HEADER: usize = 0x7FC0;
const HIROM_HEADER: usize = 0xFFC0;
const MAX_SRAM: usize = 0x20000;

pub struct Cartridge {
    header: Header,
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn new(mut rom: Vec<u8>) -> Result<Cartridge> {
        if rom.len() % 0x400 == COPIER_HEADER {
            info!("Stripping copier header");
            rom.drain(..COPIER_HEADER);
        }
        if rom.len() < 0x8000 {
            bail!("ROM too small: {} bytes", rom.len());
        }

        let base = [LOROM_HEADER, HIROM_HEADER]
            .into_iter()
            .filter(|&base| base + 0x40 <= rom.len())
            .max_by_key(|&base| score_header(&rom, base))
            .unwrap_or(LOROM_HEADER);
        let header = parse_header(&rom, base)?;

        info!("ROM title: {}", header.title);
        info!("ROM speed: {:?}", header.speed);
        info!("ROM map mode: {:?}", header.map_mode);
        info!("ROM chipset: {:02X}", header.chipset);
        info!("ROM size: {}KB", header.rom_size);
        info!("RAM size: {}B", header.ram_size);
        info!("Country: {:02X}", header.country);
        info!("Developer ID: {:02X}", header.developer_id);
        info!("ROM version: {:02X}", header.rom_version);
        if header.checksum_complement != !header.checksum {
            warn!(
                "Checksum mismatch: {:04X} / {:04X}",
                header.checksum, header.checksum_complement
            );
        }

        Ok(Cartridge { header, rom })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Builds the bank table for this cartridge and moves the ROM and SRAM
    /// into it.
    pub fn into_memory_map(self, backup: Option<Vec<u8>>) -> MemoryMap {
        let mut map = MemoryMap::default();
        let sram_size = self.header.ram_size;
        map.load_rom(self.rom);
        map.load_sram(sram_size, backup);

        match self.header.map_mode {
            MapMode::LoRom => map_lorom(&mut map, sram_size > 0),
            MapMode::HiRom | MapMode::ExHiRom => map_hirom(&mut map, sram_size > 0),
        }
        map
    }
}

fn map_lorom(map: &mut MemoryMap, has_sram: bool) {
    let system = Trap::System(SystemBank {
        sram: None,
        rom: Some(Window::rom(0, true)),
    });
    map.set_trap(0x000000, 0x400000, system);
    map.set_trap(0x800000, 0x400000, system);

    map.set_bank(0x400000, 0x3E0000, Window::rom(0x200000, true));
    map.set_bank(0xC00000, 0x400000, Window::rom(0x200000, true));

    if has_sram {
        // SRAM only in the low half; 8000-FFFF keeps the ROM of 40-7D/C0-FF
        let split = Trap::Split {
            low: Window::sram(0, true),
            high: Window::rom(0x380000, true),
        };
        map.set_trap(0x700000, 0x0E0000, split);
        map.set_trap(0xF00000, 0x100000, split);
    }
}

fn map_hirom(map: &mut MemoryMap, has_sram: bool) {
    let system = Trap::System(SystemBank {
        sram: None,
        rom: Some(Window::rom(0, false)),
    });
    map.set_trap(0x000000, 0x400000, system);
    map.set_trap(0x800000, 0x400000, system);

    if has_sram {
        // 8KB of SRAM per bank at 6000-7FFF, so each bank is set on its own
        for bank in 0x20..0x40u32 {
            let sys = Trap::System(SystemBank {
                sram: Some(Window::sram((bank as usize - 0x20) * 0x2000, false)),
                rom: Some(Window::rom(bank as usize * 0x10000, false)),
            });
            map.set_trap(bank << 16, 0x10000, sys);
            map.set_trap((bank | 0x80) << 16, 0x10000, sys);
        }
    }

    map.set_bank(0x400000, 0x3E0000, Window::rom(0, false));
    map.set_bank(0xC00000, 0x400000, Window::rom(0, false));
}

fn score_header(rom: &[u8], base: usize) -> i32 {
    let mut score = 0;
    let checksum = u16::from_le_bytes([rom[base + 0x1E], rom[base + 0x1F]]);
    let complement = u16::from_le_bytes([rom[base + 0x1C], rom[base + 0x1D]]);
    if checksum ^ complement == 0xFFFF {
        score += 4;
    }
    let mode = rom[base + 0x15] & 0x0F;
    match (base, mode) {
        (LOROM_HEADER, 0) | (HIROM_HEADER, 1) | (HIROM_HEADER, 5) => score += 2,
        _ => {}
    }
    let reset = u16::from_le_bytes([rom[base + 0x3C], rom[base + 0x3D]]);
    if reset >= 0x8000 {
        score += 1;
    }
    score
}

fn parse_header(bytes: &[u8], base: usize) -> Result<Header> {
    let checksum_complement = u16::from_le_bytes([bytes[base + 0x1C], bytes[base + 0x1D]]);
    let checksum = u16::from_le_bytes([bytes[base + 0x1E], bytes[base + 0x1F]]);

    let title = String::from_utf8_lossy(&bytes[base..base + 21])
        .trim()
        .to_string();

    let speed = Speed::from((bytes[base + 0x15] >> 4) & 1);
    let map_mode = match bytes[base + 0x15] & 0xF {
        0 => MapMode::LoRom,
        1 => MapMode::HiRom,
        5 => MapMode::ExHiRom,
        n => bail!("Unsupported map mode {n:X}"),
    };

    let chipset = bytes[base + 0x16];

    let rom_size = 1usize << bytes[base + 0x17].min(16);

    let ram_size = match bytes[base + 0x18] {
        0 => 0,
        n => (0x400usize << n.min(8)).min(MAX_SRAM),
    };

    Ok(Header {
        title,
        speed,
        map_mode,
        chipset,
        rom_size,
        ram_size,
        country: bytes[base + 0x19],
        developer_id: bytes[base + 0x1A],
        rom_version: bytes[base + 0x1B],
        checksum_complement,
        checksum,
    })
}

#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub speed: Speed,
    pub map_mode: MapMode,
    pub chipset: u8,
    /// KB as declared by the header
    pub rom_size: usize,
    /// Bytes
    pub ram_size: usize,
    pub country: u8,
    pub developer_id: u8,
    pub rom_version: u8,
    pub checksum_complement: u16,
    pub checksum: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Slow,
    Fast,
}

impl From<u8> for Speed {
    fn from(val: u8) -> Speed {
        if val & 1 == 0 {
            Speed::Slow
        } else {
            Speed::Fast
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    LoRom,
    HiRom,
    ExHiRom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Region;

    fn image(size: usize, base: usize, mode: u8, ram: u8) -> Vec<u8> {
        let mut rom: Vec<u8> = (0..size).map(|i| (i >> 15) as u8).collect();
        rom[base..base + 21].copy_from_slice(b"TEST CART            ");
        rom[base + 0x15] = mode;
        rom[base + 0x17] = 0x08;
        rom[base + 0x18] = ram;
        rom[base + 0x1C..base + 0x20].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);
        rom[base + 0x3C] = 0x00;
        rom[base + 0x3D] = 0x80;
        rom
    }

    #[test]
    fn detects_lorom() {
        let cart = Cartridge::new(image(0x20000, LOROM_HEADER, 0x20, 0)).unwrap();
        assert_eq!(cart.header().map_mode, MapMode::LoRom);
        assert_eq!(cart.header().title, "TEST CART");
        assert_eq!(cart.header().speed, Speed::Slow);
    }

    #[test]
    fn detects_hirom_fastrom() {
        let cart = Cartridge::new(image(0x20000, HIROM_HEADER, 0x31, 3)).unwrap();
        assert_eq!(cart.header().map_mode, MapMode::HiRom);
        assert_eq!(cart.header().speed, Speed::Fast);
        assert_eq!(cart.header().ram_size, 0x2000);
    }

    #[test]
    fn strips_copier_header() {
        let mut rom = vec![0xEE; COPIER_HEADER];
        rom.extend(image(0x8000, LOROM_HEADER, 0x20, 0));
        let cart = Cartridge::new(rom).unwrap();
        assert_eq!(cart.header().title, "TEST CART");
    }

    #[test]
    fn rejects_tiny_rom() {
        assert!(Cartridge::new(vec![0; 0x1000]).is_err());
    }

    #[test]
    fn lorom_map() {
        let map = Cartridge::new(image(0x20000, LOROM_HEADER, 0x20, 1))
            .unwrap()
            .into_memory_map(Some(vec![0x42; 0x800]));
        assert_eq!(map.sram().len(), 0x800);
        let Region::Trap(Trap::System(sys)) = map.bank(0x018000).region else {
            panic!("bank 01 should be a system bank");
        };
        assert_eq!(sys.rom, Some(Window::rom(0x8000, true)));
        assert_eq!(
            map.bank(0x700000).region,
            Region::Trap(Trap::Split {
                low: Window::sram(0, true),
                high: Window::rom(0x380000, true),
            })
        );
        assert_eq!(
            map.bank(0xF10000).region,
            Region::Trap(Trap::Split {
                low: Window::sram(0x8000, true),
                high: Window::rom(0x388000, true),
            })
        );
        assert_eq!(
            map.bank(0x400000).region,
            Region::Memory(Window::rom(0x200000, true))
        );
    }

    #[test]
    fn hirom_sram_per_bank() {
        let map = Cartridge::new(image(0x20000, HIROM_HEADER, 0x21, 3))
            .unwrap()
            .into_memory_map(None);
        let Region::Trap(Trap::System(sys)) = map.bank(0x216000).region else {
            panic!("bank 21 should be a system bank");
        };
        assert_eq!(sys.sram, Some(Window::sram(0x2000, false)));
        assert_eq!(sys.rom, Some(Window::rom(0x210000, false)));
        let Region::Trap(Trap::System(sys)) = map.bank(0x000000).region else {
            panic!("bank 00 should be a system bank");
        };
        assert_eq!(sys.sram, None);
        assert_eq!(map.bank(0xC10000).region, Region::Memory(Window::rom(0x10000, false)));
    }
}

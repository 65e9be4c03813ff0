use log::debug;

use crate::config::{HBLANK_START, VBLANK_START_LINE};
use crate::context;
use crate::controller::{Controller, Key};
use crate::interrupt::IrqMode;

pub trait Context: context::Ppu + context::Timing + context::Signals {}
impl<T: context::Ppu + context::Timing + context::Signals> Context for T {}

const CPU_VERSION: u8 = 2;

/// 0x4200-0x421F, the WRAM port and the joypads.
#[derive(Default, Debug)]
pub struct Io {
    wrio: u8,
    wrmpya: u8,
    dividend: u16,
    rddiv: u16,
    rdmpy: u16,
    wram_addr: u32,
    memsel: u8,
    joypad: Controller,
    auto_joy: [u16; 2],
}

impl Io {
    pub fn read(&mut self, addr: u16, ctx: &mut impl Context) -> u8 {
        match addr {
            0x4210 => {
                let flag = ctx.interrupt().take_nmi_flag();
                ctx.signal_nmi(false);
                (flag as u8) << 7 | CPU_VERSION
            }
            0x4211 => {
                let flag = ctx.interrupt().take_irq_flag();
                ctx.signal_irq(false);
                (flag as u8) << 7
            }
            0x4212 => {
                let vblank = ctx.line() >= VBLANK_START_LINE;
                let hblank = ctx.line_cycle() >= HBLANK_START;
                (vblank as u8) << 7 | (hblank as u8) << 6
            }
            0x4213 => self.wrio,
            0x4214 => self.rddiv as u8,
            0x4215 => (self.rddiv >> 8) as u8,
            0x4216 => self.rdmpy as u8,
            0x4217 => (self.rdmpy >> 8) as u8,
            0x4218..=0x421F => {
                let i = (addr - 0x4218) as usize / 2;
                let word = self.auto_joy.get(i).copied().unwrap_or(0);
                if addr & 1 == 0 {
                    word as u8
                } else {
                    (word >> 8) as u8
                }
            }
            _ => (addr >> 8) as u8,
        }
    }

    pub fn write(&mut self, addr: u16, data: u8, ctx: &mut impl Context) {
        match addr {
            0x4200 => {
                let mode = IrqMode::from(data >> 4);
                ctx.interrupt().set_irq_mode(mode);
                if mode == IrqMode::Disabled {
                    ctx.signal_irq(false);
                }
                let nmi = ctx.interrupt().set_nmi_enable(data & 0x80 != 0);
                ctx.signal_nmi(nmi);
                ctx.interrupt().set_joypad_enable(data & 1 != 0);
                debug!("NMITIMEN = {data:02X}");
            }
            0x4201 => {
                if self.wrio & 0x80 != 0 && data & 0x80 == 0 {
                    ctx.ppu_latch_counters();
                }
                self.wrio = data;
            }
            0x4202 => self.wrmpya = data,
            0x4203 => {
                self.rdmpy = self.wrmpya as u16 * data as u16;
                self.rddiv = data as u16;
            }
            0x4204 => self.dividend = self.dividend & 0xFF00 | data as u16,
            0x4205 => self.dividend = self.dividend & 0x00FF | (data as u16) << 8,
            0x4206 => {
                if data == 0 {
                    self.rddiv = 0xFFFF;
                    self.rdmpy = self.dividend;
                } else {
                    self.rddiv = self.dividend / data as u16;
                    self.rdmpy = self.dividend % data as u16;
                }
            }
            0x4207 => {
                let t = ctx.interrupt().h_time() & 0x100 | data as u16;
                ctx.interrupt().set_h_time(t);
            }
            0x4208 => {
                let t = ctx.interrupt().h_time() & 0xFF | (data as u16 & 1) << 8;
                ctx.interrupt().set_h_time(t);
            }
            0x4209 => {
                let t = ctx.interrupt().v_time() & 0x100 | data as u16;
                ctx.interrupt().set_v_time(t);
            }
            0x420A => {
                let t = ctx.interrupt().v_time() & 0xFF | (data as u16 & 1) << 8;
                ctx.interrupt().set_v_time(t);
            }
            0x420D => self.memsel = data & 1,
            _ => debug!("Write to unmapped IO {addr:04X} = {data:02X}"),
        }
    }

    pub fn fast_rom(&self) -> bool {
        self.memsel & 1 != 0
    }

    /// 0x2180 reads and writes go through this address and bump it.
    pub fn next_wram_addr(&mut self) -> u32 {
        let ret = self.wram_addr;
        self.wram_addr = (self.wram_addr + 1) & 0x1FFFF;
        ret
    }

    pub fn set_wram_addr_byte(&mut self, index: usize, data: u8) {
        self.wram_addr = match index {
            0 => self.wram_addr & 0x1FF00 | data as u32,
            1 => self.wram_addr & 0x100FF | (data as u32) << 8,
            _ => self.wram_addr & 0x0FFFF | (data as u32 & 1) << 16,
        };
    }

    pub fn read_joypad(&mut self, port: usize) -> u8 {
        self.joypad.read(port)
    }

    pub fn write_strobe(&mut self, data: u8) {
        self.joypad.write_strobe(data)
    }

    /// Latches both pads into 4218-421B, the way the hardware does at the
    /// start of V-blank when 4200 bit 0 is set.
    pub fn auto_joypad_read(&mut self) {
        self.auto_joy = self.joypad.data;
    }

    pub fn set_keys(&mut self, port: usize, keys: &[Key]) {
        if port < 2 {
            self.joypad.set_keys(port, keys);
        }
    }
}

use std::collections::VecDeque;

use log::{debug, warn};
use modular_bitfield::prelude::*;

use crate::config::{SCREEN_WIDTH, VISIBLE_LINES};
use crate::queue::WriteQueue;

/// What the scheduler needs from a PPU: register access and one call per
/// finished scanline.
pub trait PpuTarget {
    fn read_register(&mut self, addr: u16) -> u8;
    fn write_register(&mut self, addr: u16, data: u8);
    fn latch_counters(&mut self, h: u16, v: u16);
    fn render_line(&mut self, line: u16);
    fn start_frame(&mut self);
}

/// Sits between the CPU and the PPU. Writes are queued with their master
/// cycle and a line is only rendered once the CPU has run past its H-blank,
/// with exactly the writes made before that point applied.
pub struct PpuSync<T> {
    target: T,
    queue: WriteQueue,
    pending: VecDeque<(u16, u64)>,
    last_line: Option<u16>,
}

impl<T: PpuTarget> PpuSync<T> {
    pub fn new(target: T, capacity: usize) -> PpuSync<T> {
        PpuSync {
            target,
            queue: WriteQueue::new(capacity),
            pending: VecDeque::new(),
            last_line: None,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    pub fn mark_hblank(&mut self, line: u16, at: u64) {
        self.pending.push_back((line, at));
    }

    pub fn start_frame(&mut self, now: u64) {
        self.sync(now);
        self.last_line = None;
        self.target.start_frame();
    }

    pub fn write(&mut self, addr: u16, data: u8, now: u64) {
        if self.queue.is_full() {
            self.sync(now);
        }
        self.queue.push(now, addr, data);
    }

    /// Reads see every write made before them.
    pub fn read(&mut self, addr: u16, now: u64, h: u16, v: u16) -> u8 {
        self.sync(now);
        if addr == 0x2137 {
            self.target.latch_counters(h, v);
        }
        self.target.read_register(addr)
    }

    pub fn latch(&mut self, now: u64, h: u16, v: u16) {
        self.sync(now);
        self.target.latch_counters(h, v);
    }

    pub fn sync(&mut self, now: u64) {
        while let Some(&(line, at)) = self.pending.front() {
            if at > now {
                break;
            }
            self.apply(at);
            debug_assert!(
                self.last_line.map_or(true, |last| line > last),
                "line {line} rendered out of order"
            );
            self.target.render_line(line);
            self.last_line = Some(line);
            self.pending.pop_front();
        }
        self.apply(now);
    }

    fn apply(&mut self, until: u64) {
        while let Some(w) = self.queue.pop_due(until) {
            self.target.write_register(w.addr, w.data);
        }
    }
}

#[bitfield(bits = 16)]
#[derive(Default)]
struct DisplayCtrl {
    brightness: B4,
    #[skip]
    __: B3,
    force_blank: bool,
    interlace: bool,
    #[skip]
    __: B7,
}

#[bitfield(bits = 8)]
#[derive(Debug, Default)]
struct VramAddrIncMode {
    increment_step: B2,
    translation: B2,
    #[skip]
    __: B3,
    increment_after_high: bool,
}

impl VramAddrIncMode {
    fn inc(&self) -> u16 {
        match self.increment_step() {
            0 => 1,
            1 => 32,
            _ => 128,
        }
    }

    fn translate(&self, addr: u16) -> u16 {
        match self.translation() {
            0 => addr,
            1 => addr & 0xFF00 | (addr & 0x001F) << 3 | (addr & 0x00E0) >> 5,
            2 => addr & 0xFE00 | (addr & 0x003F) << 3 | (addr & 0x01C0) >> 6,
            _ => addr & 0xFC00 | (addr & 0x007F) << 3 | (addr & 0x0380) >> 7,
        }
    }
}

#[bitfield(bits = 16)]
#[derive(Default)]
struct OamAddr {
    addr: B9,
    #[skip]
    __: B6,
    priority_rotation: bool,
}

/// PPU register file. Only the backdrop is drawn; the rest of the
/// write-only registers are kept as raw bytes.
pub struct Ppu {
    pub screen: Vec<u16>,
    pub frame_number: u64,
    pub lines_rendered: u64,

    vram: Vec<u8>,
    cgram: [u16; 0x100],
    oam: [u8; 0x220],
    regs: [u8; 0x40],

    display_control: DisplayCtrl, // $2100, $2133

    oam_reload: OamAddr, // $2102, $2103
    oam_addr: u16,
    oam_lsb: u8,

    vram_mode: VramAddrIncMode, // $2115
    vram_addr: u16,             // $2116, $2117
    vram_prefetch: [u8; 2],
    cgram_addr: u16, // $2121
    cgram_lsb: u8,

    m7_old: u8,
    m7a: u16,
    m7b: u16,
    mpy: i32, // $2134, $2135, $2136

    h_counter_latch: u16, // $213C
    v_counter_latch: u16, // $213D
    hv_latched: bool,
    h_flipflopped: bool,
    v_flipflopped: bool,
}

impl Default for Ppu {
    fn default() -> Self {
        Ppu {
            screen: vec![0; SCREEN_WIDTH * VISIBLE_LINES],
            frame_number: 0,
            lines_rendered: 0,
            vram: vec![0; 0x10000],
            cgram: [0; 0x100],
            oam: [0; 0x220],
            regs: [0; 0x40],
            display_control: Default::default(),
            oam_reload: Default::default(),
            oam_addr: 0,
            oam_lsb: 0,
            vram_mode: Default::default(),
            vram_addr: 0,
            vram_prefetch: [0; 2],
            cgram_addr: 0,
            cgram_lsb: 0,
            m7_old: 0,
            m7a: 0,
            m7b: 0,
            mpy: 0,
            h_counter_latch: 0,
            v_counter_latch: 0,
            hv_latched: false,
            h_flipflopped: false,
            v_flipflopped: false,
        }
    }
}

impl Ppu {
    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn cgram(&self) -> &[u16] {
        &self.cgram
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    pub fn register(&self, addr: u16) -> u8 {
        self.regs[addr as usize & 0x3F]
    }

    fn prefetch(&mut self) {
        let addr = self.vram_mode.translate(self.vram_addr) as usize * 2;
        self.vram_prefetch[0] = self.vram[addr];
        self.vram_prefetch[1] = self.vram[addr + 1];
    }

    fn update_mpy(&mut self) {
        self.mpy = (self.m7a as i16 as i32) * ((self.m7b >> 8) as i8 as i32);
    }

    fn backdrop(&self) -> u16 {
        if self.display_control.force_blank() {
            return 0;
        }
        let color = self.cgram[0];
        let level = self.display_control.brightness() as u16 + 1;
        let scale = |c: u16| (c & 0x1F) * level / 16;
        scale(color >> 10) << 10 | scale(color >> 5) << 5 | scale(color)
    }
}

impl PpuTarget for Ppu {
    fn read_register(&mut self, addr: u16) -> u8 {
        match addr {
            0x2134 => self.mpy as u8,
            0x2135 => (self.mpy >> 8) as u8,
            0x2136 => (self.mpy >> 16) as u8,
            0x2138 => {
                let ret = if self.oam_addr < 0x200 {
                    self.oam[self.oam_addr as usize]
                } else {
                    self.oam[(self.oam_addr & 0x21F) as usize]
                };
                self.oam_addr = (self.oam_addr + 1) & 0x3FF;
                ret
            }
            0x2139 | 0x213A => {
                let index = (addr - 0x2139) as usize;
                let ret = self.vram_prefetch[index];
                if self.vram_mode.increment_after_high() == (index == 1) {
                    self.prefetch();
                    self.vram_addr = (self.vram_addr + self.vram_mode.inc()) & 0x7FFF;
                }
                ret
            }
            0x213B => {
                let data = self.cgram[self.cgram_addr as usize / 2];
                let ret = if self.cgram_addr & 1 == 0 {
                    data as u8
                } else {
                    (data >> 8) as u8
                };
                self.cgram_addr = (self.cgram_addr + 1) & 0x1FF;
                ret
            }
            0x213C => {
                self.h_flipflopped = !self.h_flipflopped;
                if self.h_flipflopped {
                    self.h_counter_latch as u8
                } else {
                    (self.h_counter_latch >> 8) as u8 & 1
                }
            }
            0x213D => {
                self.v_flipflopped = !self.v_flipflopped;
                if self.v_flipflopped {
                    self.v_counter_latch as u8
                } else {
                    (self.v_counter_latch >> 8) as u8 & 1
                }
            }
            // PPU1 version 1
            0x213E => 1,
            0x213F => {
                let ret = 1 | (self.hv_latched as u8) << 6 | (self.frame_number as u8 & 1) << 7;
                self.hv_latched = false;
                self.h_flipflopped = false;
                self.v_flipflopped = false;
                ret
            }
            _ => (addr >> 8) as u8,
        }
    }

    fn write_register(&mut self, addr: u16, data: u8) {
        debug!("PPU write {addr:04X} = {data:02X}");
        self.regs[addr as usize & 0x3F] = data;
        match addr {
            0x2100 => self.display_control.bytes[0] = data,
            0x2102 | 0x2103 => {
                self.oam_reload.bytes[(addr - 0x2102) as usize] = data;
                self.oam_addr = self.oam_reload.addr() << 1;
            }
            0x2104 => {
                if self.oam_addr < 0x200 {
                    if self.oam_addr & 1 == 0 {
                        self.oam_lsb = data;
                    } else {
                        self.oam[self.oam_addr as usize - 1] = self.oam_lsb;
                        self.oam[self.oam_addr as usize] = data;
                    }
                } else {
                    self.oam[(self.oam_addr & 0x21F) as usize] = data;
                }
                self.oam_addr = (self.oam_addr + 1) & 0x3FF;
            }
            0x210D | 0x210E | 0x211D..=0x2120 => self.m7_old = data,
            0x2115 => self.vram_mode.bytes[0] = data,
            0x2116 => {
                self.vram_addr = self.vram_addr & 0x7F00 | data as u16;
                self.prefetch();
            }
            0x2117 => {
                self.vram_addr = self.vram_addr & 0x00FF | ((data & 0x7F) as u16) << 8;
                self.prefetch();
            }
            0x2118 | 0x2119 => {
                let offset = addr - 0x2118;
                let vram_addr = self.vram_mode.translate(self.vram_addr) * 2 + offset;
                self.vram[vram_addr as usize] = data;
                if self.vram_mode.increment_after_high() == (offset == 1) {
                    self.vram_addr = (self.vram_addr + self.vram_mode.inc()) & 0x7FFF;
                }
            }
            0x211B => {
                self.m7a = (data as u16) << 8 | self.m7_old as u16;
                self.m7_old = data;
                self.update_mpy();
            }
            0x211C => {
                self.m7b = (data as u16) << 8 | self.m7_old as u16;
                self.m7_old = data;
                self.update_mpy();
            }
            0x2121 => self.cgram_addr = data as u16 * 2,
            0x2122 => {
                if self.cgram_addr & 1 == 0 {
                    self.cgram_lsb = data;
                } else {
                    self.cgram[self.cgram_addr as usize / 2] =
                        ((data & 0x7F) as u16) << 8 | self.cgram_lsb as u16;
                }
                self.cgram_addr = (self.cgram_addr + 1) & 0x1FF;
            }
            0x2133 => self.display_control.bytes[1] = data,
            0x2134..=0x213F => warn!("Write to read-only PPU register {addr:04X} = {data:02X}"),
            _ => {}
        }
    }

    fn latch_counters(&mut self, h: u16, v: u16) {
        self.h_counter_latch = h;
        self.v_counter_latch = v;
        self.hv_latched = true;
    }

    /// Visible lines 1-224 land in rows 0-223.
    fn render_line(&mut self, line: u16) {
        if line == 0 || line as usize > VISIBLE_LINES {
            return;
        }
        let color = self.backdrop();
        let row = (line as usize - 1) * SCREEN_WIDTH;
        self.screen[row..row + SCREEN_WIDTH].fill(color);
        self.lines_rendered += 1;
    }

    fn start_frame(&mut self) {
        self.frame_number += 1;
        if !self.display_control.force_blank() {
            self.oam_addr = self.oam_reload.addr() << 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl PpuTarget for Recorder {
        fn read_register(&mut self, addr: u16) -> u8 {
            self.log.push(format!("r{addr:04X}"));
            0
        }
        fn write_register(&mut self, addr: u16, data: u8) {
            self.log.push(format!("w{addr:04X}={data}"));
        }
        fn latch_counters(&mut self, h: u16, v: u16) {
            self.log.push(format!("latch {h},{v}"));
        }
        fn render_line(&mut self, line: u16) {
            self.log.push(format!("line {line}"));
        }
        fn start_frame(&mut self) {
            self.log.push("frame".to_string());
        }
    }

    #[test]
    fn writes_apply_before_the_line_they_precede() {
        let mut sync = PpuSync::new(Recorder::default(), 16);
        sync.write(0x2100, 1, 100);
        sync.mark_hblank(1, 1096);
        sync.write(0x2100, 2, 1200);
        sync.mark_hblank(2, 2460);
        sync.write(0x2100, 3, 2500);

        sync.sync(2000);
        assert_eq!(sync.target().log, ["w2100=1", "line 1", "w2100=2"]);

        sync.sync(3000);
        assert_eq!(
            sync.target().log,
            ["w2100=1", "line 1", "w2100=2", "line 2", "w2100=3"]
        );
        assert_eq!(sync.pending_writes(), 0);
    }

    #[test]
    fn nothing_applies_early() {
        let mut sync = PpuSync::new(Recorder::default(), 16);
        sync.write(0x2122, 7, 500);
        sync.mark_hblank(1, 1096);
        sync.sync(400);
        assert!(sync.target().log.is_empty());
        assert_eq!(sync.pending_writes(), 1);
    }

    #[test]
    fn read_flushes_first() {
        let mut sync = PpuSync::new(Recorder::default(), 16);
        sync.write(0x2115, 0x80, 10);
        sync.read(0x2137, 20, 33, 44);
        assert_eq!(sync.target().log, ["w2115=128", "latch 33,44", "r2137"]);
    }

    #[test]
    fn full_queue_flushes() {
        let mut sync = PpuSync::new(Recorder::default(), 2);
        sync.write(0x2100, 1, 1);
        sync.write(0x2100, 2, 2);
        sync.write(0x2100, 3, 3);
        assert_eq!(sync.target().log, ["w2100=1", "w2100=2"]);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn out_of_order_lines_assert() {
        let mut sync = PpuSync::new(Recorder::default(), 16);
        sync.mark_hblank(5, 100);
        sync.mark_hblank(3, 200);
        sync.sync(300);
    }

    #[test]
    fn backdrop_follows_brightness() {
        let mut ppu = Ppu::default();
        ppu.write_register(0x2121, 0);
        ppu.write_register(0x2122, 0x1F);
        ppu.write_register(0x2122, 0x00);
        ppu.write_register(0x2100, 0x0F);
        ppu.render_line(1);
        assert_eq!(ppu.screen[0], 0x1F);

        ppu.write_register(0x2100, 0x07);
        ppu.render_line(2);
        assert_eq!(ppu.screen[SCREEN_WIDTH], 0x0F);

        ppu.write_register(0x2100, 0x8F);
        ppu.render_line(224);
        assert_eq!(ppu.screen[223 * SCREEN_WIDTH + 255], 0);
        assert_eq!(ppu.lines_rendered, 3);
    }

    #[test]
    fn vram_port_increments_on_high_byte() {
        let mut ppu = Ppu::default();
        ppu.write_register(0x2115, 0x80);
        ppu.write_register(0x2116, 0x00);
        ppu.write_register(0x2117, 0x10);
        ppu.write_register(0x2118, 0x11);
        ppu.write_register(0x2118, 0x22);
        ppu.write_register(0x2119, 0x33);
        ppu.write_register(0x2118, 0x44);
        assert_eq!(&ppu.vram()[0x2000..0x2004], &[0x22, 0x33, 0x44, 0x00]);
    }

    #[test]
    fn mode7_multiply() {
        let mut ppu = Ppu::default();
        ppu.write_register(0x211B, 0x00);
        ppu.write_register(0x211B, 0x01);
        ppu.write_register(0x211C, 0x00);
        ppu.write_register(0x211C, 0xFE);
        assert_eq!(ppu.read_register(0x2134), 0x00);
        assert_eq!(ppu.read_register(0x2135), 0xFE);
        assert_eq!(ppu.read_register(0x2136), 0xFF);
    }

    #[test]
    fn hv_latch_flipflops() {
        let mut ppu = Ppu::default();
        ppu.latch_counters(0x154, 0x105);
        assert_eq!(ppu.read_register(0x213C), 0x54);
        assert_eq!(ppu.read_register(0x213C), 0x01);
        assert_eq!(ppu.read_register(0x213D), 0x05);
        assert_eq!(ppu.read_register(0x213F) & 0x40, 0x40);
        assert_eq!(ppu.read_register(0x213F) & 0x40, 0);
        assert_eq!(ppu.read_register(0x213D), 0x05);
    }
}

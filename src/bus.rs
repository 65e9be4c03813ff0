use log::debug;

use crate::context;
use crate::dma::{Dma, DmaPort};
use crate::io::Io;
use crate::controller::Key;
use crate::memory::{MemoryMap, Region, SystemBank, Trap, CYCLE_FAST, CYCLE_SLOW, CYCLE_XSLOW};

pub trait Context: context::Ppu + context::Apu + context::Timing + context::Signals {}
impl<T: context::Ppu + context::Apu + context::Timing + context::Signals> Context for T {}

/// The A-bus: bank table lookups plus the registers living in the system
/// banks.
#[derive(Default)]
pub struct Bus {
    pub map: MemoryMap,
    pub io: Io,
    pub dma: Dma,
}

impl Bus {
    pub fn new(map: MemoryMap) -> Bus {
        Bus {
            map,
            io: Io::default(),
            dma: Dma::default(),
        }
    }

    pub fn read(&mut self, addr: u32, ctx: &mut impl Context) -> u8 {
        let offset = addr as u16;
        if self.is_system(addr) {
            match offset {
                0x420B => {
                    ctx.elapse(CYCLE_FAST);
                    return self.dma.mdma_enable();
                }
                0x420C => {
                    ctx.elapse(CYCLE_FAST);
                    return self.dma.hdma_enable();
                }
                0x4300..=0x437F => {
                    ctx.elapse(CYCLE_FAST);
                    return self.dma.read(offset);
                }
                _ => {}
            }
        }
        self.port(ctx, true).read(addr)
    }

    pub fn write(&mut self, addr: u32, data: u8, ctx: &mut impl Context) {
        let offset = addr as u16;
        if self.is_system(addr) {
            match offset {
                0x420B => {
                    ctx.elapse(CYCLE_FAST);
                    self.dma.set_mdma_enable(data);
                    if data != 0 {
                        ctx.signal_dma(true);
                    }
                    return;
                }
                0x420C => {
                    ctx.elapse(CYCLE_FAST);
                    self.dma.set_hdma_enable(data);
                    return;
                }
                0x4300..=0x437F => {
                    ctx.elapse(CYCLE_FAST);
                    self.dma.write(offset, data);
                    return;
                }
                _ => {}
            }
        }
        self.port(ctx, true).write(addr, data)
    }

    fn is_system(&self, addr: u32) -> bool {
        matches!(self.map.bank(addr).region, Region::Trap(Trap::System(_)))
    }

    fn port<'a, C: Context>(&'a mut self, ctx: &'a mut C, charge: bool) -> Port<'a, C> {
        Port {
            map: &mut self.map,
            io: &mut self.io,
            ctx,
            charge,
        }
    }

    pub fn process_mdma(&mut self, ctx: &mut impl Context) {
        let Bus { map, io, dma } = self;
        let mut port = Port {
            map,
            io,
            ctx,
            charge: false,
        };
        dma.process_mdma(&mut port);
    }

    pub fn hdma_init(&mut self) {
        self.dma.hdma_init();
    }

    pub fn process_hdma(&mut self, ctx: &mut impl Context) {
        let Bus { map, io, dma } = self;
        let mut port = Port {
            map,
            io,
            ctx,
            charge: false,
        };
        dma.process_hdma(&mut port);
    }

    pub fn set_keys(&mut self, port: usize, keys: &[Key]) {
        self.io.set_keys(port, keys);
    }
}

/// Everything a single A-bus access needs, borrowed apart from the DMA
/// controller so DMA can drive the bus.
struct Port<'a, C> {
    map: &'a mut MemoryMap,
    io: &'a mut Io,
    ctx: &'a mut C,
    charge: bool,
}

impl<C: Context> Port<'_, C> {
    fn elapse(&mut self, clock: u64) {
        if self.charge {
            self.ctx.elapse(clock);
        }
    }

    fn read(&mut self, addr: u32) -> u8 {
        let bank = *self.map.bank(addr);
        match bank.region {
            Region::Memory(window) => {
                self.elapse(bank.speed);
                self.map.read(window, addr)
            }
            Region::Trap(Trap::OpenBus) => {
                self.elapse(CYCLE_SLOW);
                (addr >> 8) as u8
            }
            Region::Trap(Trap::Split { low, high }) => {
                self.elapse(bank.speed);
                let window = if addr & 0x8000 == 0 { low } else { high };
                self.map.read(window, addr)
            }
            Region::Trap(Trap::System(sys)) => self.system_read(sys, addr, bank.speed),
        }
    }

    fn write(&mut self, addr: u32, data: u8) {
        let bank = *self.map.bank(addr);
        match bank.region {
            Region::Memory(window) => {
                self.elapse(bank.speed);
                self.map.write(window, addr, data)
            }
            Region::Trap(Trap::OpenBus) => {
                self.elapse(CYCLE_SLOW);
                debug!("Write to open bus {addr:06X} = {data:02X}");
            }
            Region::Trap(Trap::Split { low, high }) => {
                self.elapse(bank.speed);
                let window = if addr & 0x8000 == 0 { low } else { high };
                self.map.write(window, addr, data)
            }
            Region::Trap(Trap::System(sys)) => self.system_write(sys, addr, data, bank.speed),
        }
    }

    fn system_read(&mut self, sys: SystemBank, addr: u32, speed: u64) -> u8 {
        let offset = addr as u16;
        match offset {
            0x0000..=0x1FFF => {
                self.elapse(CYCLE_SLOW);
                self.map.wram[offset as usize]
            }
            0x2100..=0x213F => {
                self.elapse(CYCLE_FAST);
                self.ctx.ppu_read(offset)
            }
            0x2140..=0x217F => {
                self.elapse(CYCLE_FAST);
                self.ctx.apu_read(offset as usize & 3)
            }
            0x2180 => {
                self.elapse(CYCLE_FAST);
                let i = self.io.next_wram_addr();
                self.map.wram[i as usize]
            }
            0x4016 | 0x4017 => {
                self.elapse(CYCLE_XSLOW);
                self.io.read_joypad(offset as usize & 1)
            }
            0x4000..=0x41FF => {
                self.elapse(CYCLE_XSLOW);
                (addr >> 8) as u8
            }
            0x4200..=0x421F => {
                self.elapse(CYCLE_FAST);
                self.io.read(offset, &mut *self.ctx)
            }
            0x6000..=0x7FFF => {
                self.elapse(CYCLE_SLOW);
                match sys.sram {
                    Some(w) => self.map.read(w, addr & 0x1FFF),
                    None => (addr >> 8) as u8,
                }
            }
            0x8000..=0xFFFF => {
                self.elapse(speed);
                match sys.rom {
                    Some(w) => self.map.read(w, addr),
                    None => (addr >> 8) as u8,
                }
            }
            _ => {
                self.elapse(CYCLE_FAST);
                (addr >> 8) as u8
            }
        }
    }

    fn system_write(&mut self, sys: SystemBank, addr: u32, data: u8, speed: u64) {
        let offset = addr as u16;
        match offset {
            0x0000..=0x1FFF => {
                self.elapse(CYCLE_SLOW);
                self.map.wram[offset as usize] = data;
            }
            0x2100..=0x213F => {
                self.elapse(CYCLE_FAST);
                self.ctx.ppu_write(offset, data);
            }
            0x2140..=0x217F => {
                self.elapse(CYCLE_FAST);
                self.ctx.apu_write(offset as usize & 3, data);
            }
            0x2180 => {
                self.elapse(CYCLE_FAST);
                let i = self.io.next_wram_addr();
                self.map.wram[i as usize] = data;
            }
            0x2181..=0x2183 => {
                self.elapse(CYCLE_FAST);
                self.io.set_wram_addr_byte((offset - 0x2181) as usize, data);
            }
            0x4016 => {
                self.elapse(CYCLE_XSLOW);
                self.io.write_strobe(data);
            }
            0x4000..=0x41FF => self.elapse(CYCLE_XSLOW),
            0x4200..=0x421F => {
                self.elapse(CYCLE_FAST);
                self.io.write(offset, data, &mut *self.ctx);
                if offset == 0x420D {
                    let speed = if self.io.fast_rom() {
                        CYCLE_FAST
                    } else {
                        CYCLE_SLOW
                    };
                    self.map.set_mem_speed(0x800000, 0x800000, speed);
                }
            }
            0x6000..=0x7FFF => {
                self.elapse(CYCLE_SLOW);
                if let Some(w) = sys.sram {
                    self.map.write(w, addr & 0x1FFF, data);
                }
            }
            0x8000..=0xFFFF => {
                self.elapse(speed);
                if let Some(w) = sys.rom {
                    self.map.write(w, addr, data);
                }
            }
            _ => {
                self.elapse(CYCLE_FAST);
                debug!("Write to unmapped {addr:06X} = {data:02X}");
            }
        }
    }
}

impl<C: Context> DmaPort for Port<'_, C> {
    fn a_read(&mut self, addr: u32) -> u8 {
        self.read(addr)
    }

    fn a_write(&mut self, addr: u32, data: u8) {
        self.write(addr, data)
    }

    fn b_read(&mut self, reg: u8) -> u8 {
        self.read(0x2100 | reg as u32)
    }

    fn b_write(&mut self, reg: u8, data: u8) {
        self.write(0x2100 | reg as u32, data)
    }

    fn elapse(&mut self, clock: u64) {
        self.ctx.elapse(clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::interrupt::{signal, Interrupt};
    use crate::memory::Window;

    #[derive(Default)]
    struct TestContext {
        timing: Counter,
        interrupt: Interrupt,
        ppu_writes: Vec<(u16, u8)>,
        apu_writes: Vec<(usize, u8)>,
    }

    impl context::Ppu for TestContext {
        fn ppu_read(&mut self, addr: u16) -> u8 {
            addr as u8
        }
        fn ppu_write(&mut self, addr: u16, data: u8) {
            self.ppu_writes.push((addr, data));
        }
        fn ppu_latch_counters(&mut self) {}
    }

    impl context::Apu for TestContext {
        fn apu_read(&mut self, port: usize) -> u8 {
            0xA0 | port as u8
        }
        fn apu_write(&mut self, port: usize, data: u8) {
            self.apu_writes.push((port, data));
        }
    }

    impl context::Timing for TestContext {
        fn elapse(&mut self, clock: u64) {
            self.timing.elapse(clock)
        }
        fn now(&self) -> u64 {
            self.timing.now()
        }
        fn line(&self) -> u16 {
            self.timing.line()
        }
        fn line_cycle(&self) -> u64 {
            self.timing.line_cycle()
        }
    }

    impl context::Signals for TestContext {
        fn signals(&self) -> u8 {
            self.interrupt.signals()
        }
        fn clear_signals(&mut self, mask: u8) {
            self.interrupt.clear(mask)
        }
        fn signal_irq(&mut self, enable: bool) {
            self.interrupt.signal_irq(enable);
        }
        fn signal_nmi(&mut self, enable: bool) {
            self.interrupt.signal_nmi(enable);
        }
        fn signal_dma(&mut self, enable: bool) {
            self.interrupt.signal_dma(enable);
        }
        fn signal_reset(&mut self, enable: bool) {
            self.interrupt.signal_reset(enable);
        }
        fn interrupt(&mut self) -> &mut Interrupt {
            &mut self.interrupt
        }
    }

    fn lorom_bus() -> Bus {
        let mut map = MemoryMap::default();
        map.load_rom((0..0x10000u32).map(|i| (i >> 8) as u8 ^ i as u8).collect());
        let sys = SystemBank {
            sram: None,
            rom: Some(Window::rom(0, true)),
        };
        map.set_trap(0x000000, 0x400000, Trap::System(sys));
        map.set_trap(0x800000, 0x400000, Trap::System(sys));
        Bus::new(map)
    }

    #[test]
    fn wram_is_mirrored_in_system_banks() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        bus.write(0x001234, 0x56, &mut ctx);
        assert_eq!(bus.read(0x7E1234, &mut ctx), 0x56);
        assert_eq!(bus.read(0x801234, &mut ctx), 0x56);
        assert_eq!(ctx.timing.now(), 3 * CYCLE_SLOW);
    }

    #[test]
    fn access_speeds() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        bus.read(0x002100, &mut ctx);
        assert_eq!(ctx.timing.now(), CYCLE_FAST);
        bus.read(0x004016, &mut ctx);
        assert_eq!(ctx.timing.now(), CYCLE_FAST + CYCLE_XSLOW);
        bus.read(0x808000, &mut ctx);
        assert_eq!(ctx.timing.now(), CYCLE_FAST + CYCLE_XSLOW + CYCLE_SLOW);
    }

    #[test]
    fn memsel_switches_high_rom_speed() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        bus.write(0x00420D, 1, &mut ctx);
        let before = ctx.timing.now();
        bus.read(0x808000, &mut ctx);
        assert_eq!(ctx.timing.now() - before, CYCLE_FAST);
        let before = ctx.timing.now();
        bus.read(0x008000, &mut ctx);
        assert_eq!(ctx.timing.now() - before, CYCLE_SLOW);
    }

    #[test]
    fn lorom_reads_through_window() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        assert_eq!(bus.read(0x008123, &mut ctx), 0x01 ^ 0x23);
        assert_eq!(bus.read(0x018123, &mut ctx), 0x81 ^ 0x23);
        assert_eq!(bus.read(0x818123, &mut ctx), 0x81 ^ 0x23);
    }

    #[test]
    fn open_bus_returns_high_byte() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        assert_eq!(bus.read(0xC01234, &mut ctx), 0x12);
        assert_eq!(bus.read(0x005000, &mut ctx), 0x50);
        assert_eq!(bus.read(0x006000, &mut ctx), 0x60);
    }

    #[test]
    fn mdma_write_signals_dma() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        bus.write(0x00420B, 0, &mut ctx);
        assert_eq!(ctx.interrupt.signals() & signal::DMA, 0);
        bus.write(0x00420B, 1, &mut ctx);
        assert_ne!(ctx.interrupt.signals() & signal::DMA, 0);
    }

    #[test]
    fn mdma_copies_wram_into_ppu() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        for i in 0..4u8 {
            bus.write(0x000100 + i as u32, 0x10 + i, &mut ctx);
        }
        for (reg, val) in [(0x4300, 0x01), (0x4301, 0x18), (0x4302, 0x00), (0x4303, 0x01)] {
            bus.write(reg, val, &mut ctx);
        }
        bus.write(0x004304, 0x7E, &mut ctx);
        bus.write(0x004305, 4, &mut ctx);
        bus.write(0x004306, 0, &mut ctx);
        bus.write(0x00420B, 1, &mut ctx);

        let before = ctx.timing.now();
        bus.process_mdma(&mut ctx);
        assert_eq!(ctx.timing.now() - before, 8 + 8 + 4 * 8);
        assert_eq!(
            ctx.ppu_writes,
            [(0x2118, 0x10), (0x2119, 0x11), (0x2118, 0x12), (0x2119, 0x13)]
        );
    }

    #[test]
    fn apu_ports_mirror_every_four() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        assert_eq!(bus.read(0x002141, &mut ctx), 0xA1);
        assert_eq!(bus.read(0x002175, &mut ctx), 0xA1);
        bus.write(0x002143, 9, &mut ctx);
        assert_eq!(ctx.apu_writes, [(3, 9)]);
    }

    #[test]
    fn wram_port_streams() {
        let mut bus = lorom_bus();
        let mut ctx = TestContext::default();
        bus.write(0x002181, 0x00, &mut ctx);
        bus.write(0x002182, 0x20, &mut ctx);
        bus.write(0x002183, 0x01, &mut ctx);
        bus.write(0x002180, 0xAB, &mut ctx);
        bus.write(0x002180, 0xCD, &mut ctx);
        assert_eq!(bus.read(0x7F2000, &mut ctx), 0xAB);
        assert_eq!(bus.read(0x7F2001, &mut ctx), 0xCD);
    }
}

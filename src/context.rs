use crate::config::Config;
use crate::{apu, bus, counter, cpu, interrupt, ppu};

// Components are nested so that each one can be handed a mutable view of
// everything below it while being borrowed itself.
pub struct Context {
    pub(crate) cpu: cpu::Cpu,
    pub(crate) inner1: Inner1,
}

pub struct Inner1 {
    pub(crate) bus: bus::Bus,
    pub(crate) inner2: Inner2,
}

pub struct Inner2 {
    pub(crate) ppu: ppu::PpuSync<ppu::Ppu>,
    pub(crate) apu: apu::Apu,
    pub(crate) inner3: Inner3,
}

pub struct Inner3 {
    pub(crate) timing: counter::Counter,
    pub(crate) interrupt: interrupt::Interrupt,
}

impl Context {
    pub fn new(bus: bus::Bus, config: &Config) -> Context {
        Context {
            cpu: cpu::Cpu::new(config.execution_mode),
            inner1: Inner1 {
                bus,
                inner2: Inner2 {
                    ppu: ppu::PpuSync::new(ppu::Ppu::default(), config.ppu_queue_capacity),
                    apu: apu::Apu::new(config.spc_sync_threshold, config.apu_queue_capacity),
                    inner3: Inner3 {
                        timing: counter::Counter::default(),
                        interrupt: interrupt::Interrupt::default(),
                    },
                },
            },
        }
    }

    pub fn execute(&mut self, cycles: i64) -> i64 {
        self.cpu.execute(&mut self.inner1, cycles)
    }

    pub fn execute_one(&mut self) {
        self.cpu.execute_one(&mut self.inner1)
    }

    pub fn reset(&mut self) {
        self.inner1.inner2.apu.reset();
        self.cpu.reset(&mut self.inner1)
    }
}

pub trait Bus {
    fn bus_read(&mut self, addr: u32) -> u8;
    fn bus_write(&mut self, addr: u32, data: u8);
}

pub trait Dma {
    fn process_mdma(&mut self);
}

pub trait Timing {
    fn elapse(&mut self, clock: u64);
    fn now(&self) -> u64;
    fn line(&self) -> u16;
    fn line_cycle(&self) -> u64;
}

pub trait Budget {
    fn budget(&self) -> i64;
    fn begin(&mut self, cycles: i64);
    fn end(&mut self) -> i64;
    fn restore(&mut self) -> bool;
}

pub trait Signals {
    fn signals(&self) -> u8;
    fn clear_signals(&mut self, mask: u8);
    fn signal_irq(&mut self, enable: bool);
    fn signal_nmi(&mut self, enable: bool);
    fn signal_dma(&mut self, enable: bool);
    fn signal_reset(&mut self, enable: bool);
    fn interrupt(&mut self) -> &mut interrupt::Interrupt;
}

pub trait Ppu {
    fn ppu_read(&mut self, addr: u16) -> u8;
    fn ppu_write(&mut self, addr: u16, data: u8);
    fn ppu_latch_counters(&mut self);
}

pub trait Apu {
    fn apu_read(&mut self, port: usize) -> u8;
    fn apu_write(&mut self, port: usize, data: u8);
}

impl Bus for Inner1 {
    fn bus_read(&mut self, addr: u32) -> u8 {
        self.bus.read(addr, &mut self.inner2)
    }

    fn bus_write(&mut self, addr: u32, data: u8) {
        self.bus.write(addr, data, &mut self.inner2)
    }
}

impl Dma for Inner1 {
    fn process_mdma(&mut self) {
        self.bus.process_mdma(&mut self.inner2)
    }
}

impl Timing for Inner1 {
    fn elapse(&mut self, clock: u64) {
        self.inner2.elapse(clock)
    }
    fn now(&self) -> u64 {
        self.inner2.now()
    }
    fn line(&self) -> u16 {
        self.inner2.line()
    }
    fn line_cycle(&self) -> u64 {
        self.inner2.line_cycle()
    }
}

impl Budget for Inner1 {
    fn budget(&self) -> i64 {
        self.inner2.budget()
    }
    fn begin(&mut self, cycles: i64) {
        self.inner2.begin(cycles)
    }
    fn end(&mut self) -> i64 {
        self.inner2.end()
    }
    fn restore(&mut self) -> bool {
        self.inner2.restore()
    }
}

impl Signals for Inner1 {
    fn signals(&self) -> u8 {
        self.inner2.signals()
    }
    fn clear_signals(&mut self, mask: u8) {
        self.inner2.clear_signals(mask)
    }
    fn signal_irq(&mut self, enable: bool) {
        self.inner2.signal_irq(enable)
    }
    fn signal_nmi(&mut self, enable: bool) {
        self.inner2.signal_nmi(enable)
    }
    fn signal_dma(&mut self, enable: bool) {
        self.inner2.signal_dma(enable)
    }
    fn signal_reset(&mut self, enable: bool) {
        self.inner2.signal_reset(enable)
    }
    fn interrupt(&mut self) -> &mut interrupt::Interrupt {
        self.inner2.interrupt()
    }
}

impl Ppu for Inner2 {
    fn ppu_read(&mut self, addr: u16) -> u8 {
        let now = self.inner3.now();
        let (h, v) = self.inner3.hv();
        self.ppu.read(addr, now, h, v)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        let now = self.inner3.now();
        self.ppu.write(addr, data, now)
    }

    fn ppu_latch_counters(&mut self) {
        let now = self.inner3.now();
        let (h, v) = self.inner3.hv();
        self.ppu.latch(now, h, v)
    }
}

impl Apu for Inner2 {
    fn apu_read(&mut self, port: usize) -> u8 {
        let now = self.inner3.now();
        self.apu.read_port(port, now)
    }

    fn apu_write(&mut self, port: usize, data: u8) {
        let now = self.inner3.now();
        self.apu.write_port(port, data, now)
    }
}

impl Timing for Inner2 {
    fn elapse(&mut self, clock: u64) {
        self.inner3.elapse(clock)
    }
    fn now(&self) -> u64 {
        self.inner3.now()
    }
    fn line(&self) -> u16 {
        self.inner3.line()
    }
    fn line_cycle(&self) -> u64 {
        self.inner3.line_cycle()
    }
}

impl Budget for Inner2 {
    fn budget(&self) -> i64 {
        self.inner3.budget()
    }
    fn begin(&mut self, cycles: i64) {
        self.inner3.begin(cycles)
    }
    fn end(&mut self) -> i64 {
        self.inner3.end()
    }
    fn restore(&mut self) -> bool {
        self.inner3.restore()
    }
}

impl Signals for Inner2 {
    fn signals(&self) -> u8 {
        self.inner3.signals()
    }
    fn clear_signals(&mut self, mask: u8) {
        self.inner3.clear_signals(mask)
    }
    fn signal_irq(&mut self, enable: bool) {
        self.inner3.signal_irq(enable)
    }
    fn signal_nmi(&mut self, enable: bool) {
        self.inner3.signal_nmi(enable)
    }
    fn signal_dma(&mut self, enable: bool) {
        self.inner3.signal_dma(enable)
    }
    fn signal_reset(&mut self, enable: bool) {
        self.inner3.signal_reset(enable)
    }
    fn interrupt(&mut self) -> &mut interrupt::Interrupt {
        self.inner3.interrupt()
    }
}

impl Inner3 {
    /// Dot position for the H/V latch: one dot is 4 master cycles.
    fn hv(&self) -> (u16, u16) {
        ((self.timing.line_cycle() / 4) as u16, self.timing.line())
    }
}

impl Timing for Inner3 {
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

impl Budget for Inner3 {
    fn budget(&self) -> i64 {
        self.timing.budget()
    }
    fn begin(&mut self, cycles: i64) {
        self.timing.begin(cycles)
    }
    fn end(&mut self) -> i64 {
        self.timing.end()
    }
    fn restore(&mut self) -> bool {
        self.timing.restore()
    }
}

// Raising a line while the CPU is inside `execute` cuts its budget short so
// the signal is looked at before the next instruction.
impl Signals for Inner3 {
    fn signals(&self) -> u8 {
        self.interrupt.signals()
    }
    fn clear_signals(&mut self, mask: u8) {
        self.interrupt.clear(mask)
    }
    fn signal_irq(&mut self, enable: bool) {
        if self.interrupt.signal_irq(enable) {
            self.timing.abort();
        }
    }
    fn signal_nmi(&mut self, enable: bool) {
        if self.interrupt.signal_nmi(enable) {
            self.timing.abort();
        }
    }
    fn signal_dma(&mut self, enable: bool) {
        if self.interrupt.signal_dma(enable) {
            self.timing.abort();
        }
    }
    fn signal_reset(&mut self, enable: bool) {
        if self.interrupt.signal_reset(enable) {
            self.timing.abort();
        }
    }
    fn interrupt(&mut self) -> &mut interrupt::Interrupt {
        &mut self.interrupt
    }
}

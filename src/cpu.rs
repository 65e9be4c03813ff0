use log::{debug, trace};

use crate::context;
use crate::interrupt::signal;
use crate::register::Reg16;

pub trait Context:
    context::Bus + context::Dma + context::Timing + context::Budget + context::Signals
{
}
impl<T> Context for T where
    T: context::Bus + context::Dma + context::Timing + context::Budget + context::Signals
{
}

// Master cycles for one internal operation
const CPU_CYCLE: u64 = 6;
const RESET_CYCLES: u64 = 170;
const RESET_VECTOR: u32 = 0xFFFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Normal,
    /// One instruction per dispatch with a trace line each; stops the frame
    /// when the 24-bit PC reaches `breakpoint`.
    SingleStepDebug { breakpoint: Option<u32> },
}

trait ExecutionStrategy {
    fn run<C: Context>(&self, cpu: &mut Cpu, ctx: &mut C);
}

struct Normal;

impl ExecutionStrategy for Normal {
    fn run<C: Context>(&self, cpu: &mut Cpu, ctx: &mut C) {
        while ctx.budget() > 0 && !cpu.interrupt_pending(&*ctx) {
            if cpu.is_idle() {
                cpu.idle(ctx);
                break;
            }
            cpu.step(ctx);
        }
    }
}

struct SingleStepDebug {
    breakpoint: Option<u32>,
}

impl ExecutionStrategy for SingleStepDebug {
    fn run<C: Context>(&self, cpu: &mut Cpu, ctx: &mut C) {
        if ctx.budget() <= 0 || cpu.interrupt_pending(&*ctx) {
            return;
        }
        if cpu.is_idle() {
            cpu.idle(ctx);
            return;
        }
        trace!("{}", cpu.trace_line(ctx.now()));
        cpu.step(ctx);
        if self.breakpoint == Some(cpu.pc24()) {
            debug!("Breakpoint at {:06X}", cpu.pc24());
            cpu.breakpoint_hit = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuRegisters {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub s: u16,
    pub d: u16,
    pub pc: u16,
    pub pb: u8,
    pub db: u8,
    pub p: u8,
    pub e: bool,
}

pub struct Cpu {
    a: Reg16,
    x: Reg16,
    y: Reg16,
    s: Reg16,
    d: Reg16,
    pc: u16,
    pb: u8,
    db: u8,
    p: Status,
    e: bool,

    waiting: bool,
    stopped: bool,

    mode: ExecutionMode,
    breakpoint_hit: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new(ExecutionMode::Normal)
    }
}

#[derive(Debug, Clone, Copy)]
struct Status {
    c: bool,
    z: bool,
    i: bool,
    d: bool,
    x: bool,
    m: bool,
    v: bool,
    n: bool,
}

impl From<u8> for Status {
    fn from(data: u8) -> Self {
        Status {
            c: data & 1 == 1,
            z: (data >> 1) & 1 == 1,
            i: (data >> 2) & 1 == 1,
            d: (data >> 3) & 1 == 1,
            x: (data >> 4) & 1 == 1,
            m: (data >> 5) & 1 == 1,
            v: (data >> 6) & 1 == 1,
            n: (data >> 7) & 1 == 1,
        }
    }
}

impl From<Status> for u8 {
    fn from(p: Status) -> u8 {
        p.c as u8
            | (p.z as u8) << 1
            | (p.i as u8) << 2
            | (p.d as u8) << 3
            | (p.x as u8) << 4
            | (p.m as u8) << 5
            | (p.v as u8) << 6
            | (p.n as u8) << 7
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::from(0x34)
    }
}

#[derive(Debug, Clone, Copy)]
enum Wrap {
    // Emulation-mode direct page
    Page,
    // Bank 0 stack and native direct page
    Bank,
    Linear,
}

#[derive(Debug, Clone, Copy)]
struct WrapAddress {
    addr: u32,
    wrap: Wrap,
}

impl WrapAddress {
    fn linear(addr: u32) -> WrapAddress {
        WrapAddress {
            addr: addr & 0xFFFFFF,
            wrap: Wrap::Linear,
        }
    }

    fn bank(addr: u32) -> WrapAddress {
        WrapAddress {
            addr,
            wrap: Wrap::Bank,
        }
    }

    fn offset(self, offset: u16) -> WrapAddress {
        let addr = match self.wrap {
            Wrap::Page => self.addr & 0xFFFF00 | (self.addr as u8).wrapping_add(offset as u8) as u32,
            Wrap::Bank => self.addr & 0xFF0000 | (self.addr as u16).wrapping_add(offset) as u32,
            Wrap::Linear => (self.addr + offset as u32) & 0xFFFFFF,
        };
        WrapAddress { addr, ..self }
    }

    fn read_8(self, ctx: &mut impl Context) -> u8 {
        ctx.bus_read(self.addr)
    }

    fn read_16(self, ctx: &mut impl Context) -> u16 {
        let lo = ctx.bus_read(self.addr) as u16;
        let hi = ctx.bus_read(self.offset(1).addr) as u16;
        hi << 8 | lo
    }

    fn read_24(self, ctx: &mut impl Context) -> u32 {
        let lo = ctx.bus_read(self.addr) as u32;
        let hi = ctx.bus_read(self.offset(1).addr) as u32;
        let bank = ctx.bus_read(self.offset(2).addr) as u32;
        bank << 16 | hi << 8 | lo
    }

    fn read(self, ctx: &mut impl Context, wide: bool) -> u16 {
        if wide {
            self.read_16(ctx)
        } else {
            self.read_8(ctx) as u16
        }
    }

    fn write(self, ctx: &mut impl Context, data: u16, wide: bool) {
        ctx.bus_write(self.addr, data as u8);
        if wide {
            ctx.bus_write(self.offset(1).addr, (data >> 8) as u8);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Exception {
    Cop,
    Brk,
    Nmi,
    Irq,
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum AddressingMode {
    Immediate,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteLong,
    AbsoluteLongX,
    Direct,
    DirectX,
    DirectY,
    DirectIndirect,
    DirectIndexedIndirect,
    DirectIndirectIndexedY,
    DirectIndirectLong,
    DirectIndirectLongY,
    StackRelative,
    StackRelativeIndirectIndexed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AluType {
    Or,
    And,
    Xor,
    Add,
    Sub,
    Cmp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rmw {
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    Tsb,
    Trb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Register {
    A,
    X,
    Y,
}

impl Cpu {
    pub fn new(mode: ExecutionMode) -> Cpu {
        Cpu {
            a: Reg16::default(),
            x: Reg16::default(),
            y: Reg16::default(),
            s: Reg16::new(0x01FF),
            d: Reg16::default(),
            pc: 0,
            pb: 0,
            db: 0,
            p: Status::default(),
            e: true,
            waiting: false,
            stopped: false,
            mode,
            breakpoint_hit: false,
        }
    }

    pub fn reset(&mut self, ctx: &mut impl Context) {
        self.s = Reg16::new(0x01FF);
        self.d = Reg16::default();
        self.db = 0;
        self.pb = 0;
        self.p = Status::default();
        self.set_e(true);
        self.waiting = false;
        self.stopped = false;
        self.pc = WrapAddress::linear(RESET_VECTOR).read_16(ctx);
        ctx.elapse(RESET_CYCLES);
        debug!("CPU reset, PC = {:04X}", self.pc);
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn breakpoint_hit(&self) -> bool {
        self.breakpoint_hit
    }

    pub fn registers(&self) -> CpuRegisters {
        CpuRegisters {
            a: self.a.word(),
            x: self.x.word(),
            y: self.y.word(),
            s: self.s.word(),
            d: self.d.word(),
            pc: self.pc,
            pb: self.pb,
            db: self.db,
            p: self.p.into(),
            e: self.e,
        }
    }

    /// Loads every register as given. No mode fixups are applied.
    pub fn set_registers(&mut self, regs: &CpuRegisters) {
        self.a.set_word(regs.a);
        self.x.set_word(regs.x);
        self.y.set_word(regs.y);
        self.s.set_word(regs.s);
        self.d.set_word(regs.d);
        self.pc = regs.pc;
        self.pb = regs.pb;
        self.db = regs.db;
        self.p = Status::from(regs.p);
        self.e = regs.e;
    }

    pub fn pc24(&self) -> u32 {
        (self.pb as u32) << 16 | self.pc as u32
    }

    /// Runs for `cycles` master cycles and returns what is left; negative
    /// when the last instruction overshot.
    pub fn execute(&mut self, ctx: &mut impl Context, cycles: i64) -> i64 {
        ctx.begin(cycles);
        self.breakpoint_hit = false;
        loop {
            self.service_signals(ctx);
            if ctx.budget() <= 0 && !ctx.restore() {
                break;
            }
            if ctx.budget() > 0 {
                self.run(ctx);
                if self.breakpoint_hit {
                    break;
                }
            }
        }
        ctx.end()
    }

    pub fn execute_one(&mut self, ctx: &mut impl Context) {
        self.service_signals(ctx);
        self.step(ctx);
    }

    fn run<C: Context>(&mut self, ctx: &mut C) {
        let mode = self.mode;
        match mode {
            ExecutionMode::Normal => Normal.run(self, ctx),
            ExecutionMode::SingleStepDebug { breakpoint } => {
                SingleStepDebug { breakpoint }.run(self, ctx)
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.waiting || self.stopped
    }

    fn idle(&mut self, ctx: &mut impl Context) {
        let budget = ctx.budget();
        if budget > 0 {
            ctx.elapse(budget as u64);
        }
    }

    fn interrupt_pending(&self, ctx: &impl Context) -> bool {
        let s = ctx.signals();
        s & (signal::RESET | signal::DMA | signal::NMI_EDGE) != 0
            || (s & signal::IRQ != 0 && !self.stopped && (!self.p.i || self.waiting))
    }

    fn service_signals(&mut self, ctx: &mut impl Context) {
        let s = ctx.signals();
        if s & signal::RESET != 0 {
            ctx.clear_signals(signal::RESET);
            self.reset(ctx);
            return;
        }
        if s & signal::DMA != 0 {
            ctx.clear_signals(signal::DMA);
            ctx.process_mdma();
        }
        if s & signal::NMI_EDGE != 0 {
            ctx.clear_signals(signal::NMI_EDGE);
            if !self.stopped {
                // NMI is taken after the next instruction
                if !self.waiting {
                    self.step(ctx);
                }
                ctx.elapse(CPU_CYCLE * 2);
                self.exception(Exception::Nmi, ctx);
            }
        } else if s & signal::IRQ != 0 && !self.stopped {
            if !self.p.i {
                ctx.elapse(CPU_CYCLE * 2);
                self.exception(Exception::Irq, ctx);
            } else if self.waiting {
                self.waiting = false;
            }
        }
    }

    fn step(&mut self, ctx: &mut impl Context) {
        if self.is_idle() {
            ctx.elapse(CPU_CYCLE);
            return;
        }
        let opcode = self.fetch_8(ctx);
        self.dispatch(opcode, ctx);
    }

    fn trace_line(&self, now: u64) -> String {
        let p = u8::from(self.p);
        let flags: String = "NVMXDIZC"
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if p & (0x80 >> i) != 0 {
                    c
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect();
        format!(
            "{now:>12} {:06X} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} D:{:04X} DB:{:02X} {flags} E:{}",
            self.pc24(),
            self.a.word(),
            self.x.word(),
            self.y.word(),
            self.s.word(),
            self.d.word(),
            self.db,
            self.e as u8,
        )
    }

    fn fetch_8(&mut self, ctx: &mut impl Context) -> u8 {
        let data = ctx.bus_read(self.pc24());
        self.pc = self.pc.wrapping_add(1);
        data
    }

    fn fetch_16(&mut self, ctx: &mut impl Context) -> u16 {
        let lo = self.fetch_8(ctx) as u16;
        let hi = self.fetch_8(ctx) as u16;
        hi << 8 | lo
    }

    fn fetch_24(&mut self, ctx: &mut impl Context) -> u32 {
        let lo = self.fetch_16(ctx) as u32;
        let bank = self.fetch_8(ctx) as u32;
        bank << 16 | lo
    }

    fn push_8(&mut self, ctx: &mut impl Context, data: u8) {
        ctx.bus_write(self.s.word() as u32, data);
        if self.e {
            self.s.set_low(self.s.low().wrapping_sub(1));
        } else {
            self.s.set_word(self.s.word().wrapping_sub(1));
        }
    }

    fn push_16(&mut self, ctx: &mut impl Context, data: u16) {
        self.push_8(ctx, (data >> 8) as u8);
        self.push_8(ctx, data as u8);
    }

    fn pop_8(&mut self, ctx: &mut impl Context) -> u8 {
        if self.e {
            self.s.set_low(self.s.low().wrapping_add(1));
        } else {
            self.s.set_word(self.s.word().wrapping_add(1));
        }
        ctx.bus_read(self.s.word() as u32)
    }

    fn pop_16(&mut self, ctx: &mut impl Context) -> u16 {
        let lo = self.pop_8(ctx) as u16;
        let hi = self.pop_8(ctx) as u16;
        hi << 8 | lo
    }

    fn m8(&self) -> bool {
        self.e || self.p.m
    }

    fn x8(&self) -> bool {
        self.e || self.p.x
    }

    fn set_e(&mut self, e: bool) {
        self.e = e;
        if e {
            self.p.m = true;
            self.p.x = true;
            self.s.set_high(0x01);
        }
        if self.p.x {
            self.x.set_high(0);
            self.y.set_high(0);
        }
    }

    /// Clearing X is harmless, setting it drops the index high bytes.
    fn set_p(&mut self, data: u8) {
        self.p = Status::from(data);
        if self.e {
            self.p.m = true;
            self.p.x = true;
        }
        if self.p.x {
            self.x.set_high(0);
            self.y.set_high(0);
        }
    }

    fn set_nz(&mut self, data: u16, wide: bool) {
        if wide {
            self.p.n = data & 0x8000 != 0;
            self.p.z = data == 0;
        } else {
            self.p.n = data & 0x80 != 0;
            self.p.z = data & 0xFF == 0;
        }
    }

    fn is_wide(&self, reg: Register) -> bool {
        match reg {
            Register::A => !self.m8(),
            Register::X | Register::Y => !self.x8(),
        }
    }

    fn get(&self, reg: Register) -> u16 {
        let r = match reg {
            Register::A => self.a,
            Register::X => self.x,
            Register::Y => self.y,
        };
        if self.is_wide(reg) {
            r.word()
        } else {
            r.low() as u16
        }
    }

    fn set(&mut self, reg: Register, data: u16) {
        let wide = self.is_wide(reg);
        match reg {
            Register::A if wide => self.a.set_word(data),
            Register::A => self.a.set_low(data as u8),
            Register::X => self.x.set_word(if wide { data } else { data & 0xFF }),
            Register::Y => self.y.set_word(if wide { data } else { data & 0xFF }),
        }
        self.set_nz(data, wide);
    }

    fn exception(&mut self, exception: Exception, ctx: &mut impl Context) {
        debug!("Exception: {:?} at {:06X}", exception, self.pc24());
        self.waiting = false;
        if !self.e {
            self.push_8(ctx, self.pb);
        }
        self.push_16(ctx, self.pc);
        let mut p = u8::from(self.p);
        if self.e {
            // B flag only distinguishes BRK from IRQ in emulation mode
            p = if exception == Exception::Brk {
                p | 0x10
            } else {
                p & !0x10
            };
        }
        self.push_8(ctx, p);
        self.p.i = true;
        self.p.d = false;
        self.pb = 0;
        self.pc = WrapAddress::linear(self.vector(exception)).read_16(ctx);
    }

    fn vector(&self, exception: Exception) -> u32 {
        match (exception, self.e) {
            (Exception::Cop, false) => 0xFFE4,
            (Exception::Brk, false) => 0xFFE6,
            (Exception::Nmi, false) => 0xFFEA,
            (Exception::Irq, false) => 0xFFEE,
            (Exception::Cop, true) => 0xFFF4,
            (Exception::Nmi, true) => 0xFFFA,
            (Exception::Brk | Exception::Irq, true) => 0xFFFE,
        }
    }

    fn direct(&mut self, ctx: &mut impl Context, index: u16) -> WrapAddress {
        let offset = self.fetch_8(ctx) as u16;
        if self.d.low() != 0 {
            ctx.elapse(CPU_CYCLE);
        }
        let wrap = if self.e && self.d.low() == 0 {
            Wrap::Page
        } else {
            Wrap::Bank
        };
        WrapAddress {
            addr: self.d.word() as u32,
            wrap,
        }
        .offset(offset)
        .offset(index)
    }

    fn indexed(&mut self, ctx: &mut impl Context, base: u16, index: u16, write: bool) -> WrapAddress {
        let crossed = base & 0xFF00 != base.wrapping_add(index) & 0xFF00;
        if write || !self.x8() || crossed {
            ctx.elapse(CPU_CYCLE);
        }
        WrapAddress::linear((self.db as u32) << 16 | base as u32).offset(index)
    }

    fn address(&mut self, ctx: &mut impl Context, mode: AddressingMode, write: bool) -> WrapAddress {
        match mode {
            // Immediate operands are read by `operand`
            AddressingMode::Immediate => WrapAddress::bank(self.pc24()),
            AddressingMode::Absolute => {
                let addr = self.fetch_16(ctx);
                WrapAddress::linear((self.db as u32) << 16 | addr as u32)
            }
            AddressingMode::AbsoluteX => {
                let base = self.fetch_16(ctx);
                self.indexed(ctx, base, self.x.word(), write)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_16(ctx);
                self.indexed(ctx, base, self.y.word(), write)
            }
            AddressingMode::AbsoluteLong => WrapAddress::linear(self.fetch_24(ctx)),
            AddressingMode::AbsoluteLongX => {
                WrapAddress::linear(self.fetch_24(ctx)).offset(self.x.word())
            }
            AddressingMode::Direct => self.direct(ctx, 0),
            AddressingMode::DirectX => {
                let addr = self.direct(ctx, self.x.word());
                ctx.elapse(CPU_CYCLE);
                addr
            }
            AddressingMode::DirectY => {
                let addr = self.direct(ctx, self.y.word());
                ctx.elapse(CPU_CYCLE);
                addr
            }
            AddressingMode::DirectIndirect => {
                let ptr = self.direct(ctx, 0).read_16(ctx);
                WrapAddress::linear((self.db as u32) << 16 | ptr as u32)
            }
            AddressingMode::DirectIndexedIndirect => {
                let addr = self.direct(ctx, self.x.word());
                ctx.elapse(CPU_CYCLE);
                let ptr = addr.read_16(ctx);
                WrapAddress::linear((self.db as u32) << 16 | ptr as u32)
            }
            AddressingMode::DirectIndirectIndexedY => {
                let ptr = self.direct(ctx, 0).read_16(ctx);
                self.indexed(ctx, ptr, self.y.word(), write)
            }
            AddressingMode::DirectIndirectLong => {
                WrapAddress::linear(self.direct(ctx, 0).read_24(ctx))
            }
            AddressingMode::DirectIndirectLongY => {
                let ptr = self.direct(ctx, 0).read_24(ctx);
                WrapAddress::linear(ptr).offset(self.y.word())
            }
            AddressingMode::StackRelative => {
                let offset = self.fetch_8(ctx) as u16;
                ctx.elapse(CPU_CYCLE);
                WrapAddress::bank(self.s.word().wrapping_add(offset) as u32)
            }
            AddressingMode::StackRelativeIndirectIndexed => {
                let offset = self.fetch_8(ctx) as u16;
                ctx.elapse(CPU_CYCLE);
                let ptr = WrapAddress::bank(self.s.word().wrapping_add(offset) as u32).read_16(ctx);
                ctx.elapse(CPU_CYCLE);
                WrapAddress::linear((self.db as u32) << 16 | ptr as u32).offset(self.y.word())
            }
        }
    }

    fn operand(&mut self, ctx: &mut impl Context, mode: AddressingMode, wide: bool) -> u16 {
        if mode == AddressingMode::Immediate {
            if wide {
                self.fetch_16(ctx)
            } else {
                self.fetch_8(ctx) as u16
            }
        } else {
            self.address(ctx, mode, false).read(ctx, wide)
        }
    }

    fn dispatch(&mut self, opcode: u8, ctx: &mut impl Context) {
        use AddressingMode::*;
        match opcode {
            0x00 => self.software_interrupt(ctx, Exception::Brk),
            0x01 => self.alu(ctx, AluType::Or, DirectIndexedIndirect),
            0x02 => self.software_interrupt(ctx, Exception::Cop),
            0x03 => self.alu(ctx, AluType::Or, StackRelative),
            0x04 => self.modify(ctx, Rmw::Tsb, Direct),
            0x05 => self.alu(ctx, AluType::Or, Direct),
            0x06 => self.modify(ctx, Rmw::Asl, Direct),
            0x07 => self.alu(ctx, AluType::Or, DirectIndirectLong),
            0x08 => self.php(ctx),
            0x09 => self.alu(ctx, AluType::Or, Immediate),
            0x0A => self.modify_a(ctx, Rmw::Asl),
            0x0B => self.phd(ctx),
            0x0C => self.modify(ctx, Rmw::Tsb, Absolute),
            0x0D => self.alu(ctx, AluType::Or, Absolute),
            0x0E => self.modify(ctx, Rmw::Asl, Absolute),
            0x0F => self.alu(ctx, AluType::Or, AbsoluteLong),

            0x10 => self.branch(ctx, !self.p.n),
            0x11 => self.alu(ctx, AluType::Or, DirectIndirectIndexedY),
            0x12 => self.alu(ctx, AluType::Or, DirectIndirect),
            0x13 => self.alu(ctx, AluType::Or, StackRelativeIndirectIndexed),
            0x14 => self.modify(ctx, Rmw::Trb, Direct),
            0x15 => self.alu(ctx, AluType::Or, DirectX),
            0x16 => self.modify(ctx, Rmw::Asl, DirectX),
            0x17 => self.alu(ctx, AluType::Or, DirectIndirectLongY),
            0x18 => self.set_flag(ctx, |p| p.c = false),
            0x19 => self.alu(ctx, AluType::Or, AbsoluteY),
            0x1A => self.modify_a(ctx, Rmw::Inc),
            0x1B => self.tcs(ctx),
            0x1C => self.modify(ctx, Rmw::Trb, Absolute),
            0x1D => self.alu(ctx, AluType::Or, AbsoluteX),
            0x1E => self.modify(ctx, Rmw::Asl, AbsoluteX),
            0x1F => self.alu(ctx, AluType::Or, AbsoluteLongX),

            0x20 => self.jsr_abs(ctx),
            0x21 => self.alu(ctx, AluType::And, DirectIndexedIndirect),
            0x22 => self.jsl(ctx),
            0x23 => self.alu(ctx, AluType::And, StackRelative),
            0x24 => self.bit(ctx, Direct),
            0x25 => self.alu(ctx, AluType::And, Direct),
            0x26 => self.modify(ctx, Rmw::Rol, Direct),
            0x27 => self.alu(ctx, AluType::And, DirectIndirectLong),
            0x28 => self.plp(ctx),
            0x29 => self.alu(ctx, AluType::And, Immediate),
            0x2A => self.modify_a(ctx, Rmw::Rol),
            0x2B => self.pld(ctx),
            0x2C => self.bit(ctx, Absolute),
            0x2D => self.alu(ctx, AluType::And, Absolute),
            0x2E => self.modify(ctx, Rmw::Rol, Absolute),
            0x2F => self.alu(ctx, AluType::And, AbsoluteLong),

            0x30 => self.branch(ctx, self.p.n),
            0x31 => self.alu(ctx, AluType::And, DirectIndirectIndexedY),
            0x32 => self.alu(ctx, AluType::And, DirectIndirect),
            0x33 => self.alu(ctx, AluType::And, StackRelativeIndirectIndexed),
            0x34 => self.bit(ctx, DirectX),
            0x35 => self.alu(ctx, AluType::And, DirectX),
            0x36 => self.modify(ctx, Rmw::Rol, DirectX),
            0x37 => self.alu(ctx, AluType::And, DirectIndirectLongY),
            0x38 => self.set_flag(ctx, |p| p.c = true),
            0x39 => self.alu(ctx, AluType::And, AbsoluteY),
            0x3A => self.modify_a(ctx, Rmw::Dec),
            0x3B => self.tsc(ctx),
            0x3C => self.bit(ctx, AbsoluteX),
            0x3D => self.alu(ctx, AluType::And, AbsoluteX),
            0x3E => self.modify(ctx, Rmw::Rol, AbsoluteX),
            0x3F => self.alu(ctx, AluType::And, AbsoluteLongX),

            0x40 => self.rti(ctx),
            0x41 => self.alu(ctx, AluType::Xor, DirectIndexedIndirect),
            0x42 => self.wdm(ctx),
            0x43 => self.alu(ctx, AluType::Xor, StackRelative),
            0x44 => self.block_move(ctx, false),
            0x45 => self.alu(ctx, AluType::Xor, Direct),
            0x46 => self.modify(ctx, Rmw::Lsr, Direct),
            0x47 => self.alu(ctx, AluType::Xor, DirectIndirectLong),
            0x48 => self.push_reg(ctx, Register::A),
            0x49 => self.alu(ctx, AluType::Xor, Immediate),
            0x4A => self.modify_a(ctx, Rmw::Lsr),
            0x4B => self.phk(ctx),
            0x4C => self.jmp_abs(ctx),
            0x4D => self.alu(ctx, AluType::Xor, Absolute),
            0x4E => self.modify(ctx, Rmw::Lsr, Absolute),
            0x4F => self.alu(ctx, AluType::Xor, AbsoluteLong),

            0x50 => self.branch(ctx, !self.p.v),
            0x51 => self.alu(ctx, AluType::Xor, DirectIndirectIndexedY),
            0x52 => self.alu(ctx, AluType::Xor, DirectIndirect),
            0x53 => self.alu(ctx, AluType::Xor, StackRelativeIndirectIndexed),
            0x54 => self.block_move(ctx, true),
            0x55 => self.alu(ctx, AluType::Xor, DirectX),
            0x56 => self.modify(ctx, Rmw::Lsr, DirectX),
            0x57 => self.alu(ctx, AluType::Xor, DirectIndirectLongY),
            0x58 => self.set_flag(ctx, |p| p.i = false),
            0x59 => self.alu(ctx, AluType::Xor, AbsoluteY),
            0x5A => self.push_reg(ctx, Register::Y),
            0x5B => self.tcd(ctx),
            0x5C => self.jmp_long(ctx),
            0x5D => self.alu(ctx, AluType::Xor, AbsoluteX),
            0x5E => self.modify(ctx, Rmw::Lsr, AbsoluteX),
            0x5F => self.alu(ctx, AluType::Xor, AbsoluteLongX),

            0x60 => self.rts(ctx),
            0x61 => self.alu(ctx, AluType::Add, DirectIndexedIndirect),
            0x62 => self.per(ctx),
            0x63 => self.alu(ctx, AluType::Add, StackRelative),
            0x64 => self.store(ctx, None, Direct),
            0x65 => self.alu(ctx, AluType::Add, Direct),
            0x66 => self.modify(ctx, Rmw::Ror, Direct),
            0x67 => self.alu(ctx, AluType::Add, DirectIndirectLong),
            0x68 => self.pull_reg(ctx, Register::A),
            0x69 => self.alu(ctx, AluType::Add, Immediate),
            0x6A => self.modify_a(ctx, Rmw::Ror),
            0x6B => self.rtl(ctx),
            0x6C => self.jmp_indirect(ctx),
            0x6D => self.alu(ctx, AluType::Add, Absolute),
            0x6E => self.modify(ctx, Rmw::Ror, Absolute),
            0x6F => self.alu(ctx, AluType::Add, AbsoluteLong),

            0x70 => self.branch(ctx, self.p.v),
            0x71 => self.alu(ctx, AluType::Add, DirectIndirectIndexedY),
            0x72 => self.alu(ctx, AluType::Add, DirectIndirect),
            0x73 => self.alu(ctx, AluType::Add, StackRelativeIndirectIndexed),
            0x74 => self.store(ctx, None, DirectX),
            0x75 => self.alu(ctx, AluType::Add, DirectX),
            0x76 => self.modify(ctx, Rmw::Ror, DirectX),
            0x77 => self.alu(ctx, AluType::Add, DirectIndirectLongY),
            0x78 => self.set_flag(ctx, |p| p.i = true),
            0x79 => self.alu(ctx, AluType::Add, AbsoluteY),
            0x7A => self.pull_reg(ctx, Register::Y),
            0x7B => self.tdc(ctx),
            0x7C => self.jmp_indexed_indirect(ctx),
            0x7D => self.alu(ctx, AluType::Add, AbsoluteX),
            0x7E => self.modify(ctx, Rmw::Ror, AbsoluteX),
            0x7F => self.alu(ctx, AluType::Add, AbsoluteLongX),

            0x80 => self.branch(ctx, true),
            0x81 => self.store(ctx, Some(Register::A), DirectIndexedIndirect),
            0x82 => self.brl(ctx),
            0x83 => self.store(ctx, Some(Register::A), StackRelative),
            0x84 => self.store(ctx, Some(Register::Y), Direct),
            0x85 => self.store(ctx, Some(Register::A), Direct),
            0x86 => self.store(ctx, Some(Register::X), Direct),
            0x87 => self.store(ctx, Some(Register::A), DirectIndirectLong),
            0x88 => self.step_reg(ctx, Register::Y, 0xFFFF),
            0x89 => self.bit(ctx, Immediate),
            0x8A => self.transfer(ctx, Register::X, Register::A),
            0x8B => self.phb(ctx),
            0x8C => self.store(ctx, Some(Register::Y), Absolute),
            0x8D => self.store(ctx, Some(Register::A), Absolute),
            0x8E => self.store(ctx, Some(Register::X), Absolute),
            0x8F => self.store(ctx, Some(Register::A), AbsoluteLong),

            0x90 => self.branch(ctx, !self.p.c),
            0x91 => self.store(ctx, Some(Register::A), DirectIndirectIndexedY),
            0x92 => self.store(ctx, Some(Register::A), DirectIndirect),
            0x93 => self.store(ctx, Some(Register::A), StackRelativeIndirectIndexed),
            0x94 => self.store(ctx, Some(Register::Y), DirectX),
            0x95 => self.store(ctx, Some(Register::A), DirectX),
            0x96 => self.store(ctx, Some(Register::X), DirectY),
            0x97 => self.store(ctx, Some(Register::A), DirectIndirectLongY),
            0x98 => self.transfer(ctx, Register::Y, Register::A),
            0x99 => self.store(ctx, Some(Register::A), AbsoluteY),
            0x9A => self.txs(ctx),
            0x9B => self.transfer(ctx, Register::X, Register::Y),
            0x9C => self.store(ctx, None, Absolute),
            0x9D => self.store(ctx, Some(Register::A), AbsoluteX),
            0x9E => self.store(ctx, None, AbsoluteX),
            0x9F => self.store(ctx, Some(Register::A), AbsoluteLongX),

            0xA0 => self.load(ctx, Register::Y, Immediate),
            0xA1 => self.load(ctx, Register::A, DirectIndexedIndirect),
            0xA2 => self.load(ctx, Register::X, Immediate),
            0xA3 => self.load(ctx, Register::A, StackRelative),
            0xA4 => self.load(ctx, Register::Y, Direct),
            0xA5 => self.load(ctx, Register::A, Direct),
            0xA6 => self.load(ctx, Register::X, Direct),
            0xA7 => self.load(ctx, Register::A, DirectIndirectLong),
            0xA8 => self.transfer(ctx, Register::A, Register::Y),
            0xA9 => self.load(ctx, Register::A, Immediate),
            0xAA => self.transfer(ctx, Register::A, Register::X),
            0xAB => self.plb(ctx),
            0xAC => self.load(ctx, Register::Y, Absolute),
            0xAD => self.load(ctx, Register::A, Absolute),
            0xAE => self.load(ctx, Register::X, Absolute),
            0xAF => self.load(ctx, Register::A, AbsoluteLong),

            0xB0 => self.branch(ctx, self.p.c),
            0xB1 => self.load(ctx, Register::A, DirectIndirectIndexedY),
            0xB2 => self.load(ctx, Register::A, DirectIndirect),
            0xB3 => self.load(ctx, Register::A, StackRelativeIndirectIndexed),
            0xB4 => self.load(ctx, Register::Y, DirectX),
            0xB5 => self.load(ctx, Register::A, DirectX),
            0xB6 => self.load(ctx, Register::X, DirectY),
            0xB7 => self.load(ctx, Register::A, DirectIndirectLongY),
            0xB8 => self.set_flag(ctx, |p| p.v = false),
            0xB9 => self.load(ctx, Register::A, AbsoluteY),
            0xBA => self.tsx(ctx),
            0xBB => self.transfer(ctx, Register::Y, Register::X),
            0xBC => self.load(ctx, Register::Y, AbsoluteX),
            0xBD => self.load(ctx, Register::A, AbsoluteX),
            0xBE => self.load(ctx, Register::X, AbsoluteY),
            0xBF => self.load(ctx, Register::A, AbsoluteLongX),

            0xC0 => self.compare(ctx, Register::Y, Immediate),
            0xC1 => self.alu(ctx, AluType::Cmp, DirectIndexedIndirect),
            0xC2 => self.rep(ctx),
            0xC3 => self.alu(ctx, AluType::Cmp, StackRelative),
            0xC4 => self.compare(ctx, Register::Y, Direct),
            0xC5 => self.alu(ctx, AluType::Cmp, Direct),
            0xC6 => self.modify(ctx, Rmw::Dec, Direct),
            0xC7 => self.alu(ctx, AluType::Cmp, DirectIndirectLong),
            0xC8 => self.step_reg(ctx, Register::Y, 1),
            0xC9 => self.alu(ctx, AluType::Cmp, Immediate),
            0xCA => self.step_reg(ctx, Register::X, 0xFFFF),
            0xCB => self.wai(ctx),
            0xCC => self.compare(ctx, Register::Y, Absolute),
            0xCD => self.alu(ctx, AluType::Cmp, Absolute),
            0xCE => self.modify(ctx, Rmw::Dec, Absolute),
            0xCF => self.alu(ctx, AluType::Cmp, AbsoluteLong),

            0xD0 => self.branch(ctx, !self.p.z),
            0xD1 => self.alu(ctx, AluType::Cmp, DirectIndirectIndexedY),
            0xD2 => self.alu(ctx, AluType::Cmp, DirectIndirect),
            0xD3 => self.alu(ctx, AluType::Cmp, StackRelativeIndirectIndexed),
            0xD4 => self.pei(ctx),
            0xD5 => self.alu(ctx, AluType::Cmp, DirectX),
            0xD6 => self.modify(ctx, Rmw::Dec, DirectX),
            0xD7 => self.alu(ctx, AluType::Cmp, DirectIndirectLongY),
            0xD8 => self.set_flag(ctx, |p| p.d = false),
            0xD9 => self.alu(ctx, AluType::Cmp, AbsoluteY),
            0xDA => self.push_reg(ctx, Register::X),
            0xDB => self.stp(ctx),
            0xDC => self.jml_indirect(ctx),
            0xDD => self.alu(ctx, AluType::Cmp, AbsoluteX),
            0xDE => self.modify(ctx, Rmw::Dec, AbsoluteX),
            0xDF => self.alu(ctx, AluType::Cmp, AbsoluteLongX),

            0xE0 => self.compare(ctx, Register::X, Immediate),
            0xE1 => self.alu(ctx, AluType::Sub, DirectIndexedIndirect),
            0xE2 => self.sep(ctx),
            0xE3 => self.alu(ctx, AluType::Sub, StackRelative),
            0xE4 => self.compare(ctx, Register::X, Direct),
            0xE5 => self.alu(ctx, AluType::Sub, Direct),
            0xE6 => self.modify(ctx, Rmw::Inc, Direct),
            0xE7 => self.alu(ctx, AluType::Sub, DirectIndirectLong),
            0xE8 => self.step_reg(ctx, Register::X, 1),
            0xE9 => self.alu(ctx, AluType::Sub, Immediate),
            0xEA => ctx.elapse(CPU_CYCLE),
            0xEB => self.xba(ctx),
            0xEC => self.compare(ctx, Register::X, Absolute),
            0xED => self.alu(ctx, AluType::Sub, Absolute),
            0xEE => self.modify(ctx, Rmw::Inc, Absolute),
            0xEF => self.alu(ctx, AluType::Sub, AbsoluteLong),

            0xF0 => self.branch(ctx, self.p.z),
            0xF1 => self.alu(ctx, AluType::Sub, DirectIndirectIndexedY),
            0xF2 => self.alu(ctx, AluType::Sub, DirectIndirect),
            0xF3 => self.alu(ctx, AluType::Sub, StackRelativeIndirectIndexed),
            0xF4 => self.pea(ctx),
            0xF5 => self.alu(ctx, AluType::Sub, DirectX),
            0xF6 => self.modify(ctx, Rmw::Inc, DirectX),
            0xF7 => self.alu(ctx, AluType::Sub, DirectIndirectLongY),
            0xF8 => self.set_flag(ctx, |p| p.d = true),
            0xF9 => self.alu(ctx, AluType::Sub, AbsoluteY),
            0xFA => self.pull_reg(ctx, Register::X),
            0xFB => self.xce(ctx),
            0xFC => self.jsr_indexed_indirect(ctx),
            0xFD => self.alu(ctx, AluType::Sub, AbsoluteX),
            0xFE => self.modify(ctx, Rmw::Inc, AbsoluteX),
            0xFF => self.alu(ctx, AluType::Sub, AbsoluteLongX),
        }
    }

    fn software_interrupt(&mut self, ctx: &mut impl Context, exception: Exception) {
        // Signature byte
        let _ = self.fetch_8(ctx);
        self.exception(exception, ctx);
    }

    fn wdm(&mut self, ctx: &mut impl Context) {
        let _ = self.fetch_8(ctx);
    }

    fn wai(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        self.waiting = true;
    }

    fn stp(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        debug!("STP at {:06X}", self.pc24());
        self.stopped = true;
    }

    fn set_flag(&mut self, ctx: &mut impl Context, f: impl FnOnce(&mut Status)) {
        f(&mut self.p);
        ctx.elapse(CPU_CYCLE);
    }

    fn rep(&mut self, ctx: &mut impl Context) {
        let mask = self.fetch_8(ctx);
        ctx.elapse(CPU_CYCLE);
        self.set_p(u8::from(self.p) & !mask);
    }

    fn sep(&mut self, ctx: &mut impl Context) {
        let mask = self.fetch_8(ctx);
        ctx.elapse(CPU_CYCLE);
        self.set_p(u8::from(self.p) | mask);
    }

    fn xce(&mut self, ctx: &mut impl Context) {
        let carry = self.p.c;
        self.p.c = self.e;
        self.set_e(carry);
        ctx.elapse(CPU_CYCLE);
    }

    fn load(&mut self, ctx: &mut impl Context, reg: Register, mode: AddressingMode) {
        let wide = self.is_wide(reg);
        let data = self.operand(ctx, mode, wide);
        self.set(reg, data);
    }

    /// `None` stores zero (STZ).
    fn store(&mut self, ctx: &mut impl Context, reg: Option<Register>, mode: AddressingMode) {
        let (data, wide) = match reg {
            Some(reg) => (self.get(reg), self.is_wide(reg)),
            None => (0, !self.m8()),
        };
        self.address(ctx, mode, true).write(ctx, data, wide);
    }

    fn alu(&mut self, ctx: &mut impl Context, alu_type: AluType, mode: AddressingMode) {
        let wide = !self.m8();
        let data = self.operand(ctx, mode, wide);
        let a = self.get(Register::A);
        let result = match alu_type {
            AluType::Or => a | data,
            AluType::And => a & data,
            AluType::Xor => a ^ data,
            AluType::Add => self.add_with_carry(a, data, wide, false),
            AluType::Sub => self.add_with_carry(a, data, wide, true),
            AluType::Cmp => {
                self.compare_values(a, data, wide);
                return;
            }
        };
        self.set(Register::A, result);
    }

    fn compare(&mut self, ctx: &mut impl Context, reg: Register, mode: AddressingMode) {
        let wide = self.is_wide(reg);
        let data = self.operand(ctx, mode, wide);
        self.compare_values(self.get(reg), data, wide);
    }

    fn compare_values(&mut self, a: u16, b: u16, wide: bool) {
        self.p.c = a >= b;
        self.set_nz(a.wrapping_sub(b), wide);
    }

    /// ADC, and SBC as ADC of the complement. Decimal mode corrects one
    /// nibble at a time; V is taken before the top nibble is corrected.
    fn add_with_carry(&mut self, a: u16, b: u16, wide: bool, subtract: bool) -> u16 {
        let (mask, sign, nibbles) = if wide {
            (0xFFFF, 0x8000, 4)
        } else {
            (0xFF, 0x80, 2)
        };
        let a = a as i32 & mask;
        let b = if subtract { !b as i32 & mask } else { b as i32 & mask };
        let mut carry = self.p.c as i32;

        let result = if !self.p.d {
            let result = a + b + carry;
            self.p.v = !(a ^ b) & (a ^ result) & sign != 0;
            carry = (result > mask) as i32;
            result
        } else {
            let mut result = 0;
            for i in 0..nibbles {
                let shift = i * 4;
                let nibble = 0xF << shift;
                result = (a & nibble) + (b & nibble) + (carry << shift) + (result & ((1 << shift) - 1));
                if i == nibbles - 1 {
                    self.p.v = !(a ^ b) & (a ^ result) & sign != 0;
                }
                if !subtract && result > (0xA << shift) - 1 {
                    result += 6 << shift;
                } else if subtract && result <= (0x10 << shift) - 1 {
                    result -= 6 << shift;
                }
                carry = (result > (0x10 << shift) - 1) as i32;
            }
            result
        };
        self.p.c = carry != 0;
        (result & mask) as u16
    }

    fn bit(&mut self, ctx: &mut impl Context, mode: AddressingMode) {
        let wide = !self.m8();
        let data = self.operand(ctx, mode, wide);
        let a = self.get(Register::A);
        self.p.z = a & data == 0;
        if mode != AddressingMode::Immediate {
            let sign = if wide { 0x8000 } else { 0x80 };
            self.p.n = data & sign != 0;
            self.p.v = data & (sign >> 1) != 0;
        }
    }

    fn rmw_value(&mut self, op: Rmw, data: u16, wide: bool) -> u16 {
        let sign = if wide { 0x8000 } else { 0x80 };
        let mask = if wide { 0xFFFF } else { 0xFF };
        let a = self.get(Register::A);
        let result = match op {
            Rmw::Asl => {
                self.p.c = data & sign != 0;
                data << 1
            }
            Rmw::Lsr => {
                self.p.c = data & 1 != 0;
                data >> 1
            }
            Rmw::Rol => {
                let c = self.p.c as u16;
                self.p.c = data & sign != 0;
                data << 1 | c
            }
            Rmw::Ror => {
                let c = if self.p.c { sign } else { 0 };
                self.p.c = data & 1 != 0;
                data >> 1 | c
            }
            Rmw::Inc => data.wrapping_add(1),
            Rmw::Dec => data.wrapping_sub(1),
            Rmw::Tsb => {
                self.p.z = a & data == 0;
                return data | a;
            }
            Rmw::Trb => {
                self.p.z = a & data == 0;
                return data & !a;
            }
        } & mask;
        self.set_nz(result, wide);
        result
    }

    fn modify(&mut self, ctx: &mut impl Context, op: Rmw, mode: AddressingMode) {
        let wide = !self.m8();
        let addr = self.address(ctx, mode, true);
        let data = addr.read(ctx, wide);
        ctx.elapse(CPU_CYCLE);
        let result = self.rmw_value(op, data, wide);
        addr.write(ctx, result, wide);
    }

    fn modify_a(&mut self, ctx: &mut impl Context, op: Rmw) {
        let wide = !self.m8();
        ctx.elapse(CPU_CYCLE);
        let data = self.get(Register::A);
        let result = self.rmw_value(op, data, wide);
        if wide {
            self.a.set_word(result);
        } else {
            self.a.set_low(result as u8);
        }
    }

    fn step_reg(&mut self, ctx: &mut impl Context, reg: Register, delta: u16) {
        ctx.elapse(CPU_CYCLE);
        let data = self.get(reg).wrapping_add(delta);
        let data = if self.is_wide(reg) { data } else { data & 0xFF };
        self.set(reg, data);
    }

    fn transfer(&mut self, ctx: &mut impl Context, from: Register, to: Register) {
        ctx.elapse(CPU_CYCLE);
        let data = if self.is_wide(to) {
            match from {
                Register::A => self.a.word(),
                Register::X => self.x.word(),
                Register::Y => self.y.word(),
            }
        } else {
            self.get(from) & 0xFF
        };
        self.set(to, data);
    }

    fn tsx(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        let data = self.s.word();
        self.set(Register::X, data);
    }

    fn txs(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        if self.e {
            self.s.set_low(self.x.low());
        } else {
            self.s.set_word(self.x.word());
        }
    }

    fn tcs(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        if self.e {
            self.s.set_low(self.a.low());
        } else {
            self.s.set_word(self.a.word());
        }
    }

    fn tsc(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.a = self.s;
        self.set_nz(self.a.word(), true);
    }

    fn tcd(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.d = self.a;
        self.set_nz(self.d.word(), true);
    }

    fn tdc(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.a = self.d;
        self.set_nz(self.a.word(), true);
    }

    fn xba(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        let (low, high) = (self.a.low(), self.a.high());
        self.a.set_low(high);
        self.a.set_high(low);
        self.set_nz(high as u16, false);
    }

    fn push_reg(&mut self, ctx: &mut impl Context, reg: Register) {
        ctx.elapse(CPU_CYCLE);
        let data = self.get(reg);
        if self.is_wide(reg) {
            self.push_16(ctx, data);
        } else {
            self.push_8(ctx, data as u8);
        }
    }

    fn pull_reg(&mut self, ctx: &mut impl Context, reg: Register) {
        ctx.elapse(CPU_CYCLE * 2);
        let data = if self.is_wide(reg) {
            self.pop_16(ctx)
        } else {
            self.pop_8(ctx) as u16
        };
        self.set(reg, data);
    }

    fn php(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.push_8(ctx, self.p.into());
    }

    fn plp(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        let data = self.pop_8(ctx);
        self.set_p(data);
    }

    fn phb(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.push_8(ctx, self.db);
    }

    fn plb(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        self.db = self.pop_8(ctx);
        self.set_nz(self.db as u16, false);
    }

    fn phk(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.push_8(ctx, self.pb);
    }

    fn phd(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE);
        self.push_16(ctx, self.d.word());
    }

    fn pld(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        let data = self.pop_16(ctx);
        self.d.set_word(data);
        self.set_nz(data, true);
    }

    fn pea(&mut self, ctx: &mut impl Context) {
        let data = self.fetch_16(ctx);
        self.push_16(ctx, data);
    }

    fn pei(&mut self, ctx: &mut impl Context) {
        let data = self.direct(ctx, 0).read_16(ctx);
        self.push_16(ctx, data);
    }

    fn per(&mut self, ctx: &mut impl Context) {
        let offset = self.fetch_16(ctx);
        ctx.elapse(CPU_CYCLE);
        self.push_16(ctx, self.pc.wrapping_add(offset));
    }

    fn branch(&mut self, ctx: &mut impl Context, taken: bool) {
        let offset = self.fetch_8(ctx) as i8;
        if taken {
            ctx.elapse(CPU_CYCLE);
            let target = self.pc.wrapping_add(offset as i16 as u16);
            if self.e && target & 0xFF00 != self.pc & 0xFF00 {
                ctx.elapse(CPU_CYCLE);
            }
            self.pc = target;
        }
    }

    fn brl(&mut self, ctx: &mut impl Context) {
        let offset = self.fetch_16(ctx);
        ctx.elapse(CPU_CYCLE);
        self.pc = self.pc.wrapping_add(offset);
    }

    fn jmp_abs(&mut self, ctx: &mut impl Context) {
        self.pc = self.fetch_16(ctx);
    }

    fn jmp_long(&mut self, ctx: &mut impl Context) {
        let addr = self.fetch_24(ctx);
        self.pc = addr as u16;
        self.pb = (addr >> 16) as u8;
    }

    fn jmp_indirect(&mut self, ctx: &mut impl Context) {
        let ptr = self.fetch_16(ctx);
        self.pc = WrapAddress::bank(ptr as u32).read_16(ctx);
    }

    fn jmp_indexed_indirect(&mut self, ctx: &mut impl Context) {
        let ptr = self.fetch_16(ctx).wrapping_add(self.x.word());
        ctx.elapse(CPU_CYCLE);
        self.pc = WrapAddress::bank((self.pb as u32) << 16 | ptr as u32).read_16(ctx);
    }

    fn jml_indirect(&mut self, ctx: &mut impl Context) {
        let ptr = self.fetch_16(ctx);
        let addr = WrapAddress::bank(ptr as u32).read_24(ctx);
        self.pc = addr as u16;
        self.pb = (addr >> 16) as u8;
    }

    fn jsr_abs(&mut self, ctx: &mut impl Context) {
        let target = self.fetch_16(ctx);
        ctx.elapse(CPU_CYCLE);
        self.push_16(ctx, self.pc.wrapping_sub(1));
        self.pc = target;
    }

    fn jsl(&mut self, ctx: &mut impl Context) {
        let target = self.fetch_16(ctx);
        self.push_8(ctx, self.pb);
        ctx.elapse(CPU_CYCLE);
        let bank = self.fetch_8(ctx);
        self.push_16(ctx, self.pc.wrapping_sub(1));
        self.pc = target;
        self.pb = bank;
    }

    fn jsr_indexed_indirect(&mut self, ctx: &mut impl Context) {
        let ptr = self.fetch_16(ctx).wrapping_add(self.x.word());
        self.push_16(ctx, self.pc.wrapping_sub(1));
        ctx.elapse(CPU_CYCLE);
        self.pc = WrapAddress::bank((self.pb as u32) << 16 | ptr as u32).read_16(ctx);
    }

    fn rts(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        self.pc = self.pop_16(ctx).wrapping_add(1);
        ctx.elapse(CPU_CYCLE);
    }

    fn rtl(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        self.pc = self.pop_16(ctx).wrapping_add(1);
        self.pb = self.pop_8(ctx);
    }

    fn rti(&mut self, ctx: &mut impl Context) {
        ctx.elapse(CPU_CYCLE * 2);
        let p = self.pop_8(ctx);
        self.set_p(p);
        self.pc = self.pop_16(ctx);
        if !self.e {
            self.pb = self.pop_8(ctx);
        }
    }

    /// MVN/MVP move one byte per execution and rewind PC until A wraps.
    fn block_move(&mut self, ctx: &mut impl Context, increment: bool) {
        let dst = self.fetch_8(ctx);
        let src = self.fetch_8(ctx);
        self.db = dst;
        let data = ctx.bus_read((src as u32) << 16 | self.x.word() as u32);
        ctx.bus_write((dst as u32) << 16 | self.y.word() as u32, data);
        ctx.elapse(CPU_CYCLE * 2);

        let delta = if increment { 1 } else { 0xFFFF };
        for reg in [Register::X, Register::Y] {
            let data = self.get(reg).wrapping_add(delta);
            let data = if self.is_wide(reg) { data } else { data & 0xFF };
            match reg {
                Register::X => self.x.set_word(data),
                _ => self.y.set_word(data),
            }
        }
        let count = self.a.word().wrapping_sub(1);
        self.a.set_word(count);
        if count != 0xFFFF {
            self.pc = self.pc.wrapping_sub(3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::interrupt::Interrupt;

    const ACCESS: u64 = 8;

    struct TestBus {
        mem: Vec<u8>,
        timing: Counter,
        interrupt: Interrupt,
        mdma_runs: usize,
    }

    impl TestBus {
        fn new(program: &[u8]) -> TestBus {
            let mut mem = vec![0; 0x10000];
            mem[0x8000..0x8000 + program.len()].copy_from_slice(program);
            mem[0xFFFC] = 0x00;
            mem[0xFFFD] = 0x80;
            TestBus {
                mem,
                timing: Counter::default(),
                interrupt: Interrupt::default(),
                mdma_runs: 0,
            }
        }

        fn set_vector(&mut self, vector: usize, target: u16) {
            self.mem[vector] = target as u8;
            self.mem[vector + 1] = (target >> 8) as u8;
        }
    }

    impl context::Bus for TestBus {
        fn bus_read(&mut self, addr: u32) -> u8 {
            self.timing.elapse(ACCESS);
            self.mem[addr as usize & 0xFFFF]
        }
        fn bus_write(&mut self, addr: u32, data: u8) {
            self.timing.elapse(ACCESS);
            if addr & 0xFFFF == 0x420B && data != 0 {
                context::Signals::signal_dma(self, true);
            }
            self.mem[addr as usize & 0xFFFF] = data;
        }
    }

    impl context::Dma for TestBus {
        fn process_mdma(&mut self) {
            self.mdma_runs += 1;
            self.timing.elapse(100);
        }
    }

    impl context::Timing for TestBus {
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

    impl context::Budget for TestBus {
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

    impl context::Signals for TestBus {
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
        fn interrupt(&mut self) -> &mut Interrupt {
            &mut self.interrupt
        }
    }

    fn setup(program: &[u8]) -> (Cpu, TestBus) {
        let mut bus = TestBus::new(program);
        let mut cpu = Cpu::default();
        cpu.reset(&mut bus);
        (cpu, bus)
    }

    fn run_steps(cpu: &mut Cpu, bus: &mut TestBus, n: usize) {
        for _ in 0..n {
            cpu.execute_one(bus);
        }
    }

    // CLC; XCE; REP #$30
    const NATIVE16: [u8; 4] = [0x18, 0xFB, 0xC2, 0x30];

    #[test]
    fn reset_loads_vector() {
        let (cpu, bus) = setup(&[]);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0x8000);
        assert!(regs.e);
        assert_eq!(regs.s, 0x01FF);
        assert_eq!(regs.p & 0x34, 0x34);
        assert_eq!(bus.timing.now(), 2 * ACCESS + RESET_CYCLES);
    }

    #[test]
    fn cycle_conservation() {
        // Loop: INX; LDA $10; STA $11; BRA loop
        let (mut cpu, mut bus) = setup(&[0xE8, 0xA5, 0x10, 0x85, 0x11, 0x80, 0xF9]);
        for budget in [1, 50, 1000, 12345] {
            let start = bus.timing.now();
            let left = cpu.execute(&mut bus, budget);
            let spent = (bus.timing.now() - start) as i64;
            assert_eq!(spent, budget - left);
            assert!(left <= 0);
            assert!(left > -64);
        }
    }

    #[test]
    fn sixteen_bit_load_store() {
        let mut program = NATIVE16.to_vec();
        // LDA #$1234; STA $20; LDX #$BEEF; STX $22
        program.extend([0xA9, 0x34, 0x12, 0x85, 0x20, 0xA2, 0xEF, 0xBE, 0x86, 0x22]);
        let (mut cpu, mut bus) = setup(&program);
        run_steps(&mut cpu, &mut bus, 7);
        assert_eq!(&bus.mem[0x20..0x24], &[0x34, 0x12, 0xEF, 0xBE]);
        assert!(!cpu.registers().e);
        assert_eq!(cpu.registers().x, 0xBEEF);
    }

    #[test]
    fn setting_x_flag_clears_index_high_bytes() {
        let mut program = NATIVE16.to_vec();
        // LDX #$1234; LDY #$5678; SEP #$10
        program.extend([0xA2, 0x34, 0x12, 0xA0, 0x78, 0x56, 0xE2, 0x10]);
        let (mut cpu, mut bus) = setup(&program);
        run_steps(&mut cpu, &mut bus, 6);
        let regs = cpu.registers();
        assert_eq!(regs.x, 0x0034);
        assert_eq!(regs.y, 0x0078);
    }

    #[test]
    fn decimal_adc_and_sbc() {
        // SED; CLC; LDA #$15; ADC #$27; STA $00; SEC; SBC #$15; STA $01
        let program = [
            0xF8, 0x18, 0xA9, 0x15, 0x69, 0x27, 0x85, 0x00, 0x38, 0xE9, 0x15, 0x85, 0x01,
        ];
        let (mut cpu, mut bus) = setup(&program);
        run_steps(&mut cpu, &mut bus, 8);
        assert_eq!(bus.mem[0x00], 0x42);
        assert_eq!(bus.mem[0x01], 0x27);
        assert_eq!(cpu.registers().p & 1, 1);
    }

    #[test]
    fn decimal_carry_out() {
        // SED; CLC; LDA #$99; ADC #$01
        let (mut cpu, mut bus) = setup(&[0xF8, 0x18, 0xA9, 0x99, 0x69, 0x01]);
        run_steps(&mut cpu, &mut bus, 4);
        let regs = cpu.registers();
        assert_eq!(regs.a & 0xFF, 0x00);
        assert_eq!(regs.p & 0x03, 0x03);
    }

    #[test]
    fn decimal_sixteen_bit() {
        let mut program = NATIVE16.to_vec();
        // SED; CLC; LDA #$1999; ADC #$0001
        program.extend([0xF8, 0x18, 0xA9, 0x99, 0x19, 0x69, 0x01, 0x00]);
        let (mut cpu, mut bus) = setup(&program);
        run_steps(&mut cpu, &mut bus, 7);
        assert_eq!(cpu.registers().a, 0x2000);
    }

    #[test]
    fn binary_overflow() {
        // CLC; LDA #$7F; ADC #$01
        let (mut cpu, mut bus) = setup(&[0x18, 0xA9, 0x7F, 0x69, 0x01]);
        run_steps(&mut cpu, &mut bus, 3);
        let regs = cpu.registers();
        assert_eq!(regs.a & 0xFF, 0x80);
        assert_eq!(regs.p & 0xC0, 0xC0);
    }

    #[test]
    fn irq_waits_for_i_flag() {
        // SEI (already set); NOP; NOP; CLI; NOP
        let (mut cpu, mut bus) = setup(&[0x78, 0xEA, 0xEA, 0x58, 0xEA, 0xEA]);
        // Handler at $9000: BRA $9000
        bus.mem[0x9000] = 0x80;
        bus.mem[0x9001] = 0xFE;
        bus.set_vector(0xFFFE, 0x9000);
        context::Signals::signal_irq(&mut bus, true);

        cpu.execute(&mut bus, 40);
        assert!(cpu.registers().pc < 0x9000);

        cpu.execute(&mut bus, 200);
        let regs = cpu.registers();
        assert_eq!(regs.pb, 0);
        assert_eq!(regs.pc, 0x9000);
        assert_eq!(regs.p & 0x04, 0x04);
        // Emulation-mode IRQ pushes P with B clear
        assert_eq!(bus.mem[0x01FD] & 0x10, 0);
    }

    #[test]
    fn irq_is_level_triggered() {
        // Handler at $9000: RTI
        let (mut cpu, mut bus) = setup(&[0x58, 0xEA, 0xEA]);
        bus.mem[0x9000] = 0x40;
        bus.set_vector(0xFFFE, 0x9000);
        context::Signals::signal_irq(&mut bus, true);

        cpu.execute_one(&mut bus); // CLI
        cpu.execute_one(&mut bus); // IRQ then RTI
        assert_eq!(cpu.registers().pc, 0x8001);
        // Still asserted: taken again on the next check
        cpu.execute_one(&mut bus);
        assert_eq!(cpu.registers().pc, 0x8001);
    }

    #[test]
    fn nmi_edge_delivers_once() {
        let program = [0xEA; 16];
        let (mut cpu, mut bus) = setup(&program);
        // Handler: NOP loop
        bus.mem[0xA000] = 0x80;
        bus.mem[0xA001] = 0xFE;
        bus.set_vector(0xFFFA, 0xA000);

        context::Signals::signal_nmi(&mut bus, true);
        context::Signals::signal_nmi(&mut bus, true);
        cpu.execute(&mut bus, 200);
        assert_eq!(cpu.registers().pc, 0xA000);
        let s = cpu.registers().s;
        assert_eq!(s, 0x01FC);

        cpu.execute(&mut bus, 200);
        assert_eq!(cpu.registers().s, s);

        context::Signals::signal_nmi(&mut bus, false);
        context::Signals::signal_nmi(&mut bus, true);
        cpu.execute(&mut bus, 200);
        assert_eq!(cpu.registers().s, s - 3);
    }

    #[test]
    fn nmi_runs_one_more_instruction() {
        // LDA #$11; LDA #$22
        let (mut cpu, mut bus) = setup(&[0xA9, 0x11, 0xA9, 0x22]);
        bus.mem[0xA000] = 0xEA;
        bus.set_vector(0xFFFA, 0xA000);
        context::Signals::signal_nmi(&mut bus, true);
        cpu.execute_one(&mut bus);
        let regs = cpu.registers();
        assert_eq!(regs.a & 0xFF, 0x11);
        // Then the NMI's handler runs its first instruction
        assert_eq!(regs.pc, 0xA001);
    }

    #[test]
    fn wai_wakes_on_irq_with_i_set() {
        // WAI; LDA #$55
        let (mut cpu, mut bus) = setup(&[0xCB, 0xA9, 0x55]);
        cpu.execute(&mut bus, 500);
        assert!(cpu.waiting);
        assert_eq!(cpu.registers().pc, 0x8001);

        context::Signals::signal_irq(&mut bus, true);
        cpu.execute(&mut bus, 100);
        assert!(!cpu.waiting);
        assert_eq!(cpu.registers().a & 0xFF, 0x55);
    }

    #[test]
    fn stp_burns_budget() {
        let (mut cpu, mut bus) = setup(&[0xDB]);
        let left = cpu.execute(&mut bus, 1000);
        assert!(cpu.stopped);
        assert!(left <= 0);
        context::Signals::signal_irq(&mut bus, true);
        let left = cpu.execute(&mut bus, 1000);
        assert_eq!(left, 0);
        assert_eq!(cpu.registers().pc, 0x8001);
    }

    #[test]
    fn dma_write_aborts_and_restores_budget() {
        // LDA #$01; STA $420B; NOP...
        let mut program = vec![0xA9, 0x01, 0x8D, 0x0B, 0x42];
        program.extend([0xEA; 64]);
        let (mut cpu, mut bus) = setup(&program);
        let start = bus.timing.now();
        let left = cpu.execute(&mut bus, 400);
        assert_eq!(bus.mdma_runs, 1);
        assert_eq!((bus.timing.now() - start) as i64, 400 - left);
        assert!(left <= 0);
        // Past the STA: the restored budget kept the CPU running
        assert!(cpu.registers().pc > 0x8006);
    }

    #[test]
    fn jsr_rts_and_stack() {
        // JSR $9000; LDA #$01 | $9000: LDX #$07; RTS
        let (mut cpu, mut bus) = setup(&[0x20, 0x00, 0x90, 0xA9, 0x01]);
        bus.mem[0x9000..0x9003].copy_from_slice(&[0xA2, 0x07, 0x60]);
        run_steps(&mut cpu, &mut bus, 4);
        let regs = cpu.registers();
        assert_eq!(regs.x, 7);
        assert_eq!(regs.a & 0xFF, 1);
        assert_eq!(regs.s, 0x01FF);
    }

    #[test]
    fn block_move_copies_and_rewinds() {
        let mut program = NATIVE16.to_vec();
        // LDA #$0003; LDX #$1000; LDY #$2000; MVN $00,$00
        program.extend([0xA9, 0x03, 0x00, 0xA2, 0x00, 0x10, 0xA0, 0x00, 0x20, 0x54, 0x00, 0x00]);
        let (mut cpu, mut bus) = setup(&program);
        bus.mem[0x1000..0x1004].copy_from_slice(&[1, 2, 3, 4]);
        run_steps(&mut cpu, &mut bus, 6 + 4);
        assert_eq!(&bus.mem[0x2000..0x2004], &[1, 2, 3, 4]);
        let regs = cpu.registers();
        assert_eq!(regs.a, 0xFFFF);
        assert_eq!(regs.x, 0x1004);
        assert_eq!(regs.pc, 0x8010);
    }

    #[test]
    fn emulation_direct_page_wraps() {
        // LDA $FF,X with X=2 reads $0001 in emulation mode
        let (mut cpu, mut bus) = setup(&[0xA2, 0x02, 0xB5, 0xFF]);
        bus.mem[0x0001] = 0x5A;
        bus.mem[0x0101] = 0xA5;
        run_steps(&mut cpu, &mut bus, 2);
        assert_eq!(cpu.registers().a & 0xFF, 0x5A);
    }

    #[test]
    fn single_step_stops_on_breakpoint() {
        let (mut cpu, mut bus) = setup(&[0xEA, 0xEA, 0xEA, 0xEA]);
        cpu.set_mode(ExecutionMode::SingleStepDebug {
            breakpoint: Some(0x008002),
        });
        let left = cpu.execute(&mut bus, 10_000);
        assert!(cpu.breakpoint_hit());
        assert_eq!(cpu.registers().pc, 0x8002);
        assert!(left > 0);
    }

    #[test]
    fn registers_round_trip() {
        let (mut cpu, _) = setup(&[]);
        let regs = CpuRegisters {
            a: 0x1234,
            x: 0x56,
            y: 0x78,
            s: 0x1FF0,
            d: 0x0300,
            pc: 0x8123,
            pb: 0x7E,
            db: 0x01,
            p: 0x05,
            e: false,
        };
        cpu.set_registers(&regs);
        assert_eq!(cpu.registers(), regs);
    }
}

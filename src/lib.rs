use anyhow::{Context as _, Result};
use log::info;

pub use cartridge::{Header, MapMode, Speed};
pub use config::Config;
pub use controller::Key;
pub use cpu::{CpuRegisters, ExecutionMode};
pub use dma::TRANSFER_PATTERNS;
pub use dsp::EnvelopeState;
pub use memory::{Bank, MemoryKind, MemoryMap, Region, SystemBank, Trap, Window};
pub use queue::{QueuedWrite, WriteQueue};
pub use timer::Timer;

mod apu;
mod bus;
mod cartridge;
pub mod config;
mod context;
mod controller;
mod counter;
mod cpu;
mod dma;
mod dsp;
mod interrupt;
mod io;
pub mod memory;
mod ppu;
mod queue;
mod register;
mod spc;
mod spc_disasm;
mod system;
mod timer;

use context::Signals;
use system::SnesSystem;

pub struct Snes {
    system: SnesSystem,
    header: Header,
}

impl Snes {
    pub fn new(rom: Vec<u8>, backup: Option<Vec<u8>>) -> Result<Snes> {
        Snes::with_config(rom, backup, Config::default())
    }

    pub fn with_config(rom: Vec<u8>, backup: Option<Vec<u8>>, config: Config) -> Result<Snes> {
        let cartridge = cartridge::Cartridge::new(rom).context("Failed to parse ROM")?;
        let header = cartridge.header().clone();
        let map = cartridge.into_memory_map(backup);

        let mut context = context::Context::new(bus::Bus::new(map), &config);
        context.reset();
        info!("Powered on: {}", header.title);

        Ok(Snes {
            system: SnesSystem::new(context),
            header,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Runs until the end of the frame. Returns false when a breakpoint
    /// stopped emulation first.
    pub fn exec_frame(&mut self) -> bool {
        self.system
            .context_mut()
            .inner1
            .inner2
            .apu
            .clear_audio_buffer();
        self.system.exec_frame()
    }

    /// Executes one CPU instruction, servicing pending signals first.
    pub fn step(&mut self) {
        self.system.context_mut().execute_one();
    }

    /// Raises the reset line; the CPU takes it before its next instruction.
    pub fn reset(&mut self) {
        let inner2 = &mut self.system.context_mut().inner1.inner2;
        inner2.apu.reset();
        inner2.signal_reset(true);
    }

    pub fn set_keys(&mut self, port: usize, keys: &[Key]) {
        self.system.context_mut().inner1.bus.set_keys(port, keys);
    }

    /// SRAM contents, if the cartridge has any.
    pub fn backup(&self) -> Option<Vec<u8>> {
        let sram = self.system.context().inner1.bus.map.sram();
        (!sram.is_empty()).then(|| sram.to_vec())
    }

    pub fn audio_buffer(&self) -> &[(i16, i16)] {
        self.system.context().inner1.inner2.apu.audio_buffer()
    }

    /// 256x224 BGR555 pixels.
    pub fn frame_buffer(&self) -> &[u16] {
        &self.system.context().inner1.inner2.ppu.target().screen
    }

    pub fn frame_number(&self) -> u64 {
        self.system.context().inner1.inner2.ppu.target().frame_number
    }

    /// Master cycles since power on.
    pub fn cycles(&self) -> u64 {
        self.system.context().inner1.inner2.inner3.timing.now()
    }

    pub fn line(&self) -> u16 {
        self.system.line()
    }

    /// Interlace field, toggled at the start of every frame.
    pub fn field(&self) -> bool {
        self.system.field()
    }

    pub fn cpu_registers(&self) -> CpuRegisters {
        self.system.context().cpu.registers()
    }

    pub fn set_cpu_registers(&mut self, regs: &CpuRegisters) {
        self.system.context_mut().cpu.set_registers(regs);
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.system.context_mut().cpu.set_mode(mode);
    }

    pub fn breakpoint_hit(&self) -> bool {
        self.system.context().cpu.breakpoint_hit()
    }

    pub fn spc_pc(&self) -> u16 {
        self.system.context().inner1.inner2.apu.spc().pc()
    }

    /// Reads WRAM without side effects.
    pub fn peek_wram(&self, addr: usize) -> u8 {
        let wram = &self.system.context().inner1.bus.map.wram;
        wram[addr % wram.len()]
    }

    /// Reads a PPU register's stored value without side effects.
    pub fn peek_ppu_register(&self, addr: u16) -> u8 {
        self.system.context().inner1.inner2.ppu.target().register(addr)
    }

    /// Reads SPC RAM, including the boot ROM overlay when it is enabled.
    pub fn peek_spc(&self, addr: u16) -> u8 {
        self.system.context().inner1.inner2.apu.spc().peek(addr)
    }

    pub fn dsp_envelope_state(&self, voice: usize) -> EnvelopeState {
        self.system
            .context()
            .inner1
            .inner2
            .apu
            .spc()
            .dsp()
            .envelope_state(voice)
    }

    pub fn spc_halted(&self) -> bool {
        self.system.context().inner1.inner2.apu.spc().is_halted()
    }

    /// The value the SPC sees on input port `port` (0-3).
    pub fn peek_apu_port(&self, port: usize) -> u8 {
        self.system.context().inner1.inner2.apu.spc().peek_port_in(port)
    }

    /// Copies `data` into SPC RAM at `addr` and jumps the SPC to `pc`.
    pub fn load_spc_program(&mut self, addr: u16, data: &[u8], pc: u16) {
        let spc = self.system.context_mut().inner1.inner2.apu.spc_mut();
        spc.load_program(addr, data);
        spc.set_pc(pc);
    }

    pub fn pending_ppu_writes(&self) -> usize {
        self.system.context().inner1.inner2.ppu.pending_writes()
    }

    pub fn pending_apu_writes(&self) -> usize {
        self.system.context().inner1.inner2.apu.pending_writes()
    }

    /// Brings the SPC up to the CPU's current cycle.
    pub fn sync_spc(&mut self) {
        self.system.sync_spc(true);
    }

    /// Applies queued PPU writes and renders lines whose H-blank has passed.
    pub fn sync_ppu(&mut self) {
        self.system.sync_ppu();
    }
}

use log::{debug, trace};

use crate::config::{HBLANK_START, LINES_PER_FRAME, LINE_CYCLES, VBLANK_START_LINE};
use crate::context::{Context, Signals, Timing};
use crate::interrupt::IrqMode;

/// Drives the CPU one scanline at a time and keeps the PPU and SPC domains
/// in step with it.
pub struct SnesSystem {
    context: Context,
    field: bool,
    line: u16,
    phase: Phase,
    irq_raised: bool,
    // Nominal master cycle the next line starts at
    next_line_start: u64,
}

/// How far the current line got. A breakpoint can leave it at `Active` or
/// `HBlank`, and the next frame call picks up from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Begin,
    Active,
    HBlank,
}

impl SnesSystem {
    pub fn new(context: Context) -> SnesSystem {
        let next_line_start = context.inner1.inner2.inner3.timing.now();
        SnesSystem {
            context,
            field: false,
            line: 0,
            phase: Phase::Begin,
            irq_raised: false,
            next_line_start,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn field(&self) -> bool {
        self.field
    }

    pub fn line(&self) -> u16 {
        self.context.inner1.inner2.inner3.timing.line()
    }

    /// Runs the remaining lines of the current frame. Returns false when a
    /// breakpoint stopped it early; the next call finishes the interrupted
    /// line before moving on.
    pub fn exec_frame(&mut self) -> bool {
        loop {
            if !self.exec_line() {
                return false;
            }
            self.line = (self.line + 1) % LINES_PER_FRAME;
            self.phase = Phase::Begin;
            if self.line == 0 {
                self.end_frame();
                return true;
            }
        }
    }

    fn exec_line(&mut self) -> bool {
        let line = self.line;
        if self.phase == Phase::Begin {
            self.begin_line(line);
            self.irq_raised = false;
            self.phase = Phase::Active;
        }

        let irq = self.irq_offset(line);
        if self.phase == Phase::Active {
            if !self.execute_with_irq(0, HBLANK_START, irq) {
                return false;
            }

            let inner1 = &mut self.context.inner1;
            let now = inner1.inner2.inner3.timing.now();
            if (1..VBLANK_START_LINE).contains(&line) {
                inner1.inner2.ppu.mark_hblank(line, now);
            }
            if line < VBLANK_START_LINE {
                inner1.bus.process_hdma(&mut inner1.inner2);
            }
            self.phase = Phase::HBlank;
        }

        self.execute_with_irq(HBLANK_START, LINE_CYCLES, irq)
    }

    fn begin_line(&mut self, line: u16) {
        let inner1 = &mut self.context.inner1;
        let inner3 = &mut inner1.inner2.inner3;
        inner3.timing.start_line(line, self.next_line_start);
        self.next_line_start += LINE_CYCLES;
        trace!("Line {line} @ {}", inner3.timing.now());

        if line == 0 {
            let nmi = inner3.interrupt.set_nmi_flag(false);
            inner3.signal_nmi(nmi);
            self.field = !self.field;
            inner1.bus.hdma_init();
            let now = inner3.timing.now();
            inner1.inner2.ppu.start_frame(now);
        }

        if line == VBLANK_START_LINE {
            let nmi = inner3.interrupt.set_nmi_flag(true);
            inner3.signal_nmi(nmi);
            if inner3.interrupt.joypad_enable() {
                inner1.bus.io.auto_joypad_read();
            }
        }
    }

    /// Line cycle at which the H/V timer fires on `line`, if it does.
    fn irq_offset(&self, line: u16) -> Option<u64> {
        let interrupt = &self.context.inner1.inner2.inner3.interrupt;
        let h = interrupt.h_time() as u64 * 4;
        let at = match interrupt.irq_mode() {
            IrqMode::Disabled => return None,
            IrqMode::Horizontal => h,
            IrqMode::Vertical if line == interrupt.v_time() => 0,
            IrqMode::Both if line == interrupt.v_time() => h,
            IrqMode::Vertical | IrqMode::Both => return None,
        };
        (at < LINE_CYCLES).then_some(at)
    }

    /// Runs the CPU from line cycle `from` to `to`, raising the timer IRQ
    /// in between when it falls inside the range. The IRQ is raised at most
    /// once per line, even when a breakpoint splits the range.
    fn execute_with_irq(&mut self, from: u64, to: u64, irq: Option<u64>) -> bool {
        let due = irq.filter(|&at| at >= from && at < to && !self.irq_raised);
        if let Some(at) = due {
            if !self.run_to(at) {
                return false;
            }
            let inner3 = &mut self.context.inner1.inner2.inner3;
            debug!("H/V IRQ line {} cycle {}", inner3.timing.line(), inner3.timing.line_cycle());
            inner3.interrupt.set_irq_flag(true);
            inner3.signal_irq(true);
            self.irq_raised = true;
        }
        self.run_to(to)
    }

    /// Returns false only when a breakpoint stopped this run.
    fn run_to(&mut self, target: u64) -> bool {
        let pos = self.context.inner1.inner2.inner3.timing.line_cycle();
        if target <= pos {
            return true;
        }
        self.context.execute((target - pos) as i64);
        !self.context.cpu.breakpoint_hit()
    }

    fn end_frame(&mut self) {
        self.sync_spc(true);
        self.sync_ppu();
    }

    pub fn sync_spc(&mut self, force: bool) {
        let inner2 = &mut self.context.inner1.inner2;
        let now = inner2.inner3.now();
        inner2.apu.sync(now, force);
    }

    pub fn sync_ppu(&mut self) {
        let inner2 = &mut self.context.inner1.inner2;
        let now = inner2.inner3.now();
        inner2.ppu.sync(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::config::Config;
    use crate::config::VISIBLE_LINES;
    use crate::cpu::ExecutionMode;
    use crate::memory::{MemoryMap, SystemBank, Trap, Window};

    fn system(program: &[u8]) -> SnesSystem {
        system_with(program, ExecutionMode::Normal)
    }

    fn system_with(program: &[u8], execution_mode: ExecutionMode) -> SnesSystem {
        let mut rom = vec![0xEA; 0x8000];
        rom[..program.len()].copy_from_slice(program);
        // Reset vector -> $8000, NMI vectors -> $8100, IRQ vectors -> $8200
        rom[0x7FFC] = 0x00;
        rom[0x7FFD] = 0x80;
        rom[0x7FFA] = 0x00;
        rom[0x7FFB] = 0x81;
        rom[0x7FEA] = 0x00;
        rom[0x7FEB] = 0x81;
        rom[0x7FFE] = 0x00;
        rom[0x7FFF] = 0x82;
        rom[0x7FEE] = 0x00;
        rom[0x7FEF] = 0x82;
        let mut map = MemoryMap::default();
        map.load_rom(rom);
        let sys = Trap::System(SystemBank {
            sram: None,
            rom: Some(Window::rom(0, true)),
        });
        map.set_trap(0x000000, 0x400000, sys);
        map.set_trap(0x800000, 0x400000, sys);

        let config = Config {
            execution_mode,
            ..Config::default()
        };
        let mut context = Context::new(Bus::new(map), &config);
        context.reset();
        SnesSystem::new(context)
    }

    // BRA $8000
    const SPIN: [u8; 2] = [0x80, 0xFE];

    #[test]
    fn frame_takes_262_lines() {
        let mut sys = system(&SPIN);
        let start = sys.context().inner1.inner2.inner3.timing.now();
        assert!(sys.exec_frame());
        let now = sys.context().inner1.inner2.inner3.timing.now();
        let spent = now - start;
        let frame = LINES_PER_FRAME as u64 * LINE_CYCLES;
        assert!(spent >= frame && spent < frame + 64);
        assert_eq!(sys.line(), LINES_PER_FRAME - 1);
    }

    #[test]
    fn every_visible_line_rendered_once() {
        let mut sys = system(&SPIN);
        sys.exec_frame();
        sys.exec_frame();
        let ppu = sys.context().inner1.inner2.ppu.target();
        assert_eq!(ppu.lines_rendered, 2 * VISIBLE_LINES as u64);
    }

    #[test]
    fn field_toggles_each_frame() {
        let mut sys = system(&SPIN);
        sys.exec_frame();
        let first = sys.field();
        sys.exec_frame();
        assert_ne!(first, sys.field());
    }

    #[test]
    fn nmi_fires_once_per_frame() {
        // LDA #$80; STA $4200; loop: BRA loop | $8100: INC $10; RTI
        let mut program = vec![0xA9, 0x80, 0x8D, 0x00, 0x42, 0x80, 0xFE];
        program.resize(0x100, 0xEA);
        program.extend([0xE6, 0x10, 0x40]);
        let mut sys = system(&program);
        for _ in 0..3 {
            sys.exec_frame();
        }
        assert_eq!(sys.context().inner1.bus.map.wram[0x10], 3);
    }

    #[test]
    fn vertical_irq_raises_flag_on_vtime() {
        // VTIME=100, V-IRQ; loop
        let program = [
            0xA9, 100, 0x8D, 0x09, 0x42, // STA $4209
            0xA9, 0x20, 0x8D, 0x00, 0x42, // STA $4200
            0x80, 0xFE,
        ];
        let mut sys = system(&program);
        sys.exec_frame();
        let inner3 = &mut sys.context_mut().inner1.inner2.inner3;
        assert!(inner3.interrupt.take_irq_flag());
        assert_ne!(inner3.interrupt.signals() & crate::interrupt::signal::IRQ, 0);
    }

    #[test]
    fn frame_end_syncs_spc() {
        let mut sys = system(&SPIN);
        sys.exec_frame();
        let now = sys.context().inner1.inner2.inner3.timing.now();
        let spc = sys.context().inner1.inner2.apu.spc().cycles();
        assert!(spc >= crate::apu::to_spc_cycles(now));
    }

    fn frame_cycles() -> u64 {
        LINES_PER_FRAME as u64 * LINE_CYCLES
    }

    #[test]
    fn line_zero_irq_after_breakpoint_still_runs() {
        let program = [
            0x78, // SEI
            0xA9, 0x10, 0x8D, 0x00, 0x42, // H-IRQ at HTIME 0
            0x80, 0xFE,
        ];
        let mut sys = system_with(
            &program,
            ExecutionMode::SingleStepDebug {
                breakpoint: Some(0x008006),
            },
        );
        assert!(!sys.exec_frame());

        sys.context_mut().cpu.set_mode(ExecutionMode::Normal);
        for _ in 0..3 {
            let start = sys.context().inner1.inner2.inner3.timing.now();
            assert!(sys.exec_frame());
            let spent = sys.context().inner1.inner2.inner3.timing.now() - start;
            assert!(spent + LINE_CYCLES > frame_cycles());
        }
        assert!(!sys.context().cpu.breakpoint_hit());
    }

    // HDMA channel 0 in repeat mode reading 0xFF bytes from $9000, V-IRQ on
    // line 10 with the handler at $8200.
    fn hdma_program() -> Vec<u8> {
        let mut program = vec![
            0x9C, 0x00, 0x43, // STZ $4300
            0xA9, 0x32, 0x8D, 0x01, 0x43, // B-bus $2132
            0x9C, 0x02, 0x43, // table $00:9000
            0xA9, 0x90, 0x8D, 0x03, 0x43,
            0x9C, 0x04, 0x43,
            0xA9, 0x01, 0x8D, 0x0C, 0x42, // STA $420C
            0xA9, 0x0A, 0x8D, 0x09, 0x42, // VTIME = 10
            0xA9, 0x20, 0x8D, 0x00, 0x42, // V-IRQ
            0x58, // CLI
            0x80, 0xFE,
        ];
        program.resize(0x200, 0xEA);
        // NOP; INC $60; LDA $4211; RTI
        program.extend([0xEA, 0xE6, 0x60, 0xAD, 0x11, 0x42, 0x40]);
        program.resize(0x1000, 0xEA);
        program.resize(0x1200, 0xFF);
        program
    }

    fn hdma_table_addr(sys: &SnesSystem) -> u16 {
        let dma = &sys.context().inner1.bus.dma;
        u16::from_le_bytes([dma.read(0x4308), dma.read(0x4309)])
    }

    #[test]
    fn line_interrupted_by_breakpoint_is_finished_on_resume() {
        let mut reference = system(&hdma_program());
        reference.exec_frame();
        reference.exec_frame();

        let mut sys = system(&hdma_program());
        sys.exec_frame();
        sys.context_mut().cpu.set_mode(ExecutionMode::SingleStepDebug {
            breakpoint: Some(0x008201),
        });
        assert!(!sys.exec_frame());
        assert_eq!(sys.line(), 10);
        sys.sync_ppu();
        assert_eq!(
            sys.context().inner1.inner2.ppu.target().lines_rendered,
            VISIBLE_LINES as u64 + 9
        );

        sys.context_mut().cpu.set_mode(ExecutionMode::Normal);
        assert!(sys.exec_frame());
        assert_eq!(
            sys.context().inner1.inner2.ppu.target().lines_rendered,
            2 * VISIBLE_LINES as u64
        );
        assert_eq!(hdma_table_addr(&sys), hdma_table_addr(&reference));
        assert_ne!(hdma_table_addr(&sys), 0x9000);
        // One IRQ per frame, the interrupted line included
        assert_eq!(sys.context().inner1.bus.map.wram[0x60], 2);
        assert_eq!(reference.context().inner1.bus.map.wram[0x60], 2);
    }
}

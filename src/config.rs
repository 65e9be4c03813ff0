use crate::cpu::ExecutionMode;

pub const MASTER_CLOCK: u64 = 21_477_270;

// Master cycles
pub const LINE_CYCLES: u64 = 1364;
pub const HBLANK_START: u64 = 1096;
pub const LINES_PER_FRAME: u16 = 262;
pub const VBLANK_START_LINE: u16 = 225;
pub const VISIBLE_LINES: usize = 224;
pub const SCREEN_WIDTH: usize = 256;

// SPC cycles = master cycles * SPC_RATIO_NUM / SPC_RATIO_DEN
pub const SPC_RATIO_NUM: u64 = 102_400;
pub const SPC_RATIO_DEN: u64 = 2_147_727;

pub const SAMPLE_RATE: u32 = 32_000;

#[derive(Clone, Debug)]
pub struct Config {
    pub execution_mode: ExecutionMode,
    /// Minimum SPC lag (in SPC cycles) before a non-forced sync runs the SPC.
    pub spc_sync_threshold: u64,
    pub ppu_queue_capacity: usize,
    pub apu_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            execution_mode: ExecutionMode::Normal,
            spc_sync_threshold: 32,
            ppu_queue_capacity: 4096,
            apu_queue_capacity: 256,
        }
    }
}

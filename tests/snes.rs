//! End-to-end runs of small hand-assembled LoROM images through the public
//! `Snes` API.

use snesticle_core::{config, Config, EnvelopeState, ExecutionMode, Key, MapMode, Snes};

const HEADER: usize = 0x7FC0;
const HANDLER: usize = 0x100;
const DATA: usize = 0x1000;

// BRA to itself
const SPIN: [u8; 2] = [0x80, 0xFE];

struct Image {
    rom: Vec<u8>,
}

impl Image {
    /// 32KB LoROM with the reset vector at $8000 and both NMI vectors at
    /// $8100.
    fn new(program: &[u8]) -> Image {
        let mut rom = vec![0xEA; 0x8000];
        rom[..program.len()].copy_from_slice(program);
        rom[HEADER..HEADER + 21].copy_from_slice(b"INTEGRATION TEST     ");
        rom[HEADER + 0x15] = 0x20;
        rom[HEADER + 0x17] = 0x05;
        rom[HEADER + 0x18] = 0x00;
        rom[HEADER + 0x1C..HEADER + 0x20].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);
        rom[0x7FEA..0x7FEC].copy_from_slice(&[0x00, 0x81]);
        rom[0x7FFA..0x7FFC].copy_from_slice(&[0x00, 0x81]);
        rom[0x7FFC..0x7FFE].copy_from_slice(&[0x00, 0x80]);
        Image { rom }
    }

    fn nmi_handler(mut self, code: &[u8]) -> Image {
        self.rom[HANDLER..HANDLER + code.len()].copy_from_slice(code);
        self
    }

    fn data(mut self, offset: usize, bytes: &[u8]) -> Image {
        self.rom[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn sram_kb(mut self, code: u8) -> Image {
        self.rom[HEADER + 0x18] = code;
        self
    }

    fn boot(self, backup: Option<Vec<u8>>) -> Snes {
        Snes::new(self.rom, backup).unwrap()
    }
}

#[test]
fn parses_header() {
    let snes = Image::new(&SPIN).boot(None);
    let header = snes.header();
    assert_eq!(header.title, "INTEGRATION TEST");
    assert_eq!(header.map_mode, MapMode::LoRom);
    assert_eq!(header.rom_size, 32);
    assert_eq!(header.ram_size, 0);
    assert_eq!(snes.cpu_registers().pc, 0x8000);
    assert!(snes.cpu_registers().e);
}

#[test]
fn rejects_truncated_rom() {
    assert!(Snes::new(vec![0; 0x100], None).is_err());
}

#[test]
fn frame_advances_clock_and_counter() {
    let mut snes = Image::new(&SPIN).boot(None);
    let start = snes.cycles();
    assert!(snes.exec_frame());
    assert!(snes.exec_frame());
    let frame = config::LINES_PER_FRAME as u64 * config::LINE_CYCLES;
    let spent = snes.cycles() - start;
    assert!(spent >= 2 * frame && spent < 2 * frame + 64);
    assert_eq!(snes.frame_number(), 2);
}

#[test]
fn nmi_handler_runs_every_frame() {
    // LDA #$80; STA $4200; BRA *
    let program = [0xA9, 0x80, 0x8D, 0x00, 0x42, 0x80, 0xFE];
    // INC $10; RTI
    let mut snes = Image::new(&program)
        .nmi_handler(&[0xE6, 0x10, 0x40])
        .boot(None);
    for _ in 0..5 {
        snes.exec_frame();
    }
    assert_eq!(snes.peek_wram(0x10), 5);
}

#[test]
fn backdrop_fills_the_screen() {
    let program = [
        0x9C, 0x21, 0x21, // STZ $2121
        0xA9, 0x1F, // LDA #$1F
        0x8D, 0x22, 0x21, // STA $2122
        0x9C, 0x22, 0x21, // STZ $2122
        0xA9, 0x0F, // LDA #$0F
        0x8D, 0x00, 0x21, // STA $2100
        0x80, 0xFE,
    ];
    let mut snes = Image::new(&program).boot(None);
    snes.exec_frame();
    snes.exec_frame();
    assert_eq!(snes.peek_ppu_register(0x2100), 0x0F);
    assert_eq!(snes.frame_buffer().len(), config::SCREEN_WIDTH * config::VISIBLE_LINES);
    assert!(snes.frame_buffer().iter().all(|&px| px == 0x001F));
    assert_eq!(snes.pending_ppu_writes(), 0);
}

#[test]
fn dma_copies_palette_from_rom() {
    let program = [
        0x9C, 0x21, 0x21, // STZ $2121
        0x9C, 0x00, 0x43, // STZ $4300
        0xA9, 0x22, 0x8D, 0x01, 0x43, // B-bus $2122
        0x9C, 0x02, 0x43, // source $00:9000
        0xA9, 0x90, 0x8D, 0x03, 0x43,
        0x9C, 0x04, 0x43,
        0xA9, 0x02, 0x8D, 0x05, 0x43, // two bytes
        0x9C, 0x06, 0x43,
        0xA9, 0x0F, 0x8D, 0x00, 0x21, // STA $2100
        0xA9, 0x01, 0x8D, 0x0B, 0x42, // STA $420B
        0x80, 0xFE,
    ];
    let mut snes = Image::new(&program)
        .data(DATA, &[0x00, 0x7C])
        .boot(None);
    snes.exec_frame();
    snes.exec_frame();
    assert!(snes.frame_buffer().iter().all(|&px| px == 0x7C00));
}

#[test]
fn sram_is_saved_and_restored() {
    // LDA #$5A; STA $700010; BRA *
    let program = [0xA9, 0x5A, 0x8F, 0x10, 0x00, 0x70, 0x80, 0xFE];
    let mut snes = Image::new(&program).sram_kb(1).boot(None);
    snes.exec_frame();
    let backup = snes.backup().unwrap();
    assert_eq!(backup.len(), 0x800);
    assert_eq!(backup[0x10], 0x5A);

    // LDA $700010; STA $20; BRA *
    let program = [0xAF, 0x10, 0x00, 0x70, 0x85, 0x20, 0x80, 0xFE];
    let mut saved = vec![0; 0x800];
    saved[0x10] = 0x77;
    let mut snes = Image::new(&program).sram_kb(1).boot(Some(saved));
    snes.exec_frame();
    assert_eq!(snes.peek_wram(0x20), 0x77);
}

#[test]
fn lorom_sram_banks_keep_rom_in_upper_half() {
    let program = [
        0xA9, 0x5A, // LDA #$5A
        0x8F, 0x00, 0x80, 0x70, // STA $708000
        0xAF, 0x00, 0x80, 0x70, // LDA $708000
        0x85, 0x22, // STA $22
        0x80, 0xFE,
    ];
    let mut snes = Image::new(&program).sram_kb(1).boot(None);
    snes.exec_frame();
    assert!(snes.backup().unwrap().iter().all(|&b| b == 0));
    // $70:8000 mirrors the first ROM byte
    assert_eq!(snes.peek_wram(0x22), 0xA9);
}

#[test]
fn no_backup_without_sram() {
    let snes = Image::new(&SPIN).boot(None);
    assert_eq!(snes.backup(), None);
}

#[test]
fn auto_joypad_read_reaches_nmi_handler() {
    // LDA #$81; STA $4200; BRA *
    let program = [0xA9, 0x81, 0x8D, 0x00, 0x42, 0x80, 0xFE];
    // LDA $4218; STA $30; LDA $4219; STA $31; RTI
    let handler = [0xAD, 0x18, 0x42, 0x85, 0x30, 0xAD, 0x19, 0x42, 0x85, 0x31, 0x40];
    let mut snes = Image::new(&program).nmi_handler(&handler).boot(None);
    snes.set_keys(0, &[Key::A, Key::Start]);
    snes.exec_frame();
    assert_eq!(snes.peek_wram(0x30), 0x80);
    assert_eq!(snes.peek_wram(0x31), 0x10);

    snes.set_keys(0, &[]);
    snes.exec_frame();
    assert_eq!(snes.peek_wram(0x30), 0);
    assert_eq!(snes.peek_wram(0x31), 0);
}

#[test]
fn cpu_sees_spc_boot_handshake() {
    let program = [
        0xAD, 0x40, 0x21, // LDA $2140
        0xC9, 0xAA, // CMP #$AA
        0xD0, 0xF9, // BNE
        0x85, 0x40, // STA $40
        0x80, 0xFE,
    ];
    let mut snes = Image::new(&program).boot(None);
    for _ in 0..3 {
        snes.exec_frame();
    }
    assert_eq!(snes.peek_wram(0x40), 0xAA);
}

#[test]
fn cpu_port_write_reaches_spc() {
    // LDA #$CC; STA $2140; BRA *
    let program = [0xA9, 0xCC, 0x8D, 0x40, 0x21, 0x80, 0xFE];
    let mut snes = Image::new(&program).boot(None);
    snes.exec_frame();
    assert_eq!(snes.pending_apu_writes(), 0);
    assert_eq!(snes.peek_apu_port(0), 0xCC);
}

#[test]
fn uploaded_spc_program_talks_back() {
    let program = [
        0xAD, 0x40, 0x21, // LDA $2140
        0xC9, 0x42, // CMP #$42
        0xD0, 0xF9, // BNE
        0x85, 0x50, // STA $50
        0x80, 0xFE,
    ];
    let mut snes = Image::new(&program).boot(None);
    // MOV A,#$42; MOV $F4,A; BRA *
    snes.load_spc_program(0x0200, &[0xE8, 0x42, 0xC4, 0xF4, 0x2F, 0xFE], 0x0200);
    assert_eq!(snes.peek_spc(0x0202), 0xC4);
    snes.exec_frame();
    snes.exec_frame();
    assert_eq!(snes.peek_wram(0x50), 0x42);
    assert_eq!(snes.spc_pc(), 0x0204);
    assert!(!snes.spc_halted());
}

#[test]
fn spc_key_on_starts_envelope() {
    let mut snes = Image::new(&SPIN).boot(None);
    assert_eq!(snes.dsp_envelope_state(0), EnvelopeState::Silence);
    let program = [
        0x8F, 0x6C, 0xF2, // MOV $F2,#$6C
        0x8F, 0x20, 0xF3, // FLG out of soft reset
        0x8F, 0x05, 0xF2, // MOV $F2,#$05
        0x8F, 0x8F, 0xF3, // ADSR on, fastest attack
        0x8F, 0x4C, 0xF2, // MOV $F2,#$4C
        0x8F, 0x01, 0xF3, // KON voice 0
        0x2F, 0xFE,
    ];
    snes.load_spc_program(0x0200, &program, 0x0200);
    snes.exec_frame();
    assert!(matches!(
        snes.dsp_envelope_state(0),
        EnvelopeState::Attack | EnvelopeState::Decay | EnvelopeState::Sustain
    ));
    assert_eq!(snes.dsp_envelope_state(1), EnvelopeState::Silence);
}

#[test]
fn audio_keeps_pace_with_video() {
    let mut snes = Image::new(&SPIN).boot(None);
    snes.exec_frame();
    let samples = snes.audio_buffer().len();
    // 32kHz over one 60Hz frame
    assert!((500..560).contains(&samples), "{samples} samples");
}

#[test]
fn breakpoint_stops_the_frame() {
    let mut program = [0xEA; 7];
    program[5..].copy_from_slice(&SPIN);
    let config = Config {
        execution_mode: ExecutionMode::SingleStepDebug {
            breakpoint: Some(0x008005),
        },
        ..Config::default()
    };
    let mut snes = Snes::with_config(Image::new(&program).rom, None, config).unwrap();
    assert!(!snes.exec_frame());
    assert!(snes.breakpoint_hit());
    assert_eq!(snes.cpu_registers().pc, 0x8005);
    assert_eq!(snes.line(), 0);

    snes.set_execution_mode(ExecutionMode::Normal);
    assert!(snes.exec_frame());
    assert!(!snes.breakpoint_hit());
}

#[test]
fn reset_restarts_at_vector() {
    // SEI; INC $10; BRA -4
    let program = [0x78, 0xE6, 0x10, 0x80, 0xFC];
    let mut snes = Image::new(&program).boot(None);
    snes.exec_frame();
    assert_ne!(snes.cpu_registers().pc, 0x8000);
    snes.reset();
    snes.step();
    assert_eq!(snes.cpu_registers().pc, 0x8001);
    assert!(snes.cpu_registers().e);
}

#[test]
fn registers_can_be_redirected() {
    let mut program = SPIN.to_vec();
    program.resize(0x10, 0xEA);
    // LDA #$33; STA $60
    program.extend([0xA9, 0x33, 0x85, 0x60]);
    let mut snes = Image::new(&program).boot(None);
    let mut regs = snes.cpu_registers();
    regs.pc = 0x8010;
    snes.set_cpu_registers(&regs);
    snes.step();
    snes.step();
    assert_eq!(snes.peek_wram(0x60), 0x33);
}

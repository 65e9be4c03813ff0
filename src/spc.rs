use log::{debug, trace, warn};
use modular_bitfield::bitfield;

use crate::dsp::Dsp;
use crate::spc_disasm::disassemble;
use crate::timer::Timer;

/// IPL boot ROM, overlaid on 0xFFC0-0xFFFF while enabled.
const ROM: [u8; 0x40] = [
    0xCD, 0xEF, 0xBD, 0xE8, 0x00, 0xC6, 0x1D, 0xD0, 0xFC, 0x8F, 0xAA, 0xF4, 0x8F, 0xBB, 0xF5, 0x78,
    0xCC, 0xF4, 0xD0, 0xFB, 0x2F, 0x19, 0xEB, 0xF4, 0xD0, 0xFC, 0x7E, 0xF4, 0xD0, 0x0B, 0xE4, 0xF5,
    0xCB, 0xF4, 0xD7, 0x00, 0xFC, 0xD0, 0xF3, 0xAB, 0x01, 0x10, 0xEF, 0x7E, 0xF4, 0x10, 0xEB, 0xBA,
    0xF6, 0xDA, 0x00, 0xBA, 0xF4, 0xC4, 0xF4, 0xDD, 0x5D, 0xD0, 0xDB, 0x1F, 0x00, 0x00, 0xC0, 0xFF,
];

const ROM_BASE: usize = 0xFFC0;

// SPC cycles per opcode, branches not taken
#[rustfmt::skip]
const CYCLES: [u8; 256] = [
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 6, 8,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 4, 6,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 4, 5, 4,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 6, 5, 2, 2, 3, 8,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 6, 6,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 4, 5, 2, 2, 4, 3,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 4, 5, 5,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 6,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 6, 5, 4, 5, 2, 4, 5,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 12, 5,
    3, 8, 4, 5, 3, 4, 3, 6, 2, 6, 4, 4, 5, 2, 4, 4,
    2, 8, 4, 5, 4, 5, 5, 6, 5, 5, 5, 5, 2, 2, 3, 4,
    3, 8, 4, 5, 4, 5, 4, 7, 2, 5, 6, 4, 5, 2, 4, 9,
    2, 8, 4, 5, 5, 6, 6, 7, 4, 5, 5, 5, 2, 2, 6, 3,
    2, 8, 4, 5, 3, 4, 3, 6, 2, 4, 5, 3, 4, 3, 4, 3,
    2, 8, 4, 5, 4, 5, 5, 6, 3, 4, 5, 4, 2, 2, 4, 3,
];

const BRANCH_TAKEN: u64 = 2;

// The DSP produces one sample per 32 SPC cycles
const DSP_TICK: u64 = 32;

/// SPC700 with its 64KB RAM, I/O page and S-DSP.
pub struct Spc {
    registers: Registers,
    ram: Box<[u8; 0x10000]>,
    shadow: [u8; 0x40],
    rom_enabled: bool,
    io: Io,

    cycles: u64,
    dsp_cycles: u64,
    taken: u64,

    halted: bool,
}

struct Io {
    cpu_in: [u8; 4],
    cpu_out: [u8; 4],
    dsp_addr: u8,
    dsp: Dsp,
    timers: [Timer; 3],
}

impl Default for Io {
    fn default() -> Self {
        Io {
            cpu_in: [0; 4],
            cpu_out: [0; 4],
            dsp_addr: 0,
            dsp: Dsp::default(),
            timers: [Timer::new(128), Timer::new(128), Timer::new(16)],
        }
    }
}

impl Default for Spc {
    fn default() -> Self {
        let mut ram = Box::new([0; 0x10000]);
        ram[ROM_BASE..].copy_from_slice(&ROM);
        Spc {
            registers: Registers::default(),
            ram,
            shadow: [0; 0x40],
            rom_enabled: true,
            io: Io::default(),
            cycles: 0,
            dsp_cycles: 0,
            taken: 0,
            halted: false,
        }
    }
}

impl Spc {
    pub fn reset(&mut self) {
        self.set_rom_enable(true);
        self.registers = Registers::default();
        self.io = Io::default();
        self.halted = false;
    }

    /// Runs until `cycles` SPC cycles are used up. Returns the remaining
    /// budget, zero or negative by the overshoot of the last instruction.
    pub fn execute(&mut self, cycles: i64) -> i64 {
        let mut budget = cycles;
        if self.halted {
            if budget > 0 {
                self.elapse(budget as u64);
            }
            return budget.min(0);
        }
        while budget > 0 && !self.halted {
            budget -= self.execute_one() as i64;
        }
        if self.halted && budget > 0 {
            self.elapse(budget as u64);
            budget = 0;
        }
        budget
    }

    /// Executes one instruction and returns the cycles it took.
    pub fn execute_one(&mut self) -> u64 {
        if self.halted {
            self.elapse(2);
            return 2;
        }

        let pc = self.registers.pc;
        trace!(
            "SPC {pc:04X} {:<20} A:{:02X} X:{:02X} Y:{:02X} SP:{:02X} PSW:{:02X}",
            disassemble(|addr| self.peek(addr), pc).0,
            self.registers.a,
            self.registers.x,
            self.registers.y,
            self.registers.sp,
            u8::from(self.registers.psw),
        );
        let op = self.fetch_8();
        self.taken = 0;
        self.dispatch(op);

        let cycles = CYCLES[op as usize] as u64 + self.taken;
        self.elapse(cycles);
        cycles
    }

    fn elapse(&mut self, cycles: u64) {
        self.cycles += cycles;
        self.dsp_cycles += cycles;
        while self.dsp_cycles >= DSP_TICK {
            self.dsp_cycles -= DSP_TICK;
            self.io.dsp.tick(&mut self.ram[..]);
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pc(&self) -> u16 {
        self.registers.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.registers.pc = pc;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// CPU side of the 0x2140-0x2143 ports.
    pub fn write_port(&mut self, port: usize, data: u8) {
        self.io.cpu_in[port & 3] = data;
    }

    pub fn read_port(&self, port: usize) -> u8 {
        self.io.cpu_out[port & 3]
    }

    /// What the SPC sees on `port`.
    pub fn peek_port_in(&self, port: usize) -> u8 {
        self.io.cpu_in[port & 3]
    }

    pub fn audio_buffer(&self) -> &[(i16, i16)] {
        self.io.dsp.audio_buffer()
    }

    pub fn clear_audio_buffer(&mut self) {
        self.io.dsp.clear_audio_buffer();
    }

    pub fn dsp(&self) -> &Dsp {
        &self.io.dsp
    }

    pub fn rom_enabled(&self) -> bool {
        self.rom_enabled
    }

    /// Swaps the boot ROM in or out of the top 64 bytes. RAM written while
    /// the ROM is visible lives in the shadow buffer until it is swapped out.
    pub fn set_rom_enable(&mut self, enable: bool) {
        if enable == self.rom_enabled {
            return;
        }
        if enable {
            self.shadow.copy_from_slice(&self.ram[ROM_BASE..]);
            self.ram[ROM_BASE..].copy_from_slice(&ROM);
        } else {
            self.ram[ROM_BASE..].copy_from_slice(&self.shadow);
        }
        self.rom_enabled = enable;
    }

    /// Memory view without I/O side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// Stores into RAM the way the SPC would, minus I/O side effects.
    pub fn poke(&mut self, addr: u16, data: u8) {
        let addr = addr as usize;
        if self.rom_enabled && addr >= ROM_BASE {
            self.shadow[addr - ROM_BASE] = data;
        } else {
            self.ram[addr] = data;
        }
    }

    pub fn load_program(&mut self, addr: u16, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.poke(addr.wrapping_add(i as u16), *b);
        }
    }

    fn dispatch(&mut self, op: u8) {
        match op {
            0x00 => {}
            0x01 => self.tcall_n(0),
            0x02 => self.set_n_bit(0),
            0x03 => self.bb_sc(0, true),
            0x04 => self.alu(AluType::Or, AddressingMode::DirectPage),
            0x05 => self.alu(AluType::Or, AddressingMode::Absolute),
            0x06 => self.alu(AluType::Or, AddressingMode::IndirectX),
            0x07 => self.alu(AluType::Or, AddressingMode::XIndexedIndirect),
            0x08 => self.alu(AluType::Or, AddressingMode::Immediate),
            0x09 => self.alu(AluType::Or, AddressingMode::DirectPageToDirectPage),
            0x0A => self.bit_op(BitOp::Or),
            0x0B => self.shift(Shift::Asl, AddressingMode::DirectPage),
            0x0C => self.shift(Shift::Asl, AddressingMode::Absolute),
            0x0D => self.push_8(self.registers.psw.into()),
            0x0E => self.tset(),
            0x0F => self.brk(),

            0x10 => self.br(!self.registers.psw.n()),
            0x11 => self.tcall_n(1),
            0x12 => self.clr_n_bit(0),
            0x13 => self.bb_sc(0, false),
            0x14 => self.alu(AluType::Or, AddressingMode::XIndexedDirectPage),
            0x15 => self.alu(AluType::Or, AddressingMode::XIndexedAbsolute),
            0x16 => self.alu(AluType::Or, AddressingMode::YIndexedAbsolute),
            0x17 => self.alu(AluType::Or, AddressingMode::IndirectYIndexedIndirect),
            0x18 => self.alu(AluType::Or, AddressingMode::ImmediateDataToDirectPage),
            0x19 => self.alu(AluType::Or, AddressingMode::IndirectPageToIndirectPage),
            0x1A => self.step_word(false),
            0x1B => self.shift(Shift::Asl, AddressingMode::XIndexedDirectPage),
            0x1C => self.shift_a(Shift::Asl),
            0x1D => self.registers.x = self.dec(self.registers.x),
            0x1E => self.compare(Register::X, AddressingMode::Absolute),
            0x1F => self.jmp_x_abs(),

            0x20 => self.registers.psw.set_p(false),
            0x21 => self.tcall_n(2),
            0x22 => self.set_n_bit(1),
            0x23 => self.bb_sc(1, true),
            0x24 => self.alu(AluType::And, AddressingMode::DirectPage),
            0x25 => self.alu(AluType::And, AddressingMode::Absolute),
            0x26 => self.alu(AluType::And, AddressingMode::IndirectX),
            0x27 => self.alu(AluType::And, AddressingMode::XIndexedIndirect),
            0x28 => self.alu(AluType::And, AddressingMode::Immediate),
            0x29 => self.alu(AluType::And, AddressingMode::DirectPageToDirectPage),
            0x2A => self.bit_op(BitOp::OrNot),
            0x2B => self.shift(Shift::Rol, AddressingMode::DirectPage),
            0x2C => self.shift(Shift::Rol, AddressingMode::Absolute),
            0x2D => self.push_8(self.registers.a),
            0x2E => self.cbne(AddressingMode::DirectPage),
            0x2F => {
                // BRA's table entry already counts the taken branch
                let offset = self.fetch_8();
                self.registers.pc = self.registers.pc.wrapping_add(offset as i8 as u16);
            }

            0x30 => self.br(self.registers.psw.n()),
            0x31 => self.tcall_n(3),
            0x32 => self.clr_n_bit(1),
            0x33 => self.bb_sc(1, false),
            0x34 => self.alu(AluType::And, AddressingMode::XIndexedDirectPage),
            0x35 => self.alu(AluType::And, AddressingMode::XIndexedAbsolute),
            0x36 => self.alu(AluType::And, AddressingMode::YIndexedAbsolute),
            0x37 => self.alu(AluType::And, AddressingMode::IndirectYIndexedIndirect),
            0x38 => self.alu(AluType::And, AddressingMode::ImmediateDataToDirectPage),
            0x39 => self.alu(AluType::And, AddressingMode::IndirectPageToIndirectPage),
            0x3A => self.step_word(true),
            0x3B => self.shift(Shift::Rol, AddressingMode::XIndexedDirectPage),
            0x3C => self.shift_a(Shift::Rol),
            0x3D => self.registers.x = self.inc(self.registers.x),
            0x3E => self.compare(Register::X, AddressingMode::DirectPage),
            0x3F => self.call(),

            0x40 => self.registers.psw.set_p(true),
            0x41 => self.tcall_n(4),
            0x42 => self.set_n_bit(2),
            0x43 => self.bb_sc(2, true),
            0x44 => self.alu(AluType::Eor, AddressingMode::DirectPage),
            0x45 => self.alu(AluType::Eor, AddressingMode::Absolute),
            0x46 => self.alu(AluType::Eor, AddressingMode::IndirectX),
            0x47 => self.alu(AluType::Eor, AddressingMode::XIndexedIndirect),
            0x48 => self.alu(AluType::Eor, AddressingMode::Immediate),
            0x49 => self.alu(AluType::Eor, AddressingMode::DirectPageToDirectPage),
            0x4A => self.bit_op(BitOp::And),
            0x4B => self.shift(Shift::Lsr, AddressingMode::DirectPage),
            0x4C => self.shift(Shift::Lsr, AddressingMode::Absolute),
            0x4D => self.push_8(self.registers.x),
            0x4E => self.tclr(),
            0x4F => self.pcall(),

            0x50 => self.br(!self.registers.psw.v()),
            0x51 => self.tcall_n(5),
            0x52 => self.clr_n_bit(2),
            0x53 => self.bb_sc(2, false),
            0x54 => self.alu(AluType::Eor, AddressingMode::XIndexedDirectPage),
            0x55 => self.alu(AluType::Eor, AddressingMode::XIndexedAbsolute),
            0x56 => self.alu(AluType::Eor, AddressingMode::YIndexedAbsolute),
            0x57 => self.alu(AluType::Eor, AddressingMode::IndirectYIndexedIndirect),
            0x58 => self.alu(AluType::Eor, AddressingMode::ImmediateDataToDirectPage),
            0x59 => self.alu(AluType::Eor, AddressingMode::IndirectPageToIndirectPage),
            0x5A => self.cmpw(),
            0x5B => self.shift(Shift::Lsr, AddressingMode::XIndexedDirectPage),
            0x5C => self.shift_a(Shift::Lsr),
            0x5D => self.transfer(Register::A, Register::X),
            0x5E => self.compare(Register::Y, AddressingMode::Absolute),
            0x5F => self.registers.pc = self.fetch_16(),

            0x60 => self.registers.psw.set_c(false),
            0x61 => self.tcall_n(6),
            0x62 => self.set_n_bit(3),
            0x63 => self.bb_sc(3, true),
            0x64 => self.alu(AluType::Cmp, AddressingMode::DirectPage),
            0x65 => self.alu(AluType::Cmp, AddressingMode::Absolute),
            0x66 => self.alu(AluType::Cmp, AddressingMode::IndirectX),
            0x67 => self.alu(AluType::Cmp, AddressingMode::XIndexedIndirect),
            0x68 => self.alu(AluType::Cmp, AddressingMode::Immediate),
            0x69 => self.alu(AluType::Cmp, AddressingMode::DirectPageToDirectPage),
            0x6A => self.bit_op(BitOp::AndNot),
            0x6B => self.shift(Shift::Ror, AddressingMode::DirectPage),
            0x6C => self.shift(Shift::Ror, AddressingMode::Absolute),
            0x6D => self.push_8(self.registers.y),
            0x6E => self.dbnz_dp(),
            0x6F => self.registers.pc = self.pop_16(),

            0x70 => self.br(self.registers.psw.v()),
            0x71 => self.tcall_n(7),
            0x72 => self.clr_n_bit(3),
            0x73 => self.bb_sc(3, false),
            0x74 => self.alu(AluType::Cmp, AddressingMode::XIndexedDirectPage),
            0x75 => self.alu(AluType::Cmp, AddressingMode::XIndexedAbsolute),
            0x76 => self.alu(AluType::Cmp, AddressingMode::YIndexedAbsolute),
            0x77 => self.alu(AluType::Cmp, AddressingMode::IndirectYIndexedIndirect),
            0x78 => self.alu(AluType::Cmp, AddressingMode::ImmediateDataToDirectPage),
            0x79 => self.alu(AluType::Cmp, AddressingMode::IndirectPageToIndirectPage),
            0x7A => self.addw(),
            0x7B => self.shift(Shift::Ror, AddressingMode::XIndexedDirectPage),
            0x7C => self.shift_a(Shift::Ror),
            0x7D => self.transfer(Register::X, Register::A),
            0x7E => self.compare(Register::Y, AddressingMode::DirectPage),
            0x7F => self.reti(),

            0x80 => self.registers.psw.set_c(true),
            0x81 => self.tcall_n(8),
            0x82 => self.set_n_bit(4),
            0x83 => self.bb_sc(4, true),
            0x84 => self.alu(AluType::Adc, AddressingMode::DirectPage),
            0x85 => self.alu(AluType::Adc, AddressingMode::Absolute),
            0x86 => self.alu(AluType::Adc, AddressingMode::IndirectX),
            0x87 => self.alu(AluType::Adc, AddressingMode::XIndexedIndirect),
            0x88 => self.alu(AluType::Adc, AddressingMode::Immediate),
            0x89 => self.alu(AluType::Adc, AddressingMode::DirectPageToDirectPage),
            0x8A => self.bit_op(BitOp::Eor),
            0x8B => self.modify(AddressingMode::DirectPage, Self::dec),
            0x8C => self.modify(AddressingMode::Absolute, Self::dec),
            0x8D => self.load(Register::Y, AddressingMode::Immediate),
            0x8E => {
                let psw = self.pop_8();
                self.registers.psw = psw.into();
            }
            0x8F => self.mov_dp_imm(),

            0x90 => self.br(!self.registers.psw.c()),
            0x91 => self.tcall_n(9),
            0x92 => self.clr_n_bit(4),
            0x93 => self.bb_sc(4, false),
            0x94 => self.alu(AluType::Adc, AddressingMode::XIndexedDirectPage),
            0x95 => self.alu(AluType::Adc, AddressingMode::XIndexedAbsolute),
            0x96 => self.alu(AluType::Adc, AddressingMode::YIndexedAbsolute),
            0x97 => self.alu(AluType::Adc, AddressingMode::IndirectYIndexedIndirect),
            0x98 => self.alu(AluType::Adc, AddressingMode::ImmediateDataToDirectPage),
            0x99 => self.alu(AluType::Adc, AddressingMode::IndirectPageToIndirectPage),
            0x9A => self.subw(),
            0x9B => self.modify(AddressingMode::XIndexedDirectPage, Self::dec),
            0x9C => self.registers.a = self.dec(self.registers.a),
            0x9D => self.transfer(Register::Sp, Register::X),
            0x9E => self.div(),
            0x9F => self.xcn(),

            0xA0 => self.registers.psw.set_i(true),
            0xA1 => self.tcall_n(10),
            0xA2 => self.set_n_bit(5),
            0xA3 => self.bb_sc(5, true),
            0xA4 => self.alu(AluType::Sbc, AddressingMode::DirectPage),
            0xA5 => self.alu(AluType::Sbc, AddressingMode::Absolute),
            0xA6 => self.alu(AluType::Sbc, AddressingMode::IndirectX),
            0xA7 => self.alu(AluType::Sbc, AddressingMode::XIndexedIndirect),
            0xA8 => self.alu(AluType::Sbc, AddressingMode::Immediate),
            0xA9 => self.alu(AluType::Sbc, AddressingMode::DirectPageToDirectPage),
            0xAA => self.bit_op(BitOp::Load),
            0xAB => self.modify(AddressingMode::DirectPage, Self::inc),
            0xAC => self.modify(AddressingMode::Absolute, Self::inc),
            0xAD => self.compare(Register::Y, AddressingMode::Immediate),
            0xAE => self.registers.a = self.pop_8(),
            0xAF => self.store(Register::A, AddressingMode::IndirectAutoIncrement),

            0xB0 => self.br(self.registers.psw.c()),
            0xB1 => self.tcall_n(11),
            0xB2 => self.clr_n_bit(5),
            0xB3 => self.bb_sc(5, false),
            0xB4 => self.alu(AluType::Sbc, AddressingMode::XIndexedDirectPage),
            0xB5 => self.alu(AluType::Sbc, AddressingMode::XIndexedAbsolute),
            0xB6 => self.alu(AluType::Sbc, AddressingMode::YIndexedAbsolute),
            0xB7 => self.alu(AluType::Sbc, AddressingMode::IndirectYIndexedIndirect),
            0xB8 => self.alu(AluType::Sbc, AddressingMode::ImmediateDataToDirectPage),
            0xB9 => self.alu(AluType::Sbc, AddressingMode::IndirectPageToIndirectPage),
            0xBA => self.movw_ya_dp(),
            0xBB => self.modify(AddressingMode::XIndexedDirectPage, Self::inc),
            0xBC => self.registers.a = self.inc(self.registers.a),
            0xBD => self.registers.sp = self.registers.x,
            0xBE => self.das(),
            0xBF => self.load(Register::A, AddressingMode::IndirectAutoIncrement),

            0xC0 => self.registers.psw.set_i(false),
            0xC1 => self.tcall_n(12),
            0xC2 => self.set_n_bit(6),
            0xC3 => self.bb_sc(6, true),
            0xC4 => self.store(Register::A, AddressingMode::DirectPage),
            0xC5 => self.store(Register::A, AddressingMode::Absolute),
            0xC6 => self.store(Register::A, AddressingMode::IndirectX),
            0xC7 => self.store(Register::A, AddressingMode::XIndexedIndirect),
            0xC8 => self.compare(Register::X, AddressingMode::Immediate),
            0xC9 => self.store(Register::X, AddressingMode::Absolute),
            0xCA => self.bit_op(BitOp::Store),
            0xCB => self.store(Register::Y, AddressingMode::DirectPage),
            0xCC => self.store(Register::Y, AddressingMode::Absolute),
            0xCD => self.load(Register::X, AddressingMode::Immediate),
            0xCE => self.registers.x = self.pop_8(),
            0xCF => self.mul(),

            0xD0 => self.br(!self.registers.psw.z()),
            0xD1 => self.tcall_n(13),
            0xD2 => self.clr_n_bit(6),
            0xD3 => self.bb_sc(6, false),
            0xD4 => self.store(Register::A, AddressingMode::XIndexedDirectPage),
            0xD5 => self.store(Register::A, AddressingMode::XIndexedAbsolute),
            0xD6 => self.store(Register::A, AddressingMode::YIndexedAbsolute),
            0xD7 => self.store(Register::A, AddressingMode::IndirectYIndexedIndirect),
            0xD8 => self.store(Register::X, AddressingMode::DirectPage),
            0xD9 => self.store(Register::X, AddressingMode::YIndexedDirectPage),
            0xDA => self.movw_dp_ya(),
            0xDB => self.store(Register::Y, AddressingMode::XIndexedDirectPage),
            0xDC => self.registers.y = self.dec(self.registers.y),
            0xDD => self.transfer(Register::Y, Register::A),
            0xDE => self.cbne(AddressingMode::XIndexedDirectPage),
            0xDF => self.daa(),

            0xE0 => {
                self.registers.psw.set_h(false);
                self.registers.psw.set_v(false);
            }
            0xE1 => self.tcall_n(14),
            0xE2 => self.set_n_bit(7),
            0xE3 => self.bb_sc(7, true),
            0xE4 => self.load(Register::A, AddressingMode::DirectPage),
            0xE5 => self.load(Register::A, AddressingMode::Absolute),
            0xE6 => self.load(Register::A, AddressingMode::IndirectX),
            0xE7 => self.load(Register::A, AddressingMode::XIndexedIndirect),
            0xE8 => self.load(Register::A, AddressingMode::Immediate),
            0xE9 => self.load(Register::X, AddressingMode::Absolute),
            0xEA => self.bit_op(BitOp::Not),
            0xEB => self.load(Register::Y, AddressingMode::DirectPage),
            0xEC => self.load(Register::Y, AddressingMode::Absolute),
            0xED => {
                let c = self.registers.psw.c();
                self.registers.psw.set_c(!c);
            }
            0xEE => self.registers.y = self.pop_8(),
            0xEF => self.halt("SLEEP"),

            0xF0 => self.br(self.registers.psw.z()),
            0xF1 => self.tcall_n(15),
            0xF2 => self.clr_n_bit(7),
            0xF3 => self.bb_sc(7, false),
            0xF4 => self.load(Register::A, AddressingMode::XIndexedDirectPage),
            0xF5 => self.load(Register::A, AddressingMode::XIndexedAbsolute),
            0xF6 => self.load(Register::A, AddressingMode::YIndexedAbsolute),
            0xF7 => self.load(Register::A, AddressingMode::IndirectYIndexedIndirect),
            0xF8 => self.load(Register::X, AddressingMode::DirectPage),
            0xF9 => self.load(Register::X, AddressingMode::YIndexedDirectPage),
            0xFA => self.mov_dp_dp(),
            0xFB => self.load(Register::Y, AddressingMode::XIndexedDirectPage),
            0xFC => self.registers.y = self.inc(self.registers.y),
            0xFD => self.transfer(Register::A, Register::Y),
            0xFE => self.dbnz_y(),
            0xFF => self.halt("STOP"),
        }
    }
}

impl Spc {
    fn read_8(&mut self, addr: WrapAddr) -> u8 {
        let addr = addr.addr;
        if addr & 0xFFF0 == 0x00F0 {
            self.io_read(addr as u8 & 0xF)
        } else {
            self.ram[addr as usize]
        }
    }

    fn write_8(&mut self, addr: WrapAddr, data: u8) {
        let addr = addr.addr;
        if addr & 0xFFF0 == 0x00F0 {
            self.io_write(addr as u8 & 0xF, data);
        }
        self.poke(addr, data);
    }

    fn io_read(&mut self, reg: u8) -> u8 {
        let now = self.cycles;
        match reg {
            0x2 => self.io.dsp_addr,
            0x3 => self.io.dsp.read(self.io.dsp_addr),
            0x4..=0x7 => self.io.cpu_in[(reg - 4) as usize],
            0x8 | 0x9 => self.ram[0xF0 + reg as usize],
            0xD..=0xF => self.io.timers[(reg - 0xD) as usize].read_counter(now),
            // TEST, CONTROL and the timer targets are write-only
            _ => 0,
        }
    }

    fn io_write(&mut self, reg: u8, data: u8) {
        let now = self.cycles;
        match reg {
            0x0 => {
                if data != 0x0A {
                    warn!("SPC TEST <- {data:#04X}");
                }
            }
            0x1 => {
                for (i, timer) in self.io.timers.iter_mut().enumerate() {
                    timer.set_enabled(data & (1 << i) != 0, now);
                }
                if data & 0x10 != 0 {
                    self.io.cpu_in[0] = 0;
                    self.io.cpu_in[1] = 0;
                }
                if data & 0x20 != 0 {
                    self.io.cpu_in[2] = 0;
                    self.io.cpu_in[3] = 0;
                }
                self.set_rom_enable(data & 0x80 != 0);
            }
            0x2 => self.io.dsp_addr = data,
            0x3 => {
                // 0x80-0xFF is a read-only mirror
                if self.io.dsp_addr < 0x80 {
                    self.io.dsp.write(self.io.dsp_addr, data);
                }
            }
            0x4..=0x7 => {
                debug!("SPC port {} <- {data:#04X}", reg - 4);
                self.io.cpu_out[(reg - 4) as usize] = data;
            }
            0xA..=0xC => self.io.timers[(reg - 0xA) as usize].set_target(data, now),
            _ => {}
        }
    }

    fn fetch_8(&mut self) -> u8 {
        let ret = self.read_8(WrapAddr::abs(self.registers.pc));
        self.registers.pc = self.registers.pc.wrapping_add(1);
        ret
    }

    fn fetch_16(&mut self) -> u16 {
        let lo = self.fetch_8();
        let hi = self.fetch_8();
        u16::from_le_bytes([lo, hi])
    }

    fn read_16(&mut self, addr: WrapAddr) -> u16 {
        let lo = self.read_8(addr);
        let hi = self.read_8(addr.offset(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_16(&mut self, addr: WrapAddr, data: u16) {
        let [lo, hi] = data.to_le_bytes();
        self.write_8(addr, lo);
        self.write_8(addr.offset(1), hi);
    }

    fn push_8(&mut self, data: u8) {
        self.write_8(WrapAddr::abs(0x100 | self.registers.sp as u16), data);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn push_16(&mut self, data: u16) {
        self.push_8((data >> 8) as u8);
        self.push_8(data as u8);
    }

    fn pop_8(&mut self) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        self.read_8(WrapAddr::abs(0x100 | self.registers.sp as u16))
    }

    fn pop_16(&mut self) -> u16 {
        let lo = self.pop_8();
        let hi = self.pop_8();
        u16::from_le_bytes([lo, hi])
    }

    fn set_nz(&mut self, val: u8) {
        self.registers.psw.set_n(val & 0x80 != 0);
        self.registers.psw.set_z(val == 0);
    }

    fn set_nz16(&mut self, val: u16) {
        self.registers.psw.set_n(val & 0x8000 != 0);
        self.registers.psw.set_z(val == 0);
    }

    fn ya(&self) -> u16 {
        u16::from_le_bytes([self.registers.a, self.registers.y])
    }

    fn set_ya(&mut self, val: u16) {
        [self.registers.a, self.registers.y] = val.to_le_bytes();
    }

    fn reg(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.registers.a,
            Register::X => self.registers.x,
            Register::Y => self.registers.y,
            Register::Sp => self.registers.sp,
        }
    }

    fn set_reg(&mut self, reg: Register, val: u8) {
        match reg {
            Register::A => self.registers.a = val,
            Register::X => self.registers.x = val,
            Register::Y => self.registers.y = val,
            Register::Sp => self.registers.sp = val,
        }
    }

    fn dp(&self, offset: u8) -> u16 {
        (self.registers.psw.p() as u16) << 8 | offset as u16
    }

    fn get_warp_address(&mut self, mode: AddressingMode) -> WrapAddr {
        match mode {
            AddressingMode::Immediate => {
                let addr = self.registers.pc;
                self.registers.pc = self.registers.pc.wrapping_add(1);
                WrapAddr::abs(addr)
            }
            AddressingMode::DirectPage => {
                let offset = self.fetch_8();
                WrapAddr::page(self.dp(offset))
            }
            AddressingMode::XIndexedDirectPage => {
                let offset = self.fetch_8().wrapping_add(self.registers.x);
                WrapAddr::page(self.dp(offset))
            }
            AddressingMode::YIndexedDirectPage => {
                let offset = self.fetch_8().wrapping_add(self.registers.y);
                WrapAddr::page(self.dp(offset))
            }
            AddressingMode::IndirectX => WrapAddr::page(self.dp(self.registers.x)),
            AddressingMode::IndirectY => WrapAddr::page(self.dp(self.registers.y)),
            AddressingMode::IndirectAutoIncrement => {
                let addr = self.dp(self.registers.x);
                self.registers.x = self.registers.x.wrapping_add(1);
                WrapAddr::page(addr)
            }
            AddressingMode::Absolute => WrapAddr::abs(self.fetch_16()),
            AddressingMode::XIndexedAbsolute => {
                WrapAddr::abs(self.fetch_16().wrapping_add(self.registers.x as u16))
            }
            AddressingMode::YIndexedAbsolute => {
                WrapAddr::abs(self.fetch_16().wrapping_add(self.registers.y as u16))
            }
            AddressingMode::XIndexedIndirect => {
                let offset = self.fetch_8().wrapping_add(self.registers.x);
                let ptr = WrapAddr::page(self.dp(offset));
                WrapAddr::abs(self.read_16(ptr))
            }
            AddressingMode::IndirectYIndexedIndirect => {
                let offset = self.fetch_8();
                let ptr = WrapAddr::page(self.dp(offset));
                let base = self.read_16(ptr);
                WrapAddr::abs(base.wrapping_add(self.registers.y as u16))
            }
            AddressingMode::DirectPageToDirectPage
            | AddressingMode::IndirectPageToIndirectPage
            | AddressingMode::ImmediateDataToDirectPage => {
                unreachable!("get_warp_address, mode: {:?}", mode)
            }
        }
    }

    /// Absolute bit operand `aaaa.b`: 13-bit address and 3-bit index.
    fn fetch_bit_operand(&mut self) -> (WrapAddr, u8) {
        let baaa = self.fetch_16();
        (WrapAddr::abs(baaa & 0x1FFF), (baaa >> 13) as u8)
    }
}

impl Spc {
    fn load(&mut self, reg: Register, mode: AddressingMode) {
        let addr = self.get_warp_address(mode);
        let val = self.read_8(addr);
        self.set_nz(val);
        self.set_reg(reg, val);
    }

    fn store(&mut self, reg: Register, mode: AddressingMode) {
        let addr = self.get_warp_address(mode);
        self.write_8(addr, self.reg(reg));
    }

    fn transfer(&mut self, from: Register, to: Register) {
        let val = self.reg(from);
        self.set_nz(val);
        self.set_reg(to, val);
    }

    fn mov_dp_dp(&mut self) {
        let src = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_8(src);
        let dst = self.get_warp_address(AddressingMode::DirectPage);
        self.write_8(dst, val);
    }

    fn mov_dp_imm(&mut self) {
        let val = self.fetch_8();
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        self.write_8(addr, val);
    }

    fn alu_op(&mut self, alu_type: AluType, lhs: u8, rhs: u8) -> u8 {
        let val = match alu_type {
            AluType::Or => lhs | rhs,
            AluType::And => lhs & rhs,
            AluType::Eor => lhs ^ rhs,
            AluType::Cmp => {
                let (result, borrow) = lhs.overflowing_sub(rhs);
                self.registers.psw.set_c(!borrow);
                result
            }
            AluType::Adc => self.adc(lhs, rhs),
            AluType::Sbc => self.adc(lhs, !rhs),
        };
        self.set_nz(val);
        val
    }

    fn alu(&mut self, alu_type: AluType, mode: AddressingMode) {
        let write_back = alu_type != AluType::Cmp;
        match mode {
            AddressingMode::DirectPageToDirectPage => {
                let src = self.get_warp_address(AddressingMode::DirectPage);
                let rhs = self.read_8(src);
                let dst = self.get_warp_address(AddressingMode::DirectPage);
                let lhs = self.read_8(dst);
                let val = self.alu_op(alu_type, lhs, rhs);
                if write_back {
                    self.write_8(dst, val);
                }
            }
            AddressingMode::ImmediateDataToDirectPage => {
                let rhs = self.fetch_8();
                let dst = self.get_warp_address(AddressingMode::DirectPage);
                let lhs = self.read_8(dst);
                let val = self.alu_op(alu_type, lhs, rhs);
                if write_back {
                    self.write_8(dst, val);
                }
            }
            AddressingMode::IndirectPageToIndirectPage => {
                let src = self.get_warp_address(AddressingMode::IndirectY);
                let rhs = self.read_8(src);
                let dst = self.get_warp_address(AddressingMode::IndirectX);
                let lhs = self.read_8(dst);
                let val = self.alu_op(alu_type, lhs, rhs);
                if write_back {
                    self.write_8(dst, val);
                }
            }
            _ => {
                let addr = self.get_warp_address(mode);
                let rhs = self.read_8(addr);
                let val = self.alu_op(alu_type, self.registers.a, rhs);
                if write_back {
                    self.registers.a = val;
                }
            }
        }
    }

    // SBC is ADC with the operand inverted
    fn adc(&mut self, lhs: u8, rhs: u8) -> u8 {
        let c = self.registers.psw.c() as u16;
        let v = lhs as u16 + rhs as u16 + c;
        let h = (lhs & 0xF) as u16 + (rhs & 0xF) as u16 + c;
        self.registers.psw.set_c(v > 0xFF);
        self.registers
            .psw
            .set_v(!(lhs ^ rhs) & (lhs ^ v as u8) & 0x80 != 0);
        self.registers.psw.set_h(h > 0xF);
        v as u8
    }

    fn compare(&mut self, reg: Register, mode: AddressingMode) {
        let addr = self.get_warp_address(mode);
        let operand = self.read_8(addr);
        self.alu_op(AluType::Cmp, self.reg(reg), operand);
    }

    fn inc(&mut self, val: u8) -> u8 {
        let val = val.wrapping_add(1);
        self.set_nz(val);
        val
    }

    fn dec(&mut self, val: u8) -> u8 {
        let val = val.wrapping_sub(1);
        self.set_nz(val);
        val
    }

    fn modify(&mut self, mode: AddressingMode, f: fn(&mut Self, u8) -> u8) {
        let addr = self.get_warp_address(mode);
        let val = self.read_8(addr);
        let val = f(self, val);
        self.write_8(addr, val);
    }

    fn shift_op(&mut self, shift: Shift, val: u8) -> u8 {
        let carry = self.registers.psw.c() as u8;
        let (ret, c) = match shift {
            Shift::Asl => (val << 1, val & 0x80 != 0),
            Shift::Rol => (val << 1 | carry, val & 0x80 != 0),
            Shift::Lsr => (val >> 1, val & 1 != 0),
            Shift::Ror => (val >> 1 | carry << 7, val & 1 != 0),
        };
        self.registers.psw.set_c(c);
        self.set_nz(ret);
        ret
    }

    fn shift_a(&mut self, shift: Shift) {
        self.registers.a = self.shift_op(shift, self.registers.a);
    }

    fn shift(&mut self, shift: Shift, mode: AddressingMode) {
        let addr = self.get_warp_address(mode);
        let val = self.read_8(addr);
        let val = self.shift_op(shift, val);
        self.write_8(addr, val);
    }

    fn movw_ya_dp(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_16(addr);
        self.set_nz16(val);
        self.set_ya(val);
    }

    fn movw_dp_ya(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        self.write_16(addr, self.ya());
    }

    fn addw(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let operand = self.read_16(addr);
        let ya = self.ya();
        self.registers.psw.set_c(false);
        let lo = self.adc(ya as u8, operand as u8);
        let hi = self.adc((ya >> 8) as u8, (operand >> 8) as u8);
        let val = u16::from_le_bytes([lo, hi]);
        self.set_nz16(val);
        self.set_ya(val);
    }

    fn subw(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let operand = self.read_16(addr);
        let ya = self.ya();
        self.registers.psw.set_c(true);
        let lo = self.adc(ya as u8, !(operand as u8));
        let hi = self.adc((ya >> 8) as u8, !((operand >> 8) as u8));
        let val = u16::from_le_bytes([lo, hi]);
        self.set_nz16(val);
        self.set_ya(val);
    }

    fn cmpw(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let operand = self.read_16(addr);
        let (result, borrow) = self.ya().overflowing_sub(operand);
        self.registers.psw.set_c(!borrow);
        self.set_nz16(result);
    }

    fn step_word(&mut self, increment: bool) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_16(addr);
        let val = if increment {
            val.wrapping_add(1)
        } else {
            val.wrapping_sub(1)
        };
        self.set_nz16(val);
        self.write_16(addr, val);
    }

    fn mul(&mut self) {
        let val = self.registers.y as u16 * self.registers.a as u16;
        self.set_ya(val);
        self.set_nz(self.registers.y);
    }

    /// DIV YA,X. Quotients past 511 follow the hardware's shift-subtract
    /// overflow pattern instead of saturating.
    fn div(&mut self) {
        let ya = self.ya() as u32;
        let x = self.registers.x as u32;
        let y = self.registers.y as u32;

        self.registers
            .psw
            .set_h(self.registers.y & 0xF >= self.registers.x & 0xF);
        self.registers.psw.set_v(y >= x);

        if y < x << 1 {
            self.registers.a = (ya / x) as u8;
            self.registers.y = (ya % x) as u8;
        } else {
            let rest = ya - (x << 9);
            self.registers.a = (255 - rest / (256 - x)) as u8;
            self.registers.y = (x + rest % (256 - x)) as u8;
        }
        self.set_nz(self.registers.a);
    }

    fn daa(&mut self) {
        let src = self.registers.a;
        if self.registers.psw.c() || src > 0x99 {
            self.registers.a = self.registers.a.wrapping_add(0x60);
            self.registers.psw.set_c(true);
        }
        if self.registers.psw.h() || src & 0x0F > 9 {
            self.registers.a = self.registers.a.wrapping_add(6);
        }
        self.set_nz(self.registers.a);
    }

    fn das(&mut self) {
        let src = self.registers.a;
        if !self.registers.psw.c() || src > 0x99 {
            self.registers.a = self.registers.a.wrapping_sub(0x60);
            self.registers.psw.set_c(false);
        }
        if !self.registers.psw.h() || src & 0x0F > 9 {
            self.registers.a = self.registers.a.wrapping_sub(6);
        }
        self.set_nz(self.registers.a);
    }

    fn xcn(&mut self) {
        self.registers.a = self.registers.a.rotate_right(4);
        self.set_nz(self.registers.a);
    }

    fn set_n_bit(&mut self, bit: u8) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_8(addr) | (1 << bit);
        self.write_8(addr, val);
    }

    fn clr_n_bit(&mut self, bit: u8) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_8(addr) & !(1 << bit);
        self.write_8(addr, val);
    }

    fn bit_op(&mut self, op: BitOp) {
        let (addr, bit) = self.fetch_bit_operand();
        let operand = self.read_8(addr);
        let set = operand & (1 << bit) != 0;
        let c = self.registers.psw.c();
        match op {
            BitOp::Or => self.registers.psw.set_c(c || set),
            BitOp::OrNot => self.registers.psw.set_c(c || !set),
            BitOp::And => self.registers.psw.set_c(c && set),
            BitOp::AndNot => self.registers.psw.set_c(c && !set),
            BitOp::Eor => self.registers.psw.set_c(c ^ set),
            BitOp::Load => self.registers.psw.set_c(set),
            BitOp::Store => {
                let val = operand & !(1 << bit) | (c as u8) << bit;
                self.write_8(addr, val);
            }
            BitOp::Not => self.write_8(addr, operand ^ (1 << bit)),
        }
    }

    fn tset(&mut self) {
        let addr = self.get_warp_address(AddressingMode::Absolute);
        let val = self.read_8(addr);
        self.set_nz(self.registers.a.wrapping_sub(val));
        self.write_8(addr, val | self.registers.a);
    }

    fn tclr(&mut self) {
        let addr = self.get_warp_address(AddressingMode::Absolute);
        let val = self.read_8(addr);
        self.set_nz(self.registers.a.wrapping_sub(val));
        self.write_8(addr, val & !self.registers.a);
    }

    fn branch_to(&mut self, offset: u8, cond: bool) {
        if cond {
            self.registers.pc = self.registers.pc.wrapping_add(offset as i8 as u16);
            self.taken += BRANCH_TAKEN;
        }
    }

    fn br(&mut self, cond: bool) {
        let offset = self.fetch_8();
        self.branch_to(offset, cond);
    }

    fn bb_sc(&mut self, bit: u8, is_set: bool) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_8(addr);
        let offset = self.fetch_8();
        self.branch_to(offset, (val & (1 << bit) != 0) == is_set);
    }

    fn cbne(&mut self, mode: AddressingMode) {
        let addr = self.get_warp_address(mode);
        let operand = self.read_8(addr);
        let offset = self.fetch_8();
        self.branch_to(offset, self.registers.a != operand);
    }

    fn dbnz_y(&mut self) {
        self.registers.y = self.registers.y.wrapping_sub(1);
        let offset = self.fetch_8();
        self.branch_to(offset, self.registers.y != 0);
    }

    fn dbnz_dp(&mut self) {
        let addr = self.get_warp_address(AddressingMode::DirectPage);
        let val = self.read_8(addr).wrapping_sub(1);
        self.write_8(addr, val);
        let offset = self.fetch_8();
        self.branch_to(offset, val != 0);
    }

    fn jmp_x_abs(&mut self) {
        let addr = self.get_warp_address(AddressingMode::XIndexedAbsolute);
        self.registers.pc = self.read_16(addr);
    }

    fn call(&mut self) {
        let addr = self.fetch_16();
        self.push_16(self.registers.pc);
        self.registers.pc = addr;
    }

    fn tcall_n(&mut self, n: u16) {
        self.push_16(self.registers.pc);
        self.registers.pc = self.read_16(WrapAddr::abs(0xFFDE - 2 * n));
    }

    fn pcall(&mut self) {
        let n = self.fetch_8();
        self.push_16(self.registers.pc);
        self.registers.pc = 0xFF00 | n as u16;
    }

    fn reti(&mut self) {
        let psw = self.pop_8();
        self.registers.psw = psw.into();
        self.registers.pc = self.pop_16();
    }

    fn brk(&mut self) {
        self.push_16(self.registers.pc);
        self.push_8(self.registers.psw.into());
        self.registers.psw.set_i(false);
        self.registers.psw.set_b(true);
        self.registers.pc = self.read_16(WrapAddr::abs(0xFFDE));
    }

    fn halt(&mut self, name: &str) {
        warn!("SPC {name} at {:04X}", self.registers.pc.wrapping_sub(1));
        self.halted = true;
    }
}

#[derive(Debug, Clone, Copy)]
enum Register {
    A,
    X,
    Y,
    Sp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluType {
    Or,
    And,
    Eor,
    Cmp,
    Adc,
    Sbc,
}

#[derive(Debug, Clone, Copy)]
enum Shift {
    Asl,
    Rol,
    Lsr,
    Ror,
}

#[derive(Debug, Clone, Copy)]
enum BitOp {
    Or,
    OrNot,
    And,
    AndNot,
    Eor,
    Load,
    Store,
    Not,
}

#[derive(Debug, Clone, Copy)]
enum AddressingMode {
    Immediate,
    DirectPage,
    XIndexedDirectPage,
    YIndexedDirectPage,
    IndirectX,
    IndirectY,
    IndirectAutoIncrement,
    DirectPageToDirectPage,
    IndirectPageToIndirectPage,
    ImmediateDataToDirectPage,
    Absolute,
    XIndexedAbsolute,
    YIndexedAbsolute,
    XIndexedIndirect,
    IndirectYIndexedIndirect,
}

/// Address plus whether its high byte is pinned (direct page words wrap
/// inside the page).
#[derive(Clone, Copy)]
struct WrapAddr {
    addr: u16,
    page: bool,
}

impl WrapAddr {
    fn abs(addr: u16) -> WrapAddr {
        WrapAddr { addr, page: false }
    }

    fn page(addr: u16) -> WrapAddr {
        WrapAddr { addr, page: true }
    }

    fn offset(&self, offset: u16) -> WrapAddr {
        let addr = if self.page {
            (self.addr & 0xFF00) | (self.addr.wrapping_add(offset) & 0xFF)
        } else {
            self.addr.wrapping_add(offset)
        };
        WrapAddr { addr, ..*self }
    }
}

struct Registers {
    a: u8,
    x: u8,
    y: u8,
    psw: Psw,
    sp: u8,
    pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            a: 0,
            x: 0,
            y: 0,
            psw: Psw::default(),
            sp: 0xEF,
            pc: u16::from_le_bytes([ROM[0x3E], ROM[0x3F]]),
        }
    }
}

#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy)]
struct Psw {
    c: bool,
    z: bool,
    i: bool,
    h: bool,
    b: bool,
    p: bool,
    v: bool,
    n: bool,
}

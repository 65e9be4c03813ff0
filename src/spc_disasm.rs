//! SPC700 disassembler for instruction traces.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Implied,
    Reg(&'static str),
    Imm,
    Dp,
    DpX,
    DpY,
    DpXInd,
    DpIndY,
    Abs,
    AbsX,
    AbsY,
    AbsXInd,
    Rel,
    DpBit(u8),
    MemBit,
    NotMemBit,
    UPage,
    Vector(u8),
}

use Operand::*;

const A: Operand = Reg("A");
const X: Operand = Reg("X");
const Y: Operand = Reg("Y");
const YA: Operand = Reg("YA");
const IND_X: Operand = Reg("(X)");
const IND_Y: Operand = Reg("(Y)");

impl Operand {
    fn size(self) -> u16 {
        match self {
            Implied | Reg(_) | Vector(_) => 0,
            Imm | Dp | DpX | DpY | DpXInd | DpIndY | Rel | DpBit(_) | UPage => 1,
            Abs | AbsX | AbsY | AbsXInd | MemBit | NotMemBit => 2,
        }
    }

    fn format(self, bytes: &[u8], next_pc: u16) -> String {
        let b = bytes.first().copied().unwrap_or(0);
        let w = match bytes {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        };
        match self {
            Implied => String::new(),
            Reg(name) => name.to_string(),
            Imm => format!("#${b:02X}"),
            Dp => format!("${b:02X}"),
            DpX => format!("${b:02X}+X"),
            DpY => format!("${b:02X}+Y"),
            DpXInd => format!("[${b:02X}+X]"),
            DpIndY => format!("[${b:02X}]+Y"),
            Abs => format!("${w:04X}"),
            AbsX => format!("${w:04X}+X"),
            AbsY => format!("${w:04X}+Y"),
            AbsXInd => format!("[${w:04X}+X]"),
            Rel => format!("${:04X}", next_pc.wrapping_add(b as i8 as u16)),
            DpBit(bit) => format!("${b:02X}.{bit}"),
            MemBit => format!("${:04X}.{}", w & 0x1FFF, w >> 13),
            NotMemBit => format!("/${:04X}.{}", w & 0x1FFF, w >> 13),
            UPage => format!("$FF{b:02X}"),
            Vector(n) => n.to_string(),
        }
    }
}

/// Mnemonic, destination and source. The last field is set when the
/// source operand is encoded first.
type Decoded = (&'static str, Operand, Operand, bool);

fn decode(op: u8) -> Decoded {
    const ALU: [&str; 6] = ["OR", "AND", "EOR", "CMP", "ADC", "SBC"];
    const SHIFT: [&str; 6] = ["ASL", "ROL", "LSR", "ROR", "DEC", "INC"];

    let hi = op >> 4;
    let lo = op & 0xF;
    let odd = hi & 1 != 0;
    let mode = |lo: u8| match (lo, odd) {
        (4, false) => Dp,
        (4, true) => DpX,
        (5, false) => Abs,
        (5, true) => AbsX,
        (6, false) => IND_X,
        (6, true) => AbsY,
        (7, false) => DpXInd,
        _ => DpIndY,
    };

    match (hi, lo) {
        (_, 0x1) => ("TCALL", Vector(hi), Implied, false),
        (_, 0x2) if !odd => ("SET1", DpBit(op >> 5), Implied, false),
        (_, 0x2) => ("CLR1", DpBit(op >> 5), Implied, false),
        (_, 0x3) if !odd => ("BBS", DpBit(op >> 5), Rel, false),
        (_, 0x3) => ("BBC", DpBit(op >> 5), Rel, false),

        (0x0..=0xB, 0x4..=0x7) => (ALU[hi as usize >> 1], A, mode(lo), false),
        (0x0..=0xB, 0x8) if !odd => (ALU[hi as usize >> 1], A, Imm, false),
        (0x0..=0xB, 0x8) => (ALU[hi as usize >> 1], Dp, Imm, true),
        (0x0..=0xB, 0x9) if !odd => (ALU[hi as usize >> 1], Dp, Dp, true),
        (0x0..=0xB, 0x9) => (ALU[hi as usize >> 1], IND_X, IND_Y, false),
        (0xC | 0xD, 0x4..=0x7) => ("MOV", mode(lo), A, false),
        (0xE | 0xF, 0x4..=0x7) => ("MOV", A, mode(lo), false),

        (0x0..=0xB, 0xB) => (SHIFT[hi as usize >> 1], if odd { DpX } else { Dp }, Implied, false),
        (0x0..=0xB, 0xC) => (SHIFT[hi as usize >> 1], if odd { A } else { Abs }, Implied, false),

        (_, 0x0) if odd => {
            const BRANCH: [&str; 8] = ["BPL", "BMI", "BVC", "BVS", "BCC", "BCS", "BNE", "BEQ"];
            (BRANCH[hi as usize >> 1], Rel, Implied, false)
        }
        (_, 0x0) => {
            const FLAG: [&str; 8] = ["NOP", "CLRP", "SETP", "CLRC", "SETC", "EI", "DI", "CLRV"];
            (FLAG[hi as usize >> 1], Implied, Implied, false)
        }

        _ => match op {
            0xC8 => ("CMP", X, Imm, false),
            0xD8 => ("MOV", Dp, X, false),
            0xE8 => ("MOV", A, Imm, false),
            0xF8 => ("MOV", X, Dp, false),
            0xC9 => ("MOV", Abs, X, false),
            0xD9 => ("MOV", DpY, X, false),
            0xE9 => ("MOV", X, Abs, false),
            0xF9 => ("MOV", X, DpY, false),

            0x0A => ("OR1", Reg("C"), MemBit, false),
            0x2A => ("OR1", Reg("C"), NotMemBit, false),
            0x4A => ("AND1", Reg("C"), MemBit, false),
            0x6A => ("AND1", Reg("C"), NotMemBit, false),
            0x8A => ("EOR1", Reg("C"), MemBit, false),
            0xAA => ("MOV1", Reg("C"), MemBit, false),
            0xCA => ("MOV1", MemBit, Reg("C"), false),
            0xEA => ("NOT1", MemBit, Implied, false),
            0x1A => ("DECW", Dp, Implied, false),
            0x3A => ("INCW", Dp, Implied, false),
            0x5A => ("CMPW", YA, Dp, false),
            0x7A => ("ADDW", YA, Dp, false),
            0x9A => ("SUBW", YA, Dp, false),
            0xBA => ("MOVW", YA, Dp, false),
            0xDA => ("MOVW", Dp, YA, false),
            0xFA => ("MOV", Dp, Dp, true),

            0xCB => ("MOV", Dp, Y, false),
            0xDB => ("MOV", DpX, Y, false),
            0xEB => ("MOV", Y, Dp, false),
            0xFB => ("MOV", Y, DpX, false),
            0xCC => ("MOV", Abs, Y, false),
            0xDC => ("DEC", Y, Implied, false),
            0xEC => ("MOV", Y, Abs, false),
            0xFC => ("INC", Y, Implied, false),

            0x0D => ("PUSH", Reg("PSW"), Implied, false),
            0x2D => ("PUSH", A, Implied, false),
            0x4D => ("PUSH", X, Implied, false),
            0x6D => ("PUSH", Y, Implied, false),
            0x1D => ("DEC", X, Implied, false),
            0x3D => ("INC", X, Implied, false),
            0x5D => ("MOV", X, A, false),
            0x7D => ("MOV", A, X, false),
            0x8D => ("MOV", Y, Imm, false),
            0x9D => ("MOV", X, Reg("SP"), false),
            0xAD => ("CMP", Y, Imm, false),
            0xBD => ("MOV", Reg("SP"), X, false),
            0xCD => ("MOV", X, Imm, false),
            0xDD => ("MOV", A, Y, false),
            0xED => ("NOTC", Implied, Implied, false),
            0xFD => ("MOV", Y, A, false),

            0x0E => ("TSET1", Abs, Implied, false),
            0x1E => ("CMP", X, Abs, false),
            0x2E => ("CBNE", Dp, Rel, false),
            0x3E => ("CMP", X, Dp, false),
            0x4E => ("TCLR1", Abs, Implied, false),
            0x5E => ("CMP", Y, Abs, false),
            0x6E => ("DBNZ", Dp, Rel, false),
            0x7E => ("CMP", Y, Dp, false),
            0x8E => ("POP", Reg("PSW"), Implied, false),
            0x9E => ("DIV", YA, X, false),
            0xAE => ("POP", A, Implied, false),
            0xBE => ("DAS", A, Implied, false),
            0xCE => ("POP", X, Implied, false),
            0xDE => ("CBNE", DpX, Rel, false),
            0xEE => ("POP", Y, Implied, false),
            0xFE => ("DBNZ", Y, Rel, false),

            0x0F => ("BRK", Implied, Implied, false),
            0x1F => ("JMP", AbsXInd, Implied, false),
            0x2F => ("BRA", Rel, Implied, false),
            0x3F => ("CALL", Abs, Implied, false),
            0x4F => ("PCALL", UPage, Implied, false),
            0x5F => ("JMP", Abs, Implied, false),
            0x6F => ("RET", Implied, Implied, false),
            0x7F => ("RETI", Implied, Implied, false),
            0x8F => ("MOV", Dp, Imm, true),
            0x9F => ("XCN", A, Implied, false),
            0xAF => ("MOV", Reg("(X)+"), A, false),
            0xBF => ("MOV", A, Reg("(X)+"), false),
            0xCF => ("MUL", YA, Implied, false),
            0xDF => ("DAA", A, Implied, false),
            0xEF => ("SLEEP", Implied, Implied, false),
            _ => ("STOP", Implied, Implied, false),
        },
    }
}

/// Disassembles the instruction at `pc`, reading memory through `read`.
/// Returns the text and the instruction length in bytes.
pub fn disassemble(read: impl Fn(u16) -> u8, pc: u16) -> (String, u16) {
    let op = read(pc);
    let (mnemonic, dst, src, swapped) = decode(op);
    let len = 1 + dst.size() + src.size();
    let next_pc = pc.wrapping_add(len);

    let fetch = |offset: u16, size: u16| -> Vec<u8> {
        (0..size)
            .map(|i| read(pc.wrapping_add(1 + offset + i)))
            .collect()
    };
    let (dst_bytes, src_bytes) = if swapped {
        (fetch(src.size(), dst.size()), fetch(0, src.size()))
    } else {
        (fetch(0, dst.size()), fetch(dst.size(), src.size()))
    };

    let dst = dst.format(&dst_bytes, next_pc);
    let src = src.format(&src_bytes, next_pc);
    let text = match (dst.is_empty(), src.is_empty()) {
        (true, _) => mnemonic.to_string(),
        (false, true) => format!("{mnemonic} {dst}"),
        (false, false) => format!("{mnemonic} {dst},{src}"),
    };
    (text, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dis(bytes: &[u8], pc: u16) -> (String, u16) {
        disassemble(
            |addr| bytes.get(addr.wrapping_sub(pc) as usize).copied().unwrap_or(0),
            pc,
        )
    }

    #[test]
    fn implied_and_register() {
        assert_eq!(dis(&[0x00], 0), ("NOP".to_string(), 1));
        assert_eq!(dis(&[0x7D], 0), ("MOV A,X".to_string(), 1));
        assert_eq!(dis(&[0x9E], 0), ("DIV YA,X".to_string(), 1));
        assert_eq!(dis(&[0xBF], 0), ("MOV A,(X)+".to_string(), 1));
        assert_eq!(dis(&[0x19], 0), ("OR (X),(Y)".to_string(), 1));
        assert_eq!(dis(&[0xC1], 0), ("TCALL 12".to_string(), 1));
        assert_eq!(dis(&[0xFF], 0), ("STOP".to_string(), 1));
    }

    #[test]
    fn direct_page_and_immediate() {
        assert_eq!(dis(&[0xE8, 0x42], 0), ("MOV A,#$42".to_string(), 2));
        assert_eq!(dis(&[0xC4, 0xF4], 0), ("MOV $F4,A".to_string(), 2));
        assert_eq!(dis(&[0xF4, 0x10], 0), ("MOV A,$10+X".to_string(), 2));
        assert_eq!(dis(&[0xF9, 0x20], 0), ("MOV X,$20+Y".to_string(), 2));
        assert_eq!(dis(&[0xE7, 0x30], 0), ("MOV A,[$30+X]".to_string(), 2));
        assert_eq!(dis(&[0x97, 0x30], 0), ("ADC A,[$30]+Y".to_string(), 2));
        assert_eq!(dis(&[0x0B, 0x05], 0), ("ASL $05".to_string(), 2));
        assert_eq!(dis(&[0xBA, 0xF4], 0), ("MOVW YA,$F4".to_string(), 2));
    }

    #[test]
    fn operands_encoded_source_first() {
        // MOV dp,#imm stores the immediate first
        assert_eq!(dis(&[0x8F, 0x6C, 0xF2], 0), ("MOV $F2,#$6C".to_string(), 3));
        assert_eq!(dis(&[0xFA, 0x10, 0x20], 0), ("MOV $20,$10".to_string(), 3));
        assert_eq!(dis(&[0x29, 0x01, 0x02], 0), ("AND $02,$01".to_string(), 3));
    }

    #[test]
    fn absolute_and_bits() {
        assert_eq!(dis(&[0xC5, 0x34, 0x12], 0), ("MOV $1234,A".to_string(), 3));
        assert_eq!(dis(&[0xF6, 0x00, 0x02], 0), ("MOV A,$0200+Y".to_string(), 3));
        assert_eq!(dis(&[0x0C, 0x00, 0x03], 0), ("ASL $0300".to_string(), 3));
        assert_eq!(dis(&[0x1F, 0x00, 0x10], 0), ("JMP [$1000+X]".to_string(), 3));
        assert_eq!(dis(&[0xE2, 0x40], 0), ("SET1 $40.7".to_string(), 2));
        assert_eq!(dis(&[0x32, 0x40], 0), ("CLR1 $40.1".to_string(), 2));
        // bit 5 of $0123
        assert_eq!(dis(&[0xAA, 0x23, 0xA1], 0), ("MOV1 C,$0123.5".to_string(), 3));
        assert_eq!(dis(&[0x6A, 0x23, 0xA1], 0), ("AND1 C,/$0123.5".to_string(), 3));
        assert_eq!(dis(&[0x4F, 0x80], 0), ("PCALL $FF80".to_string(), 2));
    }

    #[test]
    fn relative_targets_follow_the_instruction() {
        assert_eq!(dis(&[0x2F, 0xFE], 0x0204), ("BRA $0204".to_string(), 2));
        assert_eq!(dis(&[0xD0, 0x10], 0x0300), ("BNE $0312".to_string(), 2));
        assert_eq!(dis(&[0xFE, 0xFD], 0x0400), ("DBNZ Y,$03FF".to_string(), 2));
        assert_eq!(dis(&[0x2E, 0x05, 0x02], 0x0500), ("CBNE $05,$0505".to_string(), 3));
        assert_eq!(dis(&[0x13, 0x44, 0xFC], 0x0600), ("BBC $44.0,$05FF".to_string(), 3));
    }

    #[test]
    fn every_opcode_decodes() {
        for op in 0..=0xFFu8 {
            let (text, len) = dis(&[op, 0, 0], 0x1000);
            assert!(!text.is_empty());
            assert!((1..=3).contains(&len), "{op:02X} has length {len}");
        }
    }
}

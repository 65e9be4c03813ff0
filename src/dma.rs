use log::debug;
use modular_bitfield::bitfield;
use modular_bitfield::prelude::*;

/// B-bus register offsets for each transfer unit (DMAPx bits 0-2).
pub const TRANSFER_PATTERNS: [[u8; 4]; 8] = [
    [0, 0, 0, 0],
    [0, 1, 0, 1],
    [0, 0, 0, 0],
    [0, 0, 1, 1],
    [0, 1, 2, 3],
    [0, 1, 0, 1],
    [0, 0, 0, 0],
    [0, 0, 1, 1],
];

/// Bytes moved per HDMA line for each transfer unit.
pub const HDMA_LENGTHS: [usize; 8] = [1, 2, 2, 4, 4, 4, 2, 4];

// Master cycles
const DMA_START: u64 = 8;
const DMA_CHANNEL: u64 = 8;
const DMA_BYTE: u64 = 8;
const HDMA_START: u64 = 18;
const HDMA_CHANNEL: u64 = 8;
const HDMA_TABLE_BYTE: u64 = 8;
const HDMA_INDIRECT_FETCH: u64 = 16;

/// The two buses a channel moves data between. Accesses through this trait
/// are not charged memory speed; the engine charges fixed DMA costs.
pub trait DmaPort {
    fn a_read(&mut self, addr: u32) -> u8;
    fn a_write(&mut self, addr: u32, data: u8);
    fn b_read(&mut self, reg: u8) -> u8;
    fn b_write(&mut self, reg: u8, data: u8);
    fn elapse(&mut self, clock: u64);
}

#[bitfield(bits = 8)]
#[derive(Default, Clone, Copy, Debug)]
struct DmaParams {
    transfer_unit: B3,
    a_bus_address_step: AbusAddressStep,
    __: B1,
    hdma_addressing: HdmaAddressing,
    transfer_direction: TransferDirection,
}

#[derive(BitfieldSpecifier, Debug)]
#[bits = 2]
enum AbusAddressStep {
    Increment = 0,
    Fixed1 = 1,
    Decrement = 2,
    Fixed3 = 3,
}

#[derive(BitfieldSpecifier, Debug, PartialEq)]
#[bits = 1]
enum HdmaAddressing {
    Direct = 0,
    Indirect = 1,
}

#[derive(BitfieldSpecifier, Debug, PartialEq)]
#[bits = 1]
enum TransferDirection {
    AtoB = 0,
    BtoA = 1,
}

#[derive(Default, Debug, Clone, Copy)]
struct Channel {
    params: DmaParams,  // 0x43x0
    b_addr: u8,         // 0x43x1
    a_addr: u16,        // 0x43x2 0x43x3
    a_bank: u8,         // 0x43x4
    count: u16,         // 0x43x5 0x43x6, HDMA indirect address
    indirect_bank: u8,  // 0x43x7
    table_addr: u16,    // 0x43x8 0x43x9
    line_counter: u8,   // 0x43xA
    unused: u8,         // 0x43xB 0x43xF

    terminated: bool,
    do_transfer: bool,
}

impl Channel {
    fn unit(&self) -> usize {
        self.params.transfer_unit() as usize
    }

    fn a_step(&self) -> u16 {
        match self.params.a_bus_address_step() {
            AbusAddressStep::Increment => 1,
            AbusAddressStep::Decrement => 0xFFFF,
            AbusAddressStep::Fixed1 | AbusAddressStep::Fixed3 => 0,
        }
    }

    fn transfer(&self, port: &mut impl DmaPort, a: u32, b: u8) {
        match self.params.transfer_direction() {
            TransferDirection::AtoB => {
                let data = port.a_read(a);
                port.b_write(b, data);
            }
            TransferDirection::BtoA => {
                let data = port.b_read(b);
                port.a_write(a, data);
            }
        }
    }
}

#[derive(Default, Debug)]
pub struct Dma {
    channels: [Channel; 8],
    mdma_enable: u8, // 0x420B
    hdma_enable: u8, // 0x420C
}

impl Dma {
    pub fn read(&self, addr: u16) -> u8 {
        let ch = &self.channels[(addr >> 4) as usize & 7];
        match addr & 0xF {
            0x0 => ch.params.bytes[0],
            0x1 => ch.b_addr,
            0x2 => ch.a_addr as u8,
            0x3 => (ch.a_addr >> 8) as u8,
            0x4 => ch.a_bank,
            0x5 => ch.count as u8,
            0x6 => (ch.count >> 8) as u8,
            0x7 => ch.indirect_bank,
            0x8 => ch.table_addr as u8,
            0x9 => (ch.table_addr >> 8) as u8,
            0xA => ch.line_counter,
            0xB | 0xF => ch.unused,
            _ => (addr >> 8) as u8,
        }
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        let ch = &mut self.channels[(addr >> 4) as usize & 7];
        match addr & 0xF {
            0x0 => ch.params.bytes[0] = data,
            0x1 => ch.b_addr = data,
            0x2 => ch.a_addr = ch.a_addr & 0xFF00 | data as u16,
            0x3 => ch.a_addr = ch.a_addr & 0x00FF | (data as u16) << 8,
            0x4 => ch.a_bank = data,
            0x5 => ch.count = ch.count & 0xFF00 | data as u16,
            0x6 => ch.count = ch.count & 0x00FF | (data as u16) << 8,
            0x7 => ch.indirect_bank = data,
            0x8 => ch.table_addr = ch.table_addr & 0xFF00 | data as u16,
            0x9 => ch.table_addr = ch.table_addr & 0x00FF | (data as u16) << 8,
            0xA => ch.line_counter = data,
            0xB | 0xF => ch.unused = data,
            _ => debug!("Write to unused DMA register {addr:04X} = {data:02X}"),
        }
    }

    pub fn set_mdma_enable(&mut self, mask: u8) {
        self.mdma_enable = mask;
    }

    pub fn mdma_enable(&self) -> u8 {
        self.mdma_enable
    }

    pub fn set_hdma_enable(&mut self, mask: u8) {
        self.hdma_enable = mask;
    }

    pub fn hdma_enable(&self) -> u8 {
        self.hdma_enable
    }

    /// Runs every enabled channel to completion. The CPU is stalled for the
    /// whole transfer.
    pub fn process_mdma(&mut self, port: &mut impl DmaPort) {
        if self.mdma_enable == 0 {
            return;
        }
        port.elapse(DMA_START);
        for i in 0..8 {
            if self.mdma_enable & (1 << i) == 0 {
                continue;
            }
            port.elapse(DMA_CHANNEL);
            let ch = &mut self.channels[i];
            let pattern = TRANSFER_PATTERNS[ch.unit()];
            let step = ch.a_step();
            debug!(
                "MDMA[{i}]: {:02X}:{:04X} {} 21{:02X}, unit: {}, count: {}",
                ch.a_bank,
                ch.a_addr,
                if ch.params.transfer_direction() == TransferDirection::AtoB {
                    "->"
                } else {
                    "<-"
                },
                ch.b_addr,
                ch.unit(),
                ch.count,
            );

            let mut index = 0;
            loop {
                let a = (ch.a_bank as u32) << 16 | ch.a_addr as u32;
                let b = ch.b_addr.wrapping_add(pattern[index & 3]);
                ch.transfer(port, a, b);
                port.elapse(DMA_BYTE);

                ch.a_addr = ch.a_addr.wrapping_add(step);
                ch.count = ch.count.wrapping_sub(1);
                index += 1;
                if ch.count == 0 {
                    break;
                }
            }
            self.mdma_enable &= !(1 << i);
        }
        debug_assert_eq!(self.mdma_enable, 0, "MDMA channels left enabled");
    }

    /// Frame start: reload every table pointer and rearm all channels.
    pub fn hdma_init(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.table_addr = ch.a_addr;
            ch.line_counter = 0;
            ch.terminated = false;
            ch.do_transfer = false;
        }
    }

    pub fn process_hdma(&mut self, port: &mut impl DmaPort) {
        if self.hdma_enable == 0 {
            return;
        }
        port.elapse(HDMA_START);
        for i in 0..8 {
            if self.hdma_enable & (1 << i) != 0 && !self.channels[i].terminated {
                port.elapse(HDMA_CHANNEL);
                self.process_hdma_ch(i, port);
            }
        }
    }

    pub fn process_hdma_ch(&mut self, i: usize, port: &mut impl DmaPort) {
        let ch = &mut self.channels[i];
        if ch.terminated {
            return;
        }

        if ch.line_counter & 0x7F == 0 {
            ch.line_counter = port.a_read((ch.a_bank as u32) << 16 | ch.table_addr as u32);
            ch.table_addr = ch.table_addr.wrapping_add(1);
            port.elapse(HDMA_TABLE_BYTE);
            if ch.line_counter == 0 {
                debug!("HDMA[{i}] terminated");
                ch.terminated = true;
                return;
            }
            if ch.params.hdma_addressing() == HdmaAddressing::Indirect {
                let bank = (ch.a_bank as u32) << 16;
                let lo = port.a_read(bank | ch.table_addr as u32) as u16;
                ch.table_addr = ch.table_addr.wrapping_add(1);
                let hi = port.a_read(bank | ch.table_addr as u32) as u16;
                ch.table_addr = ch.table_addr.wrapping_add(1);
                ch.count = hi << 8 | lo;
                port.elapse(HDMA_INDIRECT_FETCH);
            }
            ch.do_transfer = true;
        }

        if ch.do_transfer {
            let pattern = TRANSFER_PATTERNS[ch.unit()];
            for &offset in pattern.iter().take(HDMA_LENGTHS[ch.unit()]) {
                let a = match ch.params.hdma_addressing() {
                    HdmaAddressing::Direct => {
                        let a = (ch.a_bank as u32) << 16 | ch.table_addr as u32;
                        ch.table_addr = ch.table_addr.wrapping_add(1);
                        a
                    }
                    HdmaAddressing::Indirect => {
                        let a = (ch.indirect_bank as u32) << 16 | ch.count as u32;
                        ch.count = ch.count.wrapping_add(1);
                        a
                    }
                };
                ch.transfer(port, a, ch.b_addr.wrapping_add(offset));
                port.elapse(DMA_BYTE);
            }
        }

        ch.line_counter = ch.line_counter.wrapping_sub(1);
        ch.do_transfer = ch.line_counter & 0x80 != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPort {
        mem: Vec<u8>,
        b_writes: Vec<(u8, u8)>,
        b_data: u8,
        cycles: u64,
    }

    impl TestPort {
        fn new() -> TestPort {
            TestPort {
                mem: vec![0; 0x20000],
                b_writes: Vec::new(),
                b_data: 0,
                cycles: 0,
            }
        }
    }

    impl DmaPort for TestPort {
        fn a_read(&mut self, addr: u32) -> u8 {
            self.mem[addr as usize & 0x1FFFF]
        }
        fn a_write(&mut self, addr: u32, data: u8) {
            self.mem[addr as usize & 0x1FFFF] = data;
        }
        fn b_read(&mut self, _reg: u8) -> u8 {
            self.b_data = self.b_data.wrapping_add(1);
            self.b_data
        }
        fn b_write(&mut self, reg: u8, data: u8) {
            self.b_writes.push((reg, data));
        }
        fn elapse(&mut self, clock: u64) {
            self.cycles += clock;
        }
    }

    fn setup(dma: &mut Dma, ch: u16, params: u8, b: u8, a: u32, count: u16) {
        let base = 0x4300 | ch << 4;
        dma.write(base, params);
        dma.write(base + 1, b);
        dma.write(base + 2, a as u8);
        dma.write(base + 3, (a >> 8) as u8);
        dma.write(base + 4, (a >> 16) as u8);
        dma.write(base + 5, count as u8);
        dma.write(base + 6, (count >> 8) as u8);
    }

    #[test]
    fn transfer_patterns_match_table() {
        for unit in 0..8u8 {
            let mut dma = Dma::default();
            let mut port = TestPort::new();
            port.mem[0x100..0x104].copy_from_slice(&[1, 2, 3, 4]);
            setup(&mut dma, 0, unit, 0x18, 0x000100, 4);
            dma.set_mdma_enable(1);
            dma.process_mdma(&mut port);

            let offsets: Vec<u8> = port.b_writes.iter().map(|(r, _)| r - 0x18).collect();
            assert_eq!(offsets, TRANSFER_PATTERNS[unit as usize], "unit {unit}");
            let data: Vec<u8> = port.b_writes.iter().map(|(_, d)| *d).collect();
            assert_eq!(data, [1, 2, 3, 4]);
        }
    }

    #[test]
    fn mdma_cost_and_completion() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        setup(&mut dma, 2, 0x01, 0x18, 0x000000, 10);
        setup(&mut dma, 5, 0x00, 0x22, 0x000000, 3);
        dma.set_mdma_enable(0b0010_0100);
        dma.process_mdma(&mut port);
        assert_eq!(port.cycles, 8 + 2 * 8 + 13 * 8);
        assert_eq!(dma.mdma_enable(), 0);
        assert_eq!(dma.read(0x4325), 0);
        assert_eq!(dma.read(0x4323), 0x00);
        assert_eq!(dma.read(0x4322), 10);
    }

    #[test]
    fn zero_count_moves_64k() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        setup(&mut dma, 0, 0x08, 0x18, 0x000000, 0);
        dma.set_mdma_enable(1);
        dma.process_mdma(&mut port);
        assert_eq!(port.b_writes.len(), 0x10000);
    }

    #[test]
    fn a_address_wraps_within_bank() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        port.mem[0xFFFF] = 0xAA;
        port.mem[0x10000] = 0xBB;
        port.mem[0x0000] = 0xCC;
        setup(&mut dma, 0, 0x00, 0x18, 0x00FFFF, 2);
        dma.set_mdma_enable(1);
        dma.process_mdma(&mut port);
        assert_eq!(port.b_writes, [(0x18, 0xAA), (0x18, 0xCC)]);
        assert_eq!(dma.read(0x4304), 0x00);
    }

    #[test]
    fn b_to_a_with_decrement() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        setup(&mut dma, 0, 0x90, 0x39, 0x000102, 3);
        dma.set_mdma_enable(1);
        dma.process_mdma(&mut port);
        assert_eq!(&port.mem[0x100..0x103], &[3, 2, 1]);
    }

    #[test]
    fn unused_register_mirrors() {
        let mut dma = Dma::default();
        dma.write(0x431B, 0x5A);
        assert_eq!(dma.read(0x431F), 0x5A);
        assert_eq!(dma.read(0x431C), 0x43);
    }

    #[test]
    fn hdma_direct_table() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        // 2 lines of one value, then repeat mode for 2 lines, then end
        port.mem[0x200..0x207].copy_from_slice(&[0x02, 0x11, 0x82, 0x22, 0x33, 0x00, 0xFF]);
        setup(&mut dma, 1, 0x00, 0x0D, 0x000200, 0);
        dma.set_hdma_enable(0x02);
        dma.hdma_init();

        let mut per_line = Vec::new();
        for _ in 0..6 {
            port.b_writes.clear();
            dma.process_hdma(&mut port);
            per_line.push(port.b_writes.iter().map(|(_, d)| *d).collect::<Vec<_>>());
        }
        assert_eq!(
            per_line,
            [vec![0x11], vec![], vec![0x22], vec![0x33], vec![], vec![]]
        );
        assert!(dma.channels[1].terminated);
    }

    #[test]
    fn hdma_indirect_fetches_address() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        port.mem[0x300..0x304].copy_from_slice(&[0x01, 0x00, 0x05, 0x00]);
        port.mem[0x10500..0x10502].copy_from_slice(&[0xAB, 0xCD]);
        setup(&mut dma, 0, 0x41, 0x21, 0x000300, 0);
        dma.write(0x4307, 0x01);
        dma.set_hdma_enable(1);
        dma.hdma_init();

        dma.process_hdma(&mut port);
        assert_eq!(port.b_writes, [(0x21, 0xAB), (0x22, 0xCD)]);
        assert_eq!(port.cycles, 18 + 8 + 8 + 16 + 2 * 8);
        assert_eq!(dma.read(0x4305), 0x02);
        assert_eq!(dma.read(0x4306), 0x05);
    }

    #[test]
    fn hdma_init_rearms_terminated_channel() {
        let mut dma = Dma::default();
        let mut port = TestPort::new();
        setup(&mut dma, 0, 0x00, 0x00, 0x000400, 0);
        dma.set_hdma_enable(1);
        dma.hdma_init();
        dma.process_hdma(&mut port);
        assert!(dma.channels[0].terminated);

        port.mem[0x400] = 0x01;
        dma.hdma_init();
        dma.process_hdma(&mut port);
        assert!(!dma.channels[0].terminated);
        assert_eq!(port.b_writes.len(), 1);
    }
}

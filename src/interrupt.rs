/// CPU signal lines, packed into one byte.
pub mod signal {
    pub const IRQ: u8 = 0x01;
    pub const NMI_EDGE: u8 = 0x02;
    pub const NMI_LEVEL: u8 = 0x04;
    pub const DMA: u8 = 0x08;
    pub const RESET: u8 = 0x10;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum IrqMode {
    #[default]
    Disabled,
    // At H=HTIME on every line
    Horizontal,
    // At H=0 on V=VTIME
    Vertical,
    // At H=HTIME on V=VTIME
    Both,
}

impl From<u8> for IrqMode {
    fn from(val: u8) -> IrqMode {
        match val & 3 {
            0 => IrqMode::Disabled,
            1 => IrqMode::Horizontal,
            2 => IrqMode::Vertical,
            _ => IrqMode::Both,
        }
    }
}

#[derive(Default, Debug)]
pub struct Interrupt {
    signals: u8,

    // Nmi
    nmi_flag: bool,   // 0x4210.7
    nmi_enable: bool, // 0x4200.7

    // irq
    irq_mode: IrqMode, // 0x4200.4-5
    h_time: u16,       // 0x4207, 0x4208
    v_time: u16,       // 0x4209, 0x420A
    irq_flag: bool,    // 0x4211.7

    // JoyPad
    joypad_enable: bool, // 0x4200.0
}

impl Interrupt {
    pub fn signals(&self) -> u8 {
        self.signals
    }

    pub fn clear(&mut self, mask: u8) {
        self.signals &= !mask;
    }

    /// Returns true when the call raised something that needs servicing.
    pub fn signal_irq(&mut self, enable: bool) -> bool {
        if enable {
            self.signals |= signal::IRQ;
        } else {
            self.signals &= !signal::IRQ;
        }
        enable
    }

    /// NMI only arms on a 0->1 transition of the level.
    pub fn signal_nmi(&mut self, enable: bool) -> bool {
        if enable {
            if self.signals & signal::NMI_LEVEL == 0 {
                self.signals |= signal::NMI_LEVEL | signal::NMI_EDGE;
                return true;
            }
            false
        } else {
            self.signals &= !signal::NMI_LEVEL;
            false
        }
    }

    pub fn signal_dma(&mut self, enable: bool) -> bool {
        if enable {
            self.signals |= signal::DMA;
        } else {
            self.signals &= !signal::DMA;
        }
        enable
    }

    pub fn signal_reset(&mut self, enable: bool) -> bool {
        if enable {
            self.signals |= signal::RESET;
        } else {
            self.signals &= !signal::RESET;
        }
        enable
    }

    fn composite_nmi(&self) -> bool {
        self.nmi_flag && self.nmi_enable
    }

    /// Reading RDNMI returns and clears the flag.
    pub fn take_nmi_flag(&mut self) -> bool {
        let ret = self.nmi_flag;
        self.nmi_flag = false;
        ret
    }

    /// Returns the new composite NMI line.
    pub fn set_nmi_flag(&mut self, flag: bool) -> bool {
        self.nmi_flag = flag;
        self.composite_nmi()
    }

    pub fn set_nmi_enable(&mut self, flag: bool) -> bool {
        self.nmi_enable = flag;
        self.composite_nmi()
    }

    pub fn nmi_enable(&self) -> bool {
        self.nmi_enable
    }

    pub fn set_irq_mode(&mut self, mode: IrqMode) {
        self.irq_mode = mode;
        if mode == IrqMode::Disabled {
            self.irq_flag = false;
        }
    }

    pub fn irq_mode(&self) -> IrqMode {
        self.irq_mode
    }

    pub fn set_irq_flag(&mut self, flag: bool) {
        self.irq_flag = flag;
    }

    pub fn take_irq_flag(&mut self) -> bool {
        let ret = self.irq_flag;
        self.irq_flag = false;
        ret
    }

    pub fn set_h_time(&mut self, val: u16) {
        self.h_time = val & 0x1FF;
    }

    pub fn h_time(&self) -> u16 {
        self.h_time
    }

    pub fn set_v_time(&mut self, val: u16) {
        self.v_time = val & 0x1FF;
    }

    pub fn v_time(&self) -> u16 {
        self.v_time
    }

    pub fn set_joypad_enable(&mut self, flag: bool) {
        self.joypad_enable = flag;
    }

    pub fn joypad_enable(&self) -> bool {
        self.joypad_enable
    }
}

use log::{debug, trace};
use modular_bitfield::bitfield;
use modular_bitfield::prelude::*;

#[rustfmt::skip]
const RATE_TABLE: [u16; 32] = [
      0, 2048, 1536, 1280, 1024, 768, 640, 512,
    384,  320,  256,  192,  160, 128,  96,  80,
     64,   48,   40,   32,   24,  20,  16,  12,
     10,    8,    6,    5,    4,   3,   2,   1,
];

const ENVELOPE_MAX: u16 = 0x7FF;

/// S-DSP. Register space is 0x00-0x7F, voice `ch` owns `ch << 4 | 0x0..=0x9`.
///
/// `tick` produces one stereo sample; the SPC calls it every 32 of its own
/// cycles, so envelopes and BRR decoding run at 32 kHz.
pub struct Dsp {
    voices: [Voice; 8],

    master_volume: [i8; 2],   // 0x0C, 0x1C
    echo_volume: [i8; 2],     // 0x2C, 0x3C
    key_on: u8,               // 0x4C
    key_off: u8,              // 0x5C
    flag: Flags,              // 0x6C
    voice_end: u8,            // 0x7C
    echo_feedback: i8,        // 0x0D
    unused: u8,               // 0x1D
    pitch_modulation: u8,     // 0x2D
    noise_enable: u8,         // 0x3D
    echo_enable: u8,          // 0x4D
    sample_directory: u8,     // 0x5D
    echo_start: u8,           // 0x6D
    echo_delay: u8,           // 0x7D
    fir: [i8; 8],             // 0xXF

    pending_key_on: u8,
    noise: Noise,
    echo: Echo,

    audio_buffer: Vec<(i16, i16)>,
}

impl Default for Dsp {
    fn default() -> Self {
        Dsp {
            voices: [Voice::default(); 8],
            master_volume: [0; 2],
            echo_volume: [0; 2],
            key_on: 0,
            key_off: 0,
            flag: Flags::default(),
            voice_end: 0xFF,
            echo_feedback: 0,
            unused: 0,
            pitch_modulation: 0,
            noise_enable: 0,
            echo_enable: 0,
            sample_directory: 0,
            echo_start: 0,
            echo_delay: 0,
            fir: [0; 8],
            pending_key_on: 0,
            noise: Noise::default(),
            echo: Echo::default(),
            audio_buffer: Vec::new(),
        }
    }
}

#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy)]
struct Flags {
    noise_frequency: B5,
    disable_echo_write: bool,
    mute: bool,
    reset: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags::new()
            .with_disable_echo_write(true)
            .with_mute(true)
            .with_reset(true)
    }
}

fn clamp16(v: i32) -> i32 {
    v.clamp(-0x8000, 0x7FFF)
}

impl Dsp {
    pub fn tick(&mut self, ram: &mut [u8]) {
        let noise = self.noise.step(self.flag.noise_frequency());

        let key_on = std::mem::take(&mut self.pending_key_on);
        let mut mix = [0i32; 2];
        let mut echo_input = [0i32; 2];
        let mut prev_output = 0i16;

        for ch in 0..8 {
            let bit = 1u8 << ch;
            let voice = &mut self.voices[ch];

            if key_on & bit != 0 {
                voice.envelope.state = EnvelopeState::KeyOn;
            }
            if self.key_off & bit != 0 {
                voice.envelope.key_off();
            }

            let modulation = (ch > 0 && self.pitch_modulation & bit != 0).then_some(prev_output);
            let noise = (self.noise_enable & bit != 0).then_some(noise);
            if voice.tick(ram, self.sample_directory, modulation, noise) {
                self.voice_end |= bit;
            }
            prev_output = voice.output;

            for i in 0..2 {
                let out = (voice.output as i32 * voice.volume[i] as i32) >> 6;
                mix[i] = clamp16(mix[i] + out);
                if self.echo_enable & bit != 0 {
                    echo_input[i] = clamp16(echo_input[i] + out);
                }
            }
        }

        let echo = self.echo.process(
            ram,
            echo_input,
            &self.fir,
            self.echo_feedback,
            self.echo_start,
            self.echo_delay,
            !self.flag.disable_echo_write(),
        );

        let mut output = [0i16; 2];
        for i in 0..2 {
            let main = (mix[i] * self.master_volume[i] as i32) >> 7;
            let wet = (echo[i] * self.echo_volume[i] as i32) >> 7;
            output[i] = if self.flag.mute() {
                0
            } else {
                clamp16(main + wet) as i16
            };
        }

        self.audio_buffer.push((output[0], output[1]));
    }

    pub fn clear_audio_buffer(&mut self) {
        self.audio_buffer.clear();
    }

    pub fn audio_buffer(&self) -> &[(i16, i16)] {
        &self.audio_buffer
    }

    pub fn envelope_state(&self, ch: usize) -> EnvelopeState {
        self.voices[ch].envelope.state
    }
}

impl Dsp {
    pub fn read(&self, addr: u8) -> u8 {
        let ch = ((addr >> 4) & 0x7) as usize;
        match addr & 0x7F {
            0x0C => self.master_volume[0] as u8,
            0x1C => self.master_volume[1] as u8,
            0x2C => self.echo_volume[0] as u8,
            0x3C => self.echo_volume[1] as u8,
            0x4C => self.key_on,
            0x5C => self.key_off,
            0x6C => self.flag.bytes[0],
            0x7C => self.voice_end,
            0x0D => self.echo_feedback as u8,
            0x1D => self.unused,
            0x2D => self.pitch_modulation,
            0x3D => self.noise_enable,
            0x4D => self.echo_enable,
            0x5D => self.sample_directory,
            0x6D => self.echo_start,
            0x7D => self.echo_delay,
            a if a & 0xF == 0xF => self.fir[ch] as u8,
            a => self.voices[ch].read(a & 0xF),
        }
    }

    pub fn write(&mut self, addr: u8, data: u8) {
        let ch = ((addr >> 4) & 0x7) as usize;
        match addr & 0x7F {
            0x0C => self.master_volume[0] = data as i8,
            0x1C => self.master_volume[1] = data as i8,
            0x2C => self.echo_volume[0] = data as i8,
            0x3C => self.echo_volume[1] = data as i8,
            0x4C => {
                debug!("DSP key on: {data:08b}");
                self.key_on = data;
                self.pending_key_on |= data;
                self.voice_end &= !data;
            }
            0x5C => self.key_off = data,
            0x6C => {
                self.flag.bytes[0] = data;
                if self.flag.reset() {
                    for voice in self.voices.iter_mut() {
                        voice.envelope.silence();
                    }
                }
            }
            // Any write clears every ENDX bit
            0x7C => self.voice_end = 0,
            0x0D => self.echo_feedback = data as i8,
            0x1D => self.unused = data,
            0x2D => self.pitch_modulation = data,
            0x3D => self.noise_enable = data,
            0x4D => self.echo_enable = data,
            0x5D => self.sample_directory = data,
            0x6D => self.echo_start = data,
            0x7D => self.echo_delay = data,
            a if a & 0xF == 0xF => self.fir[ch] = data as i8,
            a => self.voices[ch].write(a & 0xF, data),
        }
    }
}

#[derive(Debug, Default, Copy, Clone)]
struct Voice {
    volume: [i8; 2],    // 0xX0, 0xX1
    pitch: u16,         // 0xX2, 0xX3
    source_number: u8,  // 0xX4
    adsr: AdsrSettings, // 0xX5, 0xX6
    gain: u8,           // 0xX7
    output: i16,        // 0xX9
    unused: [u8; 3],    // 0xXA, 0xXB, 0xXE

    envelope: Envelope,
    brr: Brr,
}

impl Voice {
    /// Returns true when an end block was decoded this tick.
    fn tick(
        &mut self,
        ram: &[u8],
        directory: u8,
        modulation: Option<i16>,
        noise: Option<i16>,
    ) -> bool {
        let mut ended = false;

        if self.envelope.state == EnvelopeState::KeyOn {
            self.envelope.start(self.adsr, self.gain);
            self.brr.restart(ram, directory, self.source_number);
            ended |= self.brr.decode_block(ram);
        }

        if self.envelope.state == EnvelopeState::Silence {
            self.output = 0;
            return ended;
        }

        let mut step = self.pitch & 0x3FFF;
        if let Some(prev) = modulation {
            let factor = (prev as i32 >> 4) + 0x400;
            step = ((step as i32 * factor) >> 10).clamp(0, 0x3FFF) as u16;
        }

        if self.brr.advance(step) {
            if self.brr.block.header.end() {
                ended = true;
                if !self.brr.block.header.repeat() {
                    self.envelope.silence();
                    self.output = 0;
                    return ended;
                }
                self.brr.jump_to_loop(ram, directory, self.source_number);
            }
            ended |= self.brr.decode_block(ram);
        }
        self.brr.catch_up();

        let sample = match noise {
            Some(noise) => noise,
            None => self.brr.interpolate(),
        };

        self.envelope.update(self.adsr, self.gain);
        self.output = ((sample as i32 * self.envelope.level as i32) >> 11) as i16;
        ended
    }

    fn read(&self, addr: u8) -> u8 {
        match addr {
            0x0 => self.volume[0] as u8,
            0x1 => self.volume[1] as u8,
            0x2 => self.pitch as u8,
            0x3 => (self.pitch >> 8) as u8,
            0x4 => self.source_number,
            0x5 => self.adsr.bytes[0],
            0x6 => self.adsr.bytes[1],
            0x7 => self.gain,
            0x8 => (self.envelope.level >> 4) as u8,
            0x9 => (self.output >> 8) as u8,
            0xA => self.unused[0],
            0xB => self.unused[1],
            _ => self.unused[2],
        }
    }

    fn write(&mut self, addr: u8, data: u8) {
        match addr {
            0x0 => self.volume[0] = data as i8,
            0x1 => self.volume[1] = data as i8,
            0x2 => self.pitch = (self.pitch & 0xFF00) | data as u16,
            0x3 => self.pitch = (self.pitch & 0x00FF) | (data as u16) << 8,
            0x4 => self.source_number = data,
            0x5 => self.adsr.bytes[0] = data,
            0x6 => self.adsr.bytes[1] = data,
            0x7 => self.gain = data,
            0x8 => self.envelope.level = (data as u16) << 4,
            0x9 => self.output = ((data as u16) << 8) as i16,
            0xA => self.unused[0] = data,
            0xB => self.unused[1] = data,
            _ => self.unused[2] = data,
        }
    }
}

#[bitfield(bits = 8)]
#[derive(Default, Debug, Clone, Copy)]
struct BrrBlockHeader {
    end: bool,
    repeat: bool,
    filter_num: B2,
    shift: B4,
}

#[derive(Debug, Default, Clone, Copy)]
struct BrrBlock {
    header: BrrBlockHeader,
    data: [i16; 16],
}

#[derive(Debug, Default, Clone, Copy)]
struct Brr {
    address: u16,
    pitch_counter: u16,
    // Sample index inside `block` already pushed into `points`
    consumed: usize,
    block: BrrBlock,
    points: [i16; 4],
    old: i16,
    older: i16,
}

impl Brr {
    fn directory_entry(ram: &[u8], directory: u8, source: u8, offset: usize) -> u16 {
        let entry = (directory as usize * 0x100 + source as usize * 4 + offset) & 0xFFFF;
        u16::from_le_bytes([ram[entry], ram[(entry + 1) & 0xFFFF]])
    }

    fn restart(&mut self, ram: &[u8], directory: u8, source: u8) {
        self.address = Brr::directory_entry(ram, directory, source, 0);
        self.pitch_counter = 0;
        self.points = [0; 4];
        self.old = 0;
        self.older = 0;
        trace!("BRR start: source = {source:02X}, addr = {:04X}", self.address);
    }

    fn jump_to_loop(&mut self, ram: &[u8], directory: u8, source: u8) {
        self.address = Brr::directory_entry(ram, directory, source, 2);
    }

    /// Moves the pitch counter. Returns true when the current block ran out.
    fn advance(&mut self, step: u16) -> bool {
        let (counter, overflow) = self.pitch_counter.overflowing_add(step);
        if overflow {
            for i in self.consumed + 1..16 {
                self.push(self.block.data[i]);
            }
        }
        self.pitch_counter = counter;
        overflow
    }

    fn catch_up(&mut self) {
        let index = ((self.pitch_counter >> 12) & 0xF) as usize;
        for i in self.consumed + 1..=index {
            self.push(self.block.data[i]);
        }
        self.consumed = self.consumed.max(index);
    }

    fn push(&mut self, sample: i16) {
        self.points.rotate_right(1);
        self.points[0] = sample;
    }

    /// Decodes the 9-byte block at `address`. Returns the end flag.
    fn decode_block(&mut self, ram: &[u8]) -> bool {
        let header = BrrBlockHeader::from_bytes([ram[self.address as usize]]);
        self.address = self.address.wrapping_add(1);

        let mut data = [0; 16];
        for (i, out) in data.iter_mut().enumerate() {
            let byte = ram[self.address as usize];
            let nibble = if i & 1 == 0 { byte >> 4 } else { byte & 0xF };
            let nibble = ((nibble as i16) << 12) >> 12;
            if i & 1 == 1 {
                self.address = self.address.wrapping_add(1);
            }

            let sample = if header.shift() <= 12 {
                ((nibble as i32) << header.shift()) >> 1
            } else {
                ((nibble as i32 >> 3) << 12) >> 1
            };

            let old = self.old as i32;
            let older = self.older as i32;
            let new = match header.filter_num() {
                0 => sample,
                1 => sample + old + ((-old) >> 4),
                2 => sample + old * 2 + ((-old * 3) >> 5) - older + (older >> 4),
                _ => sample + old * 2 + ((-old * 13) >> 6) - older + ((older * 3) >> 4),
            };

            let new = clamp16(new) as i16;
            self.older = self.old;
            self.old = new;
            *out = new;
        }

        self.block = BrrBlock { header, data };
        self.consumed = 0;
        self.push(data[0]);
        header.end()
    }

    fn interpolate(&self) -> i16 {
        let index = ((self.pitch_counter >> 4) & 0xFF) as usize;
        let p = &self.points;
        let tap = |point: i16, gauss: u16| ((point as i32 * gauss as i32) >> 10) as i16;

        let mut output = tap(p[3], GAUSS_TABLE[0xFF - index]);
        output = output.wrapping_add(tap(p[2], GAUSS_TABLE[0x1FF - index]));
        output = output.wrapping_add(tap(p[1], GAUSS_TABLE[0x100 + index]));
        output = output.saturating_add(tap(p[0], GAUSS_TABLE[index]));
        output >> 1
    }
}

#[bitfield(bits = 16)]
#[derive(Debug, Default, Clone, Copy)]
struct AdsrSettings {
    attack_rate: B4,
    decay_rate: B3,
    use_adsr: bool,
    sustain_rate: B5,
    sustain_level: B3,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    #[default]
    Silence,
    KeyOn,
    Attack,
    Decay,
    Sustain,
    Release,
    DirectGain,
    IncreaseLinear,
    IncreaseBentLine,
    DecreaseLinear,
    DecreaseExponential,
}

impl EnvelopeState {
    fn from_gain(gain: u8) -> EnvelopeState {
        if gain & 0x80 == 0 {
            return EnvelopeState::DirectGain;
        }
        match (gain >> 5) & 3 {
            0 => EnvelopeState::DecreaseLinear,
            1 => EnvelopeState::DecreaseExponential,
            2 => EnvelopeState::IncreaseLinear,
            _ => EnvelopeState::IncreaseBentLine,
        }
    }

    fn is_adsr(self) -> bool {
        matches!(
            self,
            EnvelopeState::Attack | EnvelopeState::Decay | EnvelopeState::Sustain
        )
    }

    fn is_gain(self) -> bool {
        matches!(
            self,
            EnvelopeState::DirectGain
                | EnvelopeState::IncreaseLinear
                | EnvelopeState::IncreaseBentLine
                | EnvelopeState::DecreaseLinear
                | EnvelopeState::DecreaseExponential
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Envelope {
    level: u16,
    counter: u16,
    state: EnvelopeState,
}

impl Envelope {
    fn start(&mut self, adsr: AdsrSettings, gain: u8) {
        self.level = 0;
        self.counter = 0;
        self.state = if adsr.use_adsr() {
            EnvelopeState::Attack
        } else {
            EnvelopeState::from_gain(gain)
        };
    }

    fn key_off(&mut self) {
        if !matches!(self.state, EnvelopeState::Release | EnvelopeState::Silence) {
            self.state = EnvelopeState::Release;
        }
    }

    fn silence(&mut self) {
        self.level = 0;
        self.state = EnvelopeState::Silence;
    }

    /// Rate 0 never fires.
    fn due(&mut self, rate: usize) -> bool {
        if rate == 0 {
            self.counter = 0;
            return false;
        }
        self.counter += 1;
        if self.counter >= RATE_TABLE[rate] {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    fn exponential_step(&self) -> u16 {
        if self.level == 0 {
            0
        } else {
            ((self.level - 1) >> 8) + 1
        }
    }

    fn update(&mut self, adsr: AdsrSettings, gain: u8) {
        // ADSR1 bit 7 picks between the ADSR phases and the gain register
        if adsr.use_adsr() && self.state.is_gain() {
            self.state = EnvelopeState::Attack;
        } else if !adsr.use_adsr() && (self.state.is_adsr() || self.state.is_gain()) {
            self.state = EnvelopeState::from_gain(gain);
        }

        match self.state {
            EnvelopeState::Silence | EnvelopeState::KeyOn => {}
            EnvelopeState::Attack => {
                let rate = adsr.attack_rate() as usize * 2 + 1;
                if self.due(rate) {
                    let step = if rate == 31 { 1024 } else { 32 };
                    self.level = (self.level + step).min(ENVELOPE_MAX);
                }
                if self.level >= 0x7E0 {
                    self.state = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                let rate = adsr.decay_rate() as usize * 2 + 16;
                if self.due(rate) {
                    self.level -= self.exponential_step();
                }
                if self.level <= (adsr.sustain_level() as u16 + 1) * 0x100 {
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                if self.due(adsr.sustain_rate() as usize) {
                    self.level -= self.exponential_step();
                }
            }
            EnvelopeState::Release => {
                self.level = self.level.saturating_sub(8);
                if self.level == 0 {
                    self.state = EnvelopeState::Silence;
                }
            }
            EnvelopeState::DirectGain => self.level = (gain & 0x7F) as u16 * 16,
            EnvelopeState::DecreaseLinear => {
                if self.due(gain as usize & 0x1F) {
                    self.level = self.level.saturating_sub(32);
                }
            }
            EnvelopeState::DecreaseExponential => {
                if self.due(gain as usize & 0x1F) {
                    self.level -= self.exponential_step();
                }
            }
            EnvelopeState::IncreaseLinear => {
                if self.due(gain as usize & 0x1F) {
                    self.level = (self.level + 32).min(ENVELOPE_MAX);
                }
            }
            EnvelopeState::IncreaseBentLine => {
                if self.due(gain as usize & 0x1F) {
                    let step = if self.level < 0x600 { 32 } else { 8 };
                    self.level = (self.level + step).min(ENVELOPE_MAX);
                }
            }
        }
    }
}

struct Noise {
    lfsr: i16,
    counter: u16,
}

impl Default for Noise {
    fn default() -> Self {
        Noise {
            lfsr: 0x4000,
            counter: 0,
        }
    }
}

impl Noise {
    fn step(&mut self, rate: u8) -> i16 {
        let rate = rate as usize;
        if rate == 0 {
            self.counter = 0;
        } else {
            self.counter += 1;
            if self.counter >= RATE_TABLE[rate] {
                self.counter = 0;
                let feedback = (self.lfsr ^ (self.lfsr >> 1)) & 1;
                self.lfsr = (feedback << 14) | ((self.lfsr >> 1) & 0x3FFF);
            }
        }
        // 15-bit LFSR, sign-extended and doubled
        ((self.lfsr << 1) as i16 >> 1) << 1
    }
}

/// Echo ring buffer living in SPC RAM, filtered by an 8-tap FIR.
#[derive(Default)]
struct Echo {
    offset: usize,
    history: [[i16; 8]; 2],
    position: usize,
}

impl Echo {
    #[allow(clippy::too_many_arguments)]
    fn process(
        &mut self,
        ram: &mut [u8],
        input: [i32; 2],
        fir: &[i8; 8],
        feedback: i8,
        start: u8,
        delay: u8,
        write_enabled: bool,
    ) -> [i32; 2] {
        let length = match (delay & 0xF) as usize {
            0 => 4,
            n => n * 0x800,
        };
        let base = (start as usize) << 8;
        self.position = (self.position + 1) & 7;

        let mut output = [0i32; 2];
        for ch in 0..2 {
            let addr = (base + self.offset + ch * 2) & 0xFFFF;
            let sample = i16::from_le_bytes([ram[addr], ram[(addr + 1) & 0xFFFF]]) >> 1;
            self.history[ch][self.position] = sample;

            let mut sum = 0i32;
            for (tap, &coef) in fir.iter().enumerate() {
                // Tap 7 is the newest sample
                let index = (self.position + tap + 1) & 7;
                sum += (self.history[ch][index] as i32 * coef as i32) >> 6;
            }
            output[ch] = clamp16(sum);

            if write_enabled {
                let fed = clamp16(input[ch] + ((output[ch] * feedback as i32) >> 7)) as i16;
                let [lo, hi] = ((fed as u16) & !1).to_le_bytes();
                ram[addr] = lo;
                ram[(addr + 1) & 0xFFFF] = hi;
            }
        }

        self.offset += 4;
        if self.offset >= length {
            self.offset = 0;
        }
        output
    }
}

#[rustfmt::skip]
const GAUSS_TABLE: [u16; 512] = [
    0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000, 0x000,
    0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x001, 0x002, 0x002, 0x002, 0x002, 0x002,
    0x002, 0x002, 0x003, 0x003, 0x003, 0x003, 0x003, 0x004, 0x004, 0x004, 0x004, 0x004, 0x005, 0x005, 0x005, 0x005,
    0x006, 0x006, 0x006, 0x006, 0x007, 0x007, 0x007, 0x008, 0x008, 0x008, 0x009, 0x009, 0x009, 0x00A, 0x00A, 0x00A,
    0x00B, 0x00B, 0x00B, 0x00C, 0x00C, 0x00D, 0x00D, 0x00E, 0x00E, 0x00F, 0x00F, 0x00F, 0x010, 0x010, 0x011, 0x011,
    0x012, 0x013, 0x013, 0x014, 0x014, 0x015, 0x015, 0x016, 0x017, 0x017, 0x018, 0x018, 0x019, 0x01A, 0x01B, 0x01B,
    0x01C, 0x01D, 0x01D, 0x01E, 0x01F, 0x020, 0x020, 0x021, 0x022, 0x023, 0x024, 0x024, 0x025, 0x026, 0x027, 0x028,
    0x029, 0x02A, 0x02B, 0x02C, 0x02D, 0x02E, 0x02F, 0x030, 0x031, 0x032, 0x033, 0x034, 0x035, 0x036, 0x037, 0x038,
    0x03A, 0x03B, 0x03C, 0x03D, 0x03E, 0x040, 0x041, 0x042, 0x043, 0x045, 0x046, 0x047, 0x049, 0x04A, 0x04C, 0x04D,
    0x04E, 0x050, 0x051, 0x053, 0x054, 0x056, 0x057, 0x059, 0x05A, 0x05C, 0x05E, 0x05F, 0x061, 0x063, 0x064, 0x066,
    0x068, 0x06A, 0x06B, 0x06D, 0x06F, 0x071, 0x073, 0x075, 0x076, 0x078, 0x07A, 0x07C, 0x07E, 0x080, 0x082, 0x084,
    0x086, 0x089, 0x08B, 0x08D, 0x08F, 0x091, 0x093, 0x096, 0x098, 0x09A, 0x09C, 0x09F, 0x0A1, 0x0A3, 0x0A6, 0x0A8,
    0x0AB, 0x0AD, 0x0AF, 0x0B2, 0x0B4, 0x0B7, 0x0BA, 0x0BC, 0x0BF, 0x0C1, 0x0C4, 0x0C7, 0x0C9, 0x0CC, 0x0CF, 0x0D2,
    0x0D4, 0x0D7, 0x0DA, 0x0DD, 0x0E0, 0x0E3, 0x0E6, 0x0E9, 0x0EC, 0x0EF, 0x0F2, 0x0F5, 0x0F8, 0x0FB, 0x0FE, 0x101,
    0x104, 0x107, 0x10B, 0x10E, 0x111, 0x114, 0x118, 0x11B, 0x11E, 0x122, 0x125, 0x129, 0x12C, 0x130, 0x133, 0x137,
    0x13A, 0x13E, 0x141, 0x145, 0x148, 0x14C, 0x150, 0x153, 0x157, 0x15B, 0x15F, 0x162, 0x166, 0x16A, 0x16E, 0x172,
    0x176, 0x17A, 0x17D, 0x181, 0x185, 0x189, 0x18D, 0x191, 0x195, 0x19A, 0x19E, 0x1A2, 0x1A6, 0x1AA, 0x1AE, 0x1B2,
    0x1B7, 0x1BB, 0x1BF, 0x1C3, 0x1C8, 0x1CC, 0x1D0, 0x1D5, 0x1D9, 0x1DD, 0x1E2, 0x1E6, 0x1EB, 0x1EF, 0x1F3, 0x1F8,
    0x1FC, 0x201, 0x205, 0x20A, 0x20F, 0x213, 0x218, 0x21C, 0x221, 0x226, 0x22A, 0x22F, 0x233, 0x238, 0x23D, 0x241,
    0x246, 0x24B, 0x250, 0x254, 0x259, 0x25E, 0x263, 0x267, 0x26C, 0x271, 0x276, 0x27B, 0x280, 0x284, 0x289, 0x28E,
    0x293, 0x298, 0x29D, 0x2A2, 0x2A6, 0x2AB, 0x2B0, 0x2B5, 0x2BA, 0x2BF, 0x2C4, 0x2C9, 0x2CE, 0x2D3, 0x2D8, 0x2DC,
    0x2E1, 0x2E6, 0x2EB, 0x2F0, 0x2F5, 0x2FA, 0x2FF, 0x304, 0x309, 0x30E, 0x313, 0x318, 0x31D, 0x322, 0x326, 0x32B,
    0x330, 0x335, 0x33A, 0x33F, 0x344, 0x349, 0x34E, 0x353, 0x357, 0x35C, 0x361, 0x366, 0x36B, 0x370, 0x374, 0x379,
    0x37E, 0x383, 0x388, 0x38C, 0x391, 0x396, 0x39B, 0x39F, 0x3A4, 0x3A9, 0x3AD, 0x3B2, 0x3B7, 0x3BB, 0x3C0, 0x3C5,
    0x3C9, 0x3CE, 0x3D2, 0x3D7, 0x3DC, 0x3E0, 0x3E5, 0x3E9, 0x3ED, 0x3F2, 0x3F6, 0x3FB, 0x3FF, 0x403, 0x408, 0x40C,
    0x410, 0x415, 0x419, 0x41D, 0x421, 0x425, 0x42A, 0x42E, 0x432, 0x436, 0x43A, 0x43E, 0x442, 0x446, 0x44A, 0x44E,
    0x452, 0x455, 0x459, 0x45D, 0x461, 0x465, 0x468, 0x46C, 0x470, 0x473, 0x477, 0x47A, 0x47E, 0x481, 0x485, 0x488,
    0x48C, 0x48F, 0x492, 0x496, 0x499, 0x49C, 0x49F, 0x4A2, 0x4A6, 0x4A9, 0x4AC, 0x4AF, 0x4B2, 0x4B5, 0x4B7, 0x4BA,
    0x4BD, 0x4C0, 0x4C3, 0x4C5, 0x4C8, 0x4CB, 0x4CD, 0x4D0, 0x4D2, 0x4D5, 0x4D7, 0x4D9, 0x4DC, 0x4DE, 0x4E0, 0x4E3,
    0x4E5, 0x4E7, 0x4E9, 0x4EB, 0x4ED, 0x4EF, 0x4F1, 0x4F3, 0x4F5, 0x4F6, 0x4F8, 0x4FA, 0x4FB, 0x4FD, 0x4FF, 0x500,
    0x502, 0x503, 0x504, 0x506, 0x507, 0x508, 0x50A, 0x50B, 0x50C, 0x50D, 0x50E, 0x50F, 0x510, 0x511, 0x511, 0x512,
    0x513, 0x514, 0x514, 0x515, 0x516, 0x516, 0x517, 0x517, 0x517, 0x518, 0x518, 0x518, 0x518, 0x518, 0x519, 0x519,
];

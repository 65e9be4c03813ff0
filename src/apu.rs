use log::debug;

use crate::config::{SPC_RATIO_DEN, SPC_RATIO_NUM};
use crate::queue::WriteQueue;
use crate::spc::Spc;

/// Converts a master cycle timestamp into SPC cycles.
pub fn to_spc_cycles(master: u64) -> u64 {
    ((master as u128 * SPC_RATIO_NUM as u128) / SPC_RATIO_DEN as u128) as u64
}

/// The SPC clock domain as seen from the CPU.
///
/// The SPC only runs when something asks for it: a port read, a full write
/// queue, or the end of a frame. Port writes wait in a queue and are
/// delivered once the SPC clock reaches the time they were made.
pub struct Apu {
    spc: Spc,
    queue: WriteQueue,
    threshold: u64,
}

impl Apu {
    pub fn new(threshold: u64, capacity: usize) -> Apu {
        Apu {
            spc: Spc::default(),
            queue: WriteQueue::new(capacity),
            threshold,
        }
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.spc.reset();
    }

    pub fn spc(&self) -> &Spc {
        &self.spc
    }

    pub fn spc_mut(&mut self) -> &mut Spc {
        &mut self.spc
    }

    pub fn read_port(&mut self, port: usize, now: u64) -> u8 {
        self.sync(now, false);
        self.spc.read_port(port)
    }

    pub fn write_port(&mut self, port: usize, data: u8, now: u64) {
        if self.queue.is_full() {
            self.sync(now, true);
        }
        self.queue.push(now, port as u16, data);
    }

    /// Brings the SPC up to master cycle `now`. Without `force` a lag below
    /// the threshold is left for a later call.
    pub fn sync(&mut self, now: u64, force: bool) {
        let target = to_spc_cycles(now);
        let lag = target.saturating_sub(self.spc.cycles());
        if lag == 0 || (!force && lag < self.threshold) {
            return;
        }

        while let Some(due) = self.queue.peek_cycle() {
            let at = to_spc_cycles(due);
            if at > target {
                break;
            }
            self.run_to(at);
            if let Some(w) = self.queue.pop_due(due) {
                debug!("APU port {} <- {:#04X} @ {}", w.addr, w.data, at);
                self.spc.write_port(w.addr as usize, w.data);
            }
        }
        self.run_to(target);
    }

    fn run_to(&mut self, spc_cycle: u64) {
        let cycles = spc_cycle.saturating_sub(self.spc.cycles());
        if cycles > 0 {
            self.spc.execute(cycles as i64);
        }
    }

    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    pub fn audio_buffer(&self) -> &[(i16, i16)] {
        self.spc.audio_buffer()
    }

    pub fn clear_audio_buffer(&mut self) {
        self.spc.clear_audio_buffer();
    }
}

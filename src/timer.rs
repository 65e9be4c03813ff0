/// One of the three SPC700 timers.
///
/// Time is fed in as an absolute SPC cycle count. The accumulator wraps at
/// `cycles_per_tick * target` and each wrap bumps a 4-bit counter that is
/// cleared when the SPC reads it.
#[derive(Debug, Clone)]
pub struct Timer {
    cycles_per_tick: u64,
    target: u8,
    enabled: bool,
    baseline: u64,
    accum: u64,
    counter: u8,
}

impl Timer {
    pub fn new(cycles_per_tick: u64) -> Timer {
        Timer {
            cycles_per_tick,
            target: 0,
            enabled: false,
            baseline: 0,
            accum: 0,
            counter: 0,
        }
    }

    fn divisor(&self) -> u64 {
        let target = if self.target == 0 {
            256
        } else {
            self.target as u64
        };
        self.cycles_per_tick * target
    }

    pub fn sync(&mut self, now: u64) {
        if !self.enabled {
            self.baseline = now;
            return;
        }
        self.accum += now.saturating_sub(self.baseline);
        self.baseline = now;

        let divisor = self.divisor();
        let ticks = self.accum / divisor;
        self.accum %= divisor;
        self.counter = ((self.counter as u64 + ticks) & 0xF) as u8;
    }

    pub fn set_target(&mut self, target: u8, now: u64) {
        self.sync(now);
        self.target = target;
    }

    /// Starting a stopped timer clears its stage and counter, and both
    /// directions resync the baseline so stopped time is not counted.
    pub fn set_enabled(&mut self, enabled: bool, now: u64) {
        self.sync(now);
        if enabled && !self.enabled {
            self.accum = 0;
            self.counter = 0;
        }
        self.enabled = enabled;
        self.baseline = now;
    }

    pub fn read_counter(&mut self, now: u64) -> u8 {
        self.sync(now);
        let ret = self.counter;
        self.counter = 0;
        ret
    }

    pub fn peek_counter(&self) -> u8 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_wraps_after_sixteen_ticks() {
        let mut t = Timer::new(21);
        t.set_target(2, 0);
        t.set_enabled(true, 0);

        t.sync(21 * 2 * 16 - 1);
        assert_eq!(t.peek_counter(), 15);
        assert_eq!(t.read_counter(21 * 2 * 16), 0);

        t.sync(21 * 2 * 17);
        assert_eq!(t.read_counter(21 * 2 * 17), 1);
        assert_eq!(t.read_counter(21 * 2 * 17), 0);
    }

    #[test]
    fn zero_target_counts_as_256() {
        let mut t = Timer::new(16);
        t.set_enabled(true, 0);
        t.sync(16 * 255);
        assert_eq!(t.peek_counter(), 0);
        t.sync(16 * 256);
        assert_eq!(t.peek_counter(), 1);
    }

    #[test]
    fn disabled_time_is_not_counted() {
        let mut t = Timer::new(10);
        t.set_target(1, 0);
        t.set_enabled(true, 0);
        t.sync(25);
        t.set_enabled(false, 25);
        t.sync(1000);
        assert_eq!(t.peek_counter(), 2);

        t.set_enabled(true, 1000);
        assert_eq!(t.peek_counter(), 0);
        t.sync(1015);
        assert_eq!(t.read_counter(1015), 1);
    }
}

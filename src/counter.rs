/// Master-cycle bookkeeping for the CPU clock domain.
///
/// `total` only moves forward. `budget` is what the current `execute` call
/// may still spend; it goes negative when the last instruction overshoots.
#[derive(Default, Debug)]
pub struct Counter {
    total: u64,
    frame: u64,
    line: u16,
    line_start: u64,

    budget: i64,
    stash: i64,
    executing: bool,
}

impl Counter {
    pub fn elapse(&mut self, clock: u64) {
        self.total += clock;
        self.budget -= clock as i64;
    }

    pub fn now(&self) -> u64 {
        self.total
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn line(&self) -> u16 {
        self.line
    }

    /// Cycles elapsed since the start of the current scanline.
    pub fn line_cycle(&self) -> u64 {
        self.total - self.line_start
    }

    /// `start` is the nominal master cycle the line begins at. Overshoot
    /// from the previous line is left in `line_cycle` instead of shifting
    /// every later event.
    pub fn start_line(&mut self, line: u16, start: u64) {
        self.line = line;
        self.line_start = start.min(self.total);
        if line == 0 {
            self.frame += 1;
        }
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    pub fn begin(&mut self, cycles: i64) {
        self.budget = cycles;
        self.stash = 0;
        self.executing = true;
    }

    pub fn end(&mut self) -> i64 {
        self.executing = false;
        self.budget
    }

    /// Zero the remaining budget so the running batch returns after the
    /// in-flight instruction. The remainder is kept for `restore`.
    pub fn abort(&mut self) {
        if self.executing && self.budget > 0 {
            self.stash += self.budget;
            self.budget = 0;
        }
    }

    /// Re-apply cycles taken away by `abort`. Returns false when nothing
    /// was stashed.
    pub fn restore(&mut self) -> bool {
        if self.stash == 0 {
            return false;
        }
        self.budget += self.stash;
        self.stash = 0;
        true
    }
}

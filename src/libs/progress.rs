/// Progress sink: `(label, percent)` with percent in `0..=100`.
pub type ProgressFn<'a> = &'a (dyn Fn(&str, u8) + Send + Sync);

/// Per-label progress reporter that never goes backwards.
///
/// With a known total it reports every whole-percent step; without one it
/// only reports 0 at start and 100 at finish.
pub struct ProgressTracker<'a> {
    label: &'a str,
    total: Option<u64>,
    done: u64,
    last: Option<u8>,
    report: ProgressFn<'a>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(label: &'a str, total: Option<u64>, report: ProgressFn<'a>) -> Self {
        Self {
            label,
            total: total.filter(|t| *t > 0),
            done: 0,
            last: None,
            report,
        }
    }

    pub fn start(&mut self) {
        self.emit(0);
    }

    pub fn advance(&mut self, bytes: u64) {
        self.done = self.done.saturating_add(bytes);
        if let Some(total) = self.total {
            let percent = (self.done.saturating_mul(100) / total).min(100) as u8;
            self.emit(percent);
        }
    }

    pub fn finish(&mut self) {
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        (self.report)(self.label, percent);
    }
}

/// Percentage for the `index`-th (1-based) of `total` items.
pub fn step_percent(index: usize, total: usize) -> u8 {
    let total = total.max(1);
    ((index.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collect(total: Option<u64>, steps: &[u64]) -> Vec<u8> {
        let seen = Mutex::new(Vec::new());
        let sink = |_: &str, pct: u8| seen.lock().push(pct);
        let mut tracker = ProgressTracker::new("pkg", total, &sink);
        tracker.start();
        for step in steps {
            tracker.advance(*step);
        }
        tracker.finish();
        seen.into_inner()
    }

    #[test]
    fn known_length_is_monotonic() {
        let seen = collect(Some(1000), &[100, 0, 250, 650, 10]);
        assert_eq!(seen, vec![0, 10, 35, 100]);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_length_reports_only_bounds() {
        assert_eq!(collect(None, &[10, 20, 30]), vec![0, 100]);
        assert_eq!(collect(Some(0), &[10]), vec![0, 100]);
    }

    #[test]
    fn step_percentages() {
        assert_eq!(step_percent(1, 4), 25);
        assert_eq!(step_percent(4, 4), 100);
        assert_eq!(step_percent(1, 0), 100);
    }
}

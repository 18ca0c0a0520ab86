/// Cosmetic progress shown while an edit is generating.
///
/// The estimate approaches [`PROGRESS_CEILING`] and never reaches 100 on its
/// own; only a successful result completes it. It says nothing about how far
/// the provider actually is.
pub const PROGRESS_CEILING: f64 = 95.0;

const STEP_FRACTION: f64 = 0.12;
const MIN_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress(f64);

impl Progress {
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn tick(&mut self) {
        let remaining = PROGRESS_CEILING - self.0;
        if remaining <= 0.0 {
            return;
        }
        let step = (remaining * STEP_FRACTION).max(MIN_STEP);
        self.0 = (self.0 + step).min(PROGRESS_CEILING);
    }

    pub fn complete(&mut self) {
        self.0 = 100.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_decelerate_and_stay_below_ceiling() {
        let mut progress = Progress::default();
        let mut last = progress.value();
        let mut last_step = f64::MAX;
        for _ in 0..2_000 {
            progress.tick();
            let step = progress.value() - last;
            assert!(step >= 0.0);
            assert!(step <= last_step + 1e-9);
            assert!(progress.value() < 100.0);
            last_step = step;
            last = progress.value();
        }
        assert_eq!(progress.value(), PROGRESS_CEILING);
    }

    #[test]
    fn complete_and_clear() {
        let mut progress = Progress::default();
        progress.tick();
        assert!(progress.value() > 0.0);
        progress.complete();
        assert_eq!(progress.value(), 100.0);
        progress.clear();
        assert_eq!(progress.value(), 0.0);
    }
}

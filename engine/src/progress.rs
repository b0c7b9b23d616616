//! Quantized progress.
//!
//! Progress is reported as an integer number of steps rather than a
//! percentage. The scale internally runs to `steps + 1`; that last unit is
//! never reported, so the final chunk of a file does not show a full bar
//! before the digest is actually finalized. Completion itself is the signal
//! that the run reached the end.

/// Tracks bytes consumed and decides when a new step is crossed.
#[derive(Debug, Clone)]
pub struct StepProgress {
    total: u64,
    scale: u64,
    consumed: u64,
    value: u32,
}

impl StepProgress {
    /// `total` is the file size captured before reading; `steps` must be >= 1.
    pub fn new(total: u64, steps: u32) -> Self {
        StepProgress {
            total,
            scale: u64::from(steps) + 1,
            consumed: 0,
            value: 0,
        }
    }

    /// Last reported value (0 before any report).
    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Record `bytes` more input. Returns the new step value if a threshold
    /// was crossed.
    pub fn advance(&mut self, bytes: usize) -> Option<u32> {
        self.consumed = self.consumed.saturating_add(bytes as u64);

        if self.total == 0 {
            return None;
        }

        let candidate =
            (u128::from(self.consumed) * u128::from(self.scale) / u128::from(self.total)) as u64;

        if candidate > u64::from(self.value) && candidate < self.scale {
            // candidate < scale <= u32::MAX + 1, so it fits
            self.value = candidate as u32;
            Some(self.value)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(total: u64, steps: u32, chunk: usize) -> Vec<u32> {
        let mut progress = StepProgress::new(total, steps);
        let mut reports = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let n = remaining.min(chunk as u64);
            remaining -= n;
            if let Some(value) = progress.advance(n as usize) {
                reports.push(value);
            }
        }
        reports
    }

    #[test]
    fn test_empty_input_never_reports() {
        let mut progress = StepProgress::new(0, 10);
        assert_eq!(progress.advance(0), None);
        assert_eq!(progress.value(), 0);
    }

    #[test]
    fn test_reports_every_step_but_the_headroom() {
        // 21 equal chunks on a 20 step scale of 21 units
        let reports = run(21 * 100, 20, 100);
        assert_eq!(reports, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_chunk_reports_nothing() {
        // The only chunk lands on the headroom unit
        assert!(run(1000, 20, 65536).is_empty());
    }

    #[test]
    fn test_large_chunks_skip_steps() {
        let reports = run(1000, 20, 400);
        assert_eq!(reports, vec![8, 16]);
    }

    #[test]
    fn test_single_step() {
        let reports = run(100, 1, 10);
        assert_eq!(reports, vec![1]);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        for &(total, steps, chunk) in &[
            (1_048_576u64, 20u32, 65536usize),
            (999_999, 7, 4096),
            (5, 100, 1),
            (65537, 3, 65536),
        ] {
            let reports = run(total, steps, chunk);
            assert!(reports.windows(2).all(|w| w[0] < w[1]));
            assert!(reports.iter().all(|&v| v >= 1 && v <= steps));
        }
    }

    #[test]
    fn test_growing_file_stays_bounded() {
        let mut progress = StepProgress::new(10, 4);
        progress.advance(8);
        assert_eq!(progress.advance(100), None);
        assert!(progress.value() <= 4);
        assert_eq!(progress.consumed(), 108);
    }
}

//! Initial-frame / replay split of a loaded dataset.

/// Bars `[..at]` form the initial frame; replay starts at `at + gap`.
///
/// A `gap` of one withholds the bar at the split point, so the replay part
/// of a dataset of `n` bars split at the midpoint holds `n - n/2 - 1` bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    pub at: usize,
    pub gap: usize,
}

impl SplitPoint {
    pub fn midpoint(len: usize, gap: usize) -> Self {
        Self { at: len / 2, gap }
    }

    /// `ratio` is clamped to [0, 1].
    pub fn from_ratio(len: usize, ratio: f64, gap: usize) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        let at = ((len as f64) * ratio).floor() as usize;
        Self { at: at.min(len), gap }
    }

    /// Index of the first replayed bar, never past `len`.
    pub fn replay_start(&self, len: usize) -> usize {
        self.at.saturating_add(self.gap).min(len)
    }

    pub fn initial_len(&self, len: usize) -> usize {
        self.at.min(len)
    }

    pub fn replay_len(&self, len: usize) -> usize {
        len - self.replay_start(len)
    }
}

// ---------------------------------------------------------------------------
// Row window: which rows (CSV) or frames (WAV) are read
// ---------------------------------------------------------------------------

/// Rows/frames with index `< start` are skipped; reading stops once
/// `index >= start + max_rows`.  Both extractors go through this type so CSV
/// and WAV loads window identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    start: usize,
    max_rows: usize,
}

impl RowWindow {
    pub fn new(start: usize, max_rows: usize) -> Self {
        RowWindow { start, max_rows }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// First index past the window.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.max_rows)
    }

    /// Whether row `index` lies before the window.
    pub fn is_before(&self, index: usize) -> bool {
        index < self.start
    }

    /// Whether reading can stop at row `index`.
    pub fn is_exhausted(&self, index: usize) -> bool {
        index >= self.end()
    }

    /// Apply the window to a row iterator.  Skipped rows are consumed but
    /// never collected, and the source is not pulled past the window.
    pub fn select<I: Iterator>(&self, rows: I) -> impl Iterator<Item = I::Item> {
        rows.skip(self.start).take(self.max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds() {
        let w = RowWindow::new(2, 3);
        assert!(w.is_before(1));
        assert!(!w.is_before(2));
        assert!(!w.is_exhausted(4));
        assert!(w.is_exhausted(5));
        assert_eq!(w.end(), 5);
    }

    #[test]
    fn select_skips_and_limits() {
        let w = RowWindow::new(1, 2);
        let rows: Vec<_> = w.select(10..20).collect();
        assert_eq!(rows, vec![11, 12]);
    }

    #[test]
    fn select_stops_pulling_past_the_window() {
        let mut pulled = 0;
        let source = (0..100).inspect(|_| pulled += 1);
        let taken: Vec<_> = RowWindow::new(0, 3).select(source).collect();
        assert_eq!(taken.len(), 3);
        assert_eq!(pulled, 3);
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let w = RowWindow::new(usize::MAX, 10);
        assert_eq!(w.end(), usize::MAX);
        assert!(w.is_before(0));
    }
}

/// Position within the ordered entries of one open source.
#[derive(Debug, Clone, Default)]
pub struct NavState {
    entries: Vec<String>,
    cur_idx: Option<usize>,
    prev_idx: Option<usize>,
}

impl NavState {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.cur_idx
            .and_then(|idx| self.entries.get(idx))
            .map(String::as_str)
    }

    pub fn index(&self) -> Option<usize> {
        self.cur_idx
    }

    /// Index shown before the most recent move.
    pub fn previous_index(&self) -> Option<usize> {
        self.prev_idx
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Replaces the entries and selects `select` when it is in range.
    pub fn set_entries(&mut self, entries: Vec<String>, select: Option<usize>) {
        self.entries = entries;
        self.prev_idx = None;
        self.cur_idx = select.filter(|&idx| idx < self.entries.len());
    }

    /// Moves to `idx`. Out of range leaves the position unchanged.
    pub fn go_to(&mut self, idx: usize) -> Option<&str> {
        if idx >= self.entries.len() {
            return None;
        }

        self.prev_idx = self.cur_idx;
        self.cur_idx = Some(idx);
        self.current()
    }

    /// Stops at the last entry.
    pub fn go_next(&mut self) -> Option<&str> {
        let next = self.cur_idx.map_or(0, |idx| idx + 1);
        self.go_to(next)
    }

    /// Stops at the first entry.
    pub fn go_prev(&mut self) -> Option<&str> {
        let prev = self.cur_idx?.checked_sub(1)?;
        self.go_to(prev)
    }

    pub fn first(&mut self) -> Option<&str> {
        self.go_to(0)
    }

    pub fn last(&mut self) -> Option<&str> {
        let last = self.entries.len().checked_sub(1)?;
        self.go_to(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(count: usize) -> NavState {
        NavState::new((0..count).map(|i| format!("/book/{i:03}.png")).collect())
    }

    #[test]
    fn test_navigation_records_previous() {
        let mut nav = nav(4);
        assert_eq!(nav.current(), None);

        assert_eq!(nav.go_next(), Some("/book/000.png"));
        assert_eq!(nav.go_next(), Some("/book/001.png"));
        assert_eq!(nav.previous_index(), Some(0));

        assert_eq!(nav.go_prev(), Some("/book/000.png"));
        assert_eq!(nav.previous_index(), Some(1));
    }

    #[test]
    fn test_bounds_do_not_wrap() {
        let mut nav = nav(2);
        nav.last();
        assert_eq!(nav.go_next(), None);
        assert_eq!(nav.index(), Some(1));

        nav.first();
        assert_eq!(nav.go_prev(), None);
        assert_eq!(nav.index(), Some(0));
    }

    #[test]
    fn test_set_entries_validates_selection() {
        let mut nav = nav(2);
        nav.set_entries(vec!["a".into()], Some(5));
        assert_eq!(nav.index(), None);

        nav.set_entries(vec!["a".into(), "b".into()], Some(1));
        assert_eq!(nav.current(), Some("b"));
        assert_eq!(nav.previous_index(), None);
    }

    #[test]
    fn test_empty_nav() {
        let mut nav = NavState::default();
        assert!(nav.is_empty());
        assert_eq!(nav.first(), None);
        assert_eq!(nav.last(), None);
        assert_eq!(nav.go_next(), None);
    }
}

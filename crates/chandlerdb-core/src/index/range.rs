use serde::{Deserialize, Serialize};

///
/// RangeSet
///
/// Sorted, non-overlapping inclusive `(start, end)` position ranges over an
/// index. Ranges shift as keys are inserted or removed so a selection keeps
/// following the same entries.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RangeSet {
    ranges: Vec<(usize, usize)>,
}

impl RangeSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Build from arbitrary ranges, normalizing order and merging overlaps.
    #[must_use]
    pub fn from_ranges(ranges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut set = Self::new();
        for range in ranges {
            set.add(range);
        }

        set
    }

    #[must_use]
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Union `range` into the set; adjacent ranges coalesce.
    pub fn add(&mut self, range: (usize, usize)) {
        let (mut start, mut end) = normalize(range);
        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;

        for &(s, e) in &self.ranges {
            if e.saturating_add(1) < start {
                merged.push((s, e));
            } else if end.saturating_add(1) < s {
                if !placed {
                    merged.push((start, end));
                    placed = true;
                }
                merged.push((s, e));
            } else {
                start = start.min(s);
                end = end.max(e);
            }
        }
        if !placed {
            merged.push((start, end));
        }

        self.ranges = merged;
    }

    /// Subtract `range` from the set.
    pub fn remove(&mut self, range: (usize, usize)) {
        let (start, end) = normalize(range);
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);

        for &(s, e) in &self.ranges {
            if e < start || s > end {
                kept.push((s, e));
                continue;
            }
            if s < start {
                kept.push((s, start - 1));
            }
            if e > end {
                kept.push((end + 1, e));
            }
        }

        self.ranges = kept;
    }

    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.ranges
            .iter()
            .any(|&(s, e)| s <= position && position <= e)
    }

    /// True when `range` lies entirely within one selected range.
    #[must_use]
    pub fn contains_range(&self, range: (usize, usize)) -> bool {
        let (start, end) = normalize(range);
        self.ranges.iter().any(|&(s, e)| s <= start && end <= e)
    }

    #[must_use]
    pub fn first_selected(&self) -> Option<usize> {
        self.ranges.first().map(|&(s, _)| s)
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|&(s, e)| s..=e)
    }

    /// Shift for a key inserted at `position`. An insertion strictly inside a
    /// range grows it.
    pub fn on_insert(&mut self, position: usize) {
        for range in &mut self.ranges {
            if range.0 >= position {
                range.0 = range.0.saturating_add(1);
                range.1 = range.1.saturating_add(1);
            } else if range.1 >= position {
                range.1 = range.1.saturating_add(1);
            }
        }
    }

    /// Drop every position at or past `len`.
    pub fn clamp(&mut self, len: usize) {
        match len.checked_sub(1) {
            None => self.ranges.clear(),
            Some(last) => {
                self.ranges.retain(|&(s, _)| s <= last);
                for range in &mut self.ranges {
                    range.1 = range.1.min(last);
                }
            }
        }
    }

    /// Shift for a key removed from `position`; emptied ranges disappear.
    pub fn on_remove(&mut self, position: usize) {
        let mut kept = Vec::with_capacity(self.ranges.len());

        for &(s, e) in &self.ranges {
            if e < position {
                kept.push((s, e));
            } else if s > position {
                kept.push((s - 1, e - 1));
            } else if s != e {
                kept.push((s, e - 1));
            }
        }

        self.ranges = kept;
    }

    /// Mirror the selection for an index of `len` entries whose direction
    /// flipped.
    pub fn mirror(&mut self, len: usize) {
        if len == 0 {
            self.ranges.clear();
            return;
        }

        let last = len - 1;
        let mut mirrored: Vec<_> = self
            .ranges
            .iter()
            .filter(|&&(s, _)| s <= last)
            .map(|&(s, e)| (last - e.min(last), last - s))
            .collect();
        mirrored.reverse();

        self.ranges = mirrored;
    }
}

const fn normalize((a, b): (usize, usize)) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_overlapping_and_adjacent_ranges() {
        let mut set = RangeSet::from_ranges([(5, 7), (0, 1)]);
        set.add((2, 3));
        assert_eq!(set.ranges(), &[(0, 3), (5, 7)]);

        set.add((4, 4));
        assert_eq!(set.ranges(), &[(0, 7)]);
    }

    #[test]
    fn remove_splits_ranges() {
        let mut set = RangeSet::from_ranges([(0, 9)]);
        set.remove((3, 5));

        assert_eq!(set.ranges(), &[(0, 2), (6, 9)]);
        assert!(set.contains_range((6, 8)));
        assert!(!set.contains_range((2, 6)));
        assert_eq!(set.first_selected(), Some(0));
    }

    #[test]
    fn insert_and_remove_shift_ranges() {
        let mut set = RangeSet::from_ranges([(2, 3), (6, 6)]);

        set.on_insert(0);
        assert_eq!(set.ranges(), &[(3, 4), (7, 7)]);

        set.on_insert(4);
        assert_eq!(set.ranges(), &[(3, 5), (8, 8)]);

        set.on_remove(8);
        assert_eq!(set.ranges(), &[(3, 5)]);

        set.on_remove(0);
        assert_eq!(set.ranges(), &[(2, 4)]);
    }

    #[test]
    fn clamp_bounds_open_ended_ranges() {
        let mut set = RangeSet::from_ranges([(0, usize::MAX)]);
        set.on_insert(0);
        assert_eq!(set.ranges(), &[(1, usize::MAX)]);

        set.clamp(3);
        assert_eq!(set.positions().collect::<Vec<_>>(), vec![1, 2]);

        set.clamp(0);
        assert!(set.is_empty());
    }

    #[test]
    fn mirror_reverses_positions() {
        let mut set = RangeSet::from_ranges([(0, 1), (4, 4)]);
        set.mirror(5);

        assert_eq!(set.ranges(), &[(0, 0), (3, 4)]);
        assert_eq!(set.positions().collect::<Vec<_>>(), vec![0, 3, 4]);
    }
}

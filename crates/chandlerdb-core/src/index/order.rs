use crate::{
    index::{
        Collator, FindMode, IndexContext, IndexError, IndexSnapshot, IndexSpec, RangeSet,
    },
    obs::sink::{MetricsEvent, record},
    types::ItemId,
    value::{canonical_cmp, missing_last_cmp},
};
use chandlerdb_config::DEFAULT_LOCALE;
use std::{cmp::Ordering, collections::HashMap, slice};

///
/// Index
///
/// One ordering over a collection's keys.
/// `keys` is held in ascending order; a descending index only reverses
/// iteration. Positions are always iteration positions. `slots` maps each
/// key to its place in `keys` and is renumbered whenever `keys` shifts.
///

#[derive(Clone, Debug)]
pub struct Index {
    name: String,
    spec: IndexSpec,
    collator: Option<Collator>,
    keys: Vec<ItemId>,
    slots: HashMap<ItemId, usize>,
    entry_values: HashMap<ItemId, i32>,
    ranges: RangeSet,
    descending: bool,
    valid: bool,
    saved: Option<IndexSnapshot>,
}

impl Index {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: IndexSpec) -> Self {
        let collator = match &spec {
            IndexSpec::String { locale, .. } => Some(Collator::new(
                locale.as_deref().unwrap_or(DEFAULT_LOCALE),
            )),
            _ => None,
        };

        Self {
            name: name.into(),
            spec,
            collator,
            keys: Vec::new(),
            slots: HashMap::new(),
            entry_values: HashMap::new(),
            ranges: RangeSet::new(),
            descending: false,
            valid: true,
            saved: None,
        }
    }

    /// Use `locale` for a string index created without one.
    pub(crate) fn with_default_locale(mut self, locale: &str) -> Self {
        if let IndexSpec::String { locale: None, .. } = &self.spec {
            self.collator = Some(Collator::new(locale));
        }

        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.descending
    }

    #[must_use]
    pub fn contains(&self, key: ItemId) -> bool {
        self.entry_values.contains_key(&key)
    }

    #[must_use]
    pub fn keys(&self) -> IndexKeys<'_> {
        IndexKeys {
            inner: self.keys.iter(),
            descending: self.descending,
        }
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    const fn slot_of_position(&self, position: usize) -> usize {
        if self.descending {
            self.keys.len() - 1 - position
        } else {
            position
        }
    }

    const fn position_of_slot(&self, slot: usize) -> usize {
        self.slot_of_position(slot)
    }

    fn slot_of(&self, key: ItemId) -> Option<usize> {
        self.slots.get(&key).copied()
    }

    fn renumber(&mut self, from: usize) {
        for (slot, key) in self.keys.iter().enumerate().skip(from) {
            self.slots.insert(*key, slot);
        }
    }

    /// Key at a 0-based position; negative positions count from the end.
    pub fn key_at(&self, position: isize) -> Result<ItemId, IndexError> {
        let len = self.keys.len();
        let resolved = if position < 0 {
            len.checked_sub(position.unsigned_abs())
        } else {
            Some(position.unsigned_abs()).filter(|p| *p < len)
        };

        resolved
            .map(|p| self.keys[self.slot_of_position(p)])
            .ok_or_else(|| IndexError::PositionOutOfRange {
                index: self.name.clone(),
                position,
                len,
            })
    }

    #[must_use]
    pub fn position_of(&self, key: ItemId) -> Option<usize> {
        self.slot_of(key).map(|slot| self.position_of_slot(slot))
    }

    #[must_use]
    pub fn first_key(&self) -> Option<ItemId> {
        self.keys().next()
    }

    #[must_use]
    pub fn last_key(&self) -> Option<ItemId> {
        self.keys().next_back()
    }

    pub fn next_key(&self, key: ItemId) -> Result<Option<ItemId>, IndexError> {
        let position = self.require_position(key)?;

        Ok(self.key_at_checked(position + 1))
    }

    pub fn previous_key(&self, key: ItemId) -> Result<Option<ItemId>, IndexError> {
        let position = self.require_position(key)?;

        Ok(position
            .checked_sub(1)
            .and_then(|p| self.key_at_checked(p)))
    }

    /// Keys from `first` through `last` inclusive, in iteration order.
    pub fn keys_between(
        &self,
        first: Option<ItemId>,
        last: Option<ItemId>,
    ) -> Result<Vec<ItemId>, IndexError> {
        let start = first.map(|k| self.require_position(k)).transpose()?.unwrap_or(0);
        let end = match last {
            Some(k) => self.require_position(k)? + 1,
            None => self.keys.len(),
        };

        Ok((start..end.max(start))
            .filter_map(|p| self.key_at_checked(p))
            .collect())
    }

    fn key_at_checked(&self, position: usize) -> Option<ItemId> {
        (position < self.keys.len()).then(|| self.keys[self.slot_of_position(position)])
    }

    fn require_position(&self, key: ItemId) -> Result<usize, IndexError> {
        self.position_of(key).ok_or_else(|| self.unknown(key))
    }

    fn unknown(&self, key: ItemId) -> IndexError {
        IndexError::UnknownKey {
            index: self.name.clone(),
            key,
        }
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Ascending comparison of two keys under this index's sort.
    /// Missing or null attribute values sort after every present value.
    pub(crate) fn compare(&self, ctx: &dyn IndexContext, left: ItemId, right: ItemId) -> Ordering {
        match &self.spec {
            IndexSpec::Numeric => Ordering::Equal,
            IndexSpec::Attribute { attributes, .. } => attributes
                .iter()
                .map(|attr| missing_last_cmp(ctx.attribute(left, attr), ctx.attribute(right, attr)))
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal),
            IndexSpec::Value { attribute } => {
                let l = ctx.attribute(left, attribute);
                let r = ctx.attribute(right, attribute);
                match (l, r) {
                    (Some(l), Some(r)) => canonical_cmp(l, r),
                    _ => missing_last_cmp(l, r),
                }
                .then_with(|| left.cmp(&right))
            }
            IndexSpec::String { attribute, .. } => {
                let l = ctx.attribute(left, attribute).and_then(|v| v.as_text());
                let r = ctx.attribute(right, attribute).and_then(|v| v.as_text());
                match (l, r, &self.collator) {
                    (Some(l), Some(r), Some(collator)) => collator.compare(l, r),
                    (Some(l), Some(r), None) => l.cmp(r),
                    (None, None, _) => Ordering::Equal,
                    (None, Some(_), _) => Ordering::Greater,
                    (Some(_), None, _) => Ordering::Less,
                }
            }
            IndexSpec::Compare { comparator } => comparator.compare(ctx, left, right),
        }
    }

    // Slot after every key that sorts equal or lower, so equal keys keep
    // their insertion order.
    fn sorted_slot(&self, ctx: &dyn IndexContext, key: ItemId) -> usize {
        self.keys
            .partition_point(|k| self.compare(ctx, *k, key) != Ordering::Greater)
    }

    fn target_slot(&self, ctx: &dyn IndexContext, key: ItemId, after: Option<ItemId>) -> usize {
        if self.spec.is_sorted() {
            return self.sorted_slot(ctx, key);
        }

        after
            .and_then(|a| self.slot_of(a))
            .map_or(0, |slot| slot + 1)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert `key` after `after` (numeric) or at its sorted slot.
    /// Returns false when the key was already present.
    pub fn insert_key(&mut self, ctx: &dyn IndexContext, key: ItemId, after: Option<ItemId>) -> bool {
        if self.contains(key) {
            return false;
        }

        let slot = self.target_slot(ctx, key, after);
        self.keys.insert(slot, key);
        self.renumber(slot);
        self.entry_values.insert(key, 0);
        self.ranges.on_insert(self.position_of_slot(slot));

        true
    }

    /// Remove `key`, shifting selection ranges. Returns false when absent.
    pub fn remove_key(&mut self, key: ItemId) -> bool {
        let Some(slot) = self.slot_of(key) else {
            return false;
        };

        let position = self.position_of_slot(slot);
        self.keys.remove(slot);
        self.slots.remove(&key);
        self.renumber(slot);
        self.entry_values.remove(&key);
        self.ranges.on_remove(position);

        true
    }

    /// Move `key` after `after` in a numeric index; sorted indexes re-sort
    /// the key instead. The key's entry value and selection state move with it.
    pub fn move_key(
        &mut self,
        ctx: &dyn IndexContext,
        key: ItemId,
        after: Option<ItemId>,
    ) -> Result<(), IndexError> {
        if after == Some(key) {
            return Ok(());
        }
        if let Some(after) = after
            && !self.contains(after)
        {
            return Err(self.unknown(after));
        }

        let position = self.require_position(key)?;
        let selected = self.ranges.contains(position);
        let value = self.entry_values.get(&key).copied().unwrap_or_default();

        self.remove_key(key);
        let slot = self.target_slot(ctx, key, after);
        self.keys.insert(slot, key);
        self.renumber(slot);
        self.entry_values.insert(key, value);

        let position = self.position_of_slot(slot);
        self.ranges.on_insert(position);
        if selected {
            self.ranges.add((position, position));
        } else {
            self.ranges.remove((position, position));
        }

        Ok(())
    }

    /// Re-sort a single key after one of its monitored attributes changed.
    /// Returns true when the key moved.
    pub fn reindex_key(&mut self, ctx: &dyn IndexContext, key: ItemId) -> bool {
        if !self.valid || !self.spec.is_sorted() {
            return false;
        }
        let Some(slot) = self.slot_of(key) else {
            return false;
        };

        let before_ok = slot == 0 || self.compare(ctx, self.keys[slot - 1], key) != Ordering::Greater;
        let after_ok = slot + 1 >= self.keys.len()
            || self.compare(ctx, key, self.keys[slot + 1]) != Ordering::Greater;
        if before_ok && after_ok {
            return false;
        }

        record(MetricsEvent::IndexReindexed);

        self.move_key(ctx, key, None).is_ok()
    }

    /// Drop all keys; ranges and direction survive.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.slots.clear();
        self.entry_values.clear();
    }

    /// Build from scratch over `members` in collection order. Sorted
    /// indexes use a stable sort, so equal keys keep collection order.
    pub fn fill(&mut self, ctx: &dyn IndexContext, members: &[ItemId]) {
        self.clear();

        for &key in members {
            if self.entry_values.insert(key, 0).is_none() {
                self.keys.push(key);
            }
        }
        if self.spec.is_sorted() {
            let mut keys = std::mem::take(&mut self.keys);
            keys.sort_by(|a, b| self.compare(ctx, *a, *b));
            self.keys = keys;
        }
        self.renumber(0);

        self.ranges.clamp(self.keys.len());
        self.valid = true;

        record(MetricsEvent::IndexBuilt {
            keys: u64::try_from(self.keys.len()).unwrap_or(u64::MAX),
        });
    }

    // ------------------------------------------------------------------
    // Validity
    // ------------------------------------------------------------------

    /// Mark invalid, keeping the current structure as a restore candidate.
    pub fn invalidate(&mut self) {
        if !self.valid {
            return;
        }
        if self.saved.is_none() {
            self.saved = Some(self.snapshot());
        }
        self.valid = false;

        record(MetricsEvent::IndexInvalidated);
    }

    /// Stash persisted state to restore from at the next revalidation.
    pub(crate) fn stage(&mut self, snapshot: IndexSnapshot) {
        self.saved = Some(snapshot);
        self.valid = false;
    }

    /// Revalidate against `members`: restore the saved structure when it
    /// still describes the same keys in a consistent order, else rebuild.
    pub fn validate(&mut self, ctx: &dyn IndexContext, members: &[ItemId]) {
        if self.valid {
            return;
        }

        if let Some(saved) = self.saved.take()
            && self.restore(ctx, saved, members)
        {
            self.valid = true;
            record(MetricsEvent::IndexRestored);
            return;
        }

        self.fill(ctx, members);
    }

    fn restore(&mut self, ctx: &dyn IndexContext, saved: IndexSnapshot, members: &[ItemId]) -> bool {
        if saved.keys.len() != members.len() {
            return false;
        }
        let mut wanted: Vec<_> = members.to_vec();
        let mut have = saved.keys.clone();
        wanted.sort_unstable();
        have.sort_unstable();
        if wanted != have {
            return false;
        }

        let sorted_ok = !self.spec.is_sorted()
            || saved
                .keys
                .windows(2)
                .all(|w| self.compare(ctx, w[0], w[1]) != Ordering::Greater);
        if !sorted_ok {
            return false;
        }

        self.keys = saved.keys;
        self.slots.clear();
        self.renumber(0);
        self.entry_values = saved.entry_values.into_iter().collect();
        for key in &self.keys {
            self.entry_values.entry(*key).or_insert(0);
        }
        self.ranges = saved.ranges;
        self.ranges.clamp(self.keys.len());
        self.descending = saved.descending;

        true
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            name: self.name.clone(),
            kind: self.spec.kind(),
            keys: self.keys.clone(),
            entry_values: self
                .keys
                .iter()
                .map(|k| (*k, self.entry_values.get(k).copied().unwrap_or_default()))
                .collect(),
            ranges: self.ranges.clone(),
            descending: self.descending,
        }
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Binary search in iteration order. `predicate` reports how a key
    /// compares to the value sought and must be monotonic in that order.
    pub fn find_key(&self, mode: FindMode, predicate: &dyn Fn(ItemId) -> Ordering) -> Option<ItemId> {
        let len = self.keys.len();
        let at = |p: usize| self.keys[self.slot_of_position(p)];

        match mode {
            FindMode::Exact => {
                let (mut lo, mut hi) = (0, len);
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    match predicate(at(mid)) {
                        Ordering::Equal => return Some(at(mid)),
                        Ordering::Less => lo = mid + 1,
                        Ordering::Greater => hi = mid,
                    }
                }
                None
            }
            FindMode::First => {
                let p = partition(len, |p| predicate(at(p)) == Ordering::Less);
                (p < len && predicate(at(p)) == Ordering::Equal).then(|| at(p))
            }
            FindMode::Last => {
                let p = partition(len, |p| predicate(at(p)) != Ordering::Greater);
                p.checked_sub(1)
                    .filter(|q| predicate(at(*q)) == Ordering::Equal)
                    .map(at)
            }
        }
    }

    // ------------------------------------------------------------------
    // Entry values, ranges, direction
    // ------------------------------------------------------------------

    pub fn entry_value(&self, key: ItemId) -> Result<i32, IndexError> {
        self.entry_values
            .get(&key)
            .copied()
            .ok_or_else(|| self.unknown(key))
    }

    pub fn set_entry_value(&mut self, key: ItemId, value: i32) -> Result<(), IndexError> {
        match self.entry_values.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.unknown(key)),
        }
    }

    #[must_use]
    pub const fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    /// Replace the selection; positions past the last key are dropped.
    pub fn set_ranges(&mut self, ranges: RangeSet) {
        self.ranges = ranges;
        self.ranges.clamp(self.keys.len());
    }

    pub fn add_range(&mut self, range: (usize, usize)) {
        self.ranges.add(range);
        self.ranges.clamp(self.keys.len());
    }

    pub fn remove_range(&mut self, range: (usize, usize)) {
        self.ranges.remove(range);
    }

    #[must_use]
    pub fn is_in_ranges(&self, range: (usize, usize)) -> bool {
        self.ranges.contains_range(range)
    }

    /// Keys at selected positions, in iteration order.
    pub fn iter_ranges(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ranges
            .positions()
            .filter_map(|p| self.key_at_checked(p))
    }

    /// Set direction; returns the previous one. Ranges are mirrored so the
    /// same keys stay selected.
    pub fn set_descending(&mut self, descending: bool) -> bool {
        let previous = self.descending;
        if previous != descending {
            self.descending = descending;
            self.ranges.mirror(self.keys.len());
        }

        previous
    }
}

// Lowest position in 0..len for which `before` is false.
fn partition(len: usize, before: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if before(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    lo
}

///
/// IndexKeys
///

pub struct IndexKeys<'a> {
    inner: slice::Iter<'a, ItemId>,
    descending: bool,
}

impl Iterator for IndexKeys<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.descending {
            self.inner.next_back().copied()
        } else {
            self.inner.next().copied()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for IndexKeys<'_> {
    fn next_back(&mut self) -> Option<ItemId> {
        if self.descending {
            self.inner.next().copied()
        } else {
            self.inner.next_back().copied()
        }
    }
}

impl ExactSizeIterator for IndexKeys<'_> {}

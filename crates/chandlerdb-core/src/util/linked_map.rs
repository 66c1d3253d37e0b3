use crate::error::ErrorClass;
use std::{collections::HashMap, fmt, hash::Hash};
use thiserror::Error as ThisError;

///
/// LinkedMapError
///

#[derive(Debug, ThisError)]
pub enum LinkedMapError {
    #[error("key not found: {key}")]
    MissingKey { key: String },

    #[error("alias '{alias}' already set for key {key}")]
    AliasInUse { alias: String, key: String },
}

impl LinkedMapError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingKey { .. } => ErrorClass::NotFound,
            Self::AliasInUse { .. } => ErrorClass::Conflict,
        }
    }

    fn missing(key: impl fmt::Display) -> Self {
        Self::MissingKey {
            key: key.to_string(),
        }
    }
}

///
/// AliasResolver
///
/// Fallback used when an alias is not bound to a loaded entry.
/// Lets the owner resolve aliases of entries that are not materialized yet.
///

pub trait AliasResolver<K> {
    fn resolve_alias(&self, alias: &str) -> Option<K>;
}

///
/// Link
///

#[derive(Clone, Debug)]
struct Link<K, V> {
    value: V,
    previous: Option<K>,
    next: Option<K>,
    alias: Option<String>,
}

///
/// LinkedMap
///
/// Ordered map with O(1) relinking and alias lookup.
/// Traversal from `first` to `last` visits every key exactly once, and
/// `aliases` is the exact inverse of the per-link alias fields.
///

#[derive(Clone, Debug)]
pub struct LinkedMap<K, V> {
    links: HashMap<K, Link<K, V>>,
    first: Option<K>,
    last: Option<K>,
    aliases: HashMap<String, K>,
}

impl<K, V> Default for LinkedMap<K, V> {
    fn default() -> Self {
        Self {
            links: HashMap::new(),
            first: None,
            last: None,
            aliases: HashMap::new(),
        }
    }
}

impl<K, V> LinkedMap<K, V>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.links.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.links.get(key).map(|link| &link.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.links.get_mut(key).map(|link| &mut link.value)
    }

    #[must_use]
    pub const fn first_key(&self) -> Option<K> {
        self.first
    }

    #[must_use]
    pub const fn last_key(&self) -> Option<K> {
        self.last
    }

    #[must_use]
    pub fn next_key(&self, key: &K) -> Option<K> {
        self.links.get(key).and_then(|link| link.next)
    }

    #[must_use]
    pub fn previous_key(&self, key: &K) -> Option<K> {
        self.links.get(key).and_then(|link| link.previous)
    }

    /// Append `key` at the end. An existing key keeps its position and
    /// has its value replaced; the previous value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(link) = self.links.get_mut(&key) {
            return Some(std::mem::replace(&mut link.value, value));
        }

        let previous = self.last;
        self.links.insert(
            key,
            Link {
                value,
                previous,
                next: None,
                alias: None,
            },
        );

        match previous.and_then(|prev| self.links.get_mut(&prev)) {
            Some(prev) => prev.next = Some(key),
            None => self.first = Some(key),
        }
        self.last = Some(key);

        None
    }

    /// Insert `key` immediately after `after` (front when `None`).
    pub fn insert_after(
        &mut self,
        key: K,
        value: V,
        after: Option<K>,
    ) -> Result<Option<V>, LinkedMapError> {
        if let Some(after) = after
            && !self.links.contains_key(&after)
        {
            return Err(LinkedMapError::missing(after));
        }

        let replaced = self.insert(key, value);
        self.place(key, after)?;

        Ok(replaced)
    }

    /// Move `key` to the position immediately following `after`, or to the
    /// front when `after` is `None`. Other keys keep their relative order.
    pub fn place(&mut self, key: K, after: Option<K>) -> Result<(), LinkedMapError> {
        let current_previous = self
            .links
            .get(&key)
            .ok_or_else(|| LinkedMapError::missing(key))?
            .previous;
        if after == Some(key) {
            return Ok(());
        }
        if let Some(after) = after
            && !self.links.contains_key(&after)
        {
            return Err(LinkedMapError::missing(after));
        }
        if current_previous == after {
            return Ok(());
        }

        self.unlink(key);
        self.link_after(key, after);

        Ok(())
    }

    /// Remove `key`, relinking its neighbors and dropping its alias.
    pub fn remove(&mut self, key: &K) -> Result<V, LinkedMapError> {
        if !self.links.contains_key(key) {
            return Err(LinkedMapError::missing(*key));
        }

        self.unlink(*key);
        let link = self
            .links
            .remove(key)
            .ok_or_else(|| LinkedMapError::missing(*key))?;

        if let Some(alias) = &link.alias {
            self.aliases.remove(alias);
        }

        Ok(link.value)
    }

    /// Bind `alias` to `key`, returning the key's previous alias.
    /// `None` clears the alias. Rebinding a key's own alias is idempotent.
    pub fn set_alias(
        &mut self,
        key: K,
        alias: Option<&str>,
    ) -> Result<Option<String>, LinkedMapError> {
        if let Some(alias) = alias
            && let Some(bound) = self.aliases.get(alias)
            && *bound != key
        {
            return Err(LinkedMapError::AliasInUse {
                alias: alias.to_string(),
                key: bound.to_string(),
            });
        }

        let link = self
            .links
            .get_mut(&key)
            .ok_or_else(|| LinkedMapError::missing(key))?;
        let old = link.alias.clone();

        if old.as_deref() != alias {
            if let Some(old) = &old {
                self.aliases.remove(old);
            }
            link.alias = alias.map(str::to_string);
            if let Some(alias) = alias {
                self.aliases.insert(alias.to_string(), key);
            }
        }

        Ok(old)
    }

    #[must_use]
    pub fn alias_of(&self, key: &K) -> Option<&str> {
        self.links.get(key).and_then(|link| link.alias.as_deref())
    }

    /// Resolve an alias to its key. The resolver is consulted only when the
    /// alias is not bound to a loaded entry.
    #[must_use]
    pub fn resolve_alias(&self, alias: &str, resolver: Option<&dyn AliasResolver<K>>) -> Option<K> {
        self.aliases
            .get(alias)
            .copied()
            .or_else(|| resolver.and_then(|r| r.resolve_alias(alias)))
    }

    #[must_use]
    pub fn get_by_alias(
        &self,
        alias: &str,
        resolver: Option<&dyn AliasResolver<K>>,
    ) -> Option<&V> {
        self.resolve_alias(alias, resolver)
            .and_then(|key| self.get(&key))
    }

    /// Keys in link order.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            map: self,
            next: self.first,
            last: None,
        }
    }

    /// Keys from `first` (or the head) through `last` inclusive (or the tail).
    #[must_use]
    pub fn keys_between(&self, first: Option<K>, last: Option<K>) -> Keys<'_, K, V> {
        Keys {
            map: self,
            next: first.or(self.first),
            last,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.keys().filter_map(|key| self.get(&key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.keys()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
    }

    /// `(alias, key)` pairs in link order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, K)> {
        self.keys().filter_map(|key| {
            self.links
                .get(&key)
                .and_then(|link| link.alias.as_deref())
                .map(|alias| (alias, key))
        })
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.aliases.clear();
        self.first = None;
        self.last = None;
    }

    /// Replace this map's contents with a copy of `other`, aliases included.
    pub fn copy_from(&mut self, other: &Self)
    where
        V: Clone,
    {
        self.links.clone_from(&other.links);
        self.aliases.clone_from(&other.aliases);
        self.first = other.first;
        self.last = other.last;
    }

    // Detach `key` from its neighbors; the link itself stays in the table.
    fn unlink(&mut self, key: K) {
        let Some((previous, next)) = self.links.get(&key).map(|l| (l.previous, l.next)) else {
            return;
        };

        match previous.and_then(|prev| self.links.get_mut(&prev)) {
            Some(prev) => prev.next = next,
            None => self.first = next,
        }
        match next.and_then(|next| self.links.get_mut(&next)) {
            Some(next_link) => next_link.previous = previous,
            None => self.last = previous,
        }
    }

    fn link_after(&mut self, key: K, after: Option<K>) {
        let after_next = match after {
            Some(after) => self.links.get(&after).and_then(|l| l.next),
            None => self.first,
        };

        if let Some(link) = self.links.get_mut(&key) {
            link.previous = after;
            link.next = after_next;
        }
        match after.and_then(|after| self.links.get_mut(&after)) {
            Some(after_link) => after_link.next = Some(key),
            None => self.first = Some(key),
        }
        match after_next.and_then(|next| self.links.get_mut(&next)) {
            Some(next_link) => next_link.previous = Some(key),
            None => self.last = Some(key),
        }
    }
}

///
/// Keys
///
/// Lazy forward traversal; restartable by calling `keys()` again.
///

pub struct Keys<'a, K, V> {
    map: &'a LinkedMap<K, V>,
    next: Option<K>,
    last: Option<K>,
}

impl<K, V> Iterator for Keys<'_, K, V>
where
    K: Copy + Eq + Hash,
{
    type Item = K;

    fn next(&mut self) -> Option<K> {
        let key = self.next?;
        self.next = if Some(key) == self.last {
            None
        } else {
            self.map.links.get(&key).and_then(|link| link.next)
        };

        Some(key)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map_of(keys: &[u32]) -> LinkedMap<u32, String> {
        let mut map = LinkedMap::new();
        for key in keys {
            map.insert(*key, format!("v{key}"));
        }
        map
    }

    fn keys(map: &LinkedMap<u32, String>) -> Vec<u32> {
        map.keys().collect()
    }

    #[test]
    fn insert_appends_and_replace_keeps_position() {
        let mut map = map_of(&[1, 2, 3]);

        assert_eq!(map.insert(2, "two".into()), Some("v2".into()));
        assert_eq!(keys(&map), vec![1, 2, 3]);
        assert_eq!(map.get(&2).map(String::as_str), Some("two"));
    }

    #[test]
    fn place_moves_after_key_and_to_front() {
        let mut map = map_of(&[1, 2, 3, 4]);

        map.place(1, Some(3)).expect("place after 3");
        assert_eq!(keys(&map), vec![2, 3, 1, 4]);

        map.place(4, None).expect("place at front");
        assert_eq!(keys(&map), vec![4, 2, 3, 1]);
        assert_eq!(map.first_key(), Some(4));
        assert_eq!(map.last_key(), Some(1));

        // already in position, and self-placement
        map.place(2, Some(4)).expect("no-op");
        map.place(3, Some(3)).expect("no-op");
        assert_eq!(keys(&map), vec![4, 2, 3, 1]);
    }

    #[test]
    fn place_missing_key_fails() {
        let mut map = map_of(&[1]);

        assert!(matches!(
            map.place(9, None),
            Err(LinkedMapError::MissingKey { .. })
        ));
        assert!(matches!(
            map.place(1, Some(9)),
            Err(LinkedMapError::MissingKey { .. })
        ));
    }

    #[test]
    fn remove_relinks_endpoints_and_drops_alias() {
        let mut map = map_of(&[1, 2, 3]);
        map.set_alias(1, Some("one")).expect("alias");

        assert_eq!(map.remove(&1).expect("remove"), "v1");
        assert_eq!(map.first_key(), Some(2));
        assert_eq!(map.resolve_alias("one", None), None);

        map.remove(&3).expect("remove");
        assert_eq!(map.last_key(), Some(2));
        assert!(matches!(
            map.remove(&3),
            Err(LinkedMapError::MissingKey { .. })
        ));
    }

    #[test]
    fn alias_is_unique_and_rebinding_is_idempotent() {
        let mut map = map_of(&[1, 2]);

        assert_eq!(map.set_alias(1, Some("a")).expect("bind"), None);
        assert_eq!(
            map.set_alias(1, Some("a")).expect("rebind"),
            Some("a".into())
        );
        assert!(matches!(
            map.set_alias(2, Some("a")),
            Err(LinkedMapError::AliasInUse { .. })
        ));

        assert_eq!(map.set_alias(1, Some("b")).expect("rename"), Some("a".into()));
        assert_eq!(map.resolve_alias("a", None), None);
        assert_eq!(map.get_by_alias("b", None).map(String::as_str), Some("v1"));
        assert_eq!(map.aliases().collect::<Vec<_>>(), vec![("b", 1)]);
    }

    #[test]
    fn resolver_is_consulted_only_for_unbound_aliases() {
        struct Fixed;
        impl AliasResolver<u32> for Fixed {
            fn resolve_alias(&self, alias: &str) -> Option<u32> {
                (alias == "lazy").then_some(7)
            }
        }

        let mut map = map_of(&[1]);
        map.set_alias(1, Some("loaded")).expect("alias");

        assert_eq!(map.resolve_alias("loaded", Some(&Fixed)), Some(1));
        assert_eq!(map.resolve_alias("lazy", None), None);
        assert_eq!(map.resolve_alias("lazy", Some(&Fixed)), Some(7));
    }

    #[test]
    fn keys_between_includes_end() {
        let map = map_of(&[1, 2, 3, 4, 5]);

        assert_eq!(
            map.keys_between(Some(2), Some(4)).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(map.keys_between(None, Some(1)).collect::<Vec<_>>(), vec![1]);
        assert_eq!(
            map.keys_between(Some(4), None).collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn copy_from_duplicates_order_and_aliases() {
        let mut source = map_of(&[3, 1, 2]);
        source.set_alias(1, Some("one")).expect("alias");

        let mut copy = map_of(&[9]);
        copy.copy_from(&source);
        source.remove(&1).expect("remove from source");

        assert_eq!(keys(&copy), vec![3, 1, 2]);
        assert_eq!(copy.resolve_alias("one", None), Some(1));
    }

    #[derive(Clone, Debug)]
    enum Step {
        Insert(u8),
        Place(u8, Option<u8>),
        Remove(u8),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..16).prop_map(Step::Insert),
            (0u8..16, proptest::option::of(0u8..16)).prop_map(|(k, a)| Step::Place(k, a)),
            (0u8..16).prop_map(Step::Remove),
        ]
    }

    proptest! {
        #[test]
        fn order_matches_reference_model(steps in proptest::collection::vec(step(), 0..64)) {
            let mut map = LinkedMap::<u32, ()>::new();
            let mut model: Vec<u32> = Vec::new();

            for step in steps {
                match step {
                    Step::Insert(k) => {
                        let k = u32::from(k);
                        map.insert(k, ());
                        if !model.contains(&k) {
                            model.push(k);
                        }
                    }
                    Step::Place(k, after) => {
                        let k = u32::from(k);
                        let after = after.map(u32::from);
                        let valid = model.contains(&k)
                            && after.is_none_or(|a| model.contains(&a));
                        let result = map.place(k, after);
                        prop_assert_eq!(result.is_ok(), valid);

                        if valid && after != Some(k) {
                            model.retain(|x| *x != k);
                            let at = after
                                .and_then(|a| model.iter().position(|x| *x == a))
                                .map_or(0, |p| p + 1);
                            model.insert(at, k);
                        }
                    }
                    Step::Remove(k) => {
                        let k = u32::from(k);
                        prop_assert_eq!(map.remove(&k).is_ok(), model.contains(&k));
                        model.retain(|x| *x != k);
                    }
                }

                prop_assert_eq!(map.keys().collect::<Vec<_>>(), model.clone());
                prop_assert_eq!(map.len(), model.len());
                prop_assert_eq!(map.first_key(), model.first().copied());
                prop_assert_eq!(map.last_key(), model.last().copied());
            }
        }
    }
}

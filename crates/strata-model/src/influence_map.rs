//! Level-keyed buckets of influences.

use std::sync::Arc;

use indexmap::IndexMap;
use strata_core::LevelId;

use crate::influence::Influence;

/// Mapping from level to the influences addressed to it.
///
/// Buckets preserve insertion order, and every influence sits in the
/// bucket of its own target level. Influences are shared (`Arc`) once
/// added: they are immutable from then on.
#[derive(Clone, Debug, Default)]
pub struct InfluenceMap {
    buckets: IndexMap<LevelId, Vec<Arc<Influence>>>,
}

impl InfluenceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an influence to its target level's bucket.
    pub fn add(&mut self, influence: Influence) {
        self.add_shared(Arc::new(influence));
    }

    /// Append an already shared influence, e.g. one re-emitted by a
    /// reaction model so that it persists.
    pub fn add_shared(&mut self, influence: Arc<Influence>) {
        self.buckets
            .entry(influence.target_level().clone())
            .or_default()
            .push(influence);
    }

    /// Concatenate every bucket of `other` onto this map.
    pub fn add_all(&mut self, other: &InfluenceMap) {
        for (level, influences) in &other.buckets {
            if influences.is_empty() {
                continue;
            }
            self.buckets
                .entry(level.clone())
                .or_default()
                .extend(influences.iter().cloned());
        }
    }

    /// Like [`add_all`](Self::add_all) but consumes `other`.
    pub fn merge(&mut self, other: InfluenceMap) {
        for (level, influences) in other.buckets {
            if influences.is_empty() {
                continue;
            }
            self.buckets.entry(level).or_default().extend(influences);
        }
    }

    /// Whether no bucket holds anything.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Whether the bucket of `level` is empty.
    pub fn is_empty_for(&self, level: &LevelId) -> bool {
        self.buckets.get(level).map_or(true, Vec::is_empty)
    }

    /// Influences addressed to `level`, in insertion order.
    pub fn get_for_level(&self, level: &LevelId) -> &[Arc<Influence>] {
        self.buckets.get(level).map_or(&[], Vec::as_slice)
    }

    /// Levels with a (possibly empty) bucket, in first-use order.
    pub fn levels(&self) -> impl Iterator<Item = &LevelId> {
        self.buckets.keys()
    }

    /// Total number of influences.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Remove and return the bucket of `level`.
    pub fn take_for_level(&mut self, level: &LevelId) -> Vec<Arc<Influence>> {
        self.buckets.shift_remove(level).unwrap_or_default()
    }
}

impl IntoIterator for InfluenceMap {
    type Item = (LevelId, Vec<Arc<Influence>>);
    type IntoIter = indexmap::map::IntoIter<LevelId, Vec<Arc<Influence>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use strata_core::{Payload, TimeStamp, TimeWindow};

    fn window() -> TimeWindow {
        TimeWindow::new(TimeStamp::new(0), TimeStamp::new(1)).unwrap()
    }

    fn inf(level: &str, tag: u32) -> Influence {
        Influence::regular(
            format!("c{tag}"),
            LevelId::new(level).unwrap(),
            window(),
            Payload::new(tag),
        )
    }

    fn tags(map: &InfluenceMap, level: &str) -> Vec<u32> {
        map.get_for_level(&LevelId::new(level).unwrap())
            .iter()
            .map(|i| *i.payload().unwrap().downcast_ref::<u32>().unwrap())
            .collect()
    }

    #[test]
    fn buckets_keep_insertion_order() {
        let mut map = InfluenceMap::new();
        map.add(inf("L", 1));
        map.add(inf("M", 2));
        map.add(inf("L", 3));
        assert_eq!(tags(&map, "L"), vec![1, 3]);
        assert_eq!(tags(&map, "M"), vec![2]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn empty_checks() {
        let mut map = InfluenceMap::new();
        let l = LevelId::new("L").unwrap();
        assert!(map.is_empty());
        assert!(map.is_empty_for(&l));
        map.add(inf("L", 1));
        assert!(!map.is_empty());
        assert!(!map.is_empty_for(&l));
        assert!(map.is_empty_for(&LevelId::new("M").unwrap()));
        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn add_all_concatenates_per_key() {
        let mut a = InfluenceMap::new();
        a.add(inf("L", 1));
        let mut b = InfluenceMap::new();
        b.add(inf("L", 2));
        b.add(inf("M", 3));
        a.add_all(&b);
        assert_eq!(tags(&a, "L"), vec![1, 2]);
        assert_eq!(tags(&a, "M"), vec![3]);
        // The source map is untouched and shares the same influences.
        assert!(Arc::ptr_eq(
            &a.get_for_level(&LevelId::new("M").unwrap())[0],
            &b.get_for_level(&LevelId::new("M").unwrap())[0]
        ));
    }

    #[test]
    fn every_influence_sits_in_its_target_bucket() {
        let mut map = InfluenceMap::new();
        for (i, level) in ["L", "M", "N", "L"].iter().enumerate() {
            map.add(inf(level, i as u32));
        }
        for level in map.levels() {
            assert!(map
                .get_for_level(level)
                .iter()
                .all(|i| i.target_level() == level));
        }
    }

    proptest! {
        #[test]
        fn sequential_add_all_equals_union(
            first in prop::collection::vec((0usize..3, any::<u32>()), 0..12),
            second in prop::collection::vec((0usize..3, any::<u32>()), 0..12),
        ) {
            let names = ["L", "M", "N"];
            let build = |items: &[(usize, u32)]| {
                let mut m = InfluenceMap::new();
                for (l, t) in items {
                    m.add(inf(names[*l], *t));
                }
                m
            };
            let a = build(&first);
            let b = build(&second);

            let mut sequential = InfluenceMap::new();
            sequential.add_all(&a);
            sequential.add_all(&b);

            let union: Vec<(usize, u32)> = first.iter().chain(second.iter()).cloned().collect();
            let mut combined = InfluenceMap::new();
            combined.add_all(&build(&union));

            for name in names {
                prop_assert_eq!(tags(&sequential, name), tags(&combined, name));
            }
        }
    }
}

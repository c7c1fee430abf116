use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A previously confirmed valid (param, key) pair used to bootstrap prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub param: i64,
    pub key: i64,
}

impl ReferencePoint {
    pub fn new(param: i64, key: i64) -> Self {
        Self { param, key }
    }
}

/// Seed constants plus everything learned during runs, indexed by param.
///
/// The anchor key of a param is its lowest known key: attachment ids for an
/// act start there and grow upward, so the anchor is what interpolation and
/// extrapolation work with.
#[derive(Debug, Clone, Default)]
pub struct ReferencePointStore {
    points: BTreeMap<i64, BTreeSet<i64>>,
}

impl ReferencePointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seeds(seeds: &[ReferencePoint]) -> Self {
        let mut store = Self::new();
        for seed in seeds {
            store.learn(seed.param, seed.key);
        }
        store
    }

    pub fn learn(&mut self, param: i64, key: i64) {
        self.points.entry(param).or_default().insert(key);
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of distinct params with at least one known key.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn keys_for(&self, param: i64) -> Option<&BTreeSet<i64>> {
        self.points.get(&param)
    }

    pub fn anchor_for(&self, param: i64) -> Option<i64> {
        self.keys_for(param).and_then(|keys| keys.first().copied())
    }

    /// Nearest known point strictly below `param`.
    pub fn bracket_below(&self, param: i64) -> Option<ReferencePoint> {
        self.points
            .range(..param)
            .next_back()
            .and_then(|(&p, keys)| keys.first().map(|&k| ReferencePoint::new(p, k)))
    }

    /// Nearest known point strictly above `param`.
    pub fn bracket_above(&self, param: i64) -> Option<ReferencePoint> {
        self.points
            .range(param + 1..)
            .next()
            .and_then(|(&p, keys)| keys.first().map(|&k| ReferencePoint::new(p, k)))
    }

    /// Up to `n` anchors strictly below `param`, nearest last.
    pub fn anchors_below(&self, param: i64, n: usize) -> Vec<ReferencePoint> {
        let mut anchors: Vec<ReferencePoint> = self
            .points
            .range(..param)
            .rev()
            .take(n)
            .filter_map(|(&p, keys)| keys.first().map(|&k| ReferencePoint::new(p, k)))
            .collect();
        anchors.reverse();
        anchors
    }

    /// Up to `n` anchors strictly above `param`, nearest first.
    pub fn anchors_above(&self, param: i64, n: usize) -> Vec<ReferencePoint> {
        self.points
            .range(param + 1..)
            .take(n)
            .filter_map(|(&p, keys)| keys.first().map(|&k| ReferencePoint::new(p, k)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_is_lowest_key() {
        let mut store = ReferencePointStore::new();
        store.learn(50416, 56612);
        store.learn(50416, 56609);
        assert_eq!(store.anchor_for(50416), Some(56609));
    }

    #[test]
    fn keys_for_returns_every_learned_key() {
        let mut store = ReferencePointStore::new();
        store.learn(50416, 56612);
        store.learn(50416, 56609);
        store.learn(50416, 56609);

        let keys: Vec<i64> = store.keys_for(50416).unwrap().iter().copied().collect();
        assert_eq!(keys, vec![56609, 56612]);
        assert!(store.keys_for(50417).is_none());
    }

    #[test]
    fn brackets_find_nearest_params() {
        let store = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(10, 100),
            ReferencePoint::new(20, 110),
            ReferencePoint::new(40, 150),
        ]);

        assert_eq!(store.bracket_below(15), Some(ReferencePoint::new(10, 100)));
        assert_eq!(store.bracket_above(15), Some(ReferencePoint::new(20, 110)));
        assert_eq!(store.bracket_below(10), None);
        assert_eq!(store.bracket_above(40), None);
    }

    #[test]
    fn anchors_below_are_nearest_last() {
        let store = ReferencePointStore::with_seeds(&[
            ReferencePoint::new(10, 100),
            ReferencePoint::new(20, 110),
            ReferencePoint::new(30, 120),
        ]);

        let anchors = store.anchors_below(35, 2);
        assert_eq!(
            anchors,
            vec![ReferencePoint::new(20, 110), ReferencePoint::new(30, 120)]
        );
    }
}

//! Priority-weighted sampling without replacement.
//!
//! Uses exponential-race keys: every drawable candidate gets the key
//! `ln(u) / weight` for a uniform `u` in (0, 1], and the candidates with the
//! largest keys win. Sorting the keys yields the same distribution as drawing
//! one candidate at a time proportionally to weight and removing it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::RngExt;
use rand_chacha::ChaCha8Rng;

use super::{create_rng, Sample, SamplingSet, SeenSet, SubjectId, DEFAULT_PRIORITY};

/// Weighted pool; higher priority means more likely to be drawn.
///
/// Subjects whose weight is not a positive finite number stay in the pool
/// but are never drawn.
#[derive(Debug, Clone)]
pub struct PrioritySet {
    // Ordered so that a seeded rng reproduces the same draws.
    weights: BTreeMap<SubjectId, f64>,
    rng: ChaCha8Rng,
}

impl PrioritySet {
    /// Creates an empty set.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            weights: BTreeMap::new(),
            rng: create_rng(seed),
        }
    }

    /// Current weight of a subject.
    pub fn priority(&self, id: SubjectId) -> Option<f64> {
        self.weights.get(&id).copied()
    }

    /// Draws up to `count` distinct unseen subjects, ordered as if drawn one by
    /// one proportionally to weight.
    pub(crate) fn draw(&mut self, seen: &SeenSet, count: usize) -> Vec<SubjectId> {
        if count == 0 {
            return Vec::new();
        }

        let mut keyed: Vec<(f64, SubjectId)> = Vec::with_capacity(self.weights.len());
        for (&id, &weight) in &self.weights {
            if !is_drawable(weight) || seen.contains(&id) {
                continue;
            }
            let u = 1.0 - self.rng.random::<f64>();
            keyed.push((u.ln() / weight, id));
        }

        let by_key_desc = |a: &(f64, SubjectId), b: &(f64, SubjectId)| -> Ordering {
            b.0.total_cmp(&a.0)
        };

        if count < keyed.len() {
            keyed.select_nth_unstable_by(count - 1, by_key_desc);
            keyed.truncate(count);
        }
        keyed.sort_by(by_key_desc);

        keyed.into_iter().map(|(_, id)| id).collect()
    }
}

fn is_drawable(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}

impl SamplingSet for PrioritySet {
    fn add(&mut self, id: SubjectId, priority: Option<f64>) {
        self.weights.insert(id, priority.unwrap_or(DEFAULT_PRIORITY));
    }

    fn remove(&mut self, id: SubjectId) {
        self.weights.remove(&id);
    }

    fn size(&self) -> usize {
        self.weights.len()
    }

    fn contains(&self, id: SubjectId) -> bool {
        self.weights.contains_key(&id)
    }

    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample {
        Sample::Singles(self.draw(seen, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_without_priority_uses_default() {
        let mut set = PrioritySet::new(Some(1));
        set.add(1, None);
        assert_eq!(set.priority(1), Some(DEFAULT_PRIORITY));
    }

    #[test]
    fn test_add_updates_priority() {
        let mut set = PrioritySet::new(Some(1));
        set.add(1, Some(0.5));
        set.add(1, Some(3.0));
        assert_eq!(set.size(), 1);
        assert_eq!(set.priority(1), Some(3.0));
    }

    #[test]
    fn test_non_positive_weights_never_drawn() {
        let mut set = PrioritySet::new(Some(7));
        set.add(1, Some(0.0));
        set.add(2, Some(-4.0));
        set.add(3, Some(f64::NAN));
        set.add(4, Some(0.1));
        set.add(5, Some(10.0));

        assert_eq!(set.size(), 5);
        for _ in 0..200 {
            let ids = set.sample(5).ids();
            assert_eq!(ids.len(), 2);
            assert!(ids.iter().all(|id| *id == 4 || *id == 5));
        }
    }

    #[test]
    fn test_only_zero_weights_yields_empty_sample() {
        let mut set = PrioritySet::new(Some(7));
        set.add(1, Some(0.0));
        set.add(2, Some(0.0));
        assert!(set.sample(2).is_empty());
    }

    #[test]
    fn test_heavier_subjects_drawn_more_often() {
        let mut set = PrioritySet::new(Some(11));
        set.add(1, Some(1.0));
        set.add(2, Some(99.0));

        let heavy_first = (0..1000)
            .filter(|_| set.sample(1).ids() == vec![2])
            .count();
        assert!(heavy_first > 900, "heavy subject won only {heavy_first} times");
    }

    #[test]
    fn test_relative_weight_only() {
        // Scaling every weight must not change the draw for the same seed.
        let mut small = PrioritySet::new(Some(5));
        let mut large = PrioritySet::new(Some(5));
        for id in 1..=20 {
            small.add(id, Some(id as f64));
            large.add(id, Some(id as f64 * 1000.0));
        }
        assert_eq!(small.sample(5), large.sample(5));
    }

    #[test]
    fn test_subtract_excludes_seen() {
        let mut set = PrioritySet::new(Some(3));
        for id in 1..=5 {
            set.add(id, Some(1.0));
        }
        let seen: SeenSet = [1, 2, 3].into_iter().collect();

        let mut ids = set.subtract(&seen, 10).ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![4, 5]);
    }
}

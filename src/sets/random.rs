//! Uniform sampling without replacement.

use std::collections::HashMap;

use rand::RngExt;
use rand_chacha::ChaCha8Rng;

use super::{create_rng, Sample, SamplingSet, SeenSet, SubjectId};

/// Unweighted pool; every unseen subject is equally likely to be drawn.
///
/// Members live in a dense vector with a position index so that add and
/// remove stay O(1).
#[derive(Debug, Clone)]
pub struct RandomSet {
    members: Vec<SubjectId>,
    positions: HashMap<SubjectId, usize>,
    rng: ChaCha8Rng,
}

impl RandomSet {
    /// Creates an empty set.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            members: Vec::new(),
            positions: HashMap::new(),
            rng: create_rng(seed),
        }
    }

    /// Draws up to `count` distinct unseen subjects in random order.
    ///
    /// Partial Fisher-Yates over the unseen candidates: only the first
    /// `count` slots are shuffled.
    pub(crate) fn draw(&mut self, seen: &SeenSet, count: usize) -> Vec<SubjectId> {
        if count == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<SubjectId> = self
            .members
            .iter()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect();

        let take = count.min(candidates.len());
        for i in 0..take {
            let j = self.rng.random_range(i..candidates.len());
            candidates.swap(i, j);
        }

        candidates.truncate(take);
        candidates
    }
}

impl SamplingSet for RandomSet {
    fn add(&mut self, id: SubjectId, _priority: Option<f64>) {
        if self.positions.contains_key(&id) {
            return;
        }
        self.positions.insert(id, self.members.len());
        self.members.push(id);
    }

    fn remove(&mut self, id: SubjectId) {
        let Some(index) = self.positions.remove(&id) else {
            return;
        };

        self.members.swap_remove(index);
        if let Some(&moved) = self.members.get(index) {
            self.positions.insert(moved, index);
        }
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn contains(&self, id: SubjectId) -> bool {
        self.positions.contains_key(&id)
    }

    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample {
        Sample::Singles(self.draw(seen, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn set_of(ids: impl IntoIterator<Item = SubjectId>) -> RandomSet {
        let mut set = RandomSet::new(Some(42));
        for id in ids {
            set.add(id, None);
        }
        set
    }

    #[test]
    fn test_subtract_returns_exact_unseen_remainder() {
        let mut set = set_of(1..=5);
        let seen: SeenSet = [1, 2].into_iter().collect();

        let ids: HashSet<_> = set.subtract(&seen, 3).ids().into_iter().collect();
        assert_eq!(ids, [3, 4, 5].into_iter().collect());
    }

    #[test]
    fn test_subtract_everything_seen_is_empty() {
        let mut set = set_of(1..=5);
        let seen: SeenSet = (1..=5).collect();

        assert!(set.subtract(&seen, 3).is_empty());
    }

    #[test]
    fn test_sample_limit_larger_than_pool() {
        let mut set = set_of(1..=4);
        let mut ids = set.sample(100).ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = set_of(1..=3);
        set.add(2, None);
        set.add(2, Some(50.0));
        assert_eq!(set.size(), 3);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut set = set_of(1..=5);
        set.remove(1);
        set.remove(5);
        set.remove(3);

        assert_eq!(set.size(), 2);
        assert!(set.contains(2));
        assert!(set.contains(4));
        assert!(!set.contains(1));

        set.add(1, None);
        set.remove(4);
        let mut ids = set.sample(10).ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_draw_covers_whole_pool_over_many_calls() {
        let mut set = set_of(1..=6);
        let mut hits = HashSet::new();
        for _ in 0..200 {
            hits.extend(set.sample(1).ids());
        }
        assert_eq!(hits.len(), 6, "uniform draw should reach every member");
    }
}

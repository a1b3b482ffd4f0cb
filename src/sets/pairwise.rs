//! Pairwise sampling: subjects are handed out as comparison pairs.
//!
//! `limit` counts pairs. Within one result the pairs are disjoint, so `n`
//! unseen candidates yield at most `n / 2` pairs and an odd candidate out is
//! dropped rather than returned alone. Across calls a subject may show up in
//! a new pair until the user has seen it.

use super::{into_pairs, PrioritySet, RandomSet, Sample, SamplingSet, SeenSet, SubjectId};

/// Pairs drawn uniformly from the unseen candidates.
#[derive(Debug, Clone)]
pub struct PairwiseRandomSet {
    inner: RandomSet,
}

impl PairwiseRandomSet {
    /// Creates an empty set.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            inner: RandomSet::new(seed),
        }
    }
}

impl SamplingSet for PairwiseRandomSet {
    fn add(&mut self, id: SubjectId, priority: Option<f64>) {
        self.inner.add(id, priority);
    }

    fn remove(&mut self, id: SubjectId) {
        self.inner.remove(id);
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn contains(&self, id: SubjectId) -> bool {
        self.inner.contains(id)
    }

    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample {
        let drawn = self.inner.draw(seen, limit.saturating_mul(2));
        Sample::Pairs(into_pairs(drawn))
    }
}

/// Pairs whose members are each drawn proportionally to weight.
///
/// The second member of a pair is drawn by weight from the candidates left
/// after the first, which is the same as redrawing whenever the second draw
/// repeats the first.
#[derive(Debug, Clone)]
pub struct PairwisePrioritySet {
    inner: PrioritySet,
}

impl PairwisePrioritySet {
    /// Creates an empty set.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            inner: PrioritySet::new(seed),
        }
    }

    /// Current weight of a subject.
    pub fn priority(&self, id: SubjectId) -> Option<f64> {
        self.inner.priority(id)
    }
}

impl SamplingSet for PairwisePrioritySet {
    fn add(&mut self, id: SubjectId, priority: Option<f64>) {
        self.inner.add(id, priority);
    }

    fn remove(&mut self, id: SubjectId) {
        self.inner.remove(id);
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn contains(&self, id: SubjectId) -> bool {
        self.inner.contains(id)
    }

    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample {
        let drawn = self.inner.draw(seen, limit.saturating_mul(2));
        Sample::Pairs(into_pairs(drawn))
    }
}

//! Sampling sets: the subject pools owned by workflows.
//!
//! A sampling set holds the candidate subjects of one workflow and knows how
//! to draw "N subjects this user has not seen" from them. Four strategies
//! exist, selected once from a workflow's `(prioritized, pairwise)` modes:
//!
//! | prioritized | pairwise | set                    |
//! |-------------|----------|------------------------|
//! | false       | false    | [`RandomSet`]          |
//! | true        | false    | [`PrioritySet`]        |
//! | false       | true     | [`PairwiseRandomSet`]  |
//! | true        | true     | [`PairwisePrioritySet`]|
//!
//! Sets have no synchronisation of their own; each one is owned by exactly
//! one workflow actor.
//!
//! # Example
//!
//! ```rust,ignore
//! use subject_pool::sets::{SamplingSet, SeenSet, SetKind, SubjectSet};
//!
//! let mut set = SubjectSet::new(SetKind::for_modes(false, false), Some(42));
//! for id in 1..=5 {
//!     set.add(id, None);
//! }
//!
//! let seen: SeenSet = [1, 2].into_iter().collect();
//! let sample = set.subtract(&seen, 3);
//! assert_eq!(sample.len(), 3);
//! ```

pub mod pairwise;
pub mod priority;
pub mod random;

pub use pairwise::{PairwisePrioritySet, PairwiseRandomSet};
pub use priority::PrioritySet;
pub use random::RandomSet;

use std::collections::HashSet;
use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Identifier of a subject within a workflow.
pub type SubjectId = i64;

/// Identifier of a user (consumer).
pub type UserId = i64;

/// Subjects already delivered to one user.
pub type SeenSet = HashSet<SubjectId>;

/// Weight given to a subject added to a weighted set without a priority.
pub const DEFAULT_PRIORITY: f64 = 1.0;

/// Result of a sampling call.
///
/// Serialises untagged: singles as a flat array, pairs as an array of
/// two-element arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    /// Individually drawn subjects.
    Singles(Vec<SubjectId>),
    /// Disjoint comparison pairs.
    Pairs(Vec<[SubjectId; 2]>),
}

impl Sample {
    /// Number of subject ids in the sample (two per pair).
    pub fn len(&self) -> usize {
        match self {
            Sample::Singles(ids) => ids.len(),
            Sample::Pairs(pairs) => pairs.len() * 2,
        }
    }

    /// Returns true when nothing was drawn.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All subject ids in draw order, pairs flattened.
    pub fn ids(&self) -> Vec<SubjectId> {
        match self {
            Sample::Singles(ids) => ids.clone(),
            Sample::Pairs(pairs) => pairs.iter().flatten().copied().collect(),
        }
    }

    /// Returns the pairs of a pairwise sample, `None` for singles.
    pub fn pairs(&self) -> Option<&[[SubjectId; 2]]> {
        match self {
            Sample::Singles(_) => None,
            Sample::Pairs(pairs) => Some(pairs),
        }
    }
}

/// Operations shared by every sampling strategy.
pub trait SamplingSet {
    /// Inserts a subject, or updates its priority if already present.
    ///
    /// Unweighted sets ignore `priority`; weighted sets default it to
    /// [`DEFAULT_PRIORITY`].
    fn add(&mut self, id: SubjectId, priority: Option<f64>);

    /// Removes a subject. No-op when absent.
    fn remove(&mut self, id: SubjectId);

    /// Number of subjects in the pool.
    fn size(&self) -> usize;

    /// Returns true if the subject is in the pool.
    fn contains(&self, id: SubjectId) -> bool;

    /// Draws up to `limit` distinct subjects (or pairs) from those not in `seen`.
    ///
    /// Returns everything available when fewer candidates exist.
    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample;

    /// Draws up to `limit` distinct subjects (or pairs) from the whole pool.
    fn sample(&mut self, limit: usize) -> Sample {
        self.subtract(&SeenSet::new(), limit)
    }
}

/// The four sampling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetKind {
    Random,
    Priority,
    PairwiseRandom,
    PairwisePriority,
}

impl SetKind {
    /// Selects the strategy for a workflow's modes.
    pub fn for_modes(prioritized: bool, pairwise: bool) -> Self {
        match (prioritized, pairwise) {
            (false, false) => SetKind::Random,
            (true, false) => SetKind::Priority,
            (false, true) => SetKind::PairwiseRandom,
            (true, true) => SetKind::PairwisePriority,
        }
    }

    pub fn is_prioritized(self) -> bool {
        matches!(self, SetKind::Priority | SetKind::PairwisePriority)
    }

    pub fn is_pairwise(self) -> bool {
        matches!(self, SetKind::PairwiseRandom | SetKind::PairwisePriority)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SetKind::Random => "random",
            SetKind::Priority => "priority",
            SetKind::PairwiseRandom => "pairwise_random",
            SetKind::PairwisePriority => "pairwise_priority",
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sampling set of any strategy, chosen once at construction.
#[derive(Debug, Clone)]
pub enum SubjectSet {
    Random(RandomSet),
    Priority(PrioritySet),
    PairwiseRandom(PairwiseRandomSet),
    PairwisePriority(PairwisePrioritySet),
}

impl SubjectSet {
    /// Creates an empty set of the given kind.
    pub fn new(kind: SetKind, seed: Option<u64>) -> Self {
        match kind {
            SetKind::Random => SubjectSet::Random(RandomSet::new(seed)),
            SetKind::Priority => SubjectSet::Priority(PrioritySet::new(seed)),
            SetKind::PairwiseRandom => SubjectSet::PairwiseRandom(PairwiseRandomSet::new(seed)),
            SetKind::PairwisePriority => {
                SubjectSet::PairwisePriority(PairwisePrioritySet::new(seed))
            }
        }
    }

    /// The strategy this set was built with.
    pub fn kind(&self) -> SetKind {
        match self {
            SubjectSet::Random(_) => SetKind::Random,
            SubjectSet::Priority(_) => SetKind::Priority,
            SubjectSet::PairwiseRandom(_) => SetKind::PairwiseRandom,
            SubjectSet::PairwisePriority(_) => SetKind::PairwisePriority,
        }
    }

    fn inner(&self) -> &dyn SamplingSet {
        match self {
            SubjectSet::Random(set) => set,
            SubjectSet::Priority(set) => set,
            SubjectSet::PairwiseRandom(set) => set,
            SubjectSet::PairwisePriority(set) => set,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SamplingSet {
        match self {
            SubjectSet::Random(set) => set,
            SubjectSet::Priority(set) => set,
            SubjectSet::PairwiseRandom(set) => set,
            SubjectSet::PairwisePriority(set) => set,
        }
    }
}

impl SamplingSet for SubjectSet {
    fn add(&mut self, id: SubjectId, priority: Option<f64>) {
        self.inner_mut().add(id, priority);
    }

    fn remove(&mut self, id: SubjectId) {
        self.inner_mut().remove(id);
    }

    fn size(&self) -> usize {
        self.inner().size()
    }

    fn contains(&self, id: SubjectId) -> bool {
        self.inner().contains(id)
    }

    fn subtract(&mut self, seen: &SeenSet, limit: usize) -> Sample {
        self.inner_mut().subtract(seen, limit)
    }
}

/// Creates a random number generator, seeded when a seed is given.
pub(crate) fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    }
}

/// Groups an ordered draw into consecutive disjoint pairs, dropping a trailing
/// singleton.
pub(crate) fn into_pairs(ids: Vec<SubjectId>) -> Vec<[SubjectId; 2]> {
    ids.chunks_exact(2).map(|pair| [pair[0], pair[1]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [SetKind; 4] = [
        SetKind::Random,
        SetKind::Priority,
        SetKind::PairwiseRandom,
        SetKind::PairwisePriority,
    ];

    fn filled(kind: SetKind, seed: u64, ids: impl IntoIterator<Item = SubjectId>) -> SubjectSet {
        let mut set = SubjectSet::new(kind, Some(seed));
        for id in ids {
            set.add(id, Some(1.0 + (id % 7) as f64));
        }
        set
    }

    #[test]
    fn test_kind_for_modes() {
        assert_eq!(SetKind::for_modes(false, false), SetKind::Random);
        assert_eq!(SetKind::for_modes(true, false), SetKind::Priority);
        assert_eq!(SetKind::for_modes(false, true), SetKind::PairwiseRandom);
        assert_eq!(SetKind::for_modes(true, true), SetKind::PairwisePriority);
    }

    #[test]
    fn test_kind_flags_round_trip() {
        for kind in ALL_KINDS {
            assert_eq!(SetKind::for_modes(kind.is_prioritized(), kind.is_pairwise()), kind);
            assert_eq!(SubjectSet::new(kind, None).kind(), kind);
        }
    }

    #[test]
    fn test_subtract_never_returns_seen_or_duplicates() {
        let seen: SeenSet = (0..40).filter(|id| id % 3 == 0).collect();

        for kind in ALL_KINDS {
            for seed in 0..25 {
                let mut set = filled(kind, seed, 0..40);
                let ids = set.subtract(&seen, 8).ids();

                let unique: HashSet<_> = ids.iter().collect();
                assert_eq!(unique.len(), ids.len(), "{kind} returned a duplicate");
                assert!(
                    ids.iter().all(|id| !seen.contains(id)),
                    "{kind} returned a seen subject"
                );
            }
        }
    }

    #[test]
    fn test_result_size_is_min_of_limit_and_available() {
        let seen: SeenSet = (0..10).collect();

        for limit in [0, 1, 3, 10, 50] {
            let mut set = filled(SetKind::Random, 1, 0..30);
            assert_eq!(set.subtract(&seen, limit).len(), limit.min(20));
            assert_eq!(set.sample(limit).len(), limit.min(30));

            let mut set = filled(SetKind::Priority, 1, 0..30);
            assert_eq!(set.subtract(&seen, limit).len(), limit.min(20));
        }
    }

    #[test]
    fn test_pairwise_results_have_even_length() {
        for kind in [SetKind::PairwiseRandom, SetKind::PairwisePriority] {
            for pool_size in 0..9 {
                let mut set = filled(kind, 3, 0..pool_size);
                let sample = set.sample(10);
                assert_eq!(sample.len() % 2, 0);
                assert_eq!(sample.len(), (pool_size as usize / 2) * 2);
                assert!(sample.pairs().is_some());
            }
        }
    }

    #[test]
    fn test_add_then_remove_restores_pool() {
        for kind in ALL_KINDS {
            let mut set = filled(kind, 9, 1..=5);
            let before = set.size();

            set.add(99, Some(2.0));
            assert!(set.contains(99));
            set.remove(99);

            assert_eq!(set.size(), before);
            assert!(!set.contains(99));
            for id in 1..=5 {
                assert!(set.contains(id));
            }
        }
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut set = filled(SetKind::Random, 1, 1..=3);
        set.remove(42);
        assert_eq!(set.size(), 3);
    }

    #[test]
    fn test_into_pairs_drops_trailing_singleton() {
        assert_eq!(into_pairs(vec![1, 2, 3]), vec![[1, 2]]);
        assert_eq!(into_pairs(vec![1, 2, 3, 4]), vec![[1, 2], [3, 4]]);
        assert!(into_pairs(vec![]).is_empty());
    }

    #[test]
    fn test_sample_serialization() {
        let singles = Sample::Singles(vec![1, 2, 3]);
        assert_eq!(serde_json::to_string(&singles).unwrap(), "[1,2,3]");

        let pairs = Sample::Pairs(vec![[1, 2], [3, 4]]);
        assert_eq!(serde_json::to_string(&pairs).unwrap(), "[[1,2],[3,4]]");
        assert_eq!(pairs.ids(), vec![1, 2, 3, 4]);
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_seeded_sets_are_reproducible() {
        for kind in ALL_KINDS {
            let mut a = filled(kind, 42, 0..50);
            let mut b = filled(kind, 42, 0..50);
            assert_eq!(a.sample(6), b.sample(6));
        }
    }
}

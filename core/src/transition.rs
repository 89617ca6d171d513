// core/src/transition.rs
//
// Transition index: for each from-op, the bigram successors sorted by
// conditional probability, with cached probability bounds for subtree
// pruning. Materialised at generation start and dropped with the
// generator; the bigram table stays the source of truth.

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::ngram::RuleModel;
use crate::op::Op;

/// One outgoing transition: `(to, P(to | from), raw frequency)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub to: Op,
    pub p: f64,
    pub freq: u64,
}

/// All transitions out of a single from-op, probability descending.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionList {
    transitions: Vec<Transition>,
    min_p: f64,
    max_p: f64,
}

impl TransitionList {
    /// The sorted transitions whose extension of `running_p` still reaches
    /// `min_p`, i.e. the maximal prefix with `running_p * p >= min_p`.
    ///
    /// The list is probability descending, so the cutoff is a partition
    /// point; the cached `max_p` rules out whole entries first. With no
    /// threshold (`min_p <= 0`) everything is admissible.
    pub fn admissible(&self, running_p: f64, min_p: f64) -> &[Transition] {
        if min_p <= 0.0 {
            return &self.transitions;
        }
        if running_p * self.max_p < min_p {
            return &[];
        }
        let cut = self
            .transitions
            .partition_point(|t| running_p * t.p >= min_p);
        &self.transitions[..cut]
    }

    /// All transitions, probability descending.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Smallest transition probability in the list.
    pub fn min_p(&self) -> f64 {
        self.min_p
    }

    /// Largest transition probability in the list.
    pub fn max_p(&self) -> f64 {
        self.max_p
    }
}

/// Per-from-op transition lookup built from the bigram table.
#[derive(Debug, Clone, Default)]
pub struct TransitionIndex {
    by_from: AHashMap<Op, TransitionList>,
}

impl TransitionIndex {
    /// Group the model's bigrams by from-op and sort each group by
    /// probability descending, frequency descending, then to-op byte
    /// order. The final key keeps generation order independent of hash
    /// state; this is the documented tie-break.
    ///
    /// Call after `compute_probabilities`; a model with stale zero
    /// probabilities would index everything at p = 0.
    pub fn build(model: &RuleModel) -> Self {
        let mut groups: AHashMap<Op, Vec<Transition>> = AHashMap::new();
        for (&(from, to), stat) in model.bigrams() {
            groups.entry(from).or_default().push(Transition {
                to,
                p: stat.p,
                freq: stat.freq,
            });
        }

        let by_from = groups
            .into_iter()
            .map(|(from, mut transitions)| {
                transitions.sort_by(|a, b| {
                    b.p.partial_cmp(&a.p)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| b.freq.cmp(&a.freq))
                        .then_with(|| a.to.cmp(&b.to))
                });
                let max_p = transitions.first().map(|t| t.p).unwrap_or(0.0);
                let min_p = transitions.last().map(|t| t.p).unwrap_or(0.0);
                let list = TransitionList {
                    transitions,
                    min_p,
                    max_p,
                };
                (from, list)
            })
            .collect();

        Self { by_from }
    }

    /// Transitions out of `from`, or None if it never appears as a bigram
    /// prefix.
    pub fn get(&self, from: &Op) -> Option<&TransitionList> {
        self.by_from.get(from)
    }

    /// Number of distinct from-ops in the index.
    pub fn len(&self) -> usize {
        self.by_from.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_from.is_empty()
    }
}

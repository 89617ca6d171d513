// core/src/ngram.rs
//
// RuleModel: frequency tables for operation n-grams and rule starters,
// bigram-conditional probability computation, and smoothed starter
// ranking. The model is mutated during ingest and read-only afterwards;
// `TransitionIndex` materialises the generation lookup from the bigram
// table at generation start.

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::op::Op;
use crate::parser::ParsedRule;

/// Add-K smoothing factor for starter probabilities.
pub const K_SMOOTHING: u64 = 1;

/// Frequency and conditional probability of one bigram `(from, to)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BigramStat {
    pub freq: u64,
    /// P(to | from). Zero until `compute_probabilities` runs.
    pub p: f64,
}

/// A rule-starting operation ranked by add-K smoothed probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Starter {
    pub op: Op,
    /// Raw count of rules beginning with `op` (zero if never first).
    pub freq: u64,
    /// `(freq + K) / (starter_total + K * vocabulary)`.
    pub smoothed_p: f64,
}

/// The statistical model learned from the input rule corpus.
///
/// Four insert-or-increment tables: unigrams, bigrams, trigrams and
/// starters (ops observed as the first op of a rule). Entries are never
/// removed during a run; the tables grow through the map's own geometric
/// reallocation.
#[derive(Debug, Clone, Default)]
pub struct RuleModel {
    unigrams: AHashMap<Op, u64>,
    bigrams: AHashMap<(Op, Op), BigramStat>,
    trigrams: AHashMap<(Op, Op, Op), u64>,
    starters: AHashMap<Op, u64>,
    starter_total: u64,
    rules_observed: u64,
}

impl RuleModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one parsed rule into the tables: every op as a unigram, the
    /// first op as a starter, every adjacent pair as a bigram and every
    /// adjacent triple as a trigram.
    pub fn observe(&mut self, rule: &ParsedRule) {
        let ops = &rule.ops;
        for &op in ops {
            *self.unigrams.entry(op).or_insert(0) += 1;
        }
        if let Some(&first) = ops.first() {
            *self.starters.entry(first).or_insert(0) += 1;
            self.starter_total += 1;
        }
        for pair in ops.windows(2) {
            self.bigrams.entry((pair[0], pair[1])).or_default().freq += 1;
        }
        for triple in ops.windows(3) {
            *self
                .trigrams
                .entry((triple[0], triple[1], triple[2]))
                .or_insert(0) += 1;
        }
        self.rules_observed += 1;
    }

    /// Derive P(to | from) for every bigram from the current frequencies.
    ///
    /// Two passes: total outgoing frequency per from-op, then
    /// `freq / total`. Safe to call again after further `observe` calls;
    /// every probability is recomputed from scratch.
    pub fn compute_probabilities(&mut self) {
        let mut totals: AHashMap<Op, u64> = AHashMap::with_capacity(self.unigrams.len());
        for (&(from, _), stat) in self.bigrams.iter() {
            *totals.entry(from).or_insert(0) += stat.freq;
        }
        for (&(from, _), stat) in self.bigrams.iter_mut() {
            stat.p = stat.freq as f64 / totals[&from] as f64;
        }
    }

    /// All distinct unigrams ranked by add-1 smoothed starter probability.
    ///
    /// Vocabulary ops that never start a rule still appear, carrying the
    /// smoothing mass. Ordering: smoothed probability descending, raw
    /// starter frequency descending, then op byte order ascending. The
    /// final key makes the ranking deterministic regardless of hash state.
    ///
    /// `limit > 0` truncates to the top N; zero (or a limit at or above
    /// the vocabulary size) means all.
    pub fn sorted_starters(&self, limit: usize) -> Vec<Starter> {
        let vocab = self.unigrams.len() as u64;
        if vocab == 0 {
            return Vec::new();
        }
        let denom = (self.starter_total + K_SMOOTHING * vocab) as f64;
        let mut starters: Vec<Starter> = self
            .unigrams
            .keys()
            .map(|&op| {
                let freq = self.starter_freq(&op);
                Starter {
                    op,
                    freq,
                    smoothed_p: (freq + K_SMOOTHING) as f64 / denom,
                }
            })
            .collect();
        starters.sort_by(|a, b| {
            b.smoothed_p
                .partial_cmp(&a.smoothed_p)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.freq.cmp(&a.freq))
                .then_with(|| a.op.cmp(&b.op))
        });
        if limit > 0 && limit < starters.len() {
            starters.truncate(limit);
        }
        starters
    }

    /// Raw starter frequency for one op (zero if it never starts a rule).
    pub fn starter_freq(&self, op: &Op) -> u64 {
        self.starters.get(op).copied().unwrap_or(0)
    }

    /// Unigram frequency for one op.
    pub fn unigram_freq(&self, op: &Op) -> u64 {
        self.unigrams.get(op).copied().unwrap_or(0)
    }

    /// Frequency and probability of one bigram, if present.
    pub fn bigram(&self, from: &Op, to: &Op) -> Option<BigramStat> {
        self.bigrams.get(&(*from, *to)).copied()
    }

    /// Iterate every bigram with its statistics.
    pub fn bigrams(&self) -> impl Iterator<Item = (&(Op, Op), &BigramStat)> {
        self.bigrams.iter()
    }

    /// Number of distinct unigrams (the vocabulary size).
    pub fn unigram_count(&self) -> usize {
        self.unigrams.len()
    }

    pub fn bigram_count(&self) -> usize {
        self.bigrams.len()
    }

    pub fn trigram_count(&self) -> usize {
        self.trigrams.len()
    }

    pub fn starter_count(&self) -> usize {
        self.starters.len()
    }

    /// Sum of starter frequencies (= number of rules observed).
    pub fn starter_total(&self) -> u64 {
        self.starter_total
    }

    /// Total number of rules folded in via `observe`.
    pub fn rules_observed(&self) -> u64 {
        self.rules_observed
    }

    /// Most frequent unigrams, frequency descending, for the verbose
    /// report. Ties resolve by op byte order.
    pub fn top_unigrams(&self, n: usize) -> Vec<(Op, u64)> {
        let mut all: Vec<(Op, u64)> = self.unigrams.iter().map(|(&op, &f)| (op, f)).collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    /// Most frequent bigrams, frequency descending.
    pub fn top_bigrams(&self, n: usize) -> Vec<((Op, Op), u64)> {
        let mut all: Vec<((Op, Op), u64)> = self
            .bigrams
            .iter()
            .map(|(&key, stat)| (key, stat.freq))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    /// Most frequent trigrams, frequency descending.
    pub fn top_trigrams(&self, n: usize) -> Vec<((Op, Op, Op), u64)> {
        let mut all: Vec<((Op, Op, Op), u64)> =
            self.trigrams.iter().map(|(&key, &f)| (key, f)).collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }
}

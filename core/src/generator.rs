// core/src/generator.rs
//
// Depth-first rule generation over the transition index: enumerate every
// op sequence inside the configured length window whose running joint
// probability stays above the threshold, deduplicated across the whole
// run.

use std::io;

use ahash::AHashSet;
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::ngram::RuleModel;
use crate::op::{Op, MAX_RULE_LEN};
use crate::sink::RuleSink;
use crate::transition::TransitionIndex;
use crate::Config;

/// Generation-scoped state: the sorted starter list, the transition
/// index, the emitted-rule set and the sequence scratch buffer, borrowed
/// over the output sink. Built at generation start, dropped when `run`
/// returns; the model itself is left untouched.
pub struct Generator<'a, S: RuleSink> {
    sink: &'a mut S,
    index: TransitionIndex,
    starter_ops: Vec<Op>,
    emitted: AHashSet<Vec<u8>>,
    seq: Vec<Op>,
    min_length: usize,
    max_length: usize,
    min_probability: f64,
}

impl<'a, S: RuleSink> Generator<'a, S> {
    /// Build the generation context from a model whose probabilities have
    /// been computed: starters sorted by smoothed probability (truncated
    /// to the configured limit) and the per-from-op transition index.
    pub fn new(model: &RuleModel, cfg: &Config, sink: &'a mut S) -> Self {
        let starters = model.sorted_starters(cfg.limit);
        let index = TransitionIndex::build(model);
        debug!(
            starters = starters.len(),
            from_ops = index.len(),
            "generation context built"
        );
        Self {
            sink,
            index,
            starter_ops: starters.into_iter().map(|s| s.op).collect(),
            emitted: AHashSet::new(),
            seq: Vec::with_capacity(MAX_RULE_LEN),
            min_length: cfg.min_length,
            max_length: cfg.max_length,
            min_probability: cfg.min_probability,
        }
    }

    /// Run the full sweep: one depth-first pass per target length from
    /// min to max ascending, flushing the sink after each pass so length
    /// classes land contiguously in the output.
    ///
    /// Returns the total number of rules written.
    pub fn run(&mut self) -> Result<u64> {
        for target in self.min_length..=self.max_length {
            debug!(length = target, "generating length class");
            let before = self.sink.rules_written();
            self.seq.clear();
            self.descend(target, 1.0)
                .context("writing generated rules")?;
            self.sink.flush().context("flushing output sink")?;
            info!(
                length = target,
                emitted = self.sink.rules_written() - before,
                total = self.sink.rules_written(),
                "length class complete"
            );
        }
        Ok(self.sink.rules_written())
    }

    /// One node of the walk. `self.seq` holds the sequence so far;
    /// `joint_p` is the product of the transition probabilities along it
    /// (the starter contributes no factor).
    fn descend(&mut self, target: usize, joint_p: f64) -> io::Result<()> {
        let cur_len = self.seq.len();
        if cur_len > target || cur_len > MAX_RULE_LEN {
            return Ok(());
        }
        // Subtree prune: the sequence is already below the floor, and
        // extensions only multiply by factors <= 1.
        if self.min_probability > 0.0 && joint_p < self.min_probability {
            return Ok(());
        }
        if cur_len >= self.min_length && cur_len <= target {
            self.emit(joint_p)?;
        }
        if cur_len >= target {
            return Ok(());
        }

        if cur_len == 0 {
            // First op: enumerate the ranked starters. Starter rank orders
            // the enumeration but never multiplies into the probability.
            let starters: Vec<Op> = self.starter_ops.clone();
            for op in starters {
                self.seq.push(op);
                self.descend(target, 1.0)?;
                self.seq.pop();
            }
            return Ok(());
        }

        let last = self.seq[cur_len - 1];
        let next: Vec<(Op, f64)> = match self.index.get(&last) {
            Some(list) => list
                .admissible(joint_p, self.min_probability)
                .iter()
                .map(|t| (t.to, t.p))
                .collect(),
            None => return Ok(()),
        };
        for (to, p) in next {
            self.seq.push(to);
            self.descend(target, joint_p * p)?;
            self.seq.pop();
        }
        Ok(())
    }

    /// Emit the current sequence if it clears the probability floor and
    /// has not been produced before. The rule string is capped at
    /// `MAX_RULE_LEN - 1` bytes and only ever truncated at an op
    /// boundary; a partial op is never written.
    fn emit(&mut self, joint_p: f64) -> io::Result<()> {
        if self.seq.len() < self.min_length {
            return Ok(());
        }
        if self.min_probability > 0.0 && joint_p < self.min_probability {
            return Ok(());
        }

        let mut rule = Vec::with_capacity(self.seq.len() * 4);
        for op in &self.seq {
            if rule.len() + op.len() > MAX_RULE_LEN - 1 {
                break;
            }
            rule.extend_from_slice(op.as_bytes());
        }

        if self.emitted.contains(&rule) {
            return Ok(());
        }
        self.sink.write_rule(&rule)?;
        self.emitted.insert(rule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RuleTokenizer;

    fn generate(lines: &[&str], cfg: &Config) -> Vec<String> {
        let tokenizer = RuleTokenizer::new();
        let mut model = RuleModel::new();
        for line in lines {
            model.observe(&tokenizer.tokenize(line).unwrap());
        }
        model.compute_probabilities();
        let mut out: Vec<String> = Vec::new();
        Generator::new(&model, cfg, &mut out).run().unwrap();
        out
    }

    #[test]
    fn single_length_emits_each_starter_once() {
        let cfg = Config {
            min_length: 1,
            max_length: 1,
            ..Config::default()
        };
        let out = generate(&["l", "u", "l"], &cfg);
        assert_eq!(out, vec!["l", "u"]);
    }

    #[test]
    fn walk_follows_bigram_transitions() {
        let cfg = Config {
            min_length: 2,
            max_length: 2,
            ..Config::default()
        };
        let out = generate(&["lu", "lu", "lu"], &cfg);
        assert_eq!(out, vec!["lu"]);
    }

    #[test]
    fn threshold_prunes_unlikely_branches() {
        let cfg = Config {
            min_length: 2,
            max_length: 2,
            min_probability: 0.5,
            ..Config::default()
        };
        let mut lines = vec!["lc"];
        lines.extend(std::iter::repeat("lu").take(9));
        let out = generate(&lines, &cfg);
        assert_eq!(out, vec!["lu"]);
    }

    #[test]
    fn zero_threshold_never_prunes() {
        let cfg = Config {
            min_length: 2,
            max_length: 2,
            ..Config::default()
        };
        let mut lines = vec!["lc"];
        lines.extend(std::iter::repeat("lu").take(9));
        let out = generate(&lines, &cfg);
        assert_eq!(out, vec!["lu", "lc"]);
    }

    #[test]
    fn output_is_duplicate_free_across_lengths() {
        // Bigram cycle l <-> u revisits every shorter rule as a prefix of
        // the next length class; the output index suppresses the repeats.
        let cfg = Config {
            min_length: 1,
            max_length: 4,
            ..Config::default()
        };
        let out = generate(&["lu", "ul"], &cfg);
        let expected = ["l", "u", "lu", "ul", "lul", "ulu", "lulu", "ulul"];
        assert_eq!(out.len(), expected.len());
        for rule in expected {
            assert!(out.contains(&rule.to_string()), "missing {:?}", rule);
        }
        let unique: AHashSet<&String> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn length_classes_are_contiguous_and_ascending() {
        let cfg = Config {
            min_length: 1,
            max_length: 3,
            ..Config::default()
        };
        let tokenizer = RuleTokenizer::new();
        let lens: Vec<usize> = generate(&["lu", "ul"], &cfg)
            .iter()
            .map(|r| tokenizer.tokenize(r).unwrap().len())
            .collect();
        let mut sorted = lens.clone();
        sorted.sort_unstable();
        assert_eq!(lens, sorted);
    }

    #[test]
    fn starter_limit_restricts_first_ops() {
        // Starters: l three times, then c, d, r, t, u once each. Top two
        // are l and c (byte-order tie-break among the singletons).
        let cfg = Config {
            min_length: 1,
            max_length: 3,
            limit: 2,
            ..Config::default()
        };
        let lines = ["lu", "lu", "lu", "ud", "cd", "td", "rd"];
        let out = generate(&lines, &cfg);
        assert!(!out.is_empty());
        for rule in &out {
            assert!(
                rule.starts_with('l') || rule.starts_with('c'),
                "rule {:?} does not start with a top-2 starter",
                rule
            );
        }
        // Each starter with continuation bigrams reaches every length.
        for rule in ["l", "lu", "lud", "c", "cd"] {
            assert!(out.contains(&rule.to_string()), "missing {:?}", rule);
        }
    }

    #[test]
    fn emitted_joint_probability_meets_threshold() {
        let cfg = Config {
            min_length: 2,
            max_length: 4,
            min_probability: 0.3,
            ..Config::default()
        };
        let lines = ["lu", "lu", "lc", "ul", "uc"];
        let tokenizer = RuleTokenizer::new();
        let mut model = RuleModel::new();
        for line in &lines {
            model.observe(&tokenizer.tokenize(line).unwrap());
        }
        model.compute_probabilities();
        let mut out: Vec<String> = Vec::new();
        Generator::new(&model, &cfg, &mut out).run().unwrap();
        assert!(!out.is_empty());
        for rule in &out {
            let ops = tokenizer.tokenize(rule).unwrap().ops;
            let joint: f64 = ops
                .windows(2)
                .map(|w| model.bigram(&w[0], &w[1]).unwrap().p)
                .product();
            assert!(
                joint >= cfg.min_probability - 1e-12,
                "rule {:?} emitted below threshold: {}",
                rule,
                joint
            );
        }
    }
}

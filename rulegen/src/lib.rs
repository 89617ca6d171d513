// rulegen/src/lib.rs
//
// Ingest pipeline and reporting for the rulegen CLI: feed rule files
// through the tokenizer into a RuleModel, then hand the model to the
// core generator. Exposed as a library so integration tests can drive
// the full pipeline without a process boundary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use rulegen_core::{Config, Generator, RuleModel, RuleSink, RuleTokenizer};

/// Counters for one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines seen.
    pub lines: u64,
    /// Rules that tokenized and entered the model.
    pub rules: u64,
    /// Malformed rules counted and skipped.
    pub skipped: u64,
}

impl IngestStats {
    fn merge(&mut self, other: IngestStats) {
        self.lines += other.lines;
        self.rules += other.rules;
        self.skipped += other.skipped;
    }
}

/// Feed one reader of rule lines into the model.
///
/// Blank lines are ignored. Malformed rules are logged at debug level,
/// counted as skipped, and never abort the pass; only a read failure on
/// the underlying stream is an error.
pub fn ingest_reader<R: BufRead>(
    model: &mut RuleModel,
    tokenizer: &RuleTokenizer,
    reader: R,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();
    for line in reader.lines() {
        let line = line.context("reading rule line")?;
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;
        match tokenizer.tokenize(&line) {
            Ok(rule) => {
                model.observe(&rule);
                stats.rules += 1;
                if stats.rules % 10_000 == 0 {
                    debug!(rules = stats.rules, "ingest progress");
                }
            }
            Err(reject) => {
                stats.skipped += 1;
                debug!(rule = line.as_str(), reason = %reject, "rule skipped");
            }
        }
    }
    Ok(stats)
}

/// Ingest every file in order into a shared model, accumulating counts
/// across files. A file that cannot be opened is reported and skipped;
/// the run continues with the remaining files.
pub fn ingest_files<P: AsRef<Path>>(
    model: &mut RuleModel,
    tokenizer: &RuleTokenizer,
    files: &[P],
) -> Result<IngestStats> {
    let mut total = IngestStats::default();
    for (idx, path) in files.iter().enumerate() {
        let path = path.as_ref();
        info!(
            file = %path.display(),
            n = idx + 1,
            of = files.len(),
            "processing rule file"
        );
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                warn!(file = %path.display(), %err, "error opening file, skipping");
                continue;
            }
        };
        let stats = ingest_reader(model, tokenizer, BufReader::new(file))
            .with_context(|| format!("reading {}", path.display()))?;
        info!(
            file = %path.display(),
            rules = stats.rules,
            skipped = stats.skipped,
            unigrams = model.unigram_count(),
            bigrams = model.bigram_count(),
            trigrams = model.trigram_count(),
            "file complete"
        );
        total.merge(stats);
    }
    Ok(total)
}

/// Log the final table statistics and the most frequent n-grams, the way
/// verbose mode reports them. All output goes through tracing, so the
/// call is free when the level is filtered out.
pub fn report_model_stats(model: &RuleModel) {
    info!(
        unigrams = model.unigram_count(),
        bigrams = model.bigram_count(),
        trigrams = model.trigram_count(),
        starters = model.starter_count(),
        rules = model.rules_observed(),
        "final statistics"
    );
    for (op, freq) in model.top_unigrams(20) {
        info!(op = %op, freq, "top unigram");
    }
    for ((from, to), freq) in model.top_bigrams(15) {
        info!(from = %from, to = %to, freq, "top bigram");
    }
    for ((a, b, c), freq) in model.top_trigrams(10) {
        info!(first = %a, second = %b, third = %c, freq, "top trigram");
    }
}

/// Full pipeline: ingest the rule files, finalise probabilities, generate
/// into the sink. Fails when no valid rules were found; the CLI maps that
/// to exit code 1.
pub fn run<P: AsRef<Path>, S: RuleSink>(files: &[P], cfg: &Config, sink: &mut S) -> Result<u64> {
    info!(
        min_length = cfg.min_length,
        max_length = cfg.max_length,
        limit = cfg.limit,
        min_probability = cfg.min_probability,
        "configuration"
    );

    let tokenizer = RuleTokenizer::new();
    let mut model = RuleModel::new();
    let stats = ingest_files(&mut model, &tokenizer, files)?;

    if model.unigram_count() == 0 {
        bail!("no valid rules found");
    }
    info!(
        rules = stats.rules,
        skipped = stats.skipped,
        "analysis complete"
    );

    model.compute_probabilities();
    report_model_stats(&model);

    let total = Generator::new(&model, cfg, sink).run()?;
    info!(total, "generation complete");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ingest_counts_rules_and_skips() {
        let tokenizer = RuleTokenizer::new();
        let mut model = RuleModel::new();
        let input = "q\nT\nTa\n\nnot a rule\n";
        let stats = ingest_reader(&mut model, &tokenizer, Cursor::new(input)).unwrap();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.rules, 2);
        assert_eq!(stats.skipped, 2);
        assert_eq!(model.rules_observed(), 2);
    }

    #[test]
    fn ingest_handles_crlf_line_endings() {
        let tokenizer = RuleTokenizer::new();
        let mut model = RuleModel::new();
        let stats =
            ingest_reader(&mut model, &tokenizer, Cursor::new("lu\r\nuc\r\n")).unwrap();
        assert_eq!(stats.rules, 2);
        assert_eq!(model.unigram_count(), 3);
    }
}

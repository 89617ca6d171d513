//! rulegen-core
//!
//! Statistical model and generation engine for password-mangling rules:
//! tokenize rule lines into fixed-arity operations, learn an n-gram model
//! over the operation stream, then enumerate new rules by a markov walk
//! over bigram transitions with probability pruning and duplicate
//! suppression.
//!
//! Public API:
//! - `ArityTable` / `Op` - operation tokens and the arity mapping
//! - `RuleTokenizer` / `ParsedRule` / `Reject` - rule line tokenization
//! - `RuleModel` / `Starter` - n-gram tables and probabilities
//! - `TransitionIndex` - probability-sorted successor lookup
//! - `Generator` - bounded-depth walk with duplicate suppression
//! - `RuleSink` / `BufferedSink` - bulk-buffered output
//! - `Config` - generation settings and their TOML form

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub mod op;
pub use op::{ArityTable, Op, MAX_RULE_LEN};

pub mod parser;
pub use parser::{ParsedRule, Reject, RuleTokenizer};

pub mod ngram;
pub use ngram::{BigramStat, RuleModel, Starter, K_SMOOTHING};

pub mod transition;
pub use transition::{Transition, TransitionIndex, TransitionList};

pub mod generator;
pub use generator::Generator;

pub mod sink;
pub use sink::{BufferedSink, RuleSink, DEFAULT_BUFFER_SIZE};

/// Generation settings.
///
/// Lengths count operations, not bytes. Defaults match the command-line
/// defaults; `validate` enforces the same ranges the CLI advertises.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Minimum generated rule length in operations (1..=10).
    pub min_length: usize,
    /// Maximum generated rule length in operations (1..=16).
    pub max_length: usize,
    /// Keep only the top N starters by smoothed probability.
    /// Zero means no limit (0..=65535).
    pub limit: usize,
    /// Minimum joint probability for an emitted rule (0.0..=1.0).
    /// Zero disables pruning entirely.
    pub min_probability: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 6,
            limit: 0,
            min_probability: 0.0,
        }
    }
}

impl Config {
    /// Check every field against its advertised range.
    pub fn validate(&self) -> Result<()> {
        if self.min_length < 1 || self.min_length > 10 {
            bail!("min length must be between 1 and 10");
        }
        if self.max_length < 1 || self.max_length > 16 {
            bail!("max length must be between 1 and 16");
        }
        if self.limit > 65535 {
            bail!("limit cannot be greater than 65535");
        }
        if !(0.0..=1.0).contains(&self.min_probability) {
            bail!("probability must be between 0.0 and 1.0");
        }
        if self.min_length > self.max_length {
            bail!(
                "min length ({}) cannot be greater than max length ({})",
                self.min_length,
                self.max_length
            );
        }
        Ok(())
    }

    /// Load settings from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load settings from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize settings to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

//! Lexicon-based polarity scoring.
//!
//! [`score`] is a pure function: the same text always yields the same
//! [`SentimentResult`], and no input can make it fail.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

pub use feddit_api_types::Classification;

/// Multiplier applied to a lexicon word preceded by a negator.
const NEGATION_FACTOR: f64 = -0.5;
/// How many tokens before a lexicon word are searched for a negator.
const NEGATION_WINDOW: usize = 2;
const POLARITY_SCALE: f64 = 10_000.0;

static LEXICON: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        // positive
        ("amazing", 0.6),
        ("awesome", 1.0),
        ("beautiful", 0.85),
        ("best", 1.0),
        ("better", 0.5),
        ("brilliant", 0.9),
        ("clean", 0.37),
        ("clear", 0.1),
        ("cool", 0.35),
        ("delightful", 1.0),
        ("easy", 0.43),
        ("enjoy", 0.4),
        ("enjoyed", 0.4),
        ("excellent", 1.0),
        ("fantastic", 0.4),
        ("fast", 0.2),
        ("fine", 0.42),
        ("fun", 0.3),
        ("glad", 0.5),
        ("good", 0.7),
        ("great", 0.8),
        ("happy", 0.8),
        ("helpful", 0.5),
        ("impressive", 1.0),
        ("incredible", 0.9),
        ("interesting", 0.5),
        ("like", 0.2),
        ("love", 0.5),
        ("loved", 0.7),
        ("lovely", 0.5),
        ("nice", 0.6),
        ("perfect", 1.0),
        ("pleasant", 0.73),
        ("recommend", 0.4),
        ("right", 0.29),
        ("smart", 0.21),
        ("solid", 0.3),
        ("superb", 1.0),
        ("thank", 0.2),
        ("thanks", 0.2),
        ("useful", 0.3),
        ("welcome", 0.8),
        ("wonderful", 1.0),
        ("wow", 0.1),
        // negative
        ("angry", -0.5),
        ("annoying", -0.8),
        ("awful", -1.0),
        ("bad", -0.7),
        ("boring", -1.0),
        ("broken", -0.4),
        ("confusing", -0.3),
        ("crap", -0.8),
        ("disappointed", -0.75),
        ("disappointing", -0.6),
        ("disgusting", -1.0),
        ("dull", -0.31),
        ("fail", -0.5),
        ("failed", -0.5),
        ("hate", -0.8),
        ("hated", -0.9),
        ("horrible", -1.0),
        ("poor", -0.4),
        ("pointless", -0.5),
        ("sad", -0.5),
        ("slow", -0.3),
        ("stupid", -0.8),
        ("terrible", -1.0),
        ("ugly", -0.7),
        ("unfortunately", -0.5),
        ("useless", -0.5),
        ("waste", -0.2),
        ("weak", -0.38),
        ("worse", -0.4),
        ("worst", -1.0),
        ("wrong", -0.5),
    ]
    .into_iter()
    .collect()
});

static INTENSIFIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    [
        ("absolutely", 1.5),
        ("extremely", 1.5),
        ("incredibly", 1.5),
        ("quite", 1.1),
        ("really", 1.3),
        ("slightly", 0.5),
        ("so", 1.2),
        ("somewhat", 0.7),
        ("super", 1.4),
        ("too", 1.1),
        ("totally", 1.4),
        ("very", 1.3),
    ]
    .into_iter()
    .collect()
});

static NEGATORS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["cannot", "hardly", "neither", "never", "no", "nor", "not", "nothing"]
        .into_iter()
        .collect()
});

/// Polarity and classification computed for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentResult {
    pub polarity: f64,
    pub classification: Classification,
}

impl SentimentResult {
    pub fn neutral() -> Self {
        Self {
            polarity: 0.0,
            classification: Classification::Neutral,
        }
    }

    fn from_polarity(polarity: f64) -> Self {
        let rounded = (polarity.clamp(-1.0, 1.0) * POLARITY_SCALE).round() / POLARITY_SCALE;
        // Rounding can leave -0.0 behind; normalize so it serializes as 0.0.
        let polarity = if rounded == 0.0 { 0.0 } else { rounded };
        Self {
            polarity,
            classification: Classification::from_polarity(polarity),
        }
    }
}

/// Score `text` in `[-1.0, 1.0]`.
///
/// Each lexicon word contributes its polarity, scaled by an intensifier
/// directly before it and flipped by a negator within the two preceding
/// tokens. The score is the mean of all contributions; text without lexicon
/// words is neutral.
pub fn score(text: &str) -> SentimentResult {
    let tokens = tokenize(text);
    let mut total = 0.0;
    let mut hits = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        let Some(&base) = LEXICON.get(token.as_str()) else {
            continue;
        };

        let mut value = base;
        if let Some(previous) = index.checked_sub(1).map(|i| tokens[i].as_str()) {
            if let Some(&factor) = INTENSIFIERS.get(previous) {
                value *= factor;
            }
        }

        let window_start = index.saturating_sub(NEGATION_WINDOW);
        if tokens[window_start..index]
            .iter()
            .any(|token| is_negator(token))
        {
            value *= NEGATION_FACTOR;
        }

        total += value.clamp(-1.0, 1.0);
        hits += 1;
    }

    if hits == 0 {
        return SentimentResult::neutral();
    }

    SentimentResult::from_polarity(total / hits as f64)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphabetic() || c == '\''))
        .map(|raw| raw.trim_matches('\'').to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn is_negator(token: &str) -> bool {
    NEGATORS.contains(token) || token.ends_with("n't")
}

//! Name similarity for artist and track titles.
//!
//! Names are normalized first so that punctuation, case, spacing and
//! article variants collapse to the same token sequence ("AC/DC" and
//! "AC-DC" both become `ac dc`). The score then blends an order-preserving
//! edit distance with a fuzzy token overlap, so reordered words alone never
//! reach a high score.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

static RE_AMPERSAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[&＆]").unwrap());
static RE_APOSTROPHE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"['’‘`´]").unwrap());
static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]|\p{Pc}").unwrap());

/// Words after which a "Last, First" name is left alone.
const COMMA_JOINERS: [&str; 5] = ["the", "and", "&", "feat", "with"];

const FEATURING: [&str; 3] = ["feat", "ft", "featuring"];

/// Normalizes a name into lowercase, space-separated word tokens.
///
/// Normalizing an already normalized name returns it unchanged.
pub fn normalize_name(name: &str) -> String {
    let name = reorder_last_first(name.trim());

    let folded: String = name
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let folded = RE_AMPERSAND.replace_all(&folded, " and ");
    let folded = RE_APOSTROPHE.replace_all(&folded, "");
    let folded = RE_NON_WORD.replace_all(&folded, " ");

    let mut tokens: Vec<&str> = folded.split_whitespace().collect();

    if let Some(pos) = tokens
        .iter()
        .skip(1)
        .position(|t| FEATURING.contains(t))
    {
        tokens.truncate(pos + 1);
    }

    // "The The" stays as is; otherwise the article carries no identity.
    if tokens.iter().any(|t| *t != "the") {
        tokens.retain(|t| *t != "the");
    }

    tokens.join(" ")
}

/// "Cave, Nick" -> "Nick Cave". Leaves "Crosby, Stills and Nash" alone.
fn reorder_last_first(name: &str) -> String {
    if name.matches(',').count() != 1 {
        return name.to_string();
    }
    let Some((last, first)) = name.split_once(", ") else {
        return name.to_string();
    };
    let first_lower = first.to_lowercase();
    if first_lower
        .split_whitespace()
        .any(|w| COMMA_JOINERS.contains(&w))
    {
        return name.to_string();
    }
    format!("{} {}", first.trim(), last.trim())
}

/// True when `name` reads as "Last, First".
pub fn is_last_first(name: &str) -> bool {
    let trimmed = name.trim();
    reorder_last_first(trimmed) != trimmed
}

/// Similarity of two names in `[0.0, 1.0]`.
///
/// Symmetric and deterministic. A name always scores 1.0 against itself.
pub fn score(a: &str, b: &str) -> f64 {
    score_normalized(&normalize_name(a), &normalize_name(b))
}

/// Same as [`score`] for names that already went through [`normalize_name`].
pub fn score_normalized(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let sequence = strsim::normalized_levenshtein(a, b);
    let tokens = token_overlap(a, b);
    // Catches split or joined words: "ac dc" vs "acdc".
    let compact = strsim::normalized_levenshtein(&compact(a), &compact(b));

    ((sequence + tokens) / 2.0).max(compact).clamp(0.0, 1.0)
}

fn compact(s: &str) -> String {
    s.split_whitespace().collect()
}

/// Average best-match similarity of each word against the other name's words.
fn token_overlap(a: &str, b: &str) -> f64 {
    let a_tokens: Vec<&str> = a.split_whitespace().collect();
    let b_tokens: Vec<&str> = b.split_whitespace().collect();
    (directional_overlap(&a_tokens, &b_tokens) + directional_overlap(&b_tokens, &a_tokens)) / 2.0
}

fn directional_overlap(from: &[&str], to: &[&str]) -> f64 {
    if from.is_empty() || to.is_empty() {
        return 0.0;
    }
    let total: f64 = from
        .iter()
        .map(|word| {
            to.iter()
                .map(|other| strsim::normalized_levenshtein(word, other))
                .fold(0.0, f64::max)
        })
        .sum();
    total / from.len() as f64
}

/// Human readable reason two names were matched.
pub fn explain(a: &str, b: &str) -> String {
    let norm_a = normalize_name(a);
    let norm_b = normalize_name(b);

    let mut reasons = Vec::new();

    if norm_a == norm_b {
        reasons.push("names normalize to the same string".to_string());
        let a_swapped = is_last_first(a);
        let b_swapped = is_last_first(b);
        if a_swapped && !b_swapped {
            reasons.push(format!("'{a}' appears to be in 'Last, First' format"));
        } else if b_swapped && !a_swapped {
            reasons.push(format!("'{b}' appears to be in 'Last, First' format"));
        }
    } else {
        let sequence = strsim::normalized_levenshtein(&norm_a, &norm_b);
        let tokens = token_overlap(&norm_a, &norm_b);
        if tokens > sequence {
            reasons.push(format!(
                "words match when reordered (score: {:.0}%)",
                tokens * 100.0
            ));
        } else {
            reasons.push(format!(
                "names are similar (score: {:.0}%)",
                score_normalized(&norm_a, &norm_b) * 100.0
            ));
        }
    }

    reasons.join("; ")
}

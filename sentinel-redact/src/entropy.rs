// sentinel-redact/src/entropy.rs
// ============================================================================
// Module: Shannon Entropy
// Description: Per-character entropy over contiguous URL-safe runs, used by
// the secret-detection layer to flag high-entropy tokens that don't match a
// known key shape (§4.5 layer 100).
// Purpose: Catch opaque secrets (API keys, tokens) that have no recognizable
// prefix.
// Dependencies: none
// ============================================================================

use std::collections::HashMap;

/// Minimum run length considered for entropy scoring (§4.5 layer 100: "≥ 20
/// chars").
pub const MIN_RUN_LENGTH: usize = 20;

/// Entropy threshold above which a run is flagged as a likely secret (§4.5
/// layer 100: "Shannon-entropy > 4.5").
pub const ENTROPY_THRESHOLD: f64 = 4.5;

/// Computes the Shannon entropy, in bits per character, of `text`.
#[must_use]
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for ch in text.chars() {
        *counts.entry(ch).or_insert(0) += 1;
        total += 1;
    }
    let total = f64::from(total);
    counts
        .values()
        .map(|&count| {
            let probability = f64::from(count) / total;
            -probability * probability.log2()
        })
        .sum()
}

/// True if `ch` is part of a URL-safe base64/token alphabet.
#[must_use]
pub const fn is_url_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '+' || ch == '/' || ch == '='
}

/// Finds every maximal contiguous run of URL-safe characters at least
/// [`MIN_RUN_LENGTH`] long whose Shannon entropy exceeds
/// [`ENTROPY_THRESHOLD`], returning `(start, end)` byte offsets.
#[must_use]
pub fn high_entropy_runs(text: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;
    let char_indices: Vec<(usize, char)> = text.char_indices().collect();

    for (position, (byte_offset, ch)) in char_indices.iter().enumerate() {
        if is_url_safe(*ch) {
            if run_start.is_none() {
                run_start = Some(*byte_offset);
            }
            let is_last = position + 1 == char_indices.len();
            if is_last {
                close_run(text, run_start, text.len(), &mut runs);
            }
        } else if let Some(start) = run_start.take() {
            close_run(text, Some(start), *byte_offset, &mut runs);
        }
    }
    runs
}

/// Closes a run of URL-safe characters spanning `[start, end)` in `text`,
/// pushing it to `runs` if it is long enough and entropic enough.
fn close_run(text: &str, start: Option<usize>, end: usize, runs: &mut Vec<(usize, usize)>) {
    let Some(start) = start else { return };
    if end <= start {
        return;
    }
    let run = &text[start..end];
    if run.chars().count() >= MIN_RUN_LENGTH && shannon_entropy(run) > ENTROPY_THRESHOLD {
        runs.push((start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_character_has_zero_entropy() {
        assert!((shannon_entropy("aaaaaaaa") - 0.0).abs() < 1e-9);
    }

    #[test]
    fn random_looking_token_is_flagged() {
        let runs = high_entropy_runs("token=Zm9vYmFyYmF6cXV1eHl6emFiY2RlZmdoaWprbG1ub3Bxcg==");
        assert!(!runs.is_empty(), "a long base64-ish run should be flagged");
    }

    #[test]
    fn short_run_is_never_flagged() {
        let runs = high_entropy_runs("abc123");
        assert!(runs.is_empty(), "runs shorter than the minimum length are never flagged");
    }
}

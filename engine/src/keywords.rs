use std::cmp::Ordering;
use std::collections::HashMap;

use crate::corpus::CorpusStats;

/// Top-k TF-IDF keywords for one article's token list.
///
/// Mono-words are dropped before term frequency is computed, so a word unique
/// to a single article never reaches its keyword set, however often it
/// repeats there. The sort is stable with ties keeping first-occurrence
/// order, which keeps rebuilds reproducible.
///
/// Works identically during index builds and for ad-hoc raw text at query
/// time; words without a document frequency entry are skipped.
pub fn extract(tokens: &[String], stats: &CorpusStats, top_k: usize) -> Vec<(String, f64)> {
    let kept: Vec<&String> = tokens
        .iter()
        .filter(|token| !stats.mono_words.contains(token.as_str()))
        .collect();
    if kept.is_empty() {
        return Vec::new();
    }
    let total = kept.len() as f64;

    // counts in first-seen order
    let mut order: Vec<(&String, u32)> = Vec::new();
    let mut seen: HashMap<&String, usize> = HashMap::new();
    for token in kept {
        match seen.get(token) {
            Some(&slot) => order[slot].1 += 1,
            None => {
                seen.insert(token, order.len());
                order.push((token, 1));
            }
        }
    }

    let mut weighted: Vec<(String, f64)> = order
        .into_iter()
        .filter_map(|(word, count)| {
            let idf = stats.idf(word)?;
            Some((word.clone(), count as f64 / total * idf))
        })
        .collect();
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    weighted.truncate(top_k);
    weighted
}

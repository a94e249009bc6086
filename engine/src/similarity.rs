use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::ArticleId;

/// Vocabulary-aligned keyword sets for every indexed article.
///
/// The vocabulary order is the vector-index contract: each article stores a
/// sorted list of indices into `vocabulary`. Sparse index sets stand in for
/// 0/1 membership vectors; the Tanimoto coefficient over a sorted merge is
/// identical to the dense dot-product form without allocating a
/// vocabulary-length array per article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityIndex {
    pub vocabulary: Vec<String>,
    pub sets: HashMap<ArticleId, Vec<u32>>,
    #[serde(skip)]
    word_index: HashMap<String, u32>,
}

impl SimilarityIndex {
    /// Build from each article's selected keywords. The vocabulary is the
    /// deduplicated union of all keyword sets, in first-seen order of the
    /// input slice; build is deterministic for a fixed input order.
    pub fn build(keyword_sets: &[(ArticleId, Vec<String>)]) -> Self {
        let mut vocabulary: Vec<String> = Vec::new();
        let mut word_index: HashMap<String, u32> = HashMap::new();
        let mut sets: HashMap<ArticleId, Vec<u32>> = HashMap::with_capacity(keyword_sets.len());
        for (id, words) in keyword_sets {
            let mut set: Vec<u32> = words
                .iter()
                .map(|word| {
                    *word_index.entry(word.clone()).or_insert_with(|| {
                        vocabulary.push(word.clone());
                        (vocabulary.len() - 1) as u32
                    })
                })
                .collect();
            set.sort_unstable();
            set.dedup();
            sets.insert(id.clone(), set);
        }
        Self { vocabulary, sets, word_index }
    }

    /// Project ad-hoc keywords onto the existing vocabulary. Words outside
    /// the vocabulary are absent from the result; the vocabulary is never
    /// extended at query time.
    pub fn project(&self, words: &[String]) -> Vec<u32> {
        let mut set: Vec<u32> = words
            .iter()
            .filter_map(|word| self.word_index.get(word).copied())
            .collect();
        set.sort_unstable();
        set.dedup();
        set
    }

    /// Rank every stored article against the query set.
    ///
    /// Candidates scoring exactly 0 (no shared keywords) or exactly 1
    /// (identical keyword set, a duplicate or re-post) are dropped. Ordering
    /// is score descending, then article id ascending.
    pub fn match_set(&self, query: &[u32], top_k: usize) -> Vec<(ArticleId, f64)> {
        let mut hits: Vec<(ArticleId, f64)> = Vec::new();
        for (id, set) in &self.sets {
            let score = tanimoto(query, set);
            if score == 0.0 || score == 1.0 {
                continue;
            }
            hits.push((id.clone(), score));
        }
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(top_k);
        hits
    }

    /// Rank against an indexed article. The article's own entry stays in the
    /// candidate pool and falls out through the score-1 exclusion, exactly
    /// like a genuine duplicate would.
    pub fn match_id(&self, id: &str, top_k: usize) -> Result<Vec<(ArticleId, f64)>, EngineError> {
        let query = self
            .sets
            .get(id)
            .ok_or_else(|| EngineError::UnknownArticle(id.to_string()))?;
        Ok(self.match_set(query, top_k))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Check that every stored set is sorted, deduplicated, and references
    /// only valid vocabulary indices.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let vocab_len = self.vocabulary.len() as u32;
        for (id, set) in &self.sets {
            if set.windows(2).any(|w| w[0] >= w[1]) {
                return Err(format!("keyword set for {id} is not strictly sorted"));
            }
            if let Some(&last) = set.last() {
                if last >= vocab_len {
                    return Err(format!(
                        "keyword set for {id} references index {last} outside vocabulary of length {vocab_len}"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Rebuild the word lookup after deserialization.
    pub(crate) fn restore_lookup(&mut self) {
        self.word_index = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(slot, word)| (word.clone(), slot as u32))
            .collect();
    }
}

/// `|A∩B| / |A∪B|` over two sorted index sets. Two empty sets score 0, which
/// the exclusion rule then drops.
fn tanimoto(a: &[u32], b: &[u32]) -> f64 {
    let mut i = 0;
    let mut j = 0;
    let mut shared = 0usize;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ArticleId;

/// Corpus-wide document frequencies, rebuilt wholesale from a full pass over
/// every article's token list. Never mutated in place: a rebuild produces a
/// fresh value that replaces the old one as part of the snapshot swap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    pub doc_count: u32,
    /// word -> number of articles containing it at least once.
    pub doc_freq: HashMap<String, u32>,
    /// Words present in exactly one article. They carry no discriminative
    /// value and are excluded from keyword extraction.
    pub mono_words: HashSet<String>,
}

impl CorpusStats {
    /// Single rebuild pass over the whole corpus. Document frequency counts
    /// distinct words per article, so repetition within one article does not
    /// inflate it.
    pub fn rebuild(docs: &[(ArticleId, Vec<String>)]) -> Self {
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for (_, tokens) in docs {
            let distinct: HashSet<&String> = tokens.iter().collect();
            for word in distinct {
                *doc_freq.entry(word.clone()).or_insert(0) += 1;
            }
        }
        let mono_words = doc_freq
            .iter()
            .filter(|(_, &freq)| freq == 1)
            .map(|(word, _)| word.clone())
            .collect();
        Self { doc_count: docs.len() as u32, doc_freq, mono_words }
    }

    /// `ln(doc_count / doc_freq)`. `None` for words never seen in the
    /// corpus, which must not appear in extracted keywords.
    pub fn idf(&self, word: &str) -> Option<f64> {
        let df = *self.doc_freq.get(word)?;
        Some((self.doc_count as f64 / df as f64).ln())
    }
}

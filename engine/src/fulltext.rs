use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::tokenizer::Tokenizer;
use crate::ArticleId;

pub type TermId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Content,
}

/// How whitespace-separated query fragments are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Any fragment may match (the default).
    #[default]
    Or,
    /// Every fragment must match in at least one of the searched fields.
    And,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    slot: u32,
    tf: u32,
}

/// Inverted index over article titles and contents.
///
/// Postings keep raw term frequencies; scores are computed at query time
/// from the current document count, so incremental additions need no
/// reweighting pass. Discarded articles are masked at search time, never
/// removed from the postings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullTextIndex {
    ids: Vec<ArticleId>,
    dictionary: HashMap<String, TermId>,
    title: HashMap<TermId, Vec<Posting>>,
    content: HashMap<TermId, Vec<Posting>>,
    #[serde(skip)]
    slots: HashMap<ArticleId, u32>,
}

impl FullTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh index over the given articles.
    pub fn create<I>(articles: I, tokenizer: &Tokenizer) -> Self
    where
        I: IntoIterator<Item = (ArticleId, String, String)>,
    {
        let mut index = Self::new();
        index.update(articles, tokenizer);
        index
    }

    /// Add articles that are not yet indexed; ids already present are
    /// skipped, so feeding the full corpus after an ingest run only indexes
    /// the new arrivals.
    pub fn update<I>(&mut self, articles: I, tokenizer: &Tokenizer)
    where
        I: IntoIterator<Item = (ArticleId, String, String)>,
    {
        for (id, title, content) in articles {
            if self.slots.contains_key(&id) {
                continue;
            }
            let slot = self.ids.len() as u32;
            self.ids.push(id.clone());
            self.slots.insert(id, slot);
            self.index_field(slot, &title, Field::Title, tokenizer);
            self.index_field(slot, &content, Field::Content, tokenizer);
        }
    }

    fn index_field(&mut self, slot: u32, text: &str, field: Field, tokenizer: &Tokenizer) {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokenizer.tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        let postings = match field {
            Field::Title => &mut self.title,
            Field::Content => &mut self.content,
        };
        for (term, tf) in counts {
            let next = self.dictionary.len() as TermId;
            let term_id = *self.dictionary.entry(term).or_insert(next);
            postings.entry(term_id).or_default().push(Posting { slot, tf });
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn doc_count(&self) -> usize {
        self.ids.len()
    }

    /// Ranked free-text search over the selected fields.
    ///
    /// The query is split on whitespace and tokenized; fragments combine per
    /// `mode`. `excluded` is applied while candidates are collected, before
    /// the limit cut, so a page never comes back short because of masking.
    /// Results are ordered score descending, ties by article id ascending.
    pub fn search(
        &self,
        query: &str,
        fields: &[Field],
        mode: SearchMode,
        limit: usize,
        excluded: &HashSet<ArticleId>,
        tokenizer: &Tokenizer,
    ) -> Vec<(ArticleId, f32)> {
        // repeated fragments collapse to one occurrence
        let mut terms: Vec<String> = Vec::new();
        for term in tokenizer.tokenize(query) {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        if terms.is_empty() || self.ids.is_empty() {
            return Vec::new();
        }

        let n = self.ids.len() as f32;
        let mut scores: HashMap<u32, f32> = HashMap::new();
        let mut matched: HashMap<u32, u32> = HashMap::new();
        for term in &terms {
            let Some(term_id) = self.dictionary.get(term) else { continue };
            let mut fragment_docs: HashSet<u32> = HashSet::new();
            for field in fields {
                let postings = match field {
                    Field::Title => &self.title,
                    Field::Content => &self.content,
                };
                let Some(list) = postings.get(term_id) else { continue };
                let idf = (n / list.len() as f32).ln();
                for posting in list {
                    let weight = (1.0 + (posting.tf as f32).ln()) * idf;
                    *scores.entry(posting.slot).or_insert(0.0) += weight;
                    fragment_docs.insert(posting.slot);
                }
            }
            for slot in fragment_docs {
                *matched.entry(slot).or_insert(0) += 1;
            }
        }

        let required = terms.len() as u32;
        let mut hits: Vec<(ArticleId, f32)> = scores
            .into_iter()
            .filter(|(slot, _)| {
                mode == SearchMode::Or || matched.get(slot).copied().unwrap_or(0) == required
            })
            .map(|(slot, score)| (self.ids[slot as usize].clone(), score))
            .filter(|(id, _)| !excluded.contains(id))
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(limit);
        hits
    }

    /// Rebuild the id lookup after deserialization.
    pub(crate) fn restore_lookup(&mut self) {
        self.slots = self
            .ids
            .iter()
            .enumerate()
            .map(|(slot, id)| (id.clone(), slot as u32))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, title: &str, content: &str) -> (ArticleId, String, String) {
        (id.to_string(), title.to_string(), content.to_string())
    }

    fn sample_index(tokenizer: &Tokenizer) -> FullTextIndex {
        FullTextIndex::create(
            vec![
                article("a1", "Campus orchestra concert", "orchestra rehearsal hall concert season"),
                article("a2", "Library renovation", "library reading room renovation concert fundraiser"),
                article("a3", "Marathon report", "marathon runners finish line"),
            ],
            tokenizer,
        )
    }

    #[test]
    fn or_query_matches_any_fragment() {
        let tok = Tokenizer::new();
        let index = sample_index(&tok);
        let hits = index.search(
            "orchestra marathon",
            &[Field::Title, Field::Content],
            SearchMode::Or,
            10,
            &HashSet::new(),
            &tok,
        );
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert!(ids.contains(&"a1"));
        assert!(ids.contains(&"a3"));
    }

    #[test]
    fn and_query_requires_every_fragment() {
        let tok = Tokenizer::new();
        let index = sample_index(&tok);
        let hits = index.search(
            "renovation concert",
            &[Field::Title, Field::Content],
            SearchMode::And,
            10,
            &HashSet::new(),
            &tok,
        );
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a2"]);
    }

    #[test]
    fn excluded_ids_never_surface_and_page_stays_full() {
        let tok = Tokenizer::new();
        let index = sample_index(&tok);
        let excluded: HashSet<ArticleId> = ["a1".to_string()].into_iter().collect();
        let hits = index.search(
            "concert",
            &[Field::Title, Field::Content],
            SearchMode::Or,
            1,
            &excluded,
            &tok,
        );
        // a1 is the stronger concert match; with it masked the single-entry
        // page is still filled by a2
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "a2");
    }

    #[test]
    fn update_skips_already_indexed_ids() {
        let tok = Tokenizer::new();
        let mut index = sample_index(&tok);
        let before = index.doc_count();
        index.update(
            vec![
                article("a1", "Campus orchestra concert", "duplicate feed entry"),
                article("a4", "New column", "fresh campus column"),
            ],
            &tok,
        );
        assert_eq!(index.doc_count(), before + 1);
        assert!(index.contains("a4"));
    }

    #[test]
    fn empty_query_or_corpus_returns_empty() {
        let tok = Tokenizer::new();
        let index = sample_index(&tok);
        assert!(index
            .search("", &[Field::Title], SearchMode::Or, 10, &HashSet::new(), &tok)
            .is_empty());
        let empty = FullTextIndex::new();
        assert!(empty
            .search("concert", &[Field::Title], SearchMode::Or, 10, &HashSet::new(), &tok)
            .is_empty());
    }

    #[test]
    fn search_is_deterministic() {
        let tok = Tokenizer::new();
        let index = sample_index(&tok);
        let args = ("concert", [Field::Title, Field::Content]);
        let first = index.search(args.0, &args.1, SearchMode::Or, 10, &HashSet::new(), &tok);
        let second = index.search(args.0, &args.1, SearchMode::Or, 10, &HashSet::new(), &tok);
        assert_eq!(first, second);
    }
}

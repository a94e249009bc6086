use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::corpus::CorpusStats;
use crate::error::EngineError;
use crate::fulltext::{Field, SearchMode};
use crate::keywords;
use crate::similarity::SimilarityIndex;
use crate::snapshot::Snapshot;
use crate::store::ArticleStore;
use crate::tokenizer::Tokenizer;
use crate::ArticleId;

/// Cooperative cancellation handle for a scheduled rebuild. Cancelled work
/// is discarded between pipeline stages; nothing is committed.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Keyword budget per article for the similarity vectors.
    pub top_keywords: usize,
    /// File the rebuild output is persisted to.
    pub snapshot_path: PathBuf,
    /// Optional replacement for the built-in stop-word list.
    pub stopwords_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(snapshot_path: P) -> Self {
        Self { top_keywords: 100, snapshot_path: snapshot_path.into(), stopwords_path: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub articles: usize,
    pub vocabulary: usize,
    pub discarded: usize,
}

/// Owns the serving snapshot and the discard mask.
///
/// Readers clone the inner `Arc` and score against an immutable value; the
/// lock is held only for the pointer swap, never across a rebuild or a
/// scoring pass, so `recommend` and `search` run fully concurrently.
pub struct RecommendEngine {
    config: EngineConfig,
    tokenizer: Tokenizer,
    snapshot: RwLock<Arc<Snapshot>>,
    discarded: RwLock<Arc<HashSet<ArticleId>>>,
}

impl RecommendEngine {
    /// Engine with an empty snapshot; the first `update` populates it.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let tokenizer = match &config.stopwords_path {
            Some(path) => Tokenizer::with_stopwords_file(path)?,
            None => Tokenizer::new(),
        };
        Ok(Self {
            config,
            tokenizer,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            discarded: RwLock::new(Arc::new(HashSet::new())),
        })
    }

    /// Engine serving the snapshot persisted at `config.snapshot_path`.
    /// Fails rather than serve a missing, corrupt, or mismatched snapshot.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let engine = Self::new(config)?;
        let snapshot = Snapshot::load(&engine.config.snapshot_path)?;
        *engine.snapshot.write() = Arc::new(snapshot);
        Ok(engine)
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn article_count(&self) -> usize {
        self.snapshot().fulltext.doc_count()
    }

    /// Re-read the discard mask from the store, e.g. after an article was
    /// discarded or restored. No reindexing happens.
    pub fn refresh_mask<S: ArticleStore>(&self, store: &S) -> Result<usize, EngineError> {
        let discarded = store.fetch_discarded()?;
        let count = discarded.len();
        *self.discarded.write() = Arc::new(discarded);
        Ok(count)
    }

    /// Full offline rebuild from the article store.
    pub fn update<S: ArticleStore>(&self, store: &S) -> Result<UpdateReport, EngineError> {
        self.update_cancellable(store, &CancelToken::new())
    }

    /// Full offline rebuild with cooperative cancellation. The new snapshot
    /// is persisted first and swapped in afterwards; failure or cancellation
    /// at any stage leaves the previous snapshot serving.
    pub fn update_cancellable<S: ArticleStore>(
        &self,
        store: &S,
        cancel: &CancelToken,
    ) -> Result<UpdateReport, EngineError> {
        let articles = store.fetch_all()?;
        let discarded = store.fetch_discarded()?;
        tracing::info!(articles = articles.len(), "rebuild started");
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let fragments: Vec<(ArticleId, Vec<String>)> = articles
            .iter()
            .map(|article| (article.id.clone(), self.tokenizer.tokenize(&article.content)))
            .collect();
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let stats = CorpusStats::rebuild(&fragments);
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let keyword_sets: Vec<(ArticleId, Vec<String>)> = fragments
            .iter()
            .map(|(id, tokens)| {
                let words = keywords::extract(tokens, &stats, self.config.top_keywords)
                    .into_iter()
                    .map(|(word, _)| word)
                    .collect();
                (id.clone(), words)
            })
            .collect();
        let similarity = SimilarityIndex::build(&keyword_sets);
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut fulltext = self.snapshot().fulltext.clone();
        fulltext.update(
            articles.iter().map(|a| (a.id.clone(), a.title.clone(), a.content.clone())),
            &self.tokenizer,
        );
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let snapshot = Snapshot::new(stats, similarity, fulltext);
        snapshot.save(&self.config.snapshot_path)?;

        let report = UpdateReport {
            articles: articles.len(),
            vocabulary: snapshot.similarity.vocabulary.len(),
            discarded: discarded.len(),
        };
        *self.snapshot.write() = Arc::new(snapshot);
        *self.discarded.write() = Arc::new(discarded);
        tracing::info!(
            articles = report.articles,
            vocabulary = report.vocabulary,
            discarded = report.discarded,
            "rebuild complete"
        );
        Ok(report)
    }

    /// Ranked similar articles for an indexed article id.
    pub fn recommend(&self, id: &str, top_k: usize) -> Result<Vec<(ArticleId, f64)>, EngineError> {
        self.snapshot().similarity.match_id(id, top_k)
    }

    /// Ranked similar articles for raw text not yet in the corpus. The text
    /// runs through the same tokenizer and extractor as an index build, then
    /// is projected onto the existing vocabulary.
    pub fn recommend_text(&self, text: &str, top_k: usize) -> Vec<(ArticleId, f64)> {
        let snapshot = self.snapshot();
        let tokens = self.tokenizer.tokenize(text);
        let selected: Vec<String> =
            keywords::extract(&tokens, &snapshot.stats, self.config.top_keywords)
                .into_iter()
                .map(|(word, _)| word)
                .collect();
        let query = snapshot.similarity.project(&selected);
        snapshot.similarity.match_set(&query, top_k)
    }

    /// Free-text search over the current snapshot with the discard mask
    /// applied at scoring time.
    pub fn search(
        &self,
        query: &str,
        fields: &[Field],
        mode: SearchMode,
        limit: usize,
    ) -> Vec<(ArticleId, f32)> {
        let snapshot = self.snapshot();
        let mask = self.discarded.read().clone();
        snapshot.fulltext.search(query, fields, mode, limit, &mask, &self.tokenizer)
    }
}

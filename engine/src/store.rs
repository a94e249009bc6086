use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::EngineError;
use crate::ArticleId;

/// One crawled article as handed over by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    /// Soft-delete flag. Discarded articles stay stored and indexed; they
    /// are masked out of search results instead of being removed.
    #[serde(default)]
    pub discarded: bool,
}

/// Read side of the article store required by the engine. Rebuilds and the
/// discard mask only ever read; writes belong to the ingestion tooling.
pub trait ArticleStore {
    fn fetch_all(&self) -> Result<Vec<Article>, EngineError>;
    fn fetch_discarded(&self) -> Result<HashSet<ArticleId>, EngineError>;
}

/// sled-backed article store, keyed by article id.
pub struct SledStore {
    db: sled::Db,
    articles: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let db = sled::open(path)?;
        let articles = db.open_tree("articles")?;
        Ok(Self { db, articles })
    }

    pub fn put(&self, article: &Article) -> Result<(), EngineError> {
        let bytes = bincode::serialize(article)?;
        self.articles.insert(article.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Article>, EngineError> {
        match self.articles.get(id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Toggle the soft-delete flag. Returns false if the id is unknown.
    pub fn set_discarded(&self, id: &str, discarded: bool) -> Result<bool, EngineError> {
        match self.get(id)? {
            Some(mut article) => {
                article.discarded = discarded;
                self.put(&article)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn flush(&self) -> Result<(), EngineError> {
        self.db.flush()?;
        Ok(())
    }
}

impl ArticleStore for SledStore {
    fn fetch_all(&self) -> Result<Vec<Article>, EngineError> {
        let mut articles = Vec::with_capacity(self.articles.len());
        for entry in self.articles.iter() {
            let (_, value) = entry?;
            articles.push(bincode::deserialize(&value)?);
        }
        Ok(articles)
    }

    fn fetch_discarded(&self) -> Result<HashSet<ArticleId>, EngineError> {
        let mut discarded = HashSet::new();
        for entry in self.articles.iter() {
            let (_, value) = entry?;
            let article: Article = bincode::deserialize(&value)?;
            if article.discarded {
                discarded.insert(article.id);
            }
        }
        Ok(discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            title: format!("title {id}"),
            content: format!("content {id}"),
            discarded: false,
        }
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.put(&article("a1")).unwrap();
        let loaded = store.get("a1").unwrap().unwrap();
        assert_eq!(loaded.title, "title a1");
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn discard_flag_feeds_the_mask() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.put(&article("a1")).unwrap();
        store.put(&article("a2")).unwrap();
        assert!(store.set_discarded("a2", true).unwrap());
        assert!(!store.set_discarded("missing", true).unwrap());

        let discarded = store.fetch_discarded().unwrap();
        assert_eq!(discarded.len(), 1);
        assert!(discarded.contains("a2"));

        assert!(store.set_discarded("a2", false).unwrap());
        assert!(store.fetch_discarded().unwrap().is_empty());
    }

    #[test]
    fn fetch_all_returns_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        for id in ["a1", "a2", "a3"] {
            store.put(&article(id)).unwrap();
        }
        let mut ids: Vec<ArticleId> =
            store.fetch_all().unwrap().into_iter().map(|a| a.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a1", "a2", "a3"]);
    }
}

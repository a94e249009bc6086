pub mod corpus;
pub mod engine;
pub mod error;
pub mod fulltext;
pub mod keywords;
pub mod similarity;
pub mod snapshot;
pub mod store;
pub mod tokenizer;

/// Stable external identifier assigned to an article at ingestion time.
pub type ArticleId = String;

pub use corpus::CorpusStats;
pub use engine::{CancelToken, EngineConfig, RecommendEngine, UpdateReport};
pub use error::EngineError;
pub use fulltext::{Field, FullTextIndex, SearchMode};
pub use keywords::extract;
pub use similarity::SimilarityIndex;
pub use snapshot::Snapshot;
pub use store::{Article, ArticleStore, SledStore};
pub use tokenizer::Tokenizer;

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use crate::corpus::CorpusStats;
use crate::error::EngineError;
use crate::fulltext::FullTextIndex;
use crate::similarity::SimilarityIndex;

pub const FORMAT_VERSION: u32 = 1;

/// Immutable output of one full rebuild: corpus statistics, the similarity
/// index, and the full-text index, persisted and swapped as one unit so a
/// reader can never pair vectors with a foreign vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub stats: CorpusStats,
    pub similarity: SimilarityIndex,
    pub fulltext: FullTextIndex,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            stats: CorpusStats::default(),
            similarity: SimilarityIndex::default(),
            fulltext: FullTextIndex::default(),
        }
    }
}

impl Snapshot {
    pub fn new(stats: CorpusStats, similarity: SimilarityIndex, fulltext: FullTextIndex) -> Self {
        Self { version: FORMAT_VERSION, stats, similarity, fulltext }
    }

    /// Write to a temporary file and rename over the target, so a concurrent
    /// loader sees either the previous snapshot or this one, never a partial
    /// write.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let bytes = bincode::serialize(self)?;
        let tmp = path.with_extension("bin.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load and validate a persisted snapshot. A version mismatch or a
    /// keyword set pointing outside the vocabulary refuses the snapshot;
    /// callers keep serving their last-known-good state.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        File::open(path)?.read_to_end(&mut buf)?;
        let mut snapshot: Snapshot =
            bincode::deserialize(&buf).map_err(|err| EngineError::CorruptSnapshot {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if snapshot.version != FORMAT_VERSION {
            return Err(EngineError::VersionMismatch {
                found: snapshot.version,
                expected: FORMAT_VERSION,
            });
        }
        snapshot.similarity.validate().map_err(|reason| EngineError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason,
        })?;
        snapshot.similarity.restore_lookup();
        snapshot.fulltext.restore_lookup();
        Ok(snapshot)
    }
}

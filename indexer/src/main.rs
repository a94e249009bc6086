use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use engine::{Article, EngineConfig, RecommendEngine, SledStore};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    #[serde(alias = "body")]
    content: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Ingest crawled articles and rebuild the recommendation snapshot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load crawled article records (JSON/JSONL file or directory) into the store
    Ingest {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Article store directory
        #[arg(long)]
        store: String,
    },
    /// Rebuild corpus statistics, keyword vectors, and the full-text index
    Rebuild {
        /// Article store directory
        #[arg(long)]
        store: String,
        /// Output snapshot file
        #[arg(long)]
        snapshot: String,
        /// Keyword budget per article
        #[arg(long, default_value_t = 100)]
        top_keywords: usize,
        /// Optional stop-word list replacing the built-in one
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
    /// Mark an article as discarded (masked from search, kept in the index)
    Discard {
        #[arg(long)]
        store: String,
        id: String,
    },
    /// Clear the discarded flag again
    Restore {
        #[arg(long)]
        store: String,
        id: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { input, store } => ingest(&input, &store),
        Commands::Rebuild { store, snapshot, top_keywords, stopwords } => {
            rebuild(&store, &snapshot, top_keywords, stopwords)
        }
        Commands::Discard { store, id } => set_discarded(&store, &id, true),
        Commands::Restore { store, id } => set_discarded(&store, &id, false),
    }
}

fn ingest(input: &str, store_dir: &str) -> Result<()> {
    let input_path = Path::new(input);
    let store = SledStore::open(store_dir)?;

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input path {input} does not exist");
    }

    let mut ingested = 0usize;
    for file in files {
        ingested += if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            ingest_jsonl(&file, &store)?
        } else {
            ingest_json(&file, &store)?
        };
    }
    store.flush()?;
    tracing::info!(ingested, total = store.len(), "ingest complete");
    Ok(())
}

fn ingest_jsonl(file: &Path, store: &SledStore) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let mut count = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc = serde_json::from_str(&line)?;
        store_doc(doc, store)?;
        count += 1;
    }
    Ok(count)
}

fn ingest_json(file: &Path, store: &SledStore) -> Result<usize> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let mut count = 0usize;
    match json {
        serde_json::Value::Array(arr) => {
            for value in arr {
                let doc: InputDoc = serde_json::from_value(value)?;
                store_doc(doc, store)?;
                count += 1;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            store_doc(doc, store)?;
            count += 1;
        }
        _ => {}
    }
    Ok(count)
}

fn store_doc(doc: InputDoc, store: &SledStore) -> Result<()> {
    // re-ingesting a known id overwrites the record but keeps its discard
    // state
    let discarded = store.get(&doc.id)?.map(|a| a.discarded).unwrap_or(false);
    store.put(&Article { id: doc.id, title: doc.title, content: doc.content, discarded })?;
    Ok(())
}

fn rebuild(
    store_dir: &str,
    snapshot: &str,
    top_keywords: usize,
    stopwords: Option<PathBuf>,
) -> Result<()> {
    let store = SledStore::open(store_dir)?;
    let mut config = EngineConfig::new(snapshot);
    config.top_keywords = top_keywords;
    config.stopwords_path = stopwords;

    // the first rebuild has no snapshot to reload yet
    let engine = match RecommendEngine::open(config.clone()) {
        Ok(engine) => engine,
        Err(_) => RecommendEngine::new(config)?,
    };
    let report = engine.update(&store)?;
    write_meta(snapshot, &report)?;
    tracing::info!(
        articles = report.articles,
        vocabulary = report.vocabulary,
        discarded = report.discarded,
        snapshot,
        "rebuild complete"
    );
    Ok(())
}

/// Human-readable sidecar next to the snapshot; diagnostic only, the
/// authoritative version tag lives inside the snapshot file itself.
#[derive(serde::Serialize)]
struct MetaFile<'a> {
    articles: usize,
    vocabulary: usize,
    discarded: usize,
    created_at: &'a str,
}

fn write_meta(snapshot: &str, report: &engine::UpdateReport) -> Result<()> {
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    let meta = MetaFile {
        articles: report.articles,
        vocabulary: report.vocabulary,
        discarded: report.discarded,
        created_at: &created_at,
    };
    let path = Path::new(snapshot).with_extension("meta.json");
    std::fs::write(path, serde_json::to_string_pretty(&meta)?)?;
    Ok(())
}

fn set_discarded(store_dir: &str, id: &str, discarded: bool) -> Result<()> {
    let store = SledStore::open(store_dir)?;
    if !store.set_discarded(id, discarded)? {
        bail!("no article with id {id}");
    }
    store.flush()?;
    tracing::info!(id, discarded, "discard flag updated");
    Ok(())
}

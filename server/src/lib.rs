use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use engine::{EngineConfig, EngineError, Field, RecommendEngine, SearchMode, SledStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub admin_token: Option<String>,
    pub stopwords_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendEngine>,
    pub store: Arc<SledStore>,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    /// Comma-separated field list, e.g. "title,content"
    pub fields: Option<String>,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct RecommendParams {
    #[serde(default = "default_limit")]
    pub k: usize,
}

#[derive(Deserialize)]
pub struct RecommendBody {
    pub text: String,
    #[serde(default = "default_limit")]
    pub k: usize,
}

#[derive(Serialize)]
pub struct RecommendHit {
    pub id: String,
    pub score: f64,
    pub title: Option<String>,
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    let mut engine_config = EngineConfig::new(&config.snapshot_path);
    engine_config.stopwords_path = config.stopwords_path.clone();
    // refuse to start on a missing or corrupt snapshot
    let engine = RecommendEngine::open(engine_config)?;
    let store = SledStore::open(&config.store_dir)?;
    engine.refresh_mask(&store)?;

    let state = AppState {
        engine: Arc::new(engine),
        store: Arc::new(store),
        admin_token: config.admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/recommend/:id", get(recommend_handler))
        .route("/recommend", post(recommend_text_handler))
        .route("/article/:id", get(article_handler))
        .route("/article/:id/discard", post(discard_handler))
        .route("/article/:id/restore", post(restore_handler))
        .route("/update", post(update_handler))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "articles": state.engine.article_count(),
    }))
}

fn parse_fields(raw: &Option<String>) -> Vec<Field> {
    let mut fields = Vec::new();
    if let Some(raw) = raw {
        for part in raw.split(',') {
            match part.trim() {
                "title" => fields.push(Field::Title),
                "content" => fields.push(Field::Content),
                _ => {}
            }
        }
    }
    if fields.is_empty() {
        fields = vec![Field::Title, Field::Content];
    }
    fields
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let fields = parse_fields(&params.fields);
    let limit = params.limit.clamp(1, 100);
    let hits = state.engine.search(&params.q, &fields, params.mode, limit);

    let raw_terms: Vec<String> = params.q.split_whitespace().map(|s| s.to_string()).collect();
    // enrichment must not disturb the rank order coming out of the index
    let mut results = Vec::with_capacity(hits.len());
    for (id, score) in hits {
        let article = state.store.get(&id).ok().flatten();
        let title = article.as_ref().map(|a| a.title.clone());
        let snippet = article.as_ref().and_then(|a| snippet(&a.content, &raw_terms));
        results.push(SearchHit { id, score, title, snippet });
    }

    Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    })
}

pub async fn recommend_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<Vec<RecommendHit>>, (StatusCode, String)> {
    let k = params.k.clamp(1, 100);
    match state.engine.recommend(&id, k) {
        Ok(hits) => Ok(Json(enrich_recommend(&state, hits))),
        Err(EngineError::UnknownArticle(id)) => {
            Err((StatusCode::NOT_FOUND, format!("unknown article id: {id}")))
        }
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

pub async fn recommend_text_handler(
    State(state): State<AppState>,
    Json(body): Json<RecommendBody>,
) -> Json<Vec<RecommendHit>> {
    let k = body.k.clamp(1, 100);
    Json(enrich_recommend(&state, state.engine.recommend_text(&body.text, k)))
}

fn enrich_recommend(state: &AppState, hits: Vec<(String, f64)>) -> Vec<RecommendHit> {
    hits.into_iter()
        .map(|(id, score)| {
            let title = state.store.get(&id).ok().flatten().map(|a| a.title);
            RecommendHit { id, score, title }
        })
        .collect()
}

pub async fn article_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.store.get(&id) {
        Ok(Some(article)) => Ok(Json(serde_json::json!({
            "id": article.id,
            "title": article.title,
            "content": article.content,
            "discarded": article.discarded,
        }))),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("unknown article id: {id}"))),
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

async fn discard_handler(
    state: State<AppState>,
    headers: axum::http::HeaderMap,
    path: Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    set_discarded(state, headers, path, true).await
}

async fn restore_handler(
    state: State<AppState>,
    headers: axum::http::HeaderMap,
    path: Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    set_discarded(state, headers, path, false).await
}

async fn set_discarded(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(id): Path<String>,
    discarded: bool,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    match state.store.set_discarded(&id, discarded) {
        Ok(true) => {
            let masked = state
                .engine
                .refresh_mask(state.store.as_ref())
                .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
            Ok(Json(serde_json::json!({ "id": id, "discarded": discarded, "masked": masked })))
        }
        Ok(false) => Err((StatusCode::NOT_FOUND, format!("unknown article id: {id}"))),
        Err(err) => Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

async fn update_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let engine = state.engine.clone();
    let store = state.store.clone();
    // the rebuild is CPU and disk bound; keep it off the request workers
    let report = tokio::task::spawn_blocking(move || engine.update(store.as_ref()))
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(serde_json::json!({
        "articles": report.articles,
        "vocabulary": report.vocabulary,
        "discarded": report.discarded,
    })))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(token) => token,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn snippet(content: &str, raw_terms: &[String]) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    // first case-insensitive occurrence of any raw query term
    let mut first_idx: Option<usize> = None;
    for term in raw_terms {
        if term.trim().is_empty() {
            continue;
        }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build()
        else {
            continue;
        };
        if let Some(m) = pat.find(content) {
            first_idx = Some(m.start());
            break;
        }
    }
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(content, idx.saturating_sub(100));
            let end = floor_char_boundary(content, (idx + 200).min(content.len()));
            content[start..end].to_string()
        }
        None => content.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut out = snippet.to_string();
    for term in terms {
        if term.trim().is_empty() {
            continue;
        }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build()
        else {
            continue;
        };
        out = pat
            .replace_all(&out, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0]))
            .to_string();
    }
    out
}

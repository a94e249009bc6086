use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use engine::{Article, EngineConfig, RecommendEngine, SledStore};
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, ServerConfig};
use tempfile::tempdir;
use tower::ServiceExt;

fn article(id: &str, title: &str, content: &str) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        discarded: false,
    }
}

/// Seed the store, build a snapshot, and leave one un-indexed article behind
/// for the /update test. Store and engine handles are dropped so the app can
/// reopen the sled directory.
fn seed(dir: &std::path::Path) -> ServerConfig {
    let store = SledStore::open(dir.join("store")).unwrap();
    for a in [
        article("n1", "Winter concert", "orchestra concert melody stage"),
        article("n2", "Concert tickets", "orchestra concert melody lights"),
        article("n3", "Stagecraft", "stage lights rigging crew"),
        article("n4", "Marathon day", "marathon runners pacing split"),
        article("n5", "Marathon guide", "marathon runners hydration route"),
    ] {
        store.put(&a).unwrap();
    }
    let engine = RecommendEngine::new(EngineConfig::new(dir.join("snapshot.bin"))).unwrap();
    engine.update(&store).unwrap();
    store.put(&article("n6", "Encore", "orchestra concert encore melody")).unwrap();
    store.flush().unwrap();

    ServerConfig {
        store_dir: dir.join("store"),
        snapshot_path: dir.join("snapshot.bin"),
        admin_token: Some("secret".to_string()),
        stopwords_path: None,
    }
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_json(app: &Router, uri: &str, body: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("X-ADMIN-TOKEN", token);
    }
    let resp = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_ranked_enriched_results() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, json) = get_json(&app, "/search?q=concert").await;
    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // equal scores tie-break by article id
    assert_eq!(results[0]["id"], "n1");
    assert_eq!(results[0]["title"], "Winter concert");
    assert!(results[0]["snippet"].as_str().unwrap().contains("<em>concert</em>"));
}

#[tokio::test]
async fn and_mode_narrows_the_result_set() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (_, or_json) = get_json(&app, "/search?q=stage+lights&mode=or").await;
    let (_, and_json) = get_json(&app, "/search?q=stage+lights&mode=and").await;
    let or_ids: Vec<&str> =
        or_json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    let and_ids: Vec<&str> =
        and_json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert!(or_ids.len() > and_ids.len());
    assert_eq!(and_ids, vec!["n3"]);
}

#[tokio::test]
async fn discarded_articles_are_masked_but_page_stays_full() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, _) = post_json(&app, "/article/n1/discard", "", Some("secret")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = get_json(&app, "/search?q=concert&limit=1").await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_ne!(results[0]["id"], "n1");

    let (status, _) = post_json(&app, "/article/n1/restore", "", Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = get_json(&app, "/search?q=concert").await;
    let ids: Vec<&str> =
        json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"n1"));
}

#[tokio::test]
async fn recommend_returns_related_articles() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, json) = get_json(&app, "/recommend/n1?k=5").await;
    assert_eq!(status, StatusCode::OK);
    let hits = json.as_array().unwrap();
    assert_eq!(hits[0]["id"], "n2");
    assert_eq!(hits[0]["title"], "Concert tickets");
    let score = hits[0]["score"].as_f64().unwrap();
    assert!(score > 0.0 && score < 1.0);
}

#[tokio::test]
async fn unknown_article_is_a_404() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, _) = get_json(&app, "/recommend/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get_json(&app, "/article/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommend_by_raw_text() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, json) =
        post_json(&app, "/recommend", r#"{"text":"orchestra concert in winter","k":3}"#, None)
            .await;
    assert_eq!(status, StatusCode::OK);
    let hits = json.as_array().unwrap();
    assert_eq!(hits[0]["id"], "n1");
}

#[tokio::test]
async fn update_is_admin_guarded_and_indexes_new_articles() {
    let dir = tempdir().unwrap();
    let app = build_app(seed(dir.path())).unwrap();

    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["articles"], 5);

    let (status, _) = post_json(&app, "/update", "", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = post_json(&app, "/update", "", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = post_json(&app, "/update", "", Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["articles"], 6);

    let (_, json) = get_json(&app, "/search?q=encore").await;
    let ids: Vec<&str> =
        json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["n6"]);
}

//! QdrantIndex against an in-process fake of the Qdrant REST API.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use voxid_vecstore::{
    Filter, Payload, Point, QdrantConfig, QdrantIndex, VecError, VecIndex, cosine_similarity,
};

/// Page size the fake enforces regardless of the requested limit, so the
/// client has to follow `next_page_offset`.
const FAKE_PAGE: usize = 2;

#[derive(Default)]
struct Fake {
    collections: HashMap<String, BTreeMap<String, (Vec<f32>, Value)>>,
    created: usize,
}

type Shared = Arc<Mutex<Fake>>;

fn ok(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "result": result, "status": "ok" })))
}

fn missing() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "status": { "error": "Not found" } })))
}

fn passes(filter: Option<&Value>, payload: &Value) -> bool {
    let Some(cond) = filter.and_then(|f| f["must"].get(0)) else {
        return true;
    };
    let key = cond["key"].as_str().unwrap_or_default();
    payload.get(key) == Some(&cond["match"]["value"])
}

async fn get_collection(
    State(s): State<Shared>,
    Path(c): Path<String>,
) -> (StatusCode, Json<Value>) {
    if s.lock().unwrap().collections.contains_key(&c) {
        ok(json!({ "status": "green" }))
    } else {
        missing()
    }
}

async fn put_collection(
    State(s): State<Shared>,
    Path(c): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut fake = s.lock().unwrap();
    fake.collections.entry(c).or_default();
    fake.created += 1;
    ok(json!(true))
}

async fn delete_collection(
    State(s): State<Shared>,
    Path(c): Path<String>,
) -> (StatusCode, Json<Value>) {
    s.lock().unwrap().collections.remove(&c);
    ok(json!(true))
}

async fn upsert(
    State(s): State<Shared>,
    Path(c): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut fake = s.lock().unwrap();
    let Some(col) = fake.collections.get_mut(&c) else {
        return missing();
    };
    for p in body["points"].as_array().cloned().unwrap_or_default() {
        let vector: Vec<f32> = serde_json::from_value(p["vector"].clone()).unwrap();
        col.insert(p["id"].as_str().unwrap().to_string(), (vector, p["payload"].clone()));
    }
    ok(json!({ "operation_id": 1, "status": "completed" }))
}

async fn search(
    State(s): State<Shared>,
    Path(c): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let fake = s.lock().unwrap();
    let Some(col) = fake.collections.get(&c) else {
        return missing();
    };
    let query: Vec<f32> = serde_json::from_value(body["vector"].clone()).unwrap();
    let limit = body["limit"].as_u64().unwrap() as usize;
    let mut hits: Vec<(f32, &String, &Value)> = col
        .iter()
        .map(|(id, (v, p))| (cosine_similarity(&query, v), id, p))
        .collect();
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));
    let result: Vec<Value> = hits
        .into_iter()
        .take(limit)
        .map(|(score, id, p)| json!({ "id": id, "version": 0, "score": score, "payload": p }))
        .collect();
    ok(json!(result))
}

async fn delete_points(
    State(s): State<Shared>,
    Path(c): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut fake = s.lock().unwrap();
    let Some(col) = fake.collections.get_mut(&c) else {
        return missing();
    };
    for id in body["points"].as_array().cloned().unwrap_or_default() {
        col.remove(id.as_str().unwrap());
    }
    ok(json!({ "operation_id": 2, "status": "completed" }))
}

async fn scroll(
    State(s): State<Shared>,
    Path(c): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let fake = s.lock().unwrap();
    let Some(col) = fake.collections.get(&c) else {
        return missing();
    };
    let start = body["offset"].as_str().unwrap_or("").to_string();
    let limit = (body["limit"].as_u64().unwrap() as usize).min(FAKE_PAGE);
    let mut matching = col
        .range(start..)
        .filter(|(_, (_, p))| passes(body.get("filter"), p));
    let page: Vec<Value> = matching
        .by_ref()
        .take(limit)
        .map(|(id, (v, p))| json!({ "id": id, "vector": v, "payload": p }))
        .collect();
    let next = matching.next().map(|(id, _)| json!(id)).unwrap_or(Value::Null);
    ok(json!({ "points": page, "next_page_offset": next }))
}

async fn count(
    State(s): State<Shared>,
    Path(c): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let fake = s.lock().unwrap();
    let Some(col) = fake.collections.get(&c) else {
        return missing();
    };
    let n = col.values().filter(|(_, p)| passes(body.get("filter"), p)).count();
    ok(json!({ "count": n }))
}

async fn start_fake() -> (String, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route(
            "/collections/{c}",
            get(get_collection).put(put_collection).delete(delete_collection),
        )
        .route("/collections/{c}/points", put(upsert))
        .route("/collections/{c}/points/search", post(search))
        .route("/collections/{c}/points/delete", post(delete_points))
        .route("/collections/{c}/points/scroll", post(scroll))
        .route("/collections/{c}/points/count", post(count))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn point(id: &str, v: &[f32], name: &str) -> Point {
    let mut payload = Payload::new();
    payload.insert("name".into(), json!(name));
    Point::new(id, v.to_vec(), payload)
}

#[tokio::test]
async fn creates_collection_once() {
    let (url, state) = start_fake().await;
    let _a = QdrantIndex::connect(QdrantConfig::new(&url, "raw"), 3).await.unwrap();
    let _b = QdrantIndex::connect(QdrantConfig::new(&url, "raw"), 3).await.unwrap();
    assert_eq!(state.lock().unwrap().created, 1);
}

#[tokio::test]
async fn upsert_search_scroll_delete() {
    let (url, _state) = start_fake().await;
    let idx = QdrantIndex::connect(QdrantConfig::new(&url, "raw"), 3).await.unwrap();

    idx.upsert(&[
        point("p1", &[1.0, 0.0, 0.0], "alice"),
        point("p2", &[0.0, 1.0, 0.0], "bob"),
        point("p3", &[0.8, 0.6, 0.0], "alice"),
        point("p4", &[0.0, 0.0, 1.0], "carol"),
        point("p5", &[0.6, 0.8, 0.0], "alice"),
    ])
    .await
    .unwrap();

    let hits = idx.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(hits[0].id, "p1");
    assert!(hits[0].distance.abs() < 1e-6);
    assert_eq!(hits[1].id, "p3");
    assert!((hits[1].similarity() - 0.8).abs() < 1e-5);
    assert_eq!(hits[1].payload["name"], json!("alice"));

    // Five points over pages of two.
    let all = idx.scroll(&Filter::All).await.unwrap();
    assert_eq!(all.len(), 5);
    let alice = idx.list_ids(&Filter::eq("name", "alice")).await.unwrap();
    assert_eq!(alice, ["p1", "p3", "p5"]);
    assert_eq!(idx.count(&Filter::eq("name", "alice")).await.unwrap(), 3);

    idx.delete(&["p1".to_string(), "p3".to_string()]).await.unwrap();
    assert_eq!(idx.count(&Filter::eq("name", "alice")).await.unwrap(), 1);

    idx.clear().await.unwrap();
    assert_eq!(idx.count(&Filter::All).await.unwrap(), 0);
    // The collection is recreated and writable.
    idx.upsert(&[point("p6", &[0.0, 0.0, 1.0], "dave")]).await.unwrap();
    assert_eq!(idx.count(&Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn dimension_checked_before_request() {
    let (url, _state) = start_fake().await;
    let idx = QdrantIndex::connect(QdrantConfig::new(&url, "master"), 3).await.unwrap();
    let err = idx.upsert(&[point("x", &[1.0], "a")]).await.unwrap_err();
    assert!(matches!(err, VecError::DimensionMismatch { got: 1, want: 3 }));
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = QdrantIndex::connect(QdrantConfig::new(format!("http://{addr}"), "raw"), 3)
        .await
        .err()
        .unwrap();
    assert!(err.is_transient(), "got {err:?}");
}

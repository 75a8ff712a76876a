//! Router-level tests over a file-backed SQLite database.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use schemarest::jobs::{JobRequest, JobStatus};
use schemarest::{app, AppState, FileJobQueue, JobQueue, Method, RequestContext, Settings, SqlExecutor};
use serde_json::Value;
use sqlx::{Connection, SqliteConnection};
use std::time::Duration;
use tower::ServiceExt;

async fn setup(dir: &tempfile::TempDir) -> Router {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
    let mut settings = Settings::new(url);
    settings.async_path = Some(dir.path().join("jobs"));
    let state = AppState::from_settings(settings).await.unwrap();

    let mut conn = state.pool.acquire().await.unwrap();
    let db = conn.executor();
    for sql in [
        "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE books (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES authors(id), title TEXT NOT NULL)",
        "CREATE TABLE tags (name TEXT PRIMARY KEY, color TEXT)",
        "INSERT INTO tags (name, color) VALUES ('São Paulo', 'green'), ('a/b', 'red')",
        "INSERT INTO authors (id, name) VALUES (1, 'Ursula K. Le Guin'), (2, 'Iain Banks')",
        "INSERT INTO books (id, author_id, title) VALUES (1, 1, 'The Dispossessed'), (2, 2, 'Excession')",
    ] {
        db.execute(sql).await.unwrap();
    }
    drop(conn);
    app(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let location = resp
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, location, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let (status, _, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["driver"], "sqlite3");
}

#[tokio::test]
async fn test_get_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let (status, _, body) = send(&app, get("/q2/v1/authors/1/books")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err"], false);
    assert_eq!(body["http_method"], "GET");
    assert_eq!(body["dbd_driver_name"], "sqlite3");
    assert_eq!(body["table"], "books");
    assert_eq!(body["sql"], "SELECT * FROM books WHERE (author_id=1)");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["links"][0], "authors/1;rel=\"authors\"");
    assert!(body["db_server_vers"].is_string());
}

#[tokio::test]
async fn test_encoded_keys_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let (status, _, body) = send(&app, get("/q2/v1/tags/S%C3%A3o%20Paulo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], "SELECT * FROM tags WHERE (name='São Paulo')");
    assert_eq!(body["results"][0]["color"], "green");

    let (status, _, body) = send(&app, get("/q2/v1/tags/a%2Fb/color")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["color"], "red");
}

#[tokio::test]
async fn test_missing_row_and_table() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let (status, _, body) = send(&app, get("/q2/v1/authors/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err"], false);

    let (status, _, body) = send(&app, get("/q2/v1/publishers")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err"], true);
    assert!(body["log"].as_str().unwrap().contains("publishers"));
}

#[tokio::test]
async fn test_post_form_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let req = Request::builder()
        .method("POST")
        .uri("/q2/v1/authors")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=Octavia+Butler"))
        .unwrap();
    let (status, location, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some("/q2/v1/authors/3"));
    assert_eq!(body["results"], "/q2/v1/authors/3");
    assert_eq!(body["affected_rows"], 1);

    let req = Request::builder()
        .method("POST")
        .uri("/q2/v1/authors/3/books")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title": "Kindred"}"#))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sql"], "INSERT INTO books (author_id,title) VALUES (3,'Kindred')");

    let (_, _, body) = send(&app, get("/q2/v1/authors/3/books")).await;
    assert_eq!(body["results"][0]["title"], "Kindred");
}

#[tokio::test]
async fn test_validation_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let req = Request::builder()
        .method("POST")
        .uri("/q2/v1/books")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["err"], true);
}

#[tokio::test]
async fn test_async_job() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup(&dir).await;
    let req = Request::builder()
        .method("DELETE")
        .uri("/q2/v1/books/2")
        .header("Q2-Async", "1")
        .body(Body::empty())
        .unwrap();
    let (status, location, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "In progress...");
    let location = location.unwrap();
    assert!(location.starts_with("/q2/v1/async/"));

    let mut completed = false;
    for _ in 0..100 {
        let (status, _, body) = send(&app, get(&location)).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "Completed." {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed);

    let (status, _, _) = send(&app, get(&location)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&app, get("/q2/v1/books/2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pending_jobs_resume_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
    let mut conn = SqliteConnection::connect(&url).await.unwrap();
    SqlExecutor::execute(&mut conn, "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
        .await
        .unwrap();
    conn.close().await.unwrap();

    let queue = FileJobQueue::open(dir.path().join("jobs")).await.unwrap();
    let ctx = RequestContext::new(Method::Post, "/q2/v1/notes").with_param("body", "left behind");
    let id = queue.enqueue(&JobRequest::from_context(&ctx)).await.unwrap();
    assert_eq!(queue.status(&id).await.unwrap(), JobStatus::Pending);

    let mut settings = Settings::new(url);
    settings.async_path = Some(dir.path().join("jobs"));
    let state = AppState::from_settings(settings).await.unwrap();

    let mut completed = false;
    for _ in 0..100 {
        if queue.status(&id).await.unwrap() == JobStatus::Done {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(completed);

    let mut conn = state.pool.acquire().await.unwrap();
    let rows = conn
        .executor()
        .select("SELECT body FROM notes")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["body"], "left behind");
}

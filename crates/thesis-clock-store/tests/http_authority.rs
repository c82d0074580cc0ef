//! Integration tests for the HTTP time authority client.
//!
//! Each test starts a small Axum server on an ephemeral localhost port
//! that plays the backend's `virtual-clock` resource and records every
//! request it receives.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::put;
use chrono::NaiveDateTime;
use serde_json::{Value, json};
use thesis_clock_store::{AuthorityError, HttpTimeAuthority, TimeAuthority};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Recorded {
    method: &'static str,
    body: Option<Value>,
    cookie: Option<String>,
}

#[derive(Debug, Default)]
struct Backend {
    requests: Mutex<Vec<Recorded>>,
    virtual_time: Mutex<Option<String>>,
    failing: bool,
}

impl Backend {
    fn record(&self, method: &'static str, headers: &HeaderMap, body: Option<Value>) {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        self.requests.lock().unwrap().push(Recorded {
            method,
            body,
            cookie,
        });
    }
}

async fn put_clock(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    backend.record("PUT", &headers, Some(body.clone()));
    if backend.failing {
        return (StatusCode::SERVICE_UNAVAILABLE, "clock service down").into_response();
    }
    let time = body
        .get("virtual_time")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    *backend.virtual_time.lock().unwrap() = time;
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_clock(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> StatusCode {
    backend.record("DELETE", &headers, None);
    *backend.virtual_time.lock().unwrap() = None;
    StatusCode::NO_CONTENT
}

async fn get_clock(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    backend.record("GET", &headers, None);
    let current = backend.virtual_time.lock().unwrap().clone();
    Json(match current {
        Some(time) => json!({ "current_time": time, "virtual": true }),
        None => json!({ "current_time": "2024-06-10T10:00:00", "virtual": false }),
    })
}

/// Serve a fake backend and return it with its API base URL.
async fn spawn_backend(failing: bool) -> (Arc<Backend>, String) {
    let backend = Arc::new(Backend {
        failing,
        ..Backend::default()
    });
    let router = Router::new()
        .route(
            "/api/virtual-clock",
            put(put_clock).delete(delete_clock).get(get_clock),
        )
        .with_state(Arc::clone(&backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (backend, format!("http://{addr}/api"))
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
}

fn authority(base_url: &str, cookie: Option<&str>) -> TimeAuthority {
    TimeAuthority::Http(
        HttpTimeAuthority::new(
            base_url,
            Duration::from_secs(5),
            cookie.map(ToOwned::to_owned),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn set_virtual_sends_put_with_body_and_session() {
    let (backend, base_url) = spawn_backend(false).await;
    let authority = authority(&base_url, Some("session=abc123"));

    authority
        .set_virtual(at("2030-01-01T00:00:00"))
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![Recorded {
            method: "PUT",
            body: Some(json!({ "virtual_time": "2030-01-01T00:00:00" })),
            cookie: Some("session=abc123".to_owned()),
        }]
    );
}

#[tokio::test]
async fn current_reflects_virtual_then_real() {
    let (backend, base_url) = spawn_backend(false).await;
    let authority = authority(&base_url, None);

    authority
        .set_virtual(at("2031-05-05T12:30:00"))
        .await
        .unwrap();
    let remote = authority.current().await.unwrap();
    assert!(remote.is_virtual);
    assert_eq!(remote.current_time, at("2031-05-05T12:30:00"));

    authority.set_real().await.unwrap();
    let remote = authority.current().await.unwrap();
    assert!(!remote.is_virtual);

    let methods: Vec<&str> = backend
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, ["PUT", "GET", "DELETE", "GET"]);
    assert!(
        backend
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.cookie.is_none())
    );
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let (_backend, base_url) = spawn_backend(true).await;
    let authority = authority(&base_url, None);

    let err = authority
        .set_virtual(at("2030-01-01T00:00:00"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            &err,
            AuthorityError::Status { status: 503, body } if body == "clock service down"
        ),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn unreachable_backend_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let authority = authority(&format!("http://{addr}/api"), None);
    assert!(matches!(
        authority.set_real().await,
        Err(AuthorityError::Http(_))
    ));
}

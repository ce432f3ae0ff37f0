#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const STAFF_TOKEN: &str = "staff-token";
pub const PUBLIC_TOKEN: &str = "public-link-123";
pub const SESSION_TOKEN: &str = "session-abc";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
pub struct Backend {
    pub requests: Mutex<Vec<Recorded>>,
    pub stream_connections: Mutex<HashMap<i64, usize>>,
    pub cast: Mutex<Option<i64>>,
}

impl Backend {
    fn record(&self, path: String, headers: &HeaderMap, body: String) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.requests.lock().unwrap().push(Recorded {
            path,
            authorization,
            body,
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

type Shared = Arc<Backend>;

pub async fn spawn_backend() -> (String, Shared) {
    let backend = Shared::default();

    let app = Router::new()
        .route(
            "/hp/:property_id/groups/:group_id/votings/:voting_id/stream",
            get(vote_stream),
        )
        .route("/public/votings/:voting_id/context", get(public_context))
        .route("/public/votings/validate", post(validate))
        .route("/public/voting-session", get(voting_info))
        .route("/public/voting-session/vote", post(cast_vote))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized", "details": "Unauthorized"})),
    )
        .into_response()
}

fn vote(id: i64, voting_id: i64, option_id: i64, label: &str) -> Event {
    Event::default().event("vote").data(
        json!({
            "id": id,
            "voting_id": voting_id,
            "hp_unit_id": 300 + id,
            "option_id": option_id,
            "option_text": label,
            "voted_at": "2026-03-01T10:15:00Z",
        })
        .to_string(),
    )
}

/// Voting 100 replays history and stays open. Voting 400 replays its votes
/// and then aborts the body mid-stream. Any other voting replays two votes and
/// closes cleanly. Each reconnect to 400 or the others adds one more vote.
async fn vote_stream(
    State(backend): State<Shared>,
    Path((property_id, group_id, voting_id)): Path<(i64, i64, i64)>,
    headers: HeaderMap,
) -> Response {
    backend.record(
        format!("/hp/{property_id}/groups/{group_id}/votings/{voting_id}/stream"),
        &headers,
        String::new(),
    );
    if !matches!(bearer(&headers), Some(STAFF_TOKEN) | Some(SESSION_TOKEN)) {
        return unauthorized();
    }

    let connection = {
        let mut connections = backend.stream_connections.lock().unwrap();
        let count = connections.entry(voting_id).or_default();
        *count += 1;
        *count
    };
    let cast = *backend.cast.lock().unwrap();

    let stream = async_stream::stream! {
        yield Ok::<_, io::Error>(Event::default()
            .event("connected")
            .data(json!({"voting_id": voting_id}).to_string()));

        if voting_id == 100 {
            yield Ok(vote(1, voting_id, 1, "Yes"));
            yield Ok(Event::default()
                .event("preload_complete")
                .data(json!({"total_votes": 50}).to_string()));
            yield Ok(vote(2, voting_id, 2, "No"));
            yield Ok(vote(1, voting_id, 1, "Yes"));
            yield Ok(Event::default().event("vote").data("{not json"));
            yield Ok(Event::default().event("heartbeat").data("{}"));
            if let Some(option_id) = cast {
                yield Ok(vote(3, voting_id, option_id, "Cast"));
            }
            futures::future::pending::<()>().await;
        } else if voting_id == 400 {
            for id in 20..20 + connection as i64 + 1 {
                yield Ok(vote(id, voting_id, 2, "No"));
            }
            // let the votes reach the client before the connection is cut
            tokio::time::sleep(Duration::from_millis(50)).await;
            yield Err(io::Error::new(io::ErrorKind::ConnectionReset, "backend went away"));
        } else {
            for id in 10..10 + connection as i64 + 1 {
                yield Ok(vote(id, voting_id, 1, "Yes"));
            }
        }
    };

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive"),
        )
        .into_response()
}

async fn public_context(
    State(backend): State<Shared>,
    Path(voting_id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record(
        format!("/public/votings/{voting_id}/context"),
        &headers,
        String::new(),
    );
    if voting_id != 100 || query.get("hp_id").map(String::as_str) != Some("42") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Voting not found"})),
        )
            .into_response();
    }
    Json(json!({
        "voting_title": "Facade painting",
        "hp_name": "Torres del Parque",
        "group_id": 7,
    }))
    .into_response()
}

async fn validate(State(backend): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    backend.record("/public/votings/validate".into(), &headers, body.to_string());
    let matches = body["token"] == PUBLIC_TOKEN
        && body["hp_id"] == 42
        && body["voting_id"] == 100
        && body["document"] == "1020304050";
    if !matches {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Resident could not be validated"})),
        )
            .into_response();
    }
    Json(json!({
        "token": SESSION_TOKEN,
        "resident_name": "Ana Ruiz",
        "unit": body["unit"],
    }))
    .into_response()
}

async fn voting_info(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    backend.record("/public/voting-session".into(), &headers, String::new());
    if bearer(&headers) != Some(SESSION_TOKEN) {
        return unauthorized();
    }

    let options = json!([
        {"id": 2, "text": "No", "code": "N", "order": 2},
        {"id": 1, "text": "Yes", "code": "Y", "order": 1},
    ]);
    let cast = *backend.cast.lock().unwrap();
    let body = match cast {
        Some(option_id) => json!({
            "voting": {"id": 100, "title": "Facade painting", "status": "open"},
            "options": options,
            "has_voted": true,
            "my_vote": {"option_id": option_id, "option_text": "Yes", "option_code": "Y"},
            "results": [{"option_id": option_id, "option_text": "Yes", "votes": 1}],
        }),
        None => json!({
            "voting": {"id": 100, "title": "Facade painting", "status": "open"},
            "options": options,
            "has_voted": false,
        }),
    };
    Json(body).into_response()
}

async fn cast_vote(State(backend): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    backend.record("/public/voting-session/vote".into(), &headers, body.to_string());
    if bearer(&headers) != Some(SESSION_TOKEN) {
        return unauthorized();
    }

    let mut cast = backend.cast.lock().unwrap();
    if cast.is_some() {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "User already voted on this poll",
                "details": "User already voted on this poll",
            })),
        )
            .into_response();
    }
    *cast = body["option_id"].as_i64();
    Json(json!({"success": true, "message": "Vote recorded successfully"})).into_response()
}

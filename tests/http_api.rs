use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use poll_backend::config::{Config, StoreBackend};
use poll_backend::poll::CounterPolicy;
use poll_backend::routes::create_routes;
use poll_backend::state::{AnyStore, AppState};
use poll_backend::store::memory::Operation;
use poll_backend::store::MemStore;

fn app(store: MemStore) -> Router {
    let config = Config {
        port: 0,
        backend: StoreBackend::Memory,
        counter_policy: CounterPolicy::ReadModifyWrite,
    };
    create_routes(AppState::with_store(config, AnyStore::Memory(store)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn poll_lifecycle_over_http() {
    let app = app(MemStore::new());

    let (status, poll) = send(
        &app,
        "POST",
        "/api/polls",
        Some(json!({
            "title": "Team lunch",
            "proposals": [{ "title": "Pizza" }, { "title": "Sushi" }],
            "admin_email": "admin@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(poll["status"], "VOTING");
    assert_eq!(poll["num_voters"], 0);

    let poll_id = poll["id"].as_str().unwrap();
    let vote_token = poll["vote_token"].as_str().unwrap();
    let admin_token = poll["admin_token"].as_str().unwrap();

    let (status, found) = send(&app, "GET", &format!("/api/vote/{vote_token}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let proposals = found["proposals"].as_array().unwrap();
    let titles: Vec<&str> = proposals.iter().map(|p| p["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Pizza", "Sushi"]);
    // Only id and title are exposed per proposal.
    assert!(proposals.iter().all(|p| p.as_object().unwrap().len() == 2));

    let (_, voter) = send(&app, "POST", "/api/voter-id", None).await;
    let voter_id = voter["voter_id"].as_str().unwrap();
    assert!(voter_id.starts_with("voter_"));

    let (status, voted) = send(&app, "GET", &format!("/api/polls/{poll_id}/voters/{voter_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voted["has_voted"], false);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/polls/{poll_id}/votes"),
        Some(json!({ "voter_id": voter_id, "vote_order": [1, 0] })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, voted) = send(&app, "GET", &format!("/api/polls/{poll_id}/voters/{voter_id}"), None).await;
    assert_eq!(voted["has_voted"], true);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/polls/{poll_id}/status"),
        Some(json!({ "status": "CLOSED" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, found) = send(&app, "GET", &format!("/api/admin/{admin_token}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["status"], "CLOSED");
    assert_eq!(found["num_voters"], 1);
}

#[tokio::test]
async fn unknown_token_is_404() {
    let app = app(MemStore::new());

    let (status, body) = send(&app, "GET", "/api/admin/does-not-exist", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Poll not found");
}

#[tokio::test]
async fn empty_title_is_rejected() {
    let app = app(MemStore::new());

    let (status, _) = send(
        &app,
        "POST",
        "/api/polls",
        Some(json!({ "title": "  ", "proposals": [], "admin_email": "a@example.com" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_failure_is_500() {
    let store = MemStore::new();
    store.fail(Operation::InsertPoll);
    let app = app(store);

    let (status, body) = send(
        &app,
        "POST",
        "/api/polls",
        Some(json!({ "title": "Lunch", "admin_email": "a@example.com" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Store write failed"));
}

#[tokio::test]
async fn duplicate_vote_is_409_with_unique_constraint() {
    let app = app(MemStore::new().with_unique_votes());

    let (_, poll) = send(
        &app,
        "POST",
        "/api/polls",
        Some(json!({ "title": "Lunch", "admin_email": "a@example.com" })),
    )
    .await;
    let uri = format!("/api/polls/{}/votes", poll["id"].as_str().unwrap());
    let vote = json!({ "voter_id": "voter_1", "vote_order": [] });

    let (first, _) = send(&app, "POST", &uri, Some(vote.clone())).await;
    let (second, _) = send(&app, "POST", &uri, Some(vote)).await;

    assert_eq!(first, StatusCode::NO_CONTENT);
    assert_eq!(second, StatusCode::CONFLICT);
}

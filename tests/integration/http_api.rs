//! Integration tests for the HTTP API.
//!
//! Starts the server in-process on an OS-assigned port and drives the
//! approval and shared completion scenarios over JSON requests.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use groupwork::{Engine, EngineConfig};
use groupwork_server::api::{self, AppState, USER_ID_HEADER};
use serde_json::{Value, json};

/// Running server plus a client bound to it.
struct TestServer {
    base: String,
    client: reqwest::Client,
    _handle: tokio::task::JoinHandle<()>,
}

async fn start_server() -> TestServer {
    let state = Arc::new(AppState::new(Engine::new(&EngineConfig::default())));
    let (addr, handle) = api::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start server");
    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _handle: handle,
    }
}

impl TestServer {
    async fn post(&self, path: &str, actor: Option<&str>, body: Value) -> (u16, Value) {
        let mut req = self.client.post(format!("{}{path}", self.base)).json(&body);
        if let Some(actor) = actor {
            req = req.header(USER_ID_HEADER, actor);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str, actor: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .header(USER_ID_HEADER, actor)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, actor: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(format!("{}{path}", self.base))
            .header(USER_ID_HEADER, actor)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn user(&self, name: &str) -> String {
        let (status, body) = self.post("/users", None, json!({ "username": name })).await;
        assert_eq!(status, 201);
        body["id"].as_str().unwrap().to_string()
    }
}

/// Leader, manager and two members in one group.
async fn make_guild(server: &TestServer) -> (String, String, String, String, String) {
    let leader = server.user("leader").await;
    let manager = server.user("manager").await;
    let alice = server.user("alice").await;
    let bob = server.user("bob").await;

    let (status, group) = server
        .post("/groups", Some(&leader), json!({ "name": "Test Guild" }))
        .await;
    assert_eq!(status, 201);
    let group_id = group["id"].as_str().unwrap().to_string();

    for member in [&manager, &alice, &bob] {
        let (status, _) = server
            .post(
                &format!("/groups/{group_id}/members"),
                Some(&leader),
                json!({ "userId": member }),
            )
            .await;
        assert_eq!(status, 200);
    }
    let (status, _) = server
        .post(
            &format!("/groups/{group_id}/add-manager"),
            Some(&leader),
            json!({ "managerId": manager }),
        )
        .await;
    assert_eq!(status, 200);

    (leader, manager, alice, bob, group_id)
}

#[tokio::test]
async fn approval_scenario_over_http() {
    let server = start_server().await;
    let (leader, manager, alice, _, group_id) = make_guild(&server).await;

    let (status, task) = server
        .post(
            &format!("/tasks/group/{group_id}"),
            Some(&leader),
            json!({ "text": "approve me", "type": "todo", "requiresApproval": true }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(task["approval"]["required"], true);
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, copy) = server
        .post(&format!("/tasks/{task_id}/assign/{alice}"), Some(&leader), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(copy["group"]["taskId"], task_id.as_str());
    let copy_id = copy["id"].as_str().unwrap().to_string();

    let (status, err) = server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;
    assert_eq!(status, 401);
    assert_eq!(err["code"], 401);
    assert_eq!(err["error"], "NotAuthorized");
    assert_eq!(err["message"], "Approval has been requested");

    let (_, notifications) = server.get("/user/notifications", &manager).await;
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "GROUP_TASK_APPROVAL");
    assert_eq!(notifications[0]["data"]["taskId"], copy_id.as_str());
    assert_eq!(notifications[0]["data"]["groupTaskId"], task_id.as_str());
    assert_eq!(notifications[0]["data"]["groupId"], group_id.as_str());

    let (status, err) = server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;
    assert_eq!(status, 401);
    assert_ne!(err["message"], "Approval has been requested");
    let (_, notifications) = server.get("/user/notifications", &manager).await;
    assert_eq!(notifications.as_array().unwrap().len(), 1);

    let (status, approved) = server
        .post(&format!("/tasks/{task_id}/approve/{alice}"), Some(&manager), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(approved["group"]["approval"]["approved"], true);

    let (status, scored) = server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(scored["completed"], true);
    assert!(scored["dateCompleted"].is_string());

    let (status, read) = server.post("/user/notifications/read", Some(&alice), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(read[0]["type"], "GROUP_TASK_APPROVED");
    let (_, after) = server.get("/user/notifications", &alice).await;
    assert!(after.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn single_completion_over_http() {
    let server = start_server().await;
    let (leader, _, alice, bob, group_id) = make_guild(&server).await;

    let (_, task) = server
        .post(
            &format!("/tasks/group/{group_id}"),
            Some(&leader),
            json!({ "text": "first wins", "sharedCompletion": "singleCompletion" }),
        )
        .await;
    let task_id = task["id"].as_str().unwrap().to_string();
    let (_, copy) = server
        .post(&format!("/tasks/{task_id}/assign/{alice}"), Some(&leader), json!({}))
        .await;
    server
        .post(&format!("/tasks/{task_id}/assign/{bob}"), Some(&leader), json!({}))
        .await;

    let copy_id = copy["id"].as_str().unwrap();
    let (status, _) = server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;
    assert_eq!(status, 200);

    let (_, bob_tasks) = server.get("/tasks/user", &bob).await;
    assert!(bob_tasks.as_array().unwrap().is_empty());

    let (status, master) = server.get(&format!("/tasks/{task_id}"), &leader).await;
    assert_eq!(status, 200);
    assert_eq!(master["completed"], true);

    let (_, completed) = server
        .get(&format!("/tasks/group/{group_id}?type=completedTodos"), &leader)
        .await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_user_header_is_rejected() {
    let server = start_server().await;
    let (status, err) = server.post("/groups", None, json!({ "name": "x" })).await;
    assert_eq!(status, 401);
    assert_eq!(err["error"], "NotAuthorized");
    assert_eq!(err["message"], "Missing authentication headers.");
}

#[tokio::test]
async fn malformed_ids_and_directions_are_bad_requests() {
    let server = start_server().await;
    let alice = server.user("alice").await;

    let (status, err) = server
        .post("/tasks/not-a-uuid/score/up", Some(&alice), json!({}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "BadRequest");

    let id = uuid::Uuid::now_v7();
    let (status, _) = server
        .post(&format!("/tasks/{id}/score/sideways"), Some(&alice), json!({}))
        .await;
    assert_eq!(status, 400);

    let (status, err) = server.get(&format!("/tasks/{id}"), &alice).await;
    assert_eq!(status, 404);
    assert_eq!(err["error"], "NotFound");
}

#[tokio::test]
async fn members_cannot_create_tasks_over_http() {
    let server = start_server().await;
    let (_, _, alice, _, group_id) = make_guild(&server).await;
    let (status, err) = server
        .post(
            &format!("/tasks/group/{group_id}"),
            Some(&alice),
            json!({ "text": "sneaky" }),
        )
        .await;
    assert_eq!(status, 401);
    assert_eq!(err["message"], "Not authorized to manage tasks!");
}

#[tokio::test]
async fn locale_is_validated_and_changeable() {
    let server = start_server().await;
    let (status, err) = server
        .post("/users", None, json!({ "username": "zed", "locale": "xx" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "BadRequest");

    let (leader, _, alice, _, group_id) = make_guild(&server).await;
    let (status, profile) = server.put("/user", &leader, json!({ "locale": "cs" })).await;
    assert_eq!(status, 200);
    assert_eq!(profile["locale"], "cs");
    let (status, _) = server.put("/user", &leader, json!({ "locale": "de" })).await;
    assert_eq!(status, 400);

    let (_, task) = server
        .post(
            &format!("/tasks/group/{group_id}"),
            Some(&leader),
            json!({ "text": "uklid", "requiresApproval": true }),
        )
        .await;
    let task_id = task["id"].as_str().unwrap().to_string();
    let (_, copy) = server
        .post(&format!("/tasks/{task_id}/assign/{alice}"), Some(&leader), json!({}))
        .await;
    let copy_id = copy["id"].as_str().unwrap().to_string();
    server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;

    let (_, notifications) = server.get("/user/notifications", &leader).await;
    let message = notifications[0]["data"]["message"].as_str().unwrap();
    assert!(message.starts_with("alice žádá o schválení"));
}

#[tokio::test]
async fn live_stream_pushes_new_notifications() {
    let server = start_server().await;
    let (leader, _, alice, _, group_id) = make_guild(&server).await;

    let mut stream = server
        .client
        .get(format!("{}/user/notifications/stream", server.base))
        .header(USER_ID_HEADER, &leader)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status().as_u16(), 200);

    let (_, task) = server
        .post(
            &format!("/tasks/group/{group_id}"),
            Some(&leader),
            json!({ "text": "approve me", "requiresApproval": true }),
        )
        .await;
    let task_id = task["id"].as_str().unwrap().to_string();
    let (_, copy) = server
        .post(&format!("/tasks/{task_id}/assign/{alice}"), Some(&leader), json!({}))
        .await;
    let copy_id = copy["id"].as_str().unwrap().to_string();
    server
        .post(&format!("/tasks/{copy_id}/score/up"), Some(&alice), json!({}))
        .await;

    let mut received = String::new();
    while !(received.contains("event: notification") && received.ends_with("\n\n")) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("no live event within timeout")
            .unwrap()
            .expect("stream closed");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: notification"));
    assert!(received.contains("GROUP_TASK_APPROVAL"));
    assert!(received.contains(&copy_id));

    // Streaming does not consume the inbox.
    let (_, pending) = server.get("/user/notifications", &leader).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

//! `SessionController<HttpBackend>` against the real router on a local port.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::net::TcpListener;
use uuid::Uuid;

use solace_api::responder::{Responder, ResponderError, Turn};
use solace_api::{AppStateInner, router};
use solace_client::{ChatBackend, ClientError, Delivery, HttpBackend, SessionController};
use solace_db::Database;
use solace_types::models::{DEFAULT_CHAT_TITLE, Role};

/// Answers "echo: <last message>", or fails when the message says so.
struct EchoResponder;

impl Responder for EchoResponder {
    fn respond<'a>(&'a self, turns: &'a [Turn]) -> BoxFuture<'a, Result<String, ResponderError>> {
        let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
        Box::pin(async move {
            if last == "fail" {
                Err(ResponderError::Status { status: 503, body: "overloaded".into() })
            } else {
                Ok(format!("echo: {last}"))
            }
        })
    }
}

/// Serve a fresh app on an ephemeral port and return its base URL.
async fn serve() -> String {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let state = AppStateInner::new(db, "test-secret".into(), Arc::new(EchoResponder));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn signed_in(base_url: &str) -> SessionController<HttpBackend> {
    let mut client = SessionController::new(HttpBackend::new(base_url));
    client.register("Ada", "ada@example.com", "hunter22").await.unwrap();
    client.login("ada@example.com", "hunter22").await.unwrap();
    client
}

async fn server_chat_ids(client: &SessionController<HttpBackend>) -> Vec<Uuid> {
    let token = &client.session().unwrap().token;
    client
        .backend()
        .list_chats(token)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect()
}

#[tokio::test]
async fn bad_login_surfaces_server_message() {
    let base_url = serve().await;
    let mut client = signed_in(&base_url).await;
    client.logout();

    let err = client.login("ada@example.com", "wrong").await.unwrap_err();
    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.auth_error(), Some("Invalid credentials"));
    assert!(client.session().is_none());

    let err = client.register("Ada", "ada@example.com", "again").await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Email already exists");
}

#[tokio::test]
async fn session_round_trip_over_http() {
    let base_url = serve().await;
    let mut client = signed_in(&base_url).await;
    assert_eq!(client.session().unwrap().user.email, "ada@example.com");

    client.fetch_chats().await.unwrap();
    assert!(client.store().threads().is_empty());

    // Opening a second new chat deletes the untouched first one.
    let abandoned = client.new_chat().await.unwrap();
    let active = client.new_chat().await.unwrap();
    assert_eq!(server_chat_ids(&client).await, vec![active]);
    assert!(client.store().thread(abandoned).is_none());

    client.send_message("I feel anxious about work deadlines today").await.unwrap();
    let thread = client.store().current().unwrap();
    assert_eq!(thread.chat.title, "I feel anxious about work");
    let shown: Vec<(Role, &str, Delivery)> = thread
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str(), m.delivery))
        .collect();
    assert_eq!(
        shown,
        vec![
            (Role::User, "I feel anxious about work deadlines today", Delivery::Confirmed),
            (Role::Ai, "echo: I feel anxious about work deadlines today", Delivery::Confirmed),
        ]
    );

    // Leaving an empty chat for a non-empty one deletes only the empty one.
    let empty = client.new_chat().await.unwrap();
    assert_eq!(client.store().current().unwrap().chat.title, DEFAULT_CHAT_TITLE);
    client.select_chat(active).await.unwrap();
    assert_eq!(server_chat_ids(&client).await, vec![active]);
    assert!(client.store().thread(empty).is_none());
    assert_eq!(client.store().current_id(), Some(active));

    // A second client with the same token sees the persisted history.
    let token = client.session().unwrap().token.clone();
    let mut other = SessionController::new(HttpBackend::new(&base_url));
    other.resume(token).await.unwrap();
    other.fetch_chats().await.unwrap();
    let thread = other.store().current().unwrap();
    assert_eq!(thread.chat.id, active);
    assert_eq!(thread.chat.last_message, "I feel anxious about work deadlines today");
    let roles: Vec<Role> = thread.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Ai]);
}

#[tokio::test]
async fn failed_send_and_missing_chat_over_http() {
    let base_url = serve().await;
    let mut client = signed_in(&base_url).await;
    let chat_id = client.new_chat().await.unwrap();

    let err = client.send_message("fail").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    let thread = client.store().current().unwrap();
    assert_eq!(thread.messages.len(), 1);
    assert_eq!(thread.messages[0].delivery, Delivery::Failed);
    assert_eq!(client.store().error(), Some("Failed to send message"));

    let token = client.session().unwrap().token.clone();
    client.backend().delete_chat(&token, chat_id).await.unwrap();
    match client.backend().delete_chat(&token, chat_id).await {
        Err(ClientError::Status { status: 404, message }) => assert_eq!(message, "Chat not found"),
        other => panic!("unexpected result: {other:?}"),
    }

    match client.backend().list_chats("not-a-token").await {
        Err(ClientError::Status { status: 401, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

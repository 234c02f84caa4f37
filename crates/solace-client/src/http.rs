use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use solace_types::api::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SendMessageRequest,
    SendMessageResponse, StatusMessage,
};
use solace_types::models::{Chat, Message, User};

use crate::backend::{ChatBackend, ClientError};

/// `ChatBackend` over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await?;
        check(resp).await?.json().await.map_err(ClientError::from)
    }
}

/// Turn an error status into `ClientError::Status`, keeping the server's
/// `{"message": ...}` when it sent one.
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatusMessage>(&body)
        .map(|m| m.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    debug!(status = status.as_u16(), %message, "Request rejected");

    Err(ClientError::Status { status: status.as_u16(), message })
}

impl ChatBackend for HttpBackend {
    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        self.send(self.http.post(self.url("/auth/register")).json(req)).await
    }

    async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.send(self.http.post(self.url("/auth/login")).json(req)).await
    }

    async fn me(&self, token: &str) -> Result<User, ClientError> {
        self.send(self.http.get(self.url("/auth/me")).bearer_auth(token)).await
    }

    async fn list_chats(&self, token: &str) -> Result<Vec<Chat>, ClientError> {
        self.send(self.http.get(self.url("/chats")).bearer_auth(token)).await
    }

    async fn create_chat(&self, token: &str) -> Result<Chat, ClientError> {
        self.send(self.http.post(self.url("/chats")).bearer_auth(token)).await
    }

    async fn list_messages(&self, token: &str, chat_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.send(
            self.http
                .get(self.url(&format!("/chats/{}/messages", chat_id)))
                .bearer_auth(token),
        )
        .await
    }

    async fn send_message(
        &self,
        token: &str,
        chat_id: Uuid,
        content: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let body = SendMessageRequest { content: content.to_string() };
        self.send(
            self.http
                .post(self.url(&format!("/chats/{}/message", chat_id)))
                .bearer_auth(token)
                .json(&body),
        )
        .await
    }

    async fn delete_chat(&self, token: &str, chat_id: Uuid) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/chats/{}", chat_id)))
            .bearer_auth(token)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

use std::future::Future;

use uuid::Uuid;

use solace_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SendMessageResponse};
use solace_types::models::{Chat, Message, User};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response; `message` is the server's own wording.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("no chat is open")]
    NoActiveChat,

    #[error("unknown chat {0}")]
    UnknownChat(Uuid),

    #[error("message is empty")]
    EmptyMessage,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// The server's REST surface as seen by the client.
///
/// Methods that need a session take the bearer token explicitly; the
/// backend itself holds no login state.
pub trait ChatBackend: Send + Sync {
    fn register(
        &self,
        req: &RegisterRequest,
    ) -> impl Future<Output = Result<RegisterResponse, ClientError>> + Send;

    fn login(&self, req: &LoginRequest) -> impl Future<Output = Result<LoginResponse, ClientError>> + Send;

    fn me(&self, token: &str) -> impl Future<Output = Result<User, ClientError>> + Send;

    fn list_chats(&self, token: &str) -> impl Future<Output = Result<Vec<Chat>, ClientError>> + Send;

    fn create_chat(&self, token: &str) -> impl Future<Output = Result<Chat, ClientError>> + Send;

    fn list_messages(
        &self,
        token: &str,
        chat_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Message>, ClientError>> + Send;

    fn send_message(
        &self,
        token: &str,
        chat_id: Uuid,
        content: &str,
    ) -> impl Future<Output = Result<SendMessageResponse, ClientError>> + Send;

    fn delete_chat(&self, token: &str, chat_id: Uuid) -> impl Future<Output = Result<(), ClientError>> + Send;
}

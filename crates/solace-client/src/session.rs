use tracing::{debug, warn};
use uuid::Uuid;

use solace_types::api::{LoginRequest, RegisterRequest, RegisterResponse};
use solace_types::models::User;

use crate::backend::{ChatBackend, ClientError};
use crate::store::ChatStore;

/// A signed-in user and the bearer token that proves it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Root controller for one client: auth state plus the chat store that
/// only exists while signed in.
pub struct SessionController<B: ChatBackend> {
    backend: B,
    session: Option<AuthSession>,
    store: ChatStore,
    auth_error: Option<String>,
}

impl<B: ChatBackend> SessionController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session: None,
            store: ChatStore::default(),
            auth_error: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(ClientError::NotAuthenticated)
    }

    // -- Auth --

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, ClientError> {
        self.auth_error = None;
        let req = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.backend.register(&req).await.inspect_err(|e| {
            self.auth_error = Some(server_message(e, "Registration failed"));
        })
    }

    /// Sign in and load the profile. Any earlier chat state is discarded.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&AuthSession, ClientError> {
        self.auth_error = None;
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token = match self.backend.login(&req).await {
            Ok(resp) => resp.token,
            Err(e) => {
                self.auth_error = Some(server_message(&e, "Login failed"));
                return Err(e);
            }
        };
        self.resume(token).await
    }

    /// Start a session from a token kept from an earlier run. A token the
    /// server no longer accepts leaves the controller signed out.
    pub async fn resume(&mut self, token: String) -> Result<&AuthSession, ClientError> {
        self.store.reset();
        match self.backend.me(&token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Session started");
                Ok(self.session.insert(AuthSession { token, user }))
            }
            Err(e) => {
                self.session = None;
                self.auth_error = Some(server_message(&e, "Login failed"));
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.store.reset();
        self.session = None;
        self.auth_error = None;
    }

    // -- Chats --

    /// Load the chat list. With nothing open yet, open the most recent chat.
    pub async fn fetch_chats(&mut self) -> Result<(), ClientError> {
        let token = self.token()?;
        self.store.clear_error();

        let chats = match self.backend.list_chats(&token).await {
            Ok(chats) => chats,
            Err(e) => {
                self.store.set_error(server_message(&e, "Failed to fetch chats"));
                return Err(e);
            }
        };
        self.store.set_chats(chats);

        if self.store.current_id().is_none() {
            if let Some(first) = self.store.threads().first().map(|t| t.chat.id) {
                self.store.select(first);
                self.load_messages(&token, first).await?;
            }
        }
        Ok(())
    }

    /// Create a chat on the server and open it.
    pub async fn new_chat(&mut self) -> Result<Uuid, ClientError> {
        let token = self.token()?;
        self.store.clear_error();
        self.discard_empty_current(&token).await;

        match self.backend.create_chat(&token).await {
            Ok(chat) => {
                let id = chat.id;
                self.store.push_front(chat);
                self.store.select(id);
                Ok(id)
            }
            Err(e) => {
                self.store.set_error(server_message(&e, "Failed to create chat"));
                Err(e)
            }
        }
    }

    /// Open another chat. An empty chat being left is deleted first; the
    /// target's history is fetched unless already cached.
    pub async fn select_chat(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        let token = self.token()?;
        if self.store.current_id() == Some(chat_id) {
            return Ok(());
        }
        if self.store.thread(chat_id).is_none() {
            return Err(ClientError::UnknownChat(chat_id));
        }
        self.store.clear_error();

        self.discard_empty_current(&token).await;
        self.store.select(chat_id);

        let cached = self.store.thread(chat_id).is_some_and(|t| t.loaded);
        if !cached {
            self.load_messages(&token, chat_id).await?;
        }
        Ok(())
    }

    /// Send a message in the open chat with an optimistic local echo.
    pub async fn send_message(&mut self, content: &str) -> Result<(), ClientError> {
        let token = self.token()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let chat_id = self.store.current_id().ok_or(ClientError::NoActiveChat)?;
        self.store.clear_error();

        let local_id = self
            .store
            .begin_send(chat_id, content)
            .ok_or(ClientError::NoActiveChat)?;

        match self.backend.send_message(&token, chat_id, content).await {
            Ok(resp) => {
                self.store.confirm_send(chat_id, local_id, resp);
                Ok(())
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Message send failed");
                self.store.fail_send(chat_id, local_id);
                self.store.set_error("Failed to send message");
                Err(e)
            }
        }
    }

    async fn load_messages(&mut self, token: &str, chat_id: Uuid) -> Result<(), ClientError> {
        match self.backend.list_messages(token, chat_id).await {
            Ok(messages) => {
                self.store.set_messages(chat_id, messages);
                Ok(())
            }
            Err(e) => {
                self.store.set_error("Failed to load chat messages");
                Err(e)
            }
        }
    }

    /// Delete the open chat on the server if it has no messages. Failure is
    /// recorded on the store and otherwise ignored.
    async fn discard_empty_current(&mut self, token: &str) {
        let Some(current) = self.store.current().filter(|t| t.is_empty()).map(|t| t.chat.id) else {
            return;
        };

        match self.backend.delete_chat(token, current).await {
            Ok(()) => {
                debug!(chat_id = %current, "Discarded empty chat");
                self.store.remove(current);
            }
            Err(e) => {
                warn!(chat_id = %current, error = %e, "Failed to delete empty chat");
                self.store.set_error("Failed to delete empty chat");
            }
        }
    }
}

/// The server's message for a rejected request, or `fallback`.
fn server_message(err: &ClientError, fallback: &str) -> String {
    match err {
        ClientError::Status { message, .. } if !message.is_empty() => message.clone(),
        _ => fallback.to_string(),
    }
}

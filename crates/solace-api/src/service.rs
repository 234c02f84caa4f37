//! Chat service: thread lifecycle and the message exchange with the
//! conversation responder.
//!
//! Every operation is scoped to one authenticated user. A chat that does not
//! exist and a chat owned by somebody else are indistinguishable to the
//! caller; both come back as `NotFound`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use solace_db::Database;
use solace_types::api::SendMessageResponse;
use solace_types::models::{Chat, DEFAULT_CHAT_TITLE, Message, Role};

use crate::error::ApiError;
use crate::responder::{Responder, Turn, TurnRole};

/// How many earlier messages accompany a new message to the responder.
pub const CONTEXT_WINDOW: u32 = 10;

/// Number of leading words of the first message used as a chat title.
pub const TITLE_WORDS: usize = 5;

/// Shown when the responder answers with nothing.
pub const FALLBACK_REPLY: &str = "I'm here to listen and support you.";

pub const SYSTEM_PROMPT: &str = "\
You are an empathetic AI psychologist. Your goal is to provide friendly, supportive, and conversational responses to users.
You listen carefully, respond with understanding, and offer helpful guidance when appropriate.
Always maintain a warm and encouraging tone.
Do not give medical diagnoses or prescribe treatments.
Keep your advice practical, emotionally supportive, and easy to understand.
Engage the user naturally, ask clarifying questions if needed, and make them feel heard and respected.";

/// First `TITLE_WORDS` whitespace-separated words of `content`, or `None`
/// when there are no words at all.
pub fn derive_title(content: &str) -> Option<String> {
    let words: Vec<&str> = content.split_whitespace().take(TITLE_WORDS).collect();
    (!words.is_empty()).then(|| words.join(" "))
}

/// Prompt sequence for one exchange: persona, prior window, new message.
pub fn build_prompt(window: &[Message], content: &str) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(window.len() + 2);
    turns.push(Turn::new(TurnRole::System, SYSTEM_PROMPT));
    turns.extend(window.iter().map(|m| {
        let role = match m.role {
            Role::User => TurnRole::User,
            Role::Ai => TurnRole::Assistant,
        };
        Turn::new(role, m.content.clone())
    }));
    turns.push(Turn::new(TurnRole::User, content));
    turns
}

/// Run SQLite or password-hashing work on the blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
}

pub struct ChatService {
    db: Arc<Database>,
    responder: Arc<dyn Responder>,
}

impl ChatService {
    pub fn new(db: Arc<Database>, responder: Arc<dyn Responder>) -> Self {
        Self { db, responder }
    }

    /// Run a blocking query off the async runtime.
    async fn db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        blocking(move || Ok(f(&db)?)).await
    }

    pub async fn list_chats(&self, user_id: Uuid) -> Result<Vec<Chat>, ApiError> {
        self.db(move |db| db.list_chats(&user_id)).await
    }

    pub async fn create_chat(&self, user_id: Uuid) -> Result<Chat, ApiError> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id,
            title: DEFAULT_CHAT_TITLE.to_string(),
            last_message: String::new(),
            created_at: now,
            updated_at: now,
        };

        let stored = chat.clone();
        self.db(move |db| db.insert_chat(&stored)).await?;

        info!(chat_id = %chat.id, user_id = %user_id, "Chat created");
        Ok(chat)
    }

    async fn owned_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<Chat, ApiError> {
        self.db(move |db| db.get_chat(&chat_id, &user_id))
            .await?
            .ok_or(ApiError::NotFound("Chat"))
    }

    pub async fn list_messages(&self, chat_id: Uuid, user_id: Uuid) -> Result<Vec<Message>, ApiError> {
        self.owned_chat(chat_id, user_id).await?;
        self.db(move |db| db.get_messages(&chat_id, &user_id)).await
    }

    /// Store the user's message, ask the responder for a reply, and store
    /// that too.
    ///
    /// If the responder fails the user's message stays stored without a
    /// reply, and the error is returned as `ApiError::Upstream`.
    pub async fn post_message(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<SendMessageResponse, ApiError> {
        if content.trim().is_empty() {
            return Err(ApiError::Validation("Message content is required".into()));
        }

        let chat = self.owned_chat(chat_id, user_id).await?;

        let mut title = chat.title.clone();
        if chat.has_default_title() {
            if let Some(derived) = derive_title(&content) {
                let t = derived.clone();
                self.db(move |db| db.set_chat_title(&chat_id, &user_id, &t)).await?;
                info!(chat_id = %chat_id, title = %derived, "Chat titled from first message");
                title = derived;
            }
        }

        let user_message = Message {
            id: Uuid::new_v4(),
            chat_id,
            user_id,
            role: Role::User,
            content: content.clone(),
            timestamp: Utc::now(),
        };
        let user_message_id = user_message.id;
        self.db(move |db| db.insert_message(&user_message)).await?;

        let window = self
            .db(move |db| db.get_recent_messages(&chat_id, &user_id, CONTEXT_WINDOW, &user_message_id))
            .await?;
        let prompt = build_prompt(&window, &content);

        let reply = match self.responder.respond(&prompt).await {
            Ok(text) if text.trim().is_empty() => FALLBACK_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Responder failed; user message left without reply");
                return Err(ApiError::Upstream(e));
            }
        };

        let ai_message = Message {
            id: Uuid::new_v4(),
            chat_id,
            user_id,
            role: Role::Ai,
            content: reply.clone(),
            timestamp: Utc::now(),
        };
        let updated_at = ai_message.timestamp;
        self.db(move |db| {
            db.insert_message(&ai_message)?;
            db.touch_chat(&chat_id, &user_id, &content, updated_at)?;
            Ok(())
        })
        .await?;

        Ok(SendMessageResponse { reply, updated_title: title })
    }

    /// Delete a chat, then sweep its messages. A failed sweep is logged
    /// and does not bring the chat back.
    pub async fn delete_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let deleted = self.db(move |db| db.delete_chat(&chat_id, &user_id)).await?;
        if !deleted {
            return Err(ApiError::NotFound("Chat"));
        }

        match self.db(move |db| db.delete_messages_for_chat(&chat_id)).await {
            Ok(removed) => info!(chat_id = %chat_id, messages = removed, "Chat deleted"),
            Err(e) => warn!(chat_id = %chat_id, error = %e, "Chat deleted but its messages were not"),
        }
        Ok(())
    }
}

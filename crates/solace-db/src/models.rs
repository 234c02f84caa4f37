//! Database row types. These map directly to SQLite rows and are kept
//! apart from the solace-types models so the schema can move on its own.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use solace_types::models::{Chat, Message, User};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct ChatRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub last_message: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("corrupt {} '{}'", what, raw))
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id, "user id")?,
            name: self.name,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl ChatRow {
    pub fn into_chat(self) -> Result<Chat> {
        Ok(Chat {
            id: parse_id(&self.id, "chat id")?,
            user_id: parse_id(&self.user_id, "chat owner")?,
            title: self.title,
            last_message: self.last_message,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id, "message id")?,
            chat_id: parse_id(&self.chat_id, "message chat_id")?,
            user_id: parse_id(&self.user_id, "message user_id")?,
            role: self.role.parse().map_err(anyhow::Error::msg)?,
            content: self.content,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

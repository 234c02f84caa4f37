//! Local chat state: the chat list, cached threads, and the open thread.
//!
//! The store only mutates memory. Network calls live in
//! [`crate::session::SessionController`], which drives these methods
//! before and after each request.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use solace_types::api::SendMessageResponse;
use solace_types::models::{Chat, Message, Role};

/// Where a locally shown message stands with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Shown optimistically; the request has not come back yet.
    Pending,
    Confirmed,
    /// The request failed. The message stays visible.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    /// Client-side handle; equals the server id for fetched messages.
    pub local_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub delivery: Delivery,
}

impl From<Message> for LocalMessage {
    fn from(m: Message) -> Self {
        Self {
            local_id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.timestamp,
            delivery: Delivery::Confirmed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub chat: Chat,
    pub messages: Vec<LocalMessage>,
    /// Whether `messages` reflects the server's history.
    pub loaded: bool,
}

impl Thread {
    fn new(chat: Chat, loaded: bool) -> Self {
        Self { chat, messages: Vec::new(), loaded }
    }

    /// Known to have no messages at all. An unloaded thread is never
    /// considered empty.
    pub fn is_empty(&self) -> bool {
        self.loaded && self.messages.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ChatStore {
    threads: Vec<Thread>,
    current: Option<Uuid>,
    error: Option<String>,
}

impl ChatStore {
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, chat_id: Uuid) -> Option<&Thread> {
        self.threads.iter().find(|t| t.chat.id == chat_id)
    }

    fn thread_mut(&mut self, chat_id: Uuid) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.chat.id == chat_id)
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.current
    }

    pub fn current(&self) -> Option<&Thread> {
        self.current.and_then(|id| self.thread(id))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Replace the chat list with the server's, keeping cached messages of
    /// chats that are still present.
    pub fn set_chats(&mut self, chats: Vec<Chat>) {
        let mut old = std::mem::take(&mut self.threads);
        self.threads = chats
            .into_iter()
            .map(|chat| match old.iter().position(|t| t.chat.id == chat.id) {
                Some(i) => {
                    let mut thread = old.swap_remove(i);
                    thread.chat = chat;
                    thread
                }
                None => Thread::new(chat, false),
            })
            .collect();

        if self.current.is_some_and(|id| self.thread(id).is_none()) {
            self.current = None;
        }
    }

    /// Add a freshly created chat at the top. It is known to be empty.
    pub fn push_front(&mut self, chat: Chat) {
        self.threads.insert(0, Thread::new(chat, true));
    }

    pub fn remove(&mut self, chat_id: Uuid) {
        self.threads.retain(|t| t.chat.id != chat_id);
        if self.current == Some(chat_id) {
            self.current = None;
        }
    }

    /// Make `chat_id` the open thread. Returns false if it is not listed.
    pub fn select(&mut self, chat_id: Uuid) -> bool {
        if self.thread(chat_id).is_none() {
            return false;
        }
        self.current = Some(chat_id);
        true
    }

    pub fn set_messages(&mut self, chat_id: Uuid, messages: Vec<Message>) {
        if let Some(thread) = self.thread_mut(chat_id) {
            thread.messages = messages.into_iter().map(LocalMessage::from).collect();
            thread.loaded = true;
        }
    }

    /// Show the user's message right away as `Pending`. Returns its local
    /// id, or `None` if the chat is not listed.
    pub fn begin_send(&mut self, chat_id: Uuid, content: &str) -> Option<Uuid> {
        let thread = self.thread_mut(chat_id)?;
        let local_id = Uuid::new_v4();
        thread.messages.push(LocalMessage {
            local_id,
            role: Role::User,
            content: content.to_string(),
            created_at: Utc::now(),
            delivery: Delivery::Pending,
        });
        Some(local_id)
    }

    /// Settle a pending message with the server's reply: confirm it, append
    /// the reply, adopt a derived title, and move the chat to the top.
    pub fn confirm_send(&mut self, chat_id: Uuid, local_id: Uuid, resp: SendMessageResponse) {
        let Some(pos) = self.threads.iter().position(|t| t.chat.id == chat_id) else {
            return;
        };
        let mut thread = self.threads.remove(pos);
        let now = Utc::now();

        let mut sent = None;
        if let Some(m) = thread.messages.iter_mut().find(|m| m.local_id == local_id) {
            m.delivery = Delivery::Confirmed;
            sent = Some(m.content.clone());
        }
        thread.messages.push(LocalMessage {
            local_id: Uuid::new_v4(),
            role: Role::Ai,
            content: resp.reply,
            created_at: now,
            delivery: Delivery::Confirmed,
        });

        if thread.chat.has_default_title() && !resp.updated_title.is_empty() {
            thread.chat.title = resp.updated_title;
        }
        if let Some(content) = sent {
            thread.chat.last_message = content;
        }
        thread.chat.updated_at = now;

        self.threads.insert(0, thread);
    }

    /// Keep the optimistic message but mark it failed.
    pub fn fail_send(&mut self, chat_id: Uuid, local_id: Uuid) {
        if let Some(m) = self
            .thread_mut(chat_id)
            .and_then(|t| t.messages.iter_mut().find(|m| m.local_id == local_id))
        {
            m.delivery = Delivery::Failed;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_types::models::DEFAULT_CHAT_TITLE;

    fn chat(title: &str) -> Chat {
        let now = Utc::now();
        Chat {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: title.to_string(),
            last_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unloaded_thread_is_not_empty() {
        let mut store = ChatStore::default();
        let c = chat(DEFAULT_CHAT_TITLE);
        store.set_chats(vec![c.clone()]);
        assert!(!store.thread(c.id).unwrap().is_empty());

        store.set_messages(c.id, vec![]);
        assert!(store.thread(c.id).unwrap().is_empty());
    }

    #[test]
    fn optimistic_send_confirms_and_moves_chat_to_top() {
        let mut store = ChatStore::default();
        let older = chat("Older");
        let fresh = chat(DEFAULT_CHAT_TITLE);
        store.set_chats(vec![older.clone()]);
        store.push_front(fresh.clone());
        store.set_chats(vec![older.clone(), fresh.clone()]);
        assert_eq!(store.threads()[0].chat.id, older.id);

        let local = store.begin_send(fresh.id, "hello there").unwrap();
        let pending = &store.thread(fresh.id).unwrap().messages[0];
        assert_eq!(pending.delivery, Delivery::Pending);
        assert!(!store.thread(fresh.id).unwrap().is_empty());

        store.confirm_send(
            fresh.id,
            local,
            SendMessageResponse { reply: "hi".into(), updated_title: "hello there".into() },
        );

        let thread = &store.threads()[0];
        assert_eq!(thread.chat.id, fresh.id);
        assert_eq!(thread.chat.title, "hello there");
        assert_eq!(thread.chat.last_message, "hello there");
        let states: Vec<(Role, Delivery)> = thread.messages.iter().map(|m| (m.role, m.delivery)).collect();
        assert_eq!(states, vec![(Role::User, Delivery::Confirmed), (Role::Ai, Delivery::Confirmed)]);
    }

    #[test]
    fn custom_title_is_not_overwritten() {
        let mut store = ChatStore::default();
        let c = chat("Work stress");
        store.push_front(c.clone());
        let local = store.begin_send(c.id, "again").unwrap();
        store.confirm_send(c.id, local, SendMessageResponse { reply: "ok".into(), updated_title: "again".into() });
        assert_eq!(store.thread(c.id).unwrap().chat.title, "Work stress");
    }

    #[test]
    fn failed_send_keeps_message() {
        let mut store = ChatStore::default();
        let c = chat(DEFAULT_CHAT_TITLE);
        store.push_front(c.clone());
        let local = store.begin_send(c.id, "hello").unwrap();
        store.fail_send(c.id, local);

        let messages = &store.thread(c.id).unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].delivery, Delivery::Failed);
        assert_eq!(store.thread(c.id).unwrap().chat.title, DEFAULT_CHAT_TITLE);
    }

    #[test]
    fn refreshing_list_keeps_cache_and_drops_vanished_current() {
        let mut store = ChatStore::default();
        let a = chat("A");
        let b = chat("B");
        store.set_chats(vec![a.clone(), b.clone()]);
        store.set_messages(a.id, vec![]);
        assert!(store.select(b.id));

        store.set_chats(vec![a.clone()]);
        assert!(store.thread(a.id).unwrap().loaded);
        assert_eq!(store.current_id(), None);
        assert!(!store.select(b.id));
    }
}

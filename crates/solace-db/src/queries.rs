use crate::Database;
use crate::models::{ChatRow, MessageRow, UserRow, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use solace_types::models::{Chat, Message};

const CHAT_COLUMNS: &str = "id, user_id, title, last_message, created_at, updated_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns false, without touching the table, when the
    /// email is already registered.
    pub fn create_user(&self, id: &Uuid, name: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                (id.to_string(), name, email, password_hash, format_timestamp(Utc::now())),
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    // -- Chats --

    pub fn insert_chat(&self, chat: &Chat) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, user_id, title, last_message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    chat.id.to_string(),
                    chat.user_id.to_string(),
                    &chat.title,
                    &chat.last_message,
                    format_timestamp(chat.created_at),
                    format_timestamp(chat.updated_at),
                ),
            )?;
            Ok(())
        })
    }

    /// Chats owned by `user_id`, most recently updated first.
    pub fn list_chats(&self, user_id: &Uuid) -> Result<Vec<Chat>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats
                 WHERE user_id = ?1
                 ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], chat_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChatRow::into_chat).collect()
        })
    }

    /// Look up a chat only if `user_id` owns it.
    pub fn get_chat(&self, chat_id: &Uuid, user_id: &Uuid) -> Result<Option<Chat>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1 AND user_id = ?2"),
                    [chat_id.to_string(), user_id.to_string()],
                    chat_row,
                )
                .optional()?;
            row.map(ChatRow::into_chat).transpose()
        })
    }

    pub fn set_chat_title(&self, chat_id: &Uuid, user_id: &Uuid, title: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chats SET title = ?3 WHERE id = ?1 AND user_id = ?2",
                (chat_id.to_string(), user_id.to_string(), title),
            )?;
            Ok(changed > 0)
        })
    }

    /// Record the latest exchange on a chat's metadata.
    pub fn touch_chat(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        last_message: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chats SET last_message = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
                (
                    chat_id.to_string(),
                    user_id.to_string(),
                    last_message,
                    format_timestamp(updated_at),
                ),
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns false when no chat matched both id and owner.
    pub fn delete_chat(&self, chat_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM chats WHERE id = ?1 AND user_id = ?2",
                [chat_id.to_string(), user_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, user_id, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    message.id.to_string(),
                    message.chat_id.to_string(),
                    message.user_id.to_string(),
                    message.role.as_str(),
                    &message.content,
                    format_timestamp(message.timestamp),
                ),
            )?;
            Ok(())
        })
    }

    /// Full history of a chat in timestamp order. The join on `chats`
    /// keeps another user's messages out even if the chat id leaks.
    pub fn get_messages(&self, chat_id: &Uuid, user_id: &Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_id, m.user_id, m.role, m.content, m.timestamp
                 FROM messages m
                 JOIN chats c ON c.id = m.chat_id
                 WHERE m.chat_id = ?1 AND c.user_id = ?2
                 ORDER BY m.timestamp ASC, m.rowid ASC",
            )?;
            let rows = stmt
                .query_map([chat_id.to_string(), user_id.to_string()], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }

    /// The newest `limit` messages of a chat other than `exclude`,
    /// returned oldest first.
    pub fn get_recent_messages(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        limit: u32,
        exclude: &Uuid,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, user_id, role, content, timestamp FROM (
                     SELECT m.id, m.chat_id, m.user_id, m.role, m.content, m.timestamp,
                            m.rowid AS seq
                     FROM messages m
                     JOIN chats c ON c.id = m.chat_id
                     WHERE m.chat_id = ?1 AND c.user_id = ?2 AND m.id != ?4
                     ORDER BY m.timestamp DESC, m.rowid DESC
                     LIMIT ?3
                 )
                 ORDER BY timestamp ASC, seq ASC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![chat_id.to_string(), user_id.to_string(), limit, exclude.to_string()],
                    message_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }

    pub fn delete_messages_for_chat(&self, chat_id: &Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id.to_string()])?;
            Ok(removed)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn chat_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        last_message: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use solace_types::models::{DEFAULT_CHAT_TITLE, Role};

    fn db_with_user(email: &str) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4();
        assert!(db.create_user(&user_id, "Ada", email, "hash").unwrap());
        (db, user_id)
    }

    fn add_user(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        assert!(db.create_user(&id, "Other", email, "hash").unwrap());
        id
    }

    fn new_chat(db: &Database, user_id: Uuid, at: DateTime<Utc>) -> Chat {
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id,
            title: DEFAULT_CHAT_TITLE.to_string(),
            last_message: String::new(),
            created_at: at,
            updated_at: at,
        };
        db.insert_chat(&chat).unwrap();
        chat
    }

    fn post(db: &Database, chat: &Chat, role: Role, content: &str, at: DateTime<Utc>) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id: chat.id,
            user_id: chat.user_id,
            role,
            content: content.to_string(),
            timestamp: at,
        };
        db.insert_message(&message).unwrap();
        message
    }

    #[test]
    fn duplicate_email_is_not_inserted() {
        let (db, _) = db_with_user("ada@example.com");
        let again = db.create_user(&Uuid::new_v4(), "Imposter", "ada@example.com", "hash").unwrap();
        assert!(!again);

        let user = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn chats_are_scoped_to_owner_and_sorted_by_update() {
        let (db, ada) = db_with_user("ada@example.com");
        let bob = add_user(&db, "bob@example.com");
        let t0 = Utc::now();

        let older = new_chat(&db, ada, t0);
        let newer = new_chat(&db, ada, t0 + Duration::seconds(1));
        let bobs = new_chat(&db, bob, t0);

        let ids: Vec<Uuid> = db.list_chats(&ada).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert!(db.touch_chat(&older.id, &ada, "hello", t0 + Duration::seconds(5)).unwrap());
        let listed = db.list_chats(&ada).unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[0].last_message, "hello");

        assert!(db.get_chat(&bobs.id, &ada).unwrap().is_none());
        assert!(!db.set_chat_title(&bobs.id, &ada, "stolen").unwrap());
        assert!(!db.delete_chat(&bobs.id, &ada).unwrap());
        assert_eq!(db.get_chat(&bobs.id, &bob).unwrap().unwrap().title, DEFAULT_CHAT_TITLE);
    }

    #[test]
    fn messages_keep_insertion_order_within_same_timestamp() {
        let (db, ada) = db_with_user("ada@example.com");
        let t0 = Utc::now();
        let chat = new_chat(&db, ada, t0);

        let first = post(&db, &chat, Role::User, "one", t0);
        let second = post(&db, &chat, Role::Ai, "two", t0);
        let third = post(&db, &chat, Role::User, "three", t0 + Duration::milliseconds(1));

        let ids: Vec<Uuid> = db.get_messages(&chat.id, &ada).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn foreign_owner_sees_no_messages() {
        let (db, ada) = db_with_user("ada@example.com");
        let bob = add_user(&db, "bob@example.com");
        let chat = new_chat(&db, ada, Utc::now());
        post(&db, &chat, Role::User, "private", Utc::now());

        assert!(db.get_messages(&chat.id, &bob).unwrap().is_empty());
        assert_eq!(db.get_messages(&chat.id, &ada).unwrap().len(), 1);
    }

    #[test]
    fn recent_window_is_newest_slice_in_ascending_order() {
        let (db, ada) = db_with_user("ada@example.com");
        let t0 = Utc::now();
        let chat = new_chat(&db, ada, t0);

        for i in 0..30 {
            post(&db, &chat, Role::User, &format!("m{i}"), t0 + Duration::seconds(i));
        }
        let latest = post(&db, &chat, Role::User, "latest", t0 + Duration::seconds(60));

        let window = db.get_recent_messages(&chat.id, &ada, 10, &latest.id).unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (20..30).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn deleting_chat_then_messages() {
        let (db, ada) = db_with_user("ada@example.com");
        let chat = new_chat(&db, ada, Utc::now());
        post(&db, &chat, Role::User, "hi", Utc::now());
        post(&db, &chat, Role::Ai, "hello", Utc::now());

        assert!(db.delete_chat(&chat.id, &ada).unwrap());
        assert_eq!(db.delete_messages_for_chat(&chat.id).unwrap(), 2);
        assert!(db.get_chat(&chat.id, &ada).unwrap().is_none());
        assert!(!db.delete_chat(&chat.id, &ada).unwrap());
    }
}

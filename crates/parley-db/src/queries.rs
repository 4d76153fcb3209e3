use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use parley_core::store::ChatStore;
use parley_types::models::{Chat, ChatKey, Message, Role, User};

use crate::Database;
use crate::models::{ChatRow, MessageRow, UserRow, format_ts, parse_ts};

const CHAT_COLUMNS: &str = "id, user_id, title, created_at, updated_at";

/// Ownership predicate shared by every chat-scoped query: `?1` is the chat id,
/// `?2` the requesting user's id.
const OWNED_CHAT: &str = "id = ?1 AND user_id = ?2";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the email is already registered.
    pub fn create_user(&self, id: Uuid, email: &str, password_hash: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let created_at = format_ts(Utc::now());
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(email) DO NOTHING",
                (id.to_string(), email, password_hash, &created_at),
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(User {
                id,
                email: email.to_string(),
                created_at: parse_ts(&created_at)?,
            }))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    /// Delete a user; their chats and messages go with them.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    /// Number of messages stored for a chat, regardless of owner.
    pub fn count_messages(&self, chat_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
                [chat_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

impl ChatStore for Database {
    fn list_chats(&self, owner_id: Uuid) -> Result<Vec<Chat>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM chats WHERE user_id = ?1 ORDER BY updated_at DESC, rowid DESC",
                CHAT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([owner_id.to_string()], chat_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Chat::try_from).collect()
        })
    }

    fn find_chat(&self, key: ChatKey) -> Result<Option<Chat>> {
        self.with_conn(|conn| query_owned_chat(conn, key))
    }

    fn create_chat(&self, owner_id: Uuid, title: Option<&str>) -> Result<Chat> {
        let key = ChatKey::new(owner_id, Uuid::new_v4());
        self.with_conn(|conn| {
            insert_chat(conn, key, title)?;
            query_owned_chat(conn, key)?
                .ok_or_else(|| anyhow::anyhow!("chat {} vanished after insert", key.chat_id))
        })
    }

    fn create_or_fetch_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>> {
        self.with_conn(|conn| {
            // A concurrent creator may win; either way the row that exists is
            // read back through the ownership filter.
            insert_chat(conn, key, title)?;
            query_owned_chat(conn, key)
        })
    }

    fn rename_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(chat) = query_owned_chat(&tx, key)? else {
                return Ok(None);
            };
            let updated_at = next_touch(&chat);
            tx.execute(
                &format!("UPDATE chats SET title = ?3, updated_at = ?4 WHERE {}", OWNED_CHAT),
                (
                    key.chat_id.to_string(),
                    key.owner_id.to_string(),
                    title,
                    &updated_at,
                ),
            )?;
            let renamed = query_owned_chat(&tx, key)?;
            tx.commit()?;
            Ok(renamed)
        })
    }

    fn delete_chat(&self, key: ChatKey) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM chats WHERE {}", OWNED_CHAT),
                (key.chat_id.to_string(), key.owner_id.to_string()),
            )?;
            Ok(deleted > 0)
        })
    }

    fn transcript(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, content, created_at
                 FROM messages
                 WHERE chat_id = ?1
                 ORDER BY rowid ASC",
            )?;
            let rows = stmt
                .query_map([chat_id.to_string()], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Message::try_from).collect()
        })
    }

    fn insert_message(&self, chat_id: Uuid, role: Role, content: &str) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    message.id.to_string(),
                    chat_id.to_string(),
                    role.as_str(),
                    content,
                    format_ts(message.created_at),
                ),
            )?;
            Ok(())
        })?;
        // Round-trip precision matches what a later read returns.
        Ok(Message {
            created_at: parse_ts(&format_ts(message.created_at))?,
            ..message
        })
    }

    fn clear_messages(&self, chat_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id.to_string()])?;
            Ok(deleted)
        })
    }

    fn touch_chat(&self, chat_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT updated_at FROM chats WHERE id = ?1",
                    [chat_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Ok(());
            };
            let current = parse_ts(&current)?;
            let next = Utc::now().max(current + Duration::microseconds(1));
            tx.execute(
                "UPDATE chats SET updated_at = ?2 WHERE id = ?1",
                (chat_id.to_string(), format_ts(next)),
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

/// Monotonic successor of a chat's `updated_at`.
fn next_touch(chat: &Chat) -> String {
    format_ts(Utc::now().max(chat.updated_at + Duration::microseconds(1)))
}

fn insert_chat(conn: &Connection, key: ChatKey, title: Option<&str>) -> Result<()> {
    let now = format_ts(Utc::now());
    conn.execute(
        "INSERT INTO chats (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(id) DO NOTHING",
        (key.chat_id.to_string(), key.owner_id.to_string(), title, &now),
    )?;
    Ok(())
}

fn query_owned_chat(conn: &Connection, key: ChatKey) -> Result<Option<Chat>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM chats WHERE {}",
        CHAT_COLUMNS, OWNED_CHAT
    ))?;

    let row = stmt
        .query_row((key.chat_id.to_string(), key.owner_id.to_string()), chat_row)
        .optional()?;

    row.map(Chat::try_from).transpose()
}

fn chat_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, email, password, created_at FROM users WHERE {}",
        filter
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

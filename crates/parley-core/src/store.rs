use std::sync::Arc;

use anyhow::Result;
use tracing::error;
use uuid::Uuid;

use parley_types::models::{Chat, ChatKey, Message, Role};

use crate::error::ChatError;

/// Persistence seam for chats and messages.
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool. Every chat-scoped method takes a [`ChatKey`] and must resolve the chat
/// only when both the id and the owner match.
pub trait ChatStore: Send + Sync {
    /// Chats owned by `owner_id`, most recently updated first.
    fn list_chats(&self, owner_id: Uuid) -> Result<Vec<Chat>>;

    fn find_chat(&self, key: ChatKey) -> Result<Option<Chat>>;

    /// Create a chat with a freshly generated id.
    fn create_chat(&self, owner_id: Uuid, title: Option<&str>) -> Result<Chat>;

    /// Create the chat `key.chat_id` for `key.owner_id` unless a row with that
    /// id already exists, then fetch it through the ownership filter.
    ///
    /// Returns `None` when the id is taken by another user.
    fn create_or_fetch_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>>;

    /// Set the title and touch `updated_at`. `None` if not found/owned.
    fn rename_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>>;

    /// Delete the chat and, by cascade, its messages. `false` if not found/owned.
    fn delete_chat(&self, key: ChatKey) -> Result<bool>;

    /// The chat's messages in creation order.
    fn transcript(&self, chat_id: Uuid) -> Result<Vec<Message>>;

    fn insert_message(&self, chat_id: Uuid, role: Role, content: &str) -> Result<Message>;

    /// Delete every message of the chat, returning how many were removed.
    fn clear_messages(&self, chat_id: Uuid) -> Result<usize>;

    /// Advance `updated_at`; the new value is strictly greater than the old one.
    fn touch_chat(&self, chat_id: Uuid) -> Result<()>;
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<T, F>(store: &Arc<dyn ChatStore>, f: F) -> Result<T, ChatError>
where
    F: FnOnce(&dyn ChatStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&*store))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ChatError::Storage(anyhow::anyhow!("store task failed: {}", e))
        })?
        .map_err(ChatError::Storage)
}

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use parley_types::models::{Chat, ChatKey, Message, Role};

use crate::error::ChatError;
use crate::store::{ChatStore, run_blocking};

pub const MAX_TITLE_LEN: usize = 200;

/// Reject empty or whitespace-only message content.
pub fn validate_content(content: &str) -> Result<(), ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation("message content must not be empty".into()));
    }
    Ok(())
}

/// Trim a title; blank becomes `None`.
pub fn normalize_title(title: Option<String>) -> Result<Option<String>, ChatError> {
    let Some(title) = title else {
        return Ok(None);
    };
    let title = title.trim();
    if title.is_empty() {
        return Ok(None);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ChatError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(Some(title.to_string()))
}

/// Ownership-scoped chat operations that require an existing chat, plus
/// listing and explicit creation.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<Chat>, ChatError> {
        run_blocking(&self.store, move |store| store.list_chats(owner_id)).await
    }

    /// Resolve a chat that must already exist and belong to the requester.
    pub async fn require_existing(&self, key: ChatKey) -> Result<Chat, ChatError> {
        run_blocking(&self.store, move |store| store.find_chat(key))
            .await?
            .ok_or(ChatError::NotFound)
    }

    pub async fn create(&self, owner_id: Uuid, title: Option<String>) -> Result<Chat, ChatError> {
        let title = normalize_title(title)?;
        let chat = run_blocking(&self.store, move |store| {
            store.create_chat(owner_id, title.as_deref())
        })
        .await?;
        debug!(chat_id = %chat.id, "chat created");
        Ok(chat)
    }

    pub async fn rename(&self, key: ChatKey, title: Option<String>) -> Result<Chat, ChatError> {
        let title = normalize_title(title)?;
        run_blocking(&self.store, move |store| store.rename_chat(key, title.as_deref()))
            .await?
            .ok_or(ChatError::NotFound)
    }

    /// Delete every message of the chat but keep the chat itself.
    pub async fn clear(&self, key: ChatKey) -> Result<usize, ChatError> {
        let deleted = run_blocking(&self.store, move |store| {
            if store.find_chat(key)?.is_none() {
                return Ok(None);
            }
            let deleted = store.clear_messages(key.chat_id)?;
            store.touch_chat(key.chat_id)?;
            Ok(Some(deleted))
        })
        .await?
        .ok_or(ChatError::NotFound)?;

        debug!(chat_id = %key.chat_id, deleted, "chat cleared");
        Ok(deleted)
    }

    pub async fn delete(&self, key: ChatKey) -> Result<(), ChatError> {
        let deleted = run_blocking(&self.store, move |store| store.delete_chat(key)).await?;
        if !deleted {
            return Err(ChatError::NotFound);
        }
        debug!(chat_id = %key.chat_id, "chat deleted");
        Ok(())
    }

    /// The chat's transcript, oldest first.
    pub async fn messages(&self, key: ChatKey) -> Result<Vec<Message>, ChatError> {
        run_blocking(&self.store, move |store| {
            if store.find_chat(key)?.is_none() {
                return Ok(None);
            }
            store.transcript(key.chat_id).map(Some)
        })
        .await?
        .ok_or(ChatError::NotFound)
    }

    /// Store a user message without asking the model for a reply.
    pub async fn append_user_message(
        &self,
        key: ChatKey,
        content: String,
    ) -> Result<Message, ChatError> {
        validate_content(&content)?;
        run_blocking(&self.store, move |store| {
            if store.find_chat(key)?.is_none() {
                return Ok(None);
            }
            let msg = store.insert_message(key.chat_id, Role::User, &content)?;
            store.touch_chat(key.chat_id)?;
            Ok(Some(msg))
        })
        .await?
        .ok_or(ChatError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn service() -> (Arc<MemoryStore>, ChatService) {
        let store = Arc::new(MemoryStore::default());
        (store.clone(), ChatService::new(store))
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title(None).unwrap(), None);
        assert_eq!(normalize_title(Some("   ".into())).unwrap(), None);
        assert_eq!(
            normalize_title(Some("  Trip plans ".into())).unwrap(),
            Some("Trip plans".to_string())
        );
        assert!(matches!(
            normalize_title(Some("x".repeat(MAX_TITLE_LEN + 1))),
            Err(ChatError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_owner() {
        let (_store, svc) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        svc.create(alice, Some("a1".into())).await.unwrap();
        svc.create(alice, None).await.unwrap();
        svc.create(bob, Some("b1".into())).await.unwrap();

        assert_eq!(svc.list(alice).await.unwrap().len(), 2);
        let bobs = svc.list(bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].title.as_deref(), Some("b1"));
    }

    #[tokio::test]
    async fn test_foreign_chat_is_not_found() {
        let (_store, svc) = service();
        let alice = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        let chat = svc.create(alice, None).await.unwrap();
        let foreign = ChatKey::new(mallory, chat.id);

        assert!(matches!(svc.require_existing(foreign).await, Err(ChatError::NotFound)));
        assert!(matches!(svc.clear(foreign).await, Err(ChatError::NotFound)));
        assert!(matches!(svc.delete(foreign).await, Err(ChatError::NotFound)));
        assert!(matches!(svc.messages(foreign).await, Err(ChatError::NotFound)));
        assert!(matches!(
            svc.rename(foreign, Some("mine now".into())).await,
            Err(ChatError::NotFound)
        ));
        assert!(matches!(
            svc.append_user_message(foreign, "hi".into()).await,
            Err(ChatError::NotFound)
        ));

        // Still intact for the owner.
        assert!(svc.require_existing(ChatKey::new(alice, chat.id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_keeps_chat_and_touches_it() {
        let (store, svc) = service();
        let owner = Uuid::new_v4();
        let chat = svc.create(owner, None).await.unwrap();
        let key = ChatKey::new(owner, chat.id);

        svc.append_user_message(key, "one".into()).await.unwrap();
        svc.append_user_message(key, "two".into()).await.unwrap();
        let before = svc.require_existing(key).await.unwrap().updated_at;

        assert_eq!(svc.clear(key).await.unwrap(), 2);

        let after = svc.require_existing(key).await.unwrap();
        assert!(after.updated_at > before);
        assert!(svc.messages(key).await.unwrap().is_empty());
        assert_eq!(store.message_count(chat.id), 0);
    }

    #[tokio::test]
    async fn test_clear_empty_chat_still_touches() {
        let (_store, svc) = service();
        let owner = Uuid::new_v4();
        let chat = svc.create(owner, None).await.unwrap();
        let key = ChatKey::new(owner, chat.id);

        assert_eq!(svc.clear(key).await.unwrap(), 0);
        assert!(svc.require_existing(key).await.unwrap().updated_at > chat.updated_at);
    }

    #[tokio::test]
    async fn test_delete_removes_messages() {
        let (store, svc) = service();
        let owner = Uuid::new_v4();
        let chat = svc.create(owner, None).await.unwrap();
        let key = ChatKey::new(owner, chat.id);
        svc.append_user_message(key, "hello".into()).await.unwrap();

        svc.delete(key).await.unwrap();

        assert!(matches!(svc.require_existing(key).await, Err(ChatError::NotFound)));
        assert_eq!(store.message_count(chat.id), 0);
    }

    #[tokio::test]
    async fn test_append_rejects_blank_content() {
        let (store, svc) = service();
        let owner = Uuid::new_v4();
        let chat = svc.create(owner, None).await.unwrap();

        let result = svc
            .append_user_message(ChatKey::new(owner, chat.id), " \n\t".into())
            .await;

        assert!(matches!(result, Err(ChatError::Validation(_))));
        assert_eq!(store.message_count(chat.id), 0);
    }

    #[tokio::test]
    async fn test_rename_touches_chat() {
        let (_store, svc) = service();
        let owner = Uuid::new_v4();
        let chat = svc.create(owner, Some("old".into())).await.unwrap();

        let renamed = svc
            .rename(ChatKey::new(owner, chat.id), Some("new".into()))
            .await
            .unwrap();

        assert_eq!(renamed.title.as_deref(), Some("new"));
        assert!(renamed.updated_at > chat.updated_at);
    }
}

//! One conversational turn, end to end.
//!
//! Resolve (or create) the chat, snapshot the transcript, persist the user
//! message, assemble the prompt, call the model, persist the reply, touch the
//! chat. A model failure leaves the user message in place and creates no
//! assistant message.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use parley_types::models::{Chat, ChatKey, Message, Role};

use crate::context::build_context;
use crate::error::{ChatError, ModelError};
use crate::model::ModelGateway;
use crate::service::validate_content;
use crate::store::{ChatStore, run_blocking};

/// Title given to chats created implicitly by their first turn.
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Arc<dyn ChatStore>,
    model: Arc<dyn ModelGateway>,
    model_id: String,
    timeout: Duration,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn ChatStore>,
        model: Arc<dyn ModelGateway>,
        model_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            model,
            model_id: model_id.into(),
            timeout,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Resolve the chat for a turn, creating it for the requester on a miss.
    ///
    /// An id that already belongs to someone else is reported as not found.
    pub async fn get_or_create_for_turn(&self, key: ChatKey) -> Result<Chat, ChatError> {
        run_blocking(&self.store, move |store| {
            if let Some(chat) = store.find_chat(key)? {
                return Ok(Some(chat));
            }
            store.create_or_fetch_chat(key, Some(DEFAULT_CHAT_TITLE))
        })
        .await?
        .ok_or(ChatError::NotFound)
    }

    /// Run a full turn and return the persisted assistant reply.
    pub async fn send(&self, key: ChatKey, utterance: String) -> Result<Message, ChatError> {
        validate_content(&utterance)?;

        let chat = self.get_or_create_for_turn(key).await?;
        let chat_id = chat.id;

        // The snapshot is read before the user message is written so the
        // utterance only enters the prompt once.
        let content = utterance.clone();
        let history = run_blocking(&self.store, move |store| {
            let history = store.transcript(chat_id)?;
            store.insert_message(chat_id, Role::User, &content)?;
            store.touch_chat(chat_id)?;
            Ok(history)
        })
        .await?;

        let prompt = build_context(&history, &utterance);
        debug!(
            chat_id = %chat_id,
            history = history.len(),
            prompt = prompt.len(),
            "context assembled"
        );

        let reply = match tokio::time::timeout(self.timeout, self.model.invoke(&self.model_id, &prompt)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(self.abandon(chat_id, e).await),
            Err(_) => return Err(self.abandon(chat_id, ModelError::Timeout).await),
        };

        let reply = reply.trim().to_string();
        let message = run_blocking(&self.store, move |store| {
            let message = store.insert_message(chat_id, Role::Assistant, &reply)?;
            store.touch_chat(chat_id)?;
            Ok(message)
        })
        .await?;

        debug!(chat_id = %chat_id, message_id = %message.id, "turn complete");
        Ok(message)
    }

    /// The user message is already stored, so the chat still gets touched.
    async fn abandon(&self, chat_id: uuid::Uuid, cause: ModelError) -> ChatError {
        warn!(chat_id = %chat_id, model = %self.model_id, "model call failed: {}", cause);
        if let Err(e) = run_blocking(&self.store, move |store| store.touch_chat(chat_id)).await {
            error!(chat_id = %chat_id, "failed to touch chat after model failure: {}", e);
        }
        ChatError::ModelUnavailable(cause)
    }
}

//! In-memory fakes for the store and model seams.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use parley_types::models::{Chat, ChatKey, Message, PromptMessage, Role};

use crate::error::ModelError;
use crate::model::ModelGateway;
use crate::store::ChatStore;

#[derive(Default)]
struct State {
    chats: Vec<Chat>,
    messages: Vec<Message>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Inserts still allowed before every further one fails; `None` is unlimited.
    insert_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn chat(&self, id: Uuid) -> Option<Chat> {
        let state = self.state.lock().unwrap();
        state.chats.iter().find(|c| c.id == id).cloned()
    }

    pub fn messages_of(&self, chat_id: Uuid) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        state.messages.iter().filter(|m| m.chat_id == chat_id).cloned().collect()
    }

    pub fn message_count(&self, chat_id: Uuid) -> usize {
        self.messages_of(chat_id).len()
    }

    pub fn seed_chat(&self, key: ChatKey) -> Chat {
        let now = Utc::now();
        let chat = Chat {
            id: key.chat_id,
            user_id: key.owner_id,
            title: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().chats.push(chat.clone());
        chat
    }

    pub fn seed_message(&self, chat_id: Uuid, role: Role, content: &str) {
        self.state.lock().unwrap().messages.push(Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts_after(0);
    }

    pub fn fail_inserts_after(&self, allowed: usize) {
        *self.insert_budget.lock().unwrap() = Some(allowed);
    }
}

impl ChatStore for MemoryStore {
    fn list_chats(&self, owner_id: Uuid) -> Result<Vec<Chat>> {
        let state = self.state.lock().unwrap();
        let mut chats: Vec<Chat> = state
            .chats
            .iter()
            .filter(|c| c.user_id == owner_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    fn find_chat(&self, key: ChatKey) -> Result<Option<Chat>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chats
            .iter()
            .find(|c| c.id == key.chat_id && c.user_id == key.owner_id)
            .cloned())
    }

    fn create_chat(&self, owner_id: Uuid, title: Option<&str>) -> Result<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_id: owner_id,
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().chats.push(chat.clone());
        Ok(chat)
    }

    fn create_or_fetch_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.chats.iter().find(|c| c.id == key.chat_id) {
            return Ok((existing.user_id == key.owner_id).then(|| existing.clone()));
        }
        let now = Utc::now();
        let chat = Chat {
            id: key.chat_id,
            user_id: key.owner_id,
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        state.chats.push(chat.clone());
        Ok(Some(chat))
    }

    fn rename_chat(&self, key: ChatKey, title: Option<&str>) -> Result<Option<Chat>> {
        let mut state = self.state.lock().unwrap();
        let Some(chat) = state
            .chats
            .iter_mut()
            .find(|c| c.id == key.chat_id && c.user_id == key.owner_id)
        else {
            return Ok(None);
        };
        chat.title = title.map(str::to_string);
        chat.updated_at = Utc::now().max(chat.updated_at + chrono::Duration::microseconds(1));
        Ok(Some(chat.clone()))
    }

    fn delete_chat(&self, key: ChatKey) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.chats.len();
        state
            .chats
            .retain(|c| !(c.id == key.chat_id && c.user_id == key.owner_id));
        if state.chats.len() == before {
            return Ok(false);
        }
        state.messages.retain(|m| m.chat_id != key.chat_id);
        Ok(true)
    }

    fn transcript(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.messages_of(chat_id))
    }

    fn insert_message(&self, chat_id: Uuid, role: Role, content: &str) -> Result<Message> {
        if let Some(remaining) = self.insert_budget.lock().unwrap().as_mut() {
            if *remaining == 0 {
                bail!("disk full");
            }
            *remaining -= 1;
        }
        let msg = Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().messages.push(msg.clone());
        Ok(msg)
    }

    fn clear_messages(&self, chat_id: Uuid) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let before = state.messages.len();
        state.messages.retain(|m| m.chat_id != chat_id);
        Ok(before - state.messages.len())
    }

    fn touch_chat(&self, chat_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.updated_at = Utc::now().max(chat.updated_at + chrono::Duration::microseconds(1));
        }
        Ok(())
    }
}

enum Behaviour {
    Reply(String),
    Fail,
    Hang,
}

/// Model fake that records every prompt it receives.
pub struct ScriptedModel {
    behaviour: Behaviour,
    calls: Mutex<Vec<(String, Vec<PromptMessage>)>>,
}

impl ScriptedModel {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::new(Behaviour::Reply(reply.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(Behaviour::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(Behaviour::Hang)
    }

    pub fn calls(&self) -> Vec<(String, Vec<PromptMessage>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedModel {
    async fn invoke(&self, model_id: &str, messages: &[PromptMessage]) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((model_id.to_string(), messages.to_vec()));
        match &self.behaviour {
            Behaviour::Reply(reply) => Ok(reply.clone()),
            Behaviour::Fail => Err(ModelError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }
}

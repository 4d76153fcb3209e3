//! Prompt assembly for a single turn.
//!
//! Pure: takes a snapshot of the stored transcript (oldest first) plus the new
//! utterance and returns the exact ordered prompt to send to the model.

use parley_types::models::{Message, PromptMessage, Role};

/// Instructional preamble sent only on a chat's first turn.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful, concise and accurate assistant. \
Respond directly without inventing unnecessary context.";

/// Number of most recent stored messages carried into the prompt.
pub const CONTEXT_WINDOW: usize = 10;

/// Build the prompt for a turn.
///
/// `history` must be the transcript as it was *before* the new user message was
/// persisted; the utterance is appended here, so passing a post-append
/// transcript would count it twice.
pub fn build_context(history: &[Message], utterance: &str) -> Vec<PromptMessage> {
    let window_start = history.len().saturating_sub(CONTEXT_WINDOW);
    let window = &history[window_start..];

    let mut prompt = Vec::with_capacity(window.len() + 2);
    if history.is_empty() {
        prompt.push(PromptMessage::new(Role::System, SYSTEM_PREAMBLE));
    }
    prompt.extend(window.iter().map(PromptMessage::from));
    prompt.push(PromptMessage::new(Role::User, utterance));
    prompt
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use medvoice_core::domain::agent::{AgentProfile, DEFAULT_SYSTEM_PROMPT};
use medvoice_core::domain::conversation::TranscriptEntry;

use crate::llm::{ChatMessage, ChatRole};

/// Caller facts appended to the system prompt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub business_hours: Option<Value>,
}

impl ConversationContext {
    pub fn for_patient(patient_name: Option<String>) -> Self {
        Self { patient_name, ..Self::default() }
    }
}

pub fn build_system_prompt(profile: &AgentProfile, context: &ConversationContext) -> String {
    let base = profile.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let mut prompt = match profile.kind() {
        Some(kind) => format!("{}\n\n{base}", kind.role_preamble()),
        None => base.to_string(),
    };

    if let Some(name) = context.patient_name.as_deref().filter(|name| !name.is_empty()) {
        prompt.push_str(&format!("\n\nCurrent patient: {name}"));
    }
    if let Some(hours) = context.business_hours.as_ref().filter(|hours| !hours.is_null()) {
        prompt.push_str(&format!("\n\nBusiness hours: {hours}"));
    }

    prompt
}

pub fn build_message_history(history: &[TranscriptEntry], user_message: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .map(|entry| ChatMessage::new(ChatRole::from(entry.role), entry.content.clone()))
        .collect();

    if !user_message.is_empty() {
        messages.push(ChatMessage::user(user_message));
    }

    messages
}

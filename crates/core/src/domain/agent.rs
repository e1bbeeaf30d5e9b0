use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::tenant::OrganizationId;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

/// Known voice-agent personas. Agents may carry other type strings; those
/// simply get no role preamble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    FrontDesk,
    MedicalAssistant,
    TriageNurse,
    BillingSpecialist,
    CollectionsSpecialist,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        Self::FrontDesk,
        Self::MedicalAssistant,
        Self::TriageNurse,
        Self::BillingSpecialist,
        Self::CollectionsSpecialist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontDesk => "front_desk",
            Self::MedicalAssistant => "medical_assistant",
            Self::TriageNurse => "triage_nurse",
            Self::BillingSpecialist => "billing_specialist",
            Self::CollectionsSpecialist => "collections_specialist",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw.trim())
    }

    pub fn role_preamble(&self) -> &'static str {
        match self {
            Self::FrontDesk => {
                "You are a professional front desk assistant for a medical practice. Help patients with appointment scheduling, general inquiries, and routing calls appropriately."
            }
            Self::MedicalAssistant => {
                "You are a medical assistant AI. Provide helpful information about appointments, medications, and general health questions. Always remind patients to consult with their healthcare provider for medical advice."
            }
            Self::TriageNurse => {
                "You are a triage nurse AI assistant. Help assess patient needs and determine urgency. For medical emergencies, immediately direct patients to call 911 or go to the emergency room."
            }
            Self::BillingSpecialist => {
                "You are a billing specialist AI assistant. Help patients understand their bills, payment options, insurance questions, and payment arrangements."
            }
            Self::CollectionsSpecialist => {
                "You are a collections specialist AI assistant. Help patients resolve outstanding balances with empathy and professionalism."
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub agent_type: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    /// Chat provider name (`openai`, `anthropic`, ...). Stored as `voice_model`.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub greeting_message: Option<String>,
    pub fallback_message: Option<String>,
    pub functions: Option<Vec<Value>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn kind(&self) -> Option<AgentType> {
        self.agent_type.as_deref().and_then(AgentType::parse)
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            provider: self
                .provider
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_PROVIDER)
                .to_string(),
            model: self.model.clone().filter(|value| !value.trim().is_empty()),
            system_prompt: self.system_prompt.clone().filter(|value| !value.trim().is_empty()),
            temperature: sanitize_temperature(self.temperature),
            max_tokens: sanitize_max_tokens(self.max_tokens),
            functions: self.functions.clone().filter(|functions| !functions.is_empty()),
            agent_type: self.agent_type.clone(),
        }
    }
}

/// Provider-agnostic settings for a single completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub provider: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub functions: Option<Vec<Value>>,
    pub agent_type: Option<String>,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: None,
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            functions: None,
            agent_type: None,
        }
    }
}

impl AgentProfile {
    pub fn kind(&self) -> Option<AgentType> {
        self.agent_type.as_deref().and_then(AgentType::parse)
    }
}

pub fn sanitize_temperature(raw: Option<f64>) -> f32 {
    match raw {
        Some(value) if value.is_finite() && value >= 0.0 => value as f32,
        _ => DEFAULT_TEMPERATURE,
    }
}

pub fn sanitize_max_tokens(raw: Option<i64>) -> u32 {
    match raw {
        Some(value) if value > 0 => u32::try_from(value).unwrap_or(u32::MAX),
        _ => DEFAULT_MAX_TOKENS,
    }
}

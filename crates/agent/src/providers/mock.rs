use medvoice_core::domain::agent::AgentType;
use medvoice_core::domain::conversation::TokenUsage;

use crate::llm::Completion;

pub const MOCK_MODEL: &str = "mock-model";
pub const GENERIC_MOCK_REPLY: &str = "I understand. How can I help you today?";

/// Canned completions used when mock mode is enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockResponder;

impl MockResponder {
    pub fn complete(&self, agent_type: Option<&str>) -> Completion {
        let content = agent_type.and_then(AgentType::parse).map(canned_reply).unwrap_or(GENERIC_MOCK_REPLY);

        Completion {
            content: content.to_string(),
            function_call: None,
            finish_reason: Some("stop".to_string()),
            usage: Some(TokenUsage::new(50, 30)),
            model: Some(MOCK_MODEL.to_string()),
        }
    }
}

fn canned_reply(kind: AgentType) -> &'static str {
    match kind {
        AgentType::FrontDesk => {
            "Thank you for calling. I can help you schedule an appointment. What date and time works best for you?"
        }
        AgentType::MedicalAssistant => {
            "I understand your concern. For medical advice, please consult with your healthcare provider. I can help with appointment scheduling or general questions."
        }
        AgentType::TriageNurse => {
            "I understand you need medical assistance. Can you tell me more about your symptoms so I can help determine the appropriate level of care?"
        }
        AgentType::BillingSpecialist => {
            "I can help you with billing questions. Would you like to discuss your account balance, payment options, or insurance coverage?"
        }
        AgentType::CollectionsSpecialist => {
            "I'm here to help resolve your account balance. Let's work together to find a payment solution that works for you."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MockResponder, GENERIC_MOCK_REPLY, MOCK_MODEL};

    #[test]
    fn known_agent_types_get_role_specific_replies() {
        let completion = MockResponder.complete(Some("triage_nurse"));
        assert!(completion.content.contains("symptoms"));
        assert_eq!(completion.model.as_deref(), Some(MOCK_MODEL));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));

        let usage = completion.usage.expect("usage");
        assert_eq!((usage.input_tokens, usage.output_tokens, usage.total_tokens), (50, 30, 80));
    }

    #[test]
    fn unknown_or_missing_type_gets_generic_reply() {
        assert_eq!(MockResponder.complete(None).content, GENERIC_MOCK_REPLY);
        assert_eq!(MockResponder.complete(Some("radiology")).content, GENERIC_MOCK_REPLY);
    }
}

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use medvoice_core::domain::agent::{Agent, AgentProfile};
use medvoice_core::domain::conversation::{AudioClip, TokenUsage, TranscriptEntry};
use medvoice_core::domain::tts::TtsConfiguration;

use crate::prompt::ConversationContext;
use crate::service::AiService;
use crate::tts::SpeechSynthesizer;

pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again or contact support.";
const GREETING_PROMPT: &str = "Hello";

/// Everything needed to answer one caller message.
pub struct ConversationTurn<'a> {
    pub profile: &'a AgentProfile,
    pub history: &'a [TranscriptEntry],
    pub message: &'a str,
    pub context: &'a ConversationContext,
    pub fallback_message: Option<&'a str>,
    pub tts: Option<&'a TtsConfiguration>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub transcript: Vec<TranscriptEntry>,
    pub reply: String,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
    pub audio: Option<AudioClip>,
}

/// Drives greeting and reply turns. AI failures degrade to the agent's
/// fallback text; TTS failures only drop the audio.
pub struct ConversationRuntime {
    ai: Arc<AiService>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl ConversationRuntime {
    pub fn new(ai: Arc<AiService>, speech: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self { ai, speech }
    }

    pub fn ai(&self) -> &AiService {
        &self.ai
    }

    pub async fn greet(&self, agent: &Agent, patient_name: Option<&str>) -> String {
        if let Some(greeting) = agent.greeting_message.as_deref().filter(|g| !g.trim().is_empty()) {
            return greeting.to_string();
        }

        let profile = agent.profile();
        if profile.system_prompt.is_none() {
            return DEFAULT_GREETING.to_string();
        }

        let context = ConversationContext::for_patient(patient_name.map(str::to_string));
        match self.ai.process_conversation(&profile, &[], GREETING_PROMPT, &context).await {
            Ok(completion) if !completion.content.trim().is_empty() => completion.content,
            Ok(_) => DEFAULT_GREETING.to_string(),
            Err(err) => {
                warn!(
                    event_name = "conversation.greeting.failed",
                    agent_id = %agent.id.0,
                    error = %err,
                    "error generating greeting"
                );
                DEFAULT_GREETING.to_string()
            }
        }
    }

    pub async fn reply(&self, turn: ConversationTurn<'_>) -> TurnOutcome {
        let mut transcript = turn.history.to_vec();
        transcript.push(TranscriptEntry::user(turn.message));

        let completion = self
            .ai
            .process_conversation(turn.profile, turn.history, turn.message, turn.context)
            .await;

        match completion {
            Ok(completion) => {
                let audio = self.synthesize(&completion.content, turn.tts).await;
                let mut entry = TranscriptEntry::assistant(completion.content.clone());
                entry.usage = completion.usage;
                entry.model = completion.model.clone();
                entry.audio = audio.clone();
                transcript.push(entry);

                TurnOutcome {
                    transcript,
                    reply: completion.content,
                    usage: completion.usage,
                    error: None,
                    audio,
                }
            }
            Err(err) => {
                warn!(
                    event_name = "conversation.reply.fallback",
                    provider = %turn.profile.provider,
                    error = %err,
                    "AI processing error"
                );
                let fallback = turn
                    .fallback_message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or(DEFAULT_FALLBACK_MESSAGE)
                    .to_string();
                let error = err.to_string();
                let mut entry = TranscriptEntry::assistant(fallback.clone());
                entry.error = Some(error.clone());
                transcript.push(entry);

                TurnOutcome { transcript, reply: fallback, usage: None, error: Some(error), audio: None }
            }
        }
    }

    async fn synthesize(&self, text: &str, config: Option<&TtsConfiguration>) -> Option<AudioClip> {
        let (speech, config) = (self.speech.as_ref()?, config?);
        match speech.synthesize(text, config).await {
            Ok(speech) => {
                info!(
                    event_name = "conversation.reply.audio",
                    provider = %speech.provider,
                    "attached synthesized audio"
                );
                Some(speech.into_clip())
            }
            Err(err) => {
                warn!(
                    event_name = "conversation.reply.tts_failed",
                    error = %err,
                    "TTS synthesis error (non-blocking)"
                );
                None
            }
        }
    }
}

//! Conversation pipeline - turns a stored agent and transcript into replies
//!
//! - `llm` - provider-agnostic completion types and the `LlmClient` seam
//! - `providers` - OpenAI and Anthropic HTTP adapters plus canned mock replies
//! - `prompt` - system prompt and message history assembly
//! - `service` - `AiService`, multi-provider dispatch with mock mode
//! - `tts` - `TtsService`, ElevenLabs synthesis behind `SpeechSynthesizer`
//! - `runtime` - `ConversationRuntime`, greeting and reply turns with fallback
//!
//! Provider failures never surface as request failures from the runtime: the
//! caller always gets an assistant entry, either the completion or the
//! agent's fallback text with the error recorded alongside it.

pub mod llm;
pub mod prompt;
pub mod providers;
pub mod runtime;
pub mod service;
pub mod tts;

pub use llm::{AiProvider, ChatMessage, ChatRole, Completion, CompletionRequest, LlmClient, LlmError};
pub use prompt::ConversationContext;
pub use runtime::{ConversationRuntime, ConversationTurn, TurnOutcome};
pub use service::{AiService, AiStatus};
pub use tts::{SpeechSynthesizer, SynthesizedSpeech, TtsError, TtsProvider, TtsService};

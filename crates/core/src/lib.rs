//! Shared configuration, error taxonomy, audit events and domain types for
//! the medvoice conversation backend.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::agent::{Agent, AgentId, AgentProfile, AgentType};
pub use domain::conversation::{
    AudioClip, Conversation, ConversationId, ConversationStatus, ConversationSummary, TokenUsage,
    TranscriptEntry, TranscriptRole,
};
pub use domain::tenant::{OrganizationId, TenantContext, UserId};
pub use domain::tts::TtsConfiguration;
pub use errors::{ApplicationError, DomainError, InterfaceError};

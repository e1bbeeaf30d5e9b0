use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use medvoice_core::domain::agent::{Agent, AgentId};
use medvoice_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, ConversationSummary, TranscriptEntry,
};
use medvoice_core::domain::tenant::OrganizationId;

use super::{AgentRepository, ConversationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: RwLock<HashMap<String, Agent>>,
}

#[async_trait::async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn find_for_organization(
        &self,
        id: &AgentId,
        organization_id: &OrganizationId,
    ) -> Result<Option<Agent>, RepositoryError> {
        let agents = self.agents.read().await;
        Ok(agents.get(&id.0).filter(|agent| &agent.organization_id == organization_id).cloned())
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<Agent>, RepositoryError> {
        let agents = self.agents.read().await;
        let mut listed: Vec<Agent> = agents
            .values()
            .filter(|agent| &agent.organization_id == organization_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn save(&self, agent: Agent) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id.0.clone(), agent);
        Ok(())
    }
}

/// Conversation store that labels summaries with agents registered via
/// [`InMemoryConversationRepository::register_agent`].
#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
    agent_labels: RwLock<HashMap<String, (String, Option<String>)>>,
}

impl InMemoryConversationRepository {
    pub async fn register_agent(&self, agent: &Agent) {
        let mut labels = self.agent_labels.write().await;
        labels.insert(agent.id.0.clone(), (agent.name.clone(), agent.agent_type.clone()));
    }

    async fn summarize(&self, conversation: Conversation) -> ConversationSummary {
        let labels = self.agent_labels.read().await;
        let (agent_name, agent_type) = match labels.get(&conversation.agent_id.0) {
            Some((name, kind)) => (Some(name.clone()), kind.clone()),
            None => (None, None),
        };
        ConversationSummary { conversation, agent_name, agent_type }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
        limit: u32,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let mut owned: Vec<Conversation> = {
            let conversations = self.conversations.read().await;
            conversations
                .values()
                .filter(|conversation| &conversation.organization_id == organization_id)
                .cloned()
                .collect()
        };
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit as usize);

        let mut summaries = Vec::with_capacity(owned.len());
        for conversation in owned {
            summaries.push(self.summarize(conversation).await);
        }
        Ok(summaries)
    }

    async fn find_for_organization(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let found = {
            let conversations = self.conversations.read().await;
            conversations
                .get(&id.0)
                .filter(|conversation| &conversation.organization_id == organization_id)
                .cloned()
        };
        match found {
            Some(conversation) => Ok(Some(self.summarize(conversation).await)),
            None => Ok(None),
        }
    }

    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.id.0) {
            return Err(RepositoryError::Constraint(format!(
                "conversation `{}` already exists",
                conversation.id.0
            )));
        }
        conversations.insert(conversation.id.0.clone(), conversation.clone());
        Ok(())
    }

    async fn update_transcript(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        transcript: &[TranscriptEntry],
    ) -> Result<bool, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        match conversations
            .get_mut(&id.0)
            .filter(|conversation| &conversation.organization_id == organization_id)
        {
            Some(conversation) => {
                conversation.transcript = transcript.to_vec();
                conversation.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_status(
        &self,
        id: &ConversationId,
        organization_id: &OrganizationId,
        status: ConversationStatus,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let Some(conversation) = conversations
            .get_mut(&id.0)
            .filter(|conversation| &conversation.organization_id == organization_id)
        else {
            return Ok(None);
        };
        conversation.status = status;
        conversation.updated_at = Utc::now();
        Ok(Some(conversation.clone()))
    }
}

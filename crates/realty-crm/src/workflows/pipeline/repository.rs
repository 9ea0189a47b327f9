use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Lead, LeadId, StageTransition};
use super::stages::StageId;

/// Persistence collaborator owning the authoritative lead set.
///
/// Implementations serialize their own writes; the service never holds a lock across calls.
pub trait LeadRepository: Send + Sync {
    /// Reserve the identifier for the next inserted lead. No two calls may return the same id,
    /// even when both happen before either insert.
    fn next_id(&self) -> Result<LeadId, RepositoryError>;
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn update(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    /// Single-field stage write. Must leave the record untouched when it fails.
    fn update_stage(
        &self,
        id: LeadId,
        stage_id: &StageId,
        updated_at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError>;
    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn all(&self) -> Result<Vec<Lead>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for committed pipeline changes (e-mail, webhooks, activity feed).
pub trait PipelineNotifier: Send + Sync {
    fn publish(&self, event: PipelineEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    LeadCreated { lead: Lead },
    StageChanged(StageTransition),
}

impl PipelineEvent {
    pub fn lead_id(&self) -> LeadId {
        match self {
            PipelineEvent::LeadCreated { lead } => lead.id,
            PipelineEvent::StageChanged(transition) => transition.lead_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Notifier that drops every event, for deployments without outbound hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl PipelineNotifier for NoopNotifier {
    fn publish(&self, _event: PipelineEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

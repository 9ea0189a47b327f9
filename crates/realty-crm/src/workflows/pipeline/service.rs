use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::cache::{PipelineMutation, QueryCache};
use super::domain::{Lead, LeadId, LeadSubmission, LeadUpdate, StageTransition};
use super::repository::{LeadRepository, PipelineEvent, PipelineNotifier, RepositoryError};
use super::stages::{Stage, StageId, StageRegistry, StageRegistryError};
use super::validation::{self, ContactFields, LeadValidationError};
use super::view::{group_leads, PipelineView};
use crate::config::PipelineConfig;

/// Service composing the stage registry, lead repository, and query cache.
pub struct LeadPipelineService<R, N> {
    registry: StageRegistry,
    default_stage: StageId,
    repository: Arc<R>,
    notifier: Arc<N>,
    cache: QueryCache,
}

impl<R, N> LeadPipelineService<R, N>
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        registry: StageRegistry,
        default_stage: StageId,
    ) -> Self {
        Self {
            registry,
            default_stage,
            repository,
            notifier,
            cache: QueryCache::new(),
        }
    }

    pub fn from_config(
        repository: Arc<R>,
        notifier: Arc<N>,
        config: &PipelineConfig,
    ) -> Result<Self, StageRegistryError> {
        let registry = StageRegistry::new(config.stages.clone())?;
        Ok(Self::new(
            repository,
            notifier,
            registry,
            config.default_stage.clone(),
        ))
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn list_stages(&self) -> &[Stage] {
        self.registry.list_stages()
    }

    pub fn default_stage(&self) -> &StageId {
        &self.default_stage
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Stages with their leads, re-derived from the repository whenever a mutation invalidated it.
    pub fn grouped_view(&self) -> Result<Arc<PipelineView>, PipelineError> {
        self.cache.board(|| {
            let leads = self.repository.all().map_err(PipelineError::storage)?;
            Ok(group_leads(&self.registry, leads))
        })
    }

    pub fn get_lead(&self, lead_id: LeadId) -> Result<Lead, PipelineError> {
        let lead = self.cache.lead(lead_id, || self.fetch(lead_id))?;
        Ok(Lead::clone(&lead))
    }

    /// Create a lead from a form submission, placing it in the requested or default stage.
    pub fn create_lead(&self, submission: LeadSubmission) -> Result<Lead, PipelineError> {
        let lead = self.insert_submission(&submission)?;
        self.cache.apply(&PipelineMutation::Create);

        info!(lead_id = %lead.id, stage_id = %lead.stage_id, source = lead.source.label(), "lead created");
        self.notify(PipelineEvent::LeadCreated { lead: lead.clone() });
        Ok(lead)
    }

    /// Move a lead to another stage. Unknown leads or stages leave every record untouched.
    pub fn reassign_stage(
        &self,
        lead_id: LeadId,
        new_stage_id: &StageId,
    ) -> Result<Lead, PipelineError> {
        self.ensure_stage(new_stage_id)?;
        let current = self.fetch(lead_id)?;

        if &current.stage_id == new_stage_id {
            self.cache
                .apply(&PipelineMutation::Reassign { lead_id: current.id });
            return Ok(current);
        }

        let changed_at = Utc::now();
        let updated = self
            .repository
            .update_stage(lead_id, new_stage_id, changed_at)
            .map_err(|err| PipelineError::for_lead(err, lead_id))?;
        self.cache.apply(&PipelineMutation::Reassign { lead_id });

        info!(lead_id = %lead_id, from = %current.stage_id, to = %new_stage_id, "lead stage reassigned");
        self.notify(PipelineEvent::StageChanged(StageTransition {
            lead_id,
            from: current.stage_id,
            to: new_stage_id.clone(),
            changed_at,
        }));
        Ok(updated)
    }

    /// Apply a field edit. A stage in the update follows the same rules as `reassign_stage`.
    pub fn update_lead(&self, lead_id: LeadId, update: LeadUpdate) -> Result<Lead, PipelineError> {
        if let Some(stage_id) = &update.stage_id {
            self.ensure_stage(stage_id)?;
        }

        let current = self.fetch(lead_id)?;
        if update.is_empty() {
            return Ok(current);
        }

        let contact = validation::apply_update(contact_of(&current), &update)?;
        let now = Utc::now();
        let previous_stage = current.stage_id.clone();
        let lead = Lead {
            id: current.id,
            full_name: contact.full_name,
            email: contact.email,
            phone: contact.phone,
            property_id: contact.property_id,
            message: contact.message,
            stage_id: update.stage_id.unwrap_or(current.stage_id),
            source: current.source,
            created_at: current.created_at,
            updated_at: now,
        };

        let stored = self
            .repository
            .update(lead)
            .map_err(|err| PipelineError::for_lead(err, lead_id))?;
        self.cache.apply(&PipelineMutation::Update { lead_id });
        info!(lead_id = %lead_id, "lead updated");

        if stored.stage_id != previous_stage {
            self.notify(PipelineEvent::StageChanged(StageTransition {
                lead_id,
                from: previous_stage,
                to: stored.stage_id.clone(),
                changed_at: now,
            }));
        }
        Ok(stored)
    }

    /// Create many leads, rejecting invalid rows individually.
    ///
    /// A storage failure aborts the import; rows stored before it stay stored.
    pub fn import_leads(
        &self,
        submissions: Vec<LeadSubmission>,
    ) -> Result<ImportSummary, PipelineError> {
        let mut summary = ImportSummary::default();
        let mut aborted = None;

        for (index, submission) in submissions.into_iter().enumerate() {
            match self.insert_submission(&submission) {
                Ok(lead) => summary.created.push(lead),
                Err(err) if err.is_retryable() => {
                    aborted = Some(err);
                    break;
                }
                Err(err) => summary.rejected.push(ImportRejection {
                    row: index + 1,
                    field: err.field(),
                    error: err.to_string(),
                }),
            }
        }

        self.cache.apply(&PipelineMutation::Import);
        for lead in &summary.created {
            self.notify(PipelineEvent::LeadCreated { lead: lead.clone() });
        }

        match aborted {
            Some(err) => {
                warn!(
                    created = summary.created.len(),
                    error = %err,
                    "lead import aborted"
                );
                Err(err)
            }
            None => {
                info!(
                    created = summary.created.len(),
                    rejected = summary.rejected.len(),
                    "lead import finished"
                );
                Ok(summary)
            }
        }
    }

    fn insert_submission(&self, submission: &LeadSubmission) -> Result<Lead, PipelineError> {
        let contact = validation::contact_from_submission(submission)?;
        let stage_id = submission
            .stage
            .clone()
            .unwrap_or_else(|| self.default_stage.clone());
        self.ensure_stage(&stage_id)?;

        let id = self.repository.next_id().map_err(PipelineError::storage)?;
        let now = Utc::now();
        let lead = Lead {
            id,
            full_name: contact.full_name,
            email: contact.email,
            phone: contact.phone,
            property_id: contact.property_id,
            message: contact.message,
            stage_id,
            source: submission.source,
            created_at: now,
            updated_at: now,
        };

        self.repository
            .insert(lead)
            .map_err(|err| PipelineError::for_lead(err, id))
    }

    fn ensure_stage(&self, stage_id: &StageId) -> Result<(), PipelineError> {
        if self.registry.contains(stage_id) {
            Ok(())
        } else {
            Err(PipelineError::StageNotFound(stage_id.clone()))
        }
    }

    fn fetch(&self, lead_id: LeadId) -> Result<Lead, PipelineError> {
        self.repository
            .fetch(lead_id)
            .map_err(|err| PipelineError::for_lead(err, lead_id))?
            .ok_or(PipelineError::LeadNotFound(lead_id))
    }

    fn notify(&self, event: PipelineEvent) {
        let lead_id = event.lead_id();
        if let Err(err) = self.notifier.publish(event) {
            warn!(lead_id = %lead_id, error = %err, "pipeline notification failed");
        }
    }
}

fn contact_of(lead: &Lead) -> ContactFields {
    ContactFields {
        full_name: lead.full_name.clone(),
        email: lead.email.clone(),
        phone: lead.phone.clone(),
        property_id: lead.property_id.clone(),
        message: lead.message.clone(),
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: Vec<Lead>,
    pub rejected: Vec<ImportRejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRejection {
    /// One-based data row.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub error: String,
}

/// Error raised by the pipeline service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] LeadValidationError),
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error("stage '{0}' not found")]
    StageNotFound(StageId),
    #[error("lead {0} already exists")]
    Conflict(LeadId),
    #[error("lead storage unavailable: {0}")]
    Transient(String),
}

impl PipelineError {
    fn storage(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unavailable(reason) => Self::Transient(reason),
            other => Self::Transient(other.to_string()),
        }
    }

    fn for_lead(err: RepositoryError, lead_id: LeadId) -> Self {
        match err {
            RepositoryError::NotFound => Self::LeadNotFound(lead_id),
            RepositoryError::Conflict => Self::Conflict(lead_id),
            RepositoryError::Unavailable(reason) => Self::Transient(reason),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::LeadNotFound(_) | Self::StageNotFound(_))
    }

    /// Transient failures can be retried with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(err) => Some(err.field()),
            Self::StageNotFound(_) => Some("stage"),
            _ => None,
        }
    }
}

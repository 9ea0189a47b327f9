use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use realty_crm::workflows::pipeline::{
    Lead, LeadId, LeadRepository, NotifyError, PipelineEvent, PipelineNotifier, RepositoryError,
    StageId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) stage_count: usize,
}

/// Process-local stand-in for the tenant database.
#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    records: Arc<Mutex<BTreeMap<LeadId, Lead>>>,
    last_id: Arc<AtomicI64>,
}

impl InMemoryLeadRepository {
    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<LeadId, Lead>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lead store lock poisoned".to_string()))
    }
}

impl LeadRepository for InMemoryLeadRepository {
    // Ids handed out stay reserved even if their insert never lands.
    fn next_id(&self) -> Result<LeadId, RepositoryError> {
        let guard = self.guard()?;
        let highest = guard.keys().next_back().map(|id| id.0).unwrap_or(0);
        self.last_id.fetch_max(highest, Ordering::SeqCst);
        Ok(LeadId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lead.id, lead.clone());
        Ok(lead)
    }

    fn update(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.guard()?;
        match guard.get_mut(&lead.id) {
            Some(existing) => {
                *existing = lead.clone();
                Ok(lead)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn update_stage(
        &self,
        id: LeadId,
        stage_id: &StageId,
        updated_at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        let mut guard = self.guard()?;
        let lead = guard.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        lead.stage_id = stage_id.clone();
        lead.updated_at = updated_at;
        Ok(lead.clone())
    }

    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.guard()?.get(&id).cloned())
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        Ok(self.guard()?.values().cloned().collect())
    }
}

/// Writes pipeline events to the activity log.
#[derive(Default, Clone, Copy)]
pub(crate) struct LogNotifier;

impl PipelineNotifier for LogNotifier {
    fn publish(&self, event: PipelineEvent) -> Result<(), NotifyError> {
        match &event {
            PipelineEvent::LeadCreated { lead } => {
                info!(lead_id = %lead.id, stage_id = %lead.stage_id, "activity: lead received");
            }
            PipelineEvent::StageChanged(transition) => {
                info!(
                    lead_id = %transition.lead_id,
                    from = %transition.from,
                    to = %transition.to,
                    "activity: lead moved"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realty_crm::workflows::pipeline::LeadSource;

    fn lead(id: i64) -> Lead {
        let now = Utc::now();
        Lead {
            id: LeadId(id),
            full_name: "Ana Souza".to_string(),
            email: "ana@x.com".to_string(),
            phone: None,
            property_id: None,
            message: None,
            stage_id: StageId::from("initial_contact"),
            source: LeadSource::Manual,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn ids_follow_the_highest_stored_lead() {
        let repository = InMemoryLeadRepository::default();
        assert_eq!(repository.next_id().expect("id"), LeadId(1));
        repository.insert(lead(41)).expect("insert");
        assert_eq!(repository.next_id().expect("id"), LeadId(42));
        assert!(matches!(
            repository.insert(lead(41)),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn reserved_ids_are_never_handed_out_twice() {
        let repository = InMemoryLeadRepository::default();
        let first = repository.next_id().expect("id");
        let second = repository.next_id().expect("id");
        assert_ne!(first, second);

        repository.insert(lead(second.0)).expect("insert");
        repository.insert(lead(first.0)).expect("late insert does not conflict");
        assert_eq!(repository.next_id().expect("id"), LeadId(3));
    }

    #[test]
    fn stage_updates_require_an_existing_lead() {
        let repository = InMemoryLeadRepository::default();
        let result = repository.update_stage(LeadId(7), &StageId::from("proposal"), Utc::now());
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::pipeline::domain::{Lead, LeadId, LeadSource, LeadSubmission};
use crate::workflows::pipeline::repository::{
    LeadRepository, NotifyError, PipelineEvent, PipelineNotifier, RepositoryError,
};
use crate::workflows::pipeline::stages::{StageId, StageRegistry, INITIAL_CONTACT};
use crate::workflows::pipeline::{pipeline_router, LeadPipelineService, StageMutationService};

pub(super) fn at_minute(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn submission(full_name: &str, email: &str, stage: Option<&str>) -> LeadSubmission {
    LeadSubmission {
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone: Some("+55 11 98888-7777".to_string()),
        property_id: Some("AP-301".to_string()),
        message: Some("Is the apartment still available?".to_string()),
        stage: stage.map(StageId::from),
        source: LeadSource::Website,
    }
}

pub(super) fn stored_lead(id: i64, stage: &str, minute: u32) -> Lead {
    Lead {
        id: LeadId(id),
        full_name: format!("Lead Number {id}"),
        email: format!("lead{id}@x.com"),
        phone: None,
        property_id: None,
        message: None,
        stage_id: StageId::from(stage),
        source: LeadSource::Portal,
        created_at: at_minute(minute),
        updated_at: at_minute(minute),
    }
}

pub(super) type MemoryPipeline = LeadPipelineService<MemoryRepository, MemoryNotifier>;

pub(super) fn build_service() -> (Arc<MemoryPipeline>, Arc<MemoryRepository>, Arc<MemoryNotifier>) {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = Arc::new(LeadPipelineService::new(
        repository.clone(),
        notifier.clone(),
        StageRegistry::standard(),
        StageId::from(INITIAL_CONTACT),
    ));
    (service, repository, notifier)
}

/// Service over a repository already holding the given leads.
pub(super) fn seeded_service(
    leads: Vec<Lead>,
) -> (Arc<MemoryPipeline>, Arc<MemoryRepository>, Arc<MemoryNotifier>) {
    let (service, repository, notifier) = build_service();
    for lead in leads {
        repository.insert(lead).expect("seed lead");
    }
    (service, repository, notifier)
}

pub(super) fn board_fixture() -> Vec<Lead> {
    vec![
        stored_lead(40, "initial_contact", 1),
        stored_lead(41, "qualification", 2),
        stored_lead(42, "scheduled_visit", 3),
        stored_lead(43, "scheduled_visit", 4),
        stored_lead(44, "proposal", 5),
    ]
}

pub(super) fn snapshot(repository: &MemoryRepository) -> BTreeMap<LeadId, Lead> {
    repository.records.lock().expect("repository mutex poisoned").clone()
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<BTreeMap<LeadId, Lead>>>,
    last_id: Arc<AtomicI64>,
}

impl LeadRepository for MemoryRepository {
    fn next_id(&self) -> Result<LeadId, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let highest = guard.keys().next_back().map(|id| id.0).unwrap_or(0);
        self.last_id.fetch_max(highest, Ordering::SeqCst);
        Ok(LeadId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(lead.id, lead.clone());
        Ok(lead)
    }

    fn update(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
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
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let lead = guard.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        lead.stage_id = stage_id.clone();
        lead.updated_at = updated_at;
        Ok(lead.clone())
    }

    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Reads succeed, every write fails as if the network dropped.
#[derive(Default, Clone)]
pub(super) struct ReadOnlyRepository {
    pub(super) inner: MemoryRepository,
}

impl LeadRepository for ReadOnlyRepository {
    fn next_id(&self) -> Result<LeadId, RepositoryError> {
        self.inner.next_id()
    }

    fn insert(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    fn update(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    fn update_stage(
        &self,
        _id: LeadId,
        _stage_id: &StageId,
        _updated_at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        self.inner.all()
    }
}

/// Adds network latency to id reservation and stage writes.
pub(super) struct SlowRepository {
    pub(super) inner: MemoryRepository,
    pub(super) delay: Duration,
}

impl LeadRepository for SlowRepository {
    fn next_id(&self) -> Result<LeadId, RepositoryError> {
        let id = self.inner.next_id();
        thread::sleep(self.delay);
        id
    }

    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.inner.insert(lead)
    }

    fn update(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.inner.update(lead)
    }

    fn update_stage(
        &self,
        id: LeadId,
        stage_id: &StageId,
        updated_at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        thread::sleep(self.delay);
        self.inner.update_stage(id, stage_id, updated_at)
    }

    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        self.inner.all()
    }
}

/// Accepts a fixed number of inserts, then drops the connection.
#[derive(Default)]
pub(super) struct DroppingRepository {
    pub(super) inner: MemoryRepository,
    pub(super) inserts_left: AtomicUsize,
}

impl DroppingRepository {
    pub(super) fn accepting(inserts: usize) -> Self {
        Self {
            inner: MemoryRepository::default(),
            inserts_left: AtomicUsize::new(inserts),
        }
    }
}

impl LeadRepository for DroppingRepository {
    fn next_id(&self) -> Result<LeadId, RepositoryError> {
        self.inner.next_id()
    }

    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let accepted = self
            .inserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if accepted {
            self.inner.insert(lead)
        } else {
            Err(RepositoryError::Unavailable("connection reset".to_string()))
        }
    }

    fn update(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.inner.update(lead)
    }

    fn update_stage(
        &self,
        id: LeadId,
        stage_id: &StageId,
        updated_at: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        self.inner.update_stage(id, stage_id, updated_at)
    }

    fn fetch(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        self.inner.all()
    }
}

pub(super) type SlowPipeline = LeadPipelineService<SlowRepository, MemoryNotifier>;

/// Pipeline over the board fixture whose writes take `delay_ms` each.
pub(super) fn slow_service(delay_ms: u64) -> Arc<SlowPipeline> {
    let inner = MemoryRepository::default();
    for lead in board_fixture() {
        inner.insert(lead).expect("seed lead");
    }
    Arc::new(LeadPipelineService::new(
        Arc::new(SlowRepository {
            inner,
            delay: Duration::from_millis(delay_ms),
        }),
        Arc::new(MemoryNotifier::default()),
        StageRegistry::standard(),
        StageId::from(INITIAL_CONTACT),
    ))
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl PipelineNotifier for MemoryNotifier {
    fn publish(&self, event: PipelineEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl PipelineNotifier for OfflineNotifier {
    fn publish(&self, _event: PipelineEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

pub(super) fn mutation_service(
    leads: Vec<Lead>,
) -> (
    Arc<StageMutationService<MemoryRepository, MemoryNotifier>>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let (pipeline, repository, notifier) = seeded_service(leads);
    (
        Arc::new(StageMutationService::new(pipeline)),
        repository,
        notifier,
    )
}

pub(super) fn router_with_leads(leads: Vec<Lead>) -> (axum::Router, Arc<MemoryRepository>) {
    let (service, repository, _) = seeded_service(leads);
    (pipeline_router(service), repository)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

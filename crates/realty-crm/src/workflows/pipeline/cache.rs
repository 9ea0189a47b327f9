//! Process-wide cache of derived pipeline views.
//!
//! Every write goes through a [`PipelineMutation`], which names the [`QueryKey`]s it makes
//! stale. Views are never patched in place: an invalidated key is re-derived from the
//! repository on its next read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::domain::{Lead, LeadId};
use super::view::PipelineView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Stages-with-leads grouped view.
    PipelineBoard,
    Lead(LeadId),
}

/// Writes the pipeline service performs, with the cached views each one invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineMutation {
    Create,
    Reassign { lead_id: LeadId },
    Update { lead_id: LeadId },
    Import,
}

impl PipelineMutation {
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            PipelineMutation::Create | PipelineMutation::Import => vec![QueryKey::PipelineBoard],
            PipelineMutation::Reassign { lead_id } | PipelineMutation::Update { lead_id } => {
                vec![QueryKey::PipelineBoard, QueryKey::Lead(*lead_id)]
            }
        }
    }
}

#[derive(Debug, Clone)]
enum CachedQuery {
    Board(Arc<PipelineView>),
    Lead(Arc<Lead>),
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CachedQuery>>,
    generation: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn contains(&self, key: QueryKey) -> bool {
        self.entries().contains_key(&key)
    }

    pub fn board<E, F>(&self, load: F) -> Result<Arc<PipelineView>, E>
    where
        F: FnOnce() -> Result<PipelineView, E>,
    {
        if let Some(CachedQuery::Board(view)) = self.entries().get(&QueryKey::PipelineBoard) {
            return Ok(Arc::clone(view));
        }

        let generation = self.generation();
        let view = Arc::new(load()?);
        debug!(generation, total = view.total, "pipeline board derived");
        self.store(
            generation,
            QueryKey::PipelineBoard,
            CachedQuery::Board(Arc::clone(&view)),
        );
        Ok(view)
    }

    pub fn lead<E, F>(&self, id: LeadId, load: F) -> Result<Arc<Lead>, E>
    where
        F: FnOnce() -> Result<Lead, E>,
    {
        if let Some(CachedQuery::Lead(lead)) = self.entries().get(&QueryKey::Lead(id)) {
            return Ok(Arc::clone(lead));
        }

        let generation = self.generation();
        let lead = Arc::new(load()?);
        self.store(generation, QueryKey::Lead(id), CachedQuery::Lead(Arc::clone(&lead)));
        Ok(lead)
    }

    pub fn invalidate(&self, keys: &[QueryKey]) {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(key);
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, ?keys, "query cache invalidated");
    }

    pub fn apply(&self, mutation: &PipelineMutation) {
        self.invalidate(&mutation.invalidates());
    }

    pub fn clear(&self) {
        self.entries().clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    // A load that raced with an invalidation is returned to its caller but not kept.
    fn store(&self, loaded_at: u64, key: QueryKey, value: CachedQuery) {
        let mut entries = self.entries();
        if self.generation() == loaded_at {
            entries.insert(key, value);
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CachedQuery>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

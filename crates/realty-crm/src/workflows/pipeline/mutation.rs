use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::cache::QueryKey;
use super::domain::{Lead, LeadId};
use super::repository::{LeadRepository, PipelineNotifier};
use super::service::{LeadPipelineService, PipelineError};
use super::stages::StageId;
use super::view::PipelineView;

/// A captured drag: which lead, where it was picked up, and where it was dropped.
///
/// Until [`StageMutationService::commit`] succeeds the lead is still shown in its origin stage.
#[derive(Debug, PartialEq, Eq)]
pub struct TentativeMove {
    lead_id: LeadId,
    from: StageId,
    to: StageId,
}

impl TentativeMove {
    pub fn lead_id(&self) -> LeadId {
        self.lead_id
    }

    pub fn origin(&self) -> &StageId {
        &self.from
    }

    pub fn target(&self) -> &StageId {
        &self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("lead {active} is already being moved")]
    MoveInFlight { active: LeadId },
    #[error("no move in flight for lead {0}")]
    NotInFlight(LeadId),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Mediates drag-and-drop and form-driven stage changes for one board.
///
/// Only one move may be in flight at a time. A failed commit leaves the board exactly as it
/// was before the drag started.
pub struct StageMutationService<R, N> {
    pipeline: Arc<LeadPipelineService<R, N>>,
    in_flight: Mutex<Option<LeadId>>,
}

impl<R, N> StageMutationService<R, N>
where
    R: LeadRepository + 'static,
    N: PipelineNotifier + 'static,
{
    pub fn new(pipeline: Arc<LeadPipelineService<R, N>>) -> Self {
        Self {
            pipeline,
            in_flight: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<LeadPipelineService<R, N>> {
        &self.pipeline
    }

    /// Authoritative grouped view; a dragged lead appears in its origin stage.
    pub fn board(&self) -> Result<Arc<PipelineView>, MutationError> {
        Ok(self.pipeline.grouped_view()?)
    }

    pub fn in_flight(&self) -> Option<LeadId> {
        *self.slot()
    }

    /// First phase: validate the drop target and claim the in-flight slot.
    pub fn begin_move(
        &self,
        lead_id: LeadId,
        target: StageId,
    ) -> Result<TentativeMove, MutationError> {
        if !self.pipeline.registry().contains(&target) {
            return Err(PipelineError::StageNotFound(target).into());
        }

        let lead = self.pipeline.get_lead(lead_id)?;

        let mut slot = self.slot();
        if let Some(active) = *slot {
            return Err(MutationError::MoveInFlight { active });
        }
        *slot = Some(lead_id);

        debug!(lead_id = %lead_id, from = %lead.stage_id, to = %target, "stage move started");
        Ok(TentativeMove {
            lead_id,
            from: lead.stage_id,
            to: target,
        })
    }

    /// Second phase: persist the move. The slot is released whatever the outcome.
    pub fn commit(&self, pending: TentativeMove) -> Result<Lead, MutationError> {
        self.claimed(pending.lead_id)?;

        let result = self.pipeline.reassign_stage(pending.lead_id, &pending.to);
        self.release(pending.lead_id);

        match result {
            Ok(lead) => {
                if let Err(err) = self.pipeline.grouped_view() {
                    warn!(lead_id = %lead.id, error = %err, "board refresh after move failed");
                }
                Ok(lead)
            }
            Err(err) => {
                warn!(
                    lead_id = %pending.lead_id,
                    from = %pending.from,
                    to = %pending.to,
                    error = %err,
                    "stage move rolled back"
                );
                if err.is_not_found() {
                    self.pipeline.cache().invalidate(&[
                        QueryKey::PipelineBoard,
                        QueryKey::Lead(pending.lead_id),
                    ]);
                }
                Err(err.into())
            }
        }
    }

    /// Abandon a drag without contacting the repository.
    pub fn cancel(&self, pending: TentativeMove) {
        self.release(pending.lead_id);
        debug!(lead_id = %pending.lead_id, "stage move cancelled");
    }

    /// Single-step move used by the edit form.
    pub fn move_lead(&self, lead_id: LeadId, target: StageId) -> Result<Lead, MutationError> {
        let pending = self.begin_move(lead_id, target)?;
        self.commit(pending)
    }

    fn claimed(&self, lead_id: LeadId) -> Result<(), MutationError> {
        match *self.slot() {
            Some(active) if active == lead_id => Ok(()),
            _ => Err(MutationError::NotInFlight(lead_id)),
        }
    }

    fn release(&self, lead_id: LeadId) {
        let mut slot = self.slot();
        if *slot == Some(lead_id) {
            *slot = None;
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<LeadId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

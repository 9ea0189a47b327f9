use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use super::domain::{Lead, LeadId};
use super::stages::{StageId, StageRegistry};

/// One kanban column: a stage and the leads currently in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageColumn {
    pub id: StageId,
    pub name: String,
    pub ordinal: u32,
    pub count: usize,
    pub leads: Vec<Lead>,
}

/// Partition of every lead by its current stage, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineView {
    pub stages: Vec<StageColumn>,
    /// Leads pointing at a stage the registry no longer knows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unassigned: Vec<Lead>,
    pub total: usize,
}

impl PipelineView {
    pub fn column(&self, id: &StageId) -> Option<&StageColumn> {
        self.stages.iter().find(|column| &column.id == id)
    }

    pub fn count(&self, id: &StageId) -> usize {
        self.column(id).map(|column| column.count).unwrap_or(0)
    }

    pub fn stage_of(&self, lead_id: LeadId) -> Option<&StageId> {
        self.stages
            .iter()
            .find(|column| column.leads.iter().any(|lead| lead.id == lead_id))
            .map(|column| &column.id)
    }

    pub fn lead_ids(&self) -> Vec<LeadId> {
        self.stages
            .iter()
            .flat_map(|column| column.leads.iter())
            .chain(self.unassigned.iter())
            .map(|lead| lead.id)
            .collect()
    }
}

/// Derive the grouped view from the authoritative lead set.
///
/// Leads inside a column are most recent first; equal timestamps fall back to the higher id.
pub fn group_leads(registry: &StageRegistry, leads: Vec<Lead>) -> PipelineView {
    let total = leads.len();
    let mut buckets: HashMap<StageId, Vec<Lead>> = registry
        .list_stages()
        .iter()
        .map(|stage| (stage.id.clone(), Vec::new()))
        .collect();
    let mut unassigned = Vec::new();

    for lead in leads {
        match buckets.get_mut(&lead.stage_id) {
            Some(bucket) => bucket.push(lead),
            None => {
                warn!(lead_id = %lead.id, stage_id = %lead.stage_id, "lead references unknown stage");
                unassigned.push(lead);
            }
        }
    }

    let stages = registry
        .list_stages()
        .iter()
        .map(|stage| {
            let mut leads = buckets.remove(&stage.id).unwrap_or_default();
            sort_recent_first(&mut leads);
            StageColumn {
                id: stage.id.clone(),
                name: stage.name.clone(),
                ordinal: stage.ordinal,
                count: leads.len(),
                leads,
            }
        })
        .collect();

    sort_recent_first(&mut unassigned);

    PipelineView {
        stages,
        unassigned,
        total,
    }
}

fn sort_recent_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

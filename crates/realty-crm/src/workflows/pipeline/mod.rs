//! Lead pipeline: stage registry, lead store, stage moves, and the cached grouped view.

pub mod cache;
pub mod domain;
pub mod import;
pub mod mutation;
pub mod repository;
pub mod router;
pub mod service;
pub mod stages;
pub(crate) mod validation;
pub mod view;

#[cfg(test)]
mod tests;

pub use cache::{PipelineMutation, QueryCache, QueryKey};
pub use domain::{
    Lead, LeadId, LeadSource, LeadSubmission, LeadUpdate, StageReassignment, StageTransition,
};
pub use import::{LeadCsvImporter, LeadImportError};
pub use mutation::{MutationError, StageMutationService, TentativeMove};
pub use repository::{
    LeadRepository, NoopNotifier, NotifyError, PipelineEvent, PipelineNotifier, RepositoryError,
};
pub use router::pipeline_router;
pub use service::{ImportRejection, ImportSummary, LeadPipelineService, PipelineError};
pub use stages::{
    standard_stage_definitions, Stage, StageDefinition, StageId, StageRegistry,
    StageRegistryError, INITIAL_CONTACT,
};
pub use validation::LeadValidationError;
pub use view::{group_leads, PipelineView, StageColumn};

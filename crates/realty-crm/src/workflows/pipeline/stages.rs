use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a pipeline stage, e.g. `scheduled_visit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A named step of the sales pipeline. `ordinal` is the left-to-right column position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub ordinal: u32,
}

/// Configured stage before ordinals are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub id: StageId,
    pub name: String,
}

impl StageDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StageId(id.into()),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageRegistryError {
    #[error("stage '{0}' is configured more than once")]
    DuplicateStage(StageId),
    #[error("stage at position {position} has a blank id")]
    BlankStageId { position: usize },
}

pub const INITIAL_CONTACT: &str = "initial_contact";

/// Ordered, read-only set of pipeline stages for the current deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRegistry {
    stages: Vec<Stage>,
}

impl StageRegistry {
    pub fn new(definitions: Vec<StageDefinition>) -> Result<Self, StageRegistryError> {
        let mut seen = HashSet::new();
        let mut stages = Vec::with_capacity(definitions.len());

        for (position, definition) in definitions.into_iter().enumerate() {
            let id = StageId(definition.id.0.trim().to_string());
            if id.0.is_empty() {
                return Err(StageRegistryError::BlankStageId { position });
            }
            if !seen.insert(id.clone()) {
                return Err(StageRegistryError::DuplicateStage(id));
            }

            let name = match definition.name.trim() {
                "" => id.0.clone(),
                name => name.to_string(),
            };

            stages.push(Stage {
                id,
                name,
                ordinal: position as u32,
            });
        }

        Ok(Self { stages })
    }

    /// The pipeline brokers get before customising their settings.
    pub fn standard() -> Self {
        Self {
            stages: standard_stage_definitions()
                .into_iter()
                .enumerate()
                .map(|(position, definition)| Stage {
                    id: definition.id,
                    name: definition.name,
                    ordinal: position as u32,
                })
                .collect(),
        }
    }

    pub fn list_stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn get(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|stage| &stage.id == id)
    }

    pub fn contains(&self, id: &StageId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

pub fn standard_stage_definitions() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new(INITIAL_CONTACT, "Initial contact"),
        StageDefinition::new("qualification", "Qualification"),
        StageDefinition::new("scheduled_visit", "Scheduled visit"),
        StageDefinition::new("proposal", "Proposal"),
        StageDefinition::new("negotiation", "Negotiation"),
        StageDefinition::new("closed", "Closed"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_orders_stages_by_position() {
        let registry = StageRegistry::standard();
        let ordinals: Vec<u32> = registry
            .list_stages()
            .iter()
            .map(|stage| stage.ordinal)
            .collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(registry.list_stages()[0].id.as_str(), INITIAL_CONTACT);
        assert!(registry.contains(&StageId::from("proposal")));
    }

    #[test]
    fn rejects_duplicate_stage_ids() {
        let result = StageRegistry::new(vec![
            StageDefinition::new("proposal", "Proposal"),
            StageDefinition::new(" proposal ", "Proposal again"),
        ]);
        assert_eq!(
            result,
            Err(StageRegistryError::DuplicateStage(StageId::from("proposal")))
        );
    }

    #[test]
    fn rejects_blank_ids_and_defaults_blank_names() {
        let result = StageRegistry::new(vec![StageDefinition::new("  ", "Nameless")]);
        assert_eq!(result, Err(StageRegistryError::BlankStageId { position: 0 }));

        let registry = StageRegistry::new(vec![StageDefinition::new("visit", "")])
            .expect("registry builds");
        assert_eq!(registry.list_stages()[0].name, "visit");
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = StageRegistry::new(Vec::new()).expect("empty registry builds");
        assert!(registry.is_empty());
        assert!(registry.list_stages().is_empty());
    }
}

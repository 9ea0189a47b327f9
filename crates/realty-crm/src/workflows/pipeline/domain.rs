use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stages::StageId;

/// Identifier wrapper for leads; assigned by the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub i64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel a lead arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Website,
    Portal,
    Referral,
    Phone,
    WalkIn,
    Manual,
}

impl LeadSource {
    pub fn label(&self) -> &'static str {
        match self {
            LeadSource::Website => "website",
            LeadSource::Portal => "portal",
            LeadSource::Referral => "referral",
            LeadSource::Phone => "phone",
            LeadSource::WalkIn => "walk_in",
            LeadSource::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "website" | "site" => Some(Self::Website),
            "portal" => Some(Self::Portal),
            "referral" => Some(Self::Referral),
            "phone" | "whatsapp" => Some(Self::Phone),
            "walk_in" => Some(Self::WalkIn),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A prospective client tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stage_id: StageId,
    pub source: LeadSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form payload used to create a lead. `stage` falls back to the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stage: Option<StageId>,
    pub source: LeadSource,
}

/// Partial edit of a lead. Absent fields are left untouched; a present stage is a reassignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stage_id: Option<StageId>,
}

impl LeadUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Payload accepted by the reassignment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReassignment {
    pub lead_id: LeadId,
    pub new_stage_id: StageId,
}

/// Record of a committed stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransition {
    pub lead_id: LeadId,
    pub from: StageId,
    pub to: StageId,
    pub changed_at: DateTime<Utc>,
}

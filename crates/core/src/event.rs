//! Resource change events and results exchanged with the provisioning framework.
//!
//! Field names follow the camelCase protocol shape; the framework's native names
//! (`RequestType`, `ResourceProperties`, ...) are accepted as aliases so raw
//! framework payloads deserialize without a translation step.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as Json};

use crate::{DEFAULT_METADATA_FIELD, DEFAULT_TEXT_FIELD};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeType::Create => "Create",
            ChangeType::Update => "Update",
            ChangeType::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// One change event per invocation. `P` is the resource-specific property bag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChangeEvent<P = IndexSpec> {
    #[serde(alias = "RequestType")]
    pub change_type: ChangeType,
    #[serde(alias = "ResourceProperties")]
    pub properties: P,
    #[serde(alias = "RequestId")]
    pub request_id: String,
    #[serde(alias = "LogicalResourceId")]
    pub logical_id: String,
    #[serde(default, alias = "StackId", skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    /// Present on Update/Delete when the framework already knows the physical id.
    #[serde(default, alias = "PhysicalResourceId", skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
}

/// Completion report handed back to the framework. Always constructed, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChangeResult {
    pub status: Status,
    pub request_id: String,
    pub logical_id: String,
    pub physical_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Json>,
}

impl ResourceChangeResult {
    /// Success report echoing the correlation ids of `event`.
    pub fn success<P>(event: &ResourceChangeEvent<P>, physical_id: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            request_id: event.request_id.clone(),
            logical_id: event.logical_id.clone(),
            physical_id: physical_id.into(),
            stack_id: event.stack_id.clone(),
            data: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Identifies one external vector index and its field layout.
///
/// Decoding is lenient: absent fields come back empty and an unreadable
/// dimension comes back as 0, so a partial payload (a Delete carrying only
/// `indexName`) still decodes and [`IndexSpec::validate`] reports the problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSpec {
    pub index_name: String,
    #[serde(alias = "dimensions", deserialize_with = "de_dimension")]
    pub vector_dimension: u32,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("index name must not be empty")]
    EmptyName,
    #[error("invalid index name {0:?}: must be lowercase and must not start with '_', '-' or '+' or contain spaces or any of \\/*?\"<>|,#:")]
    InvalidName(String),
    #[error("vector dimension must be greater than zero")]
    ZeroDimension,
    #[error("{0} field name must not be empty")]
    EmptyField(&'static str),
    #[error("field {0:?} is mapped more than once")]
    DuplicateField(String),
}

impl IndexSpec {
    /// Spec with the conventional layout: vector field named after the index,
    /// `TEXT_CHUNK` for text and `METADATA` for stored metadata.
    pub fn for_index(index_name: impl Into<String>, vector_dimension: u32) -> Self {
        let index_name = index_name.into();
        Self {
            vector_field: index_name.clone(),
            index_name,
            vector_dimension,
            text_field: DEFAULT_TEXT_FIELD.to_string(),
            metadata_field: DEFAULT_METADATA_FIELD.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.index_name.is_empty() {
            return Err(SpecError::EmptyName);
        }
        if !is_valid_index_name(&self.index_name) {
            return Err(SpecError::InvalidName(self.index_name.clone()));
        }
        if self.vector_dimension == 0 {
            return Err(SpecError::ZeroDimension);
        }
        for (label, field) in [("vector", &self.vector_field), ("text", &self.text_field), ("metadata", &self.metadata_field)] {
            if field.is_empty() {
                return Err(SpecError::EmptyField(label));
            }
        }
        if self.vector_field == self.text_field || self.vector_field == self.metadata_field {
            return Err(SpecError::DuplicateField(self.vector_field.clone()));
        }
        if self.text_field == self.metadata_field {
            return Err(SpecError::DuplicateField(self.text_field.clone()));
        }
        Ok(())
    }
}

fn is_valid_index_name(name: &str) -> bool {
    const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];
    if name.starts_with(['_', '-', '+']) {
        return false;
    }
    !name.chars().any(|c| c.is_uppercase() || FORBIDDEN.contains(&c))
}

// The framework stringifies every property, so "1024" and 1024 are both accepted.
// Anything else (blank, negative, fractional, out of range) decodes as 0.
fn de_dimension<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = Json::deserialize(d)?;
    let n = match &raw {
        Json::Number(n) => n.as_u64(),
        Json::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(n.and_then(|n| u32::try_from(n).ok()).unwrap_or(0))
}

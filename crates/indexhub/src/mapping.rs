//! Index creation request derived from an [`IndexSpec`].

use std::collections::BTreeMap;

use kbindex_core::IndexSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    KnnVector,
    Text,
}

/// Approximate nearest-neighbour method for a vector field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorMethod {
    pub name: String,
    pub engine: String,
    pub space_type: String,
}

impl Default for VectorMethod {
    fn default() -> Self {
        Self { name: "hnsw".into(), engine: "faiss".into(), space_type: "l2".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMapping {
    pub kind: FieldKind,
    pub indexed: bool,
    pub dimension: Option<u32>,
    pub method: Option<VectorMethod>,
}

impl FieldMapping {
    pub fn vector(dimension: u32, method: VectorMethod) -> Self {
        Self { kind: FieldKind::KnnVector, indexed: true, dimension: Some(dimension), method: Some(method) }
    }

    pub fn text(indexed: bool) -> Self {
        Self { kind: FieldKind::Text, indexed, dimension: None, method: None }
    }

    fn to_json(&self) -> Json {
        match self.kind {
            FieldKind::Text => json!({ "type": "text", "index": self.indexed }),
            FieldKind::KnnVector => {
                let mut v = json!({ "type": "knn_vector", "dimension": self.dimension.unwrap_or(0) });
                if let Some(m) = &self.method {
                    v["method"] = json!({ "name": m.name, "space_type": m.space_type, "engine": m.engine });
                }
                v
            }
        }
    }
}

/// Full creation payload: k-NN enabled settings plus one mapping per field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexCreationRequest {
    pub knn: bool,
    pub fields: BTreeMap<String, FieldMapping>,
}

impl IndexCreationRequest {
    pub fn from_spec(spec: &IndexSpec) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(spec.vector_field.clone(), FieldMapping::vector(spec.vector_dimension, VectorMethod::default()));
        fields.insert(spec.text_field.clone(), FieldMapping::text(true));
        fields.insert(spec.metadata_field.clone(), FieldMapping::text(false));
        Self { knn: true, fields }
    }

    /// The (single) vector field, if any.
    pub fn vector_field(&self) -> Option<(&str, &FieldMapping)> {
        self.fields.iter().find(|(_, f)| f.kind == FieldKind::KnnVector).map(|(k, f)| (k.as_str(), f))
    }

    /// Request body in the index store's wire shape.
    pub fn to_body(&self) -> Json {
        let properties: Map<String, Json> = self.fields.iter().map(|(k, f)| (k.clone(), f.to_json())).collect();
        json!({
            "settings": { "index": { "knn": self.knn } },
            "mappings": { "properties": properties },
        })
    }
}

//! Data-access policy document built from a sequence of grants.
//!
//! The aggregator is a single-writer accumulator: grant methods take `&mut self`,
//! so concurrent grants against one instance are ruled out at compile time and no
//! internal locking exists. Statements are only ever appended.

use std::collections::BTreeSet;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ArnResolver, PolicyResult, Principal};

pub const COLLECTION_READ: &[&str] = &["aoss:DescribeCollectionItems"];
pub const COLLECTION_READ_WRITE_EXTRA: &[&str] = &[
    "aoss:CreateCollectionItems",
    "aoss:DeleteCollectionItems",
    "aoss:UpdateCollectionItems",
    "aoss:*",
];
pub const INDEX_READ: &[&str] = &["aoss:DescribeIndex", "aoss:ReadDocument"];
pub const INDEX_READ_WRITE_EXTRA: &[&str] = &[
    "aoss:CreateIndex",
    "aoss:WriteDocument",
    "aoss:DeleteIndex",
    "aoss:UpdateIndex",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Collection,
    Index,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    #[serde(rename = "ResourceType")]
    pub resource_type: ResourceType,
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
    #[serde(rename = "Permission")]
    pub permission: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantStatement {
    #[serde(rename = "Rules")]
    pub rules: Vec<Rule>,
    #[serde(rename = "Principal")]
    pub principal: Vec<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GrantStatement {
    /// Permissions granted on the given resource type, across all rules.
    pub fn permissions(&self, resource_type: ResourceType) -> BTreeSet<&str> {
        self.rules
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .flat_map(|r| r.permission.iter().map(|p| p.as_str()))
            .collect()
    }
}

/// Ordered, append-only list of statements. Duplicated principals are kept as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PolicyDocument {
    statements: Vec<GrantStatement>,
}

impl PolicyDocument {
    pub fn statements(&self) -> &[GrantStatement] { &self.statements }
    pub fn len(&self) -> usize { self.statements.len() }
    pub fn is_empty(&self) -> bool { self.statements.is_empty() }

    fn push(&mut self, st: GrantStatement) { self.statements.push(st); }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    ReadWrite,
}

fn permission_set(base: &[&str], extra: &[&str], access: Access) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = base.iter().map(|s| s.to_string()).collect();
    if access == Access::ReadWrite {
        set.extend(extra.iter().map(|s| s.to_string()));
    }
    set
}

/// Accumulates grants for one collection and keeps the serialized document current.
#[derive(Debug, Clone)]
pub struct PolicyAggregator {
    collection: String,
    resolver: ArnResolver,
    document: PolicyDocument,
    published: String,
}

impl PolicyAggregator {
    pub fn new(collection: impl Into<String>, resolver: ArnResolver) -> Self {
        Self { collection: collection.into(), resolver, document: PolicyDocument::default(), published: "[]".to_string() }
    }

    pub fn collection(&self) -> &str { &self.collection }
    pub fn document(&self) -> &PolicyDocument { &self.document }
    pub fn resolver(&self) -> &ArnResolver { &self.resolver }

    /// The serialized document as of the last grant call.
    pub fn published(&self) -> &str { &self.published }

    pub fn grant_read(&mut self, principal: &Principal) -> PolicyResult<()> {
        self.grant(principal, Access::Read)
    }

    pub fn grant_read_write(&mut self, principal: &Principal) -> PolicyResult<()> {
        self.grant(principal, Access::ReadWrite)
    }

    fn grant(&mut self, principal: &Principal, access: Access) -> PolicyResult<()> {
        // Resolve first: a failed grant leaves the document untouched.
        let arn = self.resolver.resolve(principal)?;
        let statement = GrantStatement {
            rules: vec![
                Rule {
                    resource_type: ResourceType::Collection,
                    resource: vec![format!("collection/{}", self.collection)],
                    permission: permission_set(COLLECTION_READ, COLLECTION_READ_WRITE_EXTRA, access),
                },
                Rule {
                    resource_type: ResourceType::Index,
                    resource: vec![format!("index/{}/*", self.collection)],
                    permission: permission_set(INDEX_READ, INDEX_READ_WRITE_EXTRA, access),
                },
            ],
            principal: vec![arn],
            description: None,
        };
        debug!(collection = %self.collection, principal = %statement.principal[0], access = ?access, "policy grant");
        self.document.push(statement);
        self.publish();
        counter!("policy_grants_total", 1u64);
        Ok(())
    }

    fn publish(&mut self) {
        // Serializing plain strings and sets cannot fail.
        self.published = serde_json::to_string(&self.document).unwrap_or_else(|_| "[]".to_string());
    }
}

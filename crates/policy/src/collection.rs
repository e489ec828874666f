//! Vector collection with its security policies and access grants.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::{ArnResolver, PolicyAggregator, PolicyResult, Principal};

/// Principal-side action that lets callers reach the collection's data plane at all.
pub const API_ACCESS_ACTION: &str = "aoss:APIAccessAll";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionType {
    Search,
    Timeseries,
    #[default]
    Vectorsearch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProps {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Customer-managed key; an AWS-owned key is used when absent.
    #[serde(default)]
    pub kms_key_arn: Option<String>,
    #[serde(default)]
    pub allow_public_access: bool,
    #[serde(default)]
    pub source_services: Vec<String>,
    #[serde(default)]
    pub vpc_endpoints: Vec<String>,
    #[serde(default)]
    pub standby_replicas: bool,
    #[serde(default, rename = "type")]
    pub kind: CollectionType,
}

/// Identity-based statement to attach to the principal itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IamGrant {
    pub principal_arn: String,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Collection {
    props: CollectionProps,
    access: PolicyAggregator,
}

impl Collection {
    pub fn new(mut props: CollectionProps, resolver: ArnResolver) -> Self {
        props.name = props.name.to_lowercase();
        let access = PolicyAggregator::new(props.name.clone(), resolver);
        Self { props, access }
    }

    pub fn name(&self) -> &str { &self.props.name }
    pub fn props(&self) -> &CollectionProps { &self.props }
    pub fn data_access_policy(&self) -> &PolicyAggregator { &self.access }

    pub fn grant_read(&mut self, principal: &Principal) -> PolicyResult<IamGrant> {
        self.access.grant_read(principal)?;
        self.api_access(principal)
    }

    pub fn grant_read_write(&mut self, principal: &Principal) -> PolicyResult<IamGrant> {
        self.access.grant_read_write(principal)?;
        self.api_access(principal)
    }

    fn api_access(&self, principal: &Principal) -> PolicyResult<IamGrant> {
        Ok(IamGrant {
            principal_arn: self.access.resolver().resolve(principal)?,
            actions: vec![API_ACCESS_ACTION.to_string()],
            resources: vec!["*".to_string()],
        })
    }

    pub fn encryption_policy(&self) -> Json {
        let mut policy = json!({
            "Rules": [{ "Resource": [self.resource()], "ResourceType": "collection" }],
            "AWSOwnedKey": self.props.kms_key_arn.is_none(),
        });
        if let Some(key) = &self.props.kms_key_arn {
            policy["KmsARN"] = Json::String(key.clone());
        }
        policy
    }

    /// Network policy; `None` when the collection is reachable from nowhere.
    pub fn network_policy(&self) -> Option<Json> {
        let p = &self.props;
        if !p.allow_public_access && p.source_services.is_empty() && p.vpc_endpoints.is_empty() {
            return None;
        }
        let mut rule = json!({
            "AllowFromPublic": p.allow_public_access,
            "Rules": [
                { "Resource": [self.resource()], "ResourceType": "dashboard" },
                { "Resource": [self.resource()], "ResourceType": "collection" },
            ],
        });
        // Source restrictions are meaningless once public access is on.
        if !p.allow_public_access {
            if !p.vpc_endpoints.is_empty() {
                rule["SourceVPCEndpoints"] = json!(p.vpc_endpoints);
            }
            if !p.source_services.is_empty() {
                rule["SourceServices"] = json!(p.source_services);
            }
        }
        Some(Json::Array(vec![rule]))
    }

    fn resource(&self) -> String { format!("collection/{}", self.props.name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str) -> CollectionProps { CollectionProps { name: name.into(), ..Default::default() } }

    #[test]
    fn name_is_lowercased_everywhere() {
        let c = Collection::new(props("KbVectors"), ArnResolver::new("1"));
        assert_eq!(c.name(), "kbvectors");
        assert_eq!(c.encryption_policy()["Rules"][0]["Resource"][0], "collection/kbvectors");
        assert_eq!(c.data_access_policy().collection(), "kbvectors");
    }

    #[test]
    fn encryption_uses_owned_key_unless_kms_given() {
        let c = Collection::new(props("a"), ArnResolver::default());
        assert_eq!(c.encryption_policy()["AWSOwnedKey"], true);
        assert!(c.encryption_policy().get("KmsARN").is_none());

        let mut p = props("a");
        p.kms_key_arn = Some("arn:aws:kms:eu-west-1:1:key/k".into());
        let c = Collection::new(p, ArnResolver::default());
        assert_eq!(c.encryption_policy()["AWSOwnedKey"], false);
        assert_eq!(c.encryption_policy()["KmsARN"], "arn:aws:kms:eu-west-1:1:key/k");
    }

    #[test]
    fn network_policy_only_when_reachable() {
        assert!(Collection::new(props("a"), ArnResolver::default()).network_policy().is_none());

        let mut p = props("a");
        p.source_services = vec!["bedrock.amazonaws.com".into()];
        p.vpc_endpoints = vec!["vpce-1".into()];
        let net = Collection::new(p, ArnResolver::default()).network_policy().unwrap();
        assert_eq!(net[0]["AllowFromPublic"], false);
        assert_eq!(net[0]["SourceServices"][0], "bedrock.amazonaws.com");
        assert_eq!(net[0]["SourceVPCEndpoints"][0], "vpce-1");

        let mut p = props("a");
        p.allow_public_access = true;
        p.vpc_endpoints = vec!["vpce-1".into()];
        let net = Collection::new(p, ArnResolver::default()).network_policy().unwrap();
        assert_eq!(net[0]["AllowFromPublic"], true);
        assert!(net[0].get("SourceVPCEndpoints").is_none());
    }

    #[test]
    fn grants_record_statement_and_api_access() {
        let mut c = Collection::new(props("a"), ArnResolver::new("123"));
        let g = c.grant_read(&Principal::service("bedrock.amazonaws.com")).unwrap();
        assert_eq!(g.principal_arn, "arn:aws:iam::123:role/service-role/bedrock.amazonaws.com");
        assert_eq!(g.actions, vec![API_ACCESS_ACTION.to_string()]);
        assert_eq!(c.data_access_policy().document().len(), 1);
    }
}

//! Principal references and their resolution to identity ARNs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as Json};

use crate::{PolicyError, PolicyResult};

/// An IAM entity (role, user or group) known by its own ARN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub arn: String,
    /// Any other attributes the reference carries. These never take part in resolution.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Json>,
}

impl Entity {
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into(), attributes: Map::new() }
    }
}

/// Something that can be granted access.
///
/// Variants are listed in resolution order; `Other` is the fallback for
/// references that only promise an `arn` attribute. Input objects without a
/// `type` tag decode as `Other`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Principal {
    Account { id: String },
    Arn { arn: String },
    Service { name: String },
    Role(Entity),
    User(Entity),
    Group(Entity),
    Grantable { inner: Box<Principal> },
    Other(Map<String, Json>),
}

/// Tagged shapes of the known variants.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tagged {
    Account { id: String },
    Arn { arn: String },
    Service { name: String },
    Role(Entity),
    User(Entity),
    Group(Entity),
    Grantable { inner: Box<Principal> },
}

impl From<Tagged> for Principal {
    fn from(t: Tagged) -> Self {
        match t {
            Tagged::Account { id } => Principal::Account { id },
            Tagged::Arn { arn } => Principal::Arn { arn },
            Tagged::Service { name } => Principal::Service { name },
            Tagged::Role(e) => Principal::Role(e),
            Tagged::User(e) => Principal::User(e),
            Tagged::Group(e) => Principal::Group(e),
            Tagged::Grantable { inner } => Principal::Grantable { inner },
        }
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let mut attrs = Map::<String, Json>::deserialize(d)?;
        match attrs.get("type").and_then(Json::as_str) {
            None => Ok(Principal::Other(attrs)),
            Some("other") => {
                attrs.remove("type");
                Ok(Principal::Other(attrs))
            }
            Some(_) => Tagged::deserialize(Json::Object(attrs)).map(Principal::from).map_err(serde::de::Error::custom),
        }
    }
}

impl Principal {
    pub fn account(id: impl Into<String>) -> Self { Principal::Account { id: id.into() } }
    pub fn arn(arn: impl Into<String>) -> Self { Principal::Arn { arn: arn.into() } }
    pub fn service(name: impl Into<String>) -> Self { Principal::Service { name: name.into() } }
    pub fn role(arn: impl Into<String>) -> Self { Principal::Role(Entity::new(arn)) }
    pub fn user(arn: impl Into<String>) -> Self { Principal::User(Entity::new(arn)) }
    pub fn group(arn: impl Into<String>) -> Self { Principal::Group(Entity::new(arn)) }
    pub fn grantable(inner: Principal) -> Self { Principal::Grantable { inner: Box::new(inner) } }

    fn describe(&self) -> String {
        match self {
            Principal::Other(attrs) if attrs.is_empty() => "reference without attributes".to_string(),
            Principal::Other(attrs) => {
                let keys: Vec<&str> = attrs.keys().map(|k| k.as_str()).collect();
                format!("reference with attributes [{}]", keys.join(", "))
            }
            other => format!("{:?}", other),
        }
    }
}

/// Resolves principals to canonical identity strings.
///
/// Pure: the same principal always resolves to the same string (or the same
/// error) for a given resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnResolver {
    partition: String,
    account_id: Option<String>,
}

impl Default for ArnResolver {
    fn default() -> Self {
        Self { partition: "aws".to_string(), account_id: None }
    }
}

impl ArnResolver {
    /// Resolver for the given current account; service principals resolve against it.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self { account_id: Some(account_id.into()), ..Self::default() }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn account_id(&self) -> Option<&str> { self.account_id.as_deref() }

    pub fn resolve(&self, principal: &Principal) -> PolicyResult<String> {
        match principal {
            Principal::Account { id } => Ok(format!("arn:{}:iam::{}:root", self.partition, id)),
            Principal::Arn { arn } => Ok(arn.clone()),
            Principal::Service { name } => {
                let account = self.account_id.as_deref().ok_or_else(|| PolicyError::MissingAccount(name.clone()))?;
                Ok(format!("arn:{}:iam::{}:role/service-role/{}", self.partition, account, name))
            }
            Principal::Role(e) | Principal::User(e) | Principal::Group(e) => Ok(e.arn.clone()),
            Principal::Grantable { inner } => self.resolve(inner),
            Principal::Other(attrs) => match attrs.get("arn").and_then(|v| v.as_str()) {
                Some(arn) => Ok(arn.to_string()),
                None => Err(PolicyError::UnresolvableArn(principal.describe())),
            },
        }
    }
}

//! kbindex policy: data-access documents for a vector collection.
//!
//! [`PolicyAggregator`] accumulates grant statements for one collection and
//! republishes the serialized document after every call. Principals are
//! resolved to identity strings by [`ArnResolver`]; a principal that cannot
//! be resolved fails the grant instead of being skipped.

#![forbid(unsafe_code)]

pub mod aggregator;
pub mod collection;
pub mod principal;

pub use aggregator::{GrantStatement, PolicyAggregator, PolicyDocument, ResourceType, Rule};
pub use collection::{Collection, CollectionProps, CollectionType, IamGrant};
pub use principal::{ArnResolver, Entity, Principal};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("unable to extract ARN from principal: {0}")]
    UnresolvableArn(String),
    #[error("service principal {0:?} needs an account id to build its role ARN")]
    MissingAccount(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

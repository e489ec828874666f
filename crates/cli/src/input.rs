//! Reading event and grant files (JSON or YAML).

use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use kbindex_policy::Principal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn max_input_bytes() -> usize {
    std::env::var("KBINDEX_MAX_INPUT_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000_000) // 1 MiB default
}

/// Read `path` (or stdin for `-`) into a string, bounded by `KBINDEX_MAX_INPUT_BYTES`.
pub fn read_source(path: &Path) -> Result<String> {
    let max = max_input_bytes();
    let mut buf = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .take(max as u64 + 1)
            .read_to_string(&mut buf)
            .context("reading stdin")?;
    } else {
        let f = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        f.take(max as u64 + 1)
            .read_to_string(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    if buf.len() > max {
        return Err(anyhow!("input too large (>{} bytes)", max));
    }
    Ok(buf)
}

/// Parse JSON or YAML (YAML is a superset, so one parser covers both).
pub fn parse_doc<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    if text.trim().is_empty() {
        return Err(anyhow!("{} is empty", what));
    }
    serde_yaml::from_str(text).with_context(|| format!("parsing {}", what))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantSpec {
    pub access: Access,
    pub principal: Principal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbindex_core::{ChangeType, ResourceChangeEvent};

    #[test]
    fn event_parses_from_yaml_and_json() {
        let y = "RequestType: Update\nRequestId: r\nLogicalResourceId: l\nResourceProperties:\n  indexName: kb-1\n  dimensions: '256'\n  vectorField: kb-1\n  textField: TEXT_CHUNK\n  metadataField: METADATA\n";
        let ev: ResourceChangeEvent = parse_doc(y, "event").unwrap();
        assert_eq!(ev.change_type, ChangeType::Update);
        assert_eq!(ev.properties.vector_dimension, 256);

        let j = r#"{"changeType":"Create","requestId":"r","logicalId":"l","properties":{"indexName":"kb","vectorDimension":3,"vectorField":"v","textField":"t","metadataField":"m"}}"#;
        let ev: ResourceChangeEvent = parse_doc(j, "event").unwrap();
        assert_eq!(ev.properties.vector_dimension, 3);
    }

    #[test]
    fn grants_parse_with_tagged_principals() {
        let y = "- access: read\n  principal: { type: account, id: '1' }\n- access: read_write\n  principal: { type: service, name: bedrock.amazonaws.com }\n";
        let grants: Vec<GrantSpec> = parse_doc(y, "grants").unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].access, Access::Read);
        assert_eq!(grants[1].principal, Principal::service("bedrock.amazonaws.com"));
    }

    #[test]
    fn untagged_grant_principal_parses_as_fallback() {
        let y = "- access: read\n  principal: { arn: 'arn:aws:iam::1:role/r' }\n";
        let grants: Vec<GrantSpec> = parse_doc(y, "grants").unwrap();
        assert!(matches!(grants[0].principal, Principal::Other(_)));
    }

    #[test]
    fn partial_event_keeps_properties_undecoded() {
        let y = "RequestType: Delete\nRequestId: r\nLogicalResourceId: l\nResourceProperties:\n  indexName: kb-1\n";
        let ev: ResourceChangeEvent<serde_json::Value> = parse_doc(y, "event").unwrap();
        assert_eq!(ev.change_type, ChangeType::Delete);
        assert_eq!(ev.properties["indexName"], "kb-1");
    }

    #[test]
    fn empty_input_is_reported() {
        let err = parse_doc::<Vec<GrantSpec>>("  \n", "grants").unwrap_err().to_string();
        assert!(err.contains("grants is empty"), "err={}", err);
    }
}

//! Resource Manager URL paths.
//!
//! A kind such as `Microsoft.Sql/servers/databases` splits into the
//! provider namespace and a chain of resource types. Nested types need
//! the parent's name: `/providers/Microsoft.Sql/servers/{parent}/databases/{name}`.

use crate::error::{Error, Result};
use converge::ResourceKey;

/// Namespace and resource types of a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPath<'a> {
    pub namespace: &'a str,
    pub types: Vec<&'a str>,
}

impl<'a> KindPath<'a> {
    pub fn parse(kind: &'a str) -> Result<Self> {
        let mut parts = kind.split('/');
        let namespace = parts.next().filter(|n| n.contains('.'));
        let types: Vec<&str> = parts.filter(|t| !t.is_empty()).collect();
        match namespace {
            Some(namespace) if !types.is_empty() && types.len() <= 2 => {
                Ok(Self { namespace, types })
            }
            _ => Err(Error::Other(format!(
                "'{kind}' is not a Namespace/type or Namespace/parentType/childType kind"
            ))),
        }
    }

    pub fn is_nested(&self) -> bool {
        self.types.len() == 2
    }
}

/// `/subscriptions/{sub}/resourceGroups/{rg}`
pub fn resource_group_path(subscription_id: &str, resource_group: &str) -> String {
    format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}")
}

/// Path of one resource instance.
pub fn resource_path(subscription_id: &str, key: &ResourceKey) -> Result<String> {
    let kind = KindPath::parse(&key.kind)?;
    let mut path = format!(
        "{}/providers/{}",
        resource_group_path(subscription_id, &key.resource_group),
        kind.namespace
    );
    match (kind.types.as_slice(), key.parent.as_deref()) {
        ([resource_type], None) => path.push_str(&format!("/{resource_type}/{}", key.name)),
        ([parent_type, child_type], Some(parent)) => {
            path.push_str(&format!("/{parent_type}/{parent}/{child_type}/{}", key.name));
        }
        ([_, _], None) => {
            return Err(Error::Other(format!(
                "{} is a nested kind and needs a parent name",
                key.kind
            )));
        }
        _ => {
            return Err(Error::Other(format!(
                "{} is not a nested kind but a parent was given",
                key.kind
            )));
        }
    }
    Ok(path)
}

/// Path listing every resource of a kind in a group (or under a parent).
pub fn collection_path(
    subscription_id: &str,
    kind: &str,
    resource_group: &str,
    parent: Option<&str>,
) -> Result<String> {
    let parsed = KindPath::parse(kind)?;
    let base = format!(
        "{}/providers/{}",
        resource_group_path(subscription_id, resource_group),
        parsed.namespace
    );
    match (parsed.types.as_slice(), parent) {
        ([resource_type], None) => Ok(format!("{base}/{resource_type}")),
        ([parent_type, child_type], Some(parent)) => {
            Ok(format!("{base}/{parent_type}/{parent}/{child_type}"))
        }
        ([_, _], None) => Err(Error::Other(format!(
            "listing {kind} needs a parent name"
        ))),
        _ => Err(Error::Other(format!(
            "{kind} is not a nested kind but a parent was given"
        ))),
    }
}

//! State Fetcher and read-only fact queries

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{Fields, ObservedState, ResourceKey, Subresource, SubresourceShape};
use crate::value::{get_path, name_value_list, set_path};
use serde_json::Value;
use std::collections::BTreeMap;

/// Read the current state of one resource.
///
/// Not-found is [`ObservedState::Absent`]. Any other failure aborts with
/// [`Error::Fetch`]; there is no retry at this layer.
pub fn fetch<P: Provider + ?Sized>(provider: &P, key: &ResourceKey) -> Result<ObservedState> {
    log::debug!("{key}: fetching current state");

    let body = provider.get(key).map_err(|source| Error::Fetch {
        resource: key.to_string(),
        source,
    })?;

    Ok(match body {
        Some(value) => ObservedState::from_value(value),
        None => {
            log::debug!("{key}: not found");
            ObservedState::Absent
        }
    })
}

/// [`fetch`], then overlay each subresource onto a present resource.
///
/// A subresource the provider does not serve leaves the state as fetched.
pub fn fetch_with<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    subresources: &[Subresource],
) -> Result<ObservedState> {
    let mut observed = fetch(provider, key)?;
    if let ObservedState::Present(fields) = &mut observed {
        for subresource in subresources {
            log::debug!("{key}: reading {}", subresource.suffix);
            let document = provider
                .get_subresource(key, subresource)
                .map_err(|source| Error::Fetch {
                    resource: format!("{key}/{}", subresource.suffix),
                    source,
                })?;
            if let Some(document) = document {
                overlay(fields, subresource, &document);
            }
        }
    }
    Ok(observed)
}

fn overlay(fields: &mut Fields, subresource: &Subresource, document: &Value) {
    let properties = document
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    match subresource.shape {
        SubresourceShape::Object => {
            let mut target = get_path(fields, subresource.target)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for (name, value) in properties {
                if !value.is_null() {
                    target.insert(name, value);
                }
            }
            set_path(fields, subresource.target, Value::Object(target));
        }
        SubresourceShape::NameValueList => {
            set_path(fields, subresource.target, name_value_list(&properties));
        }
    }
}

/// A `key` or `key:value` filter on resource tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: Option<String>,
}

impl TagFilter {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((key, value)) => Self {
                key: key.to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                key: raw.to_string(),
                value: None,
            },
        }
    }

    pub fn matches(&self, resource: &Fields) -> bool {
        let Some(tags) = resource.get("tags").and_then(Value::as_object) else {
            return false;
        };
        match (tags.get(&self.key), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(wanted)) => actual.as_str() == Some(wanted.as_str()),
        }
    }
}

/// What to look up.
#[derive(Debug, Clone)]
pub struct FactsQuery {
    pub kind: String,
    pub resource_group: String,
    /// Single resource by name; list the whole scope when `None`
    pub name: Option<String>,
    pub parent: Option<String>,
    /// All filters must match
    pub tags: Vec<TagFilter>,
}

/// Resources found by a fact query, keyed by name.
pub type Facts = BTreeMap<String, Value>;

/// Run a read-only query.
///
/// A missing named resource yields an empty result, not an error.
pub fn query_facts<P: Provider + ?Sized>(provider: &P, query: &FactsQuery) -> Result<Facts> {
    let scope = match &query.parent {
        Some(parent) => format!("{}/{}", query.resource_group, parent),
        None => query.resource_group.clone(),
    };

    let found: Vec<Value> = match &query.name {
        Some(name) => {
            let key = ResourceKey {
                kind: query.kind.clone(),
                resource_group: query.resource_group.clone(),
                name: name.clone(),
                parent: query.parent.clone(),
            };
            match fetch(provider, &key)? {
                ObservedState::Present(fields) => vec![Value::Object(fields)],
                ObservedState::Absent => Vec::new(),
            }
        }
        None => provider
            .list(&query.kind, &query.resource_group, query.parent.as_deref())
            .map_err(|source| Error::Fetch {
                resource: scope.clone(),
                source,
            })?,
    };

    let mut facts = Facts::new();
    for resource in found {
        let Value::Object(fields) = resource else {
            continue;
        };
        if !query.tags.iter().all(|filter| filter.matches(&fields)) {
            continue;
        }
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        facts.insert(name, Value::Object(fields));
    }

    log::info!("{scope}: found {} {}", facts.len(), query.kind);
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ProviderErrorKind};
    use crate::memory::{MemoryProvider, Operation};
    use serde_json::json;

    const KIND: &str = "Microsoft.KeyVault/vaults";

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(KIND, "rg1", name)
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new()
            .with_resource(&key("kv1"), json!({"tags": {"env": "dev", "team": "a"}}))
            .with_resource(&key("kv2"), json!({"tags": {"env": "prod"}}))
            .with_resource(&key("kv3"), json!({}))
    }

    fn query(name: Option<&str>, tags: &[&str]) -> FactsQuery {
        FactsQuery {
            kind: KIND.to_string(),
            resource_group: "rg1".to_string(),
            name: name.map(str::to_string),
            parent: None,
            tags: tags.iter().map(|t| TagFilter::parse(t)).collect(),
        }
    }

    #[test]
    fn test_fetch_absent() {
        let provider = MemoryProvider::new();
        assert_eq!(fetch(&provider, &key("nope")).unwrap(), ObservedState::Absent);
    }

    #[test]
    fn test_fetch_error_is_not_absent() {
        let provider = provider().failing(
            Operation::Get,
            ProviderError::new(ProviderErrorKind::Auth, "forbidden").with_status(403),
        );
        let err = fetch(&provider, &key("kv1")).unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert_eq!(provider.calls().gets, 1);
    }

    const SETTINGS: Subresource = Subresource {
        suffix: "config/appsettings/list",
        list_action: true,
        target: "properties.siteConfig.appSettings",
        shape: SubresourceShape::NameValueList,
    };

    const WEB_CONFIG: Subresource = Subresource {
        suffix: "config/web",
        list_action: false,
        target: "properties.siteConfig",
        shape: SubresourceShape::Object,
    };

    #[test]
    fn test_fetch_with_overlays_hidden_state() {
        let site = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let provider = MemoryProvider::new()
            .with_resource(
                &site,
                json!({"properties": {"siteConfig": {
                    "linuxFxVersion": "NODE|8.1",
                    "appSettings": [{"name": "MODE", "value": "prod"}]
                }}}),
            )
            .with_hidden_path("properties.siteConfig");

        let plain = fetch(&provider, &site).unwrap();
        assert!(get_path(plain.fields().unwrap(), "properties.siteConfig").is_none());

        let full = fetch_with(&provider, &site, &[WEB_CONFIG, SETTINGS]).unwrap();
        let fields = full.fields().unwrap();
        assert_eq!(
            get_path(fields, "properties.siteConfig.linuxFxVersion"),
            Some(&json!("NODE|8.1"))
        );
        assert_eq!(
            get_path(fields, "properties.siteConfig.appSettings"),
            Some(&json!([{"name": "MODE", "value": "prod"}]))
        );
        assert_eq!(provider.calls().subresource_reads, 2);
    }

    #[test]
    fn test_fetch_with_skips_subresources_of_absent_resource() {
        let provider = MemoryProvider::new();
        let site = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        assert_eq!(
            fetch_with(&provider, &site, &[SETTINGS]).unwrap(),
            ObservedState::Absent
        );
        assert_eq!(provider.calls().subresource_reads, 0);
    }

    #[test]
    fn test_object_overlay_keeps_fields_and_skips_nulls() {
        let mut fields = json!({"properties": {"siteConfig": {"phpVersion": "7.0", "alwaysOn": true}}})
            .as_object()
            .cloned()
            .unwrap();
        let document = json!({"properties": {"phpVersion": "7.2", "alwaysOn": null}});
        overlay(&mut fields, &WEB_CONFIG, &document);
        assert_eq!(
            fields["properties"]["siteConfig"],
            json!({"phpVersion": "7.2", "alwaysOn": true})
        );
    }

    #[test]
    fn test_query_by_name() {
        let facts = query_facts(&provider(), &query(Some("kv1"), &[])).unwrap();
        assert_eq!(facts.keys().collect::<Vec<_>>(), vec!["kv1"]);

        let facts = query_facts(&provider(), &query(Some("missing"), &[])).unwrap();
        assert!(facts.is_empty());
    }

    #[test]
    fn test_query_list_with_tag_filters() {
        let all = query_facts(&provider(), &query(None, &[])).unwrap();
        assert_eq!(all.len(), 3);

        let dev = query_facts(&provider(), &query(None, &["env:dev"])).unwrap();
        assert_eq!(dev.keys().collect::<Vec<_>>(), vec!["kv1"]);

        let tagged = query_facts(&provider(), &query(None, &["env"])).unwrap();
        assert_eq!(tagged.len(), 2);

        let none = query_facts(&provider(), &query(None, &["env:dev", "team:b"])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_tag_filter_parse() {
        assert_eq!(
            TagFilter::parse("env:dev"),
            TagFilter {
                key: "env".to_string(),
                value: Some("dev".to_string())
            }
        );
        assert_eq!(TagFilter::parse("env").value, None);
    }
}

//! Resource kinds known to azrm
//!
//! Every kind is modeled as a [`ResourceKind`] with:
//! - Its ARM identity (type and api-version)
//! - Field table and diff rules for the reconciliation engine
//! - A prepare step enforcing cross-field rules before translation
//! - The request fields that must never be printed
//!
//! Kinds without rules are read-only and only answer fact queries.

pub mod app_gateway;
pub mod app_service_plan;
pub mod facts;
pub mod web_app;

use converge::{Error, Fields, KindRules};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Scope a kind's prepare step may need to build ids.
#[derive(Debug, Clone, Copy)]
pub struct PrepareContext<'a> {
    pub subscription_id: &'a str,
    pub resource_group: &'a str,
}

/// Core trait for all resource kinds
pub trait ResourceKind: Send + Sync + fmt::Debug {
    /// Catalog name (e.g., "app_service_plan")
    fn name(&self) -> &'static str;

    /// ARM resource type (e.g., "Microsoft.Web/serverfarms")
    fn arm_type(&self) -> &'static str;

    fn api_version(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Key the observed state is reported under
    fn output_key(&self) -> &'static str;

    /// Reconciliation rules; `None` for read-only kinds
    fn rules(&self) -> Option<KindRules> {
        None
    }

    /// User parameters with a short description, when they differ from the
    /// schema fields
    fn parameters(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Nested kinds are addressed through a parent resource
    fn needs_parent(&self) -> bool {
        false
    }

    /// Check cross-field rules and rewrite user parameters into the
    /// vocabulary of [`ResourceKind::rules`].
    fn prepare(&self, params: &Fields, _ctx: &PrepareContext<'_>) -> Result<Fields, Error> {
        Ok(params.clone())
    }

    /// Whether merged lists (app settings) drop entries the request does
    /// not mention. Reads the user parameters before `prepare`.
    fn purge_lists(&self, _params: &Fields) -> bool {
        false
    }

    fn secrets(&self) -> Secrets {
        Secrets::NONE
    }

    fn is_managed(&self) -> bool {
        self.rules().is_some()
    }

    /// Whether a missing `location` should be filled from the resource group
    fn takes_location(&self) -> bool {
        self.rules()
            .is_some_and(|rules| rules.schema.field("location").is_some())
    }
}

/// Shown in place of a secret value.
pub const MASK: &str = "********";

/// Provider fields whose values are masked in printed output.
#[derive(Debug, Clone, Copy)]
pub struct Secrets {
    /// Dotted provider paths; list elements are looked through
    pub paths: &'static [&'static str],
    /// Names of `{name, value}` entries whose `value` is secret
    pub names: &'static [&'static str],
}

impl Secrets {
    pub const NONE: Self = Self {
        paths: &[],
        names: &[],
    };

    /// Copy of `value` with secrets masked.
    ///
    /// `path` locates `value` in the resource, with optional `[name]`
    /// selectors as in drift paths; `""` is the resource itself.
    pub fn redact(&self, path: &str, value: &Value) -> Value {
        if self.is_secret_entry_value(path) && !value.is_null() {
            return Value::String(MASK.to_string());
        }
        let mut out = value.clone();
        self.mask(&plain_path(path), &mut out);
        out
    }

    fn is_secret_name(&self, name: &str) -> bool {
        self.names.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// `appSettings[DOCKER_REGISTRY_SERVER_PASSWORD].value`
    fn is_secret_entry_value(&self, path: &str) -> bool {
        path.strip_suffix("].value")
            .and_then(|head| head.rsplit_once('['))
            .is_some_and(|(_, name)| self.is_secret_name(name))
    }

    fn mask(&self, path: &str, value: &mut Value) {
        if value.is_null() {
            return;
        }
        if self.paths.contains(&path) {
            *value = Value::String(MASK.to_string());
            return;
        }
        match value {
            Value::Object(map) => {
                let secret_entry = map
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| self.is_secret_name(name));
                for (key, child) in map.iter_mut() {
                    if secret_entry && key == "value" {
                        if !child.is_null() {
                            *child = Value::String(MASK.to_string());
                        }
                        continue;
                    }
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.mask(&child_path, child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.mask(path, item);
                }
            }
            _ => {}
        }
    }
}

/// Drift path without its `[name]` / `[index]` selectors.
fn plain_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0u32;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// All kinds, managed first.
pub fn catalog() -> Vec<&'static dyn ResourceKind> {
    let mut kinds: Vec<&'static dyn ResourceKind> = vec![
        &app_service_plan::AppServicePlan,
        &web_app::WebApp,
        &app_gateway::ApplicationGateway,
    ];
    kinds.extend(facts::READ_ONLY.iter().map(|kind| kind as &dyn ResourceKind));
    kinds
}

/// Find a kind by catalog name or ARM type (case-insensitive).
pub fn find(name: &str) -> Option<&'static dyn ResourceKind> {
    catalog().into_iter().find(|kind| {
        kind.name().eq_ignore_ascii_case(name) || kind.arm_type().eq_ignore_ascii_case(name)
    })
}

/// Deserialize user parameters into a kind's typed parameter struct.
///
/// Serde's message already names the offending field.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Fields) -> Result<T, Error> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| Error::invalid("spec", e.to_string()))
}

/// Insert `value` unless it is `None`.
pub(crate) fn put<T: Into<Value>>(fields: &mut Fields, key: &str, value: Option<T>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), value.into());
    }
}

// ============================================================================
// Tests
// ============================================================================

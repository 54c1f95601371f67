//! Diff/Decision Engine
//!
//! Compares observed state with the translated request and picks one
//! [`Action`]. The comparison is governed by a per-kind [`DiffPolicy`]:
//! which fields are managed, which can never change after creation, which
//! are required to create, whether tags are merged and which named lists
//! keep entries the request does not mention.

use crate::error::{Error, Result};
use crate::types::{
    Action, Decision, Drift, Fields, ObservedState, ProviderRequest, RequestedState, ResourceKey,
};
use crate::value::{get_path, render, scalars_match, set_path};
use serde_json::Value;

/// Which parts of the request are compared against observed state.
#[derive(Debug, Clone, Copy)]
pub enum Managed {
    /// Every leaf present in the request
    Subset,
    /// Only these dotted provider paths, when present in the request
    Fields(&'static [&'static str]),
}

/// Per-kind comparison rules.
#[derive(Debug, Clone, Copy)]
pub struct DiffPolicy {
    pub managed: Managed,
    /// Provider paths never compared (write-only secrets, location)
    pub ignore: &'static [&'static str],
    /// `(provider path, user label)` pairs that cannot change once created
    pub immutable: &'static [(&'static str, &'static str)],
    /// `(provider path, user label)` pairs that must be set to create
    pub required_on_create: &'static [(&'static str, &'static str)],
    /// Whether the kind carries a `tags` map
    pub tags: bool,
    /// Named-element lists merged into observed entries unless purging
    pub merged_lists: &'static [&'static str],
}

impl DiffPolicy {
    pub const fn subset() -> Self {
        Self {
            managed: Managed::Subset,
            ignore: &[],
            immutable: &[],
            required_on_create: &[],
            tags: false,
            merged_lists: &[],
        }
    }

    pub const fn fields(paths: &'static [&'static str]) -> Self {
        Self {
            managed: Managed::Fields(paths),
            ..Self::subset()
        }
    }

    pub const fn ignoring(self, ignore: &'static [&'static str]) -> Self {
        Self { ignore, ..self }
    }

    pub const fn immutable(self, immutable: &'static [(&'static str, &'static str)]) -> Self {
        Self { immutable, ..self }
    }

    pub const fn required_on_create(
        self,
        required_on_create: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            required_on_create,
            ..self
        }
    }

    pub const fn with_tags(self) -> Self {
        Self { tags: true, ..self }
    }

    pub const fn merging(self, merged_lists: &'static [&'static str]) -> Self {
        Self {
            merged_lists,
            ..self
        }
    }
}

/// Inputs to one decision.
#[derive(Debug, Clone)]
pub struct DesiredState<'a> {
    pub requested: RequestedState,
    pub request: &'a ProviderRequest,
    /// Keep observed tags that the request does not mention
    pub append_tags: bool,
    /// Drop observed entries of merged lists that the request does not mention
    pub purge_lists: bool,
}

/// Decide what to do for one resource.
///
/// Precondition failures (immutable field change, missing required field)
/// are returned as errors so that no mutating call follows.
pub fn decide(
    key: &ResourceKey,
    observed: ObservedState,
    desired: &DesiredState<'_>,
    policy: &DiffPolicy,
) -> Result<Decision> {
    let mut request = desired.request.clone();

    let (action, drift) = match (&observed, desired.requested) {
        (ObservedState::Absent, RequestedState::Absent) => (Action::NoAction, Vec::new()),
        (ObservedState::Present(_), RequestedState::Absent) => (Action::Delete, Vec::new()),
        (ObservedState::Absent, RequestedState::Present) => {
            check_required(key, request.fields(), policy)?;
            (Action::Create, Vec::new())
        }
        (ObservedState::Present(current), RequestedState::Present) => {
            check_immutable(key, current, request.fields(), policy)?;

            if !desired.purge_lists {
                for path in policy.merged_lists {
                    if let Some(merged) = merge_named_list(current, request.fields(), path) {
                        set_path(&mut request.0, path, merged);
                    }
                }
            }

            let mut drift = managed_drift(current, request.fields(), policy);

            if policy.tags {
                let (merged, tag_drift) = merge_tags(current, request.fields(), desired.append_tags);
                drift.extend(tag_drift);
                set_path(&mut request.0, "tags", Value::Object(merged));
            }

            if drift.is_empty() {
                (Action::NoAction, drift)
            } else {
                (Action::Update, drift)
            }
        }
    };

    log::info!("{key}: decided {action}");
    for entry in &drift {
        log::debug!("{key}: drift {entry}");
    }

    Ok(Decision {
        action,
        observed,
        request,
        drift,
    })
}

fn check_required(key: &ResourceKey, request: &Fields, policy: &DiffPolicy) -> Result<()> {
    for (path, label) in policy.required_on_create {
        if get_path(request, path).is_none_or(Value::is_null) {
            return Err(Error::precondition(
                key.to_string(),
                format!("'{label}' is required to create the resource"),
            ));
        }
    }
    Ok(())
}

fn check_immutable(
    key: &ResourceKey,
    current: &Fields,
    request: &Fields,
    policy: &DiffPolicy,
) -> Result<()> {
    for (path, label) in policy.immutable {
        let (Some(wanted), Some(actual)) = (get_path(request, path), get_path(current, path))
        else {
            continue;
        };
        if wanted.is_null() || actual.is_null() {
            continue;
        }
        if !values_match(actual, wanted) {
            return Err(Error::precondition(
                key.to_string(),
                format!(
                    "cannot change '{label}' from {} to {} on an existing resource",
                    render(actual),
                    render(wanted)
                ),
            ));
        }
    }
    Ok(())
}

fn managed_drift(current: &Fields, request: &Fields, policy: &DiffPolicy) -> Vec<Drift> {
    let mut drift = Vec::new();
    match policy.managed {
        Managed::Subset => {
            for (key, wanted) in request {
                if key == "tags" && policy.tags {
                    continue;
                }
                let actual = current.get(key).unwrap_or(&Value::Null);
                collect_drift(key, key, actual, wanted, policy.ignore, &mut drift);
            }
        }
        Managed::Fields(paths) => {
            for path in paths {
                let Some(wanted) = get_path(request, path) else {
                    continue;
                };
                let actual = get_path(current, path).unwrap_or(&Value::Null);
                collect_drift(path, path, actual, wanted, policy.ignore, &mut drift);
            }
        }
    }
    drift
}

/// Walk the desired leaves under one path.
///
/// `path` is the display path with list selectors, `plain` the same path
/// without them, which is what `ignore` entries match.
fn collect_drift(
    path: &str,
    plain: &str,
    actual: &Value,
    wanted: &Value,
    ignore: &[&str],
    drift: &mut Vec<Drift>,
) {
    if wanted.is_null() || ignore.contains(&plain) {
        return;
    }

    match (actual, wanted) {
        (Value::Object(have), Value::Object(want)) => {
            for (key, value) in want {
                let child = have.get(key).unwrap_or(&Value::Null);
                collect_drift(
                    &format!("{path}.{key}"),
                    &format!("{plain}.{key}"),
                    child,
                    value,
                    ignore,
                    drift,
                );
            }
        }
        (Value::Array(have), Value::Array(want)) => {
            collect_list_drift(path, plain, have, want, ignore, drift);
        }
        _ => {
            if !leaf_matches(actual, wanted) {
                drift.push(Drift {
                    path: path.to_string(),
                    observed: actual.clone(),
                    desired: wanted.clone(),
                });
            }
        }
    }
}

fn collect_list_drift(
    path: &str,
    plain: &str,
    have: &[Value],
    want: &[Value],
    ignore: &[&str],
    drift: &mut Vec<Drift>,
) {
    let list_changed = || Drift {
        path: path.to_string(),
        observed: Value::Array(have.to_vec()),
        desired: Value::Array(want.to_vec()),
    };

    if have.len() != want.len() {
        drift.push(list_changed());
        return;
    }

    if let Some(names) = element_names(want) {
        for (name, wanted) in names.into_iter().zip(want) {
            let found = have
                .iter()
                .find(|v| v.get("name").and_then(Value::as_str) == Some(name));
            match found {
                Some(actual) => collect_drift(
                    &format!("{path}[{name}]"),
                    plain,
                    actual,
                    wanted,
                    ignore,
                    drift,
                ),
                None => {
                    drift.push(list_changed());
                    return;
                }
            }
        }
        return;
    }

    if want.iter().all(|v| !v.is_object() && !v.is_array()) {
        // Lists of scalars are compared as multisets.
        let mut unmatched: Vec<&Value> = have.iter().collect();
        for wanted in want {
            match unmatched.iter().position(|h| scalars_match(h, wanted)) {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => {
                    drift.push(list_changed());
                    return;
                }
            }
        }
        return;
    }

    for (i, (actual, wanted)) in have.iter().zip(want).enumerate() {
        collect_drift(&format!("{path}[{i}]"), plain, actual, wanted, ignore, drift);
    }
}

/// Names of list elements, when every element is an object with one.
fn element_names(items: &[Value]) -> Option<Vec<&str>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|v| v.get("name").and_then(Value::as_str))
        .collect()
}

fn leaf_matches(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        // An empty desired container matches a missing one.
        (Value::Null, Value::Object(m)) => m.is_empty(),
        (Value::Null, Value::Array(a)) => a.is_empty(),
        _ => scalars_match(actual, wanted),
    }
}

/// Structural comparison with leaf semantics, used for immutable fields.
pub fn values_match(actual: &Value, wanted: &Value) -> bool {
    let mut drift = Vec::new();
    collect_drift("", "", actual, wanted, &[], &mut drift);
    drift.is_empty()
}

/// Requested entries of a named list followed by observed entries whose
/// name the request does not use. `None` unless both sides hold a list.
fn merge_named_list(current: &Fields, request: &Fields, path: &str) -> Option<Value> {
    let wanted = get_path(request, path)?.as_array()?;
    let observed = get_path(current, path)?.as_array()?;

    let name = |v: &Value| v.get("name").and_then(Value::as_str).map(str::to_string);
    let mut merged = wanted.clone();
    for entry in observed {
        let Some(observed_name) = name(entry) else {
            continue;
        };
        let mentioned = wanted
            .iter()
            .filter_map(name)
            .any(|n| n.eq_ignore_ascii_case(&observed_name));
        if !mentioned {
            merged.push(entry.clone());
        }
    }
    Some(Value::Array(merged))
}

/// Merge requested tags into observed ones and report tag drift.
///
/// With `append` the observed tags are kept and requested values win;
/// without it the requested tags replace the observed set.
pub fn merge_tags(current: &Fields, request: &Fields, append: bool) -> (Fields, Vec<Drift>) {
    let observed = current
        .get("tags")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let wanted = request
        .get("tags")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut merged = if append { observed.clone() } else { Fields::new() };
    for (key, value) in wanted {
        merged.insert(key, value);
    }

    let mut drift = Vec::new();
    if merged != observed {
        drift.push(Drift {
            path: "tags".to_string(),
            observed: Value::Object(observed),
            desired: Value::Object(merged.clone()),
        });
    }
    (merged, drift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn key() -> ResourceKey {
        ResourceKey::new("Microsoft.Web/serverfarms", "rg1", "plan1")
    }

    const PLAN: DiffPolicy = DiffPolicy::fields(&["sku.name", "sku.capacity"])
        .immutable(&[("properties.reserved", "is_linux")])
        .required_on_create(&[("sku.name", "sku")])
        .with_tags();

    fn run(
        observed: ObservedState,
        requested: RequestedState,
        request: Value,
        policy: &DiffPolicy,
    ) -> Result<Decision> {
        let request = ProviderRequest::new(obj(request));
        let desired = DesiredState {
            requested,
            request: &request,
            append_tags: true,
            purge_lists: false,
        };
        decide(&key(), observed, &desired, policy)
    }

    fn present(value: Value) -> ObservedState {
        ObservedState::Present(obj(value))
    }

    #[test]
    fn test_decision_table() {
        let request = json!({"sku": {"name": "S1"}});
        let existing = present(json!({"sku": {"name": "S1"}}));

        let cases = [
            (ObservedState::Absent, RequestedState::Absent, Action::NoAction),
            (ObservedState::Absent, RequestedState::Present, Action::Create),
            (existing.clone(), RequestedState::Absent, Action::Delete),
            (existing, RequestedState::Present, Action::NoAction),
        ];

        for (observed, requested, expected) in cases {
            let decision = run(observed, requested, request.clone(), &PLAN).unwrap();
            assert_eq!(decision.action, expected, "{requested:?}");
        }
    }

    #[test]
    fn test_update_on_managed_drift() {
        let decision = run(
            present(json!({"sku": {"name": "S1", "tier": "Standard", "capacity": 1}})),
            RequestedState::Present,
            json!({"sku": {"name": "S2", "tier": "Standard"}}),
            &PLAN,
        )
        .unwrap();

        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift.len(), 1);
        assert_eq!(decision.drift[0].path, "sku.name");
    }

    #[test]
    fn test_unmanaged_fields_ignored() {
        let decision = run(
            present(json!({"sku": {"name": "S1"}, "location": "eastus"})),
            RequestedState::Present,
            json!({"sku": {"name": "s1"}, "location": "westus"}),
            &PLAN,
        )
        .unwrap();
        assert_eq!(decision.action, Action::NoAction);
    }

    #[test]
    fn test_immutable_change_is_precondition_violation() {
        let err = run(
            present(json!({"sku": {"name": "S1"}, "properties": {"reserved": false}})),
            RequestedState::Present,
            json!({"sku": {"name": "S1"}, "properties": {"reserved": true}}),
            &PLAN,
        )
        .unwrap_err();

        assert!(matches!(err, Error::PreconditionViolation { .. }));
        assert!(err.to_string().contains("is_linux"));
    }

    #[test]
    fn test_required_on_create() {
        let err = run(
            ObservedState::Absent,
            RequestedState::Present,
            json!({"location": "eastus"}),
            &PLAN,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'sku' is required"));
    }

    #[test]
    fn test_tags_merge_and_compare() {
        let existing = present(json!({"sku": {"name": "S1"}, "tags": {"a": "1", "b": "2"}}));

        // Subset of existing tags: nothing to do
        let decision = run(
            existing.clone(),
            RequestedState::Present,
            json!({"sku": {"name": "S1"}, "tags": {"a": "1"}}),
            &PLAN,
        )
        .unwrap();
        assert_eq!(decision.action, Action::NoAction);
        assert_eq!(decision.request.fields()["tags"], json!({"a": "1", "b": "2"}));

        // New value wins
        let decision = run(
            existing,
            RequestedState::Present,
            json!({"sku": {"name": "S1"}, "tags": {"a": "9"}}),
            &PLAN,
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.request.fields()["tags"], json!({"a": "9", "b": "2"}));
    }

    #[test]
    fn test_tags_replace_without_append() {
        let request = ProviderRequest::new(obj(json!({"tags": {"a": "1"}})));
        let desired = DesiredState {
            requested: RequestedState::Present,
            request: &request,
            append_tags: false,
            purge_lists: false,
        };
        let decision = decide(
            &key(),
            present(json!({"tags": {"a": "1", "b": "2"}})),
            &desired,
            &PLAN,
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.request.fields()["tags"], json!({"a": "1"}));
    }

    #[test]
    fn test_subset_matches_lists_by_name() {
        let policy = DiffPolicy::subset().ignoring(&["properties.sslCertificates.properties.password"]);
        let observed = present(json!({
            "properties": {
                "provisioningState": "Succeeded",
                "frontendPorts": [
                    {"name": "p443", "id": "/x/p443", "properties": {"port": 443}},
                    {"name": "p80", "id": "/x/p80", "properties": {"port": 80}}
                ],
                "sslCertificates": [{"name": "c1", "properties": {"publicCertData": "abc"}}]
            }
        }));

        let decision = run(
            observed.clone(),
            RequestedState::Present,
            json!({"properties": {
                "frontendPorts": [
                    {"name": "p80", "properties": {"port": 80}},
                    {"name": "p443", "properties": {"port": "443"}}
                ],
                "sslCertificates": [{"name": "c1", "properties": {"password": "secret"}}]
            }}),
            &policy,
        )
        .unwrap();
        assert_eq!(decision.action, Action::NoAction, "{:?}", decision.drift);

        let decision = run(
            observed,
            RequestedState::Present,
            json!({"properties": {"frontendPorts": [
                {"name": "p80", "properties": {"port": 8080}},
                {"name": "p443", "properties": {"port": 443}}
            ]}}),
            &policy,
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].path, "properties.frontendPorts[p80].properties.port");
    }

    #[test]
    fn test_subset_list_length_change_is_drift() {
        let decision = run(
            present(json!({"properties": {"ports": [{"name": "a"}]}})),
            RequestedState::Present,
            json!({"properties": {"ports": [{"name": "a"}, {"name": "b"}]}}),
            &DiffPolicy::subset(),
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].path, "properties.ports");
    }

    #[test]
    fn test_scalar_lists_compare_as_sets() {
        let decision = run(
            present(json!({"protocols": ["TLSv1_0", "TLSv1_1"]})),
            RequestedState::Present,
            json!({"protocols": ["TLSv1_1", "tlsv1_0"]}),
            &DiffPolicy::subset(),
        )
        .unwrap();
        assert_eq!(decision.action, Action::NoAction);
    }

    #[test]
    fn test_scalar_lists_count_duplicates() {
        let decision = run(
            present(json!({"protocols": ["a", "b"]})),
            RequestedState::Present,
            json!({"protocols": ["a", "a"]}),
            &DiffPolicy::subset(),
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].path, "protocols");
    }

    const SETTINGS: DiffPolicy = DiffPolicy::fields(&["settings"]).merging(&["settings"]);

    fn decide_settings(observed: Value, request: Value, purge_lists: bool) -> Decision {
        let request = ProviderRequest::new(obj(request));
        let desired = DesiredState {
            requested: RequestedState::Present,
            request: &request,
            append_tags: true,
            purge_lists,
        };
        decide(&key(), present(observed), &desired, &SETTINGS).unwrap()
    }

    #[test]
    fn test_merged_list_keeps_unmentioned_entries() {
        let observed = json!({"settings": [
            {"name": "MODE", "value": "prod"},
            {"name": "EXTRA", "value": "1"}
        ]});

        let decision = decide_settings(
            observed.clone(),
            json!({"settings": [{"name": "MODE", "value": "prod"}]}),
            false,
        );
        assert_eq!(decision.action, Action::NoAction, "{:?}", decision.drift);
        assert_eq!(
            decision.request.fields()["settings"],
            json!([{"name": "MODE", "value": "prod"}, {"name": "EXTRA", "value": "1"}])
        );

        let decision = decide_settings(
            observed,
            json!({"settings": [{"name": "MODE", "value": "staging"}]}),
            false,
        );
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].path, "settings[MODE].value");
    }

    #[test]
    fn test_purged_list_drops_unmentioned_entries() {
        let decision = decide_settings(
            json!({"settings": [
                {"name": "MODE", "value": "prod"},
                {"name": "EXTRA", "value": "1"}
            ]}),
            json!({"settings": [{"name": "MODE", "value": "prod"}]}),
            true,
        );
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].path, "settings");
        assert_eq!(
            decision.request.fields()["settings"],
            json!([{"name": "MODE", "value": "prod"}])
        );
    }

    #[test]
    fn test_missing_observed_value_is_drift() {
        let decision = run(
            present(json!({"properties": {}})),
            RequestedState::Present,
            json!({"properties": {"httpsOnly": true}}),
            &DiffPolicy::subset(),
        )
        .unwrap();
        assert_eq!(decision.action, Action::Update);
        assert_eq!(decision.drift[0].observed, Value::Null);
    }
}

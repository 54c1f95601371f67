//! In-memory provider
//!
//! A [`Provider`] backed by a map, behaving like a control plane closely
//! enough to exercise the engine: server-computed fields, asynchronous
//! operations, deletes that stay visible for a while, state served only
//! through subresources, and injected failures. Every call is counted.

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderResult};
use crate::types::{
    Fields, OperationHandle, PendingOperation, PollMode, PollStatus, ProviderRequest, ResourceKey,
    Subresource, SubresourceShape,
};
use crate::value::{get_path, name_value_map, remove_path, set_path};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Provider operations, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    CreateOrUpdate,
    Delete,
    Poll,
    List,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub gets: u32,
    pub creates_or_updates: u32,
    pub deletes: u32,
    pub polls: u32,
    pub lists: u32,
    pub subresource_reads: u32,
}

impl Calls {
    /// Calls that change remote state
    pub fn mutations(&self) -> u32 {
        self.creates_or_updates + self.deletes
    }
}

#[derive(Debug)]
struct PendingEntry {
    remaining: u32,
    /// Resource to store on success
    store: Option<(ResourceKey, Value)>,
    failure: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<String, (ResourceKey, Value)>,
    pending: HashMap<String, PendingEntry>,
    /// Remaining lookups that still see a deleted resource
    lingering: HashMap<String, u32>,
    calls: Calls,
    next_operation: u64,
    next_etag: u64,
}

/// Map-backed [`Provider`] for tests and dry experiments.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
    pending_polls: u32,
    lingering_deletes: u32,
    failed_operation: Option<String>,
    failure: Option<(Operation, ProviderError)>,
    locations: HashMap<String, String>,
    /// Paths left out of `get` bodies
    hidden_paths: Vec<String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing resource; server fields are filled in.
    pub fn with_resource(self, key: &ResourceKey, body: Value) -> Self {
        {
            let mut inner = self.lock();
            let stored = materialize(key, body, &mut inner.next_etag);
            inner
                .resources
                .insert(storage_key(key), (key.clone(), stored));
        }
        self
    }

    /// Mutating calls return a pending handle that needs this many
    /// in-progress polls before it settles.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Deleted resources stay visible for this many lookups.
    pub fn with_lingering_deletes(mut self, lookups: u32) -> Self {
        self.lingering_deletes = lookups;
        self
    }

    /// Asynchronous operations settle as failed with this message.
    pub fn with_failed_operation(mut self, message: impl Into<String>) -> Self {
        self.failed_operation = Some(message.into());
        self
    }

    /// Calls to `operation` fail with `error`.
    pub fn failing(mut self, operation: Operation, error: ProviderError) -> Self {
        self.failure = Some((operation, error));
        self
    }

    /// Location reported for a resource group.
    pub fn with_location(
        mut self,
        resource_group: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.locations.insert(resource_group.into(), location.into());
        self
    }

    /// Leave `path` out of `get` results. The stored value stays readable
    /// through [`Provider::get_subresource`].
    pub fn with_hidden_path(mut self, path: impl Into<String>) -> Self {
        self.hidden_paths.push(path.into());
        self
    }

    /// Stored body of a resource, ignoring lingering state.
    pub fn resource(&self, key: &ResourceKey) -> Option<Value> {
        self.lock()
            .resources
            .get(&storage_key(key))
            .map(|(_, body)| body.clone())
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_failure(&self, operation: Operation) -> ProviderResult<()> {
        match &self.failure {
            Some((op, error)) if *op == operation => Err(error.clone()),
            _ => Ok(()),
        }
    }

    fn visible(&self, body: Value) -> Value {
        match body {
            Value::Object(mut fields) => {
                for path in &self.hidden_paths {
                    remove_path(&mut fields, path);
                }
                Value::Object(fields)
            }
            other => other,
        }
    }

    fn goes_async(&self) -> bool {
        self.pending_polls > 0 || self.failed_operation.is_some()
    }

    fn start_operation(
        &self,
        inner: &mut Inner,
        store: Option<(ResourceKey, Value)>,
    ) -> PendingOperation {
        inner.next_operation += 1;
        let location = format!("memory://operations/{}", inner.next_operation);
        inner.pending.insert(
            location.clone(),
            PendingEntry {
                remaining: self.pending_polls,
                store,
                failure: self.failed_operation.clone(),
            },
        );
        PendingOperation {
            location,
            mode: PollMode::StatusResource,
            retry_after: None,
        }
    }
}

impl Provider for MemoryProvider {
    fn get(&self, key: &ResourceKey) -> ProviderResult<Option<Value>> {
        let mut inner = self.lock();
        inner.calls.gets += 1;
        self.check_failure(Operation::Get)?;

        let id = storage_key(key);
        match inner.lingering.get(&id).copied() {
            Some(0) => {
                inner.lingering.remove(&id);
                inner.resources.remove(&id);
                return Ok(None);
            }
            Some(remaining) => {
                inner.lingering.insert(id.clone(), remaining - 1);
            }
            None => {}
        }

        Ok(inner
            .resources
            .get(&id)
            .map(|(_, body)| self.visible(body.clone())))
    }

    fn create_or_update(
        &self,
        key: &ResourceKey,
        request: &ProviderRequest,
    ) -> ProviderResult<OperationHandle> {
        let mut inner = self.lock();
        inner.calls.creates_or_updates += 1;
        self.check_failure(Operation::CreateOrUpdate)?;

        let stored = materialize(key, request.clone().into_value(), &mut inner.next_etag);

        if self.goes_async() {
            let pending = self.start_operation(&mut inner, Some((key.clone(), stored)));
            return Ok(OperationHandle::Pending(pending));
        }

        inner
            .resources
            .insert(storage_key(key), (key.clone(), stored.clone()));
        Ok(OperationHandle::Done(Some(stored)))
    }

    fn delete(&self, key: &ResourceKey) -> ProviderResult<OperationHandle> {
        let mut inner = self.lock();
        inner.calls.deletes += 1;
        self.check_failure(Operation::Delete)?;

        let id = storage_key(key);
        if inner.resources.contains_key(&id) {
            if self.lingering_deletes > 0 {
                inner.lingering.insert(id, self.lingering_deletes);
            } else {
                inner.resources.remove(&id);
            }
        }

        if self.goes_async() {
            let pending = self.start_operation(&mut inner, None);
            return Ok(OperationHandle::Pending(pending));
        }
        Ok(OperationHandle::Done(None))
    }

    fn poll(&self, operation: &PendingOperation) -> ProviderResult<PollStatus> {
        let mut inner = self.lock();
        inner.calls.polls += 1;
        self.check_failure(Operation::Poll)?;

        let Some(mut entry) = inner.pending.remove(&operation.location) else {
            return Err(ProviderError::malformed(format!(
                "unknown operation {}",
                operation.location
            )));
        };

        if entry.remaining > 0 {
            entry.remaining -= 1;
            inner.pending.insert(operation.location.clone(), entry);
            return Ok(PollStatus::InProgress { retry_after: None });
        }

        if let Some(message) = entry.failure {
            return Ok(PollStatus::Failed(message));
        }
        if let Some((key, body)) = entry.store {
            inner.resources.insert(storage_key(&key), (key, body));
        }
        Ok(PollStatus::Succeeded(None))
    }

    fn list(
        &self,
        kind: &str,
        resource_group: &str,
        parent: Option<&str>,
    ) -> ProviderResult<Vec<Value>> {
        let mut inner = self.lock();
        inner.calls.lists += 1;
        self.check_failure(Operation::List)?;

        Ok(inner
            .resources
            .values()
            .filter(|(key, _)| {
                key.kind.eq_ignore_ascii_case(kind)
                    && key.resource_group.eq_ignore_ascii_case(resource_group)
                    && match (key.parent.as_deref(), parent) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        (None, None) => true,
                        _ => false,
                    }
            })
            .map(|(_, body)| body.clone())
            .collect())
    }

    fn default_location(&self, resource_group: &str) -> ProviderResult<Option<String>> {
        Ok(self.locations.get(resource_group).cloned())
    }

    /// Served from the stored body at the subresource's target.
    fn get_subresource(
        &self,
        key: &ResourceKey,
        subresource: &Subresource,
    ) -> ProviderResult<Option<Value>> {
        let mut inner = self.lock();
        inner.calls.subresource_reads += 1;
        self.check_failure(Operation::Get)?;

        let Some((_, Value::Object(body))) = inner.resources.get(&storage_key(key)) else {
            return Ok(None);
        };
        let stored = get_path(body, subresource.target);
        let properties = match subresource.shape {
            SubresourceShape::Object => stored
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            SubresourceShape::NameValueList => stored.map(name_value_map).unwrap_or_default(),
        };

        let mut document = Fields::new();
        document.insert("properties".to_string(), Value::Object(properties));
        Ok(Some(Value::Object(document)))
    }
}

/// Names are case-insensitive at the control plane.
fn storage_key(key: &ResourceKey) -> String {
    format!(
        "{}|{}|{}|{}",
        key.kind,
        key.resource_group,
        key.parent.as_deref().unwrap_or_default(),
        key.name
    )
    .to_ascii_lowercase()
}

/// ARM-style resource id
pub fn resource_id(key: &ResourceKey) -> String {
    let mut segments = key.kind.splitn(2, '/');
    let namespace = segments.next().unwrap_or_default();
    let types: Vec<&str> = segments.next().unwrap_or_default().split('/').collect();

    let mut path = format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/{}/providers/{namespace}",
        key.resource_group
    );
    match (&key.parent, types.as_slice()) {
        (Some(parent), [parent_type, child_type, ..]) => {
            path.push_str(&format!("/{parent_type}/{parent}/{child_type}/{}", key.name));
        }
        (_, [resource_type, ..]) => path.push_str(&format!("/{resource_type}/{}", key.name)),
        _ => path.push_str(&format!("/{}", key.name)),
    }
    path
}

/// Add the fields a control plane computes on write.
fn materialize(key: &ResourceKey, body: Value, next_etag: &mut u64) -> Value {
    let mut fields = match body {
        Value::Object(map) => map,
        _ => Fields::new(),
    };
    *next_etag += 1;

    fields.insert("id".to_string(), Value::String(resource_id(key)));
    fields.insert("name".to_string(), Value::String(key.name.clone()));
    fields.insert("type".to_string(), Value::String(key.kind.clone()));
    fields.insert(
        "etag".to_string(),
        Value::String(format!("W/\"{}\"", next_etag)),
    );
    set_path(
        &mut fields,
        "properties.provisioningState",
        Value::String("Succeeded".to_string()),
    );
    Value::Object(fields)
}

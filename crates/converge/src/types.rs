//! Core types for desired-state reconciliation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A JSON object map, the shape of both desired and observed state.
pub type Fields = Map<String, Value>;

/// Identity of one resource instance at the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Provider-native type, e.g. `Microsoft.Web/serverfarms`
    pub kind: String,
    /// Enclosing resource group
    pub resource_group: String,
    /// Name of the instance
    pub name: String,
    /// Parent resource name for nested kinds (e.g. the server of a database)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ResourceKey {
    pub fn new(
        kind: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            resource_group: resource_group.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Attach a parent resource name
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{}/{}/{}", self.resource_group, parent, self.name),
            None => write!(f, "{}/{}", self.resource_group, self.name),
        }
    }
}

/// A separately addressed document that completes a resource's state.
///
/// Some control planes leave parts of a resource out of its GET (a site's
/// app settings, for one) and serve them under a child path instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subresource {
    /// Path below the resource, e.g. `config/appsettings/list`
    pub suffix: &'static str,
    /// Read with POST instead of GET
    pub list_action: bool,
    /// Dotted path in the resource where the document's `properties` land
    pub target: &'static str,
    pub shape: SubresourceShape,
}

/// How a subresource's `properties` map onto the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubresourceShape {
    /// Merged key by key into the object at the target
    Object,
    /// A `{name: value}` map stored as a `[{name, value}]` list
    NameValueList,
}

/// Whether the operator wants the resource to exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedState {
    #[default]
    Present,
    Absent,
}

impl RequestedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl FromStr for RequestedState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown state '{other}' (expected present or absent)")),
        }
    }
}

impl fmt::Display for RequestedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the control plane reported for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservedState {
    /// The resource exists with these fields
    Present(Fields),
    /// The resource does not exist
    Absent,
}

impl ObservedState {
    /// Build from a provider body; non-object bodies are wrapped under `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Present(map),
            other => {
                let mut map = Fields::new();
                map.insert("value".to_string(), other);
                Self::Present(map)
            }
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn fields(&self) -> Option<&Fields> {
        match self {
            Self::Present(fields) => Some(fields),
            Self::Absent => None,
        }
    }

    /// Reported state as JSON, `null` when absent
    pub fn to_value(&self) -> Value {
        match self {
            Self::Present(fields) => Value::Object(fields.clone()),
            Self::Absent => Value::Null,
        }
    }
}

/// A translated, provider-native request payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRequest(pub Fields);

impl ProviderRequest {
    pub fn new(fields: Fields) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// The decided operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoAction,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether this action calls a mutating provider operation
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::NoAction)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed leaf whose observed value differs from the desired one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    /// Dotted path, with `[name]` or `[index]` selectors for list elements
    pub path: String,
    pub observed: Value,
    pub desired: Value,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.path, self.observed, self.desired)
    }
}

/// Output of the decision step
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// State fetched before deciding
    pub observed: ObservedState,
    /// Effective request (desired state with merged tags)
    pub request: ProviderRequest,
    pub drift: Vec<Drift>,
}

/// How a pending operation reports completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollMode {
    /// The location is an operation-status document with a `status` field
    StatusResource,
    /// The location returns the final result once the operation finishes
    ResultResource,
}

/// Handle to a long-running operation still in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub location: String,
    pub mode: PollMode,
    /// Server hint for the next poll
    pub retry_after: Option<Duration>,
}

/// Result of a mutating provider call
#[derive(Debug, Clone, PartialEq)]
pub enum OperationHandle {
    /// Completed synchronously, with the resulting body when one was returned
    Done(Option<Value>),
    /// Accepted; must be polled to completion
    Pending(PendingOperation),
}

/// Status of a pending operation after one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    InProgress { retry_after: Option<Duration> },
    Succeeded(Option<Value>),
    Failed(String),
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileResult {
    pub changed: bool,
    pub action: Action,
    /// Server-confirmed state after the run (or observed state on dry runs)
    pub state: ObservedState,
    pub drift: Vec<Drift>,
    pub dry_run: bool,
}

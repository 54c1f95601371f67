//! Provider boundary
//!
//! The engine talks to a control plane only through this trait. Each
//! method is a single remote call; the engine owns polling and decides
//! when to call again.

use crate::error::ProviderError;
use crate::types::{
    OperationHandle, PendingOperation, PollStatus, ProviderRequest, ResourceKey, Subresource,
};
use serde_json::Value;

/// Result of a provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A control-plane API for one family of resources.
pub trait Provider {
    /// Read one resource. `Ok(None)` means it does not exist.
    fn get(&self, key: &ResourceKey) -> ProviderResult<Option<Value>>;

    /// Create the resource or replace its mutable fields.
    fn create_or_update(
        &self,
        key: &ResourceKey,
        request: &ProviderRequest,
    ) -> ProviderResult<OperationHandle>;

    /// Delete the resource. Deleting an absent resource is not an error.
    fn delete(&self, key: &ResourceKey) -> ProviderResult<OperationHandle>;

    /// Check a pending operation once.
    fn poll(&self, operation: &PendingOperation) -> ProviderResult<PollStatus>;

    /// List every resource of `kind` in a resource group (and parent, for
    /// nested kinds).
    fn list(
        &self,
        kind: &str,
        resource_group: &str,
        parent: Option<&str>,
    ) -> ProviderResult<Vec<Value>>;

    /// Location of a resource group, used to default `location`.
    fn default_location(&self, _resource_group: &str) -> ProviderResult<Option<String>> {
        Ok(None)
    }

    /// Read a subresource document. `Ok(None)` when the provider has none.
    fn get_subresource(
        &self,
        _key: &ResourceKey,
        _subresource: &Subresource,
    ) -> ProviderResult<Option<Value>> {
        Ok(None)
    }
}

impl<P: Provider + ?Sized> Provider for &P {
    fn get(&self, key: &ResourceKey) -> ProviderResult<Option<Value>> {
        (**self).get(key)
    }

    fn create_or_update(
        &self,
        key: &ResourceKey,
        request: &ProviderRequest,
    ) -> ProviderResult<OperationHandle> {
        (**self).create_or_update(key, request)
    }

    fn delete(&self, key: &ResourceKey) -> ProviderResult<OperationHandle> {
        (**self).delete(key)
    }

    fn poll(&self, operation: &PendingOperation) -> ProviderResult<PollStatus> {
        (**self).poll(operation)
    }

    fn list(
        &self,
        kind: &str,
        resource_group: &str,
        parent: Option<&str>,
    ) -> ProviderResult<Vec<Value>> {
        (**self).list(kind, resource_group, parent)
    }

    fn default_location(&self, resource_group: &str) -> ProviderResult<Option<String>> {
        (**self).default_location(resource_group)
    }

    fn get_subresource(
        &self,
        key: &ResourceKey,
        subresource: &Subresource,
    ) -> ProviderResult<Option<Value>> {
        (**self).get_subresource(key, subresource)
    }
}

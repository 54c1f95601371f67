//! # Armkit
//!
//! Blocking Azure Resource Manager client.
//!
//! [`Client`] implements [`converge::Provider`] over the ARM REST API:
//! single GET/PUT/DELETE calls, subresource reads, long-running operation
//! polling and collection listing. Authentication is out of scope; the caller hands in
//! a bearer token (for example from `az account get-access-token`).
//!
//! # Example
//!
//! ```no_run
//! use armkit::Client;
//! use converge::{Provider, ResourceKey};
//!
//! let client = Client::new("00000000-0000-0000-0000-000000000000", "token")
//!     .with_api_version("Microsoft.Web/serverfarms", "2016-09-01");
//! let key = ResourceKey::new("Microsoft.Web/serverfarms", "rg1", "plan1");
//! let plan = client.get(&key).unwrap();
//! ```

pub mod error;
pub mod lro;
pub mod path;

pub use error::{Error, ErrorCategory, Result};

use converge::{
    OperationHandle, PendingOperation, PollStatus, Provider, ProviderRequest, ProviderResult,
    ResourceKey, Subresource,
};
use lro::{RawResponse, classify_delete, classify_poll, classify_write, parse_retry_after};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Public Azure cloud endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// API version used for resource group lookups.
const RESOURCE_GROUP_API_VERSION: &str = "2018-05-01";

const USER_AGENT: &str = concat!("azrm/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Resource Manager client.
pub struct Client {
    /// HTTP agent; error statuses are returned as responses.
    agent: ureq::Agent,
    endpoint: String,
    subscription_id: String,
    token: String,
    /// api-version per lowercased kind
    api_versions: HashMap<String, String>,
}

impl Client {
    /// Create a client for the public cloud.
    #[must_use]
    pub fn new(subscription_id: impl Into<String>, token: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            token: token.into(),
            api_versions: HashMap::new(),
        }
    }

    /// Use a different endpoint (sovereign clouds, test servers).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Register the api-version for a kind.
    #[must_use]
    pub fn with_api_version(mut self, kind: &str, version: impl Into<String>) -> Self {
        self.api_versions
            .insert(kind.to_ascii_lowercase(), version.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn api_version(&self, kind: &str) -> Result<&str> {
        self.api_versions
            .get(&kind.to_ascii_lowercase())
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }

    /// Absolute URL for a path and api-version.
    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{path}?api-version={api_version}", self.endpoint)
    }

    fn resource_url(&self, key: &ResourceKey) -> Result<String> {
        let path = path::resource_path(&self.subscription_id, key)?;
        Ok(self.url(&path, self.api_version(&key.kind)?))
    }

    /// Child path of a resource, with the resource's api-version.
    fn subresource_url(&self, key: &ResourceKey, suffix: &str) -> Result<String> {
        let path = path::resource_path(&self.subscription_id, key)?;
        let path = format!("{path}/{}", suffix.trim_matches('/'));
        Ok(self.url(&path, self.api_version(&key.kind)?))
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<RawResponse> {
        log::debug!("{method:?} {url}");
        let auth = format!("Bearer {}", self.token);

        let result = match method {
            Method::Get => self
                .agent
                .get(url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call(),
            Method::Post => self
                .agent
                .post(url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .send_empty(),
            Method::Delete => self
                .agent
                .delete(url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call(),
            Method::Put => self
                .agent
                .put(url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .send_json(body.unwrap_or(&Value::Null)),
        };
        let mut response = result?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status().as_u16();
        let async_operation = header("Azure-AsyncOperation");
        let location = header("Location");
        let retry_after = header("Retry-After").as_deref().and_then(parse_retry_after);

        let body = response.body_mut().read_to_string()?;
        log::debug!("{method:?} {url} -> {status}");

        Ok(RawResponse {
            status,
            async_operation,
            location,
            retry_after,
            body,
        })
    }

    /// Read one resource; `None` when it does not exist.
    pub fn get_resource(&self, key: &ResourceKey) -> Result<Option<Value>> {
        let response = self.send(Method::Get, &self.resource_url(key)?, None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => response.json(),
            _ => Err(response.error()),
        }
    }

    /// Read a document below a resource (`config/web`), or call a list
    /// action (`config/appsettings/list`). `None` when the resource is gone.
    pub fn read_subresource(
        &self,
        key: &ResourceKey,
        subresource: &Subresource,
    ) -> Result<Option<Value>> {
        let method = if subresource.list_action {
            Method::Post
        } else {
            Method::Get
        };
        let url = self.subresource_url(key, subresource.suffix)?;
        let response = self.send(method, &url, None)?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => response.json(),
            _ => Err(response.error()),
        }
    }

    /// Create or replace a resource.
    pub fn put_resource(&self, key: &ResourceKey, body: &Value) -> Result<OperationHandle> {
        let response = self.send(Method::Put, &self.resource_url(key)?, Some(body))?;
        classify_write(&response)
    }

    /// Delete a resource.
    pub fn delete_resource(&self, key: &ResourceKey) -> Result<OperationHandle> {
        let response = self.send(Method::Delete, &self.resource_url(key)?, None)?;
        classify_delete(&response)
    }

    /// Check a long-running operation once.
    pub fn poll_operation(&self, operation: &PendingOperation) -> Result<PollStatus> {
        let response = self.send(Method::Get, &operation.location, None)?;
        classify_poll(operation.mode, &response)
    }

    /// List a collection, following `nextLink` pages.
    pub fn list_resources(
        &self,
        kind: &str,
        resource_group: &str,
        parent: Option<&str>,
    ) -> Result<Vec<Value>> {
        let path = path::collection_path(&self.subscription_id, kind, resource_group, parent)?;
        let mut next = Some(self.url(&path, self.api_version(kind)?));
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            let response = self.send(Method::Get, &url, None)?;
            if !response.is_success() {
                return Err(response.error());
            }
            let page = response.json()?.unwrap_or(Value::Null);
            if let Some(values) = page.get("value").and_then(Value::as_array) {
                items.extend(values.iter().cloned());
            }
            next = page
                .get("nextLink")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        Ok(items)
    }

    /// Location of a resource group.
    pub fn resource_group_location(&self, resource_group: &str) -> Result<String> {
        let path = path::resource_group_path(&self.subscription_id, resource_group);
        let response = self.send(
            Method::Get,
            &self.url(&path, RESOURCE_GROUP_API_VERSION),
            None,
        )?;
        if !response.is_success() {
            return Err(response.error());
        }
        response
            .json()?
            .as_ref()
            .and_then(|group| group.get("location"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("resource group {resource_group} has no location"))
            })
    }
}

impl Provider for Client {
    fn get(&self, key: &ResourceKey) -> ProviderResult<Option<Value>> {
        Ok(self.get_resource(key)?)
    }

    fn create_or_update(
        &self,
        key: &ResourceKey,
        request: &ProviderRequest,
    ) -> ProviderResult<OperationHandle> {
        Ok(self.put_resource(key, &Value::Object(request.fields().clone()))?)
    }

    fn delete(&self, key: &ResourceKey) -> ProviderResult<OperationHandle> {
        Ok(self.delete_resource(key)?)
    }

    fn poll(&self, operation: &PendingOperation) -> ProviderResult<PollStatus> {
        Ok(self.poll_operation(operation)?)
    }

    fn list(
        &self,
        kind: &str,
        resource_group: &str,
        parent: Option<&str>,
    ) -> ProviderResult<Vec<Value>> {
        Ok(self.list_resources(kind, resource_group, parent)?)
    }

    fn default_location(&self, resource_group: &str) -> ProviderResult<Option<String>> {
        Ok(Some(self.resource_group_location(resource_group)?))
    }

    fn get_subresource(
        &self,
        key: &ResourceKey,
        subresource: &Subresource,
    ) -> ProviderResult<Option<Value>> {
        Ok(self.read_subresource(key, subresource)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("sub-1", "token").with_api_version("Microsoft.Web/serverfarms", "2016-09-01")
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(client().endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_custom_endpoint_trims_slash() {
        let client = client().with_endpoint("http://127.0.0.1:8080/");
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_resource_url() {
        let key = ResourceKey::new("Microsoft.Web/serverfarms", "rg1", "plan1");
        assert_eq!(
            client().resource_url(&key).unwrap(),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.Web/serverfarms/plan1?api-version=2016-09-01"
        );
    }

    #[test]
    fn test_subresource_url() {
        let client = client().with_api_version("Microsoft.Web/sites", "2016-08-01");
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        assert_eq!(
            client.subresource_url(&key, "config/appsettings/list").unwrap(),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.Web/sites/site1/config/appsettings/list?api-version=2016-08-01"
        );
        let web = client.subresource_url(&key, "/config/web").unwrap();
        assert!(web.contains("/sites/site1/config/web?api-version="));
    }

    #[test]
    fn test_api_version_lookup_is_case_insensitive() {
        assert_eq!(
            client().api_version("microsoft.web/SERVERFARMS").unwrap(),
            "2016-09-01"
        );
    }

    #[test]
    fn test_unknown_kind() {
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let err = client().resource_url(&key).unwrap_err();
        assert!(matches!(err, Error::UnknownKind(_)));
    }
}

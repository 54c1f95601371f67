pub mod apply;
pub mod facts;
pub mod kinds;

use crate::config::Settings;
use crate::resource::{self, ResourceKind};
use anyhow::{Context, Result, bail};

/// Resource Manager client for the configured subscription, with the
/// api-version of every catalog kind registered.
pub fn connect(settings: &Settings) -> Result<armkit::Client> {
    let subscription_id = settings.require_subscription()?;
    let token = settings.access_token(|name| std::env::var(name).ok())?;

    let mut client = armkit::Client::new(subscription_id, token);
    if let Some(endpoint) = &settings.endpoint {
        client = client.with_endpoint(endpoint.as_str());
    }
    for kind in resource::catalog() {
        client = client.with_api_version(kind.arm_type(), kind.api_version());
    }
    log::debug!(
        "Connected to {} (subscription {subscription_id})",
        client.endpoint()
    );
    Ok(client)
}

/// Look up a kind by catalog name or ARM type.
pub fn find_kind(name: &str) -> Result<&'static dyn ResourceKind> {
    resource::find(name)
        .with_context(|| format!("Unknown resource kind '{name}' (see `azrm kinds`)"))
}

/// Look up a kind that can be reconciled.
pub fn find_managed(name: &str) -> Result<&'static dyn ResourceKind> {
    let kind = find_kind(name)?;
    if !kind.is_managed() {
        bail!(
            "{} is read-only; use `azrm facts {} -g <group>` to read it",
            kind.name(),
            kind.name()
        );
    }
    Ok(kind)
}

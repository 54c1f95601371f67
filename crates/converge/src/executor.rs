//! Action Executor
//!
//! Carries out a [`Decision`]: one mutating call, then polling until the
//! control plane reports a final state. Deletes are confirmed by
//! re-fetching until the resource is gone.

use crate::error::{Error, ProviderError, Result};
use crate::fetch::fetch;
use crate::poll::{PollCallback, PollPolicy, wait_for_operation, wait_until_absent};
use crate::provider::Provider;
use crate::types::{Action, Decision, ObservedState, OperationHandle, ResourceKey};
use serde_json::Value;

/// Final state after executing a decision, and whether anything changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub changed: bool,
    pub state: ObservedState,
}

/// Execute a decision against the provider.
pub fn execute<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    decision: &Decision,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
) -> Result<Outcome> {
    match decision.action {
        Action::NoAction => Ok(Outcome {
            changed: false,
            state: decision.observed.clone(),
        }),
        Action::Create | Action::Update => apply(provider, key, decision, policy, callback),
        Action::Delete => delete(provider, key, policy, callback),
    }
}

fn apply<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    decision: &Decision,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
) -> Result<Outcome> {
    let operation = if decision.action == Action::Create {
        "create"
    } else {
        "update"
    };
    log::debug!("{key}: sending {operation} request");

    let handle = provider
        .create_or_update(key, &decision.request)
        .map_err(|source| Error::ProviderCall {
            resource: key.to_string(),
            operation,
            source,
        })?;

    let body = match handle {
        OperationHandle::Done(body) => body,
        OperationHandle::Pending(pending) => {
            log::info!("{key}: {operation} accepted, waiting for completion");
            wait_for_operation(provider, key, operation, &pending, policy, callback)?
        }
    };

    let state = match body {
        Some(value @ Value::Object(_)) => ObservedState::from_value(value),
        _ => match fetch(provider, key)? {
            ObservedState::Absent => {
                return Err(Error::ProviderCall {
                    resource: key.to_string(),
                    operation,
                    source: ProviderError::malformed("resource not found after completion"),
                });
            }
            present => present,
        },
    };

    let changed = decision.observed.is_absent() || state != decision.observed;
    Ok(Outcome { changed, state })
}

fn delete<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
) -> Result<Outcome> {
    const OPERATION: &str = "delete";
    log::debug!("{key}: sending delete request");

    let handle = provider.delete(key).map_err(|source| Error::ProviderCall {
        resource: key.to_string(),
        operation: OPERATION,
        source,
    })?;

    if let OperationHandle::Pending(pending) = handle {
        log::info!("{key}: delete accepted, waiting for completion");
        wait_for_operation(provider, key, OPERATION, &pending, policy, callback)?;
    }

    wait_until_absent(provider, key, policy, callback)?;

    Ok(Outcome {
        changed: true,
        state: ObservedState::Absent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::memory::{MemoryProvider, Operation};
    use crate::poll::NoCallback;
    use crate::types::{Fields, ProviderRequest};
    use serde_json::json;

    fn key() -> ResourceKey {
        ResourceKey::new("Microsoft.Network/applicationGateways", "rg1", "gw1")
    }

    fn decision(action: Action, observed: ObservedState, request: Value) -> Decision {
        let fields: Fields = request.as_object().cloned().unwrap_or_default();
        Decision {
            action,
            observed,
            request: ProviderRequest::new(fields),
            drift: Vec::new(),
        }
    }

    #[test]
    fn test_no_action_makes_no_calls() {
        let provider = MemoryProvider::new();
        let observed = ObservedState::from_value(json!({"name": "gw1"}));
        let outcome = execute(
            &provider,
            &key(),
            &decision(Action::NoAction, observed.clone(), json!({})),
            &PollPolicy::immediate(1),
            &NoCallback,
        )
        .unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.state, observed);
        assert_eq!(provider.calls(), crate::memory::Calls::default());
    }

    #[test]
    fn test_create_synchronous() {
        let provider = MemoryProvider::new();
        let outcome = execute(
            &provider,
            &key(),
            &decision(Action::Create, ObservedState::Absent, json!({"location": "eastus"})),
            &PollPolicy::immediate(1),
            &NoCallback,
        )
        .unwrap();

        assert!(outcome.changed);
        let fields = outcome.state.fields().unwrap();
        assert_eq!(fields["location"], "eastus");
        assert_eq!(fields["properties"]["provisioningState"], "Succeeded");
        assert_eq!(provider.calls().gets, 0);
    }

    #[test]
    fn test_create_async_reads_final_state() {
        let provider = MemoryProvider::new().with_pending_polls(1);
        let outcome = execute(
            &provider,
            &key(),
            &decision(Action::Create, ObservedState::Absent, json!({"location": "eastus"})),
            &PollPolicy::immediate(5),
            &NoCallback,
        )
        .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.state.fields().unwrap()["name"], "gw1");
        let calls = provider.calls();
        assert_eq!(calls.creates_or_updates, 1);
        assert_eq!(calls.polls, 2);
        assert_eq!(calls.gets, 1);
    }

    #[test]
    fn test_async_failure_is_provider_error() {
        let provider = MemoryProvider::new().with_failed_operation("InternalServerError");
        let err = execute(
            &provider,
            &key(),
            &decision(Action::Create, ObservedState::Absent, json!({})),
            &PollPolicy::immediate(5),
            &NoCallback,
        )
        .unwrap_err();

        assert!(matches!(err, Error::ProviderCall { operation: "create", .. }));
        assert!(err.to_string().contains("InternalServerError"));
    }

    #[test]
    fn test_create_call_failure_is_not_retried() {
        let provider = MemoryProvider::new().failing(
            Operation::CreateOrUpdate,
            ProviderError::new(ProviderErrorKind::Throttled, "too many requests").with_status(429),
        );
        let err = execute(
            &provider,
            &key(),
            &decision(Action::Create, ObservedState::Absent, json!({})),
            &PollPolicy::immediate(5),
            &NoCallback,
        )
        .unwrap_err();

        assert!(err.to_string().contains("rg1/gw1"));
        assert_eq!(provider.calls().creates_or_updates, 1);
    }

    #[test]
    fn test_delete_waits_for_lingering_resource() {
        let provider = MemoryProvider::new()
            .with_resource(&key(), json!({}))
            .with_lingering_deletes(2);
        let observed = ObservedState::from_value(provider.resource(&key()).unwrap());

        let outcome = execute(
            &provider,
            &key(),
            &decision(Action::Delete, observed, json!({})),
            &PollPolicy::immediate(5),
            &NoCallback,
        )
        .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.state, ObservedState::Absent);
        assert_eq!(provider.calls().gets, 3);
        assert_eq!(provider.resource(&key()), None);
    }

    #[test]
    fn test_delete_confirmation_is_bounded() {
        let provider = MemoryProvider::new()
            .with_resource(&key(), json!({}))
            .with_lingering_deletes(10);
        let observed = ObservedState::from_value(provider.resource(&key()).unwrap());

        let err = execute(
            &provider,
            &key(),
            &decision(Action::Delete, observed, json!({})),
            &PollPolicy::immediate(3),
            &NoCallback,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::PollTimeout {
                operation: "delete confirmation",
                attempts: 3,
                ..
            }
        ));
        assert_eq!(provider.calls().gets, 3);
    }
}

//! The reconciliation pipeline
//!
//! Translate -> Fetch -> Decide -> (dry run stops here) -> Execute -> Report.
//! Each stage hands its output to the next; nothing is shared.

use crate::diff::{DesiredState, DiffPolicy, decide};
use crate::error::Result;
use crate::executor::execute;
use crate::fetch::fetch_with;
use crate::poll::{LogCallback, PollCallback, PollPolicy};
use crate::provider::Provider;
use crate::schema::Schema;
use crate::types::{Decision, Fields, ReconcileResult, RequestedState, ResourceKey, Subresource};

/// Field table and comparison rules of one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct KindRules {
    pub schema: Schema,
    pub diff: DiffPolicy,
    /// Read after the resource itself and overlaid onto observed state
    pub subresources: &'static [Subresource],
}

/// One reconciliation to perform.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub key: ResourceKey,
    /// Desired parameters, in schema (user) vocabulary
    pub params: Fields,
    pub requested: RequestedState,
    pub append_tags: bool,
    /// Replace merged lists instead of keeping unmentioned entries
    pub purge_lists: bool,
    /// Stop after deciding
    pub dry_run: bool,
}

impl ReconcileRequest {
    pub fn new(key: ResourceKey, params: Fields) -> Self {
        Self {
            key,
            params,
            requested: RequestedState::Present,
            append_tags: true,
            purge_lists: false,
            dry_run: false,
        }
    }
}

/// Runs the pipeline against a provider.
pub struct Reconciler<'a, P: Provider + ?Sized> {
    provider: &'a P,
    policy: PollPolicy,
    callback: &'a dyn PollCallback,
}

impl<'a, P: Provider + ?Sized> Reconciler<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            policy: PollPolicy::default(),
            callback: &LogCallback,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_callback(mut self, callback: &'a dyn PollCallback) -> Self {
        self.callback = callback;
        self
    }

    /// Validate, translate, fetch and decide. Makes no mutating call.
    pub fn plan(&self, request: &ReconcileRequest, rules: &KindRules) -> Result<Decision> {
        rules.schema.validate(&request.params)?;
        let translated = rules.schema.translate(&request.params);

        let observed = fetch_with(self.provider, &request.key, rules.subresources)?;

        let desired = DesiredState {
            requested: request.requested,
            request: &translated,
            append_tags: request.append_tags,
            purge_lists: request.purge_lists,
        };
        decide(&request.key, observed, &desired, &rules.diff)
    }

    /// Run the whole pipeline.
    pub fn reconcile(
        &self,
        request: &ReconcileRequest,
        rules: &KindRules,
    ) -> Result<ReconcileResult> {
        let decision = self.plan(request, rules)?;
        self.apply(request, decision)
    }

    /// Carry out a decision from [`Reconciler::plan`].
    pub fn apply(&self, request: &ReconcileRequest, decision: Decision) -> Result<ReconcileResult> {
        if request.dry_run {
            log::info!("{}: check mode, not executing {}", request.key, decision.action);
            return Ok(ReconcileResult {
                changed: decision.action.is_mutation(),
                action: decision.action,
                state: decision.observed,
                drift: decision.drift,
                dry_run: true,
            });
        }

        let outcome = execute(
            self.provider,
            &request.key,
            &decision,
            &self.policy,
            self.callback,
        )?;

        Ok(ReconcileResult {
            changed: outcome.changed,
            action: decision.action,
            state: outcome.state,
            drift: decision.drift,
            dry_run: false,
        })
    }
}

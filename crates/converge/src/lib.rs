//! # Converge
//!
//! Desired-state reconciliation for control-plane resources.
//!
//! A reconciliation takes a resource identity and a desired parameter set,
//! reads what exists, decides whether to create, update or delete it,
//! performs that one change and reports the resulting state.
//!
//! ## Pipeline
//!
//! - **Field Translator** ([`Schema`]): user parameters to provider payload,
//!   driven by a declarative field table with enum renames and defaults
//! - **State Fetcher** ([`fetch`]): current state, where not-found is a
//!   normal outcome
//! - **Decision Engine** ([`decide`]): NoAction / Create / Update / Delete
//!   under a per-kind [`DiffPolicy`]
//! - **Action Executor** ([`execute`]): one mutating call, polled to
//!   completion under a bounded [`PollPolicy`]
//! - **Result Reporter** ([`ReconcileResult::to_output`], [`Failure`])
//!
//! [`Reconciler`] wires the stages together.
//!
//! ## Example
//!
//! ```ignore
//! use converge::{KindRules, MemoryProvider, ReconcileRequest, Reconciler, ResourceKey};
//!
//! let provider = MemoryProvider::new();
//! let request = ReconcileRequest::new(
//!     ResourceKey::new("Microsoft.Web/serverfarms", "rg1", "plan1"),
//!     params,
//! );
//! let result = Reconciler::new(&provider).reconcile(&request, &rules)?;
//! println!("{}", result.to_output("azure_appserviceplan"));
//! ```
//!
//! ## Provider Trait
//!
//! The engine only talks to the control plane through [`Provider`].
//! [`MemoryProvider`] implements it in memory for tests.

pub mod diff;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod memory;
pub mod poll;
pub mod provider;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use diff::{DesiredState, DiffPolicy, Managed, decide, merge_tags, values_match};
pub use error::{Error, ErrorCategory, ProviderError, ProviderErrorKind, Result};
pub use executor::{Outcome, execute};
pub use fetch::{Facts, FactsQuery, TagFilter, fetch, fetch_with, query_facts};
pub use memory::MemoryProvider;
pub use poll::{LogCallback, NoCallback, PollCallback, PollPolicy};
pub use provider::{Provider, ProviderResult};
pub use reconcile::{KindRules, ReconcileRequest, Reconciler};
pub use report::Failure;
pub use schema::{EnumMapping, FieldKind, FieldSpec, Literal, Schema};
pub use types::{
    Action, Decision, Drift, Fields, ObservedState, OperationHandle, PendingOperation, PollMode,
    PollStatus, ProviderRequest, ReconcileResult, RequestedState, ResourceKey, Subresource,
    SubresourceShape,
};

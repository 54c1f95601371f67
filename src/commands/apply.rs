//! `azrm apply` and `azrm diff`
//!
//! Both load a request file, prepare it with the kind's rules and hand it
//! to the reconciler. `diff` stops after deciding. Secret values are masked
//! in everything printed.

use super::{connect, find_managed};
use crate::Context;
use crate::cli::{ApplyArgs, DiffArgs, OutputFormat};
use crate::config::{RequestFile, Settings};
use crate::progress::Spinner;
use crate::resource::{PrepareContext, ResourceKind, Secrets};
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use console::Term;
use converge::{
    Action, Decision, Drift, Error, Failure, KindRules, ObservedState, PollCallback, PollPolicy,
    Provider, ReconcileRequest, ReconcileResult, Reconciler, RequestedState, ResourceKey,
};
use serde_json::Value;

/// Command-line overrides of the request file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub check: bool,
    pub state: Option<RequestedState>,
}

/// How an apply ended.
#[derive(Debug)]
pub enum Applied {
    Done(ReconcileResult),
    /// A delete was declined at the prompt
    Cancelled,
}

// ============================================================================
// Request Preparation
// ============================================================================

/// Turn a request file into a reconciliation request.
///
/// Parameters are checked before anything is read. The only call made is
/// the resource group lookup for a missing `location`.
pub fn build_request<P: Provider + ?Sized>(
    provider: &P,
    kind: &dyn ResourceKind,
    rules: &KindRules,
    file: &RequestFile,
    subscription_id: &str,
    overrides: Overrides,
) -> converge::Result<ReconcileRequest> {
    let requested = overrides.state.unwrap_or(file.state);
    let ctx = PrepareContext {
        subscription_id,
        resource_group: &file.resource_group,
    };

    let raw = file.params();
    let mut params = kind.prepare(&raw, &ctx)?;
    rules.schema.validate(&params)?;

    let mut key = ResourceKey::new(kind.arm_type(), &file.resource_group, &file.name);
    if let Some(parent) = &file.parent {
        key = key.with_parent(parent);
    }

    let missing_location = params.get("location").is_none_or(Value::is_null);
    if requested == RequestedState::Present && kind.takes_location() && missing_location {
        let location = provider
            .default_location(&file.resource_group)
            .map_err(|source| Error::Fetch {
                resource: format!("resource group {}", file.resource_group),
                source,
            })?;
        if let Some(location) = location {
            log::info!("{key}: using resource group location {location}");
            params.insert("location".to_string(), Value::String(location));
        }
    }

    Ok(ReconcileRequest {
        key,
        params,
        requested,
        append_tags: file.append_tags,
        purge_lists: kind.purge_lists(&raw),
        dry_run: overrides.check || file.check_mode,
    })
}

/// Reconcile one request file.
///
/// `confirm` is asked before a real delete; declining makes no call.
#[allow(clippy::too_many_arguments)]
pub fn reconcile_file<P, F>(
    provider: &P,
    kind: &dyn ResourceKind,
    file: &RequestFile,
    subscription_id: &str,
    overrides: Overrides,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
    confirm: F,
) -> converge::Result<Applied>
where
    P: Provider + ?Sized,
    F: FnOnce(&ResourceKey) -> bool,
{
    let Some(rules) = kind.rules() else {
        return Err(Error::invalid("kind", format!("{} is read-only", kind.name())));
    };
    let request = build_request(provider, kind, &rules, file, subscription_id, overrides)?;

    let reconciler = Reconciler::new(provider)
        .with_policy(policy.clone())
        .with_callback(callback);
    let decision = reconciler.plan(&request, &rules)?;

    if decision.action == Action::Delete && !request.dry_run && !confirm(&request.key) {
        return Ok(Applied::Cancelled);
    }

    reconciler.apply(&request, decision).map(Applied::Done)
}

// ============================================================================
// Apply
// ============================================================================

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let file = RequestFile::load(&args.file)?;
    let kind = find_managed(&file.kind)?;
    let settings = Settings::load(ctx.config.as_deref())?;
    let client = connect(&settings)?;
    let subscription_id = settings.require_subscription()?;

    let json = args.format == OutputFormat::Json;
    let overrides = Overrides {
        check: args.check,
        state: args.state,
    };
    let interactive = !json && !args.yes;

    let spinner = Spinner::start(
        &format!("Reconciling {} {}", kind.name(), file.name),
        !json && !ctx.quiet,
    );
    let outcome = reconcile_file(
        &client,
        kind,
        &file,
        subscription_id,
        overrides,
        &settings.poll.policy(),
        &spinner,
        |key| !interactive || spinner.suspend(|| confirm_delete(key)),
    );
    spinner.finish();

    match outcome {
        Ok(Applied::Done(result)) => {
            let result = redacted(&result, &kind.secrets());
            if json {
                let output = result.to_output(kind.output_key());
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_result(kind, &file, &result, ctx.verbose > 0);
            }
            Ok(())
        }
        Ok(Applied::Cancelled) => {
            ui::warn("Cancelled, nothing was deleted");
            Ok(())
        }
        Err(err) => {
            if json {
                let output = Failure::from_error(&err).to_output();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if let Some(provider) = err.provider_error() {
                ui::dim(&format!("provider: {}", provider.kind.description()));
            }
            if !json {
                ui::dim(err.category().advice());
            }
            Err(err.into())
        }
    }
}

fn confirm_delete(key: &ResourceKey) -> bool {
    if !Term::stdout().is_term() {
        ui::warn(&format!(
            "Not deleting {key}: no terminal to confirm on (pass --yes)"
        ));
        return false;
    }
    dialoguer::Confirm::new()
        .with_prompt(format!("Delete {key}?"))
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Copy of a result with secret values masked, for printing.
pub fn redacted(result: &ReconcileResult, secrets: &Secrets) -> ReconcileResult {
    let state = match &result.state {
        ObservedState::Present(fields) => {
            ObservedState::from_value(secrets.redact("", &Value::Object(fields.clone())))
        }
        ObservedState::Absent => ObservedState::Absent,
    };
    let drift = result
        .drift
        .iter()
        .map(|d| Drift {
            path: d.path.clone(),
            observed: secrets.redact(&d.path, &d.observed),
            desired: secrets.redact(&d.path, &d.desired),
        })
        .collect();
    ReconcileResult {
        state,
        drift,
        ..result.clone()
    }
}

fn print_result(
    kind: &dyn ResourceKind,
    file: &RequestFile,
    result: &ReconcileResult,
    verbose: bool,
) {
    let target = format!("{} {}/{}", kind.name(), file.resource_group, file.name);

    if result.dry_run {
        if result.changed {
            ui::info(&format!(
                "Check mode: would {} {target}",
                ui::action(result.action)
            ));
        } else {
            ui::info(&format!("Check mode: {target} is up to date"));
        }
    } else if result.changed {
        ui::success(&format!("{}: {target}", ui::action(result.action)));
    } else {
        ui::success(&format!("{target} is up to date"));
    }

    for drift in &result.drift {
        println!(
            "  {} {} {} {}",
            drift.path.cyan(),
            ui::value(&drift.observed).red(),
            "→".dimmed(),
            ui::value(&drift.desired).green()
        );
    }

    if let Some(state) = result.state.fields() {
        if let Some(id) = state.get("id").and_then(Value::as_str) {
            ui::kv("id", id);
        }
        if let Some(provisioning) = state
            .get("properties")
            .and_then(|p| p.get("provisioningState"))
            .and_then(Value::as_str)
        {
            ui::kv("provisioning state", provisioning);
        }
        if verbose {
            if let Ok(pretty) = serde_json::to_string_pretty(state) {
                println!("{}", pretty.dimmed());
            }
        }
    }
}

// ============================================================================
// Diff
// ============================================================================

pub fn diff(ctx: &Context, args: DiffArgs) -> Result<()> {
    let file = RequestFile::load(&args.file)?;
    let kind = find_managed(&file.kind)?;
    let settings = Settings::load(ctx.config.as_deref())?;
    let client = connect(&settings)?;
    let subscription_id = settings.require_subscription()?;

    let Some(rules) = kind.rules() else {
        return Ok(());
    };
    let overrides = Overrides {
        check: true,
        state: args.state,
    };
    let request = build_request(&client, kind, &rules, &file, subscription_id, overrides)?;
    let decision = Reconciler::new(&client).plan(&request, &rules)?;

    ui::header(&format!("{} {}", kind.name(), request.key));
    ui::kv("action", &ui::action(decision.action).to_string());

    let (observed, desired) = diff_texts(&decision, &kind.secrets());
    if observed == desired {
        ui::dim("(no differences)");
        return Ok(());
    }
    println!();
    show_text_diff(&observed, &desired);
    Ok(())
}

/// Before and after text for a decision.
///
/// Creates show the whole request, deletes the whole resource, updates one
/// `path = value` line per drifted field. Secrets are masked.
pub fn diff_texts(decision: &Decision, secrets: &Secrets) -> (String, String) {
    let pretty = |value: &Value| {
        serde_json::to_string_pretty(&secrets.redact("", value)).unwrap_or_default() + "\n"
    };
    match decision.action {
        Action::NoAction => (String::new(), String::new()),
        Action::Create => (
            String::new(),
            pretty(&Value::Object(decision.request.fields().clone())),
        ),
        Action::Delete => (pretty(&decision.observed.to_value()), String::new()),
        Action::Update => {
            let mut observed = String::new();
            let mut desired = String::new();
            for drift in &decision.drift {
                let before = secrets.redact(&drift.path, &drift.observed);
                let after = secrets.redact(&drift.path, &drift.desired);
                observed.push_str(&format!("{} = {before}\n", drift.path));
                desired.push_str(&format!("{} = {after}\n", drift.path));
            }
            (observed, desired)
        }
    }
}

fn show_text_diff(observed: &str, desired: &str) {
    let diff = similar::TextDiff::from_lines(observed, desired);

    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {
                print!("    {}", format!("  {change}").dimmed());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{app_gateway, app_service_plan, web_app};
    use converge::{MemoryProvider, NoCallback, ObservedState};
    use serde_json::json;

    const SUB: &str = "sub-1";

    fn file(kind: &str, name: &str, spec: Value) -> RequestFile {
        RequestFile {
            kind: kind.to_string(),
            resource_group: "rg1".to_string(),
            name: name.to_string(),
            parent: None,
            state: RequestedState::Present,
            check_mode: false,
            append_tags: true,
            tags: None,
            spec: spec.as_object().cloned().unwrap(),
        }
    }

    fn run_file(
        provider: &MemoryProvider,
        kind: &dyn ResourceKind,
        file: &RequestFile,
        overrides: Overrides,
        confirm: bool,
    ) -> converge::Result<Applied> {
        reconcile_file(
            provider,
            kind,
            file,
            SUB,
            overrides,
            &PollPolicy::immediate(5),
            &NoCallback,
            |_| confirm,
        )
    }

    fn done(applied: Applied) -> ReconcileResult {
        match applied {
            Applied::Done(result) => result,
            Applied::Cancelled => panic!("unexpectedly cancelled"),
        }
    }

    #[test]
    fn test_location_defaults_to_resource_group() {
        let provider = MemoryProvider::new().with_location("rg1", "westeurope");
        let file = file("app_service_plan", "plan1", json!({"sku": "S1"}));

        let request = build_request(
            &provider,
            &app_service_plan::AppServicePlan,
            &app_service_plan::RULES,
            &file,
            SUB,
            Overrides::default(),
        )
        .unwrap();

        assert_eq!(request.params["location"], "westeurope");
        assert_eq!(request.key.to_string(), "rg1/plan1");
        assert!(!request.dry_run);
    }

    #[test]
    fn test_given_location_is_kept() {
        let provider = MemoryProvider::new().with_location("rg1", "westeurope");
        let file = file(
            "app_service_plan",
            "plan1",
            json!({"sku": "S1", "location": "eastus"}),
        );

        let request = build_request(
            &provider,
            &app_service_plan::AppServicePlan,
            &app_service_plan::RULES,
            &file,
            SUB,
            Overrides::default(),
        )
        .unwrap();
        assert_eq!(request.params["location"], "eastus");
    }

    #[test]
    fn test_overrides_apply() {
        let provider = MemoryProvider::new();
        let mut file = file("application_gateway", "gw1", json!({}));
        file.check_mode = true;

        let request = build_request(
            &provider,
            &app_gateway::ApplicationGateway,
            &app_gateway::RULES,
            &file,
            SUB,
            Overrides {
                check: false,
                state: Some(RequestedState::Absent),
            },
        )
        .unwrap();

        assert!(request.dry_run);
        assert_eq!(request.requested, RequestedState::Absent);
        assert!(!request.params.contains_key("location"));
    }

    #[test]
    fn test_invalid_gateway_parameter_makes_no_calls() {
        let provider = MemoryProvider::new().with_location("rg1", "eastus");
        let file = file(
            "application_gateway",
            "gw1",
            json!({"sku": {"name": "standard_huge"}}),
        );

        let err = run_file(
            &provider,
            &app_gateway::ApplicationGateway,
            &file,
            Overrides::default(),
            true,
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(provider.calls(), converge::memory::Calls::default());
    }

    #[test]
    fn test_tags_rejected_for_gateway() {
        let provider = MemoryProvider::new();
        let mut file = file("application_gateway", "gw1", json!({}));
        file.tags = Some(json!({"env": "dev"}).as_object().cloned().unwrap());

        let err = run_file(
            &provider,
            &app_gateway::ApplicationGateway,
            &file,
            Overrides::default(),
            true,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_apply_plan_with_tags() {
        let provider = MemoryProvider::new();
        let mut file = file(
            "app_service_plan",
            "plan1",
            json!({"sku": "B1", "location": "eastus"}),
        );
        file.tags = Some(json!({"env": "dev"}).as_object().cloned().unwrap());

        let result = done(
            run_file(
                &provider,
                &app_service_plan::AppServicePlan,
                &file,
                Overrides::default(),
                true,
            )
            .unwrap(),
        );

        assert!(result.changed);
        let state = result.state.fields().unwrap();
        assert_eq!(state["tags"], json!({"env": "dev"}));
        assert_eq!(state["sku"]["tier"], "Basic");

        let output = result.to_output("azure_appserviceplan");
        assert_eq!(output["changed"], true);
        assert_eq!(output["azure_appserviceplan"]["name"], "plan1");
    }

    #[test]
    fn test_declined_delete_makes_no_call() {
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let provider = MemoryProvider::new().with_resource(&key, json!({"properties": {}}));
        let mut file = file("web_app", "site1", json!({}));
        file.state = RequestedState::Absent;

        let applied = run_file(
            &provider,
            &web_app::WebApp,
            &file,
            Overrides::default(),
            false,
        )
        .unwrap();

        assert!(matches!(applied, Applied::Cancelled));
        assert_eq!(provider.calls().deletes, 0);
        assert!(provider.resource(&key).is_some());
    }

    #[test]
    fn test_confirmed_delete() {
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let provider = MemoryProvider::new().with_resource(&key, json!({"properties": {}}));
        let mut file = file("web_app", "site1", json!({}));
        file.state = RequestedState::Absent;

        let result = done(
            run_file(
                &provider,
                &web_app::WebApp,
                &file,
                Overrides::default(),
                true,
            )
            .unwrap(),
        );

        assert!(result.changed);
        assert_eq!(result.action, Action::Delete);
        assert_eq!(result.state, ObservedState::Absent);
        assert!(provider.resource(&key).is_none());
    }

    #[test]
    fn test_check_mode_does_not_ask() {
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let provider = MemoryProvider::new().with_resource(&key, json!({"properties": {}}));
        let mut file = file("web_app", "site1", json!({}));
        file.state = RequestedState::Absent;

        let result = done(
            reconcile_file(
                &provider,
                &web_app::WebApp,
                &file,
                SUB,
                Overrides {
                    check: true,
                    state: None,
                },
                &PollPolicy::immediate(5),
                &NoCallback,
                |_| panic!("check mode must not prompt"),
            )
            .unwrap(),
        );

        assert!(result.changed);
        assert!(result.dry_run);
        assert_eq!(provider.calls().mutations(), 0);
    }

    #[test]
    fn test_diff_texts_for_update() {
        let provider = MemoryProvider::new().with_resource(
            &ResourceKey::new("Microsoft.Web/serverfarms", "rg1", "plan1"),
            json!({"sku": {"name": "S1", "capacity": 1}}),
        );
        let file = file(
            "app_service_plan",
            "plan1",
            json!({"sku": "S2", "number_of_workers": 1}),
        );
        let request = build_request(
            &provider,
            &app_service_plan::AppServicePlan,
            &app_service_plan::RULES,
            &file,
            SUB,
            Overrides {
                check: true,
                state: None,
            },
        )
        .unwrap();
        let decision = Reconciler::new(&provider)
            .plan(&request, &app_service_plan::RULES)
            .unwrap();

        let (observed, desired) = diff_texts(&decision, &Secrets::NONE);
        assert_eq!(observed, "sku.name = \"S1\"\n");
        assert_eq!(desired, "sku.name = \"S2\"\n");
    }

    #[test]
    fn test_diff_texts_for_create() {
        let provider = MemoryProvider::new();
        let file = file("app_service_plan", "plan1", json!({"sku": "S1", "location": "eastus"}));
        let request = build_request(
            &provider,
            &app_service_plan::AppServicePlan,
            &app_service_plan::RULES,
            &file,
            SUB,
            Overrides::default(),
        )
        .unwrap();
        let decision = Reconciler::new(&provider)
            .plan(&request, &app_service_plan::RULES)
            .unwrap();

        let (observed, desired) = diff_texts(&decision, &Secrets::NONE);
        assert!(observed.is_empty());
        assert!(desired.contains("\"name\": \"S1\""));
        assert!(desired.ends_with('\n'));
    }

    fn plan(
        provider: &MemoryProvider,
        kind: &dyn ResourceKind,
        file: &RequestFile,
    ) -> (Decision, Secrets) {
        let rules = kind.rules().unwrap();
        let overrides = Overrides {
            check: true,
            state: None,
        };
        let request = build_request(provider, kind, &rules, file, SUB, overrides).unwrap();
        let decision = Reconciler::new(provider).plan(&request, &rules).unwrap();
        (decision, kind.secrets())
    }

    #[test]
    fn test_gateway_create_diff_hides_certificate_secrets() {
        let provider = MemoryProvider::new();
        let file = file(
            "application_gateway",
            "gw1",
            json!({
                "location": "eastus",
                "ssl_certificates": [{"name": "c1", "data": "MIIBpfx", "password": "hunter2"}]
            }),
        );
        let (decision, secrets) = plan(&provider, &app_gateway::ApplicationGateway, &file);
        assert_eq!(decision.action, Action::Create);

        let (_, desired) = diff_texts(&decision, &secrets);
        assert!(!desired.contains("hunter2"), "{desired}");
        assert!(!desired.contains("MIIBpfx"), "{desired}");
        assert!(desired.contains(crate::resource::MASK));
        // The request itself still carries the real values.
        assert!(decision.request.into_value().to_string().contains("hunter2"));
    }

    #[test]
    fn test_web_app_diff_hides_registry_password() {
        let key = ResourceKey::new("Microsoft.Web/sites", "rg1", "site1");
        let provider = MemoryProvider::new().with_resource(
            &key,
            json!({"properties": {"siteConfig": {
                "linuxFxVersion": "DOCKER|app:1.0",
                "appSettings": [{"name": "DOCKER_REGISTRY_SERVER_PASSWORD", "value": "old-pass"}]
            }}}),
        );
        let file = file(
            "web_app",
            "site1",
            json!({"container_settings": {"name": "app:1.0", "registry_server_password": "new-pass"}}),
        );
        let (decision, secrets) = plan(&provider, &web_app::WebApp, &file);
        assert_eq!(decision.action, Action::Update);

        let (observed, desired) = diff_texts(&decision, &secrets);
        assert!(!observed.contains("old-pass"), "{observed}");
        assert!(!desired.contains("new-pass"), "{desired}");
        assert!(desired.contains("appSettings[DOCKER_REGISTRY_SERVER_PASSWORD].value"));
    }

    #[test]
    fn test_printed_result_is_redacted() {
        let provider = MemoryProvider::new();
        let file = file(
            "web_app",
            "site1",
            json!({
                "location": "eastus",
                "plan": "plan1",
                "container_settings": {"name": "app:1.0", "registry_server_password": "s3cret"}
            }),
        );
        let result = done(
            run_file(&provider, &web_app::WebApp, &file, Overrides::default(), true).unwrap(),
        );
        assert!(result.state.to_value().to_string().contains("s3cret"));

        let shown = redacted(&result, &web_app::WebApp.secrets());
        let output = shown.to_output("azure_webapp");
        assert!(!output.to_string().contains("s3cret"));
        assert_eq!(shown.action, result.action);
    }

    #[test]
    fn test_purge_flag_reaches_request() {
        let provider = MemoryProvider::new();
        let file = file(
            "web_app",
            "site1",
            json!({"plan": "plan1", "app_settings": {"MODE": "prod"}, "purge_app_settings": true}),
        );
        let request = build_request(
            &provider,
            &web_app::WebApp,
            &web_app::RULES,
            &file,
            SUB,
            Overrides::default(),
        )
        .unwrap();
        assert!(request.purge_lists);
        assert!(!request.params.contains_key("purge_app_settings"));
    }
}

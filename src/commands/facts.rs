//! `azrm facts`: read resources without changing them

use super::{connect, find_kind};
use crate::Context;
use crate::cli::{FactsArgs, OutputFormat};
use crate::config::Settings;
use crate::resource::ResourceKind;
use crate::ui;
use anyhow::{Result, bail};
use converge::{Facts, FactsQuery, Provider, TagFilter, query_facts};
use serde_json::{Value, json};

pub fn run(ctx: &Context, args: FactsArgs) -> Result<()> {
    let kind = find_kind(&args.kind)?;
    let query = build_query(kind, &args)?;
    let settings = Settings::load(ctx.config.as_deref())?;
    let client = connect(&settings)?;

    let facts = collect(&client, &query)?;

    match args.format {
        OutputFormat::Json => {
            let output = json!({ (kind.output_key()): facts });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => print_facts(kind, &query, &facts),
    }
    Ok(())
}

pub fn build_query(kind: &dyn ResourceKind, args: &FactsArgs) -> Result<FactsQuery> {
    if kind.needs_parent() && args.parent.is_none() {
        bail!("{} lives under a parent resource; pass --parent", kind.name());
    }
    Ok(FactsQuery {
        kind: kind.arm_type().to_string(),
        resource_group: args.resource_group.clone(),
        name: args.name.clone(),
        parent: args.parent.clone(),
        tags: args.tags.iter().map(|raw| TagFilter::parse(raw)).collect(),
    })
}

fn collect<P: Provider + ?Sized>(provider: &P, query: &FactsQuery) -> Result<Facts> {
    Ok(query_facts(provider, query)?)
}

fn print_facts(kind: &dyn ResourceKind, query: &FactsQuery, facts: &Facts) {
    let scope = match &query.parent {
        Some(parent) => format!("{}/{parent}", query.resource_group),
        None => query.resource_group.clone(),
    };

    if facts.is_empty() {
        ui::info(&format!("No {} found in {scope}", kind.name()));
        return;
    }

    ui::header(&format!("{} in {scope} ({})", kind.name(), facts.len()));
    for (name, resource) in facts {
        ui::section(name);
        for (label, value) in summary(resource) {
            ui::kv(label, &value);
        }
    }
}

/// The few fields worth showing per resource in text output.
pub fn summary(resource: &Value) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    let text = |v: &Value| ui::truncate(&ui::value(v), 120);

    if let Some(id) = resource.get("id") {
        lines.push(("id", text(id)));
    }
    if let Some(location) = resource.get("location") {
        lines.push(("location", text(location)));
    }
    if let Some(sku) = resource.pointer("/sku/name") {
        lines.push(("sku", text(sku)));
    }
    if let Some(state) = resource.pointer("/properties/provisioningState") {
        lines.push(("provisioning state", text(state)));
    }
    if let Some(tags) = resource.get("tags").and_then(Value::as_object) {
        if !tags.is_empty() {
            let joined = tags
                .iter()
                .map(|(k, v)| format!("{k}={}", ui::value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(("tags", joined));
        }
    }
    lines
}

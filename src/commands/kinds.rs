//! `azrm kinds`: what can be reconciled or read

use super::find_kind;
use crate::resource::{self, ResourceKind};
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use converge::{FieldKind, FieldSpec};

pub fn run(kind: Option<&str>) -> Result<()> {
    match kind {
        Some(name) => describe(find_kind(name)?),
        None => list(),
    }
    Ok(())
}

fn mode(kind: &dyn ResourceKind) -> &'static str {
    if kind.is_managed() { "managed" } else { "read-only" }
}

fn list() {
    ui::header("Resource kinds");
    for kind in resource::catalog() {
        let label = if kind.is_managed() {
            mode(kind).green()
        } else {
            mode(kind).dimmed()
        };
        println!(
            "  {:<22} {:<45} {}",
            kind.name().bold(),
            kind.arm_type(),
            label
        );
    }
    println!();
    ui::dim("Run `azrm kinds <kind>` for parameters");
}

fn describe(kind: &dyn ResourceKind) {
    ui::header(kind.name());
    println!("  {}", kind.description());
    println!();
    ui::kv("ARM type", kind.arm_type());
    ui::kv("api-version", kind.api_version());
    ui::kv("output key", kind.output_key());
    ui::kv("mode", mode(kind));
    if kind.needs_parent() {
        ui::kv("parent", "required (--parent)");
    }

    let Some(rules) = kind.rules() else {
        return;
    };

    ui::section("Parameters");
    let documented = kind.parameters();
    if documented.is_empty() {
        for field in rules.schema.fields {
            ui::kv(field.name, field.kind.label());
        }
    } else {
        for (name, help) in documented {
            ui::kv(name, help);
        }
    }

    let choices = enum_paths(rules.schema.fields, "");
    if documented.is_empty() && !choices.is_empty() {
        ui::section("Choices");
        for (path, values) in choices {
            ui::kv(&path, &values.join(", "));
        }
    }
}

/// Every enum field below `fields`, as a dotted user path with its tokens.
pub fn enum_paths(fields: &[FieldSpec], prefix: &str) -> Vec<(String, Vec<&'static str>)> {
    let mut out = Vec::new();
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{prefix}.{}", field.name)
        };
        match field.kind {
            FieldKind::Enum(mapping) => out.push((path, mapping.choices().collect())),
            FieldKind::Object(sub) | FieldKind::List(sub) => out.extend(enum_paths(sub, &path)),
            FieldKind::Scalar | FieldKind::Map => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{app_gateway, app_service_plan};

    #[test]
    fn test_gateway_enum_paths() {
        let paths = enum_paths(app_gateway::RULES.schema.fields, "");
        let probe = paths
            .iter()
            .find(|(path, _)| path == "probes.protocol")
            .expect("probe protocol listed");
        assert!(probe.1.contains(&"https"));
        assert!(paths.iter().any(|(path, _)| path == "sku.name"));
    }

    #[test]
    fn test_every_enum_path_resolves() {
        let schema = app_gateway::RULES.schema;
        for (path, choices) in enum_paths(schema.fields, "") {
            let mapping = schema.enum_at(&path).expect("path resolves");
            assert_eq!(mapping.choices().collect::<Vec<_>>(), choices);
        }
    }

    #[test]
    fn test_plan_tier_choice() {
        let paths = enum_paths(app_service_plan::RULES.schema.fields, "");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].0, "sku_tier");
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(mode(resource::find("web_app").unwrap()), "managed");
        assert_eq!(mode(resource::find("route_table").unwrap()), "read-only");
    }
}

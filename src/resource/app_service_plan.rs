//! App Service plans (`Microsoft.Web/serverfarms`)
//!
//! The SKU is given by name (`S1`, `P1V2`, or the aliases `FREE` and
//! `SHARED`); the tier is derived from it. Only the SKU name, worker count
//! and admin site are compared on existing plans. `is_linux` cannot change
//! after creation.

use super::{PrepareContext, ResourceKind, parse_params, put};
use converge::{DiffPolicy, EnumMapping, Error, Fields, FieldSpec, KindRules, Schema};
use serde::Deserialize;

pub const SKU_TIER: EnumMapping = EnumMapping::new(&[
    ("free", "Free"),
    ("shared", "Shared"),
    ("basic", "Basic"),
    ("standard", "Standard"),
    ("premium", "Premium"),
    ("premium_v2", "PremiumV2"),
]);

const FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("location", "location"),
    FieldSpec::map("tags", "tags"),
    FieldSpec::scalar("kind", "kind"),
    FieldSpec::scalar("sku", "sku.name"),
    FieldSpec::enumerated("sku_tier", "sku.tier", SKU_TIER),
    FieldSpec::scalar("number_of_workers", "sku.capacity"),
    FieldSpec::scalar("is_linux", "properties.reserved"),
    FieldSpec::scalar("admin_site_name", "properties.adminSiteName"),
];

pub const RULES: KindRules = KindRules {
    schema: Schema::new(FIELDS),
    diff: DiffPolicy::fields(&["sku.name", "sku.capacity", "properties.adminSiteName"])
        .immutable(&[("properties.reserved", "is_linux")])
        .required_on_create(&[("sku.name", "sku")])
        .with_tags(),
    subresources: &[],
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanParams {
    location: Option<String>,
    sku: Option<String>,
    is_linux: Option<bool>,
    number_of_workers: Option<u32>,
    admin_site_name: Option<String>,
    tags: Option<Fields>,
}

/// Upper-case a SKU name and resolve the `FREE`/`SHARED` aliases.
pub fn normalize_sku(sku: &str) -> String {
    match sku.trim().to_ascii_uppercase().as_str() {
        "FREE" => "F1".to_string(),
        "SHARED" => "D1".to_string(),
        other => other.to_string(),
    }
}

/// Tier token for a normalized SKU name.
pub fn tier_of(sku: &str) -> Option<&'static str> {
    match sku {
        "F1" => Some("free"),
        "D1" => Some("shared"),
        "B1" | "B2" | "B3" => Some("basic"),
        "S1" | "S2" | "S3" => Some("standard"),
        "P1" | "P2" | "P3" => Some("premium"),
        "P1V2" | "P2V2" | "P3V2" => Some("premium_v2"),
        _ => None,
    }
}

#[derive(Debug)]
pub struct AppServicePlan;

impl ResourceKind for AppServicePlan {
    fn name(&self) -> &'static str {
        "app_service_plan"
    }

    fn arm_type(&self) -> &'static str {
        "Microsoft.Web/serverfarms"
    }

    fn api_version(&self) -> &'static str {
        "2016-09-01"
    }

    fn description(&self) -> &'static str {
        "App Service plan (SKU, worker count, Linux or Windows)"
    }

    fn output_key(&self) -> &'static str {
        "azure_appserviceplan"
    }

    fn rules(&self) -> Option<KindRules> {
        Some(RULES)
    }

    fn parameters(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("location", "region; defaults to the resource group's"),
            ("sku", "F1, D1, B1-B3, S1-S3, P1-P3, P1V2-P3V2, FREE or SHARED"),
            ("is_linux", "host Linux apps; fixed at creation"),
            ("number_of_workers", "instance count"),
            ("admin_site_name", "admin site"),
            ("tags", "resource tags"),
        ]
    }

    fn prepare(&self, params: &Fields, _ctx: &PrepareContext<'_>) -> Result<Fields, Error> {
        let params: PlanParams = parse_params(params)?;
        let mut out = Fields::new();

        put(&mut out, "location", params.location);
        put(&mut out, "tags", params.tags);

        if let Some(sku) = params.sku {
            let name = normalize_sku(&sku);
            let Some(tier) = tier_of(&name) else {
                return Err(Error::invalid(
                    "sku",
                    format!("unknown SKU '{sku}', expected F1, D1, B1-B3, S1-S3, P1-P3 or P1V2-P3V2"),
                ));
            };
            put(&mut out, "sku", Some(name));
            put(&mut out, "sku_tier", Some(tier));
        }

        put(&mut out, "number_of_workers", params.number_of_workers);
        put(&mut out, "admin_site_name", params.admin_site_name);

        if let Some(is_linux) = params.is_linux {
            put(&mut out, "is_linux", Some(is_linux));
            put(&mut out, "kind", Some(if is_linux { "linux" } else { "app" }));
        }

        Ok(out)
    }
}

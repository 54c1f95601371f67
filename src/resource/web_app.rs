//! Web apps (`Microsoft.Web/sites`)
//!
//! Windows frameworks, a Linux runtime and a container image are mutually
//! exclusive ways to pick what the site runs. All three end up in
//! `properties.siteConfig`. Container registry credentials become
//! `DOCKER_REGISTRY_SERVER_*` app settings.
//!
//! A site GET leaves most of `siteConfig` and all app settings out; both are
//! read back from `config/web` and `config/appsettings/list`. App settings
//! are compared by name, and settings the request does not mention are kept
//! unless `purge_app_settings` is set.
//!
//! The plan must already exist; it is given by name, by resource id or as
//! `{name, resource_group}`.

use super::{PrepareContext, ResourceKind, Secrets, parse_params, put};
use converge::{
    DiffPolicy, Error, FieldSpec, Fields, KindRules, Literal, Schema, Subresource,
    SubresourceShape,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Web/serverfarms/{name}`
static PLAN_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^/subscriptions/[^/]+/resourceGroups/[^/]+/providers/Microsoft\.Web/serverfarms/[^/]+$",
    )
    .expect("PLAN_ID is a valid regex pattern")
});

const APP_SETTING: &[FieldSpec] = &[
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("value", "value"),
];

const SITE_CONFIG: &[FieldSpec] = &[
    FieldSpec::scalar("net_framework_version", "netFrameworkVersion"),
    FieldSpec::scalar("php_version", "phpVersion"),
    FieldSpec::scalar("python_version", "pythonVersion"),
    FieldSpec::scalar("node_version", "nodeVersion"),
    FieldSpec::scalar("java_version", "javaVersion"),
    FieldSpec::scalar("java_container", "javaContainer"),
    FieldSpec::scalar("java_container_version", "javaContainerVersion"),
    FieldSpec::scalar("linux_fx_version", "linuxFxVersion"),
    FieldSpec::scalar("app_command_line", "appCommandLine"),
    FieldSpec::scalar("scm_type", "scmType"),
    FieldSpec::list("app_settings", "appSettings", APP_SETTING),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("location", "location"),
    FieldSpec::map("tags", "tags"),
    FieldSpec::scalar("server_farm_id", "properties.serverFarmId"),
    FieldSpec::scalar("client_affinity_enabled", "properties.clientAffinityEnabled")
        .with_default(Literal::Bool(true)),
    FieldSpec::scalar("https_only", "properties.httpsOnly"),
    FieldSpec::scalar(
        "skip_custom_domain_verification",
        "properties.skipCustomDomainVerification",
    ),
    FieldSpec::scalar("ttl_in_seconds", "properties.ttlInSeconds"),
    FieldSpec::object("site_config", "properties.siteConfig", SITE_CONFIG),
];

const APP_SETTINGS: &str = "properties.siteConfig.appSettings";

const SUBRESOURCES: &[Subresource] = &[
    Subresource {
        suffix: "config/web",
        list_action: false,
        target: "properties.siteConfig",
        shape: SubresourceShape::Object,
    },
    Subresource {
        suffix: "config/appsettings/list",
        list_action: true,
        target: APP_SETTINGS,
        shape: SubresourceShape::NameValueList,
    },
];

pub const RULES: KindRules = KindRules {
    schema: Schema::new(FIELDS),
    diff: DiffPolicy::fields(&[
        "properties.httpsOnly",
        "properties.clientAffinityEnabled",
        "properties.siteConfig.netFrameworkVersion",
        "properties.siteConfig.phpVersion",
        "properties.siteConfig.pythonVersion",
        "properties.siteConfig.nodeVersion",
        "properties.siteConfig.javaVersion",
        "properties.siteConfig.javaContainer",
        "properties.siteConfig.javaContainerVersion",
        "properties.siteConfig.linuxFxVersion",
        "properties.siteConfig.appCommandLine",
        "properties.siteConfig.scmType",
        APP_SETTINGS,
    ])
    .required_on_create(&[("properties.serverFarmId", "plan")])
    .merging(&[APP_SETTINGS])
    .with_tags(),
    subresources: SUBRESOURCES,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WebAppParams {
    location: Option<String>,
    plan: Option<Value>,
    windows_framework: Option<WindowsFramework>,
    linux_framework: Option<LinuxFramework>,
    container_settings: Option<ContainerSettings>,
    java_container_settings: Option<JavaContainerSettings>,
    scm_type: Option<String>,
    startup_file: Option<String>,
    client_affinity_enabled: Option<bool>,
    https_only: Option<bool>,
    skip_custom_domain_verification: Option<bool>,
    ttl_in_seconds: Option<i64>,
    #[serde(default)]
    app_settings: BTreeMap<String, String>,
    #[serde(default)]
    purge_app_settings: bool,
    tags: Option<Fields>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowsFramework {
    net_framework_version: Option<String>,
    php_version: Option<String>,
    python_version: Option<String>,
    node_version: Option<String>,
    java_version: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LinuxRuntime {
    Ruby,
    Node,
    Php,
    Dotnetcore,
    Java,
}

impl LinuxRuntime {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ruby => "RUBY",
            Self::Node => "NODE",
            Self::Php => "PHP",
            Self::Dotnetcore => "DOTNETCORE",
            Self::Java => "JAVA",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinuxFramework {
    name: LinuxRuntime,
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ContainerSettings {
    name: String,
    registry_server_url: Option<String>,
    registry_server_user: Option<String>,
    registry_server_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JavaContainerSettings {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanSpec {
    name: String,
    resource_group: Option<String>,
}

/// Resolve the `plan` parameter to a server farm id.
fn server_farm_id(plan: &Value, ctx: &PrepareContext<'_>) -> Result<String, Error> {
    let farm_id = |resource_group: &str, name: &str| {
        format!(
            "/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.Web/serverfarms/{name}",
            ctx.subscription_id
        )
    };

    match plan {
        Value::String(id) if id.to_ascii_lowercase().starts_with("/subscriptions/") => {
            if PLAN_ID.is_match(id) {
                Ok(id.clone())
            } else {
                Err(Error::invalid(
                    "plan",
                    format!("'{id}' is not an App Service plan resource id"),
                ))
            }
        }
        Value::String(name) => Ok(farm_id(ctx.resource_group, name)),
        Value::Object(_) => {
            let spec: PlanSpec = serde_json::from_value(plan.clone()).map_err(|e| {
                Error::invalid(
                    "plan",
                    format!("{e} (plans are not created here; create it as an app_service_plan)"),
                )
            })?;
            let resource_group = spec.resource_group.as_deref().unwrap_or(ctx.resource_group);
            Ok(farm_id(resource_group, &spec.name))
        }
        _ => Err(Error::invalid(
            "plan",
            "expected a plan name, resource id or {name, resource_group}",
        )),
    }
}

fn check_exclusive(params: &WebAppParams) -> Result<(), Error> {
    let pairs = [
        (
            "windows_framework",
            params.windows_framework.is_some(),
            "linux_framework",
            params.linux_framework.is_some(),
        ),
        (
            "container_settings",
            params.container_settings.is_some(),
            "linux_framework",
            params.linux_framework.is_some(),
        ),
        (
            "container_settings",
            params.container_settings.is_some(),
            "windows_framework",
            params.windows_framework.is_some(),
        ),
    ];
    for (a, a_set, b, b_set) in pairs {
        if a_set && b_set {
            return Err(Error::invalid(a, format!("mutually exclusive with {b}")));
        }
    }

    if let Some(windows) = &params.windows_framework {
        let others = [
            &windows.net_framework_version,
            &windows.php_version,
            &windows.python_version,
            &windows.node_version,
        ];
        if windows.java_version.is_some() && others.iter().any(|v| v.is_some()) {
            return Err(Error::invalid(
                "windows_framework.java_version",
                "mutually exclusive with other framework versions",
            ));
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct WebApp;

impl ResourceKind for WebApp {
    fn name(&self) -> &'static str {
        "web_app"
    }

    fn arm_type(&self) -> &'static str {
        "Microsoft.Web/sites"
    }

    fn api_version(&self) -> &'static str {
        "2016-08-01"
    }

    fn description(&self) -> &'static str {
        "Web app on an existing App Service plan"
    }

    fn output_key(&self) -> &'static str {
        "azure_webapp"
    }

    fn rules(&self) -> Option<KindRules> {
        Some(RULES)
    }

    fn purge_lists(&self, params: &Fields) -> bool {
        params
            .get("purge_app_settings")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn secrets(&self) -> Secrets {
        Secrets {
            paths: &[],
            names: &["DOCKER_REGISTRY_SERVER_PASSWORD"],
        }
    }

    fn parameters(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("location", "region; defaults to the resource group's"),
            ("plan", "plan name, resource id or {name, resource_group}"),
            (
                "windows_framework",
                "{net_framework_version, php_version, python_version, node_version, java_version}",
            ),
            ("linux_framework", "{name: ruby|node|php|dotnetcore|java, version}"),
            (
                "container_settings",
                "{name, registry_server_url, registry_server_user, registry_server_password}",
            ),
            ("java_container_settings", "{name, version}"),
            ("scm_type", "source control type"),
            ("startup_file", "startup command"),
            ("client_affinity_enabled", "ARR affinity (default true)"),
            ("https_only", "redirect HTTP to HTTPS"),
            ("skip_custom_domain_verification", "skip domain verification"),
            ("ttl_in_seconds", "DNS time to live"),
            ("app_settings", "application settings, compared by name"),
            (
                "purge_app_settings",
                "remove app settings not listed in app_settings (default false)",
            ),
            ("tags", "resource tags"),
        ]
    }

    fn prepare(&self, params: &Fields, ctx: &PrepareContext<'_>) -> Result<Fields, Error> {
        let mut params: WebAppParams = parse_params(params)?;
        check_exclusive(&params)?;

        let mut site_config = Fields::new();

        if let Some(windows) = params.windows_framework.take() {
            put(&mut site_config, "net_framework_version", windows.net_framework_version);
            put(&mut site_config, "php_version", windows.php_version);
            put(&mut site_config, "python_version", windows.python_version);
            put(&mut site_config, "node_version", windows.node_version);
            put(&mut site_config, "java_version", windows.java_version);
        }

        if let Some(linux) = &params.linux_framework {
            let fx = format!("{}|{}", linux.name.as_str(), linux.version).to_uppercase();
            put(&mut site_config, "linux_fx_version", Some(fx));
        }

        if let Some(container) = params.container_settings.take() {
            let image = match &container.registry_server_url {
                Some(registry) => format!("DOCKER|{registry}/{}", container.name),
                None => format!("DOCKER|{}", container.name),
            };
            put(&mut site_config, "linux_fx_version", Some(image));

            let settings = &mut params.app_settings;
            if let Some(registry) = container.registry_server_url {
                settings.insert(
                    "DOCKER_REGISTRY_SERVER_URL".to_string(),
                    format!("https://{registry}"),
                );
            }
            if let Some(user) = container.registry_server_user {
                settings.insert("DOCKER_REGISTRY_SERVER_USERNAME".to_string(), user);
            }
            if let Some(password) = container.registry_server_password {
                settings.insert("DOCKER_REGISTRY_SERVER_PASSWORD".to_string(), password);
            }
        }

        if let Some(java) = params.java_container_settings.take() {
            put(&mut site_config, "java_container", Some(java.name));
            put(&mut site_config, "java_container_version", Some(java.version));
        }

        put(&mut site_config, "scm_type", params.scm_type.take());
        put(&mut site_config, "app_command_line", params.startup_file.take());

        // Purging with no settings still sends the empty list.
        if !params.app_settings.is_empty() || params.purge_app_settings {
            let settings: Vec<Value> = params
                .app_settings
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            put(&mut site_config, "app_settings", Some(settings));
        }

        let mut out = Fields::new();
        put(&mut out, "location", params.location);
        put(&mut out, "tags", params.tags);
        if let Some(plan) = &params.plan {
            put(&mut out, "server_farm_id", Some(server_farm_id(plan, ctx)?));
        }
        put(&mut out, "client_affinity_enabled", params.client_affinity_enabled);
        put(&mut out, "https_only", params.https_only);
        put(
            &mut out,
            "skip_custom_domain_verification",
            params.skip_custom_domain_verification,
        );
        put(&mut out, "ttl_in_seconds", params.ttl_in_seconds);
        if !site_config.is_empty() {
            put(&mut out, "site_config", Some(site_config));
        }

        Ok(out)
    }
}

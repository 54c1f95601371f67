//! Application gateways (`Microsoft.Network/applicationGateways`)
//!
//! Gateway sub-resources use the ARM envelope: `name` (and `id`) at the top
//! of each element, everything else under `properties`. References between
//! sub-resources are `{id}` objects holding full resource ids.
//!
//! Updates compare every leaf the request sets. Location and certificate
//! secrets are never compared; the API does not echo secrets back.

use super::{ResourceKind, Secrets};
use converge::{DiffPolicy, EnumMapping, FieldSpec, KindRules, Schema};

pub const SKU_NAME: EnumMapping = EnumMapping::new(&[
    ("standard_small", "Standard_Small"),
    ("standard_medium", "Standard_Medium"),
    ("standard_large", "Standard_Large"),
    ("waf_medium", "WAF_Medium"),
    ("waf_large", "WAF_Large"),
]);

pub const SKU_TIER: EnumMapping = EnumMapping::new(&[("standard", "Standard"), ("waf", "WAF")]);

pub const SSL_POLICY_TYPE: EnumMapping =
    EnumMapping::new(&[("predefined", "Predefined"), ("custom", "Custom")]);

pub const SSL_POLICY_NAME: EnumMapping = EnumMapping::new(&[
    ("app_gw_ssl_policy20150501", "AppGwSslPolicy20150501"),
    ("app_gw_ssl_policy20170401", "AppGwSslPolicy20170401"),
    ("app_gw_ssl_policy20170401_s", "AppGwSslPolicy20170401S"),
]);

pub const SSL_PROTOCOL: EnumMapping = EnumMapping::new(&[
    ("tl_sv1_0", "TLSv1_0"),
    ("tl_sv1_1", "TLSv1_1"),
    ("tl_sv1_2", "TLSv1_2"),
]);

pub const IP_ALLOCATION: EnumMapping =
    EnumMapping::new(&[("static", "Static"), ("dynamic", "Dynamic")]);

pub const PROTOCOL: EnumMapping = EnumMapping::new(&[("http", "Http"), ("https", "Https")]);

pub const COOKIE_AFFINITY: EnumMapping =
    EnumMapping::new(&[("enabled", "Enabled"), ("disabled", "Disabled")]);

pub const RULE_TYPE: EnumMapping = EnumMapping::new(&[
    ("basic", "Basic"),
    ("path_based_routing", "PathBasedRouting"),
]);

pub const REDIRECT_TYPE: EnumMapping = EnumMapping::new(&[
    ("permanent", "Permanent"),
    ("found", "Found"),
    ("see_other", "SeeOther"),
    ("temporary", "Temporary"),
]);

pub const FIREWALL_MODE: EnumMapping =
    EnumMapping::new(&[("detection", "Detection"), ("prevention", "Prevention")]);

/// Every enum table of the kind, by user path.
pub const ENUMS: &[(&str, EnumMapping)] = &[
    ("sku.name", SKU_NAME),
    ("sku.tier", SKU_TIER),
    ("ssl_policy.policy_type", SSL_POLICY_TYPE),
    ("ssl_policy.policy_name", SSL_POLICY_NAME),
    ("ssl_policy.min_protocol_version", SSL_PROTOCOL),
    ("ssl_policy.disabled_ssl_protocols", SSL_PROTOCOL),
    ("frontend_ip_configurations.private_ip_allocation_method", IP_ALLOCATION),
    ("probes.protocol", PROTOCOL),
    ("backend_http_settings_collection.protocol", PROTOCOL),
    ("backend_http_settings_collection.cookie_based_affinity", COOKIE_AFFINITY),
    ("http_listeners.protocol", PROTOCOL),
    ("request_routing_rules.rule_type", RULE_TYPE),
    ("redirect_configurations.redirect_type", REDIRECT_TYPE),
    ("web_application_firewall_configuration.firewall_mode", FIREWALL_MODE),
];

const ID_REF: &[FieldSpec] = &[FieldSpec::scalar("id", "id")];

const SKU: &[FieldSpec] = &[
    FieldSpec::enumerated("name", "name", SKU_NAME),
    FieldSpec::enumerated("tier", "tier", SKU_TIER),
    FieldSpec::scalar("capacity", "capacity"),
];

const SSL_POLICY: &[FieldSpec] = &[
    FieldSpec::enumerated("disabled_ssl_protocols", "disabledSslProtocols", SSL_PROTOCOL),
    FieldSpec::enumerated("policy_type", "policyType", SSL_POLICY_TYPE),
    FieldSpec::enumerated("policy_name", "policyName", SSL_POLICY_NAME),
    FieldSpec::scalar("cipher_suites", "cipherSuites"),
    FieldSpec::enumerated("min_protocol_version", "minProtocolVersion", SSL_PROTOCOL),
];

const GATEWAY_IP_CONFIGURATION: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::object("subnet", "properties.subnet", ID_REF),
];

const AUTHENTICATION_CERTIFICATE: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("data", "properties.data"),
];

const SSL_CERTIFICATE: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("data", "properties.data"),
    FieldSpec::scalar("password", "properties.password"),
    FieldSpec::scalar("public_cert_data", "properties.publicCertData"),
];

const FRONTEND_IP_CONFIGURATION: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("private_ip_address", "properties.privateIPAddress"),
    FieldSpec::enumerated(
        "private_ip_allocation_method",
        "properties.privateIPAllocationMethod",
        IP_ALLOCATION,
    ),
    FieldSpec::object("subnet", "properties.subnet", ID_REF),
    FieldSpec::object("public_ip_address", "properties.publicIPAddress", ID_REF),
];

const FRONTEND_PORT: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("port", "properties.port"),
];

const PROBE_MATCH: &[FieldSpec] = &[
    FieldSpec::scalar("body", "body"),
    FieldSpec::scalar("status_codes", "statusCodes"),
];

const PROBE: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::enumerated("protocol", "properties.protocol", PROTOCOL),
    FieldSpec::scalar("host", "properties.host"),
    FieldSpec::scalar("path", "properties.path"),
    FieldSpec::scalar("interval", "properties.interval"),
    FieldSpec::scalar("timeout", "properties.timeout"),
    FieldSpec::scalar("unhealthy_threshold", "properties.unhealthyThreshold"),
    FieldSpec::scalar(
        "pick_host_name_from_backend_http_settings",
        "properties.pickHostNameFromBackendHttpSettings",
    ),
    FieldSpec::scalar("min_servers", "properties.minServers"),
    FieldSpec::object("match", "properties.match", PROBE_MATCH),
];

const BACKEND_ADDRESS: &[FieldSpec] = &[
    FieldSpec::scalar("fqdn", "fqdn"),
    FieldSpec::scalar("ip_address", "ipAddress"),
];

const BACKEND_ADDRESS_POOL: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::list(
        "backend_addresses",
        "properties.backendAddresses",
        BACKEND_ADDRESS,
    ),
];

const CONNECTION_DRAINING: &[FieldSpec] = &[
    FieldSpec::scalar("enabled", "enabled"),
    FieldSpec::scalar("drain_timeout_in_sec", "drainTimeoutInSec"),
];

const BACKEND_HTTP_SETTINGS: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("port", "properties.port"),
    FieldSpec::enumerated("protocol", "properties.protocol", PROTOCOL),
    FieldSpec::enumerated(
        "cookie_based_affinity",
        "properties.cookieBasedAffinity",
        COOKIE_AFFINITY,
    ),
    FieldSpec::scalar("request_timeout", "properties.requestTimeout"),
    FieldSpec::object("probe", "properties.probe", ID_REF),
    FieldSpec::list(
        "authentication_certificates",
        "properties.authenticationCertificates",
        ID_REF,
    ),
    FieldSpec::object(
        "connection_draining",
        "properties.connectionDraining",
        CONNECTION_DRAINING,
    ),
    FieldSpec::scalar("host_name", "properties.hostName"),
    FieldSpec::scalar(
        "pick_host_name_from_backend_address",
        "properties.pickHostNameFromBackendAddress",
    ),
    FieldSpec::scalar("affinity_cookie_name", "properties.affinityCookieName"),
    FieldSpec::scalar("probe_enabled", "properties.probeEnabled"),
    FieldSpec::scalar("path", "properties.path"),
];

const HTTP_LISTENER: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::object(
        "frontend_ip_configuration",
        "properties.frontendIPConfiguration",
        ID_REF,
    ),
    FieldSpec::object("frontend_port", "properties.frontendPort", ID_REF),
    FieldSpec::enumerated("protocol", "properties.protocol", PROTOCOL),
    FieldSpec::scalar("host_name", "properties.hostName"),
    FieldSpec::object("ssl_certificate", "properties.sslCertificate", ID_REF),
    FieldSpec::scalar(
        "require_server_name_indication",
        "properties.requireServerNameIndication",
    ),
];

const PATH_RULE: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::scalar("paths", "properties.paths"),
    FieldSpec::object(
        "backend_address_pool",
        "properties.backendAddressPool",
        ID_REF,
    ),
    FieldSpec::object(
        "backend_http_settings",
        "properties.backendHttpSettings",
        ID_REF,
    ),
    FieldSpec::object(
        "redirect_configuration",
        "properties.redirectConfiguration",
        ID_REF,
    ),
];

const URL_PATH_MAP: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::object(
        "default_backend_address_pool",
        "properties.defaultBackendAddressPool",
        ID_REF,
    ),
    FieldSpec::object(
        "default_backend_http_settings",
        "properties.defaultBackendHttpSettings",
        ID_REF,
    ),
    FieldSpec::object(
        "default_redirect_configuration",
        "properties.defaultRedirectConfiguration",
        ID_REF,
    ),
    FieldSpec::list("path_rules", "properties.pathRules", PATH_RULE),
];

const REQUEST_ROUTING_RULE: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::enumerated("rule_type", "properties.ruleType", RULE_TYPE),
    FieldSpec::object(
        "backend_address_pool",
        "properties.backendAddressPool",
        ID_REF,
    ),
    FieldSpec::object(
        "backend_http_settings",
        "properties.backendHttpSettings",
        ID_REF,
    ),
    FieldSpec::object("http_listener", "properties.httpListener", ID_REF),
    FieldSpec::object("url_path_map", "properties.urlPathMap", ID_REF),
    FieldSpec::object(
        "redirect_configuration",
        "properties.redirectConfiguration",
        ID_REF,
    ),
];

const REDIRECT_CONFIGURATION: &[FieldSpec] = &[
    FieldSpec::scalar("id", "id"),
    FieldSpec::scalar("name", "name"),
    FieldSpec::enumerated("redirect_type", "properties.redirectType", REDIRECT_TYPE),
    FieldSpec::object("target_listener", "properties.targetListener", ID_REF),
    FieldSpec::scalar("target_url", "properties.targetUrl"),
    FieldSpec::scalar("include_path", "properties.includePath"),
    FieldSpec::scalar("include_query_string", "properties.includeQueryString"),
    FieldSpec::list(
        "request_routing_rules",
        "properties.requestRoutingRules",
        ID_REF,
    ),
    FieldSpec::list("url_path_maps", "properties.urlPathMaps", ID_REF),
    FieldSpec::list("path_rules", "properties.pathRules", ID_REF),
];

const DISABLED_RULE_GROUP: &[FieldSpec] = &[
    FieldSpec::scalar("rule_group_name", "ruleGroupName"),
    FieldSpec::scalar("rules", "rules"),
];

const FIREWALL: &[FieldSpec] = &[
    FieldSpec::scalar("enabled", "enabled"),
    FieldSpec::enumerated("firewall_mode", "firewallMode", FIREWALL_MODE),
    FieldSpec::scalar("rule_set_type", "ruleSetType"),
    FieldSpec::scalar("rule_set_version", "ruleSetVersion"),
    FieldSpec::list(
        "disabled_rule_groups",
        "disabledRuleGroups",
        DISABLED_RULE_GROUP,
    ),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("location", "location"),
    FieldSpec::object("sku", "properties.sku", SKU),
    FieldSpec::object("ssl_policy", "properties.sslPolicy", SSL_POLICY),
    FieldSpec::list(
        "gateway_ip_configurations",
        "properties.gatewayIPConfigurations",
        GATEWAY_IP_CONFIGURATION,
    ),
    FieldSpec::list(
        "authentication_certificates",
        "properties.authenticationCertificates",
        AUTHENTICATION_CERTIFICATE,
    ),
    FieldSpec::list(
        "ssl_certificates",
        "properties.sslCertificates",
        SSL_CERTIFICATE,
    ),
    FieldSpec::list(
        "frontend_ip_configurations",
        "properties.frontendIPConfigurations",
        FRONTEND_IP_CONFIGURATION,
    ),
    FieldSpec::list("frontend_ports", "properties.frontendPorts", FRONTEND_PORT),
    FieldSpec::list("probes", "properties.probes", PROBE),
    FieldSpec::list(
        "backend_address_pools",
        "properties.backendAddressPools",
        BACKEND_ADDRESS_POOL,
    ),
    FieldSpec::list(
        "backend_http_settings_collection",
        "properties.backendHttpSettingsCollection",
        BACKEND_HTTP_SETTINGS,
    ),
    FieldSpec::list("http_listeners", "properties.httpListeners", HTTP_LISTENER),
    FieldSpec::list("url_path_maps", "properties.urlPathMaps", URL_PATH_MAP),
    FieldSpec::list(
        "request_routing_rules",
        "properties.requestRoutingRules",
        REQUEST_ROUTING_RULE,
    ),
    FieldSpec::list(
        "redirect_configurations",
        "properties.redirectConfigurations",
        REDIRECT_CONFIGURATION,
    ),
    FieldSpec::object(
        "web_application_firewall_configuration",
        "properties.webApplicationFirewallConfiguration",
        FIREWALL,
    ),
    FieldSpec::scalar("enable_http2", "properties.enableHttp2"),
];

const CERTIFICATE_DATA: &str = "properties.sslCertificates.properties.data";
const CERTIFICATE_PASSWORD: &str = "properties.sslCertificates.properties.password";

pub const RULES: KindRules = KindRules {
    schema: Schema::new(FIELDS),
    diff: DiffPolicy::subset().ignoring(&["location", CERTIFICATE_DATA, CERTIFICATE_PASSWORD]),
    subresources: &[],
};

#[derive(Debug)]
pub struct ApplicationGateway;

impl ResourceKind for ApplicationGateway {
    fn name(&self) -> &'static str {
        "application_gateway"
    }

    fn arm_type(&self) -> &'static str {
        "Microsoft.Network/applicationGateways"
    }

    fn api_version(&self) -> &'static str {
        "2018-04-01"
    }

    fn description(&self) -> &'static str {
        "Application gateway (layer 7 load balancer, optional WAF)"
    }

    fn output_key(&self) -> &'static str {
        "azure_appgw"
    }

    fn rules(&self) -> Option<KindRules> {
        Some(RULES)
    }

    fn secrets(&self) -> Secrets {
        Secrets {
            paths: &[CERTIFICATE_DATA, CERTIFICATE_PASSWORD],
            names: &[],
        }
    }
}

//! Field Translator
//!
//! A [`Schema`] is a declarative table describing how a flat, user-facing
//! parameter map becomes the provider's request payload. Each
//! [`FieldSpec`] names the user key, the dotted provider path it lands at,
//! how its value is converted, and an optional default.
//!
//! Translation is pure and permissive: unknown keys and unmapped enum
//! tokens pass through. Rejecting bad input is the job of
//! [`Schema::validate`], which runs at the boundary before translation.

use crate::error::{Error, Result};
use crate::types::{Fields, ProviderRequest};
use crate::value::{camel_case, set_path};
use serde_json::Value;

/// Static rename table for one enumerated field.
///
/// Entries are `(user token, provider token)`. User tokens are lower
/// snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMapping {
    pub entries: &'static [(&'static str, &'static str)],
}

impl EnumMapping {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    /// Provider token for a user token, if the table has one.
    pub fn lookup(&self, user: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(u, _)| *u == user)
            .map(|(_, p)| *p)
    }

    /// Translate a user token; unmapped tokens pass through verbatim.
    pub fn to_provider(&self, user: &str) -> String {
        self.lookup(user).unwrap_or(user).to_string()
    }

    /// Reverse lookup, case-insensitive on the provider side.
    pub fn to_user(&self, provider: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, p)| p.eq_ignore_ascii_case(provider))
            .map(|(u, _)| *u)
    }

    /// The accepted user tokens, in table order.
    pub fn choices(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(u, _)| *u)
    }

    /// Every user token maps to a distinct provider token and back.
    pub fn is_bijective(&self) -> bool {
        self.entries.iter().all(|(user, provider)| {
            self.lookup(user) == Some(*provider) && self.to_user(provider) == Some(*user)
        })
    }
}

/// Literal default values usable in `const` tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl Literal {
    pub fn to_value(self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::from(i),
            Literal::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// How a field's value is converted.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Copied verbatim (strings, numbers, bools, lists of strings)
    Scalar,
    /// String, or list of strings, renamed through a table
    Enum(EnumMapping),
    /// Nested object translated with its own fields
    Object(&'static [FieldSpec]),
    /// List of objects, each translated with the given fields
    List(&'static [FieldSpec]),
    /// Free-form string map copied with keys untouched (tags, settings)
    Map,
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Scalar => "value",
            FieldKind::Enum(_) => "choice",
            FieldKind::Object(_) => "object",
            FieldKind::List(_) => "list",
            FieldKind::Map => "map",
        }
    }
}

/// One user-facing field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Dotted provider path, relative to the enclosing object
    pub target: &'static str,
    pub kind: FieldKind,
    pub default: Option<Literal>,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str, target: &'static str) -> Self {
        Self {
            name,
            target,
            kind: FieldKind::Scalar,
            default: None,
        }
    }

    pub const fn enumerated(
        name: &'static str,
        target: &'static str,
        mapping: EnumMapping,
    ) -> Self {
        Self {
            name,
            target,
            kind: FieldKind::Enum(mapping),
            default: None,
        }
    }

    pub const fn object(
        name: &'static str,
        target: &'static str,
        fields: &'static [FieldSpec],
    ) -> Self {
        Self {
            name,
            target,
            kind: FieldKind::Object(fields),
            default: None,
        }
    }

    pub const fn list(
        name: &'static str,
        target: &'static str,
        fields: &'static [FieldSpec],
    ) -> Self {
        Self {
            name,
            target,
            kind: FieldKind::List(fields),
            default: None,
        }
    }

    pub const fn map(name: &'static str, target: &'static str) -> Self {
        Self {
            name,
            target,
            kind: FieldKind::Map,
            default: None,
        }
    }

    /// Fill this value when the parameter is missing or null.
    pub const fn with_default(self, default: Literal) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

/// The field table of one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Find a top-level field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Enum table for a user path such as `ssl_policy.policy_type`.
    pub fn enum_at(&self, path: &str) -> Option<EnumMapping> {
        let mut fields = self.fields;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let field = fields.iter().find(|f| f.name == segment)?;
            let last = segments.peek().is_none();
            match (field.kind, last) {
                (FieldKind::Enum(mapping), true) => return Some(mapping),
                (FieldKind::Object(sub) | FieldKind::List(sub), false) => fields = sub,
                _ => return None,
            }
        }
        None
    }

    /// Convert desired parameters into a provider request.
    pub fn translate(&self, params: &Fields) -> ProviderRequest {
        ProviderRequest::new(translate_object(self.fields, params))
    }

    /// Reject unknown keys, unknown enum tokens and shape mismatches.
    pub fn validate(&self, params: &Fields) -> Result<()> {
        validate_object(self.fields, params, "")
    }
}

fn translate_object(spec: &[FieldSpec], params: &Fields) -> Fields {
    let mut out = Fields::new();

    for (key, value) in params {
        if value.is_null() {
            continue;
        }
        match spec.iter().find(|f| f.name == key) {
            Some(field) => set_path(&mut out, field.target, translate_value(field, value)),
            None => {
                out.insert(camel_case(key), value.clone());
            }
        }
    }

    for field in spec {
        let Some(default) = field.default else {
            continue;
        };
        if params.get(field.name).is_none_or(Value::is_null) {
            set_path(&mut out, field.target, default.to_value());
        }
    }

    out
}

fn translate_value(field: &FieldSpec, value: &Value) -> Value {
    match (field.kind, value) {
        (FieldKind::Enum(mapping), Value::String(token)) => {
            Value::String(mapping.to_provider(token))
        }
        (FieldKind::Enum(mapping), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(token) => Value::String(mapping.to_provider(token)),
                    other => other.clone(),
                })
                .collect(),
        ),
        (FieldKind::Object(sub), Value::Object(map)) => Value::Object(translate_object(sub, map)),
        (FieldKind::List(sub), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(translate_object(sub, map)),
                    other => other.clone(),
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(spec: &[FieldSpec], params: &Fields, prefix: &str) -> Result<()> {
    for (key, value) in params {
        let path = join(prefix, key);
        if value.is_null() {
            continue;
        }
        let Some(field) = spec.iter().find(|f| f.name == key) else {
            return Err(Error::invalid(path, "unsupported parameter"));
        };
        validate_value(field, value, &path)?;
    }
    Ok(())
}

fn validate_value(field: &FieldSpec, value: &Value, path: &str) -> Result<()> {
    match field.kind {
        FieldKind::Scalar => Ok(()),
        FieldKind::Enum(mapping) => match value {
            Value::String(token) => validate_token(mapping, token, path),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(token) => validate_token(mapping, token, path)?,
                        _ => return Err(Error::invalid(path, "expected a list of strings")),
                    }
                }
                Ok(())
            }
            _ => Err(Error::invalid(path, "expected a string")),
        },
        FieldKind::Object(sub) => match value {
            Value::Object(map) => validate_object(sub, map, path),
            _ => Err(Error::invalid(path, "expected an object")),
        },
        FieldKind::List(sub) => match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    match item {
                        Value::Object(map) => validate_object(sub, map, &item_path)?,
                        _ => return Err(Error::invalid(item_path, "expected an object")),
                    }
                }
                Ok(())
            }
            _ => Err(Error::invalid(path, "expected a list")),
        },
        FieldKind::Map => match value {
            Value::Object(_) => Ok(()),
            _ => Err(Error::invalid(path, "expected a map")),
        },
    }
}

fn validate_token(mapping: EnumMapping, token: &str, path: &str) -> Result<()> {
    if mapping.lookup(token).is_some() {
        return Ok(());
    }
    let choices: Vec<_> = mapping.choices().collect();
    Err(Error::invalid(
        path,
        format!("unknown value '{token}', expected one of: {}", choices.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROTOCOL: EnumMapping = EnumMapping::new(&[("http", "Http"), ("https", "Https")]);
    const TLS: EnumMapping = EnumMapping::new(&[("tl_sv1_0", "TLSv1_0"), ("tl_sv1_2", "TLSv1_2")]);

    const ID_REF: &[FieldSpec] = &[FieldSpec::scalar("id", "id")];

    const PROBE: &[FieldSpec] = &[
        FieldSpec::scalar("name", "name"),
        FieldSpec::enumerated("protocol", "properties.protocol", PROTOCOL),
        FieldSpec::scalar("path", "properties.path"),
        FieldSpec::scalar("interval", "properties.interval").with_default(Literal::Int(30)),
    ];

    const POLICY: &[FieldSpec] = &[FieldSpec::enumerated(
        "disabled_ssl_protocols",
        "disabledSslProtocols",
        TLS,
    )];

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::scalar("location", "location"),
        FieldSpec::map("tags", "tags"),
        FieldSpec::object("ssl_policy", "properties.sslPolicy", POLICY),
        FieldSpec::list("probes", "properties.probes", PROBE),
        FieldSpec::object("subnet", "properties.subnet", ID_REF),
        FieldSpec::scalar("enabled", "properties.enabled").with_default(Literal::Bool(true)),
    ];

    const SCHEMA: Schema = Schema::new(FIELDS);

    fn obj(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_translate_nested_targets_and_enums() {
        let params = obj(json!({
            "location": "eastus",
            "tags": {"cost_center": "a"},
            "ssl_policy": {"disabled_ssl_protocols": ["tl_sv1_0"]},
            "probes": [{"name": "p1", "protocol": "https", "path": "/health"}],
            "subnet": {"id": "/sub/1"}
        }));

        let request = SCHEMA.translate(&params).into_value();

        assert_eq!(
            request,
            json!({
                "location": "eastus",
                "tags": {"cost_center": "a"},
                "properties": {
                    "enabled": true,
                    "sslPolicy": {"disabledSslProtocols": ["TLSv1_0"]},
                    "probes": [{
                        "name": "p1",
                        "properties": {"protocol": "Https", "path": "/health", "interval": 30}
                    }],
                    "subnet": {"id": "/sub/1"}
                }
            })
        );
    }

    #[test]
    fn test_translate_passes_unknown_through() {
        let params = obj(json!({
            "probes": [{"name": "p1", "protocol": "ftp"}],
            "enable_http2": true,
            "enabled": null
        }));

        let request = SCHEMA.translate(&params).into_value();

        assert_eq!(request["properties"]["probes"][0]["properties"]["protocol"], "ftp");
        assert_eq!(request["enableHttp2"], true);
        // null is treated as missing, so the default applies
        assert_eq!(request["properties"]["enabled"], true);
    }

    #[test]
    fn test_translate_is_deterministic() {
        let params = obj(json!({"location": "westus", "probes": [{"name": "a"}]}));
        assert_eq!(SCHEMA.translate(&params), SCHEMA.translate(&params));
    }

    #[test]
    fn test_validate_accepts_known_input() {
        let params = obj(json!({
            "ssl_policy": {"disabled_ssl_protocols": ["tl_sv1_0", "tl_sv1_2"]},
            "probes": [{"name": "p1", "protocol": "http"}]
        }));
        assert!(SCHEMA.validate(&params).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_key() {
        let params = obj(json!({"probes": [{"name": "p1", "colour": "red"}]}));
        let err = SCHEMA.validate(&params).unwrap_err();
        assert!(err.to_string().contains("probes[0].colour"));
    }

    #[test]
    fn test_validate_rejects_unknown_token() {
        let params = obj(json!({"probes": [{"protocol": "ftp"}]}));
        let err = SCHEMA.validate(&params).unwrap_err();
        assert!(err.to_string().contains("expected one of: http, https"));
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let params = obj(json!({"probes": {"name": "p1"}}));
        assert!(SCHEMA.validate(&params).is_err());

        let params = obj(json!({"tags": "env=dev"}));
        assert!(SCHEMA.validate(&params).is_err());
    }

    #[test]
    fn test_enum_mapping_reverse_lookup() {
        assert_eq!(PROTOCOL.to_user("HTTPS"), Some("https"));
        assert_eq!(PROTOCOL.to_user("Ftp"), None);
        assert_eq!(PROTOCOL.to_provider("tcp"), "tcp");
        assert!(PROTOCOL.is_bijective());
        assert!(!EnumMapping::new(&[("a", "X"), ("b", "X")]).is_bijective());
    }

    #[test]
    fn test_enum_at() {
        assert_eq!(SCHEMA.enum_at("probes.protocol"), Some(PROTOCOL));
        assert_eq!(SCHEMA.enum_at("ssl_policy.disabled_ssl_protocols"), Some(TLS));
        assert_eq!(SCHEMA.enum_at("location"), None);
        assert_eq!(SCHEMA.enum_at("probes"), None);
    }
}

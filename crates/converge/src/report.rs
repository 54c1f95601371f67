//! Result Reporter

use crate::error::Error;
use crate::types::ReconcileResult;
use serde::Serialize;
use serde_json::{Map, Value, json};

impl ReconcileResult {
    /// Output payload with the state under `output_key`.
    ///
    /// `{"changed": .., "action": .., "<output_key>": state | null}`, plus
    /// `drift` when something differed and `check_mode` on dry runs.
    pub fn to_output(&self, output_key: &str) -> Value {
        let mut out = Map::new();
        out.insert("changed".to_string(), Value::Bool(self.changed));
        out.insert("action".to_string(), Value::String(self.action.to_string()));
        out.insert(output_key.to_string(), self.state.to_value());
        if !self.drift.is_empty() {
            out.insert(
                "drift".to_string(),
                Value::Array(
                    self.drift
                        .iter()
                        .map(|d| json!({"path": d.path, "observed": d.observed, "desired": d.desired}))
                        .collect(),
                ),
            );
        }
        if self.dry_run {
            out.insert("check_mode".to_string(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

/// Failure payload for a reconciliation that aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub failed: bool,
    pub kind: &'static str,
    pub msg: String,
}

impl Failure {
    pub fn from_error(error: &Error) -> Self {
        Self {
            failed: true,
            kind: error.category().as_str(),
            msg: error.to_string(),
        }
    }

    pub fn to_output(&self) -> Value {
        json!({"failed": self.failed, "kind": self.kind, "msg": self.msg})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Drift, ObservedState};

    #[test]
    fn test_output_shape() {
        let result = ReconcileResult {
            changed: true,
            action: Action::Update,
            state: ObservedState::from_value(json!({"name": "plan1"})),
            drift: vec![Drift {
                path: "sku.name".to_string(),
                observed: json!("S1"),
                desired: json!("S2"),
            }],
            dry_run: false,
        };

        assert_eq!(
            result.to_output("azure_appserviceplan"),
            json!({
                "changed": true,
                "action": "update",
                "azure_appserviceplan": {"name": "plan1"},
                "drift": [{"path": "sku.name", "observed": "S1", "desired": "S2"}]
            })
        );
    }

    #[test]
    fn test_absent_state_is_null() {
        let result = ReconcileResult {
            changed: false,
            action: Action::NoAction,
            state: ObservedState::Absent,
            drift: Vec::new(),
            dry_run: true,
        };
        assert_eq!(
            result.to_output("azure_appgw"),
            json!({"changed": false, "action": "no_action", "azure_appgw": null, "check_mode": true})
        );
    }

    #[test]
    fn test_failure_payload() {
        let err = Error::precondition("rg1/plan1", "cannot change 'is_linux'");
        let failure = Failure::from_error(&err);
        assert_eq!(
            failure.to_output(),
            json!({
                "failed": true,
                "kind": "precondition_violation",
                "msg": "rg1/plan1: cannot change 'is_linux'"
            })
        );
    }
}

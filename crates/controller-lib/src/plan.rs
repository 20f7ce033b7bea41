//! Corrective actions, plans, and the action schema
//!
//! The wire schema is an object with a single `actions` array whose
//! elements are exactly one of:
//!
//! ```text
//! {"type": "cooling",      "cluster": string, "kw": number >= 0}
//! {"type": "battery",      "cluster": string, "kw": number >= 0}
//! {"type": "redistribute", "from": string, "to": string, "kw": number >= 0}
//! ```
//!
//! No additional fields are permitted at either level.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

const COOLING_FIELDS: &[&str] = &["type", "cluster", "kw"];
const BATTERY_FIELDS: &[&str] = &["type", "cluster", "kw"];
const REDISTRIBUTE_FIELDS: &[&str] = &["type", "from", "to", "kw"];

/// Reason a plan was rejected by the action schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("plan is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("plan must be a JSON object")]
    NotAnObject,
    #[error("plan is missing the `actions` array")]
    MissingActions,
    #[error("unexpected top-level field `{0}`")]
    UnexpectedPlanField(String),
    #[error("action {index} is not an object")]
    ActionNotAnObject { index: usize },
    #[error("action {index} has unknown type `{kind}`")]
    UnknownType { index: usize, kind: String },
    #[error("action {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("action {index} has unexpected field `{field}`")]
    UnexpectedField { index: usize, field: String },
    #[error("action {index} field `{field}` must be a string")]
    NotAString { index: usize, field: &'static str },
    #[error("action {index} field `kw` must be a number")]
    NotANumber { index: usize },
    #[error("action {index} has invalid kw {kw} (must be finite and >= 0)")]
    InvalidKw { index: usize, kw: f64 },
}

/// A single corrective action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Request additional active cooling on a cluster
    Cooling { cluster: String, kw: f64 },
    /// Request battery discharge on a cluster
    Battery { cluster: String, kw: f64 },
    /// Request a workload transfer between two clusters
    Redistribute { from: String, to: String, kw: f64 },
    /// An action kind the executor does not recognize
    ///
    /// Never accepted by the schema; only reachable when a caller builds a
    /// plan by hand and hands it straight to the executor.
    Unknown { kind: String, raw: Value },
}

impl Action {
    pub fn cooling(cluster: impl Into<String>, kw: f64) -> Self {
        Action::Cooling {
            cluster: cluster.into(),
            kw,
        }
    }

    pub fn battery(cluster: impl Into<String>, kw: f64) -> Self {
        Action::Battery {
            cluster: cluster.into(),
            kw,
        }
    }

    pub fn redistribute(from: impl Into<String>, to: impl Into<String>, kw: f64) -> Self {
        Action::Redistribute {
            from: from.into(),
            to: to.into(),
            kw,
        }
    }

    /// Schema `type` tag of this action
    pub fn kind(&self) -> &str {
        match self {
            Action::Cooling { .. } => "cooling",
            Action::Battery { .. } => "battery",
            Action::Redistribute { .. } => "redistribute",
            Action::Unknown { kind, .. } => kind,
        }
    }

    /// Requested magnitude, if the action carries one
    pub fn kw(&self) -> Option<f64> {
        match self {
            Action::Cooling { kw, .. } | Action::Battery { kw, .. } => Some(*kw),
            Action::Redistribute { kw, .. } => Some(*kw),
            Action::Unknown { .. } => None,
        }
    }

    /// Clusters this action touches
    pub fn clusters(&self) -> Vec<&str> {
        match self {
            Action::Cooling { cluster, .. } | Action::Battery { cluster, .. } => vec![cluster.as_str()],
            Action::Redistribute { from, to, .. } => vec![from.as_str(), to.as_str()],
            Action::Unknown { .. } => Vec::new(),
        }
    }

    /// Render the action in its wire form
    pub fn to_value(&self) -> Value {
        match self {
            Action::Cooling { cluster, kw } => {
                json!({"type": "cooling", "cluster": cluster, "kw": kw})
            }
            Action::Battery { cluster, kw } => {
                json!({"type": "battery", "cluster": cluster, "kw": kw})
            }
            Action::Redistribute { from, to, kw } => {
                json!({"type": "redistribute", "from": from, "to": to, "kw": kw})
            }
            Action::Unknown { raw, .. } => raw.clone(),
        }
    }

    /// Parse one schema element; `index` is its position in the plan
    pub fn from_value(index: usize, value: &Value) -> Result<Self, SchemaViolation> {
        let obj = value
            .as_object()
            .ok_or(SchemaViolation::ActionNotAnObject { index })?;

        let kind = match obj.get("type") {
            None => return Err(SchemaViolation::MissingField { index, field: "type" }),
            Some(v) => v
                .as_str()
                .ok_or(SchemaViolation::NotAString { index, field: "type" })?,
        };

        let allowed = match kind {
            "cooling" => COOLING_FIELDS,
            "battery" => BATTERY_FIELDS,
            "redistribute" => REDISTRIBUTE_FIELDS,
            other => {
                return Err(SchemaViolation::UnknownType {
                    index,
                    kind: other.to_string(),
                })
            }
        };

        if let Some(extra) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(SchemaViolation::UnexpectedField {
                index,
                field: extra.clone(),
            });
        }

        let kw = kw_field(obj, index)?;
        let action = match kind {
            "cooling" => Action::Cooling {
                cluster: string_field(obj, index, "cluster")?,
                kw,
            },
            "battery" => Action::Battery {
                cluster: string_field(obj, index, "cluster")?,
                kw,
            },
            _ => Action::Redistribute {
                from: string_field(obj, index, "from")?,
                to: string_field(obj, index, "to")?,
                kw,
            },
        };
        Ok(action)
    }
}

fn string_field(
    obj: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, SchemaViolation> {
    match obj.get(field) {
        None => Err(SchemaViolation::MissingField { index, field }),
        Some(v) => v
            .as_str()
            .map(str::to_string)
            .ok_or(SchemaViolation::NotAString { index, field }),
    }
}

fn kw_field(obj: &Map<String, Value>, index: usize) -> Result<f64, SchemaViolation> {
    let kw = obj
        .get("kw")
        .ok_or(SchemaViolation::MissingField { index, field: "kw" })?
        .as_f64()
        .ok_or(SchemaViolation::NotANumber { index })?;
    check_kw(index, kw)
}

fn check_kw(index: usize, kw: f64) -> Result<f64, SchemaViolation> {
    if !kw.is_finite() || kw < 0.0 {
        return Err(SchemaViolation::InvalidKw { index, kw });
    }
    Ok(kw)
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Action::from_value(0, &value).map_err(de::Error::custom)
    }
}

/// Ordered sequence of corrective actions for one loop iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Render the plan in its wire form
    pub fn to_value(&self) -> Value {
        json!({ "actions": self.actions.iter().map(Action::to_value).collect::<Vec<_>>() })
    }

    /// Parse and schema-check a plan from raw JSON text
    pub fn from_json(text: &str) -> Result<Self, SchemaViolation> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SchemaViolation::MalformedJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Schema-check a plan given as a JSON value
    pub fn from_value(value: &Value) -> Result<Self, SchemaViolation> {
        let obj = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

        if let Some(extra) = obj.keys().find(|k| k.as_str() != "actions") {
            return Err(SchemaViolation::UnexpectedPlanField(extra.clone()));
        }

        let items = obj
            .get("actions")
            .and_then(Value::as_array)
            .ok_or(SchemaViolation::MissingActions)?;

        let actions = items
            .iter()
            .enumerate()
            .map(|(i, item)| Action::from_value(i, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { actions })
    }

    /// Check an already-typed plan against the schema
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        for (index, action) in self.actions.iter().enumerate() {
            match action {
                Action::Unknown { kind, .. } => {
                    return Err(SchemaViolation::UnknownType {
                        index,
                        kind: kind.clone(),
                    })
                }
                other => {
                    if let Some(kw) = other.kw() {
                        check_kw(index, kw)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Cluster names referenced by the plan that are not in `clusters`
    pub fn unknown_clusters(&self, clusters: &[String]) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .actions
            .iter()
            .flat_map(Action::clusters)
            .filter(|c| !clusters.iter().any(|k| k.as_str() == *c))
            .map(str::to_string)
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}

impl Serialize for Plan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Plan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Plan::from_value(&value).map_err(de::Error::custom)
    }
}

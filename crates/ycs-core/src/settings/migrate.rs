//! Additive settings migration
//!
//! Backfills a stored settings record against the schema default without ever
//! overwriting a value the user already has. A field is only replaced when its
//! JSON kind cannot be what the schema expects (a string where a bool belongs),
//! which is how a malformed record gets repaired instead of rejected.

use serde_json::{Map, Value};

/// Result of a migration pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    /// The migrated record.
    pub settings: Value,
    /// Dotted paths of every feature or field that was added or repaired.
    pub added: Vec<String>,
}

impl Migration {
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Merge `user` with `defaults`, feature by feature and field by field.
pub fn migrate(user: &Value, defaults: &Value) -> Migration {
    let mut settings = match user {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let mut added = Vec::new();

    let Some(default_features) = defaults.as_object() else {
        return Migration {
            settings: Value::Object(settings),
            added,
        };
    };

    for (feature, default_record) in default_features {
        let present = settings
            .get(feature)
            .map(|v| v.is_object())
            .unwrap_or(false);

        if !present {
            settings.insert(feature.clone(), default_record.clone());
            log::info!(target: "ycs::core", "Migration: added missing feature {}", feature);
            added.push(feature.clone());
            continue;
        }

        let (Some(record), Some(default_fields)) = (
            settings.get_mut(feature).and_then(Value::as_object_mut),
            default_record.as_object(),
        ) else {
            continue;
        };

        for (prop, default_value) in default_fields {
            match record.get(prop) {
                None => {
                    record.insert(prop.clone(), default_value.clone());
                    log::info!(
                        target: "ycs::core",
                        "Migration: added missing property {} to {}",
                        prop,
                        feature
                    );
                    added.push(format!("{}.{}", feature, prop));
                }
                Some(current) if !same_kind(current, default_value) => {
                    log::warn!(
                        target: "ycs::core",
                        "Migration: repaired malformed property {} of {}",
                        prop,
                        feature
                    );
                    record.insert(prop.clone(), default_value.clone());
                    added.push(format!("{}.{}", feature, prop));
                }
                Some(_) => {}
            }
        }
    }

    Migration {
        settings: Value::Object(settings),
        added,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Bool(_), Value::Bool(_))
            | (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
            | (_, Value::Null)
    )
}

//! # Config Values
//!
//! A user-supplied config value: either a literal or a Secret key reference.
//!
//! Both of these forms are accepted on the wire:
//!
//! ```yaml
//! config:
//!   serverName: "Vikings Only"      # bare scalar
//!   maxPlayers: 10                  # numbers and booleans are taken as text
//!   password:
//!     secretKeyRef:
//!       name: valheim-secrets
//!       key: password
//!   world:
//!     value: Dedicated              # structured literal
//! ```

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;

use crate::crd::SecretKeySelector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Literal(String),
    Secret(SecretKeySelector),
}

impl ConfigValue {
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Literal text, `None` for secret references
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Secret(_) => None,
        }
    }

    #[must_use]
    pub fn secret_ref(&self) -> Option<&SecretKeySelector> {
        match self {
            Self::Literal(_) => None,
            Self::Secret(s) => Some(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredConfigValue {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    secret_key_ref: Option<SecretKeySelector>,
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;

        // First attempt: bare scalar
        match &raw {
            serde_json::Value::String(s) => return Ok(Self::Literal(s.clone())),
            serde_json::Value::Number(n) => return Ok(Self::Literal(n.to_string())),
            serde_json::Value::Bool(b) => return Ok(Self::Literal(b.to_string())),
            serde_json::Value::Null => return Ok(Self::Literal(String::new())),
            _ => {}
        }

        // Second attempt: structured object
        let structured: StructuredConfigValue =
            serde_json::from_value(raw).map_err(D::Error::custom)?;
        Ok(match structured.secret_key_ref {
            Some(selector) => Self::Secret(selector),
            None => Self::Literal(structured.value.unwrap_or_default()),
        })
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(v) => serializer.serialize_str(v),
            Self::Secret(selector) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("secretKeyRef", selector)?;
                map.end()
            }
        }
    }
}

impl JsonSchema for ConfigValue {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("ConfigValue")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        // No type constraint: the API server must admit both scalars and objects
        let schema_value = serde_json::json!({
            "description": "Literal value, or an object with `value` or `secretKeyRef`",
            "x-kubernetes-preserve-unknown-fields": true
        });
        Schema::try_from(schema_value).expect("Failed to create Schema for ConfigValue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_scalars_decode_as_literals() {
        let v: ConfigValue = serde_json::from_value(json!("Vikings Only")).unwrap();
        assert_eq!(v, ConfigValue::literal("Vikings Only"));

        let v: ConfigValue = serde_json::from_value(json!(10)).unwrap();
        assert_eq!(v.as_literal(), Some("10"));

        let v: ConfigValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(v.as_literal(), Some("true"));
    }

    #[test]
    fn test_object_forms() {
        let v: ConfigValue = serde_json::from_value(json!({"value": "Dedicated"})).unwrap();
        assert_eq!(v, ConfigValue::literal("Dedicated"));

        let v: ConfigValue = serde_json::from_value(json!({
            "secretKeyRef": {"name": "valheim-secrets", "key": "password"}
        }))
        .unwrap();
        let selector = v.secret_ref().unwrap();
        assert_eq!(selector.name, "valheim-secrets");
        assert_eq!(selector.key, "password");
        assert!(v.as_literal().is_none());
    }

    #[test]
    fn test_secret_ref_wins_over_value() {
        let v: ConfigValue = serde_json::from_value(json!({
            "value": "ignored",
            "secretKeyRef": {"name": "s", "key": "k"}
        }))
        .unwrap();
        assert!(matches!(v, ConfigValue::Secret(_)));
    }

    #[test]
    fn test_malformed_object_is_rejected() {
        let err = serde_json::from_value::<ConfigValue>(json!({"secretKeyRef": {"name": "s"}}));
        assert!(err.is_err());
        let err = serde_json::from_value::<ConfigValue>(json!(["a", "b"]));
        assert!(err.is_err());
    }

    #[test]
    fn test_yaml_mixed_map() {
        let yaml = r"
serverName: My Server
port: 2456
password:
  secretKeyRef:
    name: creds
    key: pw
";
        let map: std::collections::BTreeMap<String, ConfigValue> =
            serde_yaml::from_str(yaml).unwrap();
        assert_eq!(map["serverName"].as_literal(), Some("My Server"));
        assert_eq!(map["port"].as_literal(), Some("2456"));
        assert!(map["password"].secret_ref().is_some());
    }

    #[test]
    fn test_serialize_literal_is_bare_string() {
        assert_eq!(
            serde_json::to_value(ConfigValue::literal("x")).unwrap(),
            json!("x")
        );
        let secret = ConfigValue::Secret(SecretKeySelector {
            name: "s".into(),
            key: "k".into(),
            optional: None,
        });
        assert_eq!(
            serde_json::to_value(secret).unwrap(),
            json!({"secretKeyRef": {"name": "s", "key": "k"}})
        );
    }
}

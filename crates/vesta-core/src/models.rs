//! Domain types flowing through the sync pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IndexError;

/// Locale → text map, as the catalog stores product and category names.
pub type LocalizedString = BTreeMap<String, String>;

/// Kind of change a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Published,
    Unpublished,
    /// Notification types the pipeline does not act on.
    Unknown,
}

/// A decoded product change notification.
///
/// Only [`EventDecoder`](crate::decoder::EventDecoder) builds these, and it never builds one
/// with an empty entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    entity_id: String,
    change_type: ChangeType,
    raw_payload: Vec<u8>,
}

impl ChangeEvent {
    pub(crate) fn new(entity_id: String, change_type: ChangeType, raw_payload: Vec<u8>) -> Self {
        Self {
            entity_id,
            change_type,
            raw_payload,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    /// The decoded (base64-free) notification payload.
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw_payload
    }
}

/// A product variant. Prices and attributes are passed through to the index untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub prices: Vec<Value>,
    #[serde(default)]
    pub attributes: Vec<Value>,
}

/// Read-only snapshot of a catalog product, as returned by a [`CatalogApi`](crate::CatalogApi).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntity {
    pub id: String,
    pub key: Option<String>,
    pub type_id: String,
    pub name: LocalizedString,
    pub description: Option<LocalizedString>,
    pub category_ids: Vec<String>,
    pub variants: Vec<Variant>,
    pub master_variant: Variant,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ProductType {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: LocalizedString,
}

/// A product together with the names of the resources it references.
///
/// `category_names` is positionally aligned with `entity.category_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProduct {
    pub entity: CatalogEntity,
    pub type_name: String,
    pub category_names: Vec<LocalizedString>,
}

/// The denormalized record stored in the search index.
///
/// Serializes to the search engine's record shape (`objectID`, `productKey`, ...).
/// Absent optional fields are omitted rather than written as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(rename = "productKey", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "productType")]
    pub type_name: String,
    pub name: LocalizedString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(rename = "categories")]
    pub category_names: Vec<LocalizedString>,
    pub variants: Vec<Variant>,
    #[serde(rename = "masterVariant")]
    pub master_variant: Variant,
}

/// Target index name plus the settings it is created with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexConfig {
    pub name: String,
    pub settings: Map<String, Value>,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, settings: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Builds a config from serialized JSON settings.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::ConfigInvalid` if `raw` is not a JSON object.
    pub fn from_json(name: impl Into<String>, raw: &str) -> Result<Self, IndexError> {
        let name = name.into();
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| IndexError::config_invalid(&name, format!("settings are not JSON: {e}")))?;
        Self::from_value(name, value)
    }

    /// Builds a config from an already-parsed settings value, which must be an object.
    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self, IndexError> {
        let name = name.into();
        match value {
            Value::Object(settings) => Ok(Self { name, settings }),
            other => Err(IndexError::config_invalid(
                &name,
                format!("settings must be a JSON object, got {}", json_kind(&other)),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.name.trim().is_empty() {
            return Err(IndexError::config_invalid(&self.name, "index name is empty"));
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variant(id: u64) -> Variant {
        Variant {
            id,
            sku: Some(format!("sku-{id}")),
            prices: vec![json!({"value": {"centAmount": 1000, "currencyCode": "EUR"}})],
            attributes: vec![json!({"name": "color", "value": "red"})],
        }
    }

    #[test]
    fn test_search_record_wire_names() {
        let record = SearchRecord {
            object_id: "p1".to_string(),
            key: Some("shirt".to_string()),
            type_name: "Apparel".to_string(),
            name: LocalizedString::from([("en-US".to_string(), "Shirt".to_string())]),
            description: None,
            category_names: vec![],
            variants: vec![variant(2)],
            master_variant: variant(1),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["objectID"], "p1");
        assert_eq!(value["productKey"], "shirt");
        assert_eq!(value["productType"], "Apparel");
        assert_eq!(value["categories"], json!([]));
        assert_eq!(value["masterVariant"]["sku"], "sku-1");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_variant_deserialization_defaults() {
        let variant: Variant = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(variant.id, 3);
        assert!(variant.sku.is_none());
        assert!(variant.prices.is_empty());
        assert!(variant.attributes.is_empty());
    }

    #[test]
    fn test_index_config_from_json() {
        let config =
            IndexConfig::from_json("products", r#"{"searchableAttributes": ["name"]}"#).unwrap();
        assert_eq!(config.name, "products");
        assert_eq!(config.settings["searchableAttributes"], json!(["name"]));
    }

    #[test]
    fn test_index_config_rejects_non_object() {
        let err = IndexConfig::from_json("products", "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));

        let err = IndexConfig::from_json("products", "not json").unwrap_err();
        assert!(matches!(err, IndexError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_index_config_validate_empty_name() {
        let config = IndexConfig::new("  ", Map::new());
        assert!(matches!(
            config.validate(),
            Err(IndexError::ConfigInvalid { .. })
        ));
        assert!(IndexConfig::new("products", Map::new()).validate().is_ok());
    }
}

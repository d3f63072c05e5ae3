use aws_sdk_dynamodb::types::AttributeValue;
use base64::Engine;
use base64::engine::general_purpose;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use thiserror::Error;

pub type Item = HashMap<String, AttributeValue>;

/// Attribute copied as is into the `created` column.
pub const CREATED_ATTRIBUTE: &str = "created";
pub const UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Item has no value for primary key `{primary_key}`.")]
    MissingPrimaryKey { primary_key: String },
    #[error("Cannot serialize item `{row_id}`: {raw_error_message}")]
    CannotSerializeItem { row_id: String, raw_error_message: String },
}

/// One line of the export, the shape every table is flattened to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransformedRow {
    pub row_id: String,
    pub data: String,
    pub created: Option<String>,
    pub updated: String,
    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,
}

pub fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::M(m) => Value::Object(
            m.iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        AttributeValue::L(l) => Value::Array(l.iter().map(attribute_to_json).collect()),
        AttributeValue::Ss(ss) => Value::Array(ss.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(ns) => Value::Array(ns.iter().map(|n| number_to_json(n)).collect()),
        AttributeValue::B(b) => Value::String(general_purpose::STANDARD.encode(b.as_ref())),
        AttributeValue::Bs(bs) => Value::Array(
            bs.iter()
                .map(|b| Value::String(general_purpose::STANDARD.encode(b.as_ref())))
                .collect(),
        ),
        _ => Value::Null,
    }
}

// Numbers whose json rendering differs from the DynamoDB text (precision loss, exponent) are kept verbatim.
fn number_to_json(n: &str) -> Value {
    match serde_json::from_str::<Number>(n) {
        Ok(number) if number.to_string() == n => Value::Number(number),
        _ => Value::String(n.to_string()),
    }
}

/// Item as a json object, keys sorted.
pub fn item_to_json(item: &Item) -> Value {
    Value::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), attribute_to_json(v)))
            .collect::<Map<String, Value>>(),
    )
}

/// Scalar rendering used for the id and created columns.
pub fn attribute_to_string(value: &AttributeValue) -> String {
    if let AttributeValue::N(n) = value {
        return n.clone();
    }

    match attribute_to_json(value) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn format_updated(now: &DateTime<Utc>) -> String {
    now.format(UPDATED_FORMAT).to_string()
}

/// Flattens scanned items, all rows of one call share the same `updated` value.
pub fn transform_items(
    items: &[Item],
    primary_key: &str,
    now: &DateTime<Utc>,
) -> Result<Vec<TransformedRow>, ModelError> {
    let updated = format_updated(now);

    items
        .iter()
        .map(|item| {
            let row_id = item
                .get(primary_key)
                .map(attribute_to_string)
                .ok_or_else(|| ModelError::MissingPrimaryKey {
                    primary_key: primary_key.to_string(),
                })?;

            let data = serde_json::to_string(&item_to_json(item)).map_err(|e| ModelError::CannotSerializeItem {
                row_id: row_id.clone(),
                raw_error_message: e.to_string(),
            })?;

            Ok(TransformedRow {
                row_id,
                data,
                created: item.get(CREATED_ATTRIBUTE).map(attribute_to_string),
                updated: updated.clone(),
                is_deleted: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::primitives::Blob;
    use chrono::TimeZone;
    use maplit::hashmap;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_attribute_to_json() {
        let item: Item = hashmap! {
            "id".to_string() => AttributeValue::S("u-1".to_string()),
            "age".to_string() => AttributeValue::N("42".to_string()),
            "ratio".to_string() => AttributeValue::N("0.5".to_string()),
            "huge".to_string() => AttributeValue::N("1E+400".to_string()),
            "active".to_string() => AttributeValue::Bool(true),
            "nothing".to_string() => AttributeValue::Null(true),
            "tags".to_string() => AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]),
            "scores".to_string() => AttributeValue::Ns(vec!["1".to_string(), "2".to_string()]),
            "raw".to_string() => AttributeValue::B(Blob::new("hi")),
            "address".to_string() => AttributeValue::M(hashmap! {
                "city".to_string() => AttributeValue::S("Paris".to_string()),
            }),
            "history".to_string() => AttributeValue::L(vec![
                AttributeValue::N("1".to_string()),
                AttributeValue::S("x".to_string()),
            ]),
        };

        assert_eq!(
            item_to_json(&item),
            json!({
                "id": "u-1",
                "age": 42,
                "ratio": 0.5,
                "huge": "1E+400",
                "active": true,
                "nothing": null,
                "tags": ["a", "b"],
                "scores": [1, 2],
                "raw": "aGk=",
                "address": {"city": "Paris"},
                "history": [1, "x"],
            })
        );
    }

    #[test]
    fn test_transform_items() {
        let items: Vec<Item> = vec![
            hashmap! {
                "pk".to_string() => AttributeValue::S("a".to_string()),
                "created".to_string() => AttributeValue::S("2023-01-01 00:00:00".to_string()),
            },
            hashmap! {
                "pk".to_string() => AttributeValue::N("7".to_string()),
            },
        ];

        let rows = transform_items(&items, "pk", &now()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_id, "a");
        assert_eq!(rows[0].created.as_deref(), Some("2023-01-01 00:00:00"));
        assert_eq!(rows[1].row_id, "7");
        assert_eq!(rows[1].created, None);
        assert!(rows.iter().all(|r| r.updated == "2024-03-09 07:05:01"));
        assert!(rows.iter().all(|r| !r.is_deleted));

        let data: Value = serde_json::from_str(&rows[1].data).unwrap();
        assert_eq!(data, json!({"pk": 7}));
    }

    #[test]
    fn test_high_precision_numbers_are_kept_verbatim() {
        let key = "123456789012345678901234567890";
        let ratio = "0.12345678901234567890123456789";
        let items: Vec<Item> = vec![
            hashmap! {
                "id".to_string() => AttributeValue::N(key.to_string()),
                "ratio".to_string() => AttributeValue::N(ratio.to_string()),
                "created".to_string() => AttributeValue::N("1700000000000000000000".to_string()),
            },
            hashmap! {
                "id".to_string() => AttributeValue::N("123456789012345678901234567891".to_string()),
            },
        ];

        let rows = transform_items(&items, "id", &now()).unwrap();

        assert_eq!(rows[0].row_id, key);
        assert_ne!(rows[0].row_id, rows[1].row_id);
        assert_eq!(rows[0].created.as_deref(), Some("1700000000000000000000"));

        let data: Value = serde_json::from_str(&rows[0].data).unwrap();
        assert_eq!(data["id"], Value::String(key.to_string()));
        assert_eq!(data["ratio"], Value::String(ratio.to_string()));
    }

    #[test]
    fn test_exact_numbers_stay_numbers() {
        assert_eq!(attribute_to_json(&AttributeValue::N("-17".to_string())), json!(-17));
        assert_eq!(attribute_to_json(&AttributeValue::N("2.25".to_string())), json!(2.25));
        assert_eq!(attribute_to_json(&AttributeValue::N("18446744073709551615".to_string())), json!(u64::MAX));
        assert_eq!(attribute_to_json(&AttributeValue::N("1e3".to_string())), json!("1e3"));
        assert_eq!(attribute_to_string(&AttributeValue::N("1e3".to_string())), "1e3");
    }

    #[test]
    fn test_transform_items_missing_primary_key() {
        let items: Vec<Item> = vec![hashmap! {
            "other".to_string() => AttributeValue::S("a".to_string()),
        }];

        assert_eq!(
            transform_items(&items, "pk", &now()).unwrap_err(),
            ModelError::MissingPrimaryKey {
                primary_key: "pk".to_string()
            }
        );
    }

    #[test]
    fn test_transform_no_items() {
        assert!(transform_items(&[], "pk", &now()).unwrap().is_empty());
    }
}

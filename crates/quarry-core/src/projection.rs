//! Field projection: trim output rows to a selected field list.
//!
//! Projection runs last in the pipeline, replacing every row with a new
//! object containing only the listed fields, in listed order.

use serde_json::{Map, Value};

/// Build a new row holding only `fields`, in the order given. Fields the row
/// does not carry are silently omitted.
pub(crate) fn project_row(row: &Value, fields: &[String]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = row.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projects_listed_fields_only() {
        let row = json!({"id": 1, "email": "a@x.com", "role": "admin"});
        let out = project_row(&row, &["email".to_string()]);
        assert_eq!(out, json!({"email": "a@x.com"}));
    }

    #[test]
    fn test_listed_order_is_emitted_order() {
        let row = json!({"a": 1, "b": 2, "c": 3});
        let out = project_row(&row, &["c".to_string(), "a".to_string()]);
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    #[test]
    fn test_missing_field_silently_omitted() {
        let row = json!({"a": 1});
        let out = project_row(&row, &["a".to_string(), "zzz".to_string()]);
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_empty_field_list_yields_empty_row() {
        let row = json!({"a": 1});
        assert_eq!(project_row(&row, &[]), json!({}));
    }
}

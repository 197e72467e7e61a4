//! Partial-update plumbing.
//!
//! Patch structs use `Option<T>` for non-nullable columns (absent = untouched)
//! and `Option<Option<T>>` for nullable ones, deserialized with [`nullable`]:
//!
//! | JSON                | value           |
//! |---------------------|-----------------|
//! | field absent        | `None`          |
//! | `"field": null`     | `Some(None)`    |
//! | `"field": "x"`      | `Some(Some(x))` |

use serde::{Deserialize, Deserializer};

/// Use as `#[serde(default, deserialize_with = "crate::patch::nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply a nullable patch field onto a current value.
pub fn merge<T: Clone>(current: &Option<T>, patch: &Option<Option<T>>) -> Option<T> {
    match patch {
        None => current.clone(),
        Some(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct P {
        #[serde(default, deserialize_with = "nullable")]
        make: Option<Option<String>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: P = serde_json::from_str("{}").unwrap();
        let null: P = serde_json::from_str(r#"{"make": null}"#).unwrap();
        let set: P = serde_json::from_str(r#"{"make": "Hatteras"}"#).unwrap();

        assert_eq!(absent.make, None);
        assert_eq!(null.make, Some(None));
        assert_eq!(set.make, Some(Some("Hatteras".to_string())));
    }

    #[test]
    fn merge_keeps_clears_or_replaces() {
        let cur = Some("old".to_string());
        assert_eq!(merge(&cur, &None), Some("old".to_string()));
        assert_eq!(merge(&cur, &Some(None)), None);
        assert_eq!(merge(&cur, &Some(Some("new".to_string()))), Some("new".to_string()));
    }
}

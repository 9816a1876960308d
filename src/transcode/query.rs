//! Query-string population.
//!
//! Request types declare which of their fields may be set from the query
//! string and how each value is parsed. Keys may be written in snake_case
//! (`sort_by`) or camelCase (`sortBy`). Repeated keys append to list fields;
//! for scalar fields the last value wins. Keys that name no declared field are
//! ignored.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::transcode::TranscodeError;

/// How a query value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    I32,
    I64,
    Bool,
    StrList,
}

/// A request field settable from the query string.
#[derive(Debug, Clone, Copy)]
pub struct QueryField {
    /// Field name as serialized (snake_case).
    pub name: &'static str,
    pub kind: FieldKind,
}

impl QueryField {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Declares the query-settable fields of a request type.
pub trait QueryFields {
    const QUERY_FIELDS: &'static [QueryField];
}

/// Apply query parameters to `target`.
pub fn populate<T>(target: &mut T, query: Option<&str>) -> Result<(), TranscodeError>
where
    T: QueryFields + Serialize + DeserializeOwned,
{
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(());
    };

    let mut updates: Map<String, Value> = Map::new();
    for (key, raw) in url::form_urlencoded::parse(query.as_bytes()) {
        let name = to_snake_case(&key);
        let Some(field) = T::QUERY_FIELDS.iter().find(|f| f.name == name) else {
            tracing::debug!(parameter = %key, "Ignoring unknown query parameter");
            continue;
        };

        let value = parse_value(field.kind, &raw).ok_or_else(|| TranscodeError::Query {
            field: key.to_string(),
            value: raw.to_string(),
        })?;

        if field.kind == FieldKind::StrList {
            let list = updates
                .entry(field.name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                items.push(value);
            }
        } else {
            updates.insert(field.name.to_string(), value);
        }
    }

    if updates.is_empty() {
        return Ok(());
    }

    let mut merged = match serde_json::to_value(&*target).map_err(TranscodeError::Codec)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merged.extend(updates);

    *target = serde_json::from_value(Value::Object(merged)).map_err(TranscodeError::Codec)?;
    Ok(())
}

fn parse_value(kind: FieldKind, raw: &str) -> Option<Value> {
    match kind {
        FieldKind::Str | FieldKind::StrList => Some(Value::String(raw.to_string())),
        FieldKind::I32 => raw.trim().parse::<i32>().ok().map(Value::from),
        FieldKind::I64 => raw.trim().parse::<i64>().ok().map(Value::from),
        FieldKind::Bool => parse_bool(raw).map(Value::Bool),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Fields {
        #[serde(skip_serializing_if = "String::is_empty")]
        name: String,
        limit: i64,
        revision: i32,
        purge: bool,
        sort_by: String,
        status_codes: Vec<String>,
    }

    impl QueryFields for Fields {
        const QUERY_FIELDS: &'static [QueryField] = &[
            QueryField::new("limit", FieldKind::I64),
            QueryField::new("revision", FieldKind::I32),
            QueryField::new("purge", FieldKind::Bool),
            QueryField::new("sort_by", FieldKind::Str),
            QueryField::new("status_codes", FieldKind::StrList),
        ];
    }

    fn parse(query: &str) -> Result<Fields, TranscodeError> {
        let mut p = Fields {
            name: "kept".into(),
            ..Fields::default()
        };
        populate(&mut p, Some(query))?;
        Ok(p)
    }

    #[test]
    fn test_typed_fields() {
        let p = parse("limit=10&revision=2&purge=true&sort_by=LAST_RELEASED").unwrap();
        assert_eq!(p.limit, 10);
        assert_eq!(p.revision, 2);
        assert!(p.purge);
        assert_eq!(p.sort_by, "LAST_RELEASED");
        // Fields not named in the query are untouched
        assert_eq!(p.name, "kept");
    }

    #[test]
    fn test_camel_case_keys() {
        let p = parse("sortBy=NAME&statusCodes=DEPLOYED").unwrap();
        assert_eq!(p.sort_by, "NAME");
        assert_eq!(p.status_codes, vec!["DEPLOYED"]);
    }

    #[test]
    fn test_repeated_keys() {
        let p = parse("status_codes=DEPLOYED&status_codes=FAILED&revision=1&revision=4").unwrap();
        assert_eq!(p.status_codes, vec!["DEPLOYED", "FAILED"]);
        assert_eq!(p.revision, 4);
    }

    #[test]
    fn test_percent_decoding() {
        let p = parse("sort_by=a%20b").unwrap();
        assert_eq!(p.sort_by, "a b");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let p = parse("name=overwritten&bogus=1").unwrap();
        assert_eq!(p.name, "kept");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for query in ["revision=abc", "revision=99999999999", "purge=yes", "limit="] {
            let err = parse(query).unwrap_err();
            assert!(err.is_client_error(), "{query}");
        }
    }

    #[test]
    fn test_empty_query_is_noop() {
        let mut p = Fields::default();
        populate(&mut p, None).unwrap();
        populate(&mut p, Some("")).unwrap();
        assert_eq!(p, Fields::default());
    }
}

//! Typed query language for admin filters
//!
//! Admin payloads arrive as relaxed object literals. They are parsed into a
//! `serde_json::Value` by [`relaxed`] and then translated into a [`Query`]:
//! a conjunction of per-field [`Clause`]s plus sort/skip/limit modifiers.
//! Field names are whitelisted per collection so nothing untyped reaches a store.
//!
//! ```text
//! {status: connected}                  -> status == "connected"
//! {ram: {'>': 4, '<=': 64}}            -> ram > 4 AND ram <= 64
//! {hostname: {contains: gpu}}          -> hostname contains "gpu" (case-insensitive)
//! {status: [connected, disconnected]}  -> status in [...]
//! {where: {os: linux}, limit: 10, sort: 'hostname DESC'}
//! ```

pub mod matcher;
pub mod relaxed;

use serde_json::{Map, Value};

use crate::types::QueryError;

/// A single comparison against one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

/// A condition bound to a field name
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub condition: Condition,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A typed, validated query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<u64>,
    /// `None` and `Some(0)` both mean unlimited
    pub limit: Option<u64>,
    /// Set when the payload named at any key, even one that adds no clause
    /// such as `{where: {}}`
    pub explicit: bool,
}

impl Query {
    /// A query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Alias for [`Query::all`], reads better when chaining
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the caller supplied no keys, no clauses and no modifiers
    pub fn is_empty(&self) -> bool {
        !self.explicit
            && self.clauses.is_empty()
            && self.sort.is_empty()
            && self.skip.is_none()
            && self.limit.is_none()
    }

    pub fn with(mut self, field: &str, condition: Condition) -> Self {
        self.clauses.push(Clause {
            field: field.to_string(),
            condition,
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    /// Translate a parsed admin payload into a query for a collection.
    ///
    /// `fields` is the collection's whitelist; any other field is rejected.
    pub fn from_value(value: &Value, collection: &str, fields: &[&str]) -> Result<Self, QueryError> {
        let object = match value {
            Value::Null => return Ok(Self::all()),
            Value::Object(object) => object,
            _ => return Err(QueryError::NotAnObject),
        };

        let mut query = Self {
            explicit: !object.is_empty(),
            ..Self::default()
        };

        for (key, raw) in object {
            match key.as_str() {
                "where" => {
                    let Value::Object(inner) = raw else {
                        return Err(QueryError::InvalidValue {
                            field: "where".into(),
                            reason: "expected an object".into(),
                        });
                    };
                    query.push_clauses(inner, collection, fields)?;
                }
                "limit" => query.limit = Some(positive(key, raw)?),
                "skip" => query.skip = Some(non_negative(key, raw)?),
                "sort" => query.sort = parse_sort(raw, collection, fields)?,
                _ => {
                    check_field(key, collection, fields)?;
                    query.push_field(key, raw)?;
                }
            }
        }

        Ok(query)
    }

    fn push_clauses(
        &mut self,
        object: &Map<String, Value>,
        collection: &str,
        fields: &[&str],
    ) -> Result<(), QueryError> {
        for (field, raw) in object {
            check_field(field, collection, fields)?;
            self.push_field(field, raw)?;
        }
        Ok(())
    }

    fn push_field(&mut self, field: &str, raw: &Value) -> Result<(), QueryError> {
        match raw {
            Value::Array(values) => {
                self.clauses.push(Clause {
                    field: field.to_string(),
                    condition: Condition::In(values.clone()),
                });
            }
            Value::Object(ops) if !ops.is_empty() => {
                for (op, operand) in ops {
                    let condition = parse_operator(field, op, operand)?;
                    self.clauses.push(Clause {
                        field: field.to_string(),
                        condition,
                    });
                }
            }
            other => {
                self.clauses.push(Clause {
                    field: field.to_string(),
                    condition: Condition::Eq(other.clone()),
                });
            }
        }
        Ok(())
    }
}

fn check_field(field: &str, collection: &str, fields: &[&str]) -> Result<(), QueryError> {
    if fields.contains(&field) {
        Ok(())
    } else {
        Err(QueryError::UnknownField {
            collection: collection.to_string(),
            field: field.to_string(),
        })
    }
}

fn parse_operator(field: &str, op: &str, operand: &Value) -> Result<Condition, QueryError> {
    let condition = match op {
        "not" | "!" | "!=" | "ne" => match operand {
            Value::Array(values) => Condition::NotIn(values.clone()),
            other => Condition::Ne(other.clone()),
        },
        "equals" | "eq" => Condition::Eq(operand.clone()),
        "in" => Condition::In(expect_array(field, operand)?),
        "nin" => Condition::NotIn(expect_array(field, operand)?),
        "<" | "lessThan" => Condition::Lt(operand.clone()),
        "<=" | "lessThanOrEqual" => Condition::Lte(operand.clone()),
        ">" | "greaterThan" => Condition::Gt(operand.clone()),
        ">=" | "greaterThanOrEqual" => Condition::Gte(operand.clone()),
        "contains" | "like" => Condition::Contains(expect_string(field, operand)?),
        "startsWith" => Condition::StartsWith(expect_string(field, operand)?),
        "endsWith" => Condition::EndsWith(expect_string(field, operand)?),
        other => return Err(QueryError::UnknownOperator(other.to_string())),
    };
    Ok(condition)
}

fn expect_array(field: &str, operand: &Value) -> Result<Vec<Value>, QueryError> {
    match operand {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(QueryError::InvalidValue {
            field: field.to_string(),
            reason: "expected an array".into(),
        }),
    }
}

fn expect_string(field: &str, operand: &Value) -> Result<String, QueryError> {
    match operand {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(QueryError::InvalidValue {
            field: field.to_string(),
            reason: "expected a string".into(),
        }),
    }
}

fn non_negative(key: &str, raw: &Value) -> Result<u64, QueryError> {
    raw.as_u64().ok_or_else(|| QueryError::InvalidValue {
        field: key.to_string(),
        reason: "expected a non-negative integer".into(),
    })
}

fn positive(key: &str, raw: &Value) -> Result<u64, QueryError> {
    raw.as_u64().filter(|&n| n > 0).ok_or_else(|| QueryError::InvalidValue {
        field: key.to_string(),
        reason: "expected a positive integer".into(),
    })
}

fn parse_sort(
    raw: &Value,
    collection: &str,
    fields: &[&str],
) -> Result<Vec<(String, SortOrder)>, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidValue {
        field: "sort".into(),
        reason: reason.to_string(),
    };

    match raw {
        // "hostname DESC, ram"
        Value::String(spec) => spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut words = part.split_whitespace();
                let field = words.next().unwrap_or_default();
                check_field(field, collection, fields)?;
                let order = match words.next().map(|w| w.to_ascii_uppercase()) {
                    None => SortOrder::Asc,
                    Some(w) if w == "ASC" => SortOrder::Asc,
                    Some(w) if w == "DESC" => SortOrder::Desc,
                    Some(_) => return Err(invalid("direction must be ASC or DESC")),
                };
                Ok((field.to_string(), order))
            })
            .collect(),
        // {hostname: -1, ram: 1}
        Value::Object(spec) => spec
            .iter()
            .map(|(field, dir)| {
                check_field(field, collection, fields)?;
                let order = match dir {
                    Value::Number(n) if n.as_i64() == Some(1) => SortOrder::Asc,
                    Value::Number(n) if n.as_i64() == Some(-1) => SortOrder::Desc,
                    Value::String(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Asc,
                    Value::String(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Desc,
                    _ => return Err(invalid("direction must be 1, -1, ASC or DESC")),
                };
                Ok((field.clone(), order))
            })
            .collect(),
        _ => Err(invalid("expected a string or an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[&str] = &["id", "status", "ram", "hostname", "os"];

    fn parse(value: Value) -> Result<Query, QueryError> {
        Query::from_value(&value, "disciples", FIELDS)
    }

    #[test]
    fn test_empty_object_is_empty_query() {
        assert!(parse(json!({})).unwrap().is_empty());
        assert!(parse(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_empty_where_is_explicit() {
        let query = parse(json!({"where": {}})).unwrap();
        assert!(query.clauses.is_empty());
        assert!(!query.is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = parse(json!({"limit": 0})).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidValue {
                field: "limit".into(),
                reason: "expected a positive integer".into(),
            }
        );
        assert_eq!(parse(json!({"skip": 0})).unwrap().skip, Some(0));
    }

    #[test]
    fn test_scalar_and_array_values() {
        let query = parse(json!({"status": "connected", "os": ["linux", "darwin"]})).unwrap();

        assert_eq!(query.clauses.len(), 2);
        assert!(query.clauses.contains(&Clause {
            field: "os".into(),
            condition: Condition::In(vec![json!("linux"), json!("darwin")]),
        }));
        assert!(query.clauses.contains(&Clause {
            field: "status".into(),
            condition: Condition::Eq(json!("connected")),
        }));
    }

    #[test]
    fn test_operators_and_modifiers() {
        let query = parse(json!({
            "where": {"ram": {">": 4, "lessThanOrEqual": 64}, "status": {"not": "disconnected"}},
            "limit": 5,
            "skip": 1,
            "sort": "hostname DESC",
        }))
        .unwrap();

        assert_eq!(query.clauses.len(), 3);
        assert!(query.clauses.contains(&Clause {
            field: "ram".into(),
            condition: Condition::Gt(json!(4)),
        }));
        assert!(query.clauses.contains(&Clause {
            field: "status".into(),
            condition: Condition::Ne(json!("disconnected")),
        }));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.skip, Some(1));
        assert_eq!(query.sort, vec![("hostname".to_string(), SortOrder::Desc)]);
        assert!(!query.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse(json!({"password": "x"})).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                collection: "disciples".into(),
                field: "password".into(),
            }
        );

        let err = parse(json!({"sort": {"password": 1}})).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = parse(json!({"ram": {"$where": "1"}})).unwrap_err();
        assert_eq!(err, QueryError::UnknownOperator("$where".into()));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(parse(json!([1, 2])).unwrap_err(), QueryError::NotAnObject);
        assert!(parse(json!({"limit": -1})).is_err());
    }
}

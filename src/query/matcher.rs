//! In-process evaluation of a [`Query`] against JSON records
//!
//! Used by the memory store. Semantics follow the MongoDB translation in
//! `db::mongo`: a scalar compared with an array field matches any element,
//! ordering operators only compare numbers with numbers and strings with
//! strings, and string operators ignore case.

use serde_json::Value;
use std::cmp::Ordering;

use super::{Clause, Condition, Query, SortOrder};

/// Whether a record satisfies every clause of the query
pub fn matches(record: &Value, query: &Query) -> bool {
    query.clauses.iter().all(|clause| clause_matches(record, clause))
}

/// Filter, sort, skip and limit a set of records.
///
/// `project` extracts the JSON form of each item.
pub fn apply<T, F>(items: Vec<T>, query: &Query, project: F) -> Vec<T>
where
    F: Fn(&T) -> Value,
{
    let mut selected: Vec<(Value, T)> = items
        .into_iter()
        .map(|item| (project(&item), item))
        .filter(|(value, _)| matches(value, query))
        .collect();

    if !query.sort.is_empty() {
        selected.sort_by(|(a, _), (b, _)| {
            for (field, order) in &query.sort {
                let ordering = sort_cmp(lookup(a, field), lookup(b, field));
                let ordering = match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let skip = query.skip.map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
    let limit = query
        .limit
        .filter(|&l| l > 0)
        .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);

    selected
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(_, item)| item)
        .collect()
}

fn lookup<'a>(record: &'a Value, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&Value::Null)
}

fn clause_matches(record: &Value, clause: &Clause) -> bool {
    let actual = lookup(record, &clause.field);

    match &clause.condition {
        Condition::Eq(expected) => equals(actual, expected),
        Condition::Ne(expected) => !equals(actual, expected),
        Condition::In(options) => options.iter().any(|o| equals(actual, o)),
        Condition::NotIn(options) => !options.iter().any(|o| equals(actual, o)),
        Condition::Lt(bound) => ordered(actual, bound, |o| o == Ordering::Less),
        Condition::Lte(bound) => ordered(actual, bound, |o| o != Ordering::Greater),
        Condition::Gt(bound) => ordered(actual, bound, |o| o == Ordering::Greater),
        Condition::Gte(bound) => ordered(actual, bound, |o| o != Ordering::Less),
        Condition::Contains(needle) => text(actual, |s| s.contains(&needle.to_lowercase())),
        Condition::StartsWith(prefix) => text(actual, |s| s.starts_with(&prefix.to_lowercase())),
        Condition::EndsWith(suffix) => text(actual, |s| s.ends_with(&suffix.to_lowercase())),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(_), Value::Array(_)) => actual == expected,
        (Value::Array(items), _) => items.iter().any(|item| scalar_eq(item, expected)),
        _ => scalar_eq(actual, expected),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn ordered(actual: &Value, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Value::Array(items) => items
            .iter()
            .any(|item| compare(item, bound).is_some_and(&accept)),
        _ => compare(actual, bound).is_some_and(accept),
    }
}

fn text(actual: &Value, accept: impl Fn(&str) -> bool) -> bool {
    match actual {
        Value::String(s) => accept(&s.to_lowercase()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| accept(&s.to_lowercase())),
        _ => false,
    }
}

/// Total order used for sorting: nulls first, then numbers, then strings
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

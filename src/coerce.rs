// src/coerce.rs
//
// n8n workflows return lists in whatever shape the last node produced. Everything
// that needs a list of records goes through `coerce_records`.

use serde_json::{Map, Value};

use crate::models::{integral_i64, CheckedInUser, Procedure};

type Record = Map<String, Value>;

fn has_id(v: &Value) -> bool {
    v.as_object().is_some_and(|o| o.contains_key("id"))
}

/// Coerce an upstream payload into an ordered list of records.
///
/// - array: its object elements, in order;
/// - object with a numeric `length > 0` (an array that went through an
///   object conversion): the entries at `"0"..length`, keeping those with an `id`;
/// - object with a non-null `id`: that single object;
/// - any other object: its values that are objects with an `id`;
/// - anything else: empty.
pub fn coerce_records(raw: &Value) -> Vec<Record> {
    match raw {
        Value::Array(items) => items.iter().filter_map(|v| v.as_object().cloned()).collect(),
        Value::Object(obj) => {
            // A bogus `length` cannot index past the entries that exist.
            let len = obj
                .get("length")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(obj.len() as u64);
            if len > 0 {
                return (0..len)
                    .filter_map(|i| obj.get(&i.to_string()))
                    .filter(|v| has_id(v))
                    .filter_map(|v| v.as_object().cloned())
                    .collect();
            }
            if obj.get("id").is_some_and(|id| !id.is_null()) {
                return vec![obj.clone()];
            }
            obj.values()
                .filter(|v| has_id(v))
                .filter_map(|v| v.as_object().cloned())
                .collect()
        }
        _ => Vec::new(),
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_i64))
        }
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn opt_text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::Null) | None => None,
        other => Some(as_text(other)),
    }
}

impl Procedure {
    /// Normalize a catalog record. Records without a numeric id are dropped.
    pub fn from_record(rec: &Record) -> Option<Self> {
        let id = rec.get("id").and_then(as_i64)?;
        let duration = rec
            .get("duration")
            .filter(|v| !v.is_null())
            .or_else(|| rec.get("duration_minutes"))
            .and_then(as_i64)
            .unwrap_or(0);

        Some(Procedure {
            id,
            name: as_text(rec.get("name")),
            description: as_text(rec.get("description")),
            price: rec.get("price").and_then(as_f64).unwrap_or(0.0),
            duration,
            room: as_text(rec.get("room")),
        })
    }
}

pub fn procedures_from_payload(raw: &Value) -> Vec<Procedure> {
    coerce_records(raw)
        .iter()
        .filter_map(Procedure::from_record)
        .collect()
}

/// Find the user in a check-in reply. Depending on the workflow version it sits
/// at the top level, under `user`, `data.user`, `data`, or `body.user`.
pub fn extract_checked_in_user(reply: &Value) -> Option<CheckedInUser> {
    let top_level = reply.as_object().filter(|o| {
        o.get("id").is_some_and(|v| !v.is_null())
            && o.get("email")
                .and_then(Value::as_str)
                .is_some_and(|e| !e.is_empty())
    });

    let candidate = top_level
        .or_else(|| reply.get("user").and_then(Value::as_object))
        .or_else(|| reply.pointer("/data/user").and_then(Value::as_object))
        .or_else(|| {
            reply
                .get("data")
                .and_then(Value::as_object)
                .filter(|o| o.contains_key("id"))
        })
        .or_else(|| reply.pointer("/body/user").and_then(Value::as_object))?;

    let id = candidate.get("id").and_then(as_i64).filter(|id| *id > 0)?;

    Some(CheckedInUser {
        id,
        email: as_text(candidate.get("email")),
        name: as_text(candidate.get("name")),
        birthday: opt_text(candidate.get("birthday")),
        phone: opt_text(candidate.get("phone")),
        address: opt_text(candidate.get("address")),
    })
}

/// Error text a workflow put in `message` or `error` (string or `{message}`).
pub fn backend_message(reply: &Value) -> Option<String> {
    let err = reply
        .get("message")
        .filter(|v| !v.is_null())
        .or_else(|| reply.get("error"))?;
    match err {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(o) => o.get("message").map(|m| as_text(Some(m))),
        _ => None,
    }
}

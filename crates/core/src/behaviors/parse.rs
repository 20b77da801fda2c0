//! Response parsing behaviors

use querykit_domain::{QueryError, QueryResult, RawResponse};
use serde_json::{Map, Value};

use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

fn ensure_success(response: &RawResponse) -> QueryResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(QueryError::http(response.status, response.status_text.clone(), response.body.clone()))
    }
}

/// Parses a JSON body, unwrapping a verbose `{ "d": ... }` envelope.
///
/// `204` and empty bodies yield `null`.
pub fn parse_json_body(response: &RawResponse) -> QueryResult<Value> {
    if response.status == 204 || response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let json: Value = serde_json::from_str(&response.body)
        .map_err(|e| QueryError::Parse(format!("response body is not JSON: {e}")))?;
    Ok(unwrap_verbose(json))
}

fn unwrap_verbose(json: Value) -> Value {
    match json {
        Value::Object(mut map) if map.contains_key("d") => match map.remove("d") {
            Some(Value::Object(mut d)) if d.contains_key("results") => {
                d.remove("results").unwrap_or(Value::Null)
            }
            Some(d) => d,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Non-2xx becomes [`QueryError::Http`]; otherwise JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParse;

impl Behavior<Queryable> for DefaultParse {
    fn apply(self, mut target: Queryable) -> Queryable {
        target.on_mut().parse.append(Observer::parse(|_, mut args| async move {
            ensure_success(&args.response)?;
            args.result = Some(parse_json_body(&args.response)?);
            Ok(args)
        }));
        target
    }
}

/// Returns the body as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParse;

impl Behavior<Queryable> for TextParse {
    fn apply(self, mut target: Queryable) -> Queryable {
        target.on_mut().parse.append(Observer::parse(|_, mut args| async move {
            ensure_success(&args.response)?;
            args.result = Some(Value::String(args.response.body.clone()));
            Ok(args)
        }));
        target
    }
}

/// Returns `{ "data": <json>, "headers": { name: value } }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHeaderParse;

impl Behavior<Queryable> for JsonHeaderParse {
    fn apply(self, mut target: Queryable) -> Queryable {
        target.on_mut().parse.append(Observer::parse(|_, mut args| async move {
            ensure_success(&args.response)?;
            let data = parse_json_body(&args.response)?;
            let headers: Map<String, Value> = args
                .response
                .headers
                .iter()
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect();
            let mut result = Map::new();
            result.insert("data".into(), data);
            result.insert("headers".into(), Value::Object(headers));
            args.result = Some(Value::Object(result));
            Ok(args)
        }));
        target
    }
}

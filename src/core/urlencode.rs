//! Percent-encoded query string serialization for any `Serialize` type that
//! flattens to a JSON object, following the pattern used throughout the
//! `OpenID` endpoints: error responses, authorization requests and responses
//! are all exchanged as `application/x-www-form-urlencoded` strings built
//! from the same typed values used for JSON.

use anyhow::{Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use urlencoding::{decode, encode};

/// Serialize `value` to a query string (`key=value&key2=value2`), percent
/// encoding each value. Nested objects/arrays are JSON-encoded before being
/// percent-encoded; `null` fields are omitted entirely.
///
/// # Errors
///
/// Returns an error if `value` does not serialize to a JSON object.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    let Value::Object(map) = serde_json::to_value(value)? else {
        return Err(anyhow!("value must serialize to a JSON object"));
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, val) in map {
        if val.is_null() {
            continue;
        }
        let raw = match val {
            Value::String(s) => s,
            other => other.to_string(),
        };
        pairs.push(format!("{key}={}", encode(&raw)));
    }
    Ok(pairs.join("&"))
}

/// Parse a query string (or URI fragment) of the shape produced by
/// [`to_string`] back into `T`. A value that parses as JSON (an object,
/// array, number, or boolean) is restored to that shape; anything else is
/// kept as a string.
///
/// # Errors
///
/// Returns an error if percent-decoding fails or the reconstructed object
/// does not deserialize into `T`.
pub fn from_string<T: DeserializeOwned>(query: &str) -> Result<T> {
    let mut map = Map::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?.into_owned();
        let value = decode(raw_value)?.into_owned();
        let parsed = serde_json::from_str(&value).unwrap_or(Value::String(value));
        map.insert(key, parsed);
    }
    Ok(serde_json::from_value(Value::Object(map))?)
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Example {
        a: &'static str,
        b: Option<&'static str>,
        c: u32,
    }

    #[test]
    fn encodes_and_skips_null() {
        let ex = Example { a: "hello world", b: None, c: 7 };
        let qs = to_string(&ex).unwrap();
        assert_eq!(qs, "a=hello%20world&c=7");
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Nested {
        name: String,
        tags: Vec<String>,
    }

    #[test]
    fn from_string_restores_nested_json() {
        let qs = "name=hello%20world&tags=%5B%22a%22%2C%22b%22%5D";
        let nested: Nested = from_string(qs).unwrap();
        assert_eq!(nested, Nested { name: "hello world".to_string(), tags: vec!["a".to_string(), "b".to_string()] });
    }
}

//! Decoding of loosely typed response data into typed structs.
//!
//! Response objects are plain JSON maps. `decode` maps them onto any
//! [`DeserializeOwned`] type using the same symbolic names the attribute
//! compiler selects. Object members holding `null` are dropped first, at
//! every level, so fields marked `#[serde(default)]` fall back to their
//! default value the same way missing members do. This includes opaque
//! `Value` and `Map` fields: a remainder map never holds `null` members.

use std::any::type_name;
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::selection::GraphqlObject;

/// Decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The destination is not one of the interface's implementations.
    #[error("'{implementation}' does not implement the GraphQL interface '{interface}'")]
    NotImplementing {
        /// Interface type name.
        interface: &'static str,
        /// Requested destination type name.
        implementation: &'static str,
    },

    /// No conversion exists between the source shape and the destination.
    #[error("unimplemented decoding hook '{from}' -> '{to}'")]
    UnimplementedHook {
        /// Source shape.
        from: &'static str,
        /// Destination type.
        to: &'static str,
    },

    /// The value graph does not fit the destination type.
    #[error("decoding '{target}': {message}")]
    Invalid {
        /// Destination type name.
        target: &'static str,
        /// Underlying serde message.
        message: String,
    },
}

/// A GraphQL interface or union type.
///
/// Interfaces carry fewer fields than their implementations. The extra
/// members found in a response are kept in a catch-all map, exposed through
/// [`GraphqlInterface::remainder`], and re-applied by [`decode_interface`].
pub trait GraphqlInterface: GraphqlObject + Serialize {
    /// Response members not claimed by the interface's own fields.
    fn remainder(&self) -> Map<String, Value>;
}

/// Decode any serializable value graph into `T`.
pub fn decode<T: DeserializeOwned>(input: impl Serialize) -> Result<T, DecodeError> {
    let value = serde_json::to_value(input).map_err(invalid::<T>)?;
    decode_value(value)
}

/// Decode an owned JSON value into `T`.
pub fn decode_value<T: DeserializeOwned>(mut value: Value) -> Result<T, DecodeError> {
    strip_nulls(&mut value);
    serde_json::from_value(value).map_err(invalid::<T>)
}

/// Convert an interface value into one of its concrete implementations.
///
/// Fails before touching any data when `T` is not listed among the
/// interface's implementations.
pub fn decode_interface<I, T>(input: &I) -> Result<T, DecodeError>
where
    I: GraphqlInterface,
    T: GraphqlObject + DeserializeOwned,
{
    let implemented = I::implementations()
        .iter()
        .any(|implementation| implementation.type_id() == std::any::TypeId::of::<T>());
    if !implemented {
        return Err(DecodeError::NotImplementing {
            interface: I::TYPE_NAME,
            implementation: T::TYPE_NAME,
        });
    }

    let mut fields = match serde_json::to_value(input).map_err(invalid::<I>)? {
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::UnimplementedHook {
                from: value_kind(&other),
                to: type_name::<T>(),
            });
        }
    };
    fields.extend(input.remainder());

    decode_value(Value::Object(fields))
}

/// Serialize any value into a remainder map. Non-objects yield an empty map.
#[must_use]
pub fn to_remainder<T: Serialize + ?Sized>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Destination named by the timestamp hook's errors.
const TIMESTAMP_TARGET: &str = "DateTime<Utc>";

const VALUE_KINDS: [&str; 6] = ["null", "bool", "number", "string", "array", "object"];

/// Convert a response value into a UTC timestamp.
///
/// Only RFC3339 strings are accepted. A timestamp that has already been
/// decoded serializes back to RFC3339, so it round-trips through this hook.
pub fn timestamp_from_value(value: &Value) -> Result<DateTime<Utc>, DecodeError> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| DecodeError::Invalid {
                target: TIMESTAMP_TARGET,
                message: format!("'{raw}': {err}"),
            }),
        other => Err(DecodeError::UnimplementedHook {
            from: value_kind(other),
            to: TIMESTAMP_TARGET,
        }),
    }
}

/// A UTC timestamp, the only time type a selection may contain.
///
/// Decoding runs [`timestamp_from_value`], so every timestamp member of a
/// response goes through the same RFC3339 whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    #[must_use]
    pub const fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        timestamp_from_value(&value)
            .map(Self)
            .map_err(D::Error::custom)
    }
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, member| !member.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

const fn value_kind(value: &Value) -> &'static str {
    let index = match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    };
    VALUE_KINDS[index]
}

// Hook failures cross serde as plain messages; recover the typed variant.
fn invalid<T>(err: serde_json::Error) -> DecodeError {
    let message = err.to_string();
    hook_failure(&message).unwrap_or_else(|| DecodeError::Invalid {
        target: type_name::<T>(),
        message,
    })
}

fn hook_failure(message: &str) -> Option<DecodeError> {
    let (_, rest) = message.split_once("unimplemented decoding hook '")?;
    let (from, rest) = rest.split_once("' -> '")?;
    let (to, _) = rest.split_once('\'')?;
    if to != TIMESTAMP_TARGET {
        return None;
    }
    let from = VALUE_KINDS.into_iter().find(|kind| *kind == from)?;
    Some(DecodeError::UnimplementedHook {
        from,
        to: TIMESTAMP_TARGET,
    })
}

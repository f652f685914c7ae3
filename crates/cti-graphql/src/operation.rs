//! Query variables and the response envelope.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{GraphqlClientError, GraphqlError};
use crate::upload::File;

/// Decoded `data` member of a response.
pub type ResponseData = Map<String, Value>;

/// A single query variable.
///
/// Files cannot travel inside the JSON body. They serialize as `null`
/// placeholders and are sent as separate multipart parts.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Plain JSON value.
    Value(Value),
    /// One uploaded file.
    File(File),
    /// A list of uploaded files.
    Files(Vec<File>),
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::File(_) => serializer.serialize_none(),
            Self::Files(files) => {
                let mut seq = serializer.serialize_seq(Some(files.len()))?;
                for _ in files {
                    seq.serialize_element(&Value::Null)?;
                }
                seq.end()
            }
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<File> for Variable {
    fn from(file: File) -> Self {
        Self::File(file)
    }
}

impl From<Vec<File>> for Variable {
    fn from(files: Vec<File>) -> Self {
        Self::Files(files)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i64> for Variable {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<u32> for Variable {
    fn from(value: u32) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Query variables, kept in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Variable>);

impl Variables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build variables from the members of any serializable object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, GraphqlClientError> {
        match serde_json::to_value(value)? {
            Value::Object(members) => Ok(members.into_iter().collect()),
            Value::Null => Ok(Self::new()),
            other => Err(GraphqlClientError::TypeAssertion {
                value: other.to_string(),
                expected: "object",
            }),
        }
    }

    /// Set a variable, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Variable>) -> Option<Variable> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`Variables::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a variable to the JSON form of `value`.
    pub fn insert_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), GraphqlClientError> {
        self.insert(key, serde_json::to_value(value)?);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.0.get(key)
    }

    /// JSON value of a plain variable.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        match self.0.get(key)? {
            Variable::Value(value) => Some(value),
            Variable::File(_) | Variable::Files(_) => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Variable> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Variable> {
        self.0.iter()
    }

    /// Merge `other` into `self`; entries of `other` win.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }
}

impl<K: Into<String>, V: Into<Variable>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Variables {
    type Item = (String, Variable);
    type IntoIter = btree_map::IntoIter<String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Variables {
    type Item = (&'a String, &'a Variable);
    type IntoIter = btree_map::Iter<'a, String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// GraphQL request payload, as sent in the JSON body or the `operations` part.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<'a> {
    /// Query text.
    pub query: &'a str,
    /// Variables, with file placeholders.
    pub variables: &'a Variables,
}

/// GraphQL response container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T> {
    /// Response data.
    #[serde(default)]
    pub data: Option<T>,
    /// GraphQL errors.
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
    /// Extensions payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> GraphqlResponse<T> {
    /// Returns `true` if no GraphQL errors were returned.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.as_ref().is_none_or(Vec::is_empty)
    }

    /// Data, or every reported server error.
    pub fn into_result(self) -> Result<Option<T>, GraphqlClientError> {
        match self.errors {
            Some(errors) if !errors.is_empty() => Err(GraphqlClientError::GraphqlErrors { errors }),
            _ => Ok(self.data),
        }
    }
}

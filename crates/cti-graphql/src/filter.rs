//! Recursive filter expressions for list queries.
//!
//! Filters have two serializations:
//! - a structural JSON form, produced by the [`Serialize`] impls and sent as
//!   the `filters` query variable;
//! - an inline GraphQL literal, produced by `to_graphql`, used when a filter
//!   has to be spliced into a selection set argument.

use std::fmt;
use std::str::FromStr;

use serde::ser::{Error as _, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// How filters and filter groups are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Every member must match.
    And,
    /// At least one member must match.
    Or,
}

impl FilterMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied between a filter key and its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Match,
    Wildcard,
    Contains,
    NotContains,
    EndsWith,
    NotEndsWith,
    StartsWith,
    NotStartsWith,
    Script,
    Nil,
    NotNil,
    Search,
}

impl FilterOperator {
    /// Wire name of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "not_eq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Match => "match",
            Self::Wildcard => "wildcard",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::EndsWith => "ends_with",
            Self::NotEndsWith => "not_ends_with",
            Self::StartsWith => "starts_with",
            Self::NotStartsWith => "not_starts_with",
            Self::Script => "script",
            Self::Nil => "nil",
            Self::NotNil => "not_nil",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering applied to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    #[default]
    Asc,
    Desc,
}

impl OrderMode {
    /// Wire name of the ordering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for OrderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown order mode '{other}'")),
        }
    }
}

/// A single missing piece of filter content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("a filter mode must be set")]
    EmptyMode,
    #[error("a filter operator must be set")]
    EmptyOperator,
    #[error("at least one value must be set")]
    EmptyValues,
}

/// Every violation found while validating a filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterErrors(Vec<FilterError>);

impl FilterErrors {
    /// The collected violations, in discovery order.
    #[must_use]
    pub fn errors(&self) -> &[FilterError] {
        &self.0
    }

    /// Whether `error` was reported at least once.
    #[must_use]
    pub fn contains(&self, error: FilterError) -> bool {
        self.0.contains(&error)
    }

    fn into_result(self) -> Result<(), Self> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FilterErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FilterErrors {}

/// Leaf filter: `key <operator> values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub mode: Option<FilterMode>,
    pub key: Vec<String>,
    pub operator: Option<FilterOperator>,
    pub values: Vec<Value>,
}

impl Filter {
    /// Create a fully specified filter.
    #[must_use]
    pub fn new<K, V>(mode: FilterMode, key: K, operator: FilterOperator, values: V) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        Self {
            mode: Some(mode),
            key: key.into_iter().map(Into::into).collect(),
            operator: Some(operator),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `key eq value`, combined with `and`.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(
            FilterMode::And,
            [key.into()],
            FilterOperator::Eq,
            [value.into()],
        )
    }

    /// Whether every part of the filter is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.key.is_empty() && self.operator.is_none() && self.values.is_empty()
    }

    /// Validate the filter, reporting every missing part.
    pub fn is_valid(&self) -> Result<(), FilterErrors> {
        let mut errors = FilterErrors::default();
        self.collect_errors(&mut errors);
        errors.into_result()
    }

    fn collect_errors(&self, errors: &mut FilterErrors) {
        if self.mode.is_none() {
            errors.0.push(FilterError::EmptyMode);
        }
        if self.operator.is_none() {
            errors.0.push(FilterError::EmptyOperator);
        }
        if self.values.is_empty() {
            errors.0.push(FilterError::EmptyValues);
        }
    }

    /// Inline GraphQL literal: `{mode:and, key:["name"], operator:eq, values:["x"]}`.
    pub fn to_graphql(&self) -> Result<String, FilterErrors> {
        self.is_valid()?;
        Ok(format!(
            "{{mode:{}, key:{}, operator:{}, values:{}}}",
            display_or_empty(self.mode.map(FilterMode::as_str)),
            json_list(&self.key),
            display_or_empty(self.operator.map(FilterOperator::as_str)),
            json_list(&self.values),
        ))
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_none();
        }
        self.is_valid()
            .map_err(|err| S::Error::custom(format!("filter has invalid content: {err}")))?;

        let mut state = serializer.serialize_struct("Filter", 4)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("values", &self.values)?;
        state.serialize_field("operator", &self.operator)?;
        state.serialize_field("mode", &self.mode)?;
        state.end()
    }
}

/// Recursive combination of filters and nested groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGroup {
    pub mode: Option<FilterMode>,
    pub filters: Vec<Filter>,
    pub filter_groups: Vec<FilterGroup>,
}

impl FilterGroup {
    /// Create a group with the given mode and members.
    #[must_use]
    pub const fn new(mode: FilterMode, filters: Vec<Filter>, filter_groups: Vec<Self>) -> Self {
        Self {
            mode: Some(mode),
            filters,
            filter_groups,
        }
    }

    /// An `and` group holding the given filters.
    #[must_use]
    pub const fn and(filters: Vec<Filter>) -> Self {
        Self::new(FilterMode::And, filters, Vec::new())
    }

    /// An `or` group holding the given filters.
    #[must_use]
    pub const fn or(filters: Vec<Filter>) -> Self {
        Self::new(FilterMode::Or, filters, Vec::new())
    }

    /// Whether the group has no mode and no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.filters.is_empty() && self.filter_groups.is_empty()
    }

    /// Validate the whole tree. Violations of nested members are all reported.
    pub fn is_valid(&self) -> Result<(), FilterErrors> {
        let mut errors = FilterErrors::default();
        self.collect_errors(&mut errors);
        errors.into_result()
    }

    fn collect_errors(&self, errors: &mut FilterErrors) {
        if self.mode.is_none() {
            errors.0.push(FilterError::EmptyMode);
        }
        for filter in &self.filters {
            filter.collect_errors(errors);
        }
        for group in &self.filter_groups {
            group.collect_errors(errors);
        }
    }

    /// Inline GraphQL literal: `{mode:and, filters:[...], filterGroups:[...]}`.
    pub fn to_graphql(&self) -> Result<String, FilterErrors> {
        self.is_valid()?;
        let filters = self
            .filters
            .iter()
            .map(Filter::to_graphql)
            .collect::<Result<Vec<_>, _>>()?;
        let groups = self
            .filter_groups
            .iter()
            .map(Self::to_graphql)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(
            "{{mode:{}, filters:[{}], filterGroups:[{}]}}",
            display_or_empty(self.mode.map(FilterMode::as_str)),
            filters.join(","),
            groups.join(","),
        ))
    }
}

impl Serialize for FilterGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_none();
        }
        self.is_valid()
            .map_err(|err| S::Error::custom(format!("filterGroup has invalid content: {err}")))?;

        let mut state = serializer.serialize_struct("FilterGroup", 3)?;
        state.serialize_field("mode", &self.mode)?;
        state.serialize_field("filters", &self.filters)?;
        state.serialize_field("filterGroups", &self.filter_groups)?;
        state.end()
    }
}

fn display_or_empty(value: Option<&str>) -> &str {
    value.unwrap_or_default()
}

fn json_list<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

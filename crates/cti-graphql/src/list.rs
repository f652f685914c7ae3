//! List query options and variable resolution.
//!
//! Variables are resolved from four layers, lowest priority first: built-in
//! constants, environment, client builder options, then the per-call
//! [`ListOptions`]. The environment and builder layers are merged into the
//! client's [`ListDefaults`] when it is built.

use serde_json::Value;

use crate::error::GraphqlClientError;
use crate::filter::{FilterGroup, OrderMode};
use crate::operation::{Variable, Variables};
use crate::pagination::PageLimit;

/// Built-in page size.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
/// Built-in ordering field.
pub const DEFAULT_ORDER_BY: &str = "created_at";
/// Built-in ordering mode.
pub const DEFAULT_ORDER_MODE: OrderMode = OrderMode::Asc;

/// Client-level list defaults. Unset members fall back to the built-in constants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDefaults {
    pub page_size: Option<u32>,
    pub order_by: Option<String>,
    pub order_mode: Option<OrderMode>,
    /// Cap on the number of pages fetched by a fetch-all listing.
    pub page_limit: Option<PageLimit>,
}

/// Per-call list options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub first: Option<u32>,
    pub after: Option<String>,
    pub order_by: Option<String>,
    pub order_mode: Option<OrderMode>,
    pub filters: Option<FilterGroup>,
    pub search: Option<String>,
    pub to_stix: Option<bool>,
    /// Entity-specific variables, applied last.
    pub extra: Variables,
    /// Overrides the client's page cap for this call.
    pub page_limit: Option<PageLimit>,
}

impl ListOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    #[must_use]
    pub fn with_after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    #[must_use]
    pub const fn with_order_mode(mut self, mode: OrderMode) -> Self {
        self.order_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: FilterGroup) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub const fn with_to_stix(mut self, to_stix: bool) -> Self {
        self.to_stix = Some(to_stix);
        self
    }

    /// Set an entity-specific variable, e.g. `dynamicFrom` on reports.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.extra.insert(key, value);
        self
    }

    #[must_use]
    pub const fn with_page_limit(mut self, limit: PageLimit) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Resolve the final variable set.
    ///
    /// `entity_defaults` come first and can be overridden by every other layer.
    /// A non-empty filter group is validated before anything is sent.
    pub fn resolve(
        &self,
        defaults: &ListDefaults,
        entity_defaults: Variables,
    ) -> Result<Variables, GraphqlClientError> {
        let mut variables = entity_defaults;

        let first = self
            .first
            .or(defaults.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let order_by = self
            .order_by
            .as_deref()
            .or(defaults.order_by.as_deref())
            .unwrap_or(DEFAULT_ORDER_BY);
        let order_mode = self
            .order_mode
            .or(defaults.order_mode)
            .unwrap_or(DEFAULT_ORDER_MODE);

        variables.insert("first", Value::from(first));
        variables.insert("orderBy", order_by);
        variables.insert("orderMode", order_mode.as_str());
        variables.insert("filters", filters_value(self.filters.as_ref())?);

        if let Some(after) = self.after.as_deref().filter(|after| !after.is_empty()) {
            variables.insert("after", after);
        }
        if let Some(search) = &self.search {
            variables.insert("search", search.as_str());
        }
        if let Some(to_stix) = self.to_stix {
            variables.insert("toStix", to_stix);
        }

        variables.extend(self.extra.clone());
        Ok(variables)
    }
}

fn filters_value(filters: Option<&FilterGroup>) -> Result<Value, GraphqlClientError> {
    match filters {
        Some(group) if !group.is_empty() => {
            group.is_valid()?;
            Ok(serde_json::to_value(group)?)
        }
        _ => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::filter::Filter;

    fn resolved(options: &ListOptions, defaults: &ListDefaults) -> Value {
        let variables = options.resolve(defaults, Variables::new()).unwrap();
        serde_json::to_value(variables).unwrap()
    }

    #[test]
    fn built_in_constants_apply_last() {
        assert_eq!(
            resolved(&ListOptions::new(), &ListDefaults::default()),
            json!({"first": 1000, "orderBy": "created_at", "orderMode": "asc", "filters": null})
        );
    }

    #[test]
    fn client_defaults_override_constants() {
        let defaults = ListDefaults {
            page_size: Some(20),
            order_by: Some("creator".to_string()),
            order_mode: Some(OrderMode::Desc),
            page_limit: None,
        };
        assert_eq!(
            resolved(&ListOptions::new(), &defaults),
            json!({"first": 20, "orderBy": "creator", "orderMode": "desc", "filters": null})
        );
    }

    #[test]
    fn call_options_override_client_defaults() {
        let defaults = ListDefaults {
            page_size: Some(20),
            order_by: Some("creator".to_string()),
            order_mode: Some(OrderMode::Asc),
            page_limit: None,
        };
        let options = ListOptions::new()
            .with_first(10)
            .with_order_by("name")
            .with_order_mode(OrderMode::Desc)
            .with_after("cursor-1")
            .with_search("apt")
            .with_to_stix(true)
            .with_filters(FilterGroup::and(vec![Filter::eq("name", "x")]));
        assert_eq!(
            resolved(&options, &defaults),
            json!({
                "first": 10,
                "orderBy": "name",
                "orderMode": "desc",
                "after": "cursor-1",
                "search": "apt",
                "toStix": true,
                "filters": {
                    "mode": "and",
                    "filters": [{"key": ["name"], "values": ["x"], "operator": "eq", "mode": "and"}],
                    "filterGroups": []
                }
            })
        );
    }

    #[test]
    fn empty_cursor_is_omitted() {
        let value = resolved(&ListOptions::new().with_after(""), &ListDefaults::default());
        assert!(value.get("after").is_none());
    }

    #[test]
    fn entity_defaults_and_extras_layer_correctly() {
        let entity_defaults = Variables::new()
            .with("dynamicFrom", Value::Null)
            .with("dynamicTo", Value::Null)
            .with("first", Value::from(1));
        let options = ListOptions::new().with_variable("dynamicTo", "2024-01-01T00:00:00Z");
        let variables = options
            .resolve(&ListDefaults::default(), entity_defaults)
            .unwrap();
        assert_eq!(variables.value("first"), Some(&json!(1000)));
        assert_eq!(variables.value("dynamicFrom"), Some(&Value::Null));
        assert_eq!(
            variables.value("dynamicTo"),
            Some(&json!("2024-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn invalid_filters_fail_resolution() {
        let options = ListOptions::new().with_filters(FilterGroup::and(vec![Filter::default()]));
        let err = options
            .resolve(&ListDefaults::default(), Variables::new())
            .unwrap_err();
        assert!(matches!(err, GraphqlClientError::InvalidFilter(_)));
    }

    #[test]
    fn empty_filter_group_is_null() {
        let value = resolved(
            &ListOptions::new().with_filters(FilterGroup::default()),
            &ListDefaults::default(),
        );
        assert_eq!(value["filters"], Value::Null);
    }
}

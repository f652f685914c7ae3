//! Cursor pagination.
//!
//! [`list_all`] walks a connection page by page, each request starting after
//! the previous page's end cursor, until the server stops reporting a next
//! page.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::Transport;
use crate::crud::list_page;
use crate::entity::Listable;
use crate::error::GraphqlClientError;
use crate::list::ListOptions;
use crate::operation::ResponseData;

/// Relay-style page information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub start_cursor: String,
    pub end_cursor: String,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Total number of matching entities, across all pages.
    pub global_count: u64,
}

/// Upper bound on the number of pages a fetch-all listing may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit {
    pub max_pages: usize,
}

impl PageLimit {
    #[must_use]
    pub const fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }
}

/// Fetch every page of a listing.
///
/// Only the first page's `start_cursor` and `has_previous_page` are kept in
/// the aggregate `page_info`; `end_cursor` and `global_count` come from the
/// last page and `has_next_page` is always `false`. Any `after` set in
/// `options` is replaced by the driver's own cursor.
///
/// Unbounded unless a [`PageLimit`] is set on the call or the client, in
/// which case requesting one page more fails with
/// [`GraphqlClientError::PaginationLimitExceeded`].
pub async fn list_all<E, C>(
    client: &C,
    custom_attributes: &str,
    page_info: Option<&mut PageInfo>,
    options: ListOptions,
) -> Result<Vec<ResponseData>, GraphqlClientError>
where
    E: Listable,
    C: Transport + ?Sized,
{
    let limit = options.page_limit.or(client.list_defaults().page_limit);

    let mut pagination = PageInfo {
        has_next_page: true,
        ..PageInfo::default()
    };
    let mut aggregate: Option<PageInfo> = None;
    let mut entities = Vec::new();
    let mut pages = 0_usize;

    while pagination.has_next_page {
        if let Some(limit) = limit {
            if pages >= limit.max_pages {
                return Err(GraphqlClientError::PaginationLimitExceeded { pages });
            }
        }

        let mut page_options = options.clone();
        page_options.after = Some(pagination.end_cursor.clone());

        let (nodes, page) = list_page::<E, C>(client, custom_attributes, &page_options).await?;
        pages += 1;

        if aggregate.is_none() {
            aggregate = Some(PageInfo {
                start_cursor: page.start_cursor.clone(),
                has_previous_page: page.has_previous_page,
                ..PageInfo::default()
            });
        }

        entities.extend(nodes);
        info!(
            entity = E::NAME,
            count = entities.len(),
            total = page.global_count,
            "listing all entities"
        );
        pagination = page;
    }

    if let Some(page_info) = page_info {
        let mut aggregate = aggregate.unwrap_or_default();
        aggregate.global_count = pagination.global_count;
        aggregate.end_cursor = pagination.end_cursor;
        aggregate.has_next_page = false;
        *page_info = aggregate;
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn page_info_reads_camel_case_and_tolerates_gaps() {
        let info: PageInfo = serde_json::from_value(json!({
            "startCursor": "a",
            "endCursor": "b",
            "hasNextPage": true,
            "globalCount": 42
        }))
        .unwrap();
        assert_eq!(
            info,
            PageInfo {
                start_cursor: "a".to_string(),
                end_cursor: "b".to_string(),
                has_next_page: true,
                has_previous_page: false,
                global_count: 42,
            }
        );
    }
}

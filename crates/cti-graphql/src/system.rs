//! Platform entities the client itself relies on.

use serde::{Deserialize, Serialize};

use crate::GraphqlObject;
use crate::entity::{Entity, Listable, render_query};

const LIST_USERS_QUERY: &str = "query ListUsers($first: Int, $after: ID, $orderBy: UsersOrdering, $orderMode: OrderingMode, $filters: FilterGroup, $search: String) {
  users(first: $first, after: $after, orderBy: $orderBy, orderMode: $orderMode, filters: $filters, search: $search) {
    edges {
      node {
        {{attributes}}
      }
    }
    pageInfo {
      startCursor
      endCursor
      hasNextPage
      hasPreviousPage
      globalCount
    }
  }
}";

/// Platform user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, GraphqlObject)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn default_properties() -> String {
        "id\nname".to_string()
    }
}

impl Listable for User {
    fn list_query_string(attributes: &str) -> String {
        render_query(LIST_USERS_QUERY, attributes)
    }

    fn list_response_field() -> &'static str {
        "users"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::attributes;

    #[test]
    fn user_selection_matches_default_properties() {
        assert_eq!(attributes::<User>(), User::default_properties());
    }

    #[test]
    fn list_query_embeds_attributes() {
        let query = User::list_query_string("id");
        assert!(query.contains("node {\n        id\n      }"));
        assert!(!query.contains("{{attributes}}"));
    }
}

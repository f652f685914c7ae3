//! Capabilities an entity type can offer to the generic operations.
//!
//! Each capability is independent; an entity implements the subset the
//! platform supports for it. Query templates are plain GraphQL documents
//! with an [`ATTRIBUTES_PLACEHOLDER`] where the selection set is spliced in.

use serde::Serialize;

use crate::error::GraphqlClientError;
use crate::operation::Variables;

/// Marker replaced by the selection set in query templates.
pub const ATTRIBUTES_PLACEHOLDER: &str = "{{attributes}}";

/// Splice a selection set into a query template.
#[must_use]
pub fn render_query(template: &str, attributes: &str) -> String {
    template.replace(ATTRIBUTES_PLACEHOLDER, attributes)
}

/// Common entity description.
pub trait Entity: 'static {
    /// Name used in logs and error context.
    const NAME: &'static str;

    /// Selection used when the caller passes no custom attributes.
    fn default_properties() -> String {
        "id".to_string()
    }
}

/// Entity that can be created (or upserted) on the platform.
pub trait Creatable: Entity {
    /// Creation mutation with `attributes` spliced in.
    fn create_query_string(attributes: &str) -> String;

    /// Response member holding the created entity.
    fn create_response_field() -> &'static str;
}

/// Entity that can be fetched by id.
pub trait Readable: Entity {
    fn read_query_string(attributes: &str) -> String;

    fn read_response_field() -> &'static str;
}

/// Entity that can be listed page by page.
pub trait Listable: Entity {
    fn list_query_string(attributes: &str) -> String;

    /// Response member holding the `{edges, pageInfo}` connection.
    fn list_response_field() -> &'static str;

    /// Entity-specific list variables, overridable by every option layer.
    fn default_list_variables() -> Variables {
        Variables::new()
    }
}

/// Entity that can be deleted by id.
pub trait Deletable: Entity {
    fn delete_query_string() -> String;

    fn delete_response_field() -> &'static str;
}

/// Payload of a creation mutation.
pub trait CreateInput {
    /// Full variable set of the mutation.
    fn into_variables(self) -> Result<Variables, GraphqlClientError>;
}

impl CreateInput for Variables {
    fn into_variables(self) -> Result<Variables, GraphqlClientError> {
        Ok(self)
    }
}

/// Serializable payload sent as the `input` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddInput<T>(pub T);

impl<T: Serialize> CreateInput for AddInput<T> {
    fn into_variables(self) -> Result<Variables, GraphqlClientError> {
        let mut variables = Variables::new();
        variables.insert_serialized("input", &self.0)?;
        Ok(variables)
    }
}

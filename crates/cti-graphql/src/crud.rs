//! Generic entity operations.
//!
//! Every operation compiles the entity's query template, sends it through a
//! [`Transport`] and extracts the entity's response field. Failures are
//! returned immediately with the operation as context; nothing is retried.

use std::any::type_name;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use crate::client::Transport;
use crate::decode::decode_value;
use crate::entity::{CreateInput, Creatable, Deletable, Listable, Readable};
use crate::error::GraphqlClientError;
use crate::list::ListOptions;
use crate::operation::{ResponseData, Variables};
use crate::pagination::{PageInfo, list_all};
use crate::selection::{FieldShape, GraphqlField};

// Nodes are kept exactly as received; only the page information is decoded.
#[derive(Deserialize, Default)]
#[serde(default)]
struct Connection {
    edges: Option<Vec<Edge>>,
    #[serde(rename = "pageInfo")]
    page_info: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Edge {
    node: Option<ResponseData>,
}

impl Connection {
    fn split(self) -> Result<(Vec<ResponseData>, PageInfo), GraphqlClientError> {
        let page_info = match self.page_info {
            Value::Null => PageInfo::default(),
            value => decode_value(value)?,
        };
        let nodes = self
            .edges
            .unwrap_or_default()
            .into_iter()
            .map(|edge| edge.node.unwrap_or_default())
            .collect();
        Ok((nodes, page_info))
    }
}

fn attributes_or_default<'a>(custom_attributes: &'a str, default: &'a str) -> &'a str {
    if custom_attributes.is_empty() {
        default
    } else {
        custom_attributes
    }
}

fn take_field(mut data: ResponseData, field: &str) -> Result<Value, GraphqlClientError> {
    data.remove(field)
        .ok_or_else(|| GraphqlClientError::MissingField {
            field: field.to_string(),
        })
}

fn into_object(value: Value) -> Result<ResponseData, GraphqlClientError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(GraphqlClientError::TypeAssertion {
            value: other.to_string(),
            expected: "map",
        }),
    }
}

fn ensure_struct<T: GraphqlField + ?Sized>() -> Result<(), GraphqlClientError> {
    match T::shape() {
        FieldShape::Object(_) => Ok(()),
        FieldShape::Leaf => Err(GraphqlClientError::NotAStruct {
            received: type_name::<T>(),
        }),
    }
}

fn decode_output<T: DeserializeOwned>(
    data: ResponseData,
    entity: &'static str,
) -> Result<T, GraphqlClientError> {
    decode_value(Value::Object(data))
        .map_err(|err| GraphqlClientError::from(err).in_operation("decode", entity))
}

/// Create (or upsert) an entity and return the selected attributes.
pub async fn create<E, C>(
    client: &C,
    custom_attributes: &str,
    input: impl CreateInput + Send,
) -> Result<ResponseData, GraphqlClientError>
where
    E: Creatable,
    C: Transport + ?Sized,
{
    let default = E::default_properties();
    let query = E::create_query_string(attributes_or_default(custom_attributes, &default));
    let variables = input.into_variables()?;

    info!(entity = E::NAME, "creating entity");
    let data = client
        .query(&query, variables)
        .await
        .map_err(|err| err.in_operation("create", E::NAME))?;

    into_object(take_field(data, E::create_response_field())?)
}

/// Fetch one entity by id.
pub async fn read<E, C>(
    client: &C,
    custom_attributes: &str,
    id: &str,
) -> Result<ResponseData, GraphqlClientError>
where
    E: Readable,
    C: Transport + ?Sized,
{
    let default = E::default_properties();
    let query = E::read_query_string(attributes_or_default(custom_attributes, &default));

    info!(entity = E::NAME, id, "reading entity");
    let data = client
        .query(&query, Variables::new().with("id", id))
        .await
        .map_err(|err| err.in_operation("read", E::NAME))?;

    into_object(take_field(data, E::read_response_field())?)
}

/// List entities.
///
/// Without `get_all` exactly one page is requested. With it, every page is
/// fetched through [`list_all`]. When `page_info` is given, it is
/// overwritten with the page information of the result.
pub async fn list<E, C>(
    client: &C,
    custom_attributes: &str,
    get_all: bool,
    page_info: Option<&mut PageInfo>,
    options: ListOptions,
) -> Result<Vec<ResponseData>, GraphqlClientError>
where
    E: Listable,
    C: Transport + ?Sized,
{
    if get_all {
        return list_all::<E, C>(client, custom_attributes, page_info, options).await;
    }

    let (nodes, page) = list_page::<E, C>(client, custom_attributes, &options).await?;
    if let Some(page_info) = page_info {
        *page_info = page;
    }
    Ok(nodes)
}

/// Request a single page and split it into nodes and page information.
pub(crate) async fn list_page<E, C>(
    client: &C,
    custom_attributes: &str,
    options: &ListOptions,
) -> Result<(Vec<ResponseData>, PageInfo), GraphqlClientError>
where
    E: Listable,
    C: Transport + ?Sized,
{
    let default = E::default_properties();
    let query = E::list_query_string(attributes_or_default(custom_attributes, &default));
    let variables = options.resolve(&client.list_defaults(), E::default_list_variables())?;

    info!(entity = E::NAME, "listing entities");
    let data = client
        .query(&query, variables)
        .await
        .map_err(|err| err.in_operation("list", E::NAME))?;

    let connection: Connection = match take_field(data, E::list_response_field())? {
        Value::Null => Connection::default(),
        value => serde_json::from_value(value)
            .map_err(|err| GraphqlClientError::from(err).in_operation("list", E::NAME))?,
    };

    connection
        .split()
        .map_err(|err| err.in_operation("list", E::NAME))
}

/// Delete an entity and return the id reported by the server.
///
/// Both `{"delete": "<id>"}` and a bare `"<id>"` are accepted.
pub async fn delete<E, C>(client: &C, id: &str) -> Result<String, GraphqlClientError>
where
    E: Deletable,
    C: Transport + ?Sized,
{
    let query = E::delete_query_string();

    info!(entity = E::NAME, id, "deleting entity");
    let data = client
        .query(&query, Variables::new().with("id", id))
        .await
        .map_err(|err| err.in_operation("delete", E::NAME))?;

    deleted_id(take_field(data, E::delete_response_field())?)
}

fn deleted_id(response: Value) -> Result<String, GraphqlClientError> {
    let mismatch = |value: &Value| GraphqlClientError::TypeAssertion {
        value: value.to_string(),
        expected: "string",
    };

    match &response {
        Value::Null => Ok(String::new()),
        Value::Object(map) => match map.get("delete") {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(id)) => Ok(id.clone()),
            Some(_) => Err(mismatch(&response)),
        },
        Value::String(id) => Ok(id.clone()),
        _ => Err(mismatch(&response)),
    }
}

/// [`create`], decoded into `T`.
pub async fn structured_create<E, T, C>(
    client: &C,
    custom_attributes: &str,
    input: impl CreateInput + Send,
) -> Result<T, GraphqlClientError>
where
    E: Creatable,
    T: GraphqlField + DeserializeOwned,
    C: Transport + ?Sized,
{
    ensure_struct::<T>()?;
    let data = create::<E, C>(client, custom_attributes, input).await?;
    decode_output(data, E::NAME)
}

/// [`read`], decoded into `T`.
pub async fn structured_read<E, T, C>(
    client: &C,
    custom_attributes: &str,
    id: &str,
) -> Result<T, GraphqlClientError>
where
    E: Readable,
    T: GraphqlField + DeserializeOwned,
    C: Transport + ?Sized,
{
    ensure_struct::<T>()?;
    let data = read::<E, C>(client, custom_attributes, id).await?;
    decode_output(data, E::NAME)
}

/// [`list`], each node decoded into `T`.
pub async fn structured_list<E, T, C>(
    client: &C,
    custom_attributes: &str,
    get_all: bool,
    page_info: Option<&mut PageInfo>,
    options: ListOptions,
) -> Result<Vec<T>, GraphqlClientError>
where
    E: Listable,
    T: GraphqlField + DeserializeOwned,
    C: Transport + ?Sized,
{
    ensure_struct::<T>()?;
    list::<E, C>(client, custom_attributes, get_all, page_info, options)
        .await?
        .into_iter()
        .map(|node| decode_output(node, E::NAME))
        .collect()
}

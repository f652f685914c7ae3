//! CTI GraphQL - Typed GraphQL client engine for threat intelligence platforms.
//!
//! This crate provides:
//! - Selection sets compiled from annotated Rust types (`#[derive(GraphqlObject)]`).
//! - Decoding of response maps into typed structs, including interface resolution.
//! - Generic create / read / list / delete operations over entity capabilities.
//! - Cursor pagination and the filter expression model.
//! - JSON and multipart file upload transport.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

extern crate self as cti_graphql;

mod client;
mod config;
mod crud;
pub mod decode;
mod entity;
mod error;
mod filter;
mod list;
mod operation;
mod pagination;
mod selection;
mod system;
mod upload;

pub use client::{
    APPLICANT_HEADER, GraphqlClient, GraphqlClientBuilder, GraphqlClientConfig,
    GraphqlClientMetrics, GraphqlClientMetricsSnapshot, QueryOptions, Transport,
};
pub use config::{ClientEnvConfig, ENV_PREFIX};
pub use crud::{
    create, delete, list, read, structured_create, structured_list, structured_read,
};
pub use cti_graphql_derive::GraphqlObject;
pub use decode::{
    DecodeError, GraphqlInterface, Timestamp, decode, decode_interface, decode_value,
};
pub use entity::{
    ATTRIBUTES_PLACEHOLDER, AddInput, CreateInput, Creatable, Deletable, Entity, Listable,
    Readable, render_query,
};
pub use error::{
    GraphqlClientError, GraphqlError, GraphqlErrorData, GraphqlErrorLocation, GraphqlPathSegment,
    HttpErrorInfo,
};
pub use filter::{
    Filter, FilterError, FilterErrors, FilterGroup, FilterMode, FilterOperator, OrderMode,
};
pub use list::{DEFAULT_ORDER_BY, DEFAULT_ORDER_MODE, DEFAULT_PAGE_SIZE, ListDefaults, ListOptions};
pub use operation::{GraphqlRequest, GraphqlResponse, ResponseData, Variable, Variables};
pub use pagination::{PageInfo, PageLimit, list_all};
pub use selection::{
    CompileOptions, DEFAULT_MAX_DEPTH, FieldDescriptor, FieldShape, FieldTag, GraphqlField,
    GraphqlObject, TagDirective, TypeRef, attributes, compile_attributes, format_attributes,
};
pub use system::User;
pub use upload::{File, FileMapping, JSON_CONTENT_TYPE, RequestBody};

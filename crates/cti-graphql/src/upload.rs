//! File uploads following the GraphQL multipart request convention.
//!
//! A request carrying at least one [`File`] variable is sent as
//! `multipart/form-data` with three kinds of parts:
//! - `operations`: the usual JSON body, files replaced by `null`;
//! - `map`: `{"<index>": ["variables.<key>[.<position>]"]}`;
//! - one part per file, named by its index.

use std::fmt;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};

use crate::error::GraphqlClientError;
use crate::operation::{GraphqlRequest, Variable, Variables};

/// Content type of plain GraphQL requests.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A file sent as a query variable.
#[derive(Clone, PartialEq, Eq)]
pub struct File {
    /// File name reported to the server.
    pub name: String,
    /// Raw content.
    pub data: Bytes,
    /// MIME type of the content.
    pub mime: String,
}

impl File {
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Reject files without a name or MIME type.
    pub fn validate(&self) -> Result<(), GraphqlClientError> {
        if self.name.is_empty() {
            return Err(GraphqlClientError::EmptyFileName);
        }
        if self.mime.is_empty() {
            return Err(GraphqlClientError::EmptyMimeType);
        }
        Ok(())
    }

    fn into_part(self) -> Result<Part, GraphqlClientError> {
        let Self { name, data, mime } = self;
        Part::bytes(data.to_vec())
            .file_name(name.clone())
            .mime_str(&mime)
            .map_err(|_| GraphqlClientError::InvalidMimeType { name, mime })
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Files found in a variable set, with their multipart mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMapping {
    /// Files in index order.
    pub files: Vec<File>,
    /// `index -> ["variables.<path>"]`.
    pub map: Map<String, Value>,
}

impl FileMapping {
    /// Scan variables in ascending key order and index every file.
    #[must_use]
    pub fn extract(variables: &Variables) -> Self {
        let mut mapping = Self::default();
        for (key, variable) in variables {
            match variable {
                Variable::File(file) => mapping.push(file, format!("variables.{key}")),
                Variable::Files(files) => {
                    for (position, file) in files.iter().enumerate() {
                        mapping.push(file, format!("variables.{key}.{position}"));
                    }
                }
                Variable::Value(_) => {}
            }
        }
        mapping
    }

    fn push(&mut self, file: &File, path: String) {
        let index = self.files.len();
        self.files.push(file.clone());
        self.map
            .insert(index.to_string(), Value::Array(vec![Value::String(path)]));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json` body.
    Json(Vec<u8>),
    /// `multipart/form-data` parts.
    Multipart {
        /// JSON `operations` part.
        operations: Vec<u8>,
        /// JSON `map` part.
        map: Vec<u8>,
        /// File parts, in index order.
        files: Vec<File>,
    },
}

impl RequestBody {
    /// Encode a query and its variables, choosing multipart when files are present.
    ///
    /// Every file is validated before anything is encoded.
    pub fn build(query: &str, variables: &Variables) -> Result<Self, GraphqlClientError> {
        let mapping = FileMapping::extract(variables);
        for file in &mapping.files {
            file.validate()?;
        }

        let operations = serde_json::to_vec(&GraphqlRequest { query, variables })?;
        if mapping.is_empty() {
            return Ok(Self::Json(operations));
        }

        Ok(Self::Multipart {
            operations,
            map: serde_json::to_vec(&mapping.map)?,
            files: mapping.files,
        })
    }

    /// Number of uploaded files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        match self {
            Self::Json(_) => 0,
            Self::Multipart { files, .. } => files.len(),
        }
    }

    /// Whether the body must be sent as `multipart/form-data`.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }

    /// Attach the body to a request builder. Multipart boundaries are set by reqwest.
    pub(crate) fn attach(
        self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, GraphqlClientError> {
        match self {
            Self::Json(body) => Ok(request
                .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body)),
            Self::Multipart {
                operations,
                map,
                files,
            } => {
                let mut form = Form::new()
                    .part("operations", Part::bytes(operations))
                    .part("map", Part::bytes(map));
                for (index, file) in files.into_iter().enumerate() {
                    form = form.part(index.to_string(), file.into_part()?);
                }
                Ok(request.multipart(form))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn file(name: &str) -> File {
        File::new(name, Bytes::from_static(b"content"), "text/plain")
    }

    #[test]
    fn mapping_follows_key_order() {
        let variables = Variables::new()
            .with("z", file("z.txt"))
            .with("files", vec![file("a.txt"), file("b.txt")])
            .with("id", "1");
        let mapping = FileMapping::extract(&variables);

        let names: Vec<_> = mapping.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "z.txt"]);
        assert_eq!(
            Value::Object(mapping.map),
            json!({
                "0": ["variables.files.0"],
                "1": ["variables.files.1"],
                "2": ["variables.z"],
            })
        );
    }

    #[test]
    fn plain_variables_use_json() {
        let variables = Variables::new().with("id", "1");
        let body = RequestBody::build("query { a }", &variables).unwrap();
        let RequestBody::Json(bytes) = body else {
            panic!("expected JSON body");
        };
        let decoded: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, json!({"query": "query { a }", "variables": {"id": "1"}}));
    }

    #[test]
    fn files_switch_to_multipart() {
        let variables = Variables::new().with("file", file("report.pdf"));
        let body = RequestBody::build("mutation { upload }", &variables).unwrap();
        assert!(body.is_multipart());
        assert_eq!(body.file_count(), 1);
        let RequestBody::Multipart { operations, map, .. } = body else {
            panic!("expected multipart body");
        };
        let operations: Value = serde_json::from_slice(&operations).unwrap();
        assert_eq!(operations["variables"], json!({"file": null}));
        let map: Value = serde_json::from_slice(&map).unwrap();
        assert_eq!(map, json!({"0": ["variables.file"]}));
    }

    #[test]
    fn invalid_files_are_rejected_before_encoding() {
        let unnamed = Variables::new().with("file", File::new("", Bytes::new(), "text/plain"));
        assert!(matches!(
            RequestBody::build("q", &unnamed),
            Err(GraphqlClientError::EmptyFileName)
        ));

        let untyped = Variables::new().with("files", vec![file("a"), File::new("b", Bytes::new(), "")]);
        assert!(matches!(
            RequestBody::build("q", &untyped),
            Err(GraphqlClientError::EmptyMimeType)
        ));
    }

    #[test]
    fn empty_file_lists_stay_json() {
        let variables = Variables::new().with("files", Vec::<File>::new());
        let body = RequestBody::build("q", &variables).unwrap();
        assert!(!body.is_multipart());
    }
}

mod common;

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use cti_graphql::{
    AddInput, Creatable, Deletable, Entity, GraphqlClientError, GraphqlObject, ListDefaults,
    ListOptions, Listable, PageInfo, PageLimit, Readable, ResponseData, Transport, Variables,
    create, delete, list, read, render_query, structured_create, structured_list,
    structured_read,
};

use common::TestContext;

/// In-process transport replaying canned responses and recording requests.
#[derive(Default)]
struct FakeTransport {
    responses: Mutex<VecDeque<Result<Value, GraphqlClientError>>>,
    requests: Mutex<Vec<(String, Value)>>,
    defaults: ListDefaults,
}

impl FakeTransport {
    fn new(responses: impl IntoIterator<Item = Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    fn failing(err: GraphqlClientError) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(err)])),
            ..Self::default()
        }
    }

    fn with_defaults(mut self, defaults: ListDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().clone()
    }

    fn variables(&self, index: usize) -> Value {
        self.requests()[index].1.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn query(
        &self,
        query: &str,
        variables: Variables,
    ) -> Result<ResponseData, GraphqlClientError> {
        let variables = serde_json::to_value(&variables).expect("serializable variables");
        self.requests.lock().push((query.to_string(), variables));
        match self.responses.lock().pop_front() {
            Some(Ok(Value::Object(data))) => Ok(data),
            Some(Ok(other)) => panic!("canned response must be an object: {other}"),
            Some(Err(err)) => Err(err),
            None => panic!("unexpected request"),
        }
    }

    fn list_defaults(&self) -> ListDefaults {
        self.defaults.clone()
    }
}

struct ReportEntity;

impl Entity for ReportEntity {
    const NAME: &'static str = "Report";

    fn default_properties() -> String {
        "id\nname".to_string()
    }
}

impl Creatable for ReportEntity {
    fn create_query_string(attributes: &str) -> String {
        render_query(
            "mutation ($input: ReportAddInput!) { reportAdd(input: $input) { {{attributes}} } }",
            attributes,
        )
    }

    fn create_response_field() -> &'static str {
        "reportAdd"
    }
}

impl Readable for ReportEntity {
    fn read_query_string(attributes: &str) -> String {
        render_query(
            "query ($id: String!) { report(id: $id) { {{attributes}} } }",
            attributes,
        )
    }

    fn read_response_field() -> &'static str {
        "report"
    }
}

impl Listable for ReportEntity {
    fn list_query_string(attributes: &str) -> String {
        render_query(
            "query ($first: Int, $after: ID) { reports(first: $first, after: $after) { edges { node { {{attributes}} } } pageInfo { startCursor endCursor hasNextPage hasPreviousPage globalCount } } }",
            attributes,
        )
    }

    fn list_response_field() -> &'static str {
        "reports"
    }

    fn default_list_variables() -> Variables {
        Variables::new()
            .with("dynamicFrom", Value::Null)
            .with("dynamicTo", Value::Null)
    }
}

impl Deletable for ReportEntity {
    fn delete_query_string() -> String {
        "mutation ($id: ID!) { reportEdit(id: $id) { delete } }".to_string()
    }

    fn delete_response_field() -> &'static str {
        "reportEdit"
    }
}

#[derive(Debug, Default, PartialEq, Deserialize, GraphqlObject)]
#[serde(default)]
struct Report {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct ReportInput {
    name: &'static str,
}

fn page(ids: &[&str], start: &str, end: &str, has_next: bool, total: u64) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| json!({"node": {"id": id, "name": format!("report {id}")}}))
        .collect();
    json!({"reports": {
        "edges": edges,
        "pageInfo": {
            "startCursor": start,
            "endCursor": end,
            "hasNextPage": has_next,
            "hasPreviousPage": !start.is_empty(),
            "globalCount": total
        }
    }})
}

#[tokio::test]
async fn create_wraps_input_and_uses_default_properties() {
    let mut ctx = TestContext::new("create_wraps_input_and_uses_default_properties", "crud");
    let transport = FakeTransport::new([json!({"reportAdd": {"id": "report--1", "name": "APT"}})]);

    let created = create::<ReportEntity, _>(&transport, "", AddInput(ReportInput { name: "APT" }))
        .await
        .expect("create");

    let requests = transport.requests();
    ctx.assert_true(requests[0].0.contains("reportAdd(input: $input) { id\nname }"), "default selection");
    ctx.assert_eq(requests[0].1.clone(), json!({"input": {"name": "APT"}}), "input variables");
    ctx.assert_eq(created.get("id").cloned(), Some(json!("report--1")), "created id");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn missing_response_field_is_reported() {
    let mut ctx = TestContext::new("missing_response_field_is_reported", "crud");
    let transport = FakeTransport::new([json!({"somethingElse": {}})]);

    let err = create::<ReportEntity, _>(&transport, "id", Variables::new())
        .await
        .unwrap_err();
    ctx.assert_eq(
        err.to_string(),
        "unable to find field 'reportAdd' in map".to_string(),
        "missing field message",
    );
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn read_sends_id_and_tolerates_null() {
    let mut ctx = TestContext::new("read_sends_id_and_tolerates_null", "crud");
    let transport = FakeTransport::new([json!({"report": null}), json!({"report": {"id": "report--2", "name": "Lazarus"}})]);

    let missing = read::<ReportEntity, _>(&transport, "id", "report--404")
        .await
        .expect("read");
    ctx.assert_true(missing.is_empty(), "null entity is an empty map");
    ctx.assert_eq(transport.variables(0), json!({"id": "report--404"}), "id variable");

    let report: Report = structured_read::<ReportEntity, Report, _>(&transport, "", "report--2")
        .await
        .expect("structured read");
    ctx.assert_eq(
        report,
        Report {
            id: "report--2".to_string(),
            name: "Lazarus".to_string(),
        },
        "decoded report",
    );
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn transport_failures_carry_operation_context() {
    let mut ctx = TestContext::new("transport_failures_carry_operation_context", "crud");
    let transport = FakeTransport::failing(GraphqlClientError::Protocol {
        message: "connection reset".to_string(),
    });

    let err = read::<ReportEntity, _>(&transport, "", "report--1")
        .await
        .unwrap_err();
    ctx.assert_eq(
        err.to_string(),
        "unable to read Report: GraphQL protocol error: connection reset".to_string(),
        "wrapped message",
    );
    ctx.assert_true(
        matches!(err.root(), GraphqlClientError::Protocol { .. }),
        "root error preserved",
    );
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn structured_operations_reject_scalar_outputs_before_io() {
    let mut ctx = TestContext::new("structured_operations_reject_scalar_outputs_before_io", "crud");
    let transport = FakeTransport::new([]);

    let err = structured_create::<ReportEntity, String, _>(&transport, "", Variables::new())
        .await
        .unwrap_err();
    ctx.assert_true(
        matches!(err, GraphqlClientError::NotAStruct { .. }),
        "scalar output rejected",
    );
    ctx.assert_true(transport.requests().is_empty(), "no request sent");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn single_page_list_resolves_variables_and_page_info() {
    let mut ctx = TestContext::new("single_page_list_resolves_variables_and_page_info", "crud");
    let transport = FakeTransport::new([page(&["report--1"], "c0", "c1", true, 3)]).with_defaults(
        ListDefaults {
            page_size: Some(50),
            ..ListDefaults::default()
        },
    );

    let mut page_info = PageInfo::default();
    let reports = list::<ReportEntity, _>(
        &transport,
        "",
        false,
        Some(&mut page_info),
        ListOptions::new().with_after("c0"),
    )
    .await
    .expect("list");

    ctx.assert_eq(reports.len(), 1, "one node");
    ctx.assert_eq(
        transport.variables(0),
        json!({
            "after": "c0",
            "dynamicFrom": null,
            "dynamicTo": null,
            "filters": null,
            "first": 50,
            "orderBy": "created_at",
            "orderMode": "asc"
        }),
        "resolved variables",
    );
    ctx.assert_eq(page_info.end_cursor, "c1".to_string(), "end cursor");
    ctx.assert_true(page_info.has_next_page, "more pages reported");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn list_all_walks_every_page() {
    let mut ctx = TestContext::new("list_all_walks_every_page", "pagination");
    let transport = FakeTransport::new([
        page(&["report--1", "report--2"], "s1", "c1", true, 5),
        page(&["report--3", "report--4"], "s2", "c2", true, 5),
        page(&["report--5"], "s3", "c3", false, 5),
    ]);

    let mut page_info = PageInfo::default();
    let reports: Vec<Report> = structured_list::<ReportEntity, Report, _>(
        &transport,
        "",
        true,
        Some(&mut page_info),
        ListOptions::new().with_after("ignored"),
    )
    .await
    .expect("list all");

    ctx.assert_eq(reports.len(), 5, "all nodes");
    ctx.assert_eq(reports[4].id.clone(), "report--5".to_string(), "node order");

    let cursors: Vec<Value> = (0..3)
        .map(|index| transport.variables(index).get("after").cloned().unwrap_or(Value::Null))
        .collect();
    ctx.assert_eq(cursors, vec![Value::Null, json!("c1"), json!("c2")], "cursor chain");

    ctx.assert_eq(
        page_info,
        PageInfo {
            start_cursor: "s1".to_string(),
            end_cursor: "c3".to_string(),
            has_next_page: false,
            has_previous_page: true,
            global_count: 5,
        },
        "aggregate page info",
    );
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn list_all_accumulates_fifty_nodes_over_five_pages() {
    let mut ctx = TestContext::new("list_all_accumulates_fifty_nodes_over_five_pages", "pagination");
    let ids: Vec<String> = (1..=50).map(|index| format!("report--{index}")).collect();
    let pages = ids.chunks(10).enumerate().map(|(index, chunk)| {
        let chunk: Vec<&str> = chunk.iter().map(String::as_str).collect();
        let last = index == 4;
        page(
            &chunk,
            &format!("s{index}"),
            &format!("c{index}"),
            !last,
            if last { 50 } else { 49 },
        )
    });
    let transport = FakeTransport::new(pages.collect::<Vec<_>>());

    let mut page_info = PageInfo::default();
    let reports = list::<ReportEntity, _>(&transport, "", true, Some(&mut page_info), ListOptions::new())
        .await
        .expect("list all");

    ctx.assert_eq(reports.len(), 50, "every node");
    ctx.assert_eq(transport.requests().len(), 5, "one request per page");
    ctx.assert_eq(
        reports.last().and_then(|node| node.get("id")).cloned(),
        Some(json!("report--50")),
        "last node",
    );
    ctx.assert_eq(page_info.global_count, 50, "last page's global count");
    ctx.assert_eq(page_info.end_cursor, "c4".to_string(), "last page's end cursor");
    ctx.assert_eq(page_info.start_cursor, "s0".to_string(), "first page's start cursor");
    ctx.assert_true(!page_info.has_next_page, "done");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn raw_list_nodes_keep_null_members() {
    let mut ctx = TestContext::new("raw_list_nodes_keep_null_members", "crud");
    let transport = FakeTransport::new([json!({"reports": {
        "edges": [{"node": {"id": "report--1", "description": null}}],
        "pageInfo": {
            "startCursor": null,
            "endCursor": "c1",
            "hasNextPage": false,
            "hasPreviousPage": false,
            "globalCount": 1
        }
    }})]);

    let mut page_info = PageInfo::default();
    let reports = list::<ReportEntity, _>(&transport, "", false, Some(&mut page_info), ListOptions::new())
        .await
        .expect("list");

    ctx.assert_eq(
        Value::Object(reports[0].clone()),
        json!({"id": "report--1", "description": null}),
        "node unchanged",
    );
    ctx.assert_eq(page_info.start_cursor, String::new(), "null cursor defaults");
    ctx.assert_eq(page_info.end_cursor, "c1".to_string(), "end cursor");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn null_connection_is_an_empty_page() {
    let mut ctx = TestContext::new("null_connection_is_an_empty_page", "pagination");
    let transport = FakeTransport::new([json!({"reports": null})]);

    let mut page_info = PageInfo::default();
    let reports = list::<ReportEntity, _>(&transport, "", true, Some(&mut page_info), ListOptions::new())
        .await
        .expect("list all");

    ctx.assert_true(reports.is_empty(), "no nodes");
    ctx.assert_eq(transport.requests().len(), 1, "single request");
    ctx.assert_true(!page_info.has_next_page, "done");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn page_limit_stops_endless_pagination() {
    let mut ctx = TestContext::new("page_limit_stops_endless_pagination", "pagination");
    let transport = FakeTransport::new([
        page(&["report--1"], "s1", "c1", true, 100),
        page(&["report--2"], "s2", "c2", true, 100),
    ]);

    let err = list::<ReportEntity, _>(
        &transport,
        "",
        true,
        None,
        ListOptions::new().with_page_limit(PageLimit::new(2)),
    )
    .await
    .unwrap_err();

    ctx.assert_true(
        matches!(err, GraphqlClientError::PaginationLimitExceeded { pages: 2 }),
        "limit reported",
    );
    ctx.assert_eq(transport.requests().len(), 2, "no request past the limit");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn invalid_filters_fail_before_io() {
    let mut ctx = TestContext::new("invalid_filters_fail_before_io", "crud");
    let transport = FakeTransport::new([]);

    let filters = cti_graphql::FilterGroup::and(vec![cti_graphql::Filter::default()]);
    let err = list::<ReportEntity, _>(&transport, "", false, None, ListOptions::new().with_filters(filters))
        .await
        .unwrap_err();

    ctx.assert_true(
        matches!(err, GraphqlClientError::InvalidFilter(_)),
        "invalid filter reported",
    );
    ctx.assert_true(transport.requests().is_empty(), "no request sent");
    ctx.finalize("pass", None);
}

#[tokio::test]
async fn delete_accepts_nested_and_bare_ids() {
    let mut ctx = TestContext::new("delete_accepts_nested_and_bare_ids", "crud");
    let transport = FakeTransport::new([
        json!({"reportEdit": {"delete": "report--1"}}),
        json!({"reportEdit": "report--2"}),
        json!({"reportEdit": 7}),
    ]);

    let first = delete::<ReportEntity, _>(&transport, "report--1").await.expect("nested");
    let second = delete::<ReportEntity, _>(&transport, "report--2").await.expect("bare");
    let err = delete::<ReportEntity, _>(&transport, "report--3").await.unwrap_err();

    ctx.assert_eq(first, "report--1".to_string(), "nested shape");
    ctx.assert_eq(second, "report--2".to_string(), "bare shape");
    ctx.assert_eq(transport.variables(1), json!({"id": "report--2"}), "id variable");
    ctx.assert_true(
        matches!(err, GraphqlClientError::TypeAssertion { expected: "string", .. }),
        "other shapes rejected",
    );
    ctx.finalize("pass", None);
}

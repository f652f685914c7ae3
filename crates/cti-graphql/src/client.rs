//! GraphQL HTTP client implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::config::ClientEnvConfig;
use crate::crud::structured_list;
use crate::decode::decode_value;
use crate::error::{GraphqlClientError, HttpErrorInfo};
use crate::filter::{Filter, FilterGroup, OrderMode};
use crate::list::{ListDefaults, ListOptions};
use crate::operation::{GraphqlResponse, ResponseData, Variables};
use crate::pagination::PageLimit;
use crate::system::User;
use crate::upload::RequestBody;

/// Header carrying the id of the user a request is performed on behalf of.
pub const APPLICANT_HEADER: &str = "opencti-applicant-id";

const HEALTH_CHECK_QUERY: &str = "query {about {version}}";

/// Sends GraphQL documents and returns the decoded `data` member.
///
/// [`GraphqlClient`] is the HTTP implementation; the generic entity
/// operations only depend on this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a query. Server-reported errors fail the call and discard data.
    async fn query(
        &self,
        query: &str,
        variables: Variables,
    ) -> Result<ResponseData, GraphqlClientError>;

    /// Configured list defaults.
    fn list_defaults(&self) -> ListDefaults {
        ListDefaults::default()
    }
}

/// GraphQL client metrics.
#[derive(Debug, Default)]
#[allow(clippy::struct_field_names)]
pub struct GraphqlClientMetrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_error: AtomicU64,
}

impl GraphqlClientMetrics {
    /// Snapshot current metrics.
    #[must_use]
    pub fn snapshot(&self) -> GraphqlClientMetricsSnapshot {
        GraphqlClientMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct GraphqlClientMetricsSnapshot {
    /// Total requests.
    pub requests_total: u64,
    /// Successful requests.
    pub requests_success: u64,
    /// Failed requests.
    pub requests_error: u64,
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct GraphqlClientConfig {
    /// Extra headers applied to every request.
    pub headers: HeaderMap,
    /// `User-Agent` header.
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Deadline of the health check run by [`GraphqlClientBuilder::connect`].
    pub health_check_timeout: Duration,
    /// List defaults.
    pub list: ListDefaults,
}

impl Default for GraphqlClientConfig {
    fn default() -> Self {
        Self::from_env_config(&ClientEnvConfig::default())
    }
}

impl GraphqlClientConfig {
    /// Configuration using the given environment layer and nothing else.
    #[must_use]
    pub fn from_env_config(env: &ClientEnvConfig) -> Self {
        Self {
            headers: HeaderMap::new(),
            user_agent: default_user_agent(),
            timeout: env.timeout,
            health_check_timeout: env.health_check_timeout,
            list: ListDefaults {
                page_size: env.page_size,
                order_by: env.order_by.clone(),
                order_mode: env.order_mode,
                page_limit: None,
            },
        }
    }
}

fn default_user_agent() -> String {
    format!("cti-graphql/{}", env!("CARGO_PKG_VERSION"))
}

/// GraphQL client builder.
///
/// Options set on the builder take precedence over the environment layer,
/// whatever order they are applied in.
#[derive(Debug, Clone)]
pub struct GraphqlClientBuilder {
    url: String,
    token: String,
    env: ClientEnvConfig,
    headers: HeaderMap,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    health_check_timeout: Option<Duration>,
    page_size: Option<u32>,
    order_by: Option<String>,
    order_mode: Option<OrderMode>,
    page_limit: Option<PageLimit>,
}

impl GraphqlClientBuilder {
    /// Create a builder using built-in defaults only.
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            env: ClientEnvConfig::default(),
            headers: HeaderMap::new(),
            user_agent: None,
            timeout: None,
            health_check_timeout: None,
            page_size: None,
            order_by: None,
            order_mode: None,
            page_limit: None,
        }
    }

    /// Create a builder whose defaults are read from the process environment.
    pub fn from_env(url: impl Into<String>, token: impl Into<String>) -> Result<Self, GraphqlClientError> {
        Ok(Self::new(url, token).with_env_config(ClientEnvConfig::from_env()?))
    }

    /// Replace the environment layer.
    #[must_use]
    pub fn with_env_config(mut self, env: ClientEnvConfig) -> Self {
        self.env = env;
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the health check deadline.
    #[must_use]
    pub const fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = Some(timeout);
        self
    }

    /// Default page size of list queries.
    #[must_use]
    pub const fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Default ordering field of list queries.
    #[must_use]
    pub fn with_default_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Default ordering mode of list queries.
    #[must_use]
    pub const fn with_default_order_mode(mut self, order_mode: OrderMode) -> Self {
        self.order_mode = Some(order_mode);
        self
    }

    /// Cap the number of pages a fetch-all listing may request.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: PageLimit) -> Self {
        self.page_limit = Some(limit);
        self
    }

    fn config(&self) -> GraphqlClientConfig {
        let mut config = GraphqlClientConfig::from_env_config(&self.env);
        config.headers.clone_from(&self.headers);
        if let Some(user_agent) = &self.user_agent {
            config.user_agent.clone_from(user_agent);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(timeout) = self.health_check_timeout {
            config.health_check_timeout = timeout;
        }
        if self.page_size.is_some() {
            config.list.page_size = self.page_size;
        }
        if self.order_by.is_some() {
            config.list.order_by.clone_from(&self.order_by);
        }
        if self.order_mode.is_some() {
            config.list.order_mode = self.order_mode;
        }
        config.list.page_limit = self.page_limit;
        config
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphqlClient, GraphqlClientError> {
        if self.url.is_empty() {
            return Err(GraphqlClientError::MissingUrl);
        }
        if self.token.is_empty() {
            return Err(GraphqlClientError::MissingToken);
        }
        let config = self.config();
        GraphqlClient::with_config(&self.url, &self.token, config)
    }

    /// Build the client and run a health check within the health check deadline.
    pub async fn connect(self) -> Result<GraphqlClient, GraphqlClientError> {
        let client = self.build()?;
        let deadline = client.config.health_check_timeout;
        match tokio::time::timeout(deadline, client.health_check()).await {
            Ok(result) => result.map(|_| client),
            Err(_) => {
                error!(timeout_ms = deadline.as_millis(), "health check timed out");
                Err(GraphqlClientError::Http(HttpErrorInfo {
                    message: format!("health check timed out after {deadline:?}"),
                    status_code: None,
                    is_timeout: true,
                    is_connect: false,
                    is_request: false,
                })
                .in_operation("check", "server health"))
            }
        }
    }
}

/// Explicit per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Perform this call on behalf of the given user id. Leaves any pending
    /// impersonation untouched.
    pub impersonate: Option<String>,
    /// Override the client timeout for this call.
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    #[must_use]
    pub fn impersonating(user_id: impl Into<String>) -> Self {
        Self {
            impersonate: Some(user_id.into()),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// GraphQL client.
///
/// Clones share the connection pool, the metrics and the pending
/// impersonation.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    endpoint: Url,
    http: reqwest::Client,
    config: Arc<GraphqlClientConfig>,
    impersonating: Arc<Mutex<Option<String>>>,
    metrics: Arc<GraphqlClientMetrics>,
}

impl GraphqlClient {
    /// Create a client with default configuration.
    pub fn new(url: &str, token: &str) -> Result<Self, GraphqlClientError> {
        GraphqlClientBuilder::new(url, token).build()
    }

    /// Create a client with custom configuration. Requests go to `<url>/graphql`.
    pub fn with_config(
        url: &str,
        token: &str,
        config: GraphqlClientConfig,
    ) -> Result<Self, GraphqlClientError> {
        let endpoint = endpoint_url(url)?;

        let mut headers = config.headers.clone();
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GraphqlClientError::InvalidHeader { name: "authorization" })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            endpoint,
            http,
            config: Arc::new(config),
            impersonating: Arc::new(Mutex::new(None)),
            metrics: Arc::new(GraphqlClientMetrics::default()),
        })
    }

    /// Full GraphQL endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &GraphqlClientConfig {
        &self.config
    }

    /// Return client metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> GraphqlClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Execute a query with default options.
    pub async fn query(
        &self,
        query: &str,
        variables: Variables,
    ) -> Result<ResponseData, GraphqlClientError> {
        self.query_with(query, variables, QueryOptions::default())
            .await
    }

    /// Execute a query.
    ///
    /// The body is JSON unless a variable holds a file, in which case it is
    /// sent as `multipart/form-data`. A pending impersonation is consumed by
    /// this call unless `options` names its own applicant.
    pub async fn query_with(
        &self,
        query: &str,
        variables: Variables,
        options: QueryOptions,
    ) -> Result<ResponseData, GraphqlClientError> {
        let body = RequestBody::build(query, &variables)?;
        self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

        let applicant = options
            .impersonate
            .or_else(|| self.impersonating.lock().take());

        debug!(
            endpoint = %self.endpoint,
            multipart = body.is_multipart(),
            files = body.file_count(),
            impersonating = applicant.is_some(),
            "sending GraphQL request"
        );

        let result = self.send(body, applicant, options.timeout).await;
        if result.is_ok() {
            self.metrics
                .requests_success
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.requests_error.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn send(
        &self,
        body: RequestBody,
        applicant: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<ResponseData, GraphqlClientError> {
        let mut request = self.http.post(self.endpoint.clone());
        if let Some(applicant) = applicant {
            let value = HeaderValue::from_str(&applicant)
                .map_err(|_| GraphqlClientError::InvalidHeader { name: APPLICANT_HEADER })?;
            request = request.header(APPLICANT_HEADER, value);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let request = body.attach(request)?;

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status != StatusCode::OK {
            return Err(GraphqlClientError::HttpStatus {
                status,
                body: truncate_body(&bytes),
            });
        }

        let response: GraphqlResponse<Value> = serde_json::from_slice(&bytes)?;
        match response.into_result()? {
            Some(Value::Object(data)) => Ok(data),
            None => Ok(ResponseData::new()),
            Some(other) => Err(GraphqlClientError::Protocol {
                message: format!("response data is not an object: {other}"),
            }),
        }
    }

    /// Query the platform version.
    pub async fn health_check(&self) -> Result<String, GraphqlClientError> {
        #[derive(Deserialize)]
        struct HealthCheckData {
            about: About,
        }

        #[derive(Deserialize)]
        struct About {
            version: String,
        }

        let result = async {
            let data = self.query(HEALTH_CHECK_QUERY, Variables::new()).await?;
            let parsed: HealthCheckData = decode_value(Value::Object(data))?;
            Ok::<_, GraphqlClientError>(parsed.about.version)
        }
        .await;

        match result {
            Ok(version) => {
                info!(version = %version, "health check succeeded");
                Ok(version)
            }
            Err(err) => {
                error!(error = %err, "health check failed");
                Err(err.in_operation("check", "server health"))
            }
        }
    }

    /// Perform the next request on behalf of `username`.
    ///
    /// The user id is resolved with a filtered listing of users; anything
    /// other than exactly one match is [`GraphqlClientError::UserNotFound`].
    pub async fn impersonate(&self, username: &str) -> Result<(), GraphqlClientError> {
        let options = ListOptions::new()
            .with_filters(FilterGroup::and(vec![Filter::eq("name", username)]));
        let mut users = structured_list::<User, User, _>(self, "id\nname", true, None, options).await?;

        if users.len() != 1 {
            return Err(GraphqlClientError::UserNotFound {
                username: username.to_string(),
            });
        }
        let user = users.remove(0);
        info!(user_id = %user.id, "impersonating user for the next request");
        *self.impersonating.lock() = Some(user.id);
        Ok(())
    }

    /// Perform the next request on behalf of the given user id.
    pub fn impersonate_id(&self, user_id: impl Into<String>) {
        *self.impersonating.lock() = Some(user_id.into());
    }

    /// Pending impersonation target, if any.
    #[must_use]
    pub fn pending_impersonation(&self) -> Option<String> {
        self.impersonating.lock().clone()
    }
}

#[async_trait]
impl Transport for GraphqlClient {
    async fn query(
        &self,
        query: &str,
        variables: Variables,
    ) -> Result<ResponseData, GraphqlClientError> {
        Self::query(self, query, variables).await
    }

    fn list_defaults(&self) -> ListDefaults {
        self.config.list.clone()
    }
}

fn endpoint_url(url: &str) -> Result<Url, GraphqlClientError> {
    let raw = format!("{}/graphql", url.trim_end_matches('/'));
    Url::parse(&raw).map_err(|err| GraphqlClientError::InvalidUrl {
        url: raw,
        message: err.to_string(),
    })
}

fn truncate_body(bytes: &[u8]) -> String {
    const MAX_LEN: usize = 4096;
    let mut body = String::from_utf8_lossy(bytes).into_owned();
    if body.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

//! Authenticated HTTP transport with tracing instrumentation.
//!
//! [`Transport`] owns the cookie-backed session against one Acumatica
//! instance. Every generated service method and inquiry goes through
//! [`Transport::send`], which handles login bookkeeping, the single
//! re-login retry on an idle logout, and error detail extraction.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{Span, debug, info, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{AcumaticaError, ClientError, ValidationError};
use crate::method::HttpMethod;
use crate::schema::SchemaDocument;

/// Login payload for `/entity/auth/login`.
#[derive(Clone, Serialize)]
struct Credentials {
    #[serde(rename = "name")]
    username: String,
    password: String,
    tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
}

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Bytes(Bytes),
}

/// A fully resolved request ready for [`Transport::send`].
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    url: Url,
    query: Vec<(String, String)>,
    body: RequestBody,
    headers: Vec<(&'static str, String)>,
}

impl Request {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn bytes(mut self, body: Bytes) -> Self {
        self.body = RequestBody::Bytes(body);
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}

/// Session-holding HTTP client for one Acumatica instance.
#[derive(Debug)]
pub struct Transport {
    client: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    persistent_login: bool,
    retry_on_idle_logout: bool,
    logged_in: Mutex<bool>,
    /// Held across login, dispatch and logout when sessions are per request.
    session_gate: Mutex<()>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Builds the transport from client configuration. No request is sent.
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credentials: Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
                tenant: config.tenant.clone(),
                branch: config.branch.clone(),
                locale: config.locale.clone(),
            },
            persistent_login: config.persistent_login,
            retry_on_idle_logout: config.retry_on_idle_logout,
            logged_in: Mutex::new(false),
            session_gate: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tenant(&self) -> &str {
        &self.credentials.tenant
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{base}/entity/{endpoint}/{version}/{entity}`
    pub fn entity_url(&self, endpoint: &str, version: &str, entity: &str) -> Result<Url, ClientError> {
        self.url(&["entity", endpoint, version, entity])
    }

    /// `{base}/t/{tenant}/api/odata/gi/{name}`
    pub fn inquiry_url(&self, name: &str) -> Result<Url, ClientError> {
        self.url(&["t", &self.credentials.tenant, "api", "odata", "gi", name])
    }

    /// Whether a session is currently open.
    pub async fn is_logged_in(&self) -> bool {
        *self.logged_in.lock().await
    }

    /// Opens a session. Does nothing when one is already open.
    ///
    /// ## Errors
    ///
    /// Returns [`ClientError::LoginFailed`] when the server rejects the
    /// credentials.
    #[instrument(skip(self), fields(tenant = %self.credentials.tenant))]
    pub async fn login(&self) -> Result<(), ClientError> {
        let mut logged_in = self.logged_in.lock().await;
        if *logged_in {
            return Ok(());
        }

        let url = self.url(&["entity", "auth", "login"])?;
        let response = self.client.post(url).json(&self.credentials).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ClientError::LoginFailed {
                status: status.as_u16(),
                message: error_detail(status, &body),
            });
        }

        *logged_in = true;
        info!("logged in");
        Ok(())
    }

    /// Closes the session. Does nothing when none is open.
    #[instrument(skip(self), fields(tenant = %self.credentials.tenant))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let mut logged_in = self.logged_in.lock().await;
        if !*logged_in {
            return Ok(());
        }

        let url = self.url(&["entity", "auth", "logout"])?;
        let response = self.client.post(url).send().await;
        *logged_in = false;

        let response = response?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message: error_detail(status, &body),
            });
        }
        info!("logged out");
        Ok(())
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// Returns `None` for 204 responses and empty bodies.
    pub async fn send(&self, request: &Request) -> Result<Option<Value>, AcumaticaError> {
        let (status, body) = self.execute(request).await?;
        if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value = serde_json::from_slice(&body).map_err(ValidationError::from)?;
        Ok(Some(value))
    }

    /// Sends a request and returns the raw body.
    pub async fn send_raw(&self, request: &Request) -> Result<Bytes, AcumaticaError> {
        let (_, body) = self.execute(request).await?;
        Ok(body)
    }

    /// Lists the contract endpoints the server exposes, mapped to the
    /// highest advertised version of each.
    #[instrument(skip(self))]
    pub async fn endpoints(&self) -> Result<BTreeMap<String, String>, AcumaticaError> {
        let url = self.url(&["entity"])?;
        let body = self
            .send(&Request::new(HttpMethod::Get, url))
            .await?
            .ok_or_else(|| ValidationError::UnexpectedShape("empty endpoint listing".into()))?;
        let listing = body
            .get("endpoints")
            .and_then(Value::as_array)
            .ok_or_else(|| ValidationError::UnexpectedShape("missing 'endpoints' array".into()))?;

        let mut latest: BTreeMap<String, String> = BTreeMap::new();
        for entry in listing {
            let (Some(name), Some(version)) = (
                entry.get("name").and_then(Value::as_str),
                entry.get("version").and_then(Value::as_str),
            ) else {
                continue;
            };
            match latest.get_mut(name) {
                Some(current) if compare_versions(version, current) == Ordering::Greater => {
                    *current = version.to_string();
                }
                Some(_) => {}
                None => {
                    latest.insert(name.to_string(), version.to_string());
                }
            }
        }
        debug!(count = latest.len(), "discovered endpoints");
        Ok(latest)
    }

    /// Downloads the OpenAPI document for one endpoint version.
    #[instrument(skip(self))]
    pub async fn fetch_schema(
        &self,
        endpoint: &str,
        version: &str,
    ) -> Result<SchemaDocument, AcumaticaError> {
        let url = self.url(&["entity", endpoint, version, "swagger.json"])?;
        let body = self.send_raw(&Request::new(HttpMethod::Get, url)).await?;
        Ok(SchemaDocument::from_slice(&body)?)
    }

    /// Downloads the OData metadata document describing generic inquiries.
    #[instrument(skip(self))]
    pub async fn fetch_inquiry_metadata(&self) -> Result<String, AcumaticaError> {
        let url = self.inquiry_url("$metadata")?;
        let body = self.send_raw(&Request::new(HttpMethod::Get, url)).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    #[instrument(
        name = "acumatica_request",
        skip(self, request),
        fields(
            http.method = %request.method,
            http.url = %request.url,
            http.status_code = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
        )
    )]
    async fn execute(&self, request: &Request) -> Result<(StatusCode, Bytes), ClientError> {
        // One shared cookie session: a logout must not close a request in flight.
        let _session = match self.persistent_login {
            true => None,
            false => {
                let guard = self.session_gate.lock().await;
                self.login().await?;
                Some(guard)
            }
        };

        let mut response = self.dispatch(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED
            && self.persistent_login
            && self.retry_on_idle_logout
        {
            debug!("session expired, logging in again");
            *self.logged_in.lock().await = false;
            self.login().await?;
            response = self.dispatch(request).await?;
        }

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());
        let body = response.bytes().await?;

        if !self.persistent_login {
            if let Err(e) = self.logout().await {
                warn!(error = %e, "logout after request failed");
            }
        }

        if !status.is_success() {
            let otel_status = if status.is_server_error() { "ERROR" } else { "UNSET" };
            Span::current().record("otel.status_code", otel_status);
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message: error_detail(status, &body),
            });
        }

        Span::current().record("otel.status_code", "OK");
        Ok((status, body))
    }

    async fn dispatch(&self, request: &Request) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), request.url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
            builder = builder.header(header_name, value);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Bytes(body) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(body.clone()),
        };
        Ok(builder.send().await?)
    }
}

/// Orders dotted version strings numerically, segment by segment.
///
/// Non-numeric segments compare as text.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Picks the most useful message out of an error response body.
fn error_detail(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            let message = ["exceptionMessage", "message"].iter().find_map(|key| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            });
            match message {
                Some(message) => message,
                None => Value::Object(map).to_string(),
            }
        }
        Ok(other) => other.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> ClientConfig {
        ClientConfig::builder(url, "admin", "secret", "Company")
            .branch("HQ")
            .build()
            .unwrap()
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/entity/auth/login"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
    }

    #[test]
    fn test_compare_versions_numeric() {
        assert_eq!(compare_versions("24.200.001", "23.200.001"), Ordering::Greater);
        assert_eq!(compare_versions("9.1", "10.0"), Ordering::Less);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Less);
        assert_eq!(compare_versions("1.02", "1.2"), Ordering::Equal);
    }

    #[test]
    fn test_error_detail_preference() {
        let status = StatusCode::BAD_REQUEST;
        let both = br#"{"message":"outer","exceptionMessage":"inner"}"#;
        assert_eq!(error_detail(status, both), "inner");
        assert_eq!(error_detail(status, br#"{"message":"outer"}"#), "outer");
        assert_eq!(error_detail(status, br#"{"code":7}"#), r#"{"code":7}"#);
        assert_eq!(error_detail(status, b"plain failure"), "plain failure");
        assert_eq!(error_detail(status, b""), "400 Bad Request");
    }

    #[test]
    fn test_url_building_encodes_segments() {
        let transport = Transport::new(&config("https://erp.example.com/AcumaticaERP")).unwrap();
        let url = transport.inquiry_url("IN-Inventory Summary").unwrap();
        assert_eq!(
            url.as_str(),
            "https://erp.example.com/AcumaticaERP/t/Company/api/odata/gi/IN-Inventory%20Summary"
        );
        let url = transport.entity_url("Default", "24.200.001", "Contact").unwrap();
        assert_eq!(
            url.as_str(),
            "https://erp.example.com/AcumaticaERP/entity/Default/24.200.001/Contact"
        );
    }

    #[tokio::test]
    async fn test_login_payload_and_idempotence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/login"))
            .and(body_json(json!({
                "name": "admin", "password": "secret", "tenant": "Company", "branch": "HQ"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        transport.login().await.unwrap();
        transport.login().await.unwrap();
        assert!(transport.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        let err = transport.login().await.unwrap_err();
        assert!(matches!(err, ClientError::LoginFailed { status: 401, .. }));
        assert!(err.to_string().contains("Invalid credentials"));
        assert!(!transport.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_send_no_content_and_query() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/entity/Default/1.0/Contact"))
            .and(query_param("$top", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "1"}])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/entity/Default/1.0/Contact/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        transport.login().await.unwrap();

        let url = transport.entity_url("Default", "1.0", "Contact").unwrap();
        let list = transport
            .send(&Request::new(HttpMethod::Get, url).query(vec![("$top".into(), "5".into())]))
            .await
            .unwrap();
        assert_eq!(list, Some(json!([{"id": "1"}])));

        let url = transport.url(&["entity", "Default", "1.0", "Contact", "1"]).unwrap();
        let deleted = transport.send(&Request::new(HttpMethod::Delete, url)).await.unwrap();
        assert_eq!(deleted, None);
    }

    #[tokio::test]
    async fn test_error_status_carries_detail() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/entity/Default/1.0/Contact"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"exceptionMessage": "Database unavailable"})),
            )
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        let url = transport.entity_url("Default", "1.0", "Contact").unwrap();
        let err = transport
            .send(&Request::new(HttpMethod::Get, url))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "Acumatica API error 500: Database unavailable");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_idle_logout_relogs_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/login"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/entity/Default/1.0/Contact"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/entity/Default/1.0/Contact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        transport.login().await.unwrap();
        let url = transport.entity_url("Default", "1.0", "Contact").unwrap();
        let body = transport.send(&Request::new(HttpMethod::Get, url)).await.unwrap();
        assert_eq!(body, Some(json!([])));
        assert!(logs_contain("session expired, logging in again"));
    }

    #[tokio::test]
    async fn test_non_persistent_session_wraps_each_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/login"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/entity/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/entity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"endpoints": []})))
            .mount(&server)
            .await;

        let config = ClientConfig::builder(server.uri(), "admin", "secret", "Company")
            .persistent_login(false)
            .build()
            .unwrap();
        let transport = Transport::new(&config).unwrap();
        transport.endpoints().await.unwrap();
        transport.endpoints().await.unwrap();
        assert!(!transport.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_concurrent_non_persistent_requests_do_not_share_a_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/entity/Default/1.0/Contact"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_millis(150)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let config = ClientConfig::builder(server.uri(), "admin", "secret", "Company")
            .persistent_login(false)
            .build()
            .unwrap();
        let transport = Transport::new(&config).unwrap();
        let url = transport.entity_url("Default", "1.0", "Contact").unwrap();
        let first = Request::new(HttpMethod::Get, url.clone());
        let second = Request::new(HttpMethod::Get, url);
        let (a, b) = tokio::join!(transport.send(&first), transport.send(&second));
        assert_eq!(a.unwrap(), Some(json!([])));
        assert_eq!(b.unwrap(), Some(json!([])));

        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        let session = [
            "/entity/auth/login",
            "/entity/Default/1.0/Contact",
            "/entity/auth/logout",
        ];
        assert_eq!(paths, [session, session].concat());
    }

    #[tokio::test]
    async fn test_endpoints_pick_latest_version() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/entity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"endpoints": [
                {"name": "Default", "version": "23.200.001"},
                {"name": "Default", "version": "24.200.001"},
                {"name": "Default", "version": "9.200.001"},
                {"name": "Manufacturing", "version": "24.200.001"}
            ]})))
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        let endpoints = transport.endpoints().await.unwrap();
        assert_eq!(endpoints["Default"], "24.200.001");
        assert_eq!(endpoints["Manufacturing"], "24.200.001");
    }

    #[tokio::test]
    async fn test_file_body_headers() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("PUT"))
            .and(path("/entity/Default/1.0/Contact/1/files/a.txt"))
            .and(header("content-type", "application/octet-stream"))
            .and(header("PX-CbFileComment", "hello"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(&config(&server.uri())).unwrap();
        let url = transport
            .url(&["entity", "Default", "1.0", "Contact", "1", "files", "a.txt"])
            .unwrap();
        let request = Request::new(HttpMethod::Put, url)
            .bytes(Bytes::from_static(b"data"))
            .header("px-cbfilecomment", "hello");
        assert_eq!(transport.send(&request).await.unwrap(), None);
    }
}

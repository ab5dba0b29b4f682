use crate::config::toml_config::{LookupConfig, PathEndpoint};
use crate::domain::model::Stage;
use crate::domain::ports::LookupService;
use crate::utils::error::{Result, StageError, StageErrorKind, StageResult};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::collections::HashMap;
use std::time::Duration;

/// A single request as sent by `JsonHttpClient::call`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn headers_from(mut self, extra: Option<&HashMap<String, String>>) -> Self {
        if let Some(extra) = extra {
            for (name, value) in extra {
                self = self.header(name.clone(), value.clone());
            }
        }
        self
    }
}

/// One request/response cycle per call. Only HTTP 200 counts as success; no retries.
#[derive(Debug, Clone)]
pub struct JsonHttpClient {
    client: Client,
}

impl JsonHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn call(&self, stage: Stage, request: HttpRequest) -> StageResult {
        tracing::debug!("📡 {}: {} {}", stage, request.method, request.url);

        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StageError::transport(stage, e))?;

        let status = response.status();
        tracing::debug!("📡 {}: response status {}", stage, status);
        if status != StatusCode::OK {
            return Err(StageError::http_status(stage, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| StageError::transport(stage, e))
    }
}

/// `LookupService` backed by the three configured HTTP endpoints.
pub struct HttpLookupService {
    client: JsonHttpClient,
    config: LookupConfig,
}

impl HttpLookupService {
    pub fn new(config: LookupConfig) -> Result<Self> {
        let client = JsonHttpClient::new(config.timeout())?;
        Ok(Self { client, config })
    }

    fn path_request(
        &self,
        stage: Stage,
        endpoint: &PathEndpoint,
        identifier: &str,
    ) -> std::result::Result<HttpRequest, StageError> {
        let url = endpoint.url_for(identifier).map_err(|e| {
            StageError::new(
                stage,
                StageErrorKind::InvalidRequest,
                format!("{} Error: {}", stage, e),
            )
        })?;

        Ok(HttpRequest::get(url)
            .header("User-Agent", self.config.http.user_agent.as_str())
            .headers_from(endpoint.headers.as_ref()))
    }
}

#[async_trait]
impl LookupService for HttpLookupService {
    async fn meter_actions(&self, meter_number: &str) -> StageResult {
        let endpoint = &self.config.endpoints.meter_actions;
        let body = serde_json::json!([{ "meterNo": meter_number }]).to_string();

        let mut request = HttpRequest::post(endpoint.url.as_str(), body)
            .header("Accept", "text/x-component")
            .header("Content-Type", "text/plain;charset=UTF-8")
            .header(endpoint.action_header.as_str(), endpoint.action_id.as_str())
            .header("User-Agent", self.config.http.user_agent.as_str());
        if let Some(origin) = &endpoint.origin {
            request = request.header("Origin", origin.as_str());
        }
        if let Some(referer) = &endpoint.referer {
            request = request.header("Referer", referer.as_str());
        }
        let request = request.headers_from(endpoint.headers.as_ref());

        self.client.call(Stage::MeterActions, request).await
    }

    async fn customer_resolution(&self, identifier: &str) -> StageResult {
        let request = self
            .path_request(
                Stage::CustomerResolution,
                &self.config.endpoints.customer_resolution,
                identifier,
            )?
            .header("Accept", "application/json");
        self.client.call(Stage::CustomerResolution, request).await
    }

    async fn account_detail(&self, identifier: &str) -> StageResult {
        let request = self.path_request(
            Stage::AccountDetail,
            &self.config.endpoints.account_detail,
            identifier,
        )?;
        self.client.call(Stage::AccountDetail, request).await
    }
}

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

use super::types::{
    AnalyzeRequest, BarResponse, CsvReportResponse, ErrorBody, PieResponse, RootResponse,
    YearsResponse,
};
use crate::classify::{classify, AnalyzeResult};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// Thin wrapper over the analysis API.
///
/// Every request is logged at debug level and every failure at error level.
#[derive(Clone)]
pub struct AtosClient {
    client: Client,
    base_url: String,
}

impl AtosClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> ApiResult<Self> {
        Self::new(&config.resolved_base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /` - service status.
    pub async fn root(&self) -> ApiResult<RootResponse> {
        self.get_json("/", &[]).await
    }

    /// `POST /analyze` - ask a question; the answer is JSON or a generated file.
    pub async fn analyze(&self, question: &str) -> ApiResult<AnalyzeResult> {
        let path = "/analyze";
        debug!("[API] POST {}", path);

        let request = AnalyzeRequest {
            user_question: question.to_string(),
        };

        let response = self
            .client
            .post(self.url(path))
            .json(&request)
            .send()
            .await
            .map_err(log_transport_error)?;

        let response = check_status(response).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(log_transport_error)?;

        classify(&headers, body.to_vec()).map_err(|e| {
            error!("[API ERROR] {}: {}", path, e);
            e
        })
    }

    /// `GET /report/csv?user_question=...`
    pub async fn csv_report(&self, question: &str) -> ApiResult<CsvReportResponse> {
        self.get_json("/report/csv", &[("user_question", question)])
            .await
    }

    /// `GET /bar/static` - monthly sales.
    pub async fn bar_static(&self) -> ApiResult<BarResponse> {
        self.get_json("/bar/static", &[]).await
    }

    /// `GET /pie/static` - top clients and sellers.
    pub async fn pie_static(&self) -> ApiResult<PieResponse> {
        self.get_json("/pie/static", &[]).await
    }

    /// `GET /years` - years with sales data.
    pub async fn years(&self) -> ApiResult<Vec<String>> {
        let response: YearsResponse = self.get_json("/years", &[]).await?;
        Ok(response.data)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        debug!("[API] GET {}", path);

        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(log_transport_error)?;

        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(log_transport_error)?;

        serde_json::from_slice(&body).map_err(|e| {
            error!("[API ERROR] {}: invalid JSON: {}", path, e);
            ApiError::from(e)
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn log_transport_error(err: reqwest::Error) -> ApiError {
    let status = err
        .status()
        .map(|s| s.as_u16().to_string())
        .unwrap_or_else(|| "-".to_string());
    error!("[API ERROR] {}: {}", status, err);
    ApiError::Network(err)
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.describe())
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    error!("[API ERROR] {}: {}", status.as_u16(), detail);
    Err(ApiError::Status { status, detail })
}

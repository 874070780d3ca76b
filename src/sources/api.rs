//! HTTP metadata source

use crate::models::{FieldRecord, MetricRecord};
use crate::sources::error::{SourceError, SourceResult};
use crate::sources::metadata::{decode_fields, decode_metrics, FieldTypeRules, Loaded, MetadataSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataApiConfig {
    /// Base URL; the API source is disabled when empty
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_fields_path")]
    pub fields_path: String,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// JSON file `{"fields": [...], "metrics": [...]}` served instead of
    /// the API when `base_url` is empty
    #[serde(default)]
    pub static_catalog: Option<std::path::PathBuf>,
}

fn default_fields_path() -> String {
    "/api/metadata/fields".to_string()
}

fn default_metrics_path() -> String {
    "/api/metadata/metrics".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MetadataApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            fields_path: default_fields_path(),
            metrics_path: default_metrics_path(),
            bearer_token: None,
            timeout_secs: default_timeout_secs(),
            static_catalog: None,
        }
    }
}

impl MetadataApiConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

/// Upstream answers with a bare array or a `{code, message, data}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Rows(Vec<serde_json::Value>),
    Envelope {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<EnvelopeData>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvelopeData {
    Rows(Vec<serde_json::Value>),
    Paged { items: Vec<serde_json::Value> },
}

impl ApiResponse {
    fn into_rows(self) -> SourceResult<Vec<serde_json::Value>> {
        match self {
            ApiResponse::Rows(rows) => Ok(rows),
            ApiResponse::Envelope { code, message, data } => {
                if let Some(code) = code {
                    if code != 0 && code != 200 {
                        return Err(SourceError::Query(format!(
                            "upstream code {}: {}",
                            code,
                            message.unwrap_or_default()
                        )));
                    }
                }
                match data {
                    Some(EnvelopeData::Rows(rows)) | Some(EnvelopeData::Paged { items: rows }) => Ok(rows),
                    None => Ok(Vec::new()),
                }
            }
        }
    }
}

/// Metadata loaded from the upstream catalog API
#[derive(Clone)]
pub struct ApiMetadataSource {
    client: Client,
    config: MetadataApiConfig,
    rules: FieldTypeRules,
}

impl ApiMetadataSource {
    pub fn new(config: MetadataApiConfig, rules: FieldTypeRules) -> SourceResult<Self> {
        if !config.is_configured() {
            return Err(SourceError::Configuration("metadata_api.base_url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            rules,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn fetch(&self, path: &str, id_param: &str, ids: Option<&[i64]>) -> SourceResult<Vec<serde_json::Value>> {
        let url = self.url(path);
        let mut request = self.client.get(&url);
        if let Some(ids) = ids {
            let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
            request = request.query(&[(id_param, joined)]);
        }
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(url = %url, "Fetching upstream metadata");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        body.into_rows()
    }
}

#[async_trait]
impl MetadataSource for ApiMetadataSource {
    fn name(&self) -> &str {
        "metadata_api"
    }

    async fn load_fields(&self, table_ids: Option<&[i64]>) -> SourceResult<Loaded<FieldRecord>> {
        let rows = self.fetch(&self.config.fields_path, "table_ids", table_ids).await?;
        let loaded = decode_fields(rows, &self.rules);
        info!(
            fields = loaded.records.len(),
            rejected = loaded.rejected.len(),
            "Loaded fields from metadata API"
        );
        Ok(loaded)
    }

    async fn load_metrics(&self, metric_ids: Option<&[i64]>) -> SourceResult<Loaded<MetricRecord>> {
        let rows = self.fetch(&self.config.metrics_path, "metric_ids", metric_ids).await?;
        let loaded = decode_metrics(rows);
        info!(
            metrics = loaded.records.len(),
            rejected = loaded.rejected.len(),
            "Loaded metrics from metadata API"
        );
        Ok(loaded)
    }
}

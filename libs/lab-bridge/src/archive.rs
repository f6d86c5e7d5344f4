use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, DependencyError};

/// Prefix for object keys derived from the CSV file name.
pub const OBJECT_KEY_PREFIX: &str = "llama-throughput-lab";
pub const DEFAULT_BUCKET: &str = "outputs";

const REASONING_DOMAIN: &str = "llama_inference_optimization";

// ═══════════════════════════════════════════════════════════════
//  Memory API record
// ═══════════════════════════════════════════════════════════════

/// Body of `POST {memory_url}/api/memory`.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub domain: &'static str,
    pub content: String,
    pub metadata: ReasoningMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningMetadata {
    pub model: String,
    pub best_throughput_tps: Value,
    /// `best` without its `throughput` entry.
    pub best_config: Map<String, Value>,
    pub sweep_type: String,
    pub csv_path: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
}

impl ReasoningRecord {
    pub fn new(
        sweep_type: &str,
        model_path: &str,
        best: &Map<String, Value>,
        csv_path: &str,
        gpu_type: Option<&str>,
    ) -> Self {
        let best_config: Map<String, Value> = best
            .iter()
            .filter(|(k, _)| k.as_str() != "throughput")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let throughput = best.get("throughput").cloned().unwrap_or_else(|| Value::from(0));

        let settings: Vec<String> = best_config
            .iter()
            .map(|(k, v)| format!("{k}={}", plain(v)))
            .collect();
        let content = format!(
            "Model {} achieves {:.1} tok/s at {}",
            base_name(model_path),
            throughput.as_f64().unwrap_or(0.0),
            settings.join(", "),
        );

        Self {
            kind: "reasoning",
            domain: REASONING_DOMAIN,
            content,
            metadata: ReasoningMetadata {
                model: model_path.to_string(),
                best_throughput_tps: throughput,
                best_config,
                sweep_type: sweep_type.to_string(),
                csv_path: csv_path.to_string(),
                timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                gpu_type: gpu_type.filter(|g| !g.is_empty()).map(str::to_string),
            },
        }
    }
}

/// Strings without JSON quotes, everything else as JSON.
fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// `llama-throughput-lab/<file name>`.
pub fn default_object_key(csv_path: &Path) -> String {
    let name = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{OBJECT_KEY_PREFIX}/{name}")
}

#[derive(Debug, Deserialize)]
struct PresignResponse {
    #[serde(default)]
    url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Archiver
// ═══════════════════════════════════════════════════════════════

/// Persists sweep results to the memory API and object storage.
///
/// Both operations are independent and best-effort: any failure yields
/// `None`. Blocking; do not call from inside an async runtime.
pub struct Archiver {
    http: Client,
    memory_url: String,
    presign_url: String,
    presign_secret: Option<String>,
    http_timeout: Duration,
    upload_timeout: Duration,
}

impl Archiver {
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let http = Client::builder().build().map_err(BridgeError::Client)?;
        Ok(Self {
            http,
            memory_url: config.memory_url.trim_end_matches('/').to_string(),
            presign_url: config.presign_url.trim_end_matches('/').to_string(),
            presign_secret: config.presign_secret.clone().filter(|s| !s.is_empty()),
            http_timeout: config.http_timeout(),
            upload_timeout: config.upload_timeout(),
        })
    }

    /// Store the best configuration of a sweep as a reasoning pattern.
    ///
    /// Returns the memory API's JSON response verbatim.
    pub fn store_reasoning(
        &self,
        sweep_type: &str,
        model_path: &str,
        best: &Map<String, Value>,
        csv_path: &str,
        gpu_type: Option<&str>,
    ) -> Option<Value> {
        let record = ReasoningRecord::new(sweep_type, model_path, best, csv_path, gpu_type);
        self.post_record(&record)
            .inspect_err(|e| tracing::debug!(error = %e, "store_reasoning skipped"))
            .ok()
    }

    fn post_record(&self, record: &ReasoningRecord) -> Result<Value, DependencyError> {
        let value = self
            .http
            .post(format!("{}/api/memory", self.memory_url))
            .timeout(self.http_timeout)
            .json(record)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(value)
    }

    /// Upload `csv_path` through a presigned PUT and return a presigned
    /// download URL for the same object.
    ///
    /// Without a presign secret this returns `None` before touching the
    /// network. Any failed step aborts the rest.
    pub fn archive_csv(
        &self,
        csv_path: &Path,
        bucket: &str,
        object_key: Option<&str>,
    ) -> Option<String> {
        self.try_archive(csv_path, bucket, object_key)
            .inspect_err(|e| tracing::debug!(path = %csv_path.display(), error = %e, "archive_csv skipped"))
            .ok()
    }

    fn try_archive(
        &self,
        csv_path: &Path,
        bucket: &str,
        object_key: Option<&str>,
    ) -> Result<String, DependencyError> {
        let secret = self
            .presign_secret
            .as_deref()
            .ok_or(DependencyError::Unconfigured("PRESIGN_SHARED_SECRET"))?;
        let key = match object_key {
            Some(k) => k.to_string(),
            None => default_object_key(csv_path),
        };

        let upload_url = self.presign(secret, bucket, &key, "PUT")?;
        let body = std::fs::read(csv_path)?;
        self.http
            .put(&upload_url)
            .timeout(self.upload_timeout)
            .header(CONTENT_TYPE, "text/csv")
            .body(body)
            .send()?
            .error_for_status()?;
        tracing::debug!(bucket, key = %key, "csv uploaded");

        self.presign(secret, bucket, &key, "GET")
    }

    fn presign(
        &self,
        secret: &str,
        bucket: &str,
        key: &str,
        method: &str,
    ) -> Result<String, DependencyError> {
        let resp: PresignResponse = self
            .http
            .get(format!("{}/presign", self.presign_url))
            .timeout(self.http_timeout)
            .bearer_auth(secret)
            .query(&[("bucket", bucket), ("key", key), ("method", method)])
            .send()?
            .error_for_status()?
            .json()?;
        resp.url
            .filter(|u| !u.is_empty())
            .ok_or(DependencyError::MissingUrl)
    }
}

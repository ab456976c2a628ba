//! HTTP client for the discovery / eligibility / parsing backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::parser::{Complexity, ParsedTask};
use super::JobSource;
use crate::error::{Result, SmileError};
use crate::types::TestnetJob;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpJobSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmileError::Upstream(format!("HTTP {}: {}", status, body)));
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Backend steps name their kind `action` and flag manual ones with
/// `canAutomate: false`.
fn normalize_steps(payload: &mut Value) {
    let Some(steps) = payload.get_mut("steps").and_then(Value::as_array_mut) else {
        return;
    };
    for step in steps.iter_mut().filter_map(Value::as_object_mut) {
        if !step.contains_key("type") {
            if let Some(action) = step.remove("action") {
                step.insert("type".to_string(), action);
            }
        }
        if step.get("canAutomate").and_then(Value::as_bool) == Some(false) {
            step.insert("manual".to_string(), Value::Bool(true));
        }
    }
}

pub(crate) fn decode_parsed(mut payload: Value) -> Result<ParsedTask> {
    normalize_steps(&mut payload);
    let has_complexity = payload.get("complexity").is_some();
    let mut parsed: ParsedTask = serde_json::from_value(payload)?;
    if !has_complexity {
        parsed.complexity = Complexity::for_steps(parsed.steps.len());
    }
    Ok(parsed)
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn fetch_new_jobs(&self, exclude_ids: &[String]) -> Result<Vec<TestnetJob>> {
        let query: Vec<(&str, &str)> = exclude_ids.iter().map(|id| ("completed", id.as_str())).collect();
        debug!("GET /api/testnets/new excluding {} ids", query.len());

        let response = self
            .client
            .get(self.url("/api/testnets/new"))
            .query(&query)
            .send()
            .await?;
        let jobs: Vec<TestnetJob> = serde_json::from_value(Self::read_json(response).await?)?;
        info!("Fetched {} testnets from backend", jobs.len());
        Ok(jobs)
    }

    async fn check_eligibility(&self, addresses: &[String]) -> Result<Vec<String>> {
        let response = self
            .client
            .post(self.url("/api/check-eligibility"))
            .json(&json!({ "addresses": addresses }))
            .send()
            .await?;
        let eligible: Vec<String> = serde_json::from_value(Self::read_json(response).await?)?;
        info!("Backend reports {} eligible wallets", eligible.len());
        Ok(eligible)
    }

    async fn parse_task(&self, text: &str) -> Result<ParsedTask> {
        let response = self
            .client
            .post(self.url("/api/parse-task"))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let parsed = decode_parsed(Self::read_json(response).await?)?;
        info!("Backend parsed {} steps", parsed.steps.len());
        Ok(parsed)
    }
}

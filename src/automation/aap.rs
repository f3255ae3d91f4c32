//! Automation platform REST client
//!
//! Launches job templates with `POST /api/v2/job_templates/{id}/launch/` and
//! polls `GET /api/v2/jobs/{id}/`.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AutomationClient, AutomationError, JobId, JobStatus};
use crate::config::AutomationSettings;

/// HTTP client for the automation platform
#[derive(Clone)]
pub struct AapClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    #[serde(default)]
    id: Option<u64>,
    /// Some platform versions report the new job under `job` instead.
    #[serde(default)]
    job: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
}

impl AapClient {
    pub fn new(settings: &AutomationSettings) -> Result<Self, AutomationError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| AutomationError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        if !settings.verify_ssl {
            tracing::warn!(base_url = %settings.base_url, "TLS certificate verification disabled for automation platform");
        }

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        if self.token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.token)
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AutomationError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(AutomationError::Rejected {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        })
    }
}

fn map_transport(e: reqwest::Error) -> AutomationError {
    if e.is_timeout() {
        AutomationError::Timeout
    } else if e.is_decode() {
        AutomationError::Decode(e.to_string())
    } else {
        AutomationError::Unreachable(e.to_string())
    }
}

/// Map the platform's status vocabulary onto [`JobStatus`].
pub fn parse_job_status(raw: &str) -> Result<JobStatus, AutomationError> {
    match raw {
        "new" | "pending" | "waiting" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "successful" => Ok(JobStatus::Succeeded),
        "failed" | "error" | "canceled" => Ok(JobStatus::Failed),
        other => Err(AutomationError::Decode(format!("unknown job status '{other}'"))),
    }
}

#[async_trait]
impl AutomationClient for AapClient {
    async fn launch_job(
        &self,
        template_id: u64,
        variables: serde_json::Value,
    ) -> Result<JobId, AutomationError> {
        let body = serde_json::json!({ "extra_vars": variables });
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v2/job_templates/{template_id}/launch/"),
            )
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let resp = Self::check(resp).await?;
        let launched: LaunchResponse = resp.json().await.map_err(map_transport)?;
        let id = launched
            .id
            .or(launched.job)
            .ok_or_else(|| AutomationError::Decode("launch response has no job id".to_string()))?;
        tracing::info!(template_id, job_id = id, "Launched automation job");
        Ok(JobId(id))
    }

    async fn get_status(&self, job: JobId) -> Result<JobStatus, AutomationError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/api/v2/jobs/{job}/"))
            .send()
            .await
            .map_err(map_transport)?;
        let resp = Self::check(resp).await?;
        let body: JobResponse = resp.json().await.map_err(map_transport)?;
        parse_job_status(&body.status)
    }

    fn backend_name(&self) -> &'static str {
        "aap"
    }
}

//! HTTP client for the case record store
//!
//! Speaks the store's start/submit update API. Conflicts come back as 409
//! and are surfaced as typed conflicts so the protocol layer can decide
//! whether to retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CaseRecordStore, CommitReceipt, StartedUpdate};
use crate::auth::IdentityProvider;
use crate::model::{CaseEvent, CaseSnapshot};
use crate::types::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct HttpRecordStoreConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpRecordStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4452".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpRecordStore {
    config: HttpRecordStoreConfig,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartUpdateResponse {
    token: String,
    version: i64,
    case: CaseSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    case: &'a CaseSnapshot,
    event: Option<&'a str>,
    summary: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    version: i64,
}

impl HttpRecordStore {
    pub fn new(
        config: HttpRecordStoreConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            identity,
        })
    }

    async fn bearer(&self) -> Result<String> {
        self.identity.service_token().await
    }

    fn classify(case_id: i64, status: StatusCode, body: String) -> SyncError {
        match status {
            StatusCode::CONFLICT => SyncError::Conflict {
                case_id,
                message: body,
            },
            StatusCode::NOT_FOUND => SyncError::NotFound(format!("Case {} not found", case_id)),
            _ => SyncError::Transport(format!(
                "record store returned {} for case {}: {}",
                status, case_id, body
            )),
        }
    }
}

#[async_trait]
impl CaseRecordStore for HttpRecordStore {
    async fn start_update(&self, case_id: i64, event: CaseEvent) -> Result<StartedUpdate> {
        let url = format!(
            "{}/cases/{}/updates?event={}",
            self.config.base_url,
            case_id,
            event.code()
        );
        debug!(case_id, event = %event, "Starting record store update");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(case_id, status, body));
        }

        let started: StartUpdateResponse = response.json().await?;
        Ok(StartedUpdate {
            token: started.token,
            version: started.version,
            case: started.case,
        })
    }

    async fn submit(
        &self,
        token: &str,
        case: CaseSnapshot,
        event: Option<CaseEvent>,
        summary: &str,
        description: &str,
    ) -> Result<CommitReceipt> {
        let case_id = case.case_id;
        let url = format!(
            "{}/cases/{}/updates/{}/submit",
            self.config.base_url, case_id, token
        );

        let body = SubmitRequest {
            case: &case,
            event: event.map(|e| e.code()),
            summary,
            description,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify(case_id, status, text));
        }

        let submitted: SubmitResponse = response.json().await?;
        Ok(CommitReceipt {
            case_id,
            version: submitted.version,
            event,
        })
    }

    async fn fetch(&self, case_id: i64) -> Result<CaseSnapshot> {
        let url = format!("{}/cases/{}", self.config.base_url, case_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(case_id, status, body));
        }

        Ok(response.json().await?)
    }
}

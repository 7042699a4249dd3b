//! HTTP client for the hearing scheduling service

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::SchedulingService;
use crate::auth::IdentityProvider;
use crate::model::{
    CaseHearingSummary, HearingCancelPayload, HearingRequestPayload, HearingUpdateResponse,
    SchedulingDetail,
};
use crate::types::{Result, SyncError};

#[derive(Debug, Clone)]
pub struct HttpSchedulingServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpSchedulingServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4561".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpSchedulingService {
    config: HttpSchedulingServiceConfig,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpSchedulingService {
    pub fn new(
        config: HttpSchedulingServiceConfig,
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

    fn classify(context: &str, status: StatusCode, body: String) -> SyncError {
        if status == StatusCode::NOT_FOUND {
            SyncError::NotFound(context.to_string())
        } else {
            SyncError::Transport(format!(
                "scheduling service returned {} for {}: {}",
                status, context, body
            ))
        }
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::classify(context, status, body))
        }
    }
}

#[async_trait]
impl SchedulingService for HttpSchedulingService {
    async fn get_hearing(&self, hearing_id: &str) -> Result<SchedulingDetail> {
        let url = format!("{}/hearings/{}", self.config.base_url, hearing_id);
        debug!(hearing_id, "Fetching scheduling detail");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.identity.service_token().await?)
            .send()
            .await?;

        let response = Self::check(response, &format!("hearing {}", hearing_id)).await?;
        Ok(response.json().await?)
    }

    async fn create_hearing(
        &self,
        payload: &HearingRequestPayload,
    ) -> Result<HearingUpdateResponse> {
        let url = format!("{}/hearings", self.config.base_url);
        debug!(case_id = payload.case_id, "Sending create hearing request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.identity.service_token().await?)
            .json(payload)
            .send()
            .await?;

        let response =
            Self::check(response, &format!("create for case {}", payload.case_id)).await?;
        Ok(response.json().await?)
    }

    async fn update_hearing(
        &self,
        hearing_id: &str,
        payload: &HearingRequestPayload,
    ) -> Result<HearingUpdateResponse> {
        let url = format!("{}/hearings/{}", self.config.base_url, hearing_id);
        debug!(hearing_id, "Sending update hearing request");

        let response = self
            .client
            .put(&url)
            .bearer_auth(self.identity.service_token().await?)
            .json(payload)
            .send()
            .await?;

        let response = Self::check(response, &format!("update of hearing {}", hearing_id)).await?;
        Ok(response.json().await?)
    }

    async fn cancel_hearing(
        &self,
        hearing_id: &str,
        payload: &HearingCancelPayload,
    ) -> Result<HearingUpdateResponse> {
        let url = format!("{}/hearings/{}", self.config.base_url, hearing_id);
        debug!(hearing_id, "Sending cancel hearing request");

        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.identity.service_token().await?)
            .json(payload)
            .send()
            .await?;

        let response = Self::check(response, &format!("cancel of hearing {}", hearing_id)).await?;
        Ok(response.json().await?)
    }

    async fn list_hearings(&self, case_id: i64) -> Result<Vec<CaseHearingSummary>> {
        let url = format!("{}/hearings?caseId={}", self.config.base_url, case_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.identity.service_token().await?)
            .send()
            .await?;

        let response = Self::check(response, &format!("listing for case {}", case_id)).await?;
        Ok(response.json().await?)
    }
}

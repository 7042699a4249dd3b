//! Scheduling service boundary
//!
//! The external system that lists and books hearings. The engine consumes
//! four operations: fetch one hearing's detail, create/update/cancel a
//! hearing request, and list a case's hearings. The in-memory
//! implementation scripts responses for dev mode and tests.

pub mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{
    CaseHearingSummary, HearingCancelPayload, HearingRequestPayload, HearingUpdateResponse,
    RequestSection, ResponseSection, SchedulingDetail, SchedulingStatus,
};
use crate::types::{Result, SyncError};

pub use http::{HttpSchedulingService, HttpSchedulingServiceConfig};

/// Client contract against the hearing scheduling service.
#[async_trait]
pub trait SchedulingService: Send + Sync {
    async fn get_hearing(&self, hearing_id: &str) -> Result<SchedulingDetail>;

    async fn create_hearing(&self, payload: &HearingRequestPayload)
        -> Result<HearingUpdateResponse>;

    async fn update_hearing(
        &self,
        hearing_id: &str,
        payload: &HearingRequestPayload,
    ) -> Result<HearingUpdateResponse>;

    async fn cancel_hearing(
        &self,
        hearing_id: &str,
        payload: &HearingCancelPayload,
    ) -> Result<HearingUpdateResponse>;

    async fn list_hearings(&self, case_id: i64) -> Result<Vec<CaseHearingSummary>>;
}

/// Scriptable in-memory scheduling service.
pub struct InMemorySchedulingService {
    details: RwLock<HashMap<String, SchedulingDetail>>,
    listings: RwLock<HashMap<i64, Vec<CaseHearingSummary>>>,
    next_id: AtomicI64,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl InMemorySchedulingService {
    pub fn new() -> Self {
        Self {
            details: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1001),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Script the detail returned for a hearing identifier.
    pub async fn put_detail(&self, detail: SchedulingDetail) {
        self.details
            .write()
            .await
            .insert(detail.hearing_id().to_string(), detail);
    }

    /// Script the hearing list returned for a case.
    pub async fn put_listing(&self, case_id: i64, hearings: Vec<CaseHearingSummary>) {
        self.listings.write().await.insert(case_id, hearings);
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::Relaxed)
    }

    pub fn cancel_call_count(&self) -> usize {
        self.cancel_calls.load(Ordering::Relaxed)
    }
}

impl Default for InMemorySchedulingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingService for InMemorySchedulingService {
    async fn get_hearing(&self, hearing_id: &str) -> Result<SchedulingDetail> {
        self.details
            .read()
            .await
            .get(hearing_id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("Hearing {} not found", hearing_id)))
    }

    async fn create_hearing(
        &self,
        payload: &HearingRequestPayload,
    ) -> Result<HearingUpdateResponse> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);

        let hearing_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let response = HearingUpdateResponse {
            hearing_id: hearing_id.clone(),
            version: 1,
            status: SchedulingStatus::HearingRequested,
        };

        self.details.write().await.insert(
            hearing_id.clone(),
            SchedulingDetail {
                request: RequestSection {
                    hearing_id: hearing_id.clone(),
                    version: 1,
                    cancellation_reason_codes: Vec::new(),
                },
                response: ResponseSection::default(),
                sessions: Vec::new(),
            },
        );
        self.listings
            .write()
            .await
            .entry(payload.case_id)
            .or_default()
            .push(CaseHearingSummary {
                hearing_id,
                status: SchedulingStatus::HearingRequested,
                version: 1,
            });

        Ok(response)
    }

    async fn update_hearing(
        &self,
        hearing_id: &str,
        _payload: &HearingRequestPayload,
    ) -> Result<HearingUpdateResponse> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);

        let mut details = self.details.write().await;
        let detail = details
            .get_mut(hearing_id)
            .ok_or_else(|| SyncError::NotFound(format!("Hearing {} not found", hearing_id)))?;
        detail.request.version += 1;

        Ok(HearingUpdateResponse {
            hearing_id: hearing_id.to_string(),
            version: detail.request.version,
            status: SchedulingStatus::UpdateSubmitted,
        })
    }

    async fn cancel_hearing(
        &self,
        hearing_id: &str,
        payload: &HearingCancelPayload,
    ) -> Result<HearingUpdateResponse> {
        self.cancel_calls.fetch_add(1, Ordering::Relaxed);

        let mut details = self.details.write().await;
        let detail = details
            .get_mut(hearing_id)
            .ok_or_else(|| SyncError::NotFound(format!("Hearing {} not found", hearing_id)))?;
        detail
            .request
            .cancellation_reason_codes
            .clone_from(&payload.cancellation_reason_codes);

        Ok(HearingUpdateResponse {
            hearing_id: hearing_id.to_string(),
            version: detail.request.version,
            status: SchedulingStatus::CancellationRequested,
        })
    }

    async fn list_hearings(&self, case_id: i64) -> Result<Vec<CaseHearingSummary>> {
        Ok(self
            .listings
            .read()
            .await
            .get(&case_id)
            .cloned()
            .unwrap_or_default())
    }
}

//! Hearing lifecycle orchestration
//!
//! The case-originated direction: create, amend, cancel and post-adjournment
//! re-create hearing requests against the scheduling service, then record
//! the outcome on the case. The scheduling call always happens before the
//! commit so a failed call leaves the case untouched, and the commit uses
//! the bounded-retry protocol so a concurrent case change does not lose the
//! scheduling response.

use std::sync::Arc;

use tracing::{info, warn};

use crate::model::{
    CaseSnapshot, HearingCancelPayload, HearingRequest, HearingRequestPayload, HearingState,
    HearingUpdateResponse,
};
use crate::sched::SchedulingService;
use crate::store::{CaseRecordStore, CaseUpdateProtocol, DynamicEventUpdateResult};
use crate::types::{Result, SyncError};

/// Listing durations are slot-based.
const DURATION_SLOT_MINUTES: u32 = 5;

/// Fallback when the appeal carries no explicit duration.
const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Terminal outcome of one orchestrated hearing request.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    /// The scheduling call succeeded and the case records it.
    Submitted { hearing_id: String, version: i64 },
    /// An active request already existed; no create was sent, but the
    /// existing request was recorded onto the case.
    AlreadyRequested { hearing_id: String },
}

/// Drives case-originated hearing requests through the scheduling service.
pub struct HearingOrchestrator<S> {
    sched: Arc<dyn SchedulingService>,
    protocol: CaseUpdateProtocol<S>,
}

impl<S: CaseRecordStore> HearingOrchestrator<S> {
    pub fn new(sched: Arc<dyn SchedulingService>, protocol: CaseUpdateProtocol<S>) -> Self {
        Self { sched, protocol }
    }

    pub async fn process(&self, request: &HearingRequest) -> Result<OrchestrationOutcome> {
        info!(
            case_id = request.case_id,
            state = %request.state,
            route = ?request.route,
            "Processing hearing request"
        );
        match request.state {
            HearingState::Create | HearingState::AdjournCreate => self.create(request).await,
            HearingState::Update => self.update(request).await,
            HearingState::Cancel => self.cancel(request).await,
        }
    }

    async fn create(&self, request: &HearingRequest) -> Result<OrchestrationOutcome> {
        let case_id = request.case_id;

        let clear_adjournment = request.state == HearingState::AdjournCreate;

        // Suppress duplicate creates: a request already active with the
        // scheduling service means this work item is a replay. The existing
        // request is still recorded onto the case so a lost earlier commit
        // heals.
        let existing = self.sched.list_hearings(case_id).await?;
        if let Some(active) = existing.iter().find(|h| h.status.is_active_request()) {
            warn!(
                case_id,
                hearing_id = %active.hearing_id,
                status = %active.status,
                "Active hearing request already exists, skipping create"
            );
            let version = match self.sched.get_hearing(&active.hearing_id).await {
                Ok(detail) => detail.request.version,
                Err(SyncError::NotFound(_)) => 1,
                Err(e) => return Err(update_case_failure(case_id, "create", e)),
            };
            let response = HearingUpdateResponse {
                hearing_id: active.hearing_id.clone(),
                version,
                status: active.status,
            };
            self.record_response(case_id, request.state, &response, clear_adjournment)
                .await?;
            return Ok(OrchestrationOutcome::AlreadyRequested {
                hearing_id: active.hearing_id.clone(),
            });
        }

        let case = self.protocol.store().fetch(case_id).await?;
        let payload = build_payload(&case);

        let response = self
            .sched
            .create_hearing(&payload)
            .await
            .map_err(|e| update_case_failure(case_id, "create", e))?;

        self.record_response(case_id, request.state, &response, clear_adjournment)
            .await
    }

    async fn update(&self, request: &HearingRequest) -> Result<OrchestrationOutcome> {
        let case_id = request.case_id;
        let case = self.protocol.store().fetch(case_id).await?;
        let hearing_id = current_hearing_id(&case)?;
        let payload = build_payload(&case);
        ensure_listable_duration(&payload, case_id)?;

        let response = self
            .sched
            .update_hearing(&hearing_id, &payload)
            .await
            .map_err(|e| update_case_failure(case_id, "update", e))?;

        self.record_response(case_id, request.state, &response, false)
            .await
    }

    async fn cancel(&self, request: &HearingRequest) -> Result<OrchestrationOutcome> {
        let case_id = request.case_id;
        let case = self.protocol.store().fetch(case_id).await?;
        let hearing_id = current_hearing_id(&case)?;

        let payload = HearingCancelPayload {
            cancellation_reason_codes: request.cancellation_reason.into_iter().collect(),
        };

        let response = self
            .sched
            .cancel_hearing(&hearing_id, &payload)
            .await
            .map_err(|e| update_case_failure(case_id, "cancel", e))?;

        self.record_response(case_id, request.state, &response, false)
            .await
    }

    /// Record the scheduling response on the case in one commit. For the
    /// post-adjournment flow the same commit clears the in-progress marker,
    /// so the marker and the new request can never diverge.
    async fn record_response(
        &self,
        case_id: i64,
        state: HearingState,
        response: &HearingUpdateResponse,
        clear_adjournment: bool,
    ) -> Result<OrchestrationOutcome> {
        let event = state.case_event();
        // Early scheduling responses occasionally omit the initial version.
        let version = if response.version > 0 {
            response.version
        } else {
            1
        };

        let receipt = self
            .protocol
            .commit_with_retry(case_id, event, &|case: &mut CaseSnapshot| {
                let record = case.hearing_mut_or_insert(&response.hearing_id);
                record.version = version;
                if let Some(status) = response.status.hearing_status() {
                    record.status = Some(status);
                }
                if clear_adjournment {
                    case.adjournment_in_progress = false;
                }
                Ok(DynamicEventUpdateResult::with_event(
                    event,
                    event.summary(&response.hearing_id),
                    format!(
                        "{} (hearing {}, case {})",
                        event.summary(&response.hearing_id),
                        response.hearing_id,
                        case_id
                    ),
                ))
            })
            .await?;

        info!(
            case_id,
            hearing_id = %response.hearing_id,
            version,
            state = %state,
            commit_version = receipt.version,
            "Hearing request recorded"
        );
        Ok(OrchestrationOutcome::Submitted {
            hearing_id: response.hearing_id.clone(),
            version,
        })
    }
}

/// Build the scheduling payload from the case's appeal data.
fn build_payload(case: &CaseSnapshot) -> HearingRequestPayload {
    HearingRequestPayload {
        case_id: case.case_id,
        duration_minutes: case
            .appeal
            .duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES),
        category_code: case.appeal.category_code.clone(),
        venue_code: case.appeal.preferred_venue_code.clone(),
        panel_required: case.appeal.panel_required,
    }
}

/// Amended durations must land on a listing slot; violations are rejected
/// before any scheduling call is made. Applies to the update flow only.
fn ensure_listable_duration(payload: &HearingRequestPayload, case_id: i64) -> Result<()> {
    if payload.duration_minutes % DURATION_SLOT_MINUTES != 0 {
        return Err(SyncError::listing(
            "Listing duration must be multiple of 5.0 minutes",
            format!(
                "Requested duration of {} minutes for case {} is not listable",
                payload.duration_minutes, case_id
            ),
        ));
    }
    Ok(())
}

fn current_hearing_id(case: &CaseSnapshot) -> Result<String> {
    case.current_hearing()
        .map(|h| h.hearing_id.clone())
        .ok_or_else(|| {
            SyncError::UnhandleableState(format!("No hearing recorded for case {}", case.case_id))
        })
}

fn update_case_failure(case_id: i64, action: &str, err: SyncError) -> SyncError {
    SyncError::UpdateCase(format!(
        "Failed to {} hearing request for case {}: {}",
        action, case_id, err
    ))
}

//! Inbound notifications and case-originated work items

use serde::{Deserialize, Serialize};

use super::case::CaseEvent;
use super::hearing::{CancellationReason, SchedulingStatus};

/// Asynchronous notification from the scheduling service that a hearing's
/// status changed. Immutable; consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundStatusNotification {
    pub case_id: i64,
    pub hearing_id: String,
    pub status: SchedulingStatus,
    #[serde(default)]
    pub cancellation_reason_codes: Vec<CancellationReason>,
    /// Protocol version assigned by the scheduling service.
    pub version: i64,
    /// Owning service code; notifications for other services are skipped.
    pub service_code: String,
}

/// Which scheduling backend a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HearingRoute {
    ListAssist,
    Gaps,
}

/// Lifecycle state tag on a case-originated hearing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HearingState {
    Create,
    Update,
    AdjournCreate,
    Cancel,
}

impl HearingState {
    /// Case event committed when this flow's scheduling response is
    /// persisted.
    pub fn case_event(&self) -> CaseEvent {
        match self {
            Self::Create | Self::AdjournCreate => CaseEvent::AddHearing,
            Self::Update => CaseEvent::UpdateHearing,
            Self::Cancel => CaseEvent::CancelHearing,
        }
    }
}

impl std::fmt::Display for HearingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Internal work item created by case-event triggers and consumed once by
/// an orchestrator. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingRequest {
    pub case_id: i64,
    pub state: HearingState,
    pub cancellation_reason: Option<CancellationReason>,
    pub route: HearingRoute,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_deserializes_without_reasons() {
        let json = r#"{
            "caseId": 42,
            "hearingId": "H1",
            "status": "LISTED",
            "version": 1,
            "serviceCode": "BBA3"
        }"#;
        let n: InboundStatusNotification = serde_json::from_str(json).unwrap();
        assert_eq!(n.case_id, 42);
        assert_eq!(n.status, SchedulingStatus::Listed);
        assert!(n.cancellation_reason_codes.is_empty());
    }

    #[test]
    fn test_state_maps_to_case_event() {
        assert_eq!(HearingState::Create.case_event(), CaseEvent::AddHearing);
        assert_eq!(
            HearingState::AdjournCreate.case_event(),
            CaseEvent::AddHearing
        );
        assert_eq!(HearingState::Update.case_event(), CaseEvent::UpdateHearing);
    }
}

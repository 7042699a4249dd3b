//! Scheduling-service payloads and status codes

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::case::HearingStatus;

/// Status codes reported by the scheduling service for a hearing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingStatus {
    HearingRequested,
    AwaitingListing,
    Listed,
    UpdateRequested,
    UpdateSubmitted,
    Exception,
    CancellationRequested,
    CancellationSubmitted,
    Cancelled,
    AwaitingActuals,
    Completed,
    Adjourned,
}

impl SchedulingStatus {
    /// Case-side hearing status this scheduling status projects to, when
    /// it projects to one at all.
    pub fn hearing_status(&self) -> Option<HearingStatus> {
        match self {
            Self::HearingRequested | Self::AwaitingListing => Some(HearingStatus::AwaitingListing),
            Self::Listed | Self::UpdateRequested | Self::UpdateSubmitted => {
                Some(HearingStatus::Listed)
            }
            Self::Exception => Some(HearingStatus::Exception),
            Self::Cancelled => Some(HearingStatus::Cancelled),
            Self::Completed => Some(HearingStatus::Completed),
            Self::Adjourned => Some(HearingStatus::Adjourned),
            Self::CancellationRequested | Self::CancellationSubmitted | Self::AwaitingActuals => {
                None
            }
        }
    }

    /// Whether a request in this status is still active with the
    /// scheduling service, for duplicate-create suppression.
    pub fn is_active_request(&self) -> bool {
        matches!(
            self,
            Self::HearingRequested
                | Self::AwaitingListing
                | Self::Listed
                | Self::UpdateRequested
                | Self::UpdateSubmitted
        )
    }
}

impl std::fmt::Display for SchedulingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Listing state of the scheduling service's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Draft,
    Provisional,
    Fixed,
    Cancelled,
}

/// Cancellation reason codes shared with the scheduling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancellationReason {
    Withdrawn,
    StruckOut,
    Lapsed,
    Postponed,
    PartyUnableToAttend,
    PartyDidNotAttend,
    ListedInError,
}

impl CancellationReason {
    /// Postponement-class reasons re-enter listing rather than ending the
    /// hearing.
    pub fn is_postponement(&self) -> bool {
        matches!(
            self,
            Self::Postponed | Self::PartyUnableToAttend | Self::PartyDidNotAttend
        )
    }
}

/// How a hearing is attended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HearingChannel {
    FaceToFace,
    Telephone,
    Video,
    Paper,
    NotAttending,
}

/// One listed session: venue, times (reported in UTC), channel and panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSchedule {
    pub venue_code: String,
    pub start_utc: NaiveDateTime,
    pub end_utc: NaiveDateTime,
    pub channel: Option<HearingChannel>,
    pub judge_code: Option<String>,
    #[serde(default)]
    pub panel_member_codes: Vec<String>,
}

/// Request section of a fetched hearing detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSection {
    pub hearing_id: String,
    pub version: i64,
    #[serde(default)]
    pub cancellation_reason_codes: Vec<CancellationReason>,
}

/// Response section of a fetched hearing detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSection {
    pub listing_status: Option<ListingStatus>,
    pub current_status: Option<SchedulingStatus>,
}

/// A hearing detail fetched on demand from the scheduling service.
///
/// Invariant: exactly one session schedule is expected per hearing
/// identifier; any other count is a structural listing error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingDetail {
    pub request: RequestSection,
    #[serde(default)]
    pub response: ResponseSection,
    #[serde(default)]
    pub sessions: Vec<SessionSchedule>,
}

impl SchedulingDetail {
    pub fn hearing_id(&self) -> &str {
        &self.request.hearing_id
    }
}

/// Payload sent to the scheduling service when creating or amending a
/// hearing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingRequestPayload {
    pub case_id: i64,
    pub duration_minutes: u32,
    pub category_code: String,
    pub venue_code: String,
    pub panel_required: bool,
}

/// Payload sent when cancelling a hearing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingCancelPayload {
    #[serde(default)]
    pub cancellation_reason_codes: Vec<CancellationReason>,
}

/// Response from create/update/cancel calls against the scheduling service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingUpdateResponse {
    pub hearing_id: String,
    pub version: i64,
    pub status: SchedulingStatus,
}

/// One element of a case's hearing list from the scheduling service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseHearingSummary {
    pub hearing_id: String,
    pub status: SchedulingStatus,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_codes() {
        let json = serde_json::to_string(&SchedulingStatus::UpdateSubmitted).unwrap();
        assert_eq!(json, "\"UPDATE_SUBMITTED\"");
        let back: SchedulingStatus = serde_json::from_str("\"LISTED\"").unwrap();
        assert_eq!(back, SchedulingStatus::Listed);
    }

    #[test]
    fn test_active_request_statuses() {
        assert!(SchedulingStatus::AwaitingListing.is_active_request());
        assert!(SchedulingStatus::Listed.is_active_request());
        assert!(!SchedulingStatus::Cancelled.is_active_request());
        assert!(!SchedulingStatus::Exception.is_active_request());
    }

    #[test]
    fn test_detail_deserializes_with_missing_sections() {
        let json = r#"{"request":{"hearingId":"H1","version":3}}"#;
        let detail: SchedulingDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.hearing_id(), "H1");
        assert!(detail.sessions.is_empty());
        assert!(detail.response.listing_status.is_none());
    }
}

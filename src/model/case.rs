//! Case record snapshot and hearing history
//!
//! The snapshot is the mutable payload a single update transaction owns.
//! It is passed by value through the mutation stages and is never shared
//! across concurrent commits.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::hearing::HearingChannel;

/// Case event codes committed through the record store.
///
/// An event commit moves the case through its workflow; a data-only commit
/// (no event) changes fields without a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseEvent {
    /// A hearing was listed; caseworkers see the booking.
    HearingBooked,
    /// Scheduling data changed without a workflow transition.
    UpdateCaseOnly,
    /// Structural scheduling problem needing human review.
    ListingError,
    /// Hearing cancelled for a postponement-class reason.
    HearingPostponed,
    /// Hearing cancelled outright.
    HearingCancelled,
    /// A hearing request was created with the scheduling service.
    AddHearing,
    /// An existing hearing request was amended.
    UpdateHearing,
    /// Cancellation of a hearing request was submitted.
    CancelHearing,
    /// Neutral token event used to open a data-only update.
    CaseUpdated,
}

impl CaseEvent {
    /// Wire code used by the record store.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HearingBooked => "hearingBooked",
            Self::UpdateCaseOnly => "updateCaseOnly",
            Self::ListingError => "listingError",
            Self::HearingPostponed => "hearingPostponed",
            Self::HearingCancelled => "hearingCancelled",
            Self::AddHearing => "addHearing",
            Self::UpdateHearing => "updateHearing",
            Self::CancelHearing => "cancelHearing",
            Self::CaseUpdated => "caseUpdated",
        }
    }

    /// Event summary shown on the case history, templated with the hearing
    /// identifier.
    pub fn summary(&self, hearing_id: &str) -> String {
        match self {
            Self::HearingBooked => format!("Hearing {} listed", hearing_id),
            Self::UpdateCaseOnly => format!("Hearing {} updated", hearing_id),
            Self::ListingError => format!("Listing error for hearing {}", hearing_id),
            Self::HearingPostponed => format!("Hearing {} postponed", hearing_id),
            Self::HearingCancelled => format!("Hearing {} cancelled", hearing_id),
            Self::AddHearing => "Hearing request created".to_string(),
            Self::UpdateHearing => "Hearing request updated".to_string(),
            Self::CancelHearing => "Hearing cancellation requested".to_string(),
            Self::CaseUpdated => "Case updated".to_string(),
        }
    }
}

impl std::fmt::Display for CaseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Marker tracked for the responding agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DwpState {
    HearingDateIssued,
}

/// Case-side hearing status, derived from the scheduling-service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HearingStatus {
    AwaitingListing,
    Listed,
    Postponed,
    Cancelled,
    Adjourned,
    Completed,
    Exception,
}

/// Resolved venue details from the venue directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub name: String,
    pub address: String,
    pub postcode: String,
}

/// Display identity resolved from a judicial personal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudicialIdentity {
    pub personal_code: String,
    pub full_name: String,
}

/// Judge and panel members assigned to a hearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PanelAssignment {
    pub assigned_to: Option<JudicialIdentity>,
    #[serde(default)]
    pub members: Vec<JudicialIdentity>,
}

/// One element of the case's hearing history, keyed by the scheduling
/// service's hearing identifier (unique within the case).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaseHearingRecord {
    pub hearing_id: String,
    pub venue_code: Option<String>,
    pub venue: Option<Venue>,
    /// Start and end in the case's local timezone.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// `yyyy-MM-dd`
    pub hearing_date: Option<String>,
    /// `HH:MM:SS.3f`
    pub time_of_day: Option<String>,
    pub channel: Option<HearingChannel>,
    pub status: Option<HearingStatus>,
    pub panel: Option<PanelAssignment>,
    /// Scheduling-service request version; must only ever increase.
    pub version: i64,
}

impl CaseHearingRecord {
    pub fn new(hearing_id: impl Into<String>) -> Self {
        Self {
            hearing_id: hearing_id.into(),
            ..Default::default()
        }
    }
}

/// Summary fields kept in sync for caseworker triage views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkBasketFields {
    pub hearing_date: Option<NaiveDate>,
    /// `yyyy-MM-dd HH:MM`, set once when the first listing lands.
    pub hearing_date_issued: Option<String>,
    pub venue_code: Option<String>,
}

/// Appeal data used to build scheduling requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppealSummary {
    pub duration_minutes: Option<u32>,
    pub category_code: String,
    pub preferred_venue_code: String,
    pub panel_required: bool,
}

/// The mutable case payload passed into a mutation function. Owned
/// exclusively by the update protocol for the duration of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaseSnapshot {
    pub case_id: i64,
    #[serde(default)]
    pub hearings: Vec<CaseHearingRecord>,
    #[serde(default)]
    pub work_basket: WorkBasketFields,
    pub dwp_state: Option<DwpState>,
    #[serde(default)]
    pub adjournment_in_progress: bool,
    #[serde(default)]
    pub appeal: AppealSummary,
}

impl CaseSnapshot {
    pub fn new(case_id: i64) -> Self {
        Self {
            case_id,
            ..Default::default()
        }
    }

    pub fn hearing(&self, hearing_id: &str) -> Option<&CaseHearingRecord> {
        self.hearings.iter().find(|h| h.hearing_id == hearing_id)
    }

    pub fn hearing_mut(&mut self, hearing_id: &str) -> Option<&mut CaseHearingRecord> {
        self.hearings.iter_mut().find(|h| h.hearing_id == hearing_id)
    }

    /// Find the record for `hearing_id`, appending a zero-valued one if
    /// this is the first time the identifier is seen.
    pub fn hearing_mut_or_insert(&mut self, hearing_id: &str) -> &mut CaseHearingRecord {
        let idx = match self.hearings.iter().position(|h| h.hearing_id == hearing_id) {
            Some(idx) => idx,
            None => {
                self.hearings.push(CaseHearingRecord::new(hearing_id));
                self.hearings.len() - 1
            }
        };
        &mut self.hearings[idx]
    }

    /// The most recently recorded hearing request, if any.
    pub fn current_hearing(&self) -> Option<&CaseHearingRecord> {
        self.hearings.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hearing_mut_or_insert_is_idempotent() {
        let mut case = CaseSnapshot::new(42);
        case.hearing_mut_or_insert("H1").version = 1;
        case.hearing_mut_or_insert("H1").version = 2;
        assert_eq!(case.hearings.len(), 1);
        assert_eq!(case.hearing("H1").unwrap().version, 2);
    }

    #[test]
    fn test_event_summary_templating() {
        assert_eq!(CaseEvent::HearingBooked.summary("H1"), "Hearing H1 listed");
        assert_eq!(
            CaseEvent::ListingError.summary("H1"),
            "Listing error for hearing H1"
        );
    }

    #[test]
    fn test_snapshot_round_trips_json() {
        let mut case = CaseSnapshot::new(7);
        case.hearing_mut_or_insert("H9").status = Some(HearingStatus::Listed);
        let json = serde_json::to_string(&case).unwrap();
        let back: CaseSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, case);
    }
}

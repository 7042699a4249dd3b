//! Status Resolution
//!
//! Decides whether an inbound status notification is actionable for the
//! case's current state, and if so computes the case mutation and the
//! event to raise.
//!
//! The status → event mapping is a data-driven table of pure functions so
//! new statuses are additions, not new call sites. A status with no table
//! entry is a valid no-event outcome, logged at warn for observability.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::merge::{HearingDetailMerge, HearingMergePlan};
use crate::model::{
    CaseEvent, CaseSnapshot, DwpState, ListingStatus, SchedulingDetail, SchedulingStatus,
};
use crate::sched::SchedulingService;
use crate::store::DynamicEventUpdateResult;
use crate::types::Result;

type EventMapper = fn(&SchedulingDetail, &CaseSnapshot) -> Option<CaseEvent>;

/// Status → event mapping table. Pure functions of the scheduling detail
/// and the current case snapshot.
const EVENT_MAPPINGS: &[(SchedulingStatus, EventMapper)] = &[
    (SchedulingStatus::Listed, |_, _| {
        Some(CaseEvent::HearingBooked)
    }),
    (SchedulingStatus::AwaitingListing, |_, _| {
        Some(CaseEvent::UpdateCaseOnly)
    }),
    (SchedulingStatus::UpdateSubmitted, |_, _| {
        Some(CaseEvent::UpdateCaseOnly)
    }),
    (SchedulingStatus::Exception, |_, _| {
        Some(CaseEvent::ListingError)
    }),
    (SchedulingStatus::Cancelled, |detail, _| {
        let postponed = detail
            .request
            .cancellation_reason_codes
            .iter()
            .any(|r| r.is_postponement());
        Some(if postponed {
            CaseEvent::HearingPostponed
        } else {
            CaseEvent::HearingCancelled
        })
    }),
];

/// Resolve the case event for a status, or none. Unmapped statuses are
/// accepted as data-only outcomes but logged at warn.
pub fn resolve_case_event(
    status: SchedulingStatus,
    detail: &SchedulingDetail,
    case: &CaseSnapshot,
) -> Option<CaseEvent> {
    match EVENT_MAPPINGS.iter().find(|(s, _)| *s == status) {
        Some((_, mapper)) => mapper(detail, case),
        None => {
            warn!(
                case_id = case.case_id,
                hearing_id = %detail.hearing_id(),
                status = %status,
                "No event mapping for status; committing data-only"
            );
            None
        }
    }
}

fn is_hearing_updated(status: SchedulingStatus, detail: &SchedulingDetail) -> bool {
    matches!(
        status,
        SchedulingStatus::Listed
            | SchedulingStatus::AwaitingListing
            | SchedulingStatus::UpdateSubmitted
    ) && detail.response.listing_status == Some(ListingStatus::Fixed)
}

fn is_hearing_cancelled(status: SchedulingStatus, detail: &SchedulingDetail) -> bool {
    status == SchedulingStatus::Cancelled
        || detail.response.listing_status == Some(ListingStatus::Cancelled)
}

/// Whether this status, given the current scheduling detail, requires no
/// case change. A duplicate "listed" notification for a hearing that is
/// not fixed yet lands here.
pub fn state_not_handled(status: SchedulingStatus, detail: &SchedulingDetail) -> bool {
    !(is_hearing_updated(status, detail)
        || is_hearing_cancelled(status, detail)
        || status == SchedulingStatus::Exception)
}

/// An actionable notification, fully resolved: all collaborator lookups
/// are done, so `apply` is a pure mutation safe to re-run.
#[derive(Debug, Clone)]
pub struct ResolvedUpdate {
    pub case_id: i64,
    pub status: SchedulingStatus,
    pub detail: SchedulingDetail,
    pub merge_plan: Option<HearingMergePlan>,
}

impl ResolvedUpdate {
    pub fn hearing_id(&self) -> &str {
        self.detail.hearing_id()
    }

    /// Event this update is expected to raise against the given snapshot;
    /// used to open the record-store token under the right event code.
    pub fn expected_event(&self, case: &CaseSnapshot) -> Option<CaseEvent> {
        resolve_case_event(self.status, &self.detail, case)
    }

    /// The pure mutation: merge scheduling detail, set hearing status and
    /// work-basket fields, set the dwp-state marker, resolve the event.
    /// Field assignment is idempotent; repeating the mutation is safe.
    pub fn apply(&self, case: &mut CaseSnapshot) -> Result<DynamicEventUpdateResult> {
        if let Some(plan) = &self.merge_plan {
            plan.apply_to(case);
        }

        let hearing_id = self.hearing_id().to_string();

        if let Some(status) = self.status.hearing_status() {
            if let Some(record) = case.hearing_mut(&hearing_id) {
                record.status = Some(status);
            }
        }

        self.set_work_basket_fields(case, &hearing_id);

        if self.status == SchedulingStatus::Listed {
            case.dwp_state = Some(DwpState::HearingDateIssued);
        }

        let event = resolve_case_event(self.status, &self.detail, case);
        let result = match event {
            Some(event) => {
                let summary = event.summary(&hearing_id);
                let description = format!("{} (case {})", summary, case.case_id);
                DynamicEventUpdateResult::with_event(event, summary, description)
            }
            None => DynamicEventUpdateResult::data_only(format!(
                "Hearing {} status {}",
                hearing_id, self.status
            )),
        };
        Ok(result)
    }

    /// Work-basket fields are set while the case is listed and cleared
    /// otherwise. Idempotent field sets, safe to repeat.
    fn set_work_basket_fields(&self, case: &mut CaseSnapshot, hearing_id: &str) {
        if self.status == SchedulingStatus::Listed {
            let (date, venue_code) = case
                .hearing(hearing_id)
                .map(|r| (r.start.map(|s| s.date()), r.venue_code.clone()))
                .unwrap_or((None, None));

            case.work_basket.hearing_date = date;
            case.work_basket.venue_code = venue_code;
            if case.work_basket.hearing_date_issued.is_none() {
                let issued = Local::now().format("%Y-%m-%d %H:%M").to_string();
                debug!(
                    case_id = case.case_id,
                    hearing_date_issued = %issued,
                    "Setting work-basket hearing date issued"
                );
                case.work_basket.hearing_date_issued = Some(issued);
            }
        } else {
            case.work_basket.hearing_date = None;
            case.work_basket.hearing_date_issued = None;
            case.work_basket.venue_code = None;
        }
    }
}

/// Resolves inbound notifications against the scheduling service.
pub struct StatusResolver {
    sched: Arc<dyn SchedulingService>,
    merge: HearingDetailMerge,
}

impl StatusResolver {
    pub fn new(sched: Arc<dyn SchedulingService>, merge: HearingDetailMerge) -> Self {
        Self { sched, merge }
    }

    /// Fetch the current scheduling detail and decide whether the
    /// notification is actionable. `Ok(None)` means correctly recognized
    /// as requiring no case change.
    pub async fn resolve(
        &self,
        case_id: i64,
        hearing_id: &str,
        status: SchedulingStatus,
    ) -> Result<Option<ResolvedUpdate>> {
        let detail = self.sched.get_hearing(hearing_id).await?;

        if state_not_handled(status, &detail) {
            info!(
                case_id,
                hearing_id,
                status = %status,
                "Status requires no case change, skipping"
            );
            return Ok(None);
        }

        let merge_plan = if is_hearing_updated(status, &detail) {
            Some(self.merge.prepare(&detail, case_id).await?)
        } else {
            None
        };

        Ok(Some(ResolvedUpdate {
            case_id,
            status,
            detail,
            merge_plan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{
        CancellationReason, HearingChannel, HearingStatus, RequestSection, ResponseSection,
        SessionSchedule, Venue,
    };
    use crate::refdata::{InMemoryJudicialReference, InMemoryVenueDirectory};
    use crate::sched::InMemorySchedulingService;
    use crate::types::SyncError;

    fn session() -> SessionSchedule {
        SessionSchedule {
            venue_code: "V100".to_string(),
            start_utc: NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            end_utc: NaiveDate::from_ymd_opt(2024, 1, 10)
                .unwrap()
                .and_hms_opt(11, 0, 0)
                .unwrap(),
            channel: Some(HearingChannel::FaceToFace),
            judge_code: None,
            panel_member_codes: Vec::new(),
        }
    }

    fn listed_detail(sessions: Vec<SessionSchedule>) -> SchedulingDetail {
        SchedulingDetail {
            request: RequestSection {
                hearing_id: "H1".to_string(),
                version: 1,
                cancellation_reason_codes: Vec::new(),
            },
            response: ResponseSection {
                listing_status: Some(ListingStatus::Fixed),
                current_status: Some(SchedulingStatus::Listed),
            },
            sessions,
        }
    }

    async fn resolver(detail: SchedulingDetail) -> StatusResolver {
        let sched = InMemorySchedulingService::new();
        sched.put_detail(detail).await;

        let venues = InMemoryVenueDirectory::new();
        venues
            .insert(
                "V100",
                Venue {
                    name: "Birmingham".to_string(),
                    address: "1 Victoria Square".to_string(),
                    postcode: "B1 1BD".to_string(),
                },
            )
            .await;

        StatusResolver::new(
            Arc::new(sched),
            HearingDetailMerge::new(
                Arc::new(venues),
                Arc::new(InMemoryJudicialReference::new()),
                chrono_tz::Europe::London,
                false,
            ),
        )
    }

    #[test]
    fn test_state_not_handled_table() {
        let fixed = listed_detail(vec![session()]);
        assert!(!state_not_handled(SchedulingStatus::Listed, &fixed));
        assert!(!state_not_handled(SchedulingStatus::AwaitingListing, &fixed));
        assert!(!state_not_handled(SchedulingStatus::UpdateSubmitted, &fixed));
        assert!(!state_not_handled(SchedulingStatus::Exception, &fixed));
        assert!(!state_not_handled(SchedulingStatus::Cancelled, &fixed));
        assert!(state_not_handled(SchedulingStatus::HearingRequested, &fixed));
        assert!(state_not_handled(SchedulingStatus::UpdateRequested, &fixed));

        let mut draft = listed_detail(vec![session()]);
        draft.response.listing_status = Some(ListingStatus::Draft);
        assert!(state_not_handled(SchedulingStatus::Listed, &draft));
        assert!(state_not_handled(SchedulingStatus::AwaitingListing, &draft));
    }

    #[tokio::test]
    async fn test_listed_notification_resolves_full_update() {
        let resolver = resolver(listed_detail(vec![session()])).await;
        let resolved = resolver
            .resolve(42, "H1", SchedulingStatus::Listed)
            .await
            .unwrap()
            .expect("actionable");

        let mut case = CaseSnapshot::new(42);
        let outcome = resolved.apply(&mut case).unwrap();

        assert_eq!(outcome.event, Some(CaseEvent::HearingBooked));
        assert_eq!(outcome.summary, "Hearing H1 listed");
        assert!(outcome.description.contains("case 42"));

        let record = case.hearing("H1").unwrap();
        assert_eq!(record.status, Some(HearingStatus::Listed));
        assert_eq!(record.venue.as_ref().unwrap().name, "Birmingham");
        assert_eq!(record.hearing_date.as_deref(), Some("2024-01-10"));

        assert_eq!(case.dwp_state, Some(DwpState::HearingDateIssued));
        assert_eq!(
            case.work_basket.hearing_date,
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert_eq!(case.work_basket.venue_code.as_deref(), Some("V100"));
        assert!(case.work_basket.hearing_date_issued.is_some());
    }

    #[tokio::test]
    async fn test_not_actionable_status_resolves_to_none() {
        let resolver = resolver(listed_detail(vec![session()])).await;
        let resolved = resolver
            .resolve(42, "H1", SchedulingStatus::HearingRequested)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_awaiting_listing_with_fixed_listing_commits_update() {
        let resolver = resolver(listed_detail(vec![session()])).await;
        let resolved = resolver
            .resolve(42, "H1", SchedulingStatus::AwaitingListing)
            .await
            .unwrap()
            .expect("actionable");

        let mut case = CaseSnapshot::new(42);
        let outcome = resolved.apply(&mut case).unwrap();

        assert_eq!(outcome.event, Some(CaseEvent::UpdateCaseOnly));
        let record = case.hearing("H1").unwrap();
        assert_eq!(record.status, Some(HearingStatus::AwaitingListing));
        assert_eq!(record.venue.as_ref().unwrap().name, "Birmingham");
        assert_eq!(record.hearing_date.as_deref(), Some("2024-01-10"));
    }

    #[tokio::test]
    async fn test_two_sessions_raise_listing_error() {
        let resolver = resolver(listed_detail(vec![session(), session()])).await;
        let err = resolver
            .resolve(42, "H1", SchedulingStatus::Listed)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Listing { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_clears_work_basket() {
        let mut detail = listed_detail(vec![session()]);
        detail.request.cancellation_reason_codes = vec![CancellationReason::Withdrawn];
        let resolver = resolver(detail).await;

        let resolved = resolver
            .resolve(42, "H1", SchedulingStatus::Cancelled)
            .await
            .unwrap()
            .expect("actionable");

        let mut case = CaseSnapshot::new(42);
        case.work_basket.hearing_date = NaiveDate::from_ymd_opt(2024, 1, 10);
        case.work_basket.venue_code = Some("V100".to_string());

        let outcome = resolved.apply(&mut case).unwrap();
        assert_eq!(outcome.event, Some(CaseEvent::HearingCancelled));
        assert!(case.work_basket.hearing_date.is_none());
        assert!(case.work_basket.venue_code.is_none());
    }

    #[tokio::test]
    async fn test_postponement_reason_maps_to_postponed_event() {
        let mut detail = listed_detail(vec![session()]);
        detail.request.cancellation_reason_codes = vec![CancellationReason::Postponed];
        let resolver = resolver(detail).await;

        let resolved = resolver
            .resolve(42, "H1", SchedulingStatus::Cancelled)
            .await
            .unwrap()
            .expect("actionable");

        let mut case = CaseSnapshot::new(42);
        let outcome = resolved.apply(&mut case).unwrap();
        assert_eq!(outcome.event, Some(CaseEvent::HearingPostponed));
    }

    #[test]
    fn test_unmapped_status_is_data_only() {
        let detail = listed_detail(vec![session()]);
        let case = CaseSnapshot::new(42);
        assert!(resolve_case_event(SchedulingStatus::Completed, &detail, &case).is_none());
    }
}

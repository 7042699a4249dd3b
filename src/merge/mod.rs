//! Hearing Detail Merge
//!
//! Projects a fetched scheduling detail's single session onto the matching
//! case hearing record, creating the record the first time the hearing
//! identifier is seen.
//!
//! Split into two stages so the update protocol's mutation stays pure:
//! `prepare` does the collaborator lookups (venue directory, judicial
//! reference) and produces a `HearingMergePlan`; `apply_to` assigns fields
//! on the snapshot and is idempotent — merging the same plan twice yields
//! exactly one record, with the later values winning.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

use crate::model::{
    CaseSnapshot, HearingChannel, PanelAssignment, SchedulingDetail, SessionSchedule, Venue,
};
use crate::refdata::{JudicialReference, VenueDirectory};
use crate::types::{Result, SyncError};

/// Exactly one session schedule is expected per hearing identifier.
pub const EXPECTED_SESSIONS: usize = 1;

/// Pure projection of one scheduling detail onto a case hearing record.
#[derive(Debug, Clone, PartialEq)]
pub struct HearingMergePlan {
    pub hearing_id: String,
    pub venue_code: String,
    pub venue: Venue,
    pub start_local: NaiveDateTime,
    pub end_local: NaiveDateTime,
    /// `yyyy-MM-dd`
    pub hearing_date: String,
    /// `HH:MM:SS.3f`
    pub time_of_day: String,
    pub channel: Option<HearingChannel>,
    pub panel: Option<PanelAssignment>,
    pub version: i64,
}

impl HearingMergePlan {
    /// Find-or-append the record by hearing identifier and assign fields.
    /// A repeated apply for the same identifier reuses the existing record.
    pub fn apply_to(&self, case: &mut CaseSnapshot) {
        let record = case.hearing_mut_or_insert(&self.hearing_id);
        record.venue_code = Some(self.venue_code.clone());
        record.venue = Some(self.venue.clone());
        record.start = Some(self.start_local);
        record.end = Some(self.end_local);
        record.hearing_date = Some(self.hearing_date.clone());
        record.time_of_day = Some(self.time_of_day.clone());
        if self.channel.is_some() {
            record.channel = self.channel;
        }
        if self.panel.is_some() {
            record.panel = self.panel.clone();
        }
        record.version = self.version;
    }
}

/// Builds merge plans from scheduling details.
pub struct HearingDetailMerge {
    venues: Arc<dyn VenueDirectory>,
    judicial: Arc<dyn JudicialReference>,
    tz: Tz,
    panel_enabled: bool,
}

impl HearingDetailMerge {
    pub fn new(
        venues: Arc<dyn VenueDirectory>,
        judicial: Arc<dyn JudicialReference>,
        tz: Tz,
        panel_enabled: bool,
    ) -> Self {
        Self {
            venues,
            judicial,
            tz,
            panel_enabled,
        }
    }

    /// Resolve everything the merge needs up front. Structural problems
    /// (wrong session count, unknown/inactive venue) surface as listing
    /// errors here and are never retried.
    pub async fn prepare(
        &self,
        detail: &SchedulingDetail,
        case_id: i64,
    ) -> Result<HearingMergePlan> {
        let hearing_id = detail.hearing_id();
        let session = single_session(detail, case_id)?;

        let venue = self
            .venues
            .resolve_venue(&session.venue_code)
            .await?
            .ok_or_else(|| {
                SyncError::listing(
                    format!(
                        "Unable to resolve venue {} for case {} and hearing {}",
                        session.venue_code, case_id, hearing_id
                    ),
                    format!(
                        "Invalid venue code {}, unable to find an active venue with that code, regarding case {} and hearing {}",
                        session.venue_code, case_id, hearing_id
                    ),
                )
            })?;

        let start_local = self.localize(session.start_utc);
        let end_local = self.localize(session.end_utc);

        let panel = if self.panel_enabled {
            self.resolve_panel(session).await?
        } else {
            None
        };

        debug!(
            case_id,
            hearing_id,
            venue_code = %session.venue_code,
            start = %start_local,
            "Prepared hearing merge"
        );

        Ok(HearingMergePlan {
            hearing_id: hearing_id.to_string(),
            venue_code: session.venue_code.clone(),
            venue,
            start_local,
            end_local,
            hearing_date: start_local.format("%Y-%m-%d").to_string(),
            time_of_day: start_local.format("%H:%M:%S%.3f").to_string(),
            channel: session.channel,
            panel,
            version: detail.request.version,
        })
    }

    /// Scheduling timestamps are reported in UTC; hearings are recorded in
    /// the case's local timezone.
    fn localize(&self, utc: NaiveDateTime) -> NaiveDateTime {
        self.tz.from_utc_datetime(&utc).naive_local()
    }

    async fn resolve_panel(&self, session: &SessionSchedule) -> Result<Option<PanelAssignment>> {
        if session.judge_code.is_none() && session.panel_member_codes.is_empty() {
            return Ok(None);
        }

        let assigned_to = match &session.judge_code {
            Some(code) => Some(self.judicial.resolve_identity(code).await?),
            None => None,
        };

        let mut members = Vec::with_capacity(session.panel_member_codes.len());
        for code in &session.panel_member_codes {
            members.push(self.judicial.resolve_identity(code).await?);
        }

        Ok(Some(PanelAssignment {
            assigned_to,
            members,
        }))
    }
}

/// Enforce the one-session invariant and hand back the session.
pub fn single_session<'a>(
    detail: &'a SchedulingDetail,
    case_id: i64,
) -> Result<&'a SessionSchedule> {
    if detail.sessions.len() != EXPECTED_SESSIONS {
        return Err(SyncError::listing(
            format!(
                "Invalid number of sessions for case {} and hearing {}",
                case_id,
                detail.hearing_id()
            ),
            format!(
                "Invalid session schedule, expected {} session but found {}, for case {} and hearing {}",
                EXPECTED_SESSIONS,
                detail.sessions.len(),
                case_id,
                detail.hearing_id()
            ),
        ));
    }
    Ok(&detail.sessions[0])
}

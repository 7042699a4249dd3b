//! Domain model for hearing synchronization
//!
//! - `case`: the authoritative case record snapshot and its hearing history
//! - `hearing`: scheduling-service payloads and status codes
//! - `messages`: inbound notifications and case-originated work items

pub mod case;
pub mod hearing;
pub mod messages;

pub use case::{
    AppealSummary, CaseEvent, CaseHearingRecord, CaseSnapshot, DwpState, HearingStatus,
    JudicialIdentity, PanelAssignment, Venue, WorkBasketFields,
};
pub use hearing::{
    CancellationReason, CaseHearingSummary, HearingCancelPayload, HearingChannel,
    HearingRequestPayload, HearingUpdateResponse, ListingStatus, RequestSection, ResponseSection,
    SchedulingDetail, SchedulingStatus, SessionSchedule,
};
pub use messages::{HearingRequest, HearingRoute, HearingState, InboundStatusNotification};

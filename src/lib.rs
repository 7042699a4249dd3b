//! hearing-sync - Hearing lifecycle synchronization engine
//!
//! Keeps tribunal appeal case records and the hearing scheduling service
//! consistent, in both directions:
//!
//! - **Inbound**: status notifications from the scheduling service are
//!   resolved against the live hearing detail and committed onto the case
//!   through an optimistic start/submit protocol
//! - **Outbound**: case-originated hearing requests (create, amend,
//!   cancel, post-adjournment re-create) are driven through the
//!   scheduling service and their outcome recorded on the case
//!
//! Structural scheduling problems (wrong session count, unknown venue,
//! unlistable duration) are never retried; they surface as a listing
//! error event for caseworker review.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod merge;
pub mod model;
pub mod orchestrate;
pub mod refdata;
pub mod resolve;
pub mod sched;
pub mod store;
pub mod types;

pub use config::Args;
pub use types::{Result, SyncError};

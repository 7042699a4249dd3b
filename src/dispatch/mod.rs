//! Message ingestion and dispatch
//!
//! Admission control and fan-out for inbound status notifications:
//! - Fixed pool of worker tasks (no per-notification tasks)
//! - Bounded queue under load, fire-and-forget handoff
//! - Per-notification correlation id carried through the logs
//!
//! Processing failures are logged with full context and never crash the
//! pool; the notification source is not nacked.

pub mod subscriber;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::model::{CaseEvent, InboundStatusNotification};
use crate::resolve::StatusResolver;
use crate::store::{CaseRecordStore, CaseUpdateProtocol, DynamicEventUpdateResult};
use crate::types::{Result, SyncError};

/// Terminal outcome of processing one notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Recognized as requiring no case change.
    NotHandled,
    /// Case mutated and committed.
    Committed {
        event: Option<CaseEvent>,
        version: i64,
    },
    /// A structural listing error was recorded on the case for human
    /// review; the notification itself is consumed.
    ListingErrorRecorded,
}

/// Processes one notification end to end: resolve, mutate, commit.
pub struct NotificationProcessor<S> {
    resolver: StatusResolver,
    protocol: CaseUpdateProtocol<S>,
}

impl<S: CaseRecordStore> NotificationProcessor<S> {
    pub fn new(resolver: StatusResolver, protocol: CaseUpdateProtocol<S>) -> Self {
        Self { resolver, protocol }
    }

    pub async fn process(&self, notification: &InboundStatusNotification) -> Result<Outcome> {
        let case_id = notification.case_id;
        let hearing_id = notification.hearing_id.as_str();

        let resolved = match self
            .resolver
            .resolve(case_id, hearing_id, notification.status)
            .await
        {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return Ok(Outcome::NotHandled),
            Err(err) if err.is_listing() => {
                return self.record_listing_error(case_id, err).await;
            }
            Err(err) => return Err(err),
        };

        // Token event is previewed against the current snapshot so the
        // update opens under the event it will commit. Data-only updates
        // open under a neutral event.
        let preview = self.protocol.store().fetch(case_id).await?;
        let token_event = resolved
            .expected_event(&preview)
            .unwrap_or(CaseEvent::CaseUpdated);

        let receipt = self
            .protocol
            .commit(case_id, token_event, &|case| resolved.apply(case))
            .await?;

        info!(
            case_id,
            hearing_id,
            status = %notification.status,
            version = receipt.version,
            event = receipt.event.map(|e| e.code()).unwrap_or("none"),
            "Notification committed"
        );
        Ok(Outcome::Committed {
            event: receipt.event,
            version: receipt.version,
        })
    }

    /// Record a structural listing error as exactly one listing-error
    /// event on the case. The original error is swallowed only once the
    /// recording commit succeeds; if recording fails the caller sees both.
    async fn record_listing_error(&self, case_id: i64, err: SyncError) -> Result<Outcome> {
        let SyncError::Listing {
            summary,
            description,
        } = &err
        else {
            return Err(err);
        };

        warn!(case_id, error = %err, "Recording listing error on case");

        let summary = summary.clone();
        let description = description.clone();
        let committed = self
            .protocol
            .commit(case_id, CaseEvent::ListingError, &|_case| {
                Ok(DynamicEventUpdateResult::with_event(
                    CaseEvent::ListingError,
                    summary.clone(),
                    description.clone(),
                ))
            })
            .await;

        match committed {
            Ok(_) => Ok(Outcome::ListingErrorRecorded),
            Err(commit_err) => Err(SyncError::Internal(format!(
                "failed to record listing error for case {} ({}): {}",
                case_id, err, commit_err
            ))),
        }
    }
}

/// One queued notification, with an optional completion channel for
/// callers that need the outcome.
struct PoolJob {
    notification: InboundStatusNotification,
    correlation_id: Uuid,
    done_tx: Option<oneshot::Sender<Result<Outcome>>>,
    _permit: OwnedSemaphorePermit,
}

/// Configuration for the dispatch pool.
pub struct DispatchConfig {
    /// Number of worker tasks
    pub worker_count: usize,
    /// Maximum queued notifications
    pub max_queue_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_queue_size: 1000,
        }
    }
}

/// Fixed pool of workers draining a bounded notification queue.
pub struct DispatchPool {
    job_tx: mpsc::Sender<PoolJob>,
    semaphore: Arc<Semaphore>,
}

impl DispatchPool {
    /// Create and start the pool.
    pub fn new<S: CaseRecordStore + 'static>(
        config: DispatchConfig,
        processor: Arc<NotificationProcessor<S>>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<PoolJob>(config.max_queue_size);
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        let semaphore = Arc::new(Semaphore::new(config.max_queue_size));

        info!("Starting dispatch pool with {} workers", config.worker_count);

        for i in 0..config.worker_count {
            let job_rx = Arc::clone(&job_rx);
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                worker_task(i, job_rx, processor).await;
            });
        }

        Self { job_tx, semaphore }
    }

    /// Queue a notification without waiting for its outcome. Backpressure:
    /// waits for queue capacity, never drops.
    pub async fn handle(&self, notification: InboundStatusNotification) -> Result<()> {
        self.enqueue(notification, None).await
    }

    /// Queue a notification and wait for its terminal outcome.
    pub async fn handle_and_wait(
        &self,
        notification: InboundStatusNotification,
    ) -> Result<Outcome> {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(notification, Some(done_tx)).await?;
        done_rx
            .await
            .map_err(|_| SyncError::Queue("Outcome channel closed".into()))?
    }

    async fn enqueue(
        &self,
        notification: InboundStatusNotification,
        done_tx: Option<oneshot::Sender<Result<Outcome>>>,
    ) -> Result<()> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Queue("Pool semaphore closed".into()))?;

        let job = PoolJob {
            notification,
            correlation_id: Uuid::new_v4(),
            done_tx,
            _permit: permit,
        };

        self.job_tx
            .send(job)
            .await
            .map_err(|_| SyncError::Queue("Dispatch pool closed".into()))
    }

    /// Remaining queue capacity (approximate).
    pub fn queue_capacity(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Worker task draining the shared queue.
async fn worker_task<S: CaseRecordStore>(
    worker_id: usize,
    job_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PoolJob>>>,
    processor: Arc<NotificationProcessor<S>>,
) {
    debug!("Dispatch worker {} starting", worker_id);

    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            match rx.recv().await {
                Some(j) => j,
                None => {
                    info!("Dispatch worker {} shutting down (channel closed)", worker_id);
                    return;
                }
            }
        };

        let case_id = job.notification.case_id;
        let hearing_id = job.notification.hearing_id.clone();
        debug!(
            worker_id,
            case_id,
            hearing_id = %hearing_id,
            correlation_id = %job.correlation_id,
            "Processing notification"
        );

        let result = processor.process(&job.notification).await;

        if let Err(err) = &result {
            error!(
                worker_id,
                case_id,
                hearing_id = %hearing_id,
                correlation_id = %job.correlation_id,
                error = %err,
                "Notification processing failed"
            );
        }

        if let Some(done_tx) = job.done_tx {
            let _ = done_tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::merge::HearingDetailMerge;
    use crate::model::{
        CaseSnapshot, HearingChannel, ListingStatus, RequestSection, ResponseSection,
        SchedulingDetail, SchedulingStatus, SessionSchedule, Venue,
    };
    use crate::refdata::{InMemoryJudicialReference, InMemoryVenueDirectory};
    use crate::sched::InMemorySchedulingService;
    use crate::store::InMemoryRecordStore;

    fn notification(status: SchedulingStatus) -> InboundStatusNotification {
        InboundStatusNotification {
            case_id: 42,
            hearing_id: "H1".to_string(),
            status,
            cancellation_reason_codes: Vec::new(),
            version: 1,
            service_code: "BBA3".to_string(),
        }
    }

    fn detail(sessions: usize) -> SchedulingDetail {
        let session = SessionSchedule {
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
        };
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
            sessions: std::iter::repeat(session).take(sessions).collect(),
        }
    }

    async fn processor(
        detail: SchedulingDetail,
    ) -> (
        Arc<NotificationProcessor<InMemoryRecordStore>>,
        Arc<InMemoryRecordStore>,
    ) {
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

        let resolver = StatusResolver::new(
            Arc::new(sched),
            HearingDetailMerge::new(
                Arc::new(venues),
                Arc::new(InMemoryJudicialReference::new()),
                chrono_tz::Europe::London,
                false,
            ),
        );

        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(CaseSnapshot::new(42)).await;
        let protocol = CaseUpdateProtocol::new(Arc::clone(&store));

        (
            Arc::new(NotificationProcessor::new(resolver, protocol)),
            store,
        )
    }

    #[tokio::test]
    async fn test_listed_notification_commits_booking() {
        let (processor, store) = processor(detail(1)).await;
        let outcome = processor
            .process(&notification(SchedulingStatus::Listed))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            Outcome::Committed {
                event: Some(CaseEvent::HearingBooked),
                ..
            }
        ));
        let events = store.events(42).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, CaseEvent::HearingBooked);
    }

    #[tokio::test]
    async fn test_not_handled_status_never_touches_store() {
        let (processor, store) = processor(detail(1)).await;
        let outcome = processor
            .process(&notification(SchedulingStatus::HearingRequested))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(store.start_call_count(), 0);
        assert_eq!(store.submit_call_count(), 0);
    }

    #[tokio::test]
    async fn test_structural_error_records_exactly_one_listing_error() {
        let (processor, store) = processor(detail(2)).await;
        let outcome = processor
            .process(&notification(SchedulingStatus::Listed))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::ListingErrorRecorded);
        let events = store.events(42).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, CaseEvent::ListingError);
        assert!(events[0].summary.contains("hearing H1"));

        // The failed merge must not have written hearing data.
        let case = store.fetch(42).await.unwrap();
        assert!(case.hearings.is_empty());
    }

    #[tokio::test]
    async fn test_pool_processes_fire_and_forget() {
        let (processor, store) = processor(detail(1)).await;
        let pool = DispatchPool::new(
            DispatchConfig {
                worker_count: 2,
                max_queue_size: 8,
            },
            processor,
        );

        let outcome = pool
            .handle_and_wait(notification(SchedulingStatus::Listed))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Committed { .. }));
        assert_eq!(store.events(42).await.len(), 1);
    }
}

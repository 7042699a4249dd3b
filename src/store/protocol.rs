//! Case Update Protocol
//!
//! The single path by which this engine persists a case mutation: start a
//! token, apply the mutation in memory, submit under the token. Two commits
//! against the same base version never both succeed; the loser sees a typed
//! conflict.
//!
//! `commit` fails fast and is what notification processing uses.
//! `commit_with_retry` re-runs the whole start/mutate/submit sequence a
//! bounded number of times and is what the orchestrators compose.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{CaseRecordStore, CommitReceipt};
use crate::model::{CaseEvent, CaseSnapshot};
use crate::types::Result;

/// Output of one mutation attempt: the event to raise, if any, and its text.
#[derive(Debug, Clone)]
pub struct DynamicEventUpdateResult {
    pub summary: String,
    pub description: String,
    pub trigger_event: bool,
    pub event: Option<CaseEvent>,
}

impl DynamicEventUpdateResult {
    /// Mutation that raises a case event.
    pub fn with_event(
        event: CaseEvent,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            trigger_event: true,
            event: Some(event),
        }
    }

    /// Mutation persisted as a silent data update.
    pub fn data_only(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: String::new(),
            trigger_event: false,
            event: None,
        }
    }

    fn event_for_submit(&self, case_id: i64) -> Option<CaseEvent> {
        if !self.trigger_event {
            return None;
        }
        if self.event.is_none() {
            warn!(case_id, "Mutation asked to trigger an event but resolved none; committing data-only");
        }
        self.event
    }
}

/// Retry bounds for `commit_with_retry`.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Read-modify-write primitive over the record store.
pub struct CaseUpdateProtocol<S> {
    store: Arc<S>,
    config: ProtocolConfig,
}

impl<S: CaseRecordStore> CaseUpdateProtocol<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ProtocolConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ProtocolConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// One start/mutate/submit attempt. The mutation function must be pure
    /// over the snapshot it is given: all collaborator lookups happen
    /// before the token is taken.
    pub async fn commit<F>(
        &self,
        case_id: i64,
        token_event: CaseEvent,
        mutate: &F,
    ) -> Result<CommitReceipt>
    where
        F: Fn(&mut CaseSnapshot) -> Result<DynamicEventUpdateResult> + Send + Sync,
    {
        let started = self.store.start_update(case_id, token_event).await?;
        debug!(
            case_id,
            base_version = started.version,
            token_event = %token_event,
            "Opened case update"
        );

        let mut case = started.case;
        let outcome = mutate(&mut case)?;

        let event = outcome.event_for_submit(case_id);
        let receipt = self
            .store
            .submit(
                &started.token,
                case,
                event,
                &outcome.summary,
                &outcome.description,
            )
            .await?;

        debug!(
            case_id,
            version = receipt.version,
            event = receipt.event.map(|e| e.code()).unwrap_or("none"),
            "Committed case update"
        );
        Ok(receipt)
    }

    /// Bounded retry wrapper: on a conflict or transient transport failure
    /// the whole sequence is re-run, so the mutation recomputes against the
    /// fresh snapshot. Gives up after the configured attempts.
    pub async fn commit_with_retry<F>(
        &self,
        case_id: i64,
        token_event: CaseEvent,
        mutate: &F,
    ) -> Result<CommitReceipt>
    where
        F: Fn(&mut CaseSnapshot) -> Result<DynamicEventUpdateResult> + Send + Sync,
    {
        let mut attempt = 1;
        loop {
            match self.commit(case_id, token_event, mutate).await {
                Ok(receipt) => return Ok(receipt),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    warn!(
                        case_id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "Case commit failed, retrying"
                    );
                    tokio::time::sleep(self.config.backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{InMemoryRecordStore, StartedUpdate};
    use crate::types::SyncError;

    #[tokio::test]
    async fn test_data_only_commit_keeps_event_history_unchanged() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(CaseSnapshot::new(42)).await;
        let protocol = CaseUpdateProtocol::new(Arc::clone(&store));

        let receipt = protocol
            .commit(42, CaseEvent::CaseUpdated, &|case: &mut CaseSnapshot| {
                case.adjournment_in_progress = true;
                Ok(DynamicEventUpdateResult::data_only("silent update"))
            })
            .await
            .unwrap();

        assert!(receipt.event.is_none());
        assert!(store.events(42).await.is_empty());
        assert!(store.fetch(42).await.unwrap().adjournment_in_progress);
    }

    #[tokio::test]
    async fn test_event_commit_records_summary() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(CaseSnapshot::new(42)).await;
        let protocol = CaseUpdateProtocol::new(Arc::clone(&store));

        protocol
            .commit(42, CaseEvent::HearingBooked, &|_case: &mut CaseSnapshot| {
                Ok(DynamicEventUpdateResult::with_event(
                    CaseEvent::HearingBooked,
                    "Hearing H1 listed",
                    "Hearing H1 listed for case 42",
                ))
            })
            .await
            .unwrap();

        let events = store.events(42).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, CaseEvent::HearingBooked);
        assert_eq!(events[0].summary, "Hearing H1 listed");
    }

    /// Store wrapper whose submits conflict a fixed number of times before
    /// delegating.
    struct ConflictingStore {
        inner: InMemoryRecordStore,
        conflicts_left: AtomicUsize,
    }

    #[async_trait]
    impl crate::store::CaseRecordStore for ConflictingStore {
        async fn start_update(&self, case_id: i64, event: CaseEvent) -> crate::types::Result<StartedUpdate> {
            self.inner.start_update(case_id, event).await
        }

        async fn submit(
            &self,
            token: &str,
            case: CaseSnapshot,
            event: Option<CaseEvent>,
            summary: &str,
            description: &str,
        ) -> crate::types::Result<crate::store::CommitReceipt> {
            if self.conflicts_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
                return Err(SyncError::Conflict {
                    case_id: case.case_id,
                    message: "forced conflict".to_string(),
                });
            }
            self.inner.submit(token, case, event, summary, description).await
        }

        async fn fetch(&self, case_id: i64) -> crate::types::Result<CaseSnapshot> {
            self.inner.fetch(case_id).await
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_conflicts_within_bounds() {
        let store = Arc::new(ConflictingStore {
            inner: InMemoryRecordStore::new(),
            conflicts_left: AtomicUsize::new(2),
        });
        store.inner.insert(CaseSnapshot::new(1)).await;

        let protocol = CaseUpdateProtocol::with_config(
            Arc::clone(&store),
            ProtocolConfig {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            },
        );

        let receipt = protocol
            .commit_with_retry(1, CaseEvent::AddHearing, &|_case: &mut CaseSnapshot| {
                Ok(DynamicEventUpdateResult::with_event(
                    CaseEvent::AddHearing,
                    "Hearing request created",
                    "",
                ))
            })
            .await
            .unwrap();
        assert_eq!(receipt.event, Some(CaseEvent::AddHearing));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_conflict() {
        let store = Arc::new(ConflictingStore {
            inner: InMemoryRecordStore::new(),
            conflicts_left: AtomicUsize::new(10),
        });
        store.inner.insert(CaseSnapshot::new(1)).await;

        let protocol = CaseUpdateProtocol::with_config(
            Arc::clone(&store),
            ProtocolConfig {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
            },
        );

        let err = protocol
            .commit_with_retry(1, CaseEvent::AddHearing, &|_case: &mut CaseSnapshot| {
                Ok(DynamicEventUpdateResult::data_only(""))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict { .. }));
    }
}

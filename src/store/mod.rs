//! Case record store boundary
//!
//! The record store is the authoritative home of case data, reached through
//! an optimistic-concurrency start/submit pair. `start_update` hands out a
//! token pinned to the case's current version; `submit` commits under that
//! token and fails with a typed conflict if the version moved in between.
//!
//! The in-memory implementation backs dev mode and tests.

pub mod http;
pub mod protocol;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{CaseEvent, CaseSnapshot};
use crate::types::{Result, SyncError};

pub use http::{HttpRecordStore, HttpRecordStoreConfig};
pub use protocol::{CaseUpdateProtocol, DynamicEventUpdateResult, ProtocolConfig};

/// An open update transaction: token plus the version and snapshot it was
/// pinned to.
#[derive(Debug, Clone)]
pub struct StartedUpdate {
    pub token: String,
    pub version: i64,
    pub case: CaseSnapshot,
}

/// Receipt for a committed update.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub case_id: i64,
    pub version: i64,
    pub event: Option<CaseEvent>,
}

/// Authoritative case record store.
///
/// `submit` must reject two commits against the same base version, and must
/// reject any snapshot that lowers an existing hearing record's version.
#[async_trait]
pub trait CaseRecordStore: Send + Sync {
    /// Open an update transaction under the given event code and return
    /// the current snapshot. Does not block other starts.
    async fn start_update(&self, case_id: i64, event: CaseEvent) -> Result<StartedUpdate>;

    /// Commit a mutated snapshot under a start token. `event == None` is a
    /// data-only update with no workflow transition.
    async fn submit(
        &self,
        token: &str,
        case: CaseSnapshot,
        event: Option<CaseEvent>,
        summary: &str,
        description: &str,
    ) -> Result<CommitReceipt>;

    /// Read the current snapshot without opening a transaction.
    async fn fetch(&self, case_id: i64) -> Result<CaseSnapshot>;
}

/// A case event that was committed, as recorded by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedEvent {
    pub event: CaseEvent,
    pub summary: String,
    pub description: String,
}

struct StoredCase {
    version: i64,
    case: CaseSnapshot,
    events: Vec<CommittedEvent>,
}

struct OpenToken {
    case_id: i64,
    base_version: i64,
}

/// In-memory record store for dev mode and tests.
pub struct InMemoryRecordStore {
    cases: RwLock<HashMap<i64, StoredCase>>,
    tokens: RwLock<HashMap<String, OpenToken>>,
    start_calls: AtomicUsize,
    submit_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            start_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
        }
    }

    /// Seed a case at version 1.
    pub async fn insert(&self, case: CaseSnapshot) {
        self.cases.write().await.insert(
            case.case_id,
            StoredCase {
                version: 1,
                case,
                events: Vec::new(),
            },
        );
    }

    /// Events committed for a case, in order.
    pub async fn events(&self, case_id: i64) -> Vec<CommittedEvent> {
        self.cases
            .read()
            .await
            .get(&case_id)
            .map(|c| c.events.clone())
            .unwrap_or_default()
    }

    pub async fn version(&self, case_id: i64) -> Option<i64> {
        self.cases.read().await.get(&case_id).map(|c| c.version)
    }

    /// Number of `start_update` calls seen, for asserting no-op paths.
    pub fn start_call_count(&self) -> usize {
        self.start_calls.load(Ordering::Relaxed)
    }

    pub fn submit_call_count(&self) -> usize {
        self.submit_calls.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaseRecordStore for InMemoryRecordStore {
    async fn start_update(&self, case_id: i64, _event: CaseEvent) -> Result<StartedUpdate> {
        self.start_calls.fetch_add(1, Ordering::Relaxed);

        let cases = self.cases.read().await;
        let stored = cases
            .get(&case_id)
            .ok_or_else(|| SyncError::NotFound(format!("Case {} not found", case_id)))?;

        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(
            token.clone(),
            OpenToken {
                case_id,
                base_version: stored.version,
            },
        );

        Ok(StartedUpdate {
            token,
            version: stored.version,
            case: stored.case.clone(),
        })
    }

    async fn submit(
        &self,
        token: &str,
        case: CaseSnapshot,
        event: Option<CaseEvent>,
        summary: &str,
        description: &str,
    ) -> Result<CommitReceipt> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);

        let open = self
            .tokens
            .write()
            .await
            .remove(token)
            .ok_or_else(|| SyncError::NotFound(format!("Unknown start token {}", token)))?;

        let mut cases = self.cases.write().await;
        let stored = cases
            .get_mut(&open.case_id)
            .ok_or_else(|| SyncError::NotFound(format!("Case {} not found", open.case_id)))?;

        if stored.version != open.base_version {
            return Err(SyncError::Conflict {
                case_id: open.case_id,
                message: format!(
                    "token base version {} but case is at version {}",
                    open.base_version, stored.version
                ),
            });
        }

        for hearing in &case.hearings {
            if let Some(existing) = stored.case.hearing(&hearing.hearing_id) {
                if hearing.version < existing.version {
                    return Err(SyncError::Conflict {
                        case_id: open.case_id,
                        message: format!(
                            "hearing {} version {} would regress below {}",
                            hearing.hearing_id, hearing.version, existing.version
                        ),
                    });
                }
            }
        }

        stored.version += 1;
        stored.case = case;
        if let Some(event) = event {
            stored.events.push(CommittedEvent {
                event,
                summary: summary.to_string(),
                description: description.to_string(),
            });
        }

        Ok(CommitReceipt {
            case_id: open.case_id,
            version: stored.version,
            event,
        })
    }

    async fn fetch(&self, case_id: i64) -> Result<CaseSnapshot> {
        self.cases
            .read()
            .await
            .get(&case_id)
            .map(|c| c.case.clone())
            .ok_or_else(|| SyncError::NotFound(format!("Case {} not found", case_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_base_version_commits_exactly_once() {
        let store = InMemoryRecordStore::new();
        store.insert(CaseSnapshot::new(42)).await;

        let first = store.start_update(42, CaseEvent::CaseUpdated).await.unwrap();
        let second = store.start_update(42, CaseEvent::CaseUpdated).await.unwrap();
        assert_eq!(first.version, second.version);

        store
            .submit(&first.token, first.case, None, "", "")
            .await
            .unwrap();

        let err = store
            .submit(&second.token, second.case, None, "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict { case_id: 42, .. }));
    }

    #[tokio::test]
    async fn test_hearing_version_never_regresses() {
        let store = InMemoryRecordStore::new();
        let mut case = CaseSnapshot::new(7);
        case.hearing_mut_or_insert("H1").version = 2;
        store.insert(case).await;

        let started = store.start_update(7, CaseEvent::CaseUpdated).await.unwrap();
        let mut stale = started.case.clone();
        stale.hearing_mut("H1").unwrap().version = 1;

        let err = store
            .submit(&started.token, stale, None, "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_data_only_submit_records_no_event() {
        let store = InMemoryRecordStore::new();
        store.insert(CaseSnapshot::new(9)).await;

        let started = store.start_update(9, CaseEvent::CaseUpdated).await.unwrap();
        let mut case = started.case.clone();
        case.adjournment_in_progress = true;
        store.submit(&started.token, case, None, "", "").await.unwrap();

        assert!(store.events(9).await.is_empty());
        assert!(store.fetch(9).await.unwrap().adjournment_in_progress);
        assert_eq!(store.version(9).await, Some(2));
    }

    #[tokio::test]
    async fn test_fetch_missing_case_is_not_found() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(
            store.fetch(99).await.unwrap_err(),
            SyncError::NotFound(_)
        ));
    }
}

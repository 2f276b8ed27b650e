use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tokio::sync::Mutex;

use super::verification::VerificationResult;
use crate::core::{definition::ExchangeDefinition, vp_request::VpRequest};

/// One live instantiation of an exchange definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeExecution {
    pub transaction_id: String,
    pub exchange_id: String,
    pub state: ExecutionState,
    pub vp_request: VpRequest,
    pub transactions: Vec<ExchangeTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<PresentationReview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeExecution {
    pub fn new(
        transaction_id: String,
        exchange_id: String,
        vp_request: VpRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            exchange_id,
            state: ExecutionState::Started,
            vp_request,
            transactions: Vec::new(),
            review: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, update: ExecutionUpdate) {
        self.state = update.state;
        self.updated_at = update.at;
        if let Some(transaction) = update.transaction {
            self.transactions.push(transaction);
        }
        if let Some(review) = update.review {
            self.review = Some(review);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    /// Waiting for a submission.
    Started,
    /// A verified submission is waiting for mediator review.
    Submitted,
    /// The submission was accepted.
    Verified,
    /// The submission was rejected.
    Failed,
    /// No submission arrived before the session TTL.
    Expired,
}

impl ExecutionState {
    /// Terminal sessions never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Verified | ExecutionState::Failed | ExecutionState::Expired
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Started => "started",
            ExecutionState::Submitted => "submitted",
            ExecutionState::Verified => "verified",
            ExecutionState::Failed => "failed",
            ExecutionState::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Audit record of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTransaction {
    pub transaction_id: String,
    pub submitted_at: DateTime<Utc>,
    pub verification_result: VerificationResult,
    /// The submission as received; opaque to the engine.
    pub raw_submission: Json,
}

/// A mediator's decision on a `submitted` session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationReview {
    pub decision: ReviewDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// The write half of a conditional state transition.
#[derive(Debug, Clone)]
pub struct ExecutionUpdate {
    pub state: ExecutionState,
    pub at: DateTime<Utc>,
    pub transaction: Option<ExchangeTransaction>,
    pub review: Option<PresentationReview>,
}

impl ExecutionUpdate {
    pub fn to(state: ExecutionState, at: DateTime<Utc>) -> Self {
        Self {
            state,
            at,
            transaction: None,
            review: None,
        }
    }

    pub fn with_transaction(mut self, transaction: ExchangeTransaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn with_review(mut self, review: PresentationReview) -> Self {
        self.review = Some(review);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An execution with this transaction id already exists.
    #[error("transaction id '{0}' already exists")]
    AlreadyExists(String),

    /// The conditional update lost a race: the execution is no longer in the expected state.
    #[error("expected state {expected}, found {actual}")]
    StaleState {
        expected: ExecutionState,
        actual: ExecutionState,
    },

    #[error("transaction id '{0}' not found")]
    NotFound(String),

    /// Infrastructure failure inside the store.
    #[error("store unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Unavailable(e)
    }
}

/// Storage interface for exchange definitions and sessions.
///
/// Implementations own every piece of shared mutable state and must serialize writes to the
/// same transaction id: [SessionStore::update_execution_state] is a compare-and-swap on the
/// current state.
#[async_trait]
pub trait SessionStore: Debug {
    async fn get_definition(&self, exchange_id: &str)
        -> Result<Option<ExchangeDefinition>, StoreError>;

    /// Insert or atomically replace a definition, keyed by its exchange id.
    async fn put_definition(&self, definition: ExchangeDefinition) -> Result<(), StoreError>;

    /// Store a new execution. Fails with [StoreError::AlreadyExists] on an id collision.
    async fn create_execution(&self, execution: ExchangeExecution) -> Result<(), StoreError>;

    async fn get_execution(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ExchangeExecution>, StoreError>;

    /// Apply `update` only if the execution is still in `expected` state.
    ///
    /// Returns the updated execution, or [StoreError::StaleState] when another writer got
    /// there first.
    async fn update_execution_state(
        &self,
        transaction_id: &str,
        expected: ExecutionState,
        update: ExecutionUpdate,
    ) -> Result<ExchangeExecution, StoreError>;

    /// All executions started from `exchange_id`, oldest first.
    async fn list_executions(&self, exchange_id: &str)
        -> Result<Vec<ExchangeExecution>, StoreError>;

    async fn executions_in_state(
        &self,
        state: ExecutionState,
    ) -> Result<Vec<ExchangeExecution>, StoreError>;
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not work for a distributed
/// deployment.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    store: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    definitions: BTreeMap<String, ExchangeDefinition>,
    executions: BTreeMap<String, ExchangeExecution>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_definition(
        &self,
        exchange_id: &str,
    ) -> Result<Option<ExchangeDefinition>, StoreError> {
        Ok(self.store.lock().await.definitions.get(exchange_id).cloned())
    }

    async fn put_definition(&self, definition: ExchangeDefinition) -> Result<(), StoreError> {
        self.store
            .lock()
            .await
            .definitions
            .insert(definition.exchange_id().to_owned(), definition);
        Ok(())
    }

    async fn create_execution(&self, execution: ExchangeExecution) -> Result<(), StoreError> {
        let mut state = self.store.lock().await;
        if state.executions.contains_key(&execution.transaction_id) {
            return Err(StoreError::AlreadyExists(execution.transaction_id));
        }
        state
            .executions
            .insert(execution.transaction_id.clone(), execution);
        Ok(())
    }

    async fn get_execution(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ExchangeExecution>, StoreError> {
        Ok(self.store.lock().await.executions.get(transaction_id).cloned())
    }

    async fn update_execution_state(
        &self,
        transaction_id: &str,
        expected: ExecutionState,
        update: ExecutionUpdate,
    ) -> Result<ExchangeExecution, StoreError> {
        let mut state = self.store.lock().await;
        let Some(execution) = state.executions.get_mut(transaction_id) else {
            return Err(StoreError::NotFound(transaction_id.to_owned()));
        };
        if execution.state != expected {
            return Err(StoreError::StaleState {
                expected,
                actual: execution.state,
            });
        }
        execution.apply(update);
        Ok(execution.clone())
    }

    async fn list_executions(
        &self,
        exchange_id: &str,
    ) -> Result<Vec<ExchangeExecution>, StoreError> {
        let mut executions: Vec<_> = self
            .store
            .lock()
            .await
            .executions
            .values()
            .filter(|e| e.exchange_id == exchange_id)
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.created_at);
        Ok(executions)
    }

    async fn executions_in_state(
        &self,
        state: ExecutionState,
    ) -> Result<Vec<ExchangeExecution>, StoreError> {
        Ok(self
            .store
            .lock()
            .await
            .executions
            .values()
            .filter(|e| e.state == state)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vp_request::Interact;

    fn execution(id: &str) -> ExchangeExecution {
        let request = VpRequest {
            challenge: "c".into(),
            query: vec![],
            interact: Interact::default(),
        };
        ExchangeExecution::new(id.into(), "ex".into(), request, Utc::now())
    }

    #[tokio::test]
    async fn create_rejects_collisions() {
        let store = MemoryStore::default();
        store.create_execution(execution("a")).await.unwrap();
        assert!(matches!(
            store.create_execution(execution("a")).await,
            Err(StoreError::AlreadyExists(id)) if id == "a"
        ));
    }

    #[tokio::test]
    async fn update_is_conditional_on_state() {
        let store = MemoryStore::default();
        store.create_execution(execution("a")).await.unwrap();

        let updated = store
            .update_execution_state(
                "a",
                ExecutionState::Started,
                ExecutionUpdate::to(ExecutionState::Verified, Utc::now()),
            )
            .await
            .unwrap();
        assert_eq!(updated.state, ExecutionState::Verified);

        let stale = store
            .update_execution_state(
                "a",
                ExecutionState::Started,
                ExecutionUpdate::to(ExecutionState::Failed, Utc::now()),
            )
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::StaleState {
                expected: ExecutionState::Started,
                actual: ExecutionState::Verified
            })
        ));

        assert!(matches!(
            store
                .update_execution_state(
                    "missing",
                    ExecutionState::Started,
                    ExecutionUpdate::to(ExecutionState::Failed, Utc::now()),
                )
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_filters_by_exchange_and_state() {
        let store = MemoryStore::default();
        store.create_execution(execution("a")).await.unwrap();
        let mut other = execution("b");
        other.exchange_id = "other".into();
        store.create_execution(other).await.unwrap();

        assert_eq!(store.list_executions("ex").await.unwrap().len(), 1);
        assert_eq!(
            store
                .executions_in_state(ExecutionState::Started)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!ExecutionState::Started.is_terminal());
        assert!(!ExecutionState::Submitted.is_terminal());
        assert!(ExecutionState::Verified.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert!(ExecutionState::Expired.is_terminal());
    }
}

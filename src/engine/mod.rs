use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    core::{
        definition::{ExchangeDefinition, UntypedExchangeDefinition},
        validation::{DefinitionValidator, ValidationError},
        vp_request::VpRequest,
    },
};

use self::{
    error::ExchangeError,
    id::{IdSource, RandomIdSource},
    session::{
        ExchangeExecution, ExchangeTransaction, ExecutionState, ExecutionUpdate,
        PresentationReview, ReviewDecision, SessionStore, StoreError,
    },
    verification::{PresentationVerifier, Submission, VerificationResult},
};

pub mod error;
pub mod id;
pub mod session;
pub mod sweep;
pub mod verification;

/// Result of [ExchangeEngine::configure_exchange]. Empty `errors` means the definition was
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureOutcome {
    pub errors: Vec<ValidationError>,
}

/// Result of [ExchangeEngine::start_exchange].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedExchange {
    pub exchange_id: String,
    pub transaction_id: String,
    pub vp_request: VpRequest,
}

/// Result of [ExchangeEngine::submit_presentation].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub transaction_id: String,
    pub state: ExecutionState,
    pub verification: VerificationResult,
}

/// Orchestrates exchange definitions and sessions.
///
/// The engine keeps no state between calls: every operation reads from and writes back to the
/// [SessionStore], so a single engine can be shared by any number of concurrent handlers.
#[derive(Debug, Clone)]
pub struct ExchangeEngine {
    config: EngineConfig,
    id_source: Arc<dyn IdSource + Send + Sync>,
    session_store: Arc<dyn SessionStore + Send + Sync>,
    validator: DefinitionValidator,
    verifier: Arc<dyn PresentationVerifier + Send + Sync>,
}

impl ExchangeEngine {
    /// Build a new engine.
    pub fn builder() -> ExchangeEngineBuilder {
        ExchangeEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a definition and, if it is valid, store it under its exchange id.
    ///
    /// Validation failures are returned as data. Reconfiguring an existing exchange id replaces
    /// the definition for sessions started afterwards only.
    pub async fn configure_exchange(
        &self,
        definition: UntypedExchangeDefinition,
    ) -> Result<ConfigureOutcome, ExchangeError> {
        let definition = match self.validator.parse(&definition) {
            Ok(definition) => definition,
            Err(errors) => {
                debug!(
                    exchange_id = %definition.exchange_id,
                    errors = errors.len(),
                    "rejected exchange definition"
                );
                return Ok(ConfigureOutcome { errors });
            }
        };

        let exchange_id = definition.exchange_id().to_owned();
        self.session_store.put_definition(definition).await?;
        info!(%exchange_id, "configured exchange");

        Ok(ConfigureOutcome::default())
    }

    pub async fn get_exchange_definition(
        &self,
        exchange_id: &str,
    ) -> Result<ExchangeDefinition, ExchangeError> {
        self.session_store
            .get_definition(exchange_id)
            .await?
            .ok_or_else(|| ExchangeError::exchange_not_found(exchange_id))
    }

    /// Start a new session of `exchange_id` and render its VP Request.
    pub async fn start_exchange(&self, exchange_id: &str) -> Result<StartedExchange, ExchangeError> {
        let definition = self.get_exchange_definition(exchange_id).await?;

        for attempt in 1..=self.config.max_id_attempts {
            let transaction_id = self.id_source.transaction_id();

            let vp_request = VpRequest::builder(&definition)
                .with_challenge(self.id_source.challenge())
                .build(&transaction_id)
                .map_err(|e| ExchangeError::InvalidDefinition {
                    exchange_id: exchange_id.to_owned(),
                    reason: format!("{e:#}"),
                })?;

            let execution = ExchangeExecution::new(
                transaction_id.clone(),
                exchange_id.to_owned(),
                vp_request.clone(),
                Utc::now(),
            );

            match self.session_store.create_execution(execution).await {
                Ok(()) => {
                    info!(exchange_id, %transaction_id, "started exchange");
                    return Ok(StartedExchange {
                        exchange_id: exchange_id.to_owned(),
                        transaction_id,
                        vp_request,
                    });
                }
                Err(StoreError::AlreadyExists(_)) => {
                    warn!(exchange_id, attempt, "transaction id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ExchangeError::StoreUnavailable(format!(
            "no unique transaction id after {} attempts",
            self.config.max_id_attempts
        )))
    }

    /// Verify a submission for a `started` session and record the attempt.
    ///
    /// At most one submission per session is accepted: a concurrent submission that loses the
    /// conditional update receives [ExchangeError::Conflict] and leaves no transaction behind.
    pub async fn submit_presentation(
        &self,
        transaction_id: &str,
        submission: Submission,
    ) -> Result<SubmissionOutcome, ExchangeError> {
        let execution = self.load_execution(transaction_id).await?;
        let now = Utc::now();

        if self.is_stale(&execution, now) {
            self.expire(transaction_id, now).await?;
            return Err(ExchangeError::Conflict(format!(
                "transaction '{transaction_id}' has expired"
            )));
        }

        if execution.state != ExecutionState::Started {
            return Err(ExchangeError::Conflict(format!(
                "transaction '{transaction_id}' is {} and accepts no submissions",
                execution.state
            )));
        }

        let verification = self
            .verifier
            .verify(
                &execution.vp_request.query,
                &execution.vp_request.challenge,
                &submission,
            )
            .await
            .map_err(|e| {
                warn!(transaction_id, error = %e, "verification unavailable");
                ExchangeError::verification_unavailable()
            })?;

        // The session may have run out while the verifier was working.
        let verified_at = Utc::now();
        if self.is_stale(&execution, verified_at) {
            self.expire(transaction_id, verified_at).await?;
            return Err(ExchangeError::Conflict(format!(
                "transaction '{transaction_id}' expired during verification"
            )));
        }

        let next = match (verification.passed, execution.vp_request.is_mediated()) {
            (true, true) => ExecutionState::Submitted,
            (true, false) => ExecutionState::Verified,
            (false, _) if self.config.allow_retry_after_failure => ExecutionState::Started,
            (false, _) => ExecutionState::Failed,
        };

        let transaction = ExchangeTransaction {
            transaction_id: transaction_id.to_owned(),
            submitted_at: now,
            verification_result: verification.clone(),
            raw_submission: submission.presentation,
        };

        let updated = self
            .session_store
            .update_execution_state(
                transaction_id,
                ExecutionState::Started,
                ExecutionUpdate::to(next, verified_at).with_transaction(transaction),
            )
            .await?;

        info!(
            transaction_id,
            passed = verification.passed,
            state = %updated.state,
            "processed submission"
        );

        Ok(SubmissionOutcome {
            transaction_id: transaction_id.to_owned(),
            state: updated.state,
            verification,
        })
    }

    /// Record a mediator's decision on a `submitted` session.
    pub async fn review_submission(
        &self,
        transaction_id: &str,
        decision: ReviewDecision,
        note: Option<String>,
    ) -> Result<ExchangeExecution, ExchangeError> {
        let execution = self.load_execution(transaction_id).await?;
        if execution.state != ExecutionState::Submitted {
            return Err(ExchangeError::Conflict(format!(
                "transaction '{transaction_id}' is {} and has nothing to review",
                execution.state
            )));
        }

        let now = Utc::now();
        let next = match decision {
            ReviewDecision::Approved => ExecutionState::Verified,
            ReviewDecision::Rejected => ExecutionState::Failed,
        };
        let review = PresentationReview {
            decision,
            note,
            reviewed_at: now,
        };

        let updated = self
            .session_store
            .update_execution_state(
                transaction_id,
                ExecutionState::Submitted,
                ExecutionUpdate::to(next, now).with_review(review),
            )
            .await?;

        info!(transaction_id, state = %updated.state, "reviewed submission");
        Ok(updated)
    }

    /// Current state and transaction history of a session.
    ///
    /// A `started` session past its TTL is reported as `expired` even if the sweep has not
    /// persisted that yet.
    pub async fn get_exchange_state(
        &self,
        transaction_id: &str,
    ) -> Result<ExchangeExecution, ExchangeError> {
        let execution = self.load_execution(transaction_id).await?;
        Ok(self.project(execution, Utc::now()))
    }

    /// Every session started from `exchange_id`, oldest first.
    pub async fn list_transactions(
        &self,
        exchange_id: &str,
    ) -> Result<Vec<ExchangeExecution>, ExchangeError> {
        let now = Utc::now();
        Ok(self
            .session_store
            .list_executions(exchange_id)
            .await?
            .into_iter()
            .map(|e| self.project(e, now))
            .collect())
    }

    /// Persist `expired` for every `started` session past its TTL.
    ///
    /// Returns how many sessions were expired. Sessions that changed state concurrently are
    /// skipped.
    pub async fn sweep_expired(&self) -> Result<usize, ExchangeError> {
        if self.config.session_ttl().is_none() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut expired = 0;
        for execution in self
            .session_store
            .executions_in_state(ExecutionState::Started)
            .await?
        {
            if self.is_stale(&execution, now) && self.expire(&execution.transaction_id, now).await? {
                expired += 1;
            }
        }

        if expired > 0 {
            info!(expired, "expired stale sessions");
        }
        Ok(expired)
    }

    async fn load_execution(&self, transaction_id: &str) -> Result<ExchangeExecution, ExchangeError> {
        self.session_store
            .get_execution(transaction_id)
            .await?
            .ok_or_else(|| ExchangeError::transaction_not_found(transaction_id))
    }

    fn is_stale(&self, execution: &ExchangeExecution, now: DateTime<Utc>) -> bool {
        if execution.state != ExecutionState::Started {
            return false;
        }
        let Some(ttl) = self.config.session_ttl() else {
            return false;
        };
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| execution.created_at.checked_add_signed(ttl))
            .is_some_and(|deadline| now >= deadline)
    }

    fn project(&self, mut execution: ExchangeExecution, now: DateTime<Utc>) -> ExchangeExecution {
        if self.is_stale(&execution, now) {
            execution.state = ExecutionState::Expired;
        }
        execution
    }

    /// Move a `started` session to `expired`. Returns `false` if it was no longer `started`.
    async fn expire(&self, transaction_id: &str, now: DateTime<Utc>) -> Result<bool, ExchangeError> {
        match self
            .session_store
            .update_execution_state(
                transaction_id,
                ExecutionState::Started,
                ExecutionUpdate::to(ExecutionState::Expired, now),
            )
            .await
        {
            Ok(_) => {
                debug!(transaction_id, "expired session");
                Ok(true)
            }
            Err(StoreError::StaleState { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builder struct for [ExchangeEngine].
#[derive(Debug, Clone, Default)]
pub struct ExchangeEngineBuilder {
    config: EngineConfig,
    id_source: Option<Arc<dyn IdSource + Send + Sync>>,
    session_store: Option<Arc<dyn SessionStore + Send + Sync>>,
    verifier: Option<Arc<dyn PresentationVerifier + Send + Sync>>,
}

impl ExchangeEngineBuilder {
    /// Build the engine.
    pub fn build(self) -> Result<ExchangeEngine> {
        let Self {
            config,
            id_source,
            session_store,
            verifier,
        } = self;

        let Some(session_store) = session_store else {
            bail!("session store is required, see `with_session_store`")
        };

        let Some(verifier) = verifier else {
            bail!("presentation verifier is required, see `with_verifier`")
        };

        if config.max_id_attempts == 0 {
            bail!("max_id_attempts must be at least 1")
        }

        Ok(ExchangeEngine {
            validator: DefinitionValidator::new(&config),
            config,
            id_source: id_source.unwrap_or_else(|| Arc::new(RandomIdSource)),
            session_store,
            verifier,
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the [SessionStore] that owns definitions and sessions.
    pub fn with_session_store(
        mut self,
        session_store: Arc<dyn SessionStore + Send + Sync>,
    ) -> Self {
        self.session_store = Some(session_store);
        self
    }

    /// Set the collaborator that verifies submitted presentations.
    pub fn with_verifier(mut self, verifier: Arc<dyn PresentationVerifier + Send + Sync>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Override the default [RandomIdSource].
    pub fn with_id_source(mut self, id_source: Arc<dyn IdSource + Send + Sync>) -> Self {
        self.id_source = Some(id_source);
        self
    }
}

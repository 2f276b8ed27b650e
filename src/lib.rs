//! This library provides an engine for Verifiable Presentation request exchanges: a verifier
//! declares what evidence it wants and how a holder may deliver it, then runs any number of
//! sessions of that exchange concurrently.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use vp_exchange::engine::{session::MemoryStore, ExchangeEngine};
//! use vp_exchange::engine::verification::ChallengeBound;
//!
//! // Setup the engine.
//! let engine = ExchangeEngine::builder()
//!     .with_session_store(Arc::new(MemoryStore::default()))
//!     .with_verifier(Arc::new(ChallengeBound::new(my_verifier)))
//!     .build()?;
//!
//! // Configure an exchange. Validation problems are returned, not raised.
//! let outcome = engine.configure_exchange(serde_json::from_value(json!({
//!     "exchangeId": "pr-card",
//!     "query": [{
//!         "type": "PresentationDefinition",
//!         "credentialQuery": [presentation_definition]
//!     }],
//!     "interactServices": [{
//!         "type": "UnmediatedHttpPresentationService2021",
//!         "baseUrl": "https://example.org/exchanges/"
//!     }]
//! }))?).await?;
//! assert!(outcome.errors.is_empty());
//!
//! // Start a session and hand the VP Request to the holder.
//! let started = engine.start_exchange("pr-card").await?;
//!
//! // The holder posts its presentation to `interact.service[0].serviceEndpoint`,
//! // whose last path segment is the transaction id.
//! let outcome = engine
//!     .submit_presentation(&started.transaction_id, Submission::new(presentation))
//!     .await?;
//! ```
//!
//! # Protocol Overview
//!
//! 1. *Configure*: an [`UntypedExchangeDefinition`] is checked by the [`DefinitionValidator`]
//!    and stored by the [`SessionStore`] under its exchange id.
//! 2. *Start*: each start allocates a fresh transaction id and challenge and renders a
//!    [`VpRequest`]. Each interact service endpoint is that service's base URL extended with
//!    the transaction id.
//! 3. *Submit*: the submission is checked by the [`PresentationVerifier`] against the
//!    session's query and challenge, recorded as an [`ExchangeTransaction`], and the session
//!    moves to `verified` or `failed`. On mediated exchanges it moves to `submitted` until a
//!    reviewer decides.
//!
//! [`UntypedExchangeDefinition`]: crate::core::definition::UntypedExchangeDefinition
//! [`DefinitionValidator`]: crate::core::validation::DefinitionValidator
//! [`SessionStore`]: crate::engine::session::SessionStore
//! [`VpRequest`]: crate::core::vp_request::VpRequest
//! [`PresentationVerifier`]: crate::engine::verification::PresentationVerifier
//! [`ExchangeTransaction`]: crate::engine::session::ExchangeTransaction

pub mod config;
pub mod core;
pub mod engine;
pub mod utils;

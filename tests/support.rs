use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value as Json};
use vp_exchange::{
    config::EngineConfig,
    core::{definition::UntypedExchangeDefinition, query::Query},
    engine::{
        id::{IdSource, RandomIdSource},
        session::MemoryStore,
        verification::{
            PresentationVerifier, Submission, VerificationResult, VerificationUnavailable,
        },
        ExchangeEngine,
    },
};

/// Passes presentations carrying `"valid": true`; reports the service as down for
/// `"unavailable": true`.
#[derive(Debug, Default)]
pub struct FlagVerifier;

#[async_trait]
impl PresentationVerifier for FlagVerifier {
    async fn verify(
        &self,
        _query: &[Query],
        _challenge: &str,
        submission: &Submission,
    ) -> Result<VerificationResult, VerificationUnavailable> {
        if submission.presentation["unavailable"] == json!(true) {
            return Err(anyhow!("verifier offline").into());
        }
        if submission.presentation["valid"] == json!(true) {
            Ok(VerificationResult::passed())
        } else {
            Ok(VerificationResult::failed(["presentation did not satisfy the query"]))
        }
    }
}

/// Hands out a scripted sequence of transaction ids, then random ones.
#[derive(Debug)]
pub struct ScriptedIds(Mutex<VecDeque<String>>);

impl ScriptedIds {
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self(Mutex::new(ids.into_iter().map(str::to_owned).collect()))
    }
}

impl IdSource for ScriptedIds {
    fn transaction_id(&self) -> String {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RandomIdSource.transaction_id())
    }

    fn challenge(&self) -> String {
        RandomIdSource.challenge()
    }
}

pub fn engine_with(
    config: EngineConfig,
    verifier: Arc<dyn PresentationVerifier + Send + Sync>,
) -> (ExchangeEngine, MemoryStore) {
    let store = MemoryStore::default();
    let engine = ExchangeEngine::builder()
        .with_config(config)
        .with_session_store(Arc::new(store.clone()))
        .with_verifier(verifier)
        .build()
        .unwrap();
    (engine, store)
}

pub fn engine() -> (ExchangeEngine, MemoryStore) {
    engine_with(EngineConfig::default(), Arc::new(FlagVerifier))
}

pub fn definition(value: Json) -> UntypedExchangeDefinition {
    serde_json::from_value(value).unwrap()
}

pub fn pr_card() -> UntypedExchangeDefinition {
    definition(json!({
        "exchangeId": "pr-card",
        "query": [{
            "type": "PresentationDefinition",
            "credentialQuery": [{
                "id": "57ca126c-acbf-4da4-8f79-447150e93128",
                "input_descriptors": [{
                    "id": "permanent_resident_card",
                    "name": "Permanent Resident Card",
                    "purpose": "We can only allow permanent residents into the application"
                }]
            }]
        }],
        "interactServices": [{
            "type": "UnmediatedHttpPresentationService2021",
            "baseUrl": "https://example.org/"
        }]
    }))
}

pub fn mediated() -> UntypedExchangeDefinition {
    definition(json!({
        "exchangeId": "reviewed-card",
        "query": [{
            "type": "QueryByExample",
            "credentialQuery": [{ "example": { "type": "PermanentResidentCard" } }]
        }],
        "interactServices": [{
            "type": "MediatedHttpPresentationService2021",
            "baseUrl": "https://example.org/mediated",
            "mediator": "did:example:reviewer"
        }]
    }))
}

pub fn valid() -> Submission {
    Submission::new(json!({ "type": "VerifiablePresentation", "valid": true }))
}

pub fn invalid() -> Submission {
    Submission::new(json!({ "type": "VerifiablePresentation", "valid": false }))
}

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::core::query::Query;

/// Evidence a responder sends back against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// The verifiable presentation, in whatever format the verifier understands.
    pub presentation: Json,
}

impl Submission {
    pub fn new(presentation: Json) -> Self {
        Self { presentation }
    }

    /// Challenges found in the presentation's proof (or proof set).
    pub fn proof_challenges(&self) -> Vec<&str> {
        match self.presentation.get("proof") {
            Some(Json::Array(proofs)) => proofs
                .iter()
                .filter_map(|p| p.get("challenge")?.as_str())
                .collect(),
            Some(proof) => proof
                .get("challenge")
                .and_then(Json::as_str)
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Outcome of checking a submission against the originating query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl VerificationResult {
    pub fn passed() -> Self {
        Self {
            passed: true,
            reasons: Vec::new(),
        }
    }

    pub fn failed(reasons: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            passed: false,
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }
}

/// The verification service could not be reached or could not complete.
///
/// Distinct from a submission that was processed and failed.
#[derive(Debug, thiserror::Error)]
#[error("verification unavailable: {0:#}")]
pub struct VerificationUnavailable(pub anyhow::Error);

impl From<anyhow::Error> for VerificationUnavailable {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

/// Checks a submission's proofs and its fit to the query.
#[async_trait]
pub trait PresentationVerifier: Debug {
    async fn verify(
        &self,
        query: &[Query],
        challenge: &str,
        submission: &Submission,
    ) -> Result<VerificationResult, VerificationUnavailable>;
}

/// Rejects any submission whose proof does not carry the session challenge, then delegates.
#[derive(Debug, Clone)]
pub struct ChallengeBound<V> {
    inner: V,
}

impl<V> ChallengeBound<V> {
    pub fn new(inner: V) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<V: PresentationVerifier + Send + Sync> PresentationVerifier for ChallengeBound<V> {
    async fn verify(
        &self,
        query: &[Query],
        challenge: &str,
        submission: &Submission,
    ) -> Result<VerificationResult, VerificationUnavailable> {
        let challenges = submission.proof_challenges();
        if challenges.is_empty() {
            debug!("submission has no proof challenge");
            return Ok(VerificationResult::failed(["presentation proof has no challenge"]));
        }
        if challenges.iter().any(|c| *c != challenge) {
            debug!("submission challenge does not match the session");
            return Ok(VerificationResult::failed([
                "presentation challenge does not match the request",
            ]));
        }
        self.inner.verify(query, challenge, submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct AcceptAll;

    #[async_trait]
    impl PresentationVerifier for AcceptAll {
        async fn verify(
            &self,
            _query: &[Query],
            _challenge: &str,
            _submission: &Submission,
        ) -> Result<VerificationResult, VerificationUnavailable> {
            Ok(VerificationResult::passed())
        }
    }

    #[test]
    fn proof_challenges_from_single_and_set() {
        let single = Submission::new(json!({ "proof": { "challenge": "a" } }));
        assert_eq!(single.proof_challenges(), vec!["a"]);

        let set = Submission::new(json!({ "proof": [{ "challenge": "a" }, { "challenge": "b" }] }));
        assert_eq!(set.proof_challenges(), vec!["a", "b"]);

        assert!(Submission::new(json!({})).proof_challenges().is_empty());
    }

    #[tokio::test]
    async fn challenge_must_match() {
        let verifier = ChallengeBound::new(AcceptAll);

        let good = Submission::new(json!({ "proof": { "challenge": "nonce" } }));
        assert!(verifier.verify(&[], "nonce", &good).await.unwrap().passed);

        let replayed = Submission::new(json!({ "proof": { "challenge": "old" } }));
        let result = verifier.verify(&[], "nonce", &replayed).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.reasons.len(), 1);

        let unproven = Submission::new(json!({ "type": "VerifiablePresentation" }));
        assert!(!verifier.verify(&[], "nonce", &unproven).await.unwrap().passed);
    }
}

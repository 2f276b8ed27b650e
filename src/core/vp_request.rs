use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    definition::ExchangeDefinition,
    interact::{InteractSpec, InteractType},
    query::Query,
};
use crate::utils::{service_endpoint, transaction_id_from_endpoint};

/// The request message sent to a responder for one exchange session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VpRequest {
    pub challenge: String,
    pub query: Vec<Query>,
    pub interact: Interact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Interact {
    pub service: Vec<InteractService>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InteractService {
    #[serde(rename = "type")]
    pub service_type: InteractType,
    pub service_endpoint: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediator: Option<String>,
}

impl InteractService {
    /// The transaction id this endpoint correlates to.
    pub fn transaction_id(&self) -> Option<String> {
        transaction_id_from_endpoint(&self.service_endpoint)
    }
}

impl VpRequest {
    pub fn builder(definition: &ExchangeDefinition) -> RequestBuilder<'_> {
        RequestBuilder::new(definition)
    }

    /// Whether submissions for this request are held for mediator review.
    pub fn is_mediated(&self) -> bool {
        self.interact
            .service
            .iter()
            .any(|s| s.service_type == InteractType::MediatedPresentation)
    }
}

/// Renders a [VpRequest] from a validated definition.
#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder<'a> {
    definition: &'a ExchangeDefinition,
    challenge: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(definition: &'a ExchangeDefinition) -> Self {
        Self {
            definition,
            challenge: None,
        }
    }

    /// Set the anti-replay challenge bound into the request.
    pub fn with_challenge(mut self, challenge: String) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Build the request for the session identified by `transaction_id`.
    ///
    /// The query is carried over as configured. Every service endpoint is the service's base
    /// URL extended with `transaction_id` as its last path segment.
    pub fn build(self, transaction_id: &str) -> Result<VpRequest> {
        let Some(challenge) = self.challenge else {
            anyhow::bail!("challenge is required, see `with_challenge`")
        };

        let service = self
            .definition
            .interact_services()
            .iter()
            .map(|spec| render_service(spec, transaction_id))
            .collect::<Result<_>>()?;

        Ok(VpRequest {
            challenge,
            query: self.definition.query().to_vec(),
            interact: Interact { service },
        })
    }
}

fn render_service(spec: &InteractSpec, transaction_id: &str) -> Result<InteractService> {
    let service_endpoint = service_endpoint(spec.base_url(), transaction_id)
        .context("unable to build the service endpoint")?;

    Ok(InteractService {
        service_type: spec.interact_type(),
        service_endpoint,
        mediator: spec.mediator().map(ToOwned::to_owned),
    })
}

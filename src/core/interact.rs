use std::fmt;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::object::{expect_string, TypedParameter};
use crate::config::BaseUrl;

/// A declared channel through which a responder may submit evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum InteractSpec {
    /// The responder posts the presentation directly to the service endpoint.
    #[serde(rename = "UnmediatedHttpPresentationService2021")]
    UnmediatedPresentation {
        #[serde(rename = "baseUrl")]
        base_url: BaseUrl,
    },
    /// The presentation is held for review by a mediator before the exchange completes.
    #[serde(rename = "MediatedHttpPresentationService2021")]
    MediatedPresentation {
        #[serde(rename = "baseUrl")]
        base_url: BaseUrl,
        mediator: String,
    },
}

impl InteractSpec {
    pub fn unmediated(base_url: BaseUrl) -> Self {
        InteractSpec::UnmediatedPresentation { base_url }
    }

    pub fn base_url(&self) -> &BaseUrl {
        match self {
            InteractSpec::UnmediatedPresentation { base_url }
            | InteractSpec::MediatedPresentation { base_url, .. } => base_url,
        }
    }

    pub fn interact_type(&self) -> InteractType {
        match self {
            InteractSpec::UnmediatedPresentation { .. } => InteractType::UnmediatedPresentation,
            InteractSpec::MediatedPresentation { .. } => InteractType::MediatedPresentation,
        }
    }

    pub fn mediator(&self) -> Option<&str> {
        match self {
            InteractSpec::UnmediatedPresentation { .. } => None,
            InteractSpec::MediatedPresentation { mediator, .. } => Some(mediator),
        }
    }
}

/// The `type` discriminator of an interact service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InteractType {
    UnmediatedPresentation,
    MediatedPresentation,
    Unknown(String),
}

impl InteractType {
    pub fn as_str(&self) -> &str {
        match self {
            InteractType::UnmediatedPresentation => "UnmediatedHttpPresentationService2021",
            InteractType::MediatedPresentation => "MediatedHttpPresentationService2021",
            InteractType::Unknown(s) => s,
        }
    }
}

impl fmt::Display for InteractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InteractType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "UnmediatedHttpPresentationService2021" => InteractType::UnmediatedPresentation,
            "MediatedHttpPresentationService2021" => InteractType::MediatedPresentation,
            _ => InteractType::Unknown(s),
        }
    }
}

impl From<InteractType> for String {
    fn from(value: InteractType) -> Self {
        value.as_str().to_owned()
    }
}

impl TypedParameter for InteractType {
    const KEY: &'static str = "type";
}

impl TryFrom<Json> for InteractType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        expect_string(value, Self::KEY).map(Into::into)
    }
}

impl From<InteractType> for Json {
    fn from(value: InteractType) -> Self {
        Json::String(value.into())
    }
}

impl TypedParameter for BaseUrl {
    const KEY: &'static str = "baseUrl";
}

impl TryFrom<Json> for BaseUrl {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let raw = expect_string(value, Self::KEY)?;
        BaseUrl::try_from(raw.clone()).with_context(|| format!("'{raw}' is not an absolute URL"))
    }
}

impl From<BaseUrl> for Json {
    fn from(value: BaseUrl) -> Self {
        Json::String(value.into())
    }
}

/// Identifier of the party reviewing submissions on a mediated service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mediator(pub String);

impl TypedParameter for Mediator {
    const KEY: &'static str = "mediator";
}

impl TryFrom<Json> for Mediator {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        expect_string(value, Self::KEY).map(Mediator)
    }
}

impl From<Mediator> for Json {
    fn from(value: Mediator) -> Self {
        Json::String(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unmediated_wire_form() {
        let spec: InteractSpec = serde_json::from_value(json!({
            "type": "UnmediatedHttpPresentationService2021",
            "baseUrl": "https://example.org/exchanges"
        }))
        .unwrap();

        assert_eq!(spec.interact_type(), InteractType::UnmediatedPresentation);
        assert_eq!(spec.base_url().as_str(), "https://example.org/exchanges/");
        assert_eq!(spec.mediator(), None);
    }

    #[test]
    fn mediated_requires_mediator() {
        let result: Result<InteractSpec, _> = serde_json::from_value(json!({
            "type": "MediatedHttpPresentationService2021",
            "baseUrl": "https://example.org/"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn base_url_parameter_reports_bad_urls() {
        assert!(BaseUrl::try_from(json!("not a url")).is_err());
        assert!(BaseUrl::try_from(json!(42)).is_err());
        assert!(BaseUrl::try_from(json!("https://example.org")).is_ok());
    }
}

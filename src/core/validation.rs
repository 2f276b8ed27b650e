use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as Json;

use super::{
    definition::{ExchangeDefinition, UntypedExchangeDefinition},
    interact::{InteractSpec, InteractType, Mediator},
    object::{TypedParameter, UntypedObject},
    query::{Query, QuerySpec, QueryType},
};
use crate::config::{BaseUrl, EngineConfig};

const CREDENTIAL_QUERY: &str = "credentialQuery";

/// Which tagged union an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecKind {
    Query,
    InteractService,
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecKind::Query => f.write_str("query"),
            SpecKind::InteractService => f.write_str("interact service"),
        }
    }
}

/// A structural problem with an exchange definition, located by field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "camelCase")]
pub enum ValidationError {
    #[error("{location}: unknown {kind} type '{value}'")]
    UnknownType {
        kind: SpecKind,
        value: String,
        location: String,
    },

    #[error("{location}: missing required field '{field}'")]
    MissingField { location: String, field: String },

    #[error("{location}: {reason}")]
    InvalidPayload { location: String, reason: String },

    #[error("{location}: invalid URL: {reason}")]
    InvalidUrl { location: String, reason: String },

    #[error("exchangeId: must not be empty")]
    EmptyExchangeId,

    #[error("interactServices: at least one interact service is required")]
    NoInteractServices,
}

impl ValidationError {
    pub fn location(&self) -> &str {
        match self {
            ValidationError::UnknownType { location, .. }
            | ValidationError::MissingField { location, .. }
            | ValidationError::InvalidPayload { location, .. }
            | ValidationError::InvalidUrl { location, .. } => location,
            ValidationError::EmptyExchangeId => "exchangeId",
            ValidationError::NoInteractServices => "interactServices",
        }
    }
}

/// Checks exchange definitions against the per-type grammars.
///
/// Pure: never touches storage and never fails for a well-typed input. Every problem is
/// reported as a [ValidationError].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionValidator {
    allow_empty_interact_services: bool,
}

impl DefinitionValidator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            allow_empty_interact_services: config.allow_empty_interact_services,
        }
    }

    pub fn allow_empty_interact_services(mut self, allow: bool) -> Self {
        self.allow_empty_interact_services = allow;
        self
    }

    /// Validate a definition. An empty list means the definition is valid.
    pub fn validate(&self, definition: &UntypedExchangeDefinition) -> Vec<ValidationError> {
        self.parse(definition).err().unwrap_or_default()
    }

    /// Validate a definition and, when valid, produce its typed form.
    pub fn parse(
        &self,
        definition: &UntypedExchangeDefinition,
    ) -> Result<ExchangeDefinition, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if definition.exchange_id.trim().is_empty() {
            errors.push(ValidationError::EmptyExchangeId);
        }

        let query: Vec<Query> = definition
            .query
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| collect(parse_query(format!("query[{i}]"), entry), &mut errors))
            .collect();

        if definition.interact_services.is_empty() && !self.allow_empty_interact_services {
            errors.push(ValidationError::NoInteractServices);
        }

        let interact_services: Vec<InteractSpec> = definition
            .interact_services
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| collect(parse_interact(i, entry), &mut errors))
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ExchangeDefinition::new(
            definition.exchange_id.clone(),
            query,
            interact_services,
        ))
    }
}

fn collect<T>(result: Result<T, Vec<ValidationError>>, errors: &mut Vec<ValidationError>) -> Option<T> {
    result.map_err(|e| errors.extend(e)).ok()
}

pub(crate) fn parse_query(
    location: String,
    entry: &UntypedObject,
) -> Result<Query, Vec<ValidationError>> {
    let payload = entry.get_raw(CREDENTIAL_QUERY).cloned();
    let payload_location = format!("{location}.{CREDENTIAL_QUERY}");

    let query = match discriminator::<QueryType>(entry, &location)? {
        QueryType::Unknown(value) => {
            return Err(vec![ValidationError::UnknownType {
                kind: SpecKind::Query,
                value,
                location,
            }])
        }
        QueryType::PresentationDefinition => QuerySpec::PresentationDefinition {
            credential_query: typed(required(payload, &location)?, &payload_location)?,
        },
        QueryType::QueryByExample => QuerySpec::QueryByExample {
            credential_query: typed(required(payload, &location)?, &payload_location)?,
        },
        QueryType::DidAuthentication => QuerySpec::DidAuthentication {
            credential_query: match payload {
                None | Some(Json::Null) => Vec::new(),
                Some(payload) => typed(payload, &payload_location)?,
            },
        },
    };

    let errors = query.check(&location);
    if errors.is_empty() {
        Ok(Query::new(entry.clone(), query))
    } else {
        Err(errors)
    }
}

fn parse_interact(index: usize, entry: &UntypedObject) -> Result<InteractSpec, Vec<ValidationError>> {
    let location = format!("interactServices[{index}]");

    let interact_type = discriminator::<InteractType>(entry, &location)?;
    if let InteractType::Unknown(value) = interact_type {
        return Err(vec![ValidationError::UnknownType {
            kind: SpecKind::InteractService,
            value,
            location,
        }]);
    }

    let mut errors = Vec::new();

    let base_url = match entry.get_raw(BaseUrl::KEY) {
        None | Some(Json::Null) => None,
        Some(Json::String(s)) if s.trim().is_empty() => None,
        Some(_) => match entry.get::<BaseUrl>() {
            Some(Ok(base_url)) => Some(base_url),
            Some(Err(e)) => {
                errors.push(ValidationError::InvalidUrl {
                    location: format!("{location}.{}", BaseUrl::KEY),
                    reason: format!("{e:#}"),
                });
                None
            }
            None => None,
        },
    };
    if base_url.is_none() && errors.is_empty() {
        errors.push(ValidationError::MissingField {
            location: location.clone(),
            field: BaseUrl::KEY.into(),
        });
    }

    let mediator = if interact_type == InteractType::MediatedPresentation {
        match entry.get::<Mediator>() {
            Some(Ok(Mediator(m))) if !m.trim().is_empty() => Some(m),
            Some(Err(e)) => {
                errors.push(ValidationError::InvalidPayload {
                    location: format!("{location}.{}", Mediator::KEY),
                    reason: format!("{e:#}"),
                });
                None
            }
            _ => {
                errors.push(ValidationError::MissingField {
                    location: location.clone(),
                    field: Mediator::KEY.into(),
                });
                None
            }
        }
    } else {
        None
    };

    match (base_url, mediator) {
        (Some(base_url), None) if errors.is_empty() => {
            Ok(InteractSpec::UnmediatedPresentation { base_url })
        }
        (Some(base_url), Some(mediator)) if errors.is_empty() => {
            Ok(InteractSpec::MediatedPresentation { base_url, mediator })
        }
        _ => Err(errors),
    }
}

/// Read the `type` discriminator of an entry.
fn discriminator<T: TypedParameter>(
    entry: &UntypedObject,
    location: &str,
) -> Result<T, Vec<ValidationError>> {
    match entry.get::<T>() {
        None => Err(vec![ValidationError::MissingField {
            location: location.to_owned(),
            field: T::KEY.into(),
        }]),
        Some(Err(e)) => Err(vec![ValidationError::InvalidPayload {
            location: format!("{location}.{}", T::KEY),
            reason: format!("{e:#}"),
        }]),
        Some(Ok(t)) => Ok(t),
    }
}

fn required(payload: Option<Json>, location: &str) -> Result<Json, Vec<ValidationError>> {
    match payload {
        None | Some(Json::Null) => Err(vec![ValidationError::MissingField {
            location: location.to_owned(),
            field: CREDENTIAL_QUERY.into(),
        }]),
        Some(payload) => Ok(payload),
    }
}

/// Deserialize a payload into its typed form, locating the first shape error.
fn typed<T: DeserializeOwned>(payload: Json, location: &str) -> Result<T, Vec<ValidationError>> {
    serde_path_to_error::deserialize(payload).map_err(|e| {
        let path = e.path().to_string();
        let location = match path.as_str() {
            "." => location.to_owned(),
            p if p.starts_with('[') => format!("{location}{p}"),
            p => format!("{location}.{p}"),
        };
        vec![ValidationError::InvalidPayload {
            location,
            reason: e.into_inner().to_string(),
        }]
    })
}

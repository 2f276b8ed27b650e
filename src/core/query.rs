use std::fmt;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{
    object::{expect_string, TypedParameter, UntypedObject},
    presentation_definition::PresentationDefinition,
    validation::{parse_query, ValidationError},
};
use crate::utils::NonEmptyVec;

/// One evidentiary requirement of an exchange.
///
/// The wire form is `{ "type": ..., "credentialQuery": ... }`; the payload grammar is fixed by
/// the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum QuerySpec {
    #[serde(rename = "PresentationDefinition")]
    PresentationDefinition {
        #[serde(rename = "credentialQuery")]
        credential_query: Vec<PresentationDefinition>,
    },
    #[serde(rename = "QueryByExample")]
    QueryByExample {
        #[serde(rename = "credentialQuery")]
        credential_query: Vec<ExampleQuery>,
    },
    #[serde(rename = "DIDAuthentication", alias = "DIDAuth")]
    DidAuthentication {
        #[serde(rename = "credentialQuery", default)]
        credential_query: Vec<DidAuthQuery>,
    },
}

impl QuerySpec {
    pub fn query_type(&self) -> QueryType {
        match self {
            QuerySpec::PresentationDefinition { .. } => QueryType::PresentationDefinition,
            QuerySpec::QueryByExample { .. } => QueryType::QueryByExample,
            QuerySpec::DidAuthentication { .. } => QueryType::DidAuthentication,
        }
    }

    pub(crate) fn check(&self, location: &str) -> Vec<ValidationError> {
        match self {
            QuerySpec::PresentationDefinition { credential_query } => credential_query
                .iter()
                .enumerate()
                .flat_map(|(i, pd)| pd.check(&format!("{location}.credentialQuery[{i}]")))
                .collect(),
            QuerySpec::QueryByExample { credential_query } => credential_query
                .iter()
                .enumerate()
                .flat_map(|(i, q)| q.check(&format!("{location}.credentialQuery[{i}]")))
                .collect(),
            QuerySpec::DidAuthentication { credential_query } => credential_query
                .iter()
                .enumerate()
                .flat_map(|(i, q)| q.check(&format!("{location}.credentialQuery[{i}]")))
                .collect(),
        }
    }
}

/// A validated query entry.
///
/// Keeps the entry exactly as it was configured next to its typed view. Requests render the
/// configured form, so members outside the typed grammar reach the holder unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UntypedObject", into = "UntypedObject")]
pub struct Query(UntypedObject, QuerySpec);

impl Query {
    pub(crate) fn new(raw: UntypedObject, spec: QuerySpec) -> Self {
        Self(raw, spec)
    }

    /// The entry as configured.
    pub fn raw(&self) -> &UntypedObject {
        &self.0
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.1
    }

    pub fn query_type(&self) -> QueryType {
        self.1.query_type()
    }
}

impl TryFrom<UntypedObject> for Query {
    type Error = Error;

    fn try_from(raw: UntypedObject) -> Result<Self, Self::Error> {
        parse_query("query".to_owned(), &raw).map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            anyhow!("invalid query entry: {}", reasons.join("; "))
        })
    }
}

impl From<Query> for UntypedObject {
    fn from(value: Query) -> Self {
        value.0
    }
}

/// The `type` discriminator of a query entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryType {
    PresentationDefinition,
    QueryByExample,
    DidAuthentication,
    Unknown(String),
}

impl QueryType {
    pub fn as_str(&self) -> &str {
        match self {
            QueryType::PresentationDefinition => "PresentationDefinition",
            QueryType::QueryByExample => "QueryByExample",
            QueryType::DidAuthentication => "DIDAuthentication",
            QueryType::Unknown(s) => s,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for QueryType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PresentationDefinition" => QueryType::PresentationDefinition,
            "QueryByExample" => QueryType::QueryByExample,
            "DIDAuthentication" | "DIDAuth" => QueryType::DidAuthentication,
            _ => QueryType::Unknown(s),
        }
    }
}

impl TypedParameter for QueryType {
    const KEY: &'static str = "type";
}

impl TryFrom<Json> for QueryType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        expect_string(value, Self::KEY).map(Into::into)
    }
}

impl From<QueryType> for Json {
    fn from(value: QueryType) -> Self {
        Json::String(value.as_str().to_owned())
    }
}

/// A Query By Example entry: a credential template the holder should match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExampleQuery {
    example: CredentialExample,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trusted_issuer: Option<Vec<TrustedIssuer>>,
}

impl ExampleQuery {
    pub fn new(example: CredentialExample) -> Self {
        Self {
            example,
            reason: None,
            required: None,
            trusted_issuer: None,
        }
    }

    pub fn example(&self) -> &CredentialExample {
        &self.example
    }

    fn check(&self, location: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.example.credential_type.iter().any(|t| t.trim().is_empty()) {
            errors.push(ValidationError::InvalidPayload {
                location: format!("{location}.example.type"),
                reason: "credential types must not be empty".into(),
            });
        }
        for (i, issuer) in self.trusted_issuer.iter().flatten().enumerate() {
            if issuer.issuer.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    location: format!("{location}.trustedIssuer[{i}]"),
                    field: "issuer".into(),
                });
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialExample {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    context: Option<Json>,
    #[serde(rename = "type")]
    credential_type: CredentialTypes,
    #[serde(rename = "credentialSubject", skip_serializing_if = "Option::is_none")]
    credential_subject: Option<Json>,
}

impl CredentialExample {
    pub fn new(credential_type: impl Into<String>) -> Self {
        Self {
            context: None,
            credential_type: CredentialTypes::One(credential_type.into()),
            credential_subject: None,
        }
    }

    pub fn credential_types(&self) -> &CredentialTypes {
        &self.credential_type
    }
}

/// `type` of a credential example: a single string or a non-empty list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CredentialTypes {
    One(String),
    Many(NonEmptyVec<String>),
}

impl CredentialTypes {
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        match self {
            CredentialTypes::One(t) => std::slice::from_ref(t).iter(),
            CredentialTypes::Many(ts) => ts.iter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustedIssuer {
    issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
}

/// DID Authentication request: which DID methods and cryptosuites the holder may prove control
/// with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidAuthQuery {
    accepted_methods: NonEmptyVec<AcceptedMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted_cryptosuites: Option<Vec<AcceptedCryptosuite>>,
}

impl DidAuthQuery {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            accepted_methods: NonEmptyVec::new(AcceptedMethod {
                method: method.into(),
            }),
            accepted_cryptosuites: None,
        }
    }

    fn check(&self, location: &str) -> Vec<ValidationError> {
        let methods = self
            .accepted_methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.method.trim().is_empty())
            .map(|(i, _)| ValidationError::MissingField {
                location: format!("{location}.acceptedMethods[{i}]"),
                field: "method".into(),
            });
        let suites = self
            .accepted_cryptosuites
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, s)| s.cryptosuite.trim().is_empty())
            .map(|(i, _)| ValidationError::MissingField {
                location: format!("{location}.acceptedCryptosuites[{i}]"),
                field: "cryptosuite".into(),
            });
        methods.chain(suites).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptedMethod {
    method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptedCryptosuite {
    cryptosuite: String,
}

use serde::{Deserialize, Serialize};

use super::{interact::InteractSpec, object::UntypedObject, query::Query};

/// An exchange definition as received from the caller, before validation.
///
/// Entries of `query` and `interactServices` stay untyped so that malformed entries can be
/// reported per field instead of failing the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UntypedExchangeDefinition {
    pub exchange_id: String,
    #[serde(default)]
    pub query: Vec<UntypedObject>,
    #[serde(default)]
    pub interact_services: Vec<UntypedObject>,
}

/// A validated, reusable exchange template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeDefinition {
    exchange_id: String,
    query: Vec<Query>,
    interact_services: Vec<InteractSpec>,
}

impl ExchangeDefinition {
    pub fn new(
        exchange_id: String,
        query: Vec<Query>,
        interact_services: Vec<InteractSpec>,
    ) -> Self {
        Self {
            exchange_id,
            query,
            interact_services,
        }
    }

    pub fn exchange_id(&self) -> &str {
        &self.exchange_id
    }

    pub fn query(&self) -> &[Query] {
        &self.query
    }

    pub fn interact_services(&self) -> &[InteractSpec] {
        &self.interact_services
    }
}

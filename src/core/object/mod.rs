use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// An untyped (JSON) Object from which [TypedParameters](TypedParameter) can be parsed.
///
/// Represents one raw `query` or `interactServices` entry of a definition before it has been
/// checked against the grammar of its `type`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter stored under a well-known key of an [UntypedObject].
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + Into<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Get a [TypedParameter] from the Object.
    ///
    /// Note that this method clones the underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        Some(self.0.get(T::KEY)?.clone().try_into())
    }

    /// Insert a [TypedParameter], returning the previous raw value if there was one.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Option<Json> {
        self.0.insert(T::KEY.to_owned(), t.into())
    }

    /// Insert a raw value under an arbitrary key.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: Json) -> Option<Json> {
        self.0.insert(key.into(), value)
    }

    /// Raw access to a value by key.
    pub fn get_raw(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

impl TryFrom<Json> for UntypedObject {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self(map)),
            other => Err(Error::msg(format!("expected a JSON object, found {other}"))),
        }
    }
}

/// Convert a raw parameter value into a string, for parameters that are plain strings on
/// the wire.
pub(crate) fn expect_string(value: Json, key: &str) -> Result<String> {
    match value {
        Json::String(s) => Ok(s),
        other => Err(Error::msg(format!("'{key}' must be a string, found {other}"))),
    }
}

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use url::Url;

use crate::config::BaseUrl;

/// A sequence that is guaranteed to hold at least one element once deserialized.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = Error;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, Error> {
        if v.is_empty() {
            bail!("expected at least one element")
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

/// Extend `base` with a single trailing path segment holding `transaction_id`.
///
/// `BaseUrl` always ends with a separator, so the resulting path is the base
/// path followed by exactly one new segment. The id is percent-encoded by
/// [Url] if needed, and [transaction_id_from_endpoint] reverses it.
pub fn service_endpoint(base: &BaseUrl, transaction_id: &str) -> Result<Url, Error> {
    let mut endpoint = Url::clone(base);
    {
        let Ok(mut path) = endpoint.path_segments_mut() else {
            bail!("base URL '{}' cannot carry path segments", **base)
        };
        path.pop_if_empty().push(transaction_id);
    }
    Ok(endpoint)
}

/// Recover the transaction id embedded in a service endpoint by
/// [service_endpoint].
pub fn transaction_id_from_endpoint(endpoint: &Url) -> Option<String> {
    let segment = endpoint.path_segments()?.last()?;
    if segment.is_empty() {
        return None;
    }
    url::form_urlencoded::parse(format!("s={}", segment.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> BaseUrl {
        BaseUrl::try_from(s.to_owned()).unwrap()
    }

    #[test]
    fn endpoint_appends_separator_when_missing() {
        let endpoint = service_endpoint(&base("https://test-issuer.com/api"), "abc").unwrap();
        assert_eq!(endpoint.as_str(), "https://test-issuer.com/api/abc");

        let endpoint = service_endpoint(&base("https://test-issuer.com/api/"), "abc").unwrap();
        assert_eq!(endpoint.as_str(), "https://test-issuer.com/api/abc");
    }

    #[test]
    fn endpoint_keeps_query_string() {
        let endpoint = service_endpoint(&base("https://example.org/x?tenant=1"), "abc").unwrap();
        assert_eq!(endpoint.as_str(), "https://example.org/x/abc?tenant=1");
        assert_eq!(transaction_id_from_endpoint(&endpoint).as_deref(), Some("abc"));
    }

    #[test]
    fn endpoint_round_trips_awkward_ids() {
        for id in ["3f0c6a4e-1b1e-4a51-9a8e-0c9a2f0b8d11", "a b", "a/b", "a+b%2F"] {
            let endpoint = service_endpoint(&base("https://example.org/"), id).unwrap();
            assert_eq!(transaction_id_from_endpoint(&endpoint).as_deref(), Some(id));
        }
    }

    #[test]
    fn non_empty_vec_rejects_empty() {
        assert!(NonEmptyVec::<u8>::try_from(vec![]).is_err());
        let v: NonEmptyVec<u8> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(&*v, &[1, 2]);
    }
}

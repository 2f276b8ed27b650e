use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Engine policy knobs supplied by the host application.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Accept definitions without any interact service.
    pub allow_empty_interact_services: bool,
    /// Keep a session in `started` after a failed verification instead of
    /// closing it as `failed`.
    pub allow_retry_after_failure: bool,
    /// Seconds a `started` session stays open. `None` disables expiry.
    pub session_ttl_secs: Option<u64>,
    /// How many fresh transaction ids to try before giving up on a collision.
    pub max_id_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_empty_interact_services: false,
            allow_retry_after_failure: false,
            session_ttl_secs: None,
            max_id_attempts: 5,
        }
    }
}

impl EngineConfig {
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }
}

/// A url that is always a base (can be safely extended with further path
/// segments without mangling).
#[derive(Serialize, Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct BaseUrl(Url);

#[derive(Debug, thiserror::Error)]
pub enum BaseUrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),
    #[error("'{0}' cannot be used as a base URL")]
    NotABase(String),
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = BaseUrlError;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        let mut parsed: Url = url.parse()?;
        if parsed.cannot_be_a_base() {
            return Err(BaseUrlError::NotABase(url));
        }
        // Make URL a base.
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        Ok(Self(parsed))
    }
}

impl From<BaseUrl> for String {
    fn from(BaseUrl(url): BaseUrl) -> String {
        url.into()
    }
}

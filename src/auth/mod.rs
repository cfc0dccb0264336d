//! Authentication strategies
//!
//! A strategy turns an incoming request into one of three outcomes: redirect
//! the user agent to the identity provider, accept a verified user, or fail.
//! The generic OAuth2 authorization code machinery lives in [`oauth`]; the
//! Office 365 specifics live in [`office365`].

pub mod oauth;
pub mod office365;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use oauth::{OAuth2Options, OAuth2Strategy};
pub use office365::{Office365Options, Office365Strategy};

/// Query parameters of the incoming HTTP request.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub query: HashMap<String, String>,
}

impl AuthRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from the query string of a full callback URL.
    pub fn from_url(url: &url::Url) -> Self {
        Self {
            query: url.query_pairs().into_owned().collect(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Per-call options for [`Strategy::authenticate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticateOptions {
    /// Azure AD `resource` authorization parameter
    pub resource: Option<String>,
    /// Overrides the configured scope
    pub scope: Option<Vec<String>>,
    /// Overrides the configured callback URL
    pub callback_url: Option<String>,
    /// Caller-chosen `state`; a random one is generated when absent
    pub state: Option<String>,
    /// Additional authorization parameters (`prompt`, `login_hint`, ...)
    pub extra: BTreeMap<String, String>,
}

/// Normalized user profile.
///
/// `json` is the identity provider's response, untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub provider: String,
    pub json: serde_json::Value,
}

impl Profile {
    pub fn new(provider: impl Into<String>, json: serde_json::Value) -> Self {
        Self {
            provider: provider.into(),
            json,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.json.get("id").and_then(|v| v.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.json.get("displayName").and_then(|v| v.as_str())
    }
}

/// Token endpoint response details handed to [`Verify::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenParams {
    pub token_type: String,
    pub expires_in: Option<Duration>,
    pub scope: Option<Vec<String>>,
    pub id_token: Option<String>,
    pub ext_expires_in: Option<u64>,
}

/// Result of the application's verify callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<U> {
    Verified(U),
    Rejected { message: Option<String> },
}

/// Result of a single [`Strategy::authenticate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<U> {
    /// Send the user agent to `url`; `state` must round-trip through the host.
    Redirect { url: url::Url, state: String },
    Success { user: U },
    Fail { message: Option<String> },
}

/// Application callback that maps tokens and profile to a user.
#[async_trait]
pub trait Verify: Send + Sync {
    type User: Send;

    async fn verify(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        params: &TokenParams,
        profile: Option<Profile>,
    ) -> anyhow::Result<Verdict<Self::User>>;
}

/// Provider-specific hooks the base OAuth2 strategy calls into.
#[async_trait]
pub trait ProviderHooks: Send + Sync {
    /// Fetch the user profile for a freshly issued access token.
    async fn user_profile(&self, access_token: &str) -> Result<Profile>;

    /// Options whose `resource` and `extra` end up on the authorization URL.
    fn authorization_params(&self, options: AuthenticateOptions) -> AuthenticateOptions;
}

/// A pluggable authentication strategy.
#[async_trait]
pub trait Strategy: Send + Sync {
    type User: Send;

    fn name(&self) -> &str;

    async fn authenticate(
        &self,
        request: &AuthRequest,
        options: AuthenticateOptions,
    ) -> Result<Outcome<Self::User>>;
}

//! Error types for the Office 365 strategy

use oauth2::basic::BasicErrorResponse;
use oauth2::RequestTokenError;
use thiserror::Error;

/// Error returned by the token endpoint exchange.
pub type TokenRequestError =
    RequestTokenError<oauth2::reqwest::Error<reqwest::Error>, BasicErrorResponse>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),

    #[error("invalid `{option}`: {source}")]
    InvalidUrl {
        option: &'static str,
        #[source]
        source: url::ParseError,
    },

    /// The provider redirected back with an `error` other than `access_denied`.
    #[error("authorization failed: {error}")]
    Authorization {
        error: String,
        description: Option<String>,
        uri: Option<String>,
    },

    #[error("failed to obtain access token")]
    TokenExchange(#[from] TokenRequestError),

    /// Connection-level failure while fetching the profile.
    #[error("failed to fetch user profile")]
    Transport(#[from] reqwest::Error),

    /// Non-200 response from the profile endpoint.
    #[error("failed to fetch user profile (HTTP {status} {message})")]
    Profile {
        status: u16,
        message: String,
        error: Option<serde_json::Value>,
    },

    /// Non-200 response whose body is not JSON.
    #[error("failed to fetch user profile (HTTP {status}): malformed error body")]
    MalformedErrorBody {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse user profile")]
    ProfileParse(#[source] serde_json::Error),

    #[error("verify callback failed")]
    Verify(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! OAuth2 authorization code flow on top of the `oauth2` crate

use std::borrow::Cow;

use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use super::{
    AuthRequest, AuthenticateOptions, Outcome, ProviderHooks, TokenParams, Verdict, Verify,
};
use crate::error::{Error, Result};

/// Extra fields Azure AD returns from the token endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_expires_in: Option<u64>,
}

impl ExtraTokenFields for AzureTokenFields {}

pub type AzureTokenResponse = StandardTokenResponse<AzureTokenFields, BasicTokenType>;

type AzureClient = oauth2::Client<
    BasicErrorResponse,
    AzureTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Options for the base OAuth2 strategy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Options {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub authorization_url: String,
    pub token_url: String,
    pub scope: Vec<String>,
    /// Skip the profile fetch and pass `None` to the verify callback
    pub skip_user_profile: bool,
}

/// Generic authorization code strategy.
///
/// Provider adapters own one of these and pass themselves in as
/// [`ProviderHooks`] on every call.
pub struct OAuth2Strategy<V> {
    client: AzureClient,
    scope: Vec<String>,
    skip_user_profile: bool,
    verify: V,
}

fn required(value: &str, option: &'static str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::MissingOption(option));
    }
    Ok(value.to_string())
}

fn redirect_url(url: &str, option: &'static str) -> Result<RedirectUrl> {
    RedirectUrl::new(url.to_string()).map_err(|source| Error::InvalidUrl { option, source })
}

/// Build the OAuth2 client from validated options
fn build_client(options: &OAuth2Options) -> Result<AzureClient> {
    let client_id = required(&options.client_id, "client_id")?;
    let client_secret = required(&options.client_secret, "client_secret")?;

    let auth_url = AuthUrl::new(required(&options.authorization_url, "authorization_url")?)
        .map_err(|source| Error::InvalidUrl {
            option: "authorization_url",
            source,
        })?;
    let token_url = TokenUrl::new(required(&options.token_url, "token_url")?).map_err(
        |source| Error::InvalidUrl {
            option: "token_url",
            source,
        },
    )?;

    let mut client = AzureClient::new(
        ClientId::new(client_id),
        Some(ClientSecret::new(client_secret)),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody);

    if let Some(ref callback) = options.callback_url {
        client = client.set_redirect_uri(redirect_url(callback, "callback_url")?);
    }

    Ok(client)
}

impl<V: Verify> OAuth2Strategy<V> {
    pub fn new(options: &OAuth2Options, verify: V) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
            scope: options.scope.clone(),
            skip_user_profile: options.skip_user_profile,
            verify,
        })
    }

    /// Run one step of the authorization code flow.
    ///
    /// A request carrying `error` or `code` is treated as the provider's
    /// redirect back; anything else starts the flow with a redirect.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        options: AuthenticateOptions,
        hooks: &dyn ProviderHooks,
    ) -> Result<Outcome<V::User>> {
        if let Some(error) = request.param("error") {
            let description = request.param("error_description").map(String::from);
            if error == "access_denied" {
                tracing::info!("Authorization denied by user");
                return Ok(Outcome::Fail {
                    message: description,
                });
            }
            return Err(Error::Authorization {
                error: error.to_string(),
                description,
                uri: request.param("error_uri").map(String::from),
            });
        }

        if let Some(code) = request.param("code") {
            return self.complete(code, &options, hooks).await;
        }

        self.redirect(options, hooks)
    }

    fn redirect(
        &self,
        options: AuthenticateOptions,
        hooks: &dyn ProviderHooks,
    ) -> Result<Outcome<V::User>> {
        let scope = options.scope.clone().unwrap_or_else(|| self.scope.clone());
        let callback = options
            .callback_url
            .as_deref()
            .map(|u| redirect_url(u, "callback_url"))
            .transpose()?;
        let state = options.state.clone();
        let params = hooks.authorization_params(options);

        let mut request = self
            .client
            .authorize_url(move || {
                state
                    .map(CsrfToken::new)
                    .unwrap_or_else(CsrfToken::new_random)
            })
            .add_scopes(scope.into_iter().map(Scope::new));

        if let Some(callback) = callback {
            request = request.set_redirect_uri(Cow::Owned(callback));
        }
        if let Some(resource) = params.resource {
            request = request.add_extra_param("resource", resource);
        }
        for (name, value) in params.extra {
            request = request.add_extra_param(name, value);
        }

        let (url, state) = request.url();
        tracing::debug!("Redirecting to {}", url);

        Ok(Outcome::Redirect {
            url,
            state: state.secret().to_string(),
        })
    }

    async fn complete(
        &self,
        code: &str,
        options: &AuthenticateOptions,
        hooks: &dyn ProviderHooks,
    ) -> Result<Outcome<V::User>> {
        let mut exchange = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(ref callback) = options.callback_url {
            let callback = redirect_url(callback, "callback_url")?;
            exchange = exchange.set_redirect_uri(Cow::Owned(callback));
        }

        tracing::debug!("Exchanging authorization code for token");
        let token = exchange.request_async(async_http_client).await?;

        let access_token = token.access_token().secret();
        let refresh_token = token.refresh_token().map(|t| t.secret().as_str());
        let params = token_params(&token);

        let profile = if self.skip_user_profile {
            None
        } else {
            Some(hooks.user_profile(access_token).await?)
        };

        let verdict = self
            .verify
            .verify(access_token, refresh_token, &params, profile)
            .await
            .map_err(Error::Verify)?;

        match verdict {
            Verdict::Verified(user) => Ok(Outcome::Success { user }),
            Verdict::Rejected { message } => {
                tracing::warn!(
                    "Verify callback rejected user: {}",
                    message.as_deref().unwrap_or("(no message)")
                );
                Ok(Outcome::Fail { message })
            }
        }
    }
}

fn token_params(token: &AzureTokenResponse) -> TokenParams {
    let extra = token.extra_fields();
    TokenParams {
        token_type: token_type_name(token.token_type()),
        expires_in: token.expires_in(),
        scope: token
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect()),
        id_token: extra.id_token.clone(),
        ext_expires_in: extra.ext_expires_in,
    }
}

fn token_type_name(token_type: &BasicTokenType) -> String {
    match token_type {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    }
}

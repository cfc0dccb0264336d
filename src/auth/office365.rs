//! Office 365 / Azure AD login strategy
//!
//! Thin adapter over [`OAuth2Strategy`]: fixes the strategy name, injects a
//! default `resource` authorization parameter, and fetches the profile from
//! Microsoft Graph after the code exchange.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::oauth::{OAuth2Options, OAuth2Strategy};
use super::{AuthRequest, AuthenticateOptions, Outcome, Profile, ProviderHooks, Strategy, Verify};
use crate::api;
use crate::error::Result;

/// Strategy name, also used as the profile's provider tag
pub const STRATEGY_NAME: &str = "office365_oauth2";

pub const AUTHORIZATION_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Office 365 strategy options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Office365Options {
    #[serde(flatten)]
    pub oauth2: OAuth2Options,
    /// Default `resource` sent when a call does not set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Profile endpoint; Graph `/me` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

impl Office365Options {
    /// Options pointing at the multi-tenant `common` endpoints with `User.Read`.
    pub fn common(client_id: &str, client_secret: &str, callback_url: &str) -> Self {
        Self {
            oauth2: OAuth2Options {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                callback_url: Some(callback_url.to_string()),
                authorization_url: AUTHORIZATION_URL.to_string(),
                token_url: TOKEN_URL.to_string(),
                scope: vec!["User.Read".to_string()],
                skip_user_profile: false,
            },
            resource: None,
            profile_url: None,
        }
    }
}

pub struct Office365Strategy<V> {
    base: OAuth2Strategy<V>,
    resource: Option<String>,
    profile_url: String,
    http: reqwest::Client,
}

impl<V: Verify> Office365Strategy<V> {
    pub fn new(options: Office365Options, verify: V) -> Result<Self> {
        let base = OAuth2Strategy::new(&options.oauth2, verify)?;
        Ok(Self {
            base,
            resource: options.resource,
            profile_url: options
                .profile_url
                .unwrap_or_else(|| api::ME_URL.to_string()),
            http: reqwest::Client::new(),
        })
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}

#[async_trait]
impl<V: Verify> ProviderHooks for Office365Strategy<V> {
    async fn user_profile(&self, access_token: &str) -> Result<Profile> {
        let json = api::fetch_profile(&self.http, &self.profile_url, access_token).await?;
        Ok(Profile::new(STRATEGY_NAME, json))
    }

    fn authorization_params(&self, options: AuthenticateOptions) -> AuthenticateOptions {
        options
    }
}

#[async_trait]
impl<V: Verify> Strategy for Office365Strategy<V> {
    type User = V::User;

    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    async fn authenticate(
        &self,
        request: &AuthRequest,
        mut options: AuthenticateOptions,
    ) -> Result<Outcome<V::User>> {
        if options.resource.is_none() {
            options.resource = self.resource.clone();
        }
        self.base.authenticate(request, options, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenParams, Verdict};
    use crate::error::Error;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ProfileUser;

    #[async_trait]
    impl Verify for ProfileUser {
        type User = Profile;

        async fn verify(
            &self,
            _access_token: &str,
            _refresh_token: Option<&str>,
            _params: &TokenParams,
            profile: Option<Profile>,
        ) -> anyhow::Result<Verdict<Profile>> {
            match profile {
                Some(p) => Ok(Verdict::Verified(p)),
                None => Ok(Verdict::Rejected { message: None }),
            }
        }
    }

    fn options() -> Office365Options {
        Office365Options::common(
            "yourClientId",
            "yourClientSecret",
            "https://www.example.net/auth/azureadoauth2/callback",
        )
    }

    fn query(url: &url::Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    async fn redirect_url(
        strategy: &Office365Strategy<ProfileUser>,
        opts: AuthenticateOptions,
    ) -> url::Url {
        match strategy.authenticate(&AuthRequest::new(), opts).await.unwrap() {
            Outcome::Redirect { url, .. } => url,
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn test_named_office365_oauth2() {
        let strategy = Office365Strategy::new(options(), ProfileUser).unwrap();
        assert_eq!(strategy.name(), "office365_oauth2");
    }

    #[test]
    fn test_missing_client_id() {
        let mut opts = options();
        opts.oauth2.client_id.clear();
        assert!(matches!(
            Office365Strategy::new(opts, ProfileUser),
            Err(Error::MissingOption("client_id"))
        ));
    }

    #[test]
    fn test_authorization_params_is_identity() {
        let strategy = Office365Strategy::new(options(), ProfileUser).unwrap();
        let mut extra = BTreeMap::new();
        extra.insert("prompt".to_string(), "login".to_string());
        extra.insert("domain_hint".to_string(), "contoso.com".to_string());
        let opts = AuthenticateOptions {
            resource: Some("https://outlook.office.com".to_string()),
            scope: Some(vec!["openid".to_string()]),
            callback_url: None,
            state: Some("s".to_string()),
            extra,
        };
        assert_eq!(strategy.authorization_params(opts.clone()), opts);
        assert_eq!(
            strategy.authorization_params(AuthenticateOptions::default()),
            AuthenticateOptions::default()
        );
    }

    #[tokio::test]
    async fn test_default_resource_injected() {
        let mut opts = options();
        opts.resource = Some("https://graph.microsoft.com".to_string());
        let strategy = Office365Strategy::new(opts, ProfileUser).unwrap();

        let url = redirect_url(&strategy, AuthenticateOptions::default()).await;
        assert!(url.as_str().starts_with(AUTHORIZATION_URL));
        assert_eq!(
            query(&url, "resource").as_deref(),
            Some("https://graph.microsoft.com")
        );
    }

    #[tokio::test]
    async fn test_caller_resource_wins() {
        let mut opts = options();
        opts.resource = Some("https://graph.microsoft.com".to_string());
        let strategy = Office365Strategy::new(opts, ProfileUser).unwrap();

        let call = AuthenticateOptions {
            resource: Some("https://outlook.office.com".to_string()),
            ..Default::default()
        };
        let url = redirect_url(&strategy, call).await;
        assert_eq!(
            query(&url, "resource").as_deref(),
            Some("https://outlook.office.com")
        );
    }

    #[tokio::test]
    async fn test_no_resource_without_default() {
        let strategy = Office365Strategy::new(options(), ProfileUser).unwrap();
        let url = redirect_url(&strategy, AuthenticateOptions::default()).await;
        assert_eq!(query(&url, "resource"), None);
        assert_eq!(query(&url, "scope").as_deref(), Some("User.Read"));
    }

    #[tokio::test]
    async fn test_user_profile_tags_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"id":"1","displayName":"A"}"#),
            )
            .mount(&server)
            .await;

        let mut opts = options();
        opts.profile_url = Some(format!("{}/v1.0/me", server.uri()));
        let strategy = Office365Strategy::new(opts, ProfileUser).unwrap();

        let profile = strategy.user_profile("abc").await.unwrap();
        assert_eq!(profile.provider, "office365_oauth2");
        assert_eq!(profile.json, json!({"id": "1", "displayName": "A"}));
    }

    #[tokio::test]
    async fn test_full_callback_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "graph-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(header("Authorization", "Bearer graph-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1",
                "displayName": "A",
                "userPrincipalName": "a@contoso.com"
            })))
            .mount(&server)
            .await;

        let mut opts = options();
        opts.oauth2.token_url = format!("{}/token", server.uri());
        opts.profile_url = Some(format!("{}/v1.0/me", server.uri()));
        let strategy = Office365Strategy::new(opts, ProfileUser).unwrap();

        let request = AuthRequest::new()
            .with_param("code", "auth-code")
            .with_param("state", "s");
        let outcome = strategy
            .authenticate(&request, AuthenticateOptions::default())
            .await
            .unwrap();

        let Outcome::Success { user } = outcome else {
            panic!("expected success");
        };
        assert_eq!(user.provider, "office365_oauth2");
        assert_eq!(user.display_name(), Some("A"));
    }

    #[tokio::test]
    async fn test_profile_error_surfaces_from_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "expired",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#" {"error":{"code":"InvalidAuthenticationToken","message":"bad token"}}"#,
            ))
            .mount(&server)
            .await;

        let mut opts = options();
        opts.oauth2.token_url = format!("{}/token", server.uri());
        opts.profile_url = Some(format!("{}/v1.0/me", server.uri()));
        let strategy = Office365Strategy::new(opts, ProfileUser).unwrap();

        let err = strategy
            .authenticate(
                &AuthRequest::new().with_param("code", "c"),
                AuthenticateOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Profile { status: 401, .. }));
    }
}

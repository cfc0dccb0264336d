//! User profile endpoint (/me)

use reqwest::header::ACCEPT;
use reqwest::StatusCode;

use crate::error::{Error, Result};

/// Fetch the signed-in user's profile as raw JSON.
///
/// Only HTTP 200 counts as success. Any other status is turned into
/// [`Error::Profile`] carrying the `error` member of the response body;
/// Graph sometimes prefixes that body with whitespace, so it is trimmed
/// before parsing.
pub async fn fetch_profile(
    http: &reqwest::Client,
    url: &str,
    access_token: &str,
) -> Result<serde_json::Value> {
    tracing::debug!("Graph GET {}", url);

    let resp = http
        .get(url)
        .bearer_auth(access_token)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if status == StatusCode::OK {
        return serde_json::from_str(&body).map_err(Error::ProfileParse);
    }

    let parsed: serde_json::Value =
        serde_json::from_str(body.trim_start()).map_err(|source| Error::MalformedErrorBody {
            status: status.as_u16(),
            source,
        })?;

    tracing::debug!("Graph GET {} returned HTTP {}", url, status.as_u16());

    Err(Error::Profile {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or_default().to_string(),
        error: parsed.get("error").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(header("Authorization", "Bearer token-123"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn me_url(server: &MockServer) -> String {
        format!("{}/v1.0/me", server.uri())
    }

    #[tokio::test]
    async fn test_ok_returns_body_unmodified() {
        let server = serve(200, r#"{"id":"1","displayName":"A"}"#).await;
        let profile = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap();
        assert_eq!(profile, json!({"id": "1", "displayName": "A"}));
    }

    #[tokio::test]
    async fn test_error_body_with_leading_whitespace() {
        let server = serve(401, r#" {"error":{"code":"x","message":"bad token"}}"#).await;
        let err = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap_err();

        match err {
            Error::Profile {
                status,
                message,
                error,
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
                assert_eq!(error, Some(json!({"code": "x", "message": "bad token"})));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_body_without_error_member() {
        let server = serve(503, "{}").await;
        let err = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Profile {
                status: 503,
                error: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_error_body() {
        let server = serve(500, "<html>Internal Server Error</html>").await;
        let err = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedErrorBody { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_non_json_success_body() {
        let server = serve(200, "not json").await;
        let err = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProfileParse(_)));
    }

    #[tokio::test]
    async fn test_other_success_status_is_an_error() {
        let server = serve(203, r#"{"id":"1"}"#).await;
        let err = fetch_profile(&reqwest::Client::new(), &me_url(&server), "token-123")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Profile { status: 203, .. }));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on the discard port
        let err = fetch_profile(&reqwest::Client::new(), "http://127.0.0.1:9/v1.0/me", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

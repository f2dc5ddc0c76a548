//! Access tokens and the authorization-code exchange.

use std::fmt;
use std::time::{Duration, Instant};

use headers::{ContentType, HeaderMapExt};
use http::header::ACCEPT;
use http::{HeaderValue, Method};
use oauth2::TokenResponse;
use oauth2::basic::{BasicErrorResponse, BasicTokenResponse};
use reqwest::{Body, Request};
use tracing::debug;
use url::form_urlencoded;

use super::config::ClientConfig;
use super::error::OAuthError;
use crate::{Authentication, SecureString};

/// An access token obtained from the token endpoint.
#[derive(Clone)]
pub struct AccessToken {
    access_token: SecureString,
    token_type: String,
    expires_at: Option<Instant>,
    refresh_token: Option<SecureString>,
    scopes: Vec<String>,
}

impl AccessToken {
    /// Creates a bearer access token without expiry.
    pub fn new(access_token: impl Into<SecureString>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "bearer".to_string(),
            expires_at: None,
            refresh_token: None,
            scopes: Vec::new(),
        }
    }

    /// Returns the access token value.
    pub fn secret(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the token type as announced by the server (e.g. `bearer`).
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Returns the refresh token if available.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(SecureString::as_str)
    }

    /// Returns the granted scopes, when the server reported them.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Checks if the token is expired.
    ///
    /// Returns `false` if the token has no expiration time.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    /// Returns the time until expiration, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at
            .and_then(|exp| exp.checked_duration_since(Instant::now()))
    }

    /// Bearer authentication carrying this token.
    pub fn authentication(&self) -> Authentication {
        Authentication::Bearer(self.access_token.clone())
    }

    fn from_response(response: &BasicTokenResponse) -> Self {
        let token_type: &str = response.token_type().as_ref();
        Self {
            access_token: response.access_token().secret().as_str().into(),
            token_type: token_type.to_ascii_lowercase(),
            expires_at: response.expires_in().map(|ttl| Instant::now() + ttl),
            refresh_token: response
                .refresh_token()
                .map(|token| token.secret().as_str().into()),
            scopes: response
                .scopes()
                .map(|scopes| scopes.iter().map(|scope| scope.as_str().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ClientConfig {
    /// Exchanges an authorization code for an access token.
    ///
    /// The client secret travels in the form body when
    /// [`secret_in_params`](ClientConfig::secret_in_params) is set, and as a
    /// Basic `Authorization` header otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no token endpoint is configured
    /// - the request cannot be sent
    /// - the token endpoint rejects the code
    /// - the response cannot be parsed
    pub async fn exchange_code(
        &self,
        client: &reqwest::Client,
        code: &str,
    ) -> Result<AccessToken, OAuthError> {
        let token_url = self
            .token_url
            .clone()
            .ok_or(OAuthError::MissingTokenEndpoint)?;

        let request = self.build_token_request(token_url, code)?;
        debug!(url = %request.url(), client_id = %self.client_id, "exchanging authorization code");

        let response = client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = match serde_json::from_str::<BasicErrorResponse>(&body) {
                Ok(error_response) => error_response.error().to_string(),
                Err(_) => body,
            };
            return Err(OAuthError::TokenRequestRejected {
                status: status.as_u16(),
                error,
            });
        }

        let token_response = serde_json::from_str::<BasicTokenResponse>(&body)?;

        Ok(AccessToken::from_response(&token_response))
    }

    fn build_token_request(&self, token_url: url::Url, code: &str) -> Result<Request, OAuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
        ];
        let mut authentication = None;
        if let Some(secret) = &self.client_secret {
            if self.secret_in_params {
                params.push(("client_secret", secret.as_str()));
            } else {
                // RFC 6749 §2.3.1: both parts are form-encoded before Basic encoding
                authentication = Some(Authentication::Basic {
                    username: form_encode(&self.client_id),
                    password: form_encode(secret.as_str()).into(),
                });
            }
        }

        let body = serde_urlencoded::to_string(&params)?;

        let mut request = Request::new(Method::POST, token_url);
        let headers = request.headers_mut();
        headers.typed_insert(ContentType::form_url_encoded());
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(auth) = authentication {
            let (name, value) = auth.to_header()?;
            headers.insert(name, value);
        }
        *request.body_mut() = Some(Body::from(body));

        Ok(request)
    }
}

fn form_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfigBuilder;

    fn config(secret_in_params: bool) -> ClientConfig {
        let server = url::Url::parse("http://127.0.0.1:8443").expect("valid URL");
        ClientConfigBuilder::for_server("system:serviceaccount:test-project:default", &server)
            .expect("Should create builder")
            .with_client_secret("sa-token-secret")
            .with_redirect_url("http://127.0.0.1:9000/oauthcallback")
            .with_secret_in_params(secret_in_params)
            .build()
            .expect("Should build config")
    }

    fn body_of(request: &Request) -> String {
        let bytes = request
            .body()
            .and_then(Body::as_bytes)
            .expect("buffered body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[test]
    fn should_send_secret_in_params() {
        let config = config(true);
        let token_url = config.token_url().cloned().expect("token url");
        let request = config
            .build_token_request(token_url, "the-code")
            .expect("valid request");

        assert_eq!(request.method(), Method::POST);
        assert!(request.headers().get(http::header::AUTHORIZATION).is_none());
        insta::assert_snapshot!(body_of(&request), @"grant_type=authorization_code&code=the-code&redirect_uri=http%3A%2F%2F127.0.0.1%3A9000%2Foauthcallback&client_id=system%3Aserviceaccount%3Atest-project%3Adefault&client_secret=sa-token-secret");
    }

    #[test]
    fn should_send_secret_as_basic_header() {
        let config = config(false);
        let token_url = config.token_url().cloned().expect("token url");
        let request = config
            .build_token_request(token_url, "the-code")
            .expect("should build request");

        assert!(!body_of(&request).contains("client_secret"));
        let authorization = request
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .expect("authorization header");
        // system%3Aserviceaccount%3Atest-project%3Adefault:sa-token-secret
        assert_eq!(
            authorization,
            "Basic c3lzdGVtJTNBc2VydmljZWFjY291bnQlM0F0ZXN0LXByb2plY3QlM0FkZWZhdWx0OnNhLXRva2VuLXNlY3JldA=="
        );
    }

    #[tokio::test]
    async fn should_fail_without_token_endpoint() {
        let config = ClientConfig::builder("client-id", "http://127.0.0.1:8443/oauth/authorize")
            .expect("Should create builder")
            .with_redirect_url("/oauthcallback")
            .build()
            .expect("Should build config");

        let result = config.exchange_code(&reqwest::Client::new(), "code").await;
        assert!(matches!(result, Err(OAuthError::MissingTokenEndpoint)));
    }

    #[test]
    fn should_convert_token_response() {
        let response: BasicTokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600,"scope":"user:info"}"#,
        )
        .expect("valid token response");

        let token = AccessToken::from_response(&response);
        assert_eq!(token.secret(), "abc");
        assert_eq!(token.token_type(), "bearer");
        assert_eq!(token.scopes(), ["user:info"]);
        assert!(!token.is_expired());
        assert!(token.time_until_expiry().is_some());
    }

    #[test]
    fn should_redact_debug_output() {
        let token = AccessToken::new("very-secret-access-token");
        let debug_str = format!("{token:?}");
        assert!(!debug_str.contains("very-secret-access-token"));
        assert_eq!(token.authentication().to_string(), "Bearer very***");
    }
}

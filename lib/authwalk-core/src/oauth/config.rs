//! OAuth client configuration and builder.

use std::fmt;

use url::Url;

use super::error::OAuthError;
use crate::SecureString;

/// Path of the authorization endpoint, relative to the server base URL.
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// Path of the token endpoint, relative to the server base URL.
pub const TOKEN_PATH: &str = "/oauth/token";

/// OAuth client configuration.
///
/// Immutable for the duration of a flow run. Use [`ClientConfigBuilder`] to
/// create instances.
///
/// The redirect URL is stored as raw text: negative scenarios deliberately
/// register values such as `foo:foo` or `::` that are not valid URLs, and
/// those must reach the authorization server untouched.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<SecureString>,
    pub(crate) authorize_url: Url,
    pub(crate) token_url: Option<Url>,
    pub(crate) redirect_url: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) secret_in_params: bool,
}

impl ClientConfig {
    /// Creates a builder for a client talking to the given authorization endpoint.
    ///
    /// # Errors
    ///
    /// Fails if the authorization URL cannot be parsed.
    pub fn builder(
        client_id: impl Into<String>,
        authorize_url: impl AsRef<str>,
    ) -> Result<ClientConfigBuilder, OAuthError> {
        ClientConfigBuilder::new(client_id, authorize_url)
    }

    /// Returns the client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the redirect URL, as registered.
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Returns the token endpoint, if any.
    pub fn token_url(&self) -> Option<&Url> {
        self.token_url.as_ref()
    }

    /// Returns `true` if the client secret is sent as a request parameter.
    pub fn secret_in_params(&self) -> bool {
        self.secret_in_params
    }

    /// Returns the requested scopes joined with a single space.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Builds the URL that starts an authorization-code grant.
    ///
    /// ```rust
    /// use authwalk_core::ClientConfig;
    ///
    /// let config = ClientConfig::builder("my-client", "https://auth.example.com/oauth/authorize")
    ///     .expect("valid URL")
    ///     .with_redirect_url("https://app.example.com/oauthcallback")
    ///     .add_scope("user:info")
    ///     .build()
    ///     .expect("valid config");
    ///
    /// let url = config.authorize_request_url(None);
    /// assert_eq!(
    ///     url.as_str(),
    ///     "https://auth.example.com/oauth/authorize?response_type=code&client_id=my-client\
    ///      &redirect_uri=https%3A%2F%2Fapp.example.com%2Foauthcallback&scope=user%3Ainfo"
    /// );
    /// ```
    pub fn authorize_request_url(&self, state: Option<&str>) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_url);
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scope());
            }
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("secret_in_params", &self.secret_in_params)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Clone)]
pub struct ClientConfigBuilder {
    client_id: String,
    client_secret: Option<SecureString>,
    authorize_url: Url,
    token_url: Option<Url>,
    redirect_url: Option<String>,
    scopes: Vec<String>,
    secret_in_params: bool,
}

impl ClientConfigBuilder {
    /// Creates a new builder with required parameters.
    ///
    /// # Errors
    ///
    /// Fails if the authorization URL cannot be parsed.
    pub fn new(
        client_id: impl Into<String>,
        authorize_url: impl AsRef<str>,
    ) -> Result<Self, OAuthError> {
        let authorize_url = Url::parse(authorize_url.as_ref()).map_err(|source| {
            OAuthError::InvalidAuthorizeEndpoint {
                url: authorize_url.as_ref().to_string(),
                source,
            }
        })?;

        Ok(Self {
            client_id: client_id.into(),
            client_secret: None,
            authorize_url,
            token_url: None,
            redirect_url: None,
            scopes: Vec::new(),
            secret_in_params: true,
        })
    }

    /// Creates a builder using the conventional `/oauth/authorize` and
    /// `/oauth/token` endpoints of a server.
    ///
    /// # Errors
    ///
    /// Fails if the endpoints cannot be derived from the server URL.
    pub fn for_server(client_id: impl Into<String>, server: &Url) -> Result<Self, OAuthError> {
        let authorize_url =
            server
                .join(AUTHORIZE_PATH)
                .map_err(|source| OAuthError::InvalidAuthorizeEndpoint {
                    url: server.to_string(),
                    source,
                })?;
        let token_url = server
            .join(TOKEN_PATH)
            .map_err(|source| OAuthError::InvalidTokenEndpoint {
                url: server.to_string(),
                source,
            })?;

        let mut builder = Self::new(client_id, authorize_url)?;
        builder.token_url = Some(token_url);
        Ok(builder)
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<SecureString>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the token endpoint.
    ///
    /// # Errors
    ///
    /// Fails if the token URL cannot be parsed.
    pub fn with_token_url(mut self, token_url: impl AsRef<str>) -> Result<Self, OAuthError> {
        let url =
            Url::parse(token_url.as_ref()).map_err(|source| OAuthError::InvalidTokenEndpoint {
                url: token_url.as_ref().to_string(),
                source,
            })?;
        self.token_url = Some(url);
        Ok(self)
    }

    /// Sets the redirect URL, kept verbatim.
    #[must_use]
    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    /// Adds a scope.
    #[must_use]
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Adds multiple scopes.
    #[must_use]
    pub fn add_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Chooses whether the client secret is sent as a request parameter
    /// (the default) or as a Basic `Authorization` header.
    #[must_use]
    pub fn with_secret_in_params(mut self, secret_in_params: bool) -> Self {
        self.secret_in_params = secret_in_params;
        self
    }

    /// Builds the client configuration.
    ///
    /// # Errors
    ///
    /// Fails if no redirect URL was provided.
    pub fn build(self) -> Result<ClientConfig, OAuthError> {
        let Some(redirect_url) = self.redirect_url else {
            return Err(OAuthError::MissingField {
                field: "redirect URL",
            });
        };

        Ok(ClientConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            authorize_url: self.authorize_url,
            token_url: self.token_url,
            redirect_url,
            scopes: self.scopes,
            secret_in_params: self.secret_in_params,
        })
    }
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("secret_in_params", &self.secret_in_params)
            .finish()
    }
}

//! OAuth client error types.

use crate::AuthenticationError;

/// Errors raised while configuring an OAuth client or exchanging a code.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum OAuthError {
    /// The authorize endpoint is not an absolute URL.
    #[display("Invalid authorize endpoint {url:?}: {source}")]
    InvalidAuthorizeEndpoint {
        /// The rejected value.
        url: String,
        /// Parser diagnostic.
        source: url::ParseError,
    },

    /// The token endpoint is not an absolute URL.
    #[display("Invalid token endpoint {url:?}: {source}")]
    InvalidTokenEndpoint {
        /// The rejected value.
        url: String,
        /// Parser diagnostic.
        source: url::ParseError,
    },

    /// Code exchange needs a token endpoint.
    #[display("No token endpoint configured for this client")]
    MissingTokenEndpoint,

    /// A required builder field was never set.
    #[display("Missing {field} in OAuth client configuration")]
    MissingField {
        /// Name of the builder field.
        field: &'static str,
    },

    /// The client secret cannot be sent as Basic credentials.
    #[display("Cannot authenticate client: {_0}")]
    #[from]
    ClientCredentials(AuthenticationError),

    /// The token request parameters cannot be form-encoded.
    #[display("Cannot encode token request: {_0}")]
    #[from]
    EncodeRequest(serde_urlencoded::ser::Error),

    /// The token endpoint could not be reached or its body read.
    #[display("Token request failed: {_0}")]
    #[from]
    Network(reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[display("Token request rejected ({status}): {error}")]
    TokenRequestRejected {
        /// HTTP status code of the token response.
        status: u16,
        /// OAuth error code, or the raw body when it is not an OAuth error document.
        error: String,
    },

    /// A success response that is not a token document.
    #[display("Invalid token response: {_0}")]
    #[from]
    InvalidTokenResponse(serde_json::Error),
}

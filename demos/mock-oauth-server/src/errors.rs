use axum::Json;
use axum::http::StatusCode;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Errors of the interactive endpoints, rendered as plain text.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub(crate) enum AuthorizeError {
    #[display("Authentication required")]
    Unauthenticated,

    #[display("Missing or invalid CSRF token")]
    Csrf,

    #[display("Unknown client {client_id}")]
    UnknownClient { client_id: String },

    #[display("Invalid redirect_uri {redirect_uri} for client {client_id}")]
    InvalidRedirectUri {
        client_id: String,
        redirect_uri: String,
    },

    #[display("Unsupported response_type {response_type}")]
    UnsupportedResponseType { response_type: String },
}

impl IntoResponse for AuthorizeError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Basic realm=\"mock-oauth-server\"")],
                message,
            )
                .into_response(),
            Self::Csrf => (StatusCode::FORBIDDEN, message).into_response(),
            Self::UnknownClient { .. }
            | Self::InvalidRedirectUri { .. }
            | Self::UnsupportedResponseType { .. } => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
        }
    }
}

/// Standard OAuth error codes of the token endpoint.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub(crate) enum TokenError {
    #[display("invalid_client")]
    InvalidClient,

    #[display("invalid_grant")]
    InvalidGrant,

    #[display("unsupported_grant_type")]
    UnsupportedGrantType,
}

/// Token endpoint error body
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: String,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let (status, description) = match &self {
            Self::InvalidClient => (StatusCode::UNAUTHORIZED, "client authentication failed"),
            Self::InvalidGrant => (
                StatusCode::BAD_REQUEST,
                "authorization code is invalid, expired or issued to another client",
            ),
            Self::UnsupportedGrantType => (
                StatusCode::BAD_REQUEST,
                "only authorization_code is supported",
            ),
        };
        let body = TokenErrorResponse {
            error: self.to_string(),
            error_description: description.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use http::header::{AUTHORIZATION, HeaderName};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Credentials that cannot be carried by an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum AuthenticationError {
    /// RFC 7617 forbids a colon in a Basic username.
    #[display("Username {username:?} contains a colon")]
    InvalidUsername {
        /// The rejected username.
        username: String,
    },

    /// The encoded header value holds bytes HTTP does not allow.
    #[display("Invalid {scheme} authorization value: {message}")]
    InvalidHeaderValue {
        /// `Basic` or `Bearer`.
        scheme: &'static str,
        /// Reason reported by the header parser.
        message: String,
    },
}

/// A secret string, wiped from memory on drop and never printed in full.
///
/// Passwords, client secrets and access tokens are all kept in this type.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Wraps a secret.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Exposes the secret, for encoding only.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for an empty secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

/// Shows the first four characters of long secrets, nothing of short ones.
impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get(..4) {
            Some(prefix) if self.0.chars().count() > 8 => write!(f, "{prefix}***"),
            _ => f.write_str("***"),
        }
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// The `Authorization` header sent by the flow or the token exchange.
///
/// `Basic` answers a server challenge and authenticates confidential clients
/// at the token endpoint; `Bearer` carries an obtained access token.
///
/// ```rust
/// use authwalk_core::Authentication;
///
/// let auth = Authentication::Basic {
///     username: "harold".to_string(),
///     password: "any-pass".into(),
/// };
/// let (name, value) = auth.to_header().expect("valid credentials");
/// assert_eq!(name, "authorization");
/// assert_eq!(value, "Basic aGFyb2xkOmFueS1wYXNz");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// `Authorization: Bearer <token>`
    Bearer(SecureString),

    /// `Authorization: Basic <base64(username:password)>`
    Basic {
        /// Must not contain a colon.
        username: String,
        /// May be empty.
        password: SecureString,
    },
}

impl Authentication {
    /// Encodes the credentials as a sensitive `Authorization` header.
    ///
    /// # Errors
    ///
    /// Fails on a Basic username containing `:` or on bytes that are not
    /// allowed in a header value.
    pub fn to_header(&self) -> Result<(HeaderName, HeaderValue), AuthenticationError> {
        let (scheme, encoded) = match self {
            Self::Bearer(token) => ("Bearer", token.as_str().to_owned()),
            Self::Basic { username, password } => {
                if username.contains(':') {
                    return Err(AuthenticationError::InvalidUsername {
                        username: username.clone(),
                    });
                }
                ("Basic", STANDARD.encode(format!("{username}:{}", password.as_str())))
            }
        };

        let mut value = HeaderValue::try_from(format!("{scheme} {encoded}")).map_err(|err| {
            AuthenticationError::InvalidHeaderValue {
                scheme,
                message: err.to_string(),
            }
        })?;
        value.set_sensitive(true);
        Ok((AUTHORIZATION, value))
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(token) => write!(f, "Bearer {token}"),
            Self::Basic { username, .. } => write!(f, "Basic {username}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harold(password: &str) -> Authentication {
        Authentication::Basic {
            username: "harold".to_string(),
            password: password.into(),
        }
    }

    #[test]
    fn should_encode_challenge_credentials() {
        let (name, value) = harold("any-pass").to_header().unwrap();

        assert_eq!(name, AUTHORIZATION);
        assert_eq!(value, "Basic aGFyb2xkOmFueS1wYXNz");
        assert!(value.is_sensitive());
    }

    #[test]
    fn should_encode_empty_password() {
        let (_, value) = harold("").to_header().unwrap();

        // "harold:"
        assert_eq!(value, "Basic aGFyb2xkOg==");
    }

    #[test]
    fn should_encode_bearer_token() {
        let auth = Authentication::Bearer("4f1c1e0a2b".into());
        let (_, value) = auth.to_header().unwrap();

        assert_eq!(value, "Bearer 4f1c1e0a2b");
    }

    #[test]
    fn should_reject_service_account_name_as_basic_username() {
        let auth = Authentication::Basic {
            username: "system:serviceaccount:oauth-test:default".to_string(),
            password: "secret".into(),
        };

        let result = auth.to_header();

        insta::assert_snapshot!(result.unwrap_err(), @r#"Username "system:serviceaccount:oauth-test:default" contains a colon"#);
    }

    #[test]
    fn should_reject_control_characters() {
        let auth = Authentication::Bearer("line\nbreak".into());

        assert!(matches!(
            auth.to_header(),
            Err(AuthenticationError::InvalidHeaderValue { scheme: "Bearer", .. })
        ));
    }

    #[test]
    fn should_never_print_secrets() {
        assert_eq!(SecureString::from("short").to_string(), "***");
        assert_eq!(SecureString::from("12345678").to_string(), "***");
        assert_eq!(SecureString::from("123456789").to_string(), "1234***");
        assert_eq!(harold("any-pass").to_string(), "Basic harold");

        insta::assert_snapshot!(format!("{:?}", harold("any-pass")), @r#"Basic { username: "harold", password: "[REDACTED]" }"#);
        insta::assert_snapshot!(format!("{:?}", SecureString::from("any-pass")), @"SecureString([REDACTED])");
    }
}
